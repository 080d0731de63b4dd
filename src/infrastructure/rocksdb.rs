use crate::domain::ledger::LedgerEvent;
use crate::domain::ports::LedgerStore;
use crate::error::{BookingError, Result};
use async_trait::async_trait;
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, DB, IteratorMode, Options, WriteOptions};
use std::path::Path;
use std::sync::Arc;

/// Column Family holding ledger events keyed by big-endian sequence number.
pub const CF_LEDGER: &str = "ledger";

/// A persistent ledger implementation using RocksDB.
///
/// Events are written with `sync` enabled so that a successful append has
/// reached disk before the caller applies the state change. Big-endian keys
/// make iteration order equal sequence order.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<DB>`).
#[derive(Clone)]
pub struct RocksDBLedgerStore {
    db: Arc<DB>,
}

impl RocksDBLedgerStore {
    /// Opens or creates a RocksDB instance at the specified path.
    ///
    /// Ensures that the ledger column family exists.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_ledger = ColumnFamilyDescriptor::new(CF_LEDGER, Options::default());
        let db = DB::open_cf_descriptors(&opts, path, vec![cf_ledger])?;

        Ok(Self { db: Arc::new(db) })
    }

    fn ledger_cf(&self) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(CF_LEDGER)
            .ok_or_else(|| BookingError::internal("Ledger column family not found"))
    }
}

#[async_trait]
impl LedgerStore for RocksDBLedgerStore {
    async fn append(&self, event: LedgerEvent) -> Result<()> {
        let cf = self.ledger_cf()?;

        let key = event.sequence.to_be_bytes();
        let value = serde_json::to_vec(&event).map_err(|e| {
            BookingError::InternalError(Box::new(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("Serialization error: {}", e),
            )))
        })?;

        let mut write_opts = WriteOptions::default();
        write_opts.set_sync(true);
        self.db.put_cf_opt(cf, key, value, &write_opts)?;

        Ok(())
    }

    async fn events(&self) -> Result<Vec<LedgerEvent>> {
        let cf = self.ledger_cf()?;

        let mut events = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (_key, value) = item?;
            let event: LedgerEvent = serde_json::from_slice(&value).map_err(|e| {
                BookingError::InternalError(Box::new(std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    format!("Deserialization error: {}", e),
                )))
            })?;
            events.push(event);
        }

        Ok(events)
    }

    async fn last_sequence(&self) -> Result<Option<u64>> {
        let cf = self.ledger_cf()?;

        match self.db.iterator_cf(cf, IteratorMode::End).next() {
            Some(item) => {
                let (key, _value) = item?;
                let bytes: [u8; 8] = key.as_ref().try_into().map_err(|_| {
                    BookingError::internal(format!("Malformed ledger key of {} bytes", key.len()))
                })?;
                Ok(Some(u64::from_be_bytes(bytes)))
            }
            None => Ok(None),
        }
    }
}
