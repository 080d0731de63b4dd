use crate::domain::ledger::LedgerEvent;
use crate::domain::ports::LedgerStore;
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

/// A thread-safe in-memory ledger.
///
/// Uses `Arc<RwLock<Vec<LedgerEvent>>>` so clones share the same log.
/// Ideal for tests and for runs where nothing has to survive a restart.
#[derive(Default, Clone)]
pub struct InMemoryLedgerStore {
    events: Arc<RwLock<Vec<LedgerEvent>>>,
}

impl InMemoryLedgerStore {
    /// Creates a new, empty in-memory ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of events appended so far.
    pub async fn len(&self) -> usize {
        self.events.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.events.read().await.is_empty()
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn append(&self, event: LedgerEvent) -> Result<()> {
        let mut events = self.events.write().await;
        events.push(event);
        Ok(())
    }

    async fn events(&self) -> Result<Vec<LedgerEvent>> {
        let events = self.events.read().await;
        let mut ordered = events.clone();
        // Appends for different showtimes may land out of sequence order.
        ordered.sort_by_key(|event| event.sequence);
        Ok(ordered)
    }

    async fn last_sequence(&self) -> Result<Option<u64>> {
        let events = self.events.read().await;
        Ok(events.iter().map(|event| event.sequence).max())
    }
}
