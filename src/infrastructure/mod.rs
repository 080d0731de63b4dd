//! Adapters for the domain ports: ledger storage, clocks and payment.

pub mod clock;
pub mod in_memory;
pub mod payment;
#[cfg(feature = "storage-rocksdb")]
pub mod rocksdb;
