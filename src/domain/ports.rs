use super::hold::HoldId;
use super::ledger::LedgerEvent;
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;

/// Durable, append-only storage for ledger events.
///
/// An `append` that returns `Ok` must have landed durably; callers apply the
/// corresponding state change only afterwards.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn append(&self, event: LedgerEvent) -> Result<()>;
    /// All events ordered by sequence number.
    async fn events(&self) -> Result<Vec<LedgerEvent>>;
    async fn last_sequence(&self) -> Result<Option<u64>>;
}

pub type LedgerStoreBox = Box<dyn LedgerStore>;

/// Opaque token handed over by the payment front-end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentToken(pub String);

impl From<&str> for PaymentToken {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentOutcome {
    Authorized { reference: String },
    Declined { reason: String },
}

/// External payment collaborator.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn authorize(
        &self,
        hold: HoldId,
        token: &PaymentToken,
        amount: Decimal,
    ) -> Result<PaymentOutcome>;
}

pub type PaymentGatewayRef = Arc<dyn PaymentGateway>;

/// Source of wall-clock time. Every expiry decision goes through it.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub type ClockRef = Arc<dyn Clock>;
