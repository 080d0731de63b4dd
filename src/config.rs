use crate::error::{BookingError, Result};
use serde::Deserialize;

/// Longest accepted sweep cadence.
pub const MAX_SWEEP_INTERVAL_SECS: u64 = 86_400;

/// Policy knobs for the booking core.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BookingConfig {
    /// Default hold lifetime when a request does not supply one.
    pub hold_ttl_secs: u64,
    /// Upper bound on a single payment authorization.
    pub payment_timeout_ms: u64,
    /// Cadence of the background expiry sweep.
    pub sweep_interval_secs: u64,
    /// Attempts per ledger append when the store reports a transient failure.
    pub ledger_retry_attempts: u32,
    pub ledger_retry_backoff_ms: u64,
    /// Whether cancelling a booking returns its seats to sale.
    pub release_on_cancel: bool,
}

impl Default for BookingConfig {
    fn default() -> Self {
        Self {
            hold_ttl_secs: 600,
            payment_timeout_ms: 5_000,
            sweep_interval_secs: 30,
            ledger_retry_attempts: 3,
            ledger_retry_backoff_ms: 25,
            release_on_cancel: false,
        }
    }
}

impl BookingConfig {
    /// Rejects settings the core cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.hold_ttl()? <= chrono::Duration::zero() {
            return Err(BookingError::ValidationError(
                "hold_ttl_secs must be positive".to_string(),
            ));
        }
        if self.sweep_interval_secs > MAX_SWEEP_INTERVAL_SECS {
            return Err(BookingError::ValidationError(format!(
                "sweep_interval_secs must be at most {MAX_SWEEP_INTERVAL_SECS}, got {}",
                self.sweep_interval_secs
            )));
        }
        Ok(())
    }

    pub fn hold_ttl(&self) -> Result<chrono::Duration> {
        hold_ttl_from_secs(self.hold_ttl_secs)
    }

    pub fn payment_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.payment_timeout_ms)
    }

    pub fn sweep_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.sweep_interval_secs.max(1))
    }

    pub fn ledger_retry_backoff(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.ledger_retry_backoff_ms)
    }
}

/// Converts a TTL in seconds, rejecting values `chrono` cannot represent.
fn hold_ttl_from_secs(secs: u64) -> Result<chrono::Duration> {
    i64::try_from(secs)
        .ok()
        .and_then(chrono::Duration::try_seconds)
        .ok_or_else(|| BookingError::ValidationError(format!("Hold TTL out of range: {secs}s")))
}
