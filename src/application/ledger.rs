use crate::config::BookingConfig;
use crate::domain::identity::ActorId;
use crate::domain::ledger::{LedgerEvent, LedgerEventKind};
use crate::domain::ports::{ClockRef, LedgerStoreBox};
use crate::domain::showtime::{SeatId, SeatState, ShowtimeId};
use crate::error::Result;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{error, warn};

/// The reservation ledger: stamps events with a sequence number and time and
/// appends them to the backing store.
///
/// An append that returns `Ok` is durable. Transient store failures are retried
/// with linear backoff; anything else is returned to the caller, which must
/// then abandon the state change the event describes.
///
/// Sequence numbers are strictly increasing but not dense: a number taken by
/// an append that finally failed is never reused, leaving a gap. Concurrent
/// appends may also land in the store out of numbering order; readers order
/// by sequence.
pub struct ReservationLedger {
    store: LedgerStoreBox,
    clock: ClockRef,
    next_sequence: AtomicU64,
    retry_attempts: u32,
    retry_backoff: Duration,
}

impl ReservationLedger {
    /// Opens the ledger, resuming numbering after the store's last event.
    pub async fn open(store: LedgerStoreBox, clock: ClockRef, config: &BookingConfig) -> Result<Self> {
        let next = store.last_sequence().await?.map_or(1, |last| last + 1);
        Ok(Self {
            store,
            clock,
            next_sequence: AtomicU64::new(next),
            retry_attempts: config.ledger_retry_attempts.max(1),
            retry_backoff: config.ledger_retry_backoff(),
        })
    }

    pub async fn append(
        &self,
        showtime: &ShowtimeId,
        actor: &ActorId,
        kind: LedgerEventKind,
    ) -> Result<LedgerEvent> {
        let event = LedgerEvent {
            sequence: self.next_sequence.fetch_add(1, Ordering::SeqCst),
            recorded_at: self.clock.now(),
            showtime: showtime.clone(),
            actor: actor.clone(),
            kind,
        };

        let mut attempt = 1;
        loop {
            match self.store.append(event.clone()).await {
                Ok(()) => return Ok(event),
                Err(e) if e.is_transient() && attempt < self.retry_attempts => {
                    warn!(
                        sequence = event.sequence,
                        attempt,
                        error = %e,
                        "ledger append failed, retrying"
                    );
                    tokio::time::sleep(self.retry_backoff.saturating_mul(attempt)).await;
                    attempt += 1;
                }
                Err(e) => {
                    error!(
                        sequence = event.sequence,
                        event = event.kind.name(),
                        showtime = %showtime,
                        error = %e,
                        "ledger append failed"
                    );
                    return Err(e);
                }
            }
        }
    }

    /// Records a rejected transition. The rejection stands even if the audit
    /// record cannot be written.
    pub async fn record_violation(
        &self,
        showtime: &ShowtimeId,
        actor: &ActorId,
        seats: &[SeatId],
        from: SeatState,
        to: SeatState,
        reason: &str,
    ) {
        error!(
            showtime = %showtime,
            actor = %actor,
            ?seats,
            %from,
            %to,
            reason,
            "integrity violation"
        );
        let kind = LedgerEventKind::IntegrityViolation {
            seats: seats.to_vec(),
            from,
            to,
            reason: reason.to_string(),
        };
        // append() has already logged the failure
        let _ = self.append(showtime, actor, kind).await;
    }

    /// Every event in sequence order, for replay and audit.
    pub async fn events(&self) -> Result<Vec<LedgerEvent>> {
        self.store.events().await
    }

    pub fn clock(&self) -> &ClockRef {
        &self.clock
    }
}
