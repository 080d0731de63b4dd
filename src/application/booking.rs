use super::holds::{HoldManager, seat_total};
use super::inventory::SeatInventory;
use super::ledger::ReservationLedger;
use super::sweeper::ExpirySweeper;
use crate::config::BookingConfig;
use crate::domain::booking::{Booking, BookingId};
use crate::domain::hold::{Hold, HoldId, HoldStatus};
use crate::domain::identity::Identity;
use crate::domain::ledger::LedgerEvent;
use crate::domain::ports::{ClockRef, LedgerStoreBox, PaymentGatewayRef, PaymentOutcome, PaymentToken};
use crate::domain::showtime::{SeatId, SeatState, Showtime, ShowtimeId};
use crate::error::{BookingError, Result};
use chrono::Duration;
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};

/// The entry point consumed by the API layer.
///
/// `BookingService` validates callers against the verified identity it is
/// handed, then delegates to the [`HoldManager`] and [`SeatInventory`]. It owns
/// the payment step of confirmation: a declined, failed or timed-out
/// authorization releases the hold immediately.
pub struct BookingService {
    config: BookingConfig,
    ledger: Arc<ReservationLedger>,
    inventory: Arc<SeatInventory>,
    holds: Arc<HoldManager>,
    payments: PaymentGatewayRef,
}

impl BookingService {
    /// Opens the service over a ledger store, replaying whatever it already holds.
    pub async fn open(
        config: BookingConfig,
        store: LedgerStoreBox,
        payments: PaymentGatewayRef,
        clock: ClockRef,
    ) -> Result<Self> {
        config.validate()?;
        let ledger = Arc::new(ReservationLedger::open(store, clock.clone(), &config).await?);
        let inventory = Arc::new(SeatInventory::new(ledger.clone()));
        let holds = Arc::new(HoldManager::new(
            inventory.clone(),
            ledger.clone(),
            clock,
            config.hold_ttl()?,
        ));

        let events = ledger.events().await?;
        if !events.is_empty() {
            inventory.restore(&events).await?;
            holds.restore(&events).await?;
            info!(events = events.len(), "recovered state from ledger");
        }

        Ok(Self {
            config,
            ledger,
            inventory,
            holds,
            payments,
        })
    }

    pub async fn publish_showtime(&self, showtime: Showtime, identity: &Identity) -> Result<()> {
        require_admin(identity, "publish showtimes")?;
        self.inventory.publish(showtime, &identity.actor()).await?;
        Ok(())
    }

    pub async fn cancel_showtime(&self, showtime: &ShowtimeId, identity: &Identity) -> Result<()> {
        require_admin(identity, "cancel showtimes")?;
        self.inventory
            .cancel_showtime(showtime, &identity.actor())
            .await
    }

    /// Holds the selected seats for the caller using the configured TTL.
    pub async fn select_seats(
        &self,
        showtime: &ShowtimeId,
        seats: Vec<SeatId>,
        identity: &Identity,
    ) -> Result<Hold> {
        self.select_seats_with_ttl(showtime, seats, identity, None)
            .await
    }

    pub async fn select_seats_with_ttl(
        &self,
        showtime: &ShowtimeId,
        seats: Vec<SeatId>,
        identity: &Identity,
        ttl: Option<Duration>,
    ) -> Result<Hold> {
        self.holds
            .create_hold(showtime, seats, &identity.customer, ttl)
            .await
            .inspect_err(|e| {
                if let BookingError::SeatsUnavailable { seats, .. } = e {
                    warn!(
                        showtime = %showtime,
                        customer = %identity.customer,
                        ?seats,
                        "seat selection conflict"
                    );
                }
            })
    }

    /// Authorizes payment for a hold and, only if it succeeds, books its seats.
    ///
    /// The hold stays locked from the status check until it is confirmed or
    /// released, so concurrent confirmations of one hold authorize at most one
    /// payment. The lock is held for at most the payment timeout.
    pub async fn confirm_payment(
        &self,
        hold_id: HoldId,
        token: &PaymentToken,
        identity: &Identity,
    ) -> Result<Booking> {
        let mut hold = self.holds.lock_hold(hold_id).await?;
        if !identity.may_act_for(&hold.customer) {
            return Err(BookingError::Unauthorized(format!(
                "{} does not own hold {hold_id}",
                identity.customer
            )));
        }

        match hold.status {
            HoldStatus::Active => {}
            // Already paid for; hand back the existing booking.
            HoldStatus::Confirmed => return self.holds.confirm_locked(&mut hold).await,
            HoldStatus::Expired => return Err(BookingError::HoldExpired(hold_id)),
            HoldStatus::Released => return Err(BookingError::HoldNotFound(hold_id)),
        }
        if self.holds.expire_locked(&mut hold).await? {
            return Err(BookingError::HoldExpired(hold_id));
        }

        let amount = self.amount_due(&hold).await?;
        let authorization = tokio::time::timeout(
            self.config.payment_timeout(),
            self.payments.authorize(hold_id, token, amount),
        )
        .await;

        let reason = match authorization {
            Ok(Ok(PaymentOutcome::Authorized { reference })) => {
                info!(hold = %hold_id, %reference, %amount, "payment authorized");
                return self.holds.confirm_locked(&mut hold).await.inspect_err(|e| {
                    warn!(hold = %hold_id, %reference, error = %e, "payment authorized but confirmation failed");
                });
            }
            Ok(Ok(PaymentOutcome::Declined { reason })) => reason,
            Ok(Err(e)) => e.to_string(),
            Err(_) => format!(
                "authorization timed out after {}ms",
                self.config.payment_timeout_ms
            ),
        };

        warn!(hold = %hold_id, %reason, "payment failed, releasing hold");
        if let Err(e) = self
            .holds
            .release_active_locked(&mut hold, &identity.actor())
            .await
        {
            warn!(hold = %hold_id, error = %e, "failed to release hold after payment failure");
        }
        Err(BookingError::PaymentFailed(reason))
    }

    /// Gives up a hold before paying.
    pub async fn release_seats(&self, hold_id: HoldId, identity: &Identity) -> Result<()> {
        let hold = self.holds.hold(hold_id).await?;
        if !identity.may_act_for(&hold.customer) {
            return Err(BookingError::Unauthorized(format!(
                "{} does not own hold {hold_id}",
                identity.customer
            )));
        }
        self.holds.release_hold(hold_id, &identity.actor()).await
    }

    /// Marks a booking cancelled. Seats go back on sale only when the
    /// `release_on_cancel` policy is set.
    pub async fn cancel_booking(&self, booking_id: BookingId, identity: &Identity) -> Result<Booking> {
        let booking = self.holds.booking(booking_id).await?;
        if !identity.may_act_for(&booking.customer) {
            return Err(BookingError::Unauthorized(format!(
                "{} does not own booking {booking_id}",
                identity.customer
            )));
        }
        self.holds
            .cancel_booking(booking_id, &identity.actor(), self.config.release_on_cancel)
            .await
    }

    /// Current seat states, after releasing any holds that have lapsed.
    pub async fn availability(&self, showtime: &ShowtimeId) -> Result<BTreeMap<SeatId, SeatState>> {
        self.holds.reclaim_showtime(showtime).await?;
        self.inventory.snapshot(showtime).await
    }

    pub async fn booking(&self, booking_id: BookingId) -> Result<Booking> {
        self.holds.booking(booking_id).await
    }

    pub async fn showtimes(&self) -> Vec<ShowtimeId> {
        self.inventory.showtime_ids().await
    }

    /// The full ledger, for audit.
    pub async fn audit_log(&self) -> Result<Vec<LedgerEvent>> {
        self.ledger.events().await
    }

    /// Starts the background expiry sweep at the configured cadence.
    pub fn spawn_sweeper(&self) -> ExpirySweeper {
        ExpirySweeper::spawn(self.holds.clone(), self.config.sweep_interval())
    }

    pub fn holds(&self) -> &Arc<HoldManager> {
        &self.holds
    }

    pub fn inventory(&self) -> &Arc<SeatInventory> {
        &self.inventory
    }

    async fn amount_due(&self, hold: &Hold) -> Result<Decimal> {
        let showtime = self.inventory.showtime(&hold.showtime).await?;
        Ok(seat_total(&showtime, &hold.seats))
    }
}

fn require_admin(identity: &Identity, action: &str) -> Result<()> {
    if identity.is_admin() {
        Ok(())
    } else {
        Err(BookingError::Unauthorized(format!(
            "{} may not {action}",
            identity.customer
        )))
    }
}
