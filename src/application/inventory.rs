use super::ledger::ReservationLedger;
use crate::domain::booking::BookingId;
use crate::domain::hold::HoldId;
use crate::domain::identity::ActorId;
use crate::domain::ledger::{LedgerEvent, LedgerEventKind};
use crate::domain::showtime::{SeatId, SeatState, Showtime, ShowtimeId, ShowtimeStatus};
use crate::error::{BookingError, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

/// State of one seat plus the claim that currently owns it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SeatSlot {
    pub state: SeatState,
    pub hold: Option<HoldId>,
    pub booking: Option<BookingId>,
}

impl SeatSlot {
    const FREE: Self = Self {
        state: SeatState::Free,
        hold: None,
        booking: None,
    };
}

/// A request to move a set of seats from one state to another, all or nothing.
///
/// Leaving `Held` requires the owning hold, leaving `Booked` the owning booking.
/// Entering `Held` assigns `hold`, entering `Booked` assigns `booking`.
#[derive(Debug, Clone)]
pub struct TransitionRequest {
    pub showtime: ShowtimeId,
    pub seats: Vec<SeatId>,
    pub from: SeatState,
    pub to: SeatState,
    pub actor: ActorId,
    pub hold: Option<HoldId>,
    pub booking: Option<BookingId>,
    /// Hold expiry to record on `Free -> Held`.
    pub expires_at: Option<DateTime<Utc>>,
    /// The transition is refused with `HoldExpired` from this instant on.
    pub not_after: Option<DateTime<Utc>>,
}

impl TransitionRequest {
    pub fn new(
        showtime: ShowtimeId,
        seats: Vec<SeatId>,
        from: SeatState,
        to: SeatState,
        actor: ActorId,
    ) -> Self {
        Self {
            showtime,
            seats,
            from,
            to,
            actor,
            hold: None,
            booking: None,
            expires_at: None,
            not_after: None,
        }
    }

    pub fn with_hold(mut self, hold: HoldId) -> Self {
        self.hold = Some(hold);
        self
    }

    pub fn with_booking(mut self, booking: BookingId) -> Self {
        self.booking = Some(booking);
        self
    }

    pub fn expiring_at(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    pub fn not_after(mut self, deadline: DateTime<Utc>) -> Self {
        self.not_after = Some(deadline);
        self
    }

    fn missing_claim(&self) -> Option<&'static str> {
        let needs_hold = self.from == SeatState::Free || self.from == SeatState::Held;
        let needs_booking = self.to == SeatState::Booked || self.from == SeatState::Booked;
        if needs_hold && self.hold.is_none() {
            Some("hold")
        } else if needs_booking && self.booking.is_none() {
            Some("booking")
        } else {
            None
        }
    }
}

struct ShowtimeSeats {
    showtime: Showtime,
    slots: BTreeMap<SeatId, SeatSlot>,
}

impl ShowtimeSeats {
    fn new(showtime: Showtime) -> Self {
        let slots = showtime
            .seats
            .iter()
            .map(|seat| (seat.id.clone(), SeatSlot::FREE))
            .collect();
        Self { showtime, slots }
    }

    fn apply(
        &mut self,
        seats: &[SeatId],
        to: SeatState,
        hold: Option<HoldId>,
        booking: Option<BookingId>,
    ) {
        for seat in seats {
            if let Some(slot) = self.slots.get_mut(seat) {
                *slot = SeatSlot {
                    state: to,
                    hold: if to == SeatState::Held { hold } else { None },
                    booking: if to == SeatState::Booked { booking } else { None },
                };
            }
        }
    }

    fn conflicts(&self, request: &TransitionRequest) -> Vec<SeatId> {
        request
            .seats
            .iter()
            .filter(|seat| {
                let Some(slot) = self.slots.get(*seat) else {
                    return true;
                };
                slot.state != request.from
                    || (request.from == SeatState::Held && slot.hold != request.hold)
                    || (request.from == SeatState::Booked && slot.booking != request.booking)
            })
            .cloned()
            .collect()
    }
}

/// Owns the seat state of every published showtime.
///
/// Each showtime sits behind its own mutex, so transitions on one showtime
/// never wait for another. `try_transition` is the only way to change a seat.
pub struct SeatInventory {
    ledger: Arc<ReservationLedger>,
    showtimes: RwLock<HashMap<ShowtimeId, Arc<Mutex<ShowtimeSeats>>>>,
}

impl SeatInventory {
    pub fn new(ledger: Arc<ReservationLedger>) -> Self {
        Self {
            ledger,
            showtimes: RwLock::new(HashMap::new()),
        }
    }

    /// Registers a showtime with every seat free.
    pub async fn publish(&self, showtime: Showtime, actor: &ActorId) -> Result<LedgerEvent> {
        showtime.validate()?;
        if showtime.is_cancelled() {
            return Err(BookingError::ValidationError(format!(
                "Showtime {} cannot be published as cancelled",
                showtime.id
            )));
        }

        let mut showtimes = self.showtimes.write().await;
        if showtimes.contains_key(&showtime.id) {
            return Err(BookingError::ValidationError(format!(
                "Showtime {} already published",
                showtime.id
            )));
        }

        let event = self
            .ledger
            .append(
                &showtime.id,
                actor,
                LedgerEventKind::ShowtimePublished {
                    showtime: showtime.clone(),
                },
            )
            .await?;

        info!(showtime = %showtime.id, seats = showtime.seats.len(), "showtime published");
        showtimes.insert(
            showtime.id.clone(),
            Arc::new(Mutex::new(ShowtimeSeats::new(showtime))),
        );
        Ok(event)
    }

    /// Stops new holds on a showtime. Existing holds and bookings are untouched.
    pub async fn cancel_showtime(&self, id: &ShowtimeId, actor: &ActorId) -> Result<()> {
        let entry = self.entry(id).await?;
        let mut seats = entry.lock().await;
        if seats.showtime.is_cancelled() {
            return Ok(());
        }

        self.ledger
            .append(id, actor, LedgerEventKind::ShowtimeCancelled)
            .await?;
        seats.showtime.status = ShowtimeStatus::Cancelled;
        info!(showtime = %id, actor = %actor, "showtime cancelled");
        Ok(())
    }

    pub async fn showtime(&self, id: &ShowtimeId) -> Result<Showtime> {
        let entry = self.entry(id).await?;
        let seats = entry.lock().await;
        Ok(seats.showtime.clone())
    }

    pub async fn showtime_ids(&self) -> Vec<ShowtimeId> {
        let showtimes = self.showtimes.read().await;
        let mut ids: Vec<ShowtimeId> = showtimes.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Seat states of a showtime, consistent as of a single instant.
    pub async fn snapshot(&self, id: &ShowtimeId) -> Result<BTreeMap<SeatId, SeatState>> {
        let entry = self.entry(id).await?;
        let seats = entry.lock().await;
        Ok(seats
            .slots
            .iter()
            .map(|(seat, slot)| (seat.clone(), slot.state))
            .collect())
    }

    /// Like [`snapshot`](Self::snapshot) but including the owning claims.
    pub async fn slots(&self, id: &ShowtimeId) -> Result<BTreeMap<SeatId, SeatSlot>> {
        let entry = self.entry(id).await?;
        let seats = entry.lock().await;
        Ok(seats.slots.clone())
    }

    /// Atomically moves every requested seat from `from` to `to`.
    ///
    /// Fails with `SeatsUnavailable` naming each seat that is not in `from` or
    /// not owned by the request's claim, and with `HoldExpired` if the request's
    /// deadline has passed. On success the ledger event has landed before any
    /// seat changes.
    pub async fn try_transition(&self, request: TransitionRequest) -> Result<LedgerEvent> {
        if request.seats.is_empty() {
            return Err(BookingError::ValidationError(
                "At least one seat is required".to_string(),
            ));
        }
        let mut unique = HashSet::new();
        if let Some(duplicate) = request.seats.iter().find(|seat| !unique.insert(*seat)) {
            return Err(BookingError::ValidationError(format!(
                "Seat {duplicate} requested twice"
            )));
        }

        if !request.from.can_transition_to(request.to) {
            self.ledger
                .record_violation(
                    &request.showtime,
                    &request.actor,
                    &request.seats,
                    request.from,
                    request.to,
                    "transition not permitted",
                )
                .await;
            return Err(BookingError::InvalidTransition {
                from: request.from,
                to: request.to,
            });
        }
        if let Some(claim) = request.missing_claim() {
            return Err(BookingError::ValidationError(format!(
                "Transition {} -> {} requires a {claim}",
                request.from, request.to
            )));
        }

        let entry = self.entry(&request.showtime).await?;
        let mut seats = entry.lock().await;

        if request.from == SeatState::Free && seats.showtime.is_cancelled() {
            return Err(BookingError::ValidationError(format!(
                "Showtime {} is cancelled",
                request.showtime
            )));
        }

        let unknown: Vec<&SeatId> = request
            .seats
            .iter()
            .filter(|seat| !seats.slots.contains_key(*seat))
            .collect();
        if !unknown.is_empty() {
            return Err(BookingError::ValidationError(format!(
                "Unknown seats for showtime {}: {:?}",
                request.showtime, unknown
            )));
        }

        if let (Some(deadline), Some(hold)) = (request.not_after, request.hold)
            && self.ledger.clock().now() >= deadline
        {
            debug!(showtime = %request.showtime, %hold, "transition refused past deadline");
            return Err(BookingError::HoldExpired(hold));
        }

        let conflicts = seats.conflicts(&request);
        if !conflicts.is_empty() {
            warn!(
                showtime = %request.showtime,
                actor = %request.actor,
                from = %request.from,
                to = %request.to,
                ?conflicts,
                "seat transition conflict"
            );
            return Err(BookingError::SeatsUnavailable {
                showtime: request.showtime,
                seats: conflicts,
            });
        }

        let event = self
            .ledger
            .append(
                &request.showtime,
                &request.actor,
                LedgerEventKind::SeatsTransitioned {
                    seats: request.seats.clone(),
                    from: request.from,
                    to: request.to,
                    hold: request.hold,
                    booking: request.booking,
                    expires_at: request.expires_at,
                },
            )
            .await?;

        seats.apply(&request.seats, request.to, request.hold, request.booking);
        info!(
            showtime = %request.showtime,
            actor = %request.actor,
            sequence = event.sequence,
            from = %request.from,
            to = %request.to,
            seats = ?request.seats,
            "seats transitioned"
        );
        Ok(event)
    }

    /// Rebuilds seat state from ledger events, without writing to the ledger.
    pub async fn restore(&self, events: &[LedgerEvent]) -> Result<()> {
        let mut showtimes = self.showtimes.write().await;
        for event in events {
            match &event.kind {
                LedgerEventKind::ShowtimePublished { showtime } => {
                    showtimes.insert(
                        showtime.id.clone(),
                        Arc::new(Mutex::new(ShowtimeSeats::new(showtime.clone()))),
                    );
                }
                LedgerEventKind::ShowtimeCancelled => {
                    let entry = replay_entry(&showtimes, event)?;
                    entry.lock().await.showtime.status = ShowtimeStatus::Cancelled;
                }
                LedgerEventKind::SeatsTransitioned {
                    seats: seat_ids,
                    from,
                    to,
                    hold,
                    booking,
                    ..
                } => {
                    let entry = replay_entry(&showtimes, event)?;
                    let mut seats = entry.lock().await;
                    for seat in seat_ids {
                        let current = seats.slots.get(seat).map(|slot| slot.state);
                        if current != Some(*from) {
                            warn!(
                                sequence = event.sequence,
                                seat = %seat,
                                ?current,
                                expected = %from,
                                "ledger replay found unexpected seat state"
                            );
                        }
                    }
                    seats.apply(seat_ids, *to, *hold, *booking);
                }
                LedgerEventKind::BookingCancelled { .. }
                | LedgerEventKind::IntegrityViolation { .. } => {}
            }
        }
        info!(events = events.len(), showtimes = showtimes.len(), "seat inventory restored");
        Ok(())
    }

    async fn entry(&self, id: &ShowtimeId) -> Result<Arc<Mutex<ShowtimeSeats>>> {
        let showtimes = self.showtimes.read().await;
        showtimes
            .get(id)
            .cloned()
            .ok_or_else(|| BookingError::ShowtimeNotFound(id.clone()))
    }
}

fn replay_entry(
    showtimes: &HashMap<ShowtimeId, Arc<Mutex<ShowtimeSeats>>>,
    event: &LedgerEvent,
) -> Result<Arc<Mutex<ShowtimeSeats>>> {
    showtimes.get(&event.showtime).cloned().ok_or_else(|| {
        BookingError::internal(format!(
            "Ledger event {} references unpublished showtime {}",
            event.sequence, event.showtime
        ))
    })
}
