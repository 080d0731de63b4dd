use super::inventory::{SeatInventory, TransitionRequest};
use super::ledger::ReservationLedger;
use crate::domain::booking::{Booking, BookingId};
use crate::domain::hold::{Hold, HoldId, HoldStatus, is_expired};
use crate::domain::identity::{ActorId, CustomerId};
use crate::domain::ledger::{LedgerEvent, LedgerEventKind};
use crate::domain::ports::ClockRef;
use crate::domain::showtime::{SeatId, SeatState, Showtime, ShowtimeId};
use crate::error::{BookingError, Result};
use chrono::Duration;
use rust_decimal::Decimal;
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{info, warn};

/// Exclusive access to one hold, held across the steps of a confirmation.
pub type HoldGuard = OwnedMutexGuard<Hold>;

type Registry<K, V> = RwLock<HashMap<K, Arc<Mutex<V>>>>;

/// Turns seat selections into time-bounded exclusive claims and claims into
/// bookings.
///
/// Every hold and booking sits behind its own mutex; operations on one hold
/// never wait on another. A hold's lock is always taken before the showtime
/// lock inside [`SeatInventory`]. The registries themselves are only touched
/// between await points, so a hold is registered in the same step that its
/// seats become `Held`.
pub struct HoldManager {
    inventory: Arc<SeatInventory>,
    ledger: Arc<ReservationLedger>,
    clock: ClockRef,
    default_ttl: Duration,
    holds: Registry<HoldId, Hold>,
    bookings: Registry<BookingId, Booking>,
}

impl HoldManager {
    pub fn new(
        inventory: Arc<SeatInventory>,
        ledger: Arc<ReservationLedger>,
        clock: ClockRef,
        default_ttl: Duration,
    ) -> Self {
        Self {
            inventory,
            ledger,
            clock,
            default_ttl,
            holds: RwLock::new(HashMap::new()),
            bookings: RwLock::new(HashMap::new()),
        }
    }

    /// Holds every requested seat for `customer`, or none of them.
    ///
    /// When some seats are taken by holds that have already expired, those
    /// holds are released first and the request is tried once more.
    pub async fn create_hold(
        &self,
        showtime: &ShowtimeId,
        seats: Vec<SeatId>,
        customer: &CustomerId,
        ttl: Option<Duration>,
    ) -> Result<Hold> {
        if seats.is_empty() {
            return Err(BookingError::ValidationError(
                "A hold needs at least one seat".to_string(),
            ));
        }
        let ttl = ttl.unwrap_or(self.default_ttl);
        if ttl <= Duration::zero() {
            return Err(BookingError::ValidationError(format!(
                "Hold TTL must be positive, got {}s",
                ttl.num_seconds()
            )));
        }

        let hold = Hold::new(
            showtime.clone(),
            seats,
            customer.clone(),
            self.clock.now(),
            ttl,
        )?;
        let request = TransitionRequest::new(
            showtime.clone(),
            hold.seats.clone(),
            SeatState::Free,
            SeatState::Held,
            ActorId::from(customer),
        )
        .with_hold(hold.id)
        .expiring_at(hold.expires_at);

        if let Err(err) = self.inventory.try_transition(request.clone()).await {
            let BookingError::SeatsUnavailable { seats: taken, .. } = &err else {
                return Err(err);
            };
            if self.reclaim_expired(showtime, taken).await? == 0 {
                return Err(err);
            }
            self.inventory.try_transition(request).await?;
        }

        // No await from here on: the hold is known as soon as its seats are held.
        write(&self.holds).insert(hold.id, Arc::new(Mutex::new(hold.clone())));
        info!(
            hold = %hold.id,
            showtime = %showtime,
            customer = %customer,
            seats = ?hold.seats,
            expires_at = %hold.expires_at,
            "hold created"
        );
        Ok(hold)
    }

    /// Locks a hold for a multi-step operation. Other callers touching the same
    /// hold wait until the guard is dropped.
    pub async fn lock_hold(&self, hold_id: HoldId) -> Result<HoldGuard> {
        let entry = self.hold_entry(hold_id)?;
        Ok(entry.lock_owned().await)
    }

    /// Converts an unexpired hold into a booking.
    ///
    /// Calling it again for a confirmed hold returns the same booking. Expiry
    /// is checked inside the seat transition itself, so a confirmation that
    /// loses the race against the expiry instant fails with `HoldExpired`.
    pub async fn confirm_hold(&self, hold_id: HoldId) -> Result<Booking> {
        let mut hold = self.lock_hold(hold_id).await?;
        self.confirm_locked(&mut hold).await
    }

    /// [`confirm_hold`](Self::confirm_hold) for a hold the caller has locked.
    pub async fn confirm_locked(&self, hold: &mut Hold) -> Result<Booking> {
        let hold_id = hold.id;
        match hold.status {
            HoldStatus::Active => {}
            HoldStatus::Confirmed => return self.booking_of(hold).await,
            HoldStatus::Expired => return Err(BookingError::HoldExpired(hold_id)),
            HoldStatus::Released => return Err(BookingError::HoldNotFound(hold_id)),
        }

        if self.expire_locked(hold).await? {
            return Err(BookingError::HoldExpired(hold_id));
        }

        let showtime = self.inventory.showtime(&hold.showtime).await?;
        let booking_id = BookingId::new();
        let request = TransitionRequest::new(
            hold.showtime.clone(),
            hold.seats.clone(),
            SeatState::Held,
            SeatState::Booked,
            ActorId::from(&hold.customer),
        )
        .with_hold(hold_id)
        .with_booking(booking_id)
        .not_after(hold.expires_at);

        let event = match self.inventory.try_transition(request).await {
            Ok(event) => event,
            Err(BookingError::HoldExpired(_)) => {
                self.release_locked(hold, &ActorId::expiry(), HoldStatus::Expired)
                    .await?;
                return Err(BookingError::HoldExpired(hold_id));
            }
            Err(e) => return Err(e),
        };

        let booking = Booking {
            id: booking_id,
            hold: hold_id,
            showtime: hold.showtime.clone(),
            seats: hold.seats.clone(),
            customer: hold.customer.clone(),
            total: seat_total(&showtime, &hold.seats),
            created_at: event.recorded_at,
            cancelled_at: None,
        };
        hold.status = HoldStatus::Confirmed;
        hold.booking = Some(booking_id);
        write(&self.bookings).insert(booking_id, Arc::new(Mutex::new(booking.clone())));

        info!(
            hold = %hold_id,
            booking = %booking_id,
            showtime = %booking.showtime,
            total = %booking.total,
            "hold confirmed"
        );
        Ok(booking)
    }

    /// Returns a hold's seats to sale.
    ///
    /// Releasing a hold that already expired or was released is a no-op; a
    /// confirmed hold cannot be released.
    pub async fn release_hold(&self, hold_id: HoldId, actor: &ActorId) -> Result<()> {
        let mut hold = self.lock_hold(hold_id).await?;
        self.release_active_locked(&mut hold, actor).await
    }

    /// [`release_hold`](Self::release_hold) for a hold the caller has locked.
    pub async fn release_active_locked(&self, hold: &mut Hold, actor: &ActorId) -> Result<()> {
        match hold.status {
            HoldStatus::Active => {}
            HoldStatus::Released | HoldStatus::Expired => return Ok(()),
            HoldStatus::Confirmed => {
                return Err(BookingError::ValidationError(format!(
                    "Hold {} is already confirmed",
                    hold.id
                )));
            }
        }

        if self.expire_locked(hold).await? {
            return Ok(());
        }
        self.release_locked(hold, actor, HoldStatus::Released).await
    }

    /// Releases the hold if its expiry has passed. Returns whether it did.
    pub async fn expire_hold(&self, hold_id: HoldId) -> Result<bool> {
        let mut hold = self.lock_hold(hold_id).await?;
        self.expire_locked(&mut hold).await
    }

    /// Releases every active hold past its expiry. Returns how many were released.
    pub async fn sweep_expired(&self) -> Result<usize> {
        let entries: Vec<Arc<Mutex<Hold>>> = read(&self.holds).values().cloned().collect();

        let mut released = 0;
        for entry in entries {
            let mut hold = entry.lock().await;
            match self.expire_locked(&mut hold).await {
                Ok(true) => released += 1,
                Ok(false) => {}
                Err(e) => warn!(hold = %hold.id, error = %e, "failed to expire hold"),
            }
        }
        Ok(released)
    }

    /// Expires the holds owning any of `seats` whose expiry has passed.
    ///
    /// Returns how many owners no longer block those seats.
    pub async fn reclaim_expired(&self, showtime: &ShowtimeId, seats: &[SeatId]) -> Result<usize> {
        let slots = self.inventory.slots(showtime).await?;
        let owners: BTreeSet<HoldId> = seats
            .iter()
            .filter_map(|seat| slots.get(seat))
            .filter(|slot| slot.state == SeatState::Held)
            .filter_map(|slot| slot.hold)
            .collect();

        let mut reclaimed = 0;
        for owner in owners {
            // Unknown owners are mid-creation and cannot have expired yet.
            let Ok(entry) = self.hold_entry(owner) else {
                continue;
            };
            let mut hold = entry.lock().await;
            // An inactive owner means another caller freed the seats meanwhile.
            if !hold.is_active() || self.expire_locked(&mut hold).await? {
                reclaimed += 1;
            }
        }
        Ok(reclaimed)
    }

    /// Expires any lapsed holds on the showtime's seats. Used before reads.
    pub async fn reclaim_showtime(&self, showtime: &ShowtimeId) -> Result<usize> {
        let seats: Vec<SeatId> = self.inventory.slots(showtime).await?.into_keys().collect();
        self.reclaim_expired(showtime, &seats).await
    }

    pub async fn hold(&self, hold_id: HoldId) -> Result<Hold> {
        let entry = self.hold_entry(hold_id)?;
        let hold = entry.lock().await;
        Ok(hold.clone())
    }

    pub async fn booking(&self, booking_id: BookingId) -> Result<Booking> {
        let entry = self.booking_entry(booking_id)?;
        let booking = entry.lock().await;
        Ok(booking.clone())
    }

    /// Flags a booking as cancelled, ledger first. With `release_seats` the seats
    /// also go back to sale (`Booked -> Free`).
    ///
    /// Repeating the call is safe and finishes a release that failed earlier.
    pub async fn cancel_booking(
        &self,
        booking_id: BookingId,
        actor: &ActorId,
        release_seats: bool,
    ) -> Result<Booking> {
        let entry = self.booking_entry(booking_id)?;
        let mut booking = entry.lock().await;

        if !booking.is_cancelled() {
            let event = self
                .ledger
                .append(
                    &booking.showtime,
                    actor,
                    LedgerEventKind::BookingCancelled {
                        booking: booking_id,
                    },
                )
                .await?;
            booking.cancelled_at = Some(event.recorded_at);
            info!(booking = %booking_id, actor = %actor, "booking cancelled");
        }

        if release_seats && self.still_booked(&booking).await? {
            let request = TransitionRequest::new(
                booking.showtime.clone(),
                booking.seats.clone(),
                SeatState::Booked,
                SeatState::Free,
                actor.clone(),
            )
            .with_booking(booking_id);
            self.inventory.try_transition(request).await?;
        }

        Ok(booking.clone())
    }

    /// Rebuilds hold and booking records from the ledger.
    pub async fn restore(&self, events: &[LedgerEvent]) -> Result<()> {
        let mut showtimes: HashMap<ShowtimeId, Showtime> = HashMap::new();
        let mut holds: HashMap<HoldId, Hold> = HashMap::new();
        let mut bookings: HashMap<BookingId, Booking> = HashMap::new();

        for event in events {
            match &event.kind {
                LedgerEventKind::ShowtimePublished { showtime } => {
                    showtimes.insert(showtime.id.clone(), showtime.clone());
                }
                LedgerEventKind::SeatsTransitioned {
                    seats,
                    from,
                    to,
                    hold: Some(hold_id),
                    booking,
                    expires_at,
                } => match (from, to) {
                    (SeatState::Free, SeatState::Held) => {
                        let expires_at = expires_at
                            .or_else(|| event.recorded_at.checked_add_signed(self.default_ttl))
                            .unwrap_or(event.recorded_at);
                        holds.insert(
                            *hold_id,
                            Hold {
                                id: *hold_id,
                                showtime: event.showtime.clone(),
                                seats: seats.clone(),
                                customer: CustomerId::new(event.actor.as_str()),
                                created_at: event.recorded_at,
                                expires_at,
                                status: HoldStatus::Active,
                                booking: None,
                            },
                        );
                    }
                    (SeatState::Held, SeatState::Booked) => {
                        let (Some(hold), Some(booking_id)) = (holds.get_mut(hold_id), booking)
                        else {
                            warn!(sequence = event.sequence, hold = %hold_id, "confirmation of unknown hold in ledger");
                            continue;
                        };
                        hold.status = HoldStatus::Confirmed;
                        hold.booking = Some(*booking_id);
                        let total = showtimes
                            .get(&event.showtime)
                            .map(|showtime| seat_total(showtime, seats))
                            .unwrap_or_default();
                        bookings.insert(
                            *booking_id,
                            Booking {
                                id: *booking_id,
                                hold: *hold_id,
                                showtime: event.showtime.clone(),
                                seats: seats.clone(),
                                customer: hold.customer.clone(),
                                total,
                                created_at: event.recorded_at,
                                cancelled_at: None,
                            },
                        );
                    }
                    (SeatState::Held, SeatState::Free) => {
                        if let Some(hold) = holds.get_mut(hold_id) {
                            hold.status = if event.actor.as_str() == ActorId::EXPIRY {
                                HoldStatus::Expired
                            } else {
                                HoldStatus::Released
                            };
                        }
                    }
                    _ => {}
                },
                LedgerEventKind::BookingCancelled { booking } => {
                    if let Some(booking) = bookings.get_mut(booking) {
                        booking.cancelled_at = Some(event.recorded_at);
                    }
                }
                _ => {}
            }
        }

        info!(holds = holds.len(), bookings = bookings.len(), "holds restored");
        *write(&self.holds) = holds
            .into_iter()
            .map(|(id, hold)| (id, Arc::new(Mutex::new(hold))))
            .collect();
        *write(&self.bookings) = bookings
            .into_iter()
            .map(|(id, booking)| (id, Arc::new(Mutex::new(booking))))
            .collect();
        Ok(())
    }

    /// Releases a locked hold if its expiry has passed. Returns whether it did.
    pub async fn expire_locked(&self, hold: &mut Hold) -> Result<bool> {
        if !hold.is_active() || !is_expired(hold, self.clock.now()) {
            return Ok(false);
        }
        self.release_locked(hold, &ActorId::expiry(), HoldStatus::Expired)
            .await?;
        Ok(true)
    }

    async fn release_locked(&self, hold: &mut Hold, actor: &ActorId, status: HoldStatus) -> Result<()> {
        let request = TransitionRequest::new(
            hold.showtime.clone(),
            hold.seats.clone(),
            SeatState::Held,
            SeatState::Free,
            actor.clone(),
        )
        .with_hold(hold.id);
        self.inventory.try_transition(request).await?;

        hold.status = status;
        info!(hold = %hold.id, showtime = %hold.showtime, actor = %actor, ?status, "hold released");
        Ok(())
    }

    async fn booking_of(&self, hold: &Hold) -> Result<Booking> {
        let booking_id = hold
            .booking
            .ok_or_else(|| BookingError::internal(format!("Confirmed hold {} has no booking", hold.id)))?;
        self.booking(booking_id).await
    }

    /// Whether every seat of the booking is still `Booked` under it.
    async fn still_booked(&self, booking: &Booking) -> Result<bool> {
        let slots = self.inventory.slots(&booking.showtime).await?;
        Ok(booking.seats.iter().all(|seat| {
            slots.get(seat).is_some_and(|slot| {
                slot.state == SeatState::Booked && slot.booking == Some(booking.id)
            })
        }))
    }

    fn hold_entry(&self, hold_id: HoldId) -> Result<Arc<Mutex<Hold>>> {
        read(&self.holds)
            .get(&hold_id)
            .cloned()
            .ok_or(BookingError::HoldNotFound(hold_id))
    }

    fn booking_entry(&self, booking_id: BookingId) -> Result<Arc<Mutex<Booking>>> {
        read(&self.bookings)
            .get(&booking_id)
            .cloned()
            .ok_or(BookingError::BookingNotFound(booking_id))
    }
}

fn read<K, V>(registry: &Registry<K, V>) -> std::sync::RwLockReadGuard<'_, HashMap<K, Arc<Mutex<V>>>> {
    registry.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<K, V>(registry: &Registry<K, V>) -> std::sync::RwLockWriteGuard<'_, HashMap<K, Arc<Mutex<V>>>> {
    registry.write().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn seat_total(showtime: &Showtime, seats: &[SeatId]) -> Decimal {
    seats
        .iter()
        .filter_map(|seat| showtime.seat(seat))
        .map(|seat| seat.price)
        .sum()
}
