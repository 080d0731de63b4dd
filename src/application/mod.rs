//! Application layer: the booking core.
//!
//! Leaf first, [`ledger::ReservationLedger`] stamps and persists events,
//! [`inventory::SeatInventory`] owns per-showtime seat state,
//! [`holds::HoldManager`] owns holds and bookings, and
//! [`booking::BookingService`] is the entry point the API layer talks to.
//! Every component is shared behind `Arc` and safe to call from many tokio
//! tasks at once.

pub mod booking;
pub mod holds;
pub mod inventory;
pub mod ledger;
pub mod sweeper;
