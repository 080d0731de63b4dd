use super::hold::HoldId;
use super::identity::CustomerId;
use super::showtime::{SeatId, ShowtimeId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

uuid_id!(
    /// Identifier of a confirmed booking.
    BookingId
);

/// A confirmed purchase of specific seats.
///
/// Immutable once created apart from the cancellation timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Booking {
    pub id: BookingId,
    pub hold: HoldId,
    pub showtime: ShowtimeId,
    pub seats: Vec<SeatId>,
    pub customer: CustomerId,
    pub total: Decimal,
    pub created_at: DateTime<Utc>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl Booking {
    pub fn is_cancelled(&self) -> bool {
        self.cancelled_at.is_some()
    }
}
