use super::booking::BookingId;
use super::identity::CustomerId;
use super::showtime::{SeatId, ShowtimeId};
use crate::error::{BookingError, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

uuid_id!(
    /// Identifier of a seat hold.
    HoldId
);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HoldStatus {
    Active,
    Confirmed,
    Released,
    Expired,
}

/// A temporary, exclusive claim on a set of seats pending payment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hold {
    pub id: HoldId,
    pub showtime: ShowtimeId,
    pub seats: Vec<SeatId>,
    pub customer: CustomerId,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub status: HoldStatus,
    /// Set once the hold has been converted into a booking.
    pub booking: Option<BookingId>,
}

impl Hold {
    /// Fails if `now + ttl` is not a representable instant.
    pub fn new(
        showtime: ShowtimeId,
        seats: Vec<SeatId>,
        customer: CustomerId,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Result<Self> {
        let expires_at = now.checked_add_signed(ttl).ok_or_else(|| {
            BookingError::ValidationError(format!(
                "Hold TTL out of range: {}s",
                ttl.num_seconds()
            ))
        })?;
        Ok(Self {
            id: HoldId::new(),
            showtime,
            seats,
            customer,
            created_at: now,
            expires_at,
            status: HoldStatus::Active,
            booking: None,
        })
    }

    pub fn is_active(&self) -> bool {
        self.status == HoldStatus::Active
    }
}

/// A hold is expired from its expiry instant onwards, regardless of whether
/// anything has released its seats yet.
pub fn is_expired(hold: &Hold, now: DateTime<Utc>) -> bool {
    now >= hold.expires_at
}
