use crate::error::{BookingError, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

label_id!(
    /// Identifier of a scheduled screening.
    ShowtimeId
);
label_id!(
    /// Seat label within a showtime's seat map, e.g. `A1`.
    SeatId
);
label_id!(MovieId);
label_id!(ScreenId);

/// Availability of a single seat.
///
/// Allowed transitions are `Free -> Held`, `Held -> Booked`, `Held -> Free`
/// and, only through the refund path, `Booked -> Free`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeatState {
    Free,
    Held,
    Booked,
}

impl SeatState {
    pub fn can_transition_to(self, to: SeatState) -> bool {
        matches!(
            (self, to),
            (SeatState::Free, SeatState::Held)
                | (SeatState::Held, SeatState::Booked)
                | (SeatState::Held, SeatState::Free)
                | (SeatState::Booked, SeatState::Free)
        )
    }
}

impl fmt::Display for SeatState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SeatState::Free => "free",
            SeatState::Held => "held",
            SeatState::Booked => "booked",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Seat {
    pub id: SeatId,
    pub row: String,
    pub number: u16,
    pub price: Decimal,
}

impl Seat {
    /// Builds a seat from a label such as `A12`: leading letters are the row,
    /// trailing digits the number.
    pub fn from_label(label: &str, price: Decimal) -> Result<Self> {
        let split = label
            .find(|c: char| c.is_ascii_digit())
            .ok_or_else(|| BookingError::ValidationError(format!("Seat label has no number: {label}")))?;
        let (row, number) = label.split_at(split);
        if row.is_empty() {
            return Err(BookingError::ValidationError(format!(
                "Seat label has no row: {label}"
            )));
        }
        let number = number
            .parse::<u16>()
            .map_err(|_| BookingError::ValidationError(format!("Invalid seat number: {label}")))?;

        Ok(Self {
            id: SeatId::from(label),
            row: row.to_string(),
            number,
            price,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShowtimeStatus {
    Scheduled,
    Cancelled,
}

/// A scheduled screening together with its own seat map.
///
/// Seat maps are never shared between showtimes, each one tracks availability
/// independently.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Showtime {
    pub id: ShowtimeId,
    pub movie: MovieId,
    pub screen: ScreenId,
    pub starts_at: DateTime<Utc>,
    pub seats: Vec<Seat>,
    pub status: ShowtimeStatus,
}

impl Showtime {
    pub fn new(
        id: ShowtimeId,
        movie: MovieId,
        screen: ScreenId,
        starts_at: DateTime<Utc>,
        seats: Vec<Seat>,
    ) -> Self {
        Self {
            id,
            movie,
            screen,
            starts_at,
            seats,
            status: ShowtimeStatus::Scheduled,
        }
    }

    /// Rejects empty seat maps and duplicate seat labels.
    pub fn validate(&self) -> Result<()> {
        if self.seats.is_empty() {
            return Err(BookingError::ValidationError(format!(
                "Showtime {} has no seats",
                self.id
            )));
        }
        let mut seen = HashSet::new();
        for seat in &self.seats {
            if !seen.insert(&seat.id) {
                return Err(BookingError::ValidationError(format!(
                    "Duplicate seat {} in showtime {}",
                    seat.id, self.id
                )));
            }
        }
        Ok(())
    }

    pub fn is_cancelled(&self) -> bool {
        self.status == ShowtimeStatus::Cancelled
    }

    pub fn seat(&self, id: &SeatId) -> Option<&Seat> {
        self.seats.iter().find(|seat| &seat.id == id)
    }
}
