use super::booking::BookingId;
use super::hold::HoldId;
use super::identity::ActorId;
use super::showtime::{SeatId, SeatState, Showtime, ShowtimeId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single append-only ledger record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEvent {
    pub sequence: u64,
    pub recorded_at: DateTime<Utc>,
    pub showtime: ShowtimeId,
    pub actor: ActorId,
    pub kind: LedgerEventKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LedgerEventKind {
    ShowtimePublished {
        showtime: Showtime,
    },
    ShowtimeCancelled,
    SeatsTransitioned {
        seats: Vec<SeatId>,
        from: SeatState,
        to: SeatState,
        hold: Option<HoldId>,
        booking: Option<BookingId>,
        /// Hold expiry, recorded on `Free -> Held`.
        expires_at: Option<DateTime<Utc>>,
    },
    BookingCancelled {
        booking: BookingId,
    },
    /// A rejected transition attempt. Audit only, never replayed.
    IntegrityViolation {
        seats: Vec<SeatId>,
        from: SeatState,
        to: SeatState,
        reason: String,
    },
}

impl LedgerEventKind {
    pub fn name(&self) -> &'static str {
        match self {
            LedgerEventKind::ShowtimePublished { .. } => "showtime_published",
            LedgerEventKind::ShowtimeCancelled => "showtime_cancelled",
            LedgerEventKind::SeatsTransitioned { .. } => "seats_transitioned",
            LedgerEventKind::BookingCancelled { .. } => "booking_cancelled",
            LedgerEventKind::IntegrityViolation { .. } => "integrity_violation",
        }
    }
}
