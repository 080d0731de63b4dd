use crate::domain::booking::BookingId;
use crate::domain::hold::HoldId;
use crate::domain::showtime::{SeatId, SeatState, ShowtimeId};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, BookingError>;

#[derive(Error, Debug)]
pub enum BookingError {
    #[error("Seats unavailable for showtime {showtime}: {}", format_seats(.seats))]
    SeatsUnavailable {
        showtime: ShowtimeId,
        seats: Vec<SeatId>,
    },
    #[error("Hold expired: {0}")]
    HoldExpired(HoldId),
    #[error("Hold not found: {0}")]
    HoldNotFound(HoldId),
    #[error("Booking not found: {0}")]
    BookingNotFound(BookingId),
    #[error("Showtime not found: {0}")]
    ShowtimeNotFound(ShowtimeId),
    #[error("Invalid seat transition {from} -> {to}")]
    InvalidTransition { from: SeatState, to: SeatState },
    #[error("Payment failed: {0}")]
    PaymentFailed(String),
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("Validation error: {0}")]
    ValidationError(String),
    /// Transient ledger failure; the append may be retried.
    #[error("Ledger unavailable: {0}")]
    LedgerUnavailable(String),
    #[error("Internal error: {0}")]
    InternalError(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[cfg(feature = "storage-rocksdb")]
    #[error("Storage error: {0}")]
    StorageError(#[from] rocksdb::Error),
}

/// Coarse classification consumed by the API layer to pick a response status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Conflict,
    Gone,
    NotFound,
    Forbidden,
    PaymentRequired,
    Invalid,
    Internal,
}

impl BookingError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BookingError::SeatsUnavailable { .. } => ErrorKind::Conflict,
            BookingError::HoldExpired(_) => ErrorKind::Gone,
            BookingError::HoldNotFound(_)
            | BookingError::BookingNotFound(_)
            | BookingError::ShowtimeNotFound(_) => ErrorKind::NotFound,
            BookingError::Unauthorized(_) => ErrorKind::Forbidden,
            BookingError::PaymentFailed(_) => ErrorKind::PaymentRequired,
            BookingError::ValidationError(_) | BookingError::InvalidTransition { .. } => {
                ErrorKind::Invalid
            }
            _ => ErrorKind::Internal,
        }
    }

    /// Only transient ledger failures are worth retrying.
    pub fn is_transient(&self) -> bool {
        matches!(self, BookingError::LedgerUnavailable(_))
    }

    pub(crate) fn internal(message: impl Into<String>) -> Self {
        BookingError::InternalError(Box::new(std::io::Error::other(message.into())))
    }
}

fn format_seats(seats: &[SeatId]) -> String {
    let labels: Vec<&str> = seats.iter().map(SeatId::as_str).collect();
    format!("[{}]", labels.join(", "))
}
