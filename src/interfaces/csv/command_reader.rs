use crate::domain::showtime::{SeatId, ShowtimeId};
use crate::error::{BookingError, Result};
use chrono::Duration;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Read;

#[derive(Debug, Deserialize, PartialEq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum CommandType {
    Open,
    Select,
    Confirm,
    Release,
    Cancel,
    Close,
    Advance,
}

/// One raw CSV row: `command, showtime, customer, reference, seats, value`.
#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct CommandRecord {
    pub command: CommandType,
    #[serde(default)]
    pub showtime: Option<String>,
    #[serde(default)]
    pub customer: Option<String>,
    #[serde(default)]
    pub reference: Option<String>,
    #[serde(default)]
    pub seats: Option<String>,
    #[serde(default)]
    pub value: Option<String>,
}

/// A validated booking command.
///
/// `reference` is a caller-chosen alias naming a hold (and the booking it
/// becomes) so later rows can refer back to it.
#[derive(Debug, PartialEq, Clone)]
pub enum BookingCommand {
    Open {
        showtime: ShowtimeId,
        admin: String,
        movie: Option<String>,
        seats: Vec<SeatId>,
        price: Decimal,
    },
    Select {
        showtime: ShowtimeId,
        customer: String,
        reference: String,
        seats: Vec<SeatId>,
        ttl: Option<Duration>,
    },
    Confirm {
        customer: String,
        reference: String,
        token: String,
    },
    Release {
        customer: String,
        reference: String,
    },
    Cancel {
        customer: String,
        reference: String,
    },
    Close {
        showtime: ShowtimeId,
        admin: String,
    },
    Advance {
        by: Duration,
    },
}

impl TryFrom<CommandRecord> for BookingCommand {
    type Error = BookingError;

    fn try_from(record: CommandRecord) -> Result<Self> {
        let command = match record.command {
            CommandType::Open => BookingCommand::Open {
                showtime: ShowtimeId::new(required(record.showtime, "showtime")?),
                admin: required(record.customer, "customer")?,
                movie: non_empty(record.reference),
                seats: seat_list(record.seats)?,
                price: required(record.value, "value")?
                    .parse::<Decimal>()
                    .map_err(|e| BookingError::ValidationError(format!("Invalid price: {e}")))?,
            },
            CommandType::Select => BookingCommand::Select {
                showtime: ShowtimeId::new(required(record.showtime, "showtime")?),
                customer: required(record.customer, "customer")?,
                reference: required(record.reference, "reference")?,
                seats: seat_list(record.seats)?,
                ttl: non_empty(record.value).map(|v| seconds(&v)).transpose()?,
            },
            CommandType::Confirm => BookingCommand::Confirm {
                customer: required(record.customer, "customer")?,
                reference: required(record.reference, "reference")?,
                token: required(record.value, "value")?,
            },
            CommandType::Release => BookingCommand::Release {
                customer: required(record.customer, "customer")?,
                reference: required(record.reference, "reference")?,
            },
            CommandType::Cancel => BookingCommand::Cancel {
                customer: required(record.customer, "customer")?,
                reference: required(record.reference, "reference")?,
            },
            CommandType::Close => BookingCommand::Close {
                showtime: ShowtimeId::new(required(record.showtime, "showtime")?),
                admin: required(record.customer, "customer")?,
            },
            CommandType::Advance => BookingCommand::Advance {
                by: seconds(&required(record.value, "value")?)?,
            },
        };
        Ok(command)
    }
}

fn non_empty(field: Option<String>) -> Option<String> {
    field.filter(|value| !value.is_empty())
}

fn required(field: Option<String>, name: &str) -> Result<String> {
    non_empty(field).ok_or_else(|| BookingError::ValidationError(format!("Missing {name}")))
}

/// Seats are separated by spaces or semicolons, e.g. `A1 A2` or `A1;A2`.
fn seat_list(field: Option<String>) -> Result<Vec<SeatId>> {
    let seats: Vec<SeatId> = required(field, "seats")?
        .split([' ', ';'])
        .filter(|label| !label.is_empty())
        .map(SeatId::from)
        .collect();
    Ok(seats)
}

fn seconds(value: &str) -> Result<Duration> {
    value
        .parse::<u64>()
        .ok()
        .and_then(|secs| i64::try_from(secs).ok())
        .and_then(Duration::try_seconds)
        .ok_or_else(|| BookingError::ValidationError(format!("Invalid number of seconds: {value}")))
}

/// Reads booking commands from a CSV source.
///
/// Wraps `csv::Reader` with whitespace trimming and flexible record lengths,
/// so trailing empty columns may be omitted.
pub struct CommandReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> CommandReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Lazily reads and validates commands, one result per row.
    pub fn commands(self) -> impl Iterator<Item = Result<BookingCommand>> {
        self.reader
            .into_deserialize::<CommandRecord>()
            .map(|result| result.map_err(BookingError::from).and_then(BookingCommand::try_from))
    }
}
