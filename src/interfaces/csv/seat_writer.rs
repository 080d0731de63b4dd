use crate::domain::showtime::{SeatId, SeatState, ShowtimeId};
use crate::error::Result;
use serde::Serialize;
use std::io::Write;

/// One output row of the final seat map.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct SeatRow {
    pub showtime: ShowtimeId,
    pub seat: SeatId,
    pub state: SeatState,
}

/// Writes seat rows as `showtime,seat,state` CSV.
pub struct SeatWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> SeatWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    /// Writes the rows sorted by showtime, then seat label.
    pub fn write_seats(&mut self, mut rows: Vec<SeatRow>) -> Result<()> {
        rows.sort();
        for row in rows {
            self.writer.serialize(row)?;
        }
        self.writer.flush()?;
        Ok(())
    }
}
