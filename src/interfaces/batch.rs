use super::csv::command_reader::BookingCommand;
use super::csv::seat_writer::SeatRow;
use crate::application::booking::BookingService;
use crate::domain::booking::BookingId;
use crate::domain::hold::HoldId;
use crate::domain::identity::Identity;
use crate::domain::ports::{Clock, PaymentToken};
use crate::domain::showtime::{MovieId, ScreenId, Seat, Showtime};
use crate::error::{BookingError, Result};
use crate::infrastructure::clock::ManualClock;
use std::collections::HashMap;
use tracing::debug;

/// Drives a [`BookingService`] from a stream of [`BookingCommand`]s.
///
/// Rows name holds by a caller-chosen reference; the runner keeps the mapping
/// from reference to hold and booking ids. Time only moves on `advance`.
pub struct CommandRunner {
    service: BookingService,
    clock: ManualClock,
    holds: HashMap<String, HoldId>,
    bookings: HashMap<String, BookingId>,
}

impl CommandRunner {
    /// `clock` must be the same clock the service was opened with.
    pub fn new(service: BookingService, clock: ManualClock) -> Self {
        Self {
            service,
            clock,
            holds: HashMap::new(),
            bookings: HashMap::new(),
        }
    }

    pub async fn execute(&mut self, command: BookingCommand) -> Result<()> {
        debug!(?command, "executing command");
        match command {
            BookingCommand::Open {
                showtime,
                admin,
                movie,
                seats,
                price,
            } => {
                let seats = seats
                    .iter()
                    .map(|seat| Seat::from_label(seat.as_str(), price))
                    .collect::<Result<Vec<_>>>()?;
                let movie = MovieId::new(movie.unwrap_or_else(|| showtime.to_string()));
                let screen = ScreenId::new(format!("screen-{showtime}"));
                let showtime = Showtime::new(showtime, movie, screen, self.clock.now(), seats);
                self.service
                    .publish_showtime(showtime, &Identity::admin(admin))
                    .await
            }
            BookingCommand::Select {
                showtime,
                customer,
                reference,
                seats,
                ttl,
            } => {
                if self.holds.contains_key(&reference) {
                    return Err(BookingError::ValidationError(format!(
                        "Reference already in use: {reference}"
                    )));
                }
                let hold = self
                    .service
                    .select_seats_with_ttl(&showtime, seats, &Identity::customer(customer), ttl)
                    .await?;
                self.holds.insert(reference, hold.id);
                Ok(())
            }
            BookingCommand::Confirm {
                customer,
                reference,
                token,
            } => {
                let hold = self.hold_ref(&reference)?;
                let booking = self
                    .service
                    .confirm_payment(hold, &PaymentToken(token), &Identity::customer(customer))
                    .await?;
                self.bookings.insert(reference, booking.id);
                Ok(())
            }
            BookingCommand::Release {
                customer,
                reference,
            } => {
                let hold = self.hold_ref(&reference)?;
                self.service
                    .release_seats(hold, &Identity::customer(customer))
                    .await
            }
            BookingCommand::Cancel {
                customer,
                reference,
            } => {
                let booking = self.bookings.get(&reference).copied().ok_or_else(|| {
                    BookingError::ValidationError(format!("Unknown booking reference: {reference}"))
                })?;
                self.service
                    .cancel_booking(booking, &Identity::customer(customer))
                    .await
                    .map(|_| ())
            }
            BookingCommand::Close { showtime, admin } => {
                self.service
                    .cancel_showtime(&showtime, &Identity::admin(admin))
                    .await
            }
            BookingCommand::Advance { by } => {
                self.clock.advance(by);
                Ok(())
            }
        }
    }

    /// Current state of every seat of every showtime.
    pub async fn seat_map(&self) -> Result<Vec<SeatRow>> {
        let mut rows = Vec::new();
        for showtime in self.service.showtimes().await {
            let seats = self.service.availability(&showtime).await?;
            rows.extend(seats.into_iter().map(|(seat, state)| SeatRow {
                showtime: showtime.clone(),
                seat,
                state,
            }));
        }
        Ok(rows)
    }

    pub fn service(&self) -> &BookingService {
        &self.service
    }

    fn hold_ref(&self, reference: &str) -> Result<HoldId> {
        self.holds.get(reference).copied().ok_or_else(|| {
            BookingError::ValidationError(format!("Unknown hold reference: {reference}"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BookingConfig;
    use crate::domain::showtime::{SeatId, SeatState, ShowtimeId};
    use crate::infrastructure::in_memory::InMemoryLedgerStore;
    use crate::infrastructure::payment::TokenPaymentGateway;
    use crate::interfaces::csv::command_reader::CommandReader;
    use std::sync::Arc;

    async fn runner() -> CommandRunner {
        let clock = ManualClock::default();
        let service = BookingService::open(
            BookingConfig::default(),
            Box::new(InMemoryLedgerStore::new()),
            Arc::new(TokenPaymentGateway::new()),
            Arc::new(clock.clone()),
        )
        .await
        .unwrap();
        CommandRunner::new(service, clock)
    }

    async fn run(runner: &mut CommandRunner, rows: &str) -> Vec<Result<()>> {
        let data = format!("command, showtime, customer, reference, seats, value\n{rows}");
        let mut results = Vec::new();
        for command in CommandReader::new(data.as_bytes()).commands() {
            results.push(match command {
                Ok(command) => runner.execute(command).await,
                Err(e) => Err(e),
            });
        }
        results
    }

    fn state_of(rows: &[SeatRow], seat: &str) -> SeatState {
        rows.iter()
            .find(|row| row.seat == SeatId::from(seat))
            .map(|row| row.state)
            .unwrap()
    }

    #[tokio::test]
    async fn test_scenario_from_csv() {
        let mut runner = runner().await;
        let results = run(
            &mut runner,
            "open, S1, admin, M1, A1 A2 A3, 12.50\n\
             select, S1, C1, h1, A1 A2\n\
             select, S1, C2, h2, A2 A3\n\
             select, S1, C3, h3, A3\n\
             confirm, , C1, h1, , tok_ok",
        )
        .await;

        assert!(results[0].is_ok());
        assert!(results[1].is_ok());
        assert!(matches!(
            results[2],
            Err(BookingError::SeatsUnavailable { .. })
        ));
        assert!(results[3].is_ok());
        assert!(results[4].is_ok());

        let rows = runner.seat_map().await.unwrap();
        assert_eq!(rows.len(), 3);
        assert!(rows.iter().all(|row| row.showtime == ShowtimeId::from("S1")));
        assert_eq!(state_of(&rows, "A1"), SeatState::Booked);
        assert_eq!(state_of(&rows, "A2"), SeatState::Booked);
        assert_eq!(state_of(&rows, "A3"), SeatState::Held);
    }

    #[tokio::test]
    async fn test_advance_expires_holds() {
        let mut runner = runner().await;
        let results = run(
            &mut runner,
            "open, S1, admin, , A1, 9.00\n\
             select, S1, C1, h1, A1, 60\n\
             advance, , , , , 61\n\
             confirm, , C1, h1, , tok_ok",
        )
        .await;

        assert!(matches!(results[3], Err(BookingError::HoldExpired(_))));
        let rows = runner.seat_map().await.unwrap();
        assert_eq!(state_of(&rows, "A1"), SeatState::Free);
    }

    #[tokio::test]
    async fn test_unknown_reference_is_rejected() {
        let mut runner = runner().await;
        let results = run(&mut runner, "release, , C1, nope").await;
        assert!(matches!(results[0], Err(BookingError::ValidationError(_))));
    }
}
