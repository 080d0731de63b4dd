#![allow(dead_code)]

use async_trait::async_trait;
use boxoffice::application::booking::BookingService;
use boxoffice::config::BookingConfig;
use boxoffice::domain::identity::Identity;
use boxoffice::domain::ledger::LedgerEvent;
use boxoffice::domain::ports::{LedgerStore, LedgerStoreBox, PaymentGatewayRef};
use boxoffice::domain::showtime::SeatState;
use boxoffice::error::{BookingError, Result as BookingResult};
use boxoffice::domain::showtime::{MovieId, ScreenId, Seat, SeatId, Showtime, ShowtimeId};
use boxoffice::infrastructure::clock::ManualClock;
use boxoffice::infrastructure::in_memory::InMemoryLedgerStore;
use boxoffice::infrastructure::payment::TokenPaymentGateway;
use chrono::Utc;
use rust_decimal::Decimal;
use std::fs::File;
use std::io::Error;
use std::path::Path;
use std::sync::{Arc, Mutex};

pub struct Harness {
    pub service: Arc<BookingService>,
    pub clock: ManualClock,
    pub store: InMemoryLedgerStore,
}

pub fn test_config() -> BookingConfig {
    BookingConfig {
        ledger_retry_backoff_ms: 1,
        ..BookingConfig::default()
    }
}

pub async fn harness() -> Harness {
    harness_with(test_config()).await
}

pub async fn harness_with(config: BookingConfig) -> Harness {
    reopen(config, InMemoryLedgerStore::new(), ManualClock::new(Utc::now())).await
}

/// Opens a service over an existing ledger, replaying what it holds.
pub async fn reopen(config: BookingConfig, store: InMemoryLedgerStore, clock: ManualClock) -> Harness {
    let service = service_over(
        config,
        Box::new(store.clone()),
        Arc::new(TokenPaymentGateway::new()),
        &clock,
    )
    .await;
    Harness {
        service,
        clock,
        store,
    }
}

pub async fn service_over(
    config: BookingConfig,
    store: LedgerStoreBox,
    payments: PaymentGatewayRef,
    clock: &ManualClock,
) -> Arc<BookingService> {
    let service = BookingService::open(config, store, payments, Arc::new(clock.clone()))
        .await
        .unwrap();
    Arc::new(service)
}

/// A ledger store that starts refusing appends once its budget runs out.
///
/// Clones share the budget and the underlying events.
#[derive(Clone, Default)]
pub struct FailingStore {
    pub inner: InMemoryLedgerStore,
    budget: Arc<Mutex<Option<usize>>>,
}

impl FailingStore {
    /// Lets `appends` more appends through, then fails every one after.
    pub fn fail_after(&self, appends: usize) {
        *self.budget.lock().unwrap() = Some(appends);
    }

    pub fn heal(&self) {
        *self.budget.lock().unwrap() = None;
    }
}

#[async_trait]
impl LedgerStore for FailingStore {
    async fn append(&self, event: LedgerEvent) -> BookingResult<()> {
        {
            let mut budget = self.budget.lock().unwrap();
            match budget.as_mut() {
                Some(0) => {
                    return Err(BookingError::IoError(std::io::Error::other("disk full")));
                }
                Some(remaining) => *remaining -= 1,
                None => {}
            }
        }
        self.inner.append(event).await
    }

    async fn events(&self) -> BookingResult<Vec<LedgerEvent>> {
        self.inner.events().await
    }

    async fn last_sequence(&self) -> BookingResult<Option<u64>> {
        self.inner.last_sequence().await
    }
}

pub async fn state_of(service: &BookingService, showtime: &str, seat: &str) -> SeatState {
    service.availability(&ShowtimeId::from(showtime)).await.unwrap()[&SeatId::from(seat)]
}

pub async fn publish(service: &BookingService, id: &str, labels: &[&str], price: Decimal) {
    let seats = labels
        .iter()
        .map(|label| Seat::from_label(label, price).unwrap())
        .collect();
    let showtime = Showtime::new(
        ShowtimeId::from(id),
        MovieId::from("M1"),
        ScreenId::from("1"),
        Utc::now(),
        seats,
    );
    service
        .publish_showtime(showtime, &Identity::admin("ops"))
        .await
        .unwrap();
}

pub fn seats(labels: &[&str]) -> Vec<SeatId> {
    labels.iter().map(|label| SeatId::from(*label)).collect()
}

/// Writes a command stream opening `showtimes` showtimes of ten seats each,
/// then having every customer hold and pay for one seat per showtime.
pub fn generate_commands_csv(path: &Path, showtimes: usize, customers: usize) -> Result<(), Error> {
    let file = File::create(path)?;
    let mut wtr = csv::WriterBuilder::new().from_writer(file);

    wtr.write_record(["command", "showtime", "customer", "reference", "seats", "value"])?;

    let labels: Vec<String> = (1..=10).map(|n| format!("A{n}")).collect();
    for s in 1..=showtimes {
        let showtime = format!("S{s}");
        let seat_map = labels.join(" ");
        wtr.write_record(["open", showtime.as_str(), "ops", "M1", seat_map.as_str(), "10.00"])?;
        for c in 1..=customers {
            let customer = format!("C{c}");
            let reference = format!("h{s}-{c}");
            let seat = labels[(c - 1) % labels.len()].as_str();
            wtr.write_record([
                "select",
                showtime.as_str(),
                customer.as_str(),
                reference.as_str(),
                seat,
                "",
            ])?;
            wtr.write_record(["confirm", "", customer.as_str(), reference.as_str(), "", "tok_ok"])?;
        }
    }

    wtr.flush()?;
    Ok(())
}
