use async_trait::async_trait;
use boxoffice::application::booking::BookingService;
use boxoffice::config::BookingConfig;
use boxoffice::domain::hold::HoldStatus;
use boxoffice::domain::identity::Identity;
use boxoffice::domain::ledger::{LedgerEvent, LedgerEventKind};
use boxoffice::domain::ports::{LedgerStore, PaymentToken};
use boxoffice::domain::showtime::{SeatState, ShowtimeId};
use boxoffice::error::{BookingError, Result};
use boxoffice::infrastructure::clock::ManualClock;
use boxoffice::infrastructure::in_memory::InMemoryLedgerStore;
use boxoffice::infrastructure::payment::TokenPaymentGateway;
use chrono::{Duration, Utc};
use rust_decimal_macros::dec;
use std::sync::Arc;

mod common;
use common::{FailingStore, publish, seats, service_over, state_of, test_config};

fn s1() -> ShowtimeId {
    ShowtimeId::from("S1")
}

async fn service_on(config: BookingConfig, store: &FailingStore) -> (Arc<BookingService>, ManualClock) {
    let clock = ManualClock::new(Utc::now());
    let service = service_over(
        config,
        Box::new(store.clone()),
        Arc::new(TokenPaymentGateway::new()),
        &clock,
    )
    .await;
    (service, clock)
}

#[tokio::test]
async fn test_failed_append_leaves_seats_free() {
    let store = FailingStore::default();
    let (service, _clock) = service_on(test_config(), &store).await;
    publish(&service, "S1", &["A1", "A2"], dec!(9.00)).await;

    store.fail_after(0);
    let result = service
        .select_seats(&s1(), seats(&["A1", "A2"]), &Identity::customer("C1"))
        .await;

    assert!(matches!(result, Err(BookingError::IoError(_))));
    assert_eq!(state_of(&service, "S1", "A1").await, SeatState::Free);
    assert_eq!(state_of(&service, "S1", "A2").await, SeatState::Free);
    assert_eq!(service.audit_log().await.unwrap().len(), 1);

    store.heal();
    assert!(
        service
            .select_seats(&s1(), seats(&["A1", "A2"]), &Identity::customer("C2"))
            .await
            .is_ok()
    );
}

#[tokio::test]
async fn test_failed_confirmation_append_keeps_hold_active() {
    let store = FailingStore::default();
    let (service, _clock) = service_on(test_config(), &store).await;
    publish(&service, "S1", &["A1"], dec!(9.00)).await;
    let c1 = Identity::customer("C1");
    let hold = service.select_seats(&s1(), seats(&["A1"]), &c1).await.unwrap();

    store.fail_after(0);
    let result = service
        .confirm_payment(hold.id, &PaymentToken::from("tok_ok"), &c1)
        .await;

    assert!(matches!(result, Err(BookingError::IoError(_))));
    assert_eq!(state_of(&service, "S1", "A1").await, SeatState::Held);
    assert_eq!(
        service.holds().hold(hold.id).await.unwrap().status,
        HoldStatus::Active
    );

    store.heal();
    let booking = service
        .confirm_payment(hold.id, &PaymentToken::from("tok_ok"), &c1)
        .await
        .unwrap();
    assert_eq!(booking.hold, hold.id);
    assert_eq!(state_of(&service, "S1", "A1").await, SeatState::Booked);
}

#[tokio::test]
async fn test_cancel_retry_finishes_interrupted_release() {
    let config = BookingConfig {
        release_on_cancel: true,
        ..test_config()
    };
    let store = FailingStore::default();
    let (service, clock) = service_on(config.clone(), &store).await;
    publish(&service, "S1", &["A1"], dec!(9.00)).await;
    let c1 = Identity::customer("C1");
    let hold = service.select_seats(&s1(), seats(&["A1"]), &c1).await.unwrap();
    let booking = service
        .confirm_payment(hold.id, &PaymentToken::from("tok_ok"), &c1)
        .await
        .unwrap();

    // The cancellation lands, the seat release does not.
    store.fail_after(1);
    assert!(service.cancel_booking(booking.id, &c1).await.is_err());
    assert!(service.booking(booking.id).await.unwrap().is_cancelled());
    assert_eq!(state_of(&service, "S1", "A1").await, SeatState::Booked);

    store.heal();
    let cancelled = service.cancel_booking(booking.id, &c1).await.unwrap();
    assert!(cancelled.is_cancelled());
    assert_eq!(state_of(&service, "S1", "A1").await, SeatState::Free);
    service.cancel_booking(booking.id, &c1).await.unwrap();

    let cancellations = service
        .audit_log()
        .await
        .unwrap()
        .into_iter()
        .filter(|event| matches!(event.kind, LedgerEventKind::BookingCancelled { .. }))
        .count();
    assert_eq!(cancellations, 1);

    let recovered = service_over(
        config,
        Box::new(store.inner.clone()),
        Arc::new(TokenPaymentGateway::new()),
        &clock,
    )
    .await;
    assert_eq!(state_of(&recovered, "S1", "A1").await, SeatState::Free);
    assert!(recovered.booking(booking.id).await.unwrap().is_cancelled());
}

#[tokio::test]
async fn test_unrepresentable_ttls_are_rejected() {
    let opened = BookingService::open(
        BookingConfig {
            hold_ttl_secs: u64::MAX,
            ..test_config()
        },
        Box::new(InMemoryLedgerStore::new()),
        Arc::new(TokenPaymentGateway::new()),
        Arc::new(ManualClock::new(Utc::now())),
    )
    .await;
    assert!(matches!(opened, Err(BookingError::ValidationError(_))));

    // Representable as a duration but not once added to the current time.
    let store = FailingStore::default();
    let (service, _clock) = service_on(
        BookingConfig {
            hold_ttl_secs: 1_000_000_000_000_000,
            ..test_config()
        },
        &store,
    )
    .await;
    publish(&service, "S1", &["A1"], dec!(9.00)).await;
    let c1 = Identity::customer("C1");

    let default_ttl = service.select_seats(&s1(), seats(&["A1"]), &c1).await;
    assert!(matches!(default_ttl, Err(BookingError::ValidationError(_))));

    let huge = Duration::try_seconds(i64::MAX / 1_000).unwrap();
    let explicit_ttl = service
        .select_seats_with_ttl(&s1(), seats(&["A1"]), &c1, Some(huge))
        .await;
    assert!(matches!(explicit_ttl, Err(BookingError::ValidationError(_))));
    assert_eq!(state_of(&service, "S1", "A1").await, SeatState::Free);
}

/// Delays every append so callers can be dropped mid-operation.
#[derive(Clone, Default)]
struct SlowStore {
    inner: InMemoryLedgerStore,
}

#[async_trait]
impl LedgerStore for SlowStore {
    async fn append(&self, event: LedgerEvent) -> Result<()> {
        tokio::time::sleep(std::time::Duration::from_millis(3)).await;
        self.inner.append(event).await
    }

    async fn events(&self) -> Result<Vec<LedgerEvent>> {
        self.inner.events().await
    }

    async fn last_sequence(&self) -> Result<Option<u64>> {
        self.inner.last_sequence().await
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_dropped_selection_never_orphans_held_seats() {
    for delay_ms in 0..12 {
        let clock = ManualClock::new(Utc::now());
        let service = service_over(
            test_config(),
            Box::new(SlowStore::default()),
            Arc::new(TokenPaymentGateway::new()),
            &clock,
        )
        .await;
        publish(&service, "S1", &["A1", "A2"], dec!(9.00)).await;

        let _ = tokio::time::timeout(
            std::time::Duration::from_millis(delay_ms),
            service.select_seats(&s1(), seats(&["A1", "A2"]), &Identity::customer("C1")),
        )
        .await;

        for (seat, slot) in service.inventory().slots(&s1()).await.unwrap() {
            if slot.state != SeatState::Held {
                continue;
            }
            let owner = slot.hold.expect("held seat without a hold");
            let hold = service.holds().hold(owner).await.unwrap_or_else(|e| {
                panic!("seat {seat} held by unregistered hold after {delay_ms}ms: {e}")
            });
            assert!(hold.is_active());
        }
    }
}
