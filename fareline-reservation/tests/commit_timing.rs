use chrono::{Duration as ChronoDuration, Utc};
use fareline_core::{AgeBand, BookingError, ContactDetails, Money, Quote, QuoteLeg, Traveler};
use fareline_offer::ScriptedProvider;
use fareline_reservation::CommitCoordinator;
use fareline_store::InMemoryStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use uuid::Uuid;

fn flight_quote() -> Quote {
    Quote::new(
        QuoteLeg::Flight,
        Money::new(90_000, "USD"),
        Utc::now() + ChronoDuration::minutes(15),
        Uuid::new_v4(),
    )
}

fn contact() -> ContactDetails {
    ContactDetails {
        full_name: "Ada Boyle".to_string(),
        email: Some("ada@example.com".to_string()),
        phone: None,
    }
}

fn travelers() -> Vec<Traveler> {
    vec![Traveler {
        full_name: "Ada Boyle".to_string(),
        age_band: AgeBand::Adult,
    }]
}

fn coordinator(provider: Arc<ScriptedProvider>, store: Arc<InMemoryStore>) -> CommitCoordinator {
    CommitCoordinator::new(provider, store)
        .with_min_display(Duration::from_secs(3))
        .with_call_timeout(Duration::from_secs(10))
        .with_tick(Duration::from_millis(500))
}

#[tokio::test(start_paused = true)]
async fn test_fast_success_still_waits_out_the_display_floor() {
    let provider = Arc::new(ScriptedProvider::new());
    let store = Arc::new(InMemoryStore::new());
    let committer = coordinator(provider.clone(), store.clone());

    let started = Instant::now();
    committer
        .commit(Uuid::new_v4(), 3, &[flight_quote()], &contact(), &travelers())
        .await
        .unwrap();

    // The provider answered immediately, but success resolves only after
    // the three-second floor
    assert!(started.elapsed() >= Duration::from_secs(3));
    assert_eq!(store.order_count().await, 1);
}

#[tokio::test(start_paused = true)]
async fn test_slow_success_resolves_on_the_real_call_not_the_floor() {
    let provider = Arc::new(ScriptedProvider::new());
    provider.delay_commits(Duration::from_secs(5));
    let store = Arc::new(InMemoryStore::new());
    let committer = coordinator(provider.clone(), store.clone());

    let started = Instant::now();
    committer
        .commit(Uuid::new_v4(), 3, &[flight_quote()], &contact(), &travelers())
        .await
        .unwrap();

    // max(call, floor): the five-second call dominates the three-second floor
    assert!(started.elapsed() >= Duration::from_secs(5));
}

#[tokio::test(start_paused = true)]
async fn test_failure_surfaces_promptly_without_the_floor() {
    let provider = Arc::new(ScriptedProvider::new());
    provider.fail_next_commit(BookingError::ProviderRejected("declined".into()));
    let store = Arc::new(InMemoryStore::new());
    let committer = coordinator(provider.clone(), store.clone());

    let started = Instant::now();
    let err = committer
        .commit(Uuid::new_v4(), 3, &[flight_quote()], &contact(), &travelers())
        .await
        .unwrap_err();

    assert!(matches!(err, BookingError::ProviderRejected(_)));
    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(store.order_count().await, 0);
}

#[tokio::test(start_paused = true)]
async fn test_call_timeout_is_bounded() {
    let provider = Arc::new(ScriptedProvider::new());
    provider.delay_commits(Duration::from_secs(60));
    let store = Arc::new(InMemoryStore::new());
    let committer = coordinator(provider.clone(), store.clone())
        .with_call_timeout(Duration::from_secs(8));

    let started = Instant::now();
    let err = committer
        .commit(Uuid::new_v4(), 3, &[flight_quote()], &contact(), &travelers())
        .await
        .unwrap_err();

    assert!(matches!(err, BookingError::ProviderRejected(_)));
    // Bounded at the timeout, never left pending indefinitely
    assert!(started.elapsed() >= Duration::from_secs(8));
    assert!(started.elapsed() < Duration::from_secs(60));
}

#[tokio::test(start_paused = true)]
async fn test_progress_messages_rotate_during_commit() {
    let provider = Arc::new(ScriptedProvider::new());
    provider.delay_commits(Duration::from_secs(2));
    let store = Arc::new(InMemoryStore::new());
    let committer = coordinator(provider.clone(), store.clone());

    let mut status = committer.status_updates();
    committer
        .commit(Uuid::new_v4(), 3, &[flight_quote()], &contact(), &travelers())
        .await
        .unwrap();

    // The ticker ran alongside the call and published progress copy
    assert!(status.has_changed().unwrap());
    assert!(fareline_reservation::COMMIT_STATUS_MESSAGES.contains(&*status.borrow_and_update()));
}

#[tokio::test(start_paused = true)]
async fn test_retried_commit_with_same_version_books_once() {
    let provider = Arc::new(ScriptedProvider::new());
    let store = Arc::new(InMemoryStore::new());
    let committer = coordinator(provider.clone(), store.clone());

    let reservation_id = Uuid::new_v4();
    let quotes = [flight_quote()];

    let first = committer
        .commit(reservation_id, 3, &quotes, &contact(), &travelers())
        .await
        .unwrap();
    let second = committer
        .commit(reservation_id, 3, &quotes, &contact(), &travelers())
        .await
        .unwrap();

    // Same idempotency key: the provider collapses the duplicate and the
    // store keeps a single record
    assert_eq!(first.confirmation_ref, second.confirmation_ref);
    assert_eq!(provider.bookings_created(), 1);
    assert_eq!(store.order_count().await, 1);
}
