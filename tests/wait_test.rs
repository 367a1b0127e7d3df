//! Timing behavior of the polling wait, under tokio's paused clock.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use velero_migrate::error::Error;
use velero_migrate::migrate::wait::poll_until;

const INTERVAL: Duration = Duration::from_secs(5);
const DEADLINE: Duration = Duration::from_secs(60);

#[tokio::test(start_paused = true)]
async fn test_immediate_hit_returns_without_sleeping() {
    let start = tokio::time::Instant::now();
    let found = poll_until(INTERVAL, DEADLINE, || async { Ok(true) })
        .await
        .unwrap();
    assert!(found);
    assert_eq!(start.elapsed(), Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn test_never_found_times_out_at_deadline() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let start = tokio::time::Instant::now();

    let found = poll_until(INTERVAL, DEADLINE, move || {
        let counter = counter.clone();
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(false)
        }
    })
    .await
    .unwrap();

    assert!(!found);
    assert_eq!(start.elapsed(), DEADLINE);
    // Checks at t = 0, 5, ..., 60: one immediately, then one per interval.
    assert_eq!(calls.load(Ordering::SeqCst), 13);
}

#[tokio::test(start_paused = true)]
async fn test_found_on_later_poll() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let start = tokio::time::Instant::now();

    let found = poll_until(INTERVAL, DEADLINE, move || {
        let counter = counter.clone();
        async move { Ok(counter.fetch_add(1, Ordering::SeqCst) + 1 >= 3) }
    })
    .await
    .unwrap();

    assert!(found);
    assert_eq!(start.elapsed(), INTERVAL * 2);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn test_predicate_error_aborts_the_wait() {
    let result = poll_until(INTERVAL, DEADLINE, || async {
        Err(Error::config("list failed"))
    })
    .await;
    assert!(matches!(result, Err(Error::Config(_))));
}
