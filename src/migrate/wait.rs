//! Cancellable polling.
//!
//! Backup metadata crosses clusters through Velero's own sync loop, which
//! does not propagate watch events reliably; arrival is observed by
//! re-listing on a fixed interval instead of watching.

use std::future::Future;
use std::time::Duration;

use tokio::time::{Instant, sleep};

use crate::error::Result;

/// Poll `check` every `interval` until it returns `true` or `deadline`
/// elapses.
///
/// The first check runs immediately, so an already-satisfied predicate
/// returns without sleeping. `Ok(false)` means the deadline passed and is
/// not an error; predicate errors abort the wait. Callers needing outside
/// cancellation can `select!` on the returned future.
pub async fn poll_until<F, Fut>(interval: Duration, deadline: Duration, mut check: F) -> Result<bool>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool>>,
{
    let expires = Instant::now() + deadline;
    loop {
        if check().await? {
            return Ok(true);
        }
        if Instant::now() >= expires {
            return Ok(false);
        }
        sleep(interval).await;
    }
}
