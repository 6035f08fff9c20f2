//! Bounded-concurrency permit pool with temporary pausing.
//!
//! The pager acquires a permit before every remote call, capping in-flight
//! requests, and pauses the whole pool when the remote signals a rate limit.

use core::time::Duration;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::sync::Semaphore;

/// Limits concurrency and supports pausing all dispatch until a deadline.
///
/// Wrap in an `Arc` via [`Throttler::new`], then call [`Throttler::acquire`]
/// before each unit of work; at most `max_concurrent` permits are out at a
/// time. Any task can call [`Throttler::pause_until`] to park new dispatch,
/// e.g. until a rate limit resets. When pauses overlap, the latest deadline
/// wins.
#[derive(Debug)]
pub struct Throttler {
    permits: Arc<Semaphore>,
    /// Deadline before which no new work may be dispatched.
    pause_deadline: Mutex<Option<Instant>>,
}

/// Minimum extension required for a new pause to override an active one.
/// Near-simultaneous callers that all saw the same reset signal should not
/// each re-establish the pause over tiny `Instant::now()` drift.
const MIN_PAUSE_EXTENSION: Duration = Duration::from_secs(1);

impl Throttler {
    /// Create a new throttler that allows at most `max_concurrent` tasks at a time.
    pub fn new(max_concurrent: usize) -> Arc<Self> {
        Arc::new(Self {
            permits: Arc::new(Semaphore::new(max_concurrent)),
            pause_deadline: Mutex::new(None),
        })
    }

    /// Wait out any active pause, then acquire a concurrency slot.
    ///
    /// The returned permit must be held for the duration of the work; dropping
    /// it frees the slot for another task.
    pub async fn acquire(&self) -> tokio::sync::OwnedSemaphorePermit {
        loop {
            if let Some(remaining) = self.remaining_pause() {
                tokio::time::sleep(remaining).await;
                continue;
            }

            return Arc::clone(&self.permits)
                .acquire_owned()
                .await
                .expect("semaphore is never closed");
        }
    }

    /// Returns whether the throttler is currently paused.
    pub fn is_paused(&self) -> bool {
        self.remaining_pause().is_some()
    }

    /// Pause dispatching for `duration`; dispatch resumes once the deadline
    /// passes. Tasks already holding permits are not interrupted. Returns
    /// `true` only when a new pause was actually established; a call that
    /// would not meaningfully extend an active pause is a no-op.
    pub fn pause_for(&self, duration: Duration) -> bool {
        let new_deadline = Instant::now() + duration;

        let mut guard = self.pause_deadline.lock().expect("lock not poisoned");
        if guard.is_some_and(|existing| existing + MIN_PAUSE_EXTENSION >= new_deadline) {
            return false;
        }
        *guard = Some(new_deadline);
        true
    }

    /// Time left until the current pause deadline, if one is active.
    fn remaining_pause(&self) -> Option<Duration> {
        let mut guard = self.pause_deadline.lock().expect("lock not poisoned");
        match *guard {
            Some(deadline) => {
                let now = Instant::now();
                if deadline > now {
                    Some(deadline - now)
                } else {
                    // Pause elapsed; clear it so later pauses start fresh.
                    *guard = None;
                    None
                }
            }
            None => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn limits_concurrency() {
        let throttler = Throttler::new(2);
        let active = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        let tasks: Vec<_> = (0..10)
            .map(|_| {
                let throttler = Arc::clone(&throttler);
                let active = Arc::clone(&active);
                let max_seen = Arc::clone(&max_seen);
                tokio::spawn(async move {
                    let _permit = throttler.acquire().await;
                    let current = active.fetch_add(1, Ordering::SeqCst) + 1;
                    _ = max_seen.fetch_max(current, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    _ = active.fetch_sub(1, Ordering::SeqCst);
                })
            })
            .collect();

        _ = futures_util::future::join_all(tasks).await;

        assert!(max_seen.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn pause_blocks_new_work() {
        let throttler = Throttler::new(5);

        assert!(throttler.pause_for(Duration::from_millis(200)));
        assert!(throttler.is_paused());

        let start = Instant::now();
        let _permit = throttler.acquire().await;
        let elapsed = start.elapsed();

        assert!(elapsed >= Duration::from_millis(150));
        assert!(!throttler.is_paused());
    }

    #[tokio::test]
    async fn shorter_overlapping_pause_is_ignored() {
        let throttler = Throttler::new(1);

        assert!(throttler.pause_for(Duration::from_secs(30)));
        assert!(!throttler.pause_for(Duration::from_secs(5)));

        // A materially longer pause still wins.
        assert!(throttler.pause_for(Duration::from_secs(60)));
    }
}
