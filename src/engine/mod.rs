//! The contributor aggregation engine.
//!
//! Turns three dependent, rate-limited, paginated GitHub lookups (repository
//! search, per-repository contributor lists, per-contributor profiles) into
//! one deduplicated, merged, ranked result set.
//!
//! # Implementation Model
//!
//! The [`Aggregator`] drives a four-phase run over a [`Pager`], which wraps
//! the [`Client`] transport with a TTL-aware response [`Cache`] and a shared
//! [`Throttler`] that bounds in-flight requests and absorbs rate-limit
//! pauses. Partial failures surface as [`Diagnostic`]s on the returned
//! [`RankReport`] rather than aborting the run; only a failed repository
//! search is terminal.

mod aggregator;
pub mod cache;
mod client;
pub mod models;
mod pager;
mod throttler;

use core::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub use aggregator::{Aggregator, ContributorAggregate, Diagnostic, RankReport};
pub use cache::{Cache, DEFAULT_TTL};
pub use client::Client;
pub use pager::{FetchFailure, PageSet, Pager, SingleFetch};
pub use throttler::Throttler;

/// Cooperative cancellation flag for an aggregation run.
///
/// Cloned tokens share the flag. Fetches check it before dispatching work, so
/// a cancelled run winds down promptly and returns whatever was fully merged.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation of the run holding this token.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_token_shares_state_across_clones() {
        let token = CancelToken::new();
        let clone = token.clone();

        assert!(!token.is_cancelled());
        clone.cancel();
        assert!(token.is_cancelled());
        assert!(clone.is_cancelled());
    }
}
