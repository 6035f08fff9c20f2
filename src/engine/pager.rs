//! Paginated fetching over the transport and cache.
//!
//! The pager owns the retry policy: rate limits pause all dispatch until the
//! signaled reset and the same page is retried; everything else either
//! terminates the listing early (with the items already produced kept) or,
//! for 404s, marks the entity as vanished.

use super::CancelToken;
use super::cache::{Cache, CacheResult, request_key};
use super::client::{ApiResult, Client};
use super::models::Page;
use chrono::Utc;
use core::fmt;
use core::time::Duration;
use reqwest::StatusCode;
use reqwest::header::LINK;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::throttler::Throttler;

const LOG_TARGET: &str = "     pager";

/// Items requested per page; the maximum the API allows.
const PAGE_SIZE: u8 = 100;

/// Hard cap on a single rate-limit wait. A signaled reset further away than
/// this escalates instead of stalling the run.
const MAX_RATE_LIMIT_WAIT: Duration = Duration::from_secs(3600);

/// How many rate-limit pauses a single page fetch may absorb before escalating.
const MAX_RATE_LIMIT_RETRIES: u32 = 5;

/// A fetch-level failure surfaced to the aggregator.
#[derive(Debug, Clone)]
pub enum FetchFailure {
    /// The remote could not be reached or answered with an unexpected status.
    Network(Arc<ohno::AppError>),

    /// Credentials rejected.
    Unauthorized,

    /// Rate limited beyond the bounded wait cap or retry budget.
    RateLimited,

    /// The entity behind the request no longer exists.
    NotFound,

    /// The response body did not decode.
    Malformed(String),

    /// The run was cancelled while this fetch was pending.
    Cancelled,
}

impl fmt::Display for FetchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Network(e) => write!(f, "network failure: {e:#}"),
            Self::Unauthorized => write!(f, "unauthorized"),
            Self::RateLimited => write!(f, "rate limit wait exceeded the allowed bound"),
            Self::NotFound => write!(f, "not found"),
            Self::Malformed(msg) => write!(f, "malformed response: {msg}"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// All items retrieved from a listing, plus whether the listing was cut short.
///
/// Items produced before a failure remain valid; callers decide whether to
/// proceed with partial data.
#[derive(Debug)]
pub struct PageSet<T> {
    pub items: Vec<T>,
    pub truncation: Option<FetchFailure>,
}

impl<T> PageSet<T> {
    fn complete(items: Vec<T>) -> Self {
        Self { items, truncation: None }
    }

    fn truncated(items: Vec<T>, failure: FetchFailure) -> Self {
        Self {
            items,
            truncation: Some(failure),
        }
    }

    /// Returns `true` when every page of the listing was retrieved.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.truncation.is_none()
    }
}

/// Result of a single-object lookup.
#[derive(Debug)]
pub enum SingleFetch<T> {
    Found(T),
    /// The entity vanished (404); callers skip it rather than failing the run.
    Missing,
    Failed(FetchFailure),
}

/// On-disk payload for one cached page: the decoded items plus whether the
/// listing continued past this page.
#[derive(Debug, Serialize, Deserialize)]
struct CachedPage<T> {
    items: Vec<T>,
    has_next: bool,
}

/// Outcome of retrieving one page, from cache or transport.
enum PageOutcome<T> {
    Page { items: Vec<T>, has_next: bool },
    Missing,
    Failed(FetchFailure),
}

/// Outcome of a raw transport attempt after backoff handling.
enum Attempt {
    Response(reqwest::Response),
    Missing,
    Failed(FetchFailure),
}

/// Fetches every page of listing endpoints, consulting the cache first and
/// respecting rate-limit signals.
#[derive(Debug, Clone)]
pub struct Pager {
    client: Client,
    cache: Cache,
    throttler: Arc<Throttler>,
}

impl Pager {
    pub fn new(client: Client, cache: Cache, throttler: Arc<Throttler>) -> Self {
        Self { client, cache, throttler }
    }

    /// Get the base URL of the underlying client.
    #[must_use]
    pub fn base_url(&self) -> &str {
        self.client.base_url()
    }

    /// Retrieve every page of a listing endpoint.
    ///
    /// `base_url` must not carry pagination parameters; they are appended per
    /// page. The listing restarts from scratch on every call (subject to the
    /// cache).
    pub async fn fetch_all<P: Page>(&self, base_url: &str, cancel: &CancelToken) -> PageSet<P::Item> {
        let mut items = Vec::new();
        let mut page_num = 1u32;

        loop {
            if cancel.is_cancelled() {
                return PageSet::truncated(items, FetchFailure::Cancelled);
            }

            let url = page_url(base_url, page_num);
            match self.fetch_page::<P>(&url, cancel).await {
                PageOutcome::Page { items: page_items, has_next } => {
                    items.extend(page_items);
                    if !has_next {
                        return PageSet::complete(items);
                    }
                    page_num += 1;
                }
                PageOutcome::Missing => {
                    return PageSet::truncated(items, FetchFailure::NotFound);
                }
                PageOutcome::Failed(failure) => {
                    log::warn!(target: LOG_TARGET, "Listing {base_url} cut short on page {page_num}: {failure}");
                    return PageSet::truncated(items, failure);
                }
            }
        }
    }

    /// Retrieve a single object (e.g. one profile), with the same caching and
    /// backoff behavior as page fetches.
    pub async fn fetch_one<T>(&self, url: &str, cancel: &CancelToken) -> SingleFetch<T>
    where
        T: Serialize + DeserializeOwned,
    {
        let key = request_key(url);
        match self.cache.load::<T>(&key) {
            CacheResult::Data(data) => return SingleFetch::Found(data),
            CacheResult::NoData(_) => return SingleFetch::Missing,
            CacheResult::Miss => {}
        }

        match self.get_with_backoff(url, cancel).await {
            Attempt::Response(resp) => match resp.json::<T>().await {
                Ok(data) => {
                    if let Err(e) = self.cache.save(&key, &data) {
                        log::debug!(target: LOG_TARGET, "Could not cache {url}: {e:#}");
                    }
                    SingleFetch::Found(data)
                }
                Err(e) => SingleFetch::Failed(FetchFailure::Malformed(format!("{e:#}"))),
            },
            Attempt::Missing => {
                if let Err(e) = self.cache.save_no_data(&key, "not found") {
                    log::debug!(target: LOG_TARGET, "Could not cache negative entry for {url}: {e:#}");
                }
                SingleFetch::Missing
            }
            Attempt::Failed(failure) => SingleFetch::Failed(failure),
        }
    }

    /// Retrieve one page, consulting the cache first.
    async fn fetch_page<P: Page>(&self, url: &str, cancel: &CancelToken) -> PageOutcome<P::Item> {
        let key = request_key(url);
        match self.cache.load::<CachedPage<P::Item>>(&key) {
            CacheResult::Data(page) => {
                return PageOutcome::Page {
                    items: page.items,
                    has_next: page.has_next,
                };
            }
            CacheResult::NoData(_) => return PageOutcome::Missing,
            CacheResult::Miss => {}
        }

        match self.get_with_backoff(url, cancel).await {
            Attempt::Response(resp) => {
                // An empty repository answers 204 with no body: a valid, empty page.
                if resp.status() == StatusCode::NO_CONTENT {
                    let page = CachedPage::<P::Item> { items: Vec::new(), has_next: false };
                    if let Err(e) = self.cache.save(&key, &page) {
                        log::debug!(target: LOG_TARGET, "Could not cache {url}: {e:#}");
                    }
                    return PageOutcome::Page { items: page.items, has_next: page.has_next };
                }

                let has_next = has_next_page(resp.headers());
                let page: P = match resp.json().await {
                    Ok(p) => p,
                    Err(e) => return PageOutcome::Failed(FetchFailure::Malformed(format!("{e:#}"))),
                };

                let page = CachedPage { items: page.into_items(), has_next };
                if let Err(e) = self.cache.save(&key, &page) {
                    log::debug!(target: LOG_TARGET, "Could not cache {url}: {e:#}");
                }
                PageOutcome::Page { items: page.items, has_next: page.has_next }
            }
            Attempt::Missing => {
                if let Err(e) = self.cache.save_no_data(&key, "not found") {
                    log::debug!(target: LOG_TARGET, "Could not cache negative entry for {url}: {e:#}");
                }
                PageOutcome::Missing
            }
            Attempt::Failed(failure) => PageOutcome::Failed(failure),
        }
    }

    /// Issue a GET under a throttler permit, pausing and retrying on rate
    /// limits until the retry budget or wait cap is exhausted.
    async fn get_with_backoff(&self, url: &str, cancel: &CancelToken) -> Attempt {
        let mut rate_limit_retries = 0u32;

        loop {
            if cancel.is_cancelled() {
                return Attempt::Failed(FetchFailure::Cancelled);
            }

            let permit = self.throttler.acquire().await;

            if cancel.is_cancelled() {
                return Attempt::Failed(FetchFailure::Cancelled);
            }

            let result = self.client.get(url).await;
            drop(permit);

            match result {
                ApiResult::Success(resp, _) => return Attempt::Response(resp),
                ApiResult::RateLimited(rl) => {
                    rate_limit_retries += 1;
                    if rate_limit_retries > MAX_RATE_LIMIT_RETRIES {
                        log::warn!(target: LOG_TARGET, "Rate limit retry budget exhausted for {url}");
                        return Attempt::Failed(FetchFailure::RateLimited);
                    }

                    let wait = (rl.reset_at - Utc::now()).to_std().unwrap_or(Duration::ZERO);
                    if wait > MAX_RATE_LIMIT_WAIT {
                        log::warn!(
                            target: LOG_TARGET,
                            "Rate limit reset is {}s away, beyond the {}s cap; giving up on {url}",
                            wait.as_secs(),
                            MAX_RATE_LIMIT_WAIT.as_secs()
                        );
                        return Attempt::Failed(FetchFailure::RateLimited);
                    }

                    // At least one second between attempts, even when the
                    // reset time has already passed.
                    let wait = wait.max(Duration::from_secs(1));
                    if self.throttler.pause_for(wait) {
                        log::warn!(
                            target: LOG_TARGET,
                            "Rate limited ({} remaining); pausing requests for {}s",
                            rl.remaining,
                            wait.as_secs()
                        );
                    }
                }
                ApiResult::NotFound(_) => return Attempt::Missing,
                ApiResult::Unauthorized(_) => return Attempt::Failed(FetchFailure::Unauthorized),
                ApiResult::Malformed(msg, _) => return Attempt::Failed(FetchFailure::Malformed(msg)),
                ApiResult::Failed(e, _) => return Attempt::Failed(FetchFailure::Network(Arc::new(e))),
            }
        }
    }
}

/// Append pagination parameters to a listing URL.
fn page_url(base_url: &str, page_num: u32) -> String {
    let sep = if base_url.contains('?') { '&' } else { '?' };
    format!("{base_url}{sep}per_page={PAGE_SIZE}&page={page_num}")
}

/// A listing continues when the `Link` header advertises a next page.
fn has_next_page(headers: &reqwest::header::HeaderMap) -> bool {
    headers
        .get(LINK)
        .and_then(|h| h.to_str().ok())
        .is_some_and(|link| link.contains(r#"rel="next""#))
}
