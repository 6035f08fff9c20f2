//! A response cache backed by JSON files with TTL-aware loading.
//!
//! Entries are keyed by a deterministic, sanitized encoding of the request
//! URL. The cache is a pure performance optimization: a miss is reported both
//! when a key was never stored and when its TTL has elapsed, and callers
//! cannot tell the two apart.

use crate::Result;
use chrono::{DateTime, Utc};
use core::time::Duration;
use ohno::IntoAppError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

const LOG_TARGET: &str = "     cache";

/// Default time-to-live for cached responses: five hours.
pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60 * 60);

/// Result of loading an entry from the cache.
#[derive(Debug, Clone)]
pub enum CacheResult<T> {
    /// Cached data was found and is still fresh.
    Data(T),

    /// A negative entry exists: the data was previously determined to be unavailable.
    NoData(String),

    /// No usable cache entry exists (miss, expired, corrupt, or `ignore_cache` is set).
    Miss,
}

/// On-disk representation of a cache entry.
#[derive(Debug, Clone, Deserialize, Serialize)]
struct Envelope<T> {
    stored_at: DateTime<Utc>,
    payload: Payload<T>,
}

/// The payload within an [`Envelope`].
#[derive(Debug, Clone, Deserialize, Serialize)]
enum Payload<T> {
    /// Actual cached data.
    Data(T),

    /// Data is not available, with a reason explaining why.
    NoData(String),
}

/// A TTL-aware, directory-backed JSON cache.
#[derive(Debug, Clone)]
pub struct Cache {
    dir: PathBuf,
    ttl: Duration,
    ignore: bool,
}

impl Cache {
    /// Create a new cache rooted at `cache_dir`.
    #[must_use]
    pub fn new(cache_dir: impl Into<PathBuf>, ttl: Duration, ignore_cache: bool) -> Self {
        Self {
            dir: cache_dir.into(),
            ttl,
            ignore: ignore_cache,
        }
    }

    /// Returns the cache directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Load a cache entry by key.
    #[must_use]
    pub fn load<T>(&self, key: &str) -> CacheResult<T>
    where
        T: for<'de> Deserialize<'de>,
    {
        if self.ignore {
            return CacheResult::Miss;
        }

        let path = self.dir.join(key);

        let file = match File::open(&path) {
            Ok(file) => file,
            Err(e) => {
                log::debug!(target: LOG_TARGET, "Cache miss for {key}: {e:#}");
                return CacheResult::Miss;
            }
        };

        let reader = BufReader::new(file);
        let envelope: Envelope<T> = match serde_json::from_reader(reader) {
            Ok(data) => data,
            Err(e) => {
                log::debug!(target: LOG_TARGET, "Cache miss for {key}: {e:#}");
                return CacheResult::Miss;
            }
        };

        // A future timestamp means clock skew; treat the entry as fresh.
        let age = Utc::now().signed_duration_since(envelope.stored_at);
        if age.num_seconds() < 0 {
            log::debug!(target: LOG_TARGET, "Cache timestamp is in the future for {key} (clock skew), treating as fresh");
        } else {
            let age = age.to_std().unwrap_or(Duration::MAX);
            if age >= self.ttl {
                log::debug!(
                    target: LOG_TARGET,
                    "Cache expired for {key} (age: {:.0}s, TTL: {:.0}s)",
                    age.as_secs_f64(),
                    self.ttl.as_secs_f64()
                );
                return CacheResult::Miss;
            }

            log::debug!(target: LOG_TARGET, "Cache hit for {key} (age: {:.0}s)", age.as_secs_f64());
        }

        match envelope.payload {
            Payload::Data(data) => CacheResult::Data(data),
            Payload::NoData(reason) => CacheResult::NoData(reason),
        }
    }

    /// Save data to the cache under the given key, overwriting any existing
    /// entry and resetting its TTL window.
    pub fn save<T>(&self, key: &str, data: &T) -> Result<()>
    where
        T: Serialize,
    {
        self.write_envelope(key, &Envelope {
            stored_at: Utc::now(),
            payload: Payload::Data(data),
        })
    }

    /// Save a negative cache entry (data unavailable) under the given key.
    pub fn save_no_data(&self, key: &str, reason: &str) -> Result<()> {
        // The type parameter doesn't matter for NoData; `()` is a placeholder.
        self.write_envelope(key, &Envelope::<()> {
            stored_at: Utc::now(),
            payload: Payload::NoData(reason.to_string()),
        })
    }

    fn write_envelope<T: Serialize>(&self, key: &str, envelope: &Envelope<T>) -> Result<()> {
        let path = self.dir.join(key);

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).into_app_err_with(|| format!("creating directory '{}'", parent.display()))?;
        }

        let file = File::create(&path).into_app_err_with(|| format!("creating cache file '{}'", path.display()))?;
        let mut writer = BufWriter::new(file);

        serde_json::to_writer(&mut writer, envelope).into_app_err_with(|| format!("writing cache file '{}'", path.display()))?;
        writer
            .flush()
            .into_app_err_with(|| format!("flushing cache file '{}'", path.display()))?;
        Ok(())
    }
}

/// Derive a cache key from a request URL.
///
/// The scheme is dropped and every character outside `[A-Za-z0-9._-]` becomes
/// `_`, so distinct URLs map to distinct flat filenames and no path traversal
/// is possible.
#[must_use]
pub fn request_key(url: &str) -> String {
    let trimmed = url.split_once("://").map_or(url, |(_, rest)| rest);
    let key: String = trimmed
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();

    // No separators survive the mapping, but ".." is still unwelcome in a filename.
    let mut key = key.replace("..", "__");
    key.push_str(".json");
    key
}
