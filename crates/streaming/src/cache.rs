use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use parking_lot::Mutex;
use tracing::debug;

pub const DEFAULT_MAX_BYTES: usize = 50 * 1024 * 1024;
pub const DEFAULT_TTL: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    pub max_bytes: usize,
    pub ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_MAX_BYTES,
            ttl: DEFAULT_TTL,
        }
    }
}

/// Time source for entry expiry.
pub trait Clock: Send + Sync + std::fmt::Debug {
    fn now(&self) -> Instant;
}

#[derive(Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    origin: Instant,
    offset: Mutex<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
        }
    }

    pub fn advance(&self, by: Duration) {
        *self.offset.lock() += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + *self.offset.lock()
    }
}

/// A payload larger than the whole budget. The bytes are handed back.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheRejected {
    pub url: String,
    pub bytes: Bytes,
}

impl std::fmt::Display for CacheRejected {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "image too large for cache budget: url={} bytes={}",
            self.url,
            self.bytes.len()
        )
    }
}

impl std::error::Error for CacheRejected {}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct CacheStats {
    pub total_bytes: usize,
    pub count: usize,
    pub average_bytes: usize,
}

#[derive(Debug, Clone)]
struct CacheEntry {
    bytes: Bytes,
    inserted_at: Instant,
    last_used_tick: u64,
}

#[derive(Debug, Default)]
struct Inner {
    used_bytes: usize,
    tick: u64,
    entries: BTreeMap<String, CacheEntry>,
}

impl Inner {
    fn remove(&mut self, url: &str) -> Option<CacheEntry> {
        let entry = self.entries.remove(url)?;
        self.used_bytes = self.used_bytes.saturating_sub(entry.bytes.len());
        Some(entry)
    }

    /// Drops every entry whose TTL has run out.
    fn purge_expired(&mut self, now: Instant, ttl: Duration) -> Vec<String> {
        let expired: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, e)| is_expired(e, now, ttl))
            .map(|(k, _)| k.clone())
            .collect();
        for url in &expired {
            self.remove(url);
        }
        expired
    }

    /// Least recently used entry, ties broken by key order.
    fn lru_key(&self) -> Option<String> {
        self.entries
            .iter()
            .min_by(|(ka, ea), (kb, eb)| {
                ea.last_used_tick
                    .cmp(&eb.last_used_tick)
                    .then_with(|| ka.cmp(kb))
            })
            .map(|(k, _)| k.clone())
    }
}

fn is_expired(entry: &CacheEntry, now: Instant, ttl: Duration) -> bool {
    now.saturating_duration_since(entry.inserted_at) >= ttl
}

/// Byte-budgeted image cache keyed by URL.
///
/// - Entries older than `ttl` are dropped lazily when read.
/// - `put` evicts least recently accessed entries until the new one fits.
/// - The map and the byte counter sit behind one lock, so concurrent
///   completions cannot double count.
#[derive(Debug)]
pub struct ImageCache {
    config: CacheConfig,
    clock: Arc<dyn Clock>,
    inner: Mutex<Inner>,
}

impl ImageCache {
    pub fn new(config: CacheConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: CacheConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            clock,
            inner: Mutex::new(Inner::default()),
        }
    }

    pub fn config(&self) -> CacheConfig {
        self.config
    }

    pub fn get(&self, url: &str) -> Option<Bytes> {
        let now = self.clock.now();
        let mut inner = self.inner.lock();
        inner.tick += 1;
        let tick = inner.tick;

        let expired = is_expired(inner.entries.get(url)?, now, self.config.ttl);
        if expired {
            inner.remove(url);
            debug!(url, "expired image cache entry");
            return None;
        }

        let entry = inner.entries.get_mut(url)?;
        entry.last_used_tick = tick;
        Some(entry.bytes.clone())
    }

    /// Inserts or replaces `url`. Expired entries are dropped before any live
    /// entry is evicted. Returns the URLs removed to make room.
    pub fn put(&self, url: &str, bytes: Bytes) -> Result<Vec<String>, CacheRejected> {
        if bytes.len() > self.config.max_bytes {
            return Err(CacheRejected {
                url: url.to_string(),
                bytes,
            });
        }

        let now = self.clock.now();
        let mut inner = self.inner.lock();
        inner.tick += 1;
        inner.remove(url);

        let mut evicted = Vec::new();
        if inner.used_bytes + bytes.len() > self.config.max_bytes {
            evicted = inner.purge_expired(now, self.config.ttl);
        }
        while inner.used_bytes + bytes.len() > self.config.max_bytes {
            let Some(victim) = inner.lru_key() else {
                break;
            };
            inner.remove(&victim);
            evicted.push(victim);
        }
        if !evicted.is_empty() {
            debug!(url, evicted = evicted.len(), "image cache eviction");
        }

        inner.used_bytes += bytes.len();
        let tick = inner.tick;
        inner.entries.insert(
            url.to_string(),
            CacheEntry {
                bytes,
                inserted_at: now,
                last_used_tick: tick,
            },
        );
        Ok(evicted)
    }

    /// Whether a live entry exists. Does not count as an access.
    pub fn contains(&self, url: &str) -> bool {
        let now = self.clock.now();
        self.inner
            .lock()
            .entries
            .get(url)
            .is_some_and(|e| !is_expired(e, now, self.config.ttl))
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.lock();
        let count = inner.entries.len();
        CacheStats {
            total_bytes: inner.used_bytes,
            count,
            average_bytes: inner.used_bytes.checked_div(count).unwrap_or(0),
        }
    }

    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.entries.clear();
        inner.used_bytes = 0;
    }
}
