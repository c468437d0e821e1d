//! Panorama image loading: cache lookup, fetch with timeout, and dropping
//! completions that belong to a superseded navigation.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use bytes::Bytes;
use tracing::{debug, info, warn};

use crate::cache::ImageCache;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug)]
pub enum FetchError {
    Timeout {
        url: String,
        after: Duration,
    },
    Http {
        url: String,
        status: u16,
    },
    Transport {
        url: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl FetchError {
    pub fn transport(
        url: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        FetchError::Transport {
            url: url.into(),
            source: Box::new(source),
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, FetchError::Timeout { .. })
    }
}

impl std::fmt::Display for FetchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FetchError::Timeout { url, after } => {
                write!(f, "fetch of {url} timed out after {}ms", after.as_millis())
            }
            FetchError::Http { url, status } => write!(f, "fetch of {url} failed: HTTP {status}"),
            FetchError::Transport { url, source } => write!(f, "fetch of {url} failed: {source}"),
        }
    }
}

impl std::error::Error for FetchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FetchError::Transport { source, .. } => Some(source.as_ref() as _),
            _ => None,
        }
    }
}

/// Origin for panorama image bytes.
pub trait ImageSource: Send + Sync {
    fn fetch<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<Bytes, FetchError>>;
}

#[derive(Debug, Clone, Default)]
pub struct HttpImageSource {
    client: reqwest::Client,
}

impl HttpImageSource {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl ImageSource for HttpImageSource {
    fn fetch<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<Bytes, FetchError>> {
        Box::pin(async move {
            let resp = self
                .client
                .get(url)
                .send()
                .await
                .map_err(|e| FetchError::transport(url, e))?;
            let status = resp.status();
            if !status.is_success() {
                return Err(FetchError::Http {
                    url: url.to_string(),
                    status: status.as_u16(),
                });
            }
            resp.bytes()
                .await
                .map_err(|e| FetchError::transport(url, e))
        })
    }
}

/// Identifies one navigation. Only the most recent ticket is current.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NavigationTicket(u64);

#[derive(Debug, Default)]
pub struct NavigationGuard {
    generation: AtomicU64,
}

impl NavigationGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a navigation, superseding every earlier ticket.
    pub fn begin(&self) -> NavigationTicket {
        NavigationTicket(self.generation.fetch_add(1, Ordering::AcqRel) + 1)
    }

    pub fn is_current(&self, ticket: NavigationTicket) -> bool {
        self.generation.load(Ordering::Acquire) == ticket.0
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct LoaderConfig {
    pub fetch_timeout: Duration,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LoadOutcome {
    Ready(Bytes),
    /// A newer navigation started while this one was loading.
    Superseded,
}

pub struct ImageLoader<S> {
    cache: Arc<ImageCache>,
    source: S,
    guard: Arc<NavigationGuard>,
    config: LoaderConfig,
}

impl<S: ImageSource> ImageLoader<S> {
    pub fn new(
        cache: Arc<ImageCache>,
        source: S,
        guard: Arc<NavigationGuard>,
        config: LoaderConfig,
    ) -> Self {
        Self {
            cache,
            source,
            guard,
            config,
        }
    }

    pub fn cache(&self) -> &ImageCache {
        &self.cache
    }

    pub fn guard(&self) -> &NavigationGuard {
        &self.guard
    }

    pub async fn load(&self, url: &str, ticket: NavigationTicket) -> Result<LoadOutcome, FetchError> {
        if let Some(bytes) = self.cache.get(url) {
            debug!(url, "image cache hit");
            return Ok(self.settle(url, ticket, bytes));
        }

        let after = self.config.fetch_timeout;
        let bytes = tokio::time::timeout(after, self.source.fetch(url))
            .await
            .map_err(|_| FetchError::Timeout {
                url: url.to_string(),
                after,
            })??;
        info!(url, bytes = bytes.len(), "fetched image");

        if let Err(rejected) = self.cache.put(url, bytes.clone()) {
            warn!(url, bytes = rejected.bytes.len(), "image not cached: {rejected}");
        }
        Ok(self.settle(url, ticket, bytes))
    }

    fn settle(&self, url: &str, ticket: NavigationTicket, bytes: Bytes) -> LoadOutcome {
        if self.guard.is_current(ticket) {
            LoadOutcome::Ready(bytes)
        } else {
            debug!(url, ?ticket, "dropping superseded image load");
            LoadOutcome::Superseded
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{
        BoxFuture, FetchError, ImageLoader, ImageSource, LoadOutcome, LoaderConfig,
        NavigationGuard,
    };
    use crate::cache::{CacheConfig, ImageCache};
    use bytes::Bytes;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Default)]
    struct FakeSource {
        delay: Duration,
        calls: AtomicUsize,
    }

    impl ImageSource for FakeSource {
        fn fetch<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<Bytes, FetchError>> {
            Box::pin(async move {
                self.calls.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(self.delay).await;
                if url.ends_with("404.jpg") {
                    return Err(FetchError::Http {
                        url: url.to_string(),
                        status: 404,
                    });
                }
                Ok(Bytes::from(url.as_bytes().to_vec()))
            })
        }
    }

    fn loader(delay: Duration, timeout: Duration) -> ImageLoader<FakeSource> {
        ImageLoader::new(
            Arc::new(ImageCache::new(CacheConfig::default())),
            FakeSource {
                delay,
                ..FakeSource::default()
            },
            Arc::new(NavigationGuard::new()),
            LoaderConfig {
                fetch_timeout: timeout,
            },
        )
    }

    #[test]
    fn only_latest_ticket_is_current() {
        let guard = NavigationGuard::new();
        let a = guard.begin();
        let b = guard.begin();
        assert!(!guard.is_current(a));
        assert!(guard.is_current(b));
    }

    #[tokio::test(start_paused = true)]
    async fn second_load_hits_cache() {
        let loader = loader(Duration::from_millis(100), Duration::from_secs(30));
        let ticket = loader.guard().begin();

        let first = loader.load("pano/a.jpg", ticket).await.unwrap();
        let second = loader.load("pano/a.jpg", ticket).await.unwrap();

        assert_eq!(first, LoadOutcome::Ready(Bytes::from_static(b"pano/a.jpg")));
        assert_eq!(first, second);
        assert_eq!(loader.source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_fetch_times_out() {
        let loader = loader(Duration::from_secs(60), Duration::from_secs(30));
        let ticket = loader.guard().begin();

        let err = loader.load("pano/slow.jpg", ticket).await.unwrap_err();
        assert!(err.is_timeout());
        assert!(!loader.cache().contains("pano/slow.jpg"));
    }

    #[tokio::test(start_paused = true)]
    async fn http_errors_are_surfaced() {
        let loader = loader(Duration::ZERO, Duration::from_secs(30));
        let ticket = loader.guard().begin();

        let err = loader.load("pano/404.jpg", ticket).await.unwrap_err();
        assert!(matches!(err, FetchError::Http { status: 404, .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn stale_completion_is_superseded_but_cached() {
        let loader = loader(Duration::from_secs(1), Duration::from_secs(30));
        let first = loader.guard().begin();

        let (outcome, second) = tokio::join!(loader.load("pano/a.jpg", first), async {
            loader.guard().begin()
        });

        assert_eq!(outcome.unwrap(), LoadOutcome::Superseded);
        assert!(loader.cache().contains("pano/a.jpg"));

        let outcome = loader.load("pano/a.jpg", second).await.unwrap();
        assert!(matches!(outcome, LoadOutcome::Ready(_)));
    }
}
