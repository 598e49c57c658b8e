//! Policy providers: begin-or-poll fetch deduplication.
//!
//! A provider answers `poll(url)` with the three-state [`FetchStatus`].
//! There are exactly two variants, modeled as a closed union: the
//! queued-download provider driving a [`PolicyTransport`], and the
//! direct-invocation provider adapting a caller-supplied fetch
//! function (for consumers on a different request stack).

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;
use tracing::debug;
use url::Url;

use crate::{FetchStatus, FetchToken, PolicyTransport, TransportError};

/// Caller-supplied fetch function for the direct-invocation variant.
pub type DirectFetchFn = dyn Fn(&Url) -> Result<Bytes, TransportError> + Send + Sync;

/// A policy fetch provider. Closed over its two known variants; no
/// open-ended plugin extensibility.
pub enum PolicyProvider {
    /// Non-blocking downloads through a [`PolicyTransport`].
    Queued(QueuedDownloadProvider),
    /// Delegation to a caller-supplied fetch function.
    Direct(DirectInvocationProvider),
}

impl PolicyProvider {
    /// Create a queued-download provider over a transport.
    #[must_use]
    pub fn queued(transport: Arc<dyn PolicyTransport>) -> Self {
        Self::Queued(QueuedDownloadProvider::new(transport))
    }

    /// Create a direct-invocation provider around a fetch function.
    pub fn direct<F>(fetch: F) -> Self
    where
        F: Fn(&Url) -> Result<Bytes, TransportError> + Send + Sync + 'static,
    {
        Self::Direct(DirectInvocationProvider::new(fetch))
    }

    /// Begin fetching a URL if nothing is in flight for it, otherwise
    /// check on the existing fetch. Never blocks; never retries a
    /// failed fetch on its own.
    #[must_use]
    pub fn poll(&self, url: &Url) -> FetchStatus {
        match self {
            Self::Queued(provider) => provider.poll(url),
            Self::Direct(provider) => provider.poll(url),
        }
    }

    /// Abandon all in-flight bookkeeping. Used on cache clear so a
    /// later evaluation issues a fresh fetch.
    pub fn abandon_all(&self) {
        if let Self::Queued(provider) = self {
            provider.abandon_all();
        }
    }
}

/// Queued-download provider: at most one underlying download per URL.
pub struct QueuedDownloadProvider {
    transport: Arc<dyn PolicyTransport>,
    // check-then-act on this map is atomic with respect to other
    // evaluators for the same URL
    in_flight: Mutex<HashMap<Url, FetchToken>>,
}

impl QueuedDownloadProvider {
    /// Create a provider over a transport.
    #[must_use]
    pub fn new(transport: Arc<dyn PolicyTransport>) -> Self {
        Self {
            transport,
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// Begin or poll the download for a URL.
    #[must_use]
    pub fn poll(&self, url: &Url) -> FetchStatus {
        let mut in_flight = self.in_flight.lock();
        let token = match in_flight.get(url) {
            Some(token) => *token,
            None => {
                debug!(%url, "starting policy download");
                let token = self.transport.start_fetch(url);
                in_flight.insert(url.clone(), token);
                token
            }
        };
        let status = self.transport.poll(token);
        if status.is_terminal() {
            in_flight.remove(url);
        }
        status
    }

    /// Drop all download bookkeeping, telling the transport to release
    /// whatever it holds for each abandoned token.
    pub fn abandon_all(&self) {
        let mut in_flight = self.in_flight.lock();
        for token in in_flight.values() {
            self.transport.abandon(*token);
        }
        in_flight.clear();
    }
}

/// Direct-invocation provider: wraps a fetch that looks synchronous to
/// the adaptee, so it resolves immediately rather than via polling.
pub struct DirectInvocationProvider {
    fetch: Box<DirectFetchFn>,
}

impl DirectInvocationProvider {
    /// Wrap a fetch function.
    pub fn new<F>(fetch: F) -> Self
    where
        F: Fn(&Url) -> Result<Bytes, TransportError> + Send + Sync + 'static,
    {
        Self {
            fetch: Box::new(fetch),
        }
    }

    /// Invoke the wrapped fetch and adapt its result.
    #[must_use]
    pub fn poll(&self, url: &Url) -> FetchStatus {
        match (self.fetch)(url) {
            Ok(bytes) => FetchStatus::Succeeded(bytes),
            Err(err) => FetchStatus::Failed(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    /// Transport that stays pending forever, counting starts and
    /// recording abandoned tokens.
    struct PendingTransport {
        starts: AtomicUsize,
        abandoned: Mutex<Vec<FetchToken>>,
    }

    impl PendingTransport {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                starts: AtomicUsize::new(0),
                abandoned: Mutex::new(Vec::new()),
            })
        }
    }

    impl PolicyTransport for PendingTransport {
        fn start_fetch(&self, _url: &Url) -> FetchToken {
            let id = self.starts.fetch_add(1, Ordering::SeqCst);
            FetchToken::new(id as u64)
        }

        fn poll(&self, _token: FetchToken) -> FetchStatus {
            FetchStatus::Pending
        }

        fn abandon(&self, token: FetchToken) {
            self.abandoned.lock().push(token);
        }
    }

    #[test]
    fn repeated_polls_start_one_download() {
        let transport = PendingTransport::new();
        let provider = QueuedDownloadProvider::new(Arc::clone(&transport) as Arc<dyn PolicyTransport>);
        let url = Url::parse("http://example.com/crossdomain.xml").unwrap();

        for _ in 0..5 {
            assert!(matches!(provider.poll(&url), FetchStatus::Pending));
        }
        assert_eq!(transport.starts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn distinct_urls_get_distinct_downloads() {
        let transport = PendingTransport::new();
        let provider = QueuedDownloadProvider::new(Arc::clone(&transport) as Arc<dyn PolicyTransport>);

        let _ = provider.poll(&Url::parse("http://a.example.com/crossdomain.xml").unwrap());
        let _ = provider.poll(&Url::parse("http://b.example.com/crossdomain.xml").unwrap());
        assert_eq!(transport.starts.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn abandon_all_forgets_in_flight_urls() {
        let transport = PendingTransport::new();
        let provider = QueuedDownloadProvider::new(Arc::clone(&transport) as Arc<dyn PolicyTransport>);
        let url = Url::parse("http://example.com/crossdomain.xml").unwrap();

        let _ = provider.poll(&url);
        provider.abandon_all();
        let _ = provider.poll(&url);
        assert_eq!(transport.starts.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn abandon_all_releases_transport_tokens() {
        let transport = PendingTransport::new();
        let provider = QueuedDownloadProvider::new(Arc::clone(&transport) as Arc<dyn PolicyTransport>);

        let _ = provider.poll(&Url::parse("http://a.example.com/crossdomain.xml").unwrap());
        let _ = provider.poll(&Url::parse("http://b.example.com/crossdomain.xml").unwrap());
        provider.abandon_all();

        let abandoned = transport.abandoned.lock();
        assert_eq!(abandoned.len(), 2);
        assert!(abandoned.contains(&FetchToken::new(0)));
        assert!(abandoned.contains(&FetchToken::new(1)));
    }

    #[test]
    fn direct_provider_resolves_immediately() {
        let provider = PolicyProvider::direct(|_url: &Url| Ok(Bytes::from_static(b"<xml/>")));
        let url = Url::parse("http://example.com/crossdomain.xml").unwrap();
        assert!(matches!(provider.poll(&url), FetchStatus::Succeeded(_)));
    }

    #[test]
    fn direct_provider_surfaces_failures() {
        let provider = PolicyProvider::direct(|url: &Url| {
            Err(TransportError::Status {
                url: url.to_string(),
                status: 404,
            })
        });
        let url = Url::parse("http://example.com/crossdomain.xml").unwrap();
        assert!(matches!(provider.poll(&url), FetchStatus::Failed(_)));
    }
}
