//! Transport capability for fetching policy documents.
//!
//! The resolver never blocks: a transport hands out a [`FetchToken`]
//! when a fetch starts and answers `poll` with [`FetchStatus::Pending`]
//! until the underlying I/O, which runs on its own execution context,
//! has finished.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use bytes::Bytes;
use parking_lot::Mutex;
use tokio::runtime::Handle;
use url::Url;

/// Default timeout for a single policy fetch.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Transport-level fetch errors. All of these map to `Deny` at the
/// resolver boundary and are not retried automatically.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    /// The request failed at the network level.
    #[error("network error fetching {url}: {message}")]
    Network {
        /// Policy URL being fetched.
        url: String,
        /// Underlying error description.
        message: String,
    },

    /// The server answered with a non-success status.
    #[error("unexpected HTTP status {status} for {url}")]
    Status {
        /// Policy URL being fetched.
        url: String,
        /// HTTP status code.
        status: u16,
    },

    /// The fetch exceeded its deadline.
    #[error("timed out fetching {url}")]
    Timeout {
        /// Policy URL being fetched.
        url: String,
    },
}

/// State of one asynchronous policy retrieval.
#[derive(Debug, Clone)]
pub enum FetchStatus {
    /// No data yet; poll again later.
    Pending,
    /// The fetch completed with the document bytes.
    Succeeded(Bytes),
    /// The fetch failed; not retried within the cache epoch.
    Failed(TransportError),
}

impl FetchStatus {
    /// Whether this status is a terminal result.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// Opaque identifier for one in-progress fetch. Transports mint these
/// from `start_fetch`; only the minting transport can interpret one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FetchToken(u64);

impl FetchToken {
    /// Mint a token. Meaningful only to the transport that issued it.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }
}

/// The fetch capability the engine is polymorphic over. Any HTTP
/// client satisfying this contract may be substituted.
pub trait PolicyTransport: Send + Sync {
    /// Begin fetching a URL. Must not block the calling thread.
    fn start_fetch(&self, url: &Url) -> FetchToken;

    /// Check on a fetch. Must not block; returns `Pending` until the
    /// underlying I/O finishes. A terminal status is returned exactly
    /// once per token.
    fn poll(&self, token: FetchToken) -> FetchStatus;

    /// Discard a fetch whose result will never be consumed, releasing
    /// any bookkeeping held for its token. No-op default for transports
    /// that keep no per-token state.
    fn abandon(&self, token: FetchToken) {
        let _ = token;
    }
}

type ResultSlot = Arc<Mutex<Option<Result<Bytes, TransportError>>>>;

/// Reqwest-backed transport. Each `start_fetch` spawns the request on
/// the supplied tokio runtime handle; results land in a slot the next
/// `poll` drains.
pub struct HttpTransport {
    client: reqwest::Client,
    runtime: Handle,
    timeout: Duration,
    next_token: AtomicU64,
    slots: Mutex<HashMap<FetchToken, ResultSlot>>,
}

impl HttpTransport {
    /// Create a transport spawning fetches on the given runtime handle.
    #[must_use]
    pub fn new(runtime: Handle) -> Self {
        Self {
            client: reqwest::Client::new(),
            runtime,
            timeout: DEFAULT_FETCH_TIMEOUT,
            next_token: AtomicU64::new(0),
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Override the per-fetch timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn fetch(client: reqwest::Client, url: Url) -> Result<Bytes, TransportError> {
        let network = |message: String| TransportError::Network {
            url: url.to_string(),
            message,
        };
        let response = client
            .get(url.clone())
            .send()
            .await
            .map_err(|err| network(err.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        response
            .bytes()
            .await
            .map_err(|err| network(err.to_string()))
    }
}

impl PolicyTransport for HttpTransport {
    fn start_fetch(&self, url: &Url) -> FetchToken {
        let token = FetchToken(self.next_token.fetch_add(1, Ordering::Relaxed));
        let slot: ResultSlot = Arc::new(Mutex::new(None));
        self.slots.lock().insert(token, Arc::clone(&slot));

        let client = self.client.clone();
        let url = url.clone();
        let timeout = self.timeout;
        self.runtime.spawn(async move {
            let timed_out = TransportError::Timeout {
                url: url.to_string(),
            };
            let result = tokio::time::timeout(timeout, Self::fetch(client, url))
                .await
                .unwrap_or(Err(timed_out));
            *slot.lock() = Some(result);
        });

        token
    }

    fn poll(&self, token: FetchToken) -> FetchStatus {
        let mut slots = self.slots.lock();
        let Some(slot) = slots.get(&token) else {
            // Token already consumed or never issued by this transport.
            return FetchStatus::Failed(TransportError::Network {
                url: String::new(),
                message: "unknown fetch token".to_string(),
            });
        };
        let result = slot.lock().take();
        match result {
            None => FetchStatus::Pending,
            Some(outcome) => {
                slots.remove(&token);
                match outcome {
                    Ok(bytes) => FetchStatus::Succeeded(bytes),
                    Err(err) => FetchStatus::Failed(err),
                }
            }
        }
    }

    fn abandon(&self, token: FetchToken) {
        // The spawned task still writes into its own Arc of the slot;
        // dropping the map entry is enough to release it afterwards.
        self.slots.lock().remove(&token);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_error_display() {
        let e = TransportError::Status {
            url: "http://example.com/crossdomain.xml".to_string(),
            status: 404,
        };
        assert_eq!(
            e.to_string(),
            "unexpected HTTP status 404 for http://example.com/crossdomain.xml"
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn abandoned_fetch_releases_its_slot() {
        let transport = HttpTransport::new(tokio::runtime::Handle::current());
        let url = Url::parse("http://127.0.0.1:9/crossdomain.xml").unwrap();

        let token = transport.start_fetch(&url);
        assert_eq!(transport.slots.lock().len(), 1);

        transport.abandon(token);
        assert!(transport.slots.lock().is_empty());

        // A later poll on the abandoned token is terminal, not pending.
        assert!(transport.poll(token).is_terminal());
    }

    #[test]
    fn pending_is_not_terminal() {
        assert!(!FetchStatus::Pending.is_terminal());
        assert!(FetchStatus::Succeeded(Bytes::new()).is_terminal());
        assert!(
            FetchStatus::Failed(TransportError::Timeout {
                url: "http://example.com/".to_string()
            })
            .is_terminal()
        );
    }
}
