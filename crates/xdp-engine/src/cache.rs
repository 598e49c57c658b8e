//! Epoch-tagged policy cache.
//!
//! Two independent maps behind one lock: resolved policy outcomes
//! keyed by (host, port), and in-flight fetch handles keyed by policy
//! URL. A clear drops both and bumps the epoch; completions tagged
//! with a stale epoch are discarded instead of repopulating the
//! cleared cache.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use url::Url;

use xdp_core::{HostPort, PolicyDocument};

/// Cache generation counter, incremented on every clear.
pub type Epoch = u64;

/// Resolved outcome for a (host, port) pair.
#[derive(Debug, Clone)]
pub enum PolicyOutcome {
    /// A parsed policy document; evaluation is pure from here on.
    Available(Arc<PolicyDocument>),
    /// The fetch or parse failed. Remembered so the failure is not
    /// retried within this epoch; evaluates to `Deny`.
    Unavailable,
}

/// Bookkeeping for one in-flight policy fetch, tagged with the epoch
/// current when it began.
#[derive(Debug, Clone, Copy)]
pub struct FetchHandle {
    epoch: Epoch,
}

impl FetchHandle {
    /// Create a handle for a fetch starting in the given epoch.
    #[must_use]
    pub const fn new(epoch: Epoch) -> Self {
        Self { epoch }
    }

    /// The epoch this fetch began in.
    #[must_use]
    pub const fn epoch(&self) -> Epoch {
        self.epoch
    }
}

#[derive(Default)]
struct CacheInner {
    epoch: Epoch,
    resolved: HashMap<HostPort, PolicyOutcome>,
    in_flight: HashMap<Url, FetchHandle>,
}

/// The policy cache. Safe under concurrent access from evaluators and
/// completion paths; the only mutable shared state in the engine.
#[derive(Default)]
pub struct PolicyCache {
    inner: Mutex<CacheInner>,
}

impl PolicyCache {
    /// Create an empty cache at epoch zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current cache epoch.
    #[must_use]
    pub fn epoch(&self) -> Epoch {
        self.inner.lock().epoch
    }

    /// Look up the resolved outcome for a host/port.
    #[must_use]
    pub fn get_resolved(&self, key: &HostPort) -> Option<PolicyOutcome> {
        self.inner.lock().resolved.get(key).cloned()
    }

    /// Store a resolved outcome. Set-once per key within an epoch:
    /// first writer wins, a later put for the same key is a no-op.
    pub fn put_resolved(&self, key: HostPort, outcome: PolicyOutcome) {
        self.inner.lock().resolved.entry(key).or_insert(outcome);
    }

    /// Look up the in-flight handle for a policy URL.
    #[must_use]
    pub fn get_in_flight(&self, url: &Url) -> Option<FetchHandle> {
        self.inner.lock().in_flight.get(url).copied()
    }

    /// Record an in-flight fetch for a policy URL.
    pub fn put_in_flight(&self, url: Url, handle: FetchHandle) {
        self.inner.lock().in_flight.insert(url, handle);
    }

    /// Remove the in-flight handle once its result has been consumed.
    pub fn remove_in_flight(&self, url: &Url) -> Option<FetchHandle> {
        self.inner.lock().in_flight.remove(url)
    }

    /// Drop both maps and advance the epoch. Invoked by the embedding
    /// application when its security context changes, so no stale
    /// cross-session policy leaks into the next one.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.resolved.clear();
        inner.in_flight.clear();
        inner.epoch += 1;
    }
}
