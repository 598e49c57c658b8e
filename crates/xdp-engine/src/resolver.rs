//! The policy resolution state machine.

use std::sync::Arc;

use tracing::{debug, warn};

use xdp_core::{
    Decision, HostPort, Origin, PolicyDocument, SecurityContext, TargetUriError, policy_url,
    resolve_target,
};

use crate::{FetchHandle, FetchStatus, PolicyCache, PolicyOutcome, PolicyProvider};

/// Decides whether a network connection from a requesting origin to a
/// target host/port is permitted, fetching and caching the target's
/// policy document as needed.
///
/// `evaluate` never blocks: when the policy is still being fetched it
/// returns [`Decision::Unknown`] and the caller re-invokes on a later
/// tick. For a fixed (host, port, requester) tuple decisions are
/// monotone within a cache epoch.
pub struct PolicyResolver {
    context: SecurityContext,
    cache: Arc<PolicyCache>,
    provider: PolicyProvider,
}

impl PolicyResolver {
    /// Bind a resolver to its security context, cache, and provider.
    #[must_use]
    pub const fn new(
        context: SecurityContext,
        cache: Arc<PolicyCache>,
        provider: PolicyProvider,
    ) -> Self {
        Self {
            context,
            cache,
            provider,
        }
    }

    /// The security context this resolver evaluates under.
    #[must_use]
    pub const fn context(&self) -> &SecurityContext {
        &self.context
    }

    /// The cache this resolver populates.
    #[must_use]
    pub fn cache(&self) -> &Arc<PolicyCache> {
        &self.cache
    }

    /// Evaluate whether `requester` may connect to the target.
    ///
    /// `target` may be absolute or relative to the hosting URL. All
    /// transport and parse failures are absorbed here and normalized to
    /// `Deny`; only malformed input surfaces as an error.
    ///
    /// # Errors
    ///
    /// Returns [`TargetUriError`] when the target string is malformed —
    /// caller misuse, not a security outcome.
    pub fn evaluate(&self, target: &str, requester: &Origin) -> Result<Decision, TargetUriError> {
        if !self.context.enforcement_enabled() {
            return Ok(Decision::Allow);
        }

        let target_url = resolve_target(self.context.hosting_url(), target)?;
        if target_url.scheme() == "file" {
            // Pure function of the security context; no cache, no I/O.
            return Ok(self.file_decision());
        }

        let key = HostPort::from_url(&target_url)
            .ok_or_else(|| TargetUriError::MissingHost(target_url.to_string()))?;
        let target_is_secure = target_url.scheme() == "https";

        if let Some(outcome) = self.cache.get_resolved(&key) {
            return Ok(Self::decide(&outcome, requester, key.port, target_is_secure));
        }

        let policy = policy_url(&target_url)?;
        let handle = self
            .cache
            .get_in_flight(&policy)
            .unwrap_or_else(|| FetchHandle::new(self.cache.epoch()));

        match self.provider.poll(&policy) {
            FetchStatus::Pending => {
                self.cache.put_in_flight(policy, handle);
                Ok(Decision::Unknown)
            }
            FetchStatus::Failed(err) => {
                self.cache.remove_in_flight(&policy);
                if handle.epoch() != self.cache.epoch() {
                    debug!(url = %policy, "discarding stale-epoch fetch failure");
                    return Ok(Decision::Unknown);
                }
                warn!(url = %policy, error = %err, "policy fetch failed, denying");
                self.cache.put_resolved(key, PolicyOutcome::Unavailable);
                Ok(Decision::Deny)
            }
            FetchStatus::Succeeded(bytes) => {
                self.cache.remove_in_flight(&policy);
                if handle.epoch() != self.cache.epoch() {
                    debug!(url = %policy, "discarding stale-epoch fetch result");
                    return Ok(Decision::Unknown);
                }
                // Proceed to parse-and-decide within this call rather
                // than re-entering the public entry point.
                match PolicyDocument::parse(&bytes) {
                    Err(err) => {
                        warn!(url = %policy, error = %err, "policy parse failed, denying");
                        self.cache.put_resolved(key, PolicyOutcome::Unavailable);
                        Ok(Decision::Deny)
                    }
                    Ok(document) => {
                        debug!(url = %policy, rules = document.rules().len(), "policy cached");
                        self.cache.put_resolved(
                            key.clone(),
                            PolicyOutcome::Available(Arc::new(document)),
                        );
                        // First writer wins; evaluate whatever landed.
                        let outcome = self
                            .cache
                            .get_resolved(&key)
                            .unwrap_or(PolicyOutcome::Unavailable);
                        Ok(Self::decide(&outcome, requester, key.port, target_is_secure))
                    }
                }
            }
        }
    }

    /// Raw-socket convenience check: `Allow` is true, everything else
    /// (`Deny`, `Unknown`, malformed input) is false.
    #[must_use]
    pub fn allows_connection(&self, target: &str, requester: &Origin) -> bool {
        match self.evaluate(target, requester) {
            Ok(decision) => decision.is_allowed(),
            Err(err) => {
                warn!(target, error = %err, "connection check on malformed target");
                false
            }
        }
    }

    /// Drive one resolution step for the target's policy and report
    /// whether a policy document has been obtained and is not an
    /// explicit deny-all. False while the fetch is still pending.
    ///
    /// # Errors
    ///
    /// Returns [`TargetUriError`] when the target string is malformed.
    pub fn prefetch(&self, target: &str) -> Result<bool, TargetUriError> {
        let requester = self.context.origin();
        let _ = self.evaluate(target, &requester)?;

        let target_url = resolve_target(self.context.hosting_url(), target)?;
        let Some(key) = HostPort::from_url(&target_url) else {
            return Ok(false);
        };
        Ok(match self.cache.get_resolved(&key) {
            Some(PolicyOutcome::Available(document)) => !document.is_deny_all(),
            _ => false,
        })
    }

    /// Clear the cache (advancing its epoch) and abandon all provider
    /// bookkeeping; the only cancellation primitive.
    pub fn clear(&self) {
        self.cache.clear();
        self.provider.abandon_all();
        debug!(epoch = self.cache.epoch(), "policy cache cleared");
    }

    fn file_decision(&self) -> Decision {
        if self.context.is_tooling() {
            Decision::Allow
        } else if self.context.is_standalone_player() && self.context.hosting_is_file() {
            Decision::Allow
        } else {
            Decision::Deny
        }
    }

    fn decide(
        outcome: &PolicyOutcome,
        requester: &Origin,
        target_port: u16,
        target_is_secure: bool,
    ) -> Decision {
        match outcome {
            PolicyOutcome::Unavailable => Decision::Deny,
            PolicyOutcome::Available(document) => {
                if document.allows(requester, target_port, target_is_secure) {
                    Decision::Allow
                } else {
                    Decision::Deny
                }
            }
        }
    }
}
