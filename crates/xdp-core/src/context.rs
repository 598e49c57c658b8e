//! Requester origin and the embedding application's security context.

use serde::Serialize;
use url::Url;

/// A requester origin: scheme, host, and optional port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Origin {
    /// URI scheme, lowercase.
    pub scheme: String,
    /// Host, lowercase.
    pub host: String,
    /// Port, if one is known for the scheme.
    pub port: Option<u16>,
}

impl Origin {
    /// Build an origin from parts.
    #[must_use]
    pub fn new(scheme: &str, host: &str, port: Option<u16>) -> Self {
        Self {
            scheme: scheme.to_ascii_lowercase(),
            host: host.to_ascii_lowercase(),
            port,
        }
    }

    /// Derive the origin of a URL. The host may be empty for
    /// non-network schemes such as `file`.
    #[must_use]
    pub fn from_url(url: &Url) -> Self {
        Self {
            scheme: url.scheme().to_string(),
            host: url.host_str().unwrap_or_default().to_ascii_lowercase(),
            port: url.port_or_known_default(),
        }
    }

    /// Whether this origin uses a TLS-protected scheme.
    #[must_use]
    pub fn is_secure(&self) -> bool {
        self.scheme == "https"
    }
}

impl std::fmt::Display for Origin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.port {
            Some(port) => write!(f, "{}://{}:{}", self.scheme, self.host, port),
            None => write!(f, "{}://{}", self.scheme, self.host),
        }
    }
}

/// The embedding application's own hosting context.
///
/// Read-only after construction; an input to every evaluation, never
/// mutated by the resolver.
#[derive(Debug, Clone)]
pub struct SecurityContext {
    hosting_url: Url,
    tooling: bool,
    standalone_player: bool,
    enforcement_enabled: bool,
}

impl SecurityContext {
    /// Create a context for a hosting URL with enforcement enabled and
    /// no tooling/standalone flags set.
    #[must_use]
    pub const fn new(hosting_url: Url) -> Self {
        Self {
            hosting_url,
            tooling: false,
            standalone_player: false,
            enforcement_enabled: true,
        }
    }

    /// Mark this as an editor/tooling context. File-scheme targets are
    /// always permitted in tooling contexts.
    #[must_use]
    pub const fn with_tooling(mut self, tooling: bool) -> Self {
        self.tooling = tooling;
        self
    }

    /// Mark this as a standalone-player context.
    #[must_use]
    pub const fn with_standalone_player(mut self, standalone: bool) -> Self {
        self.standalone_player = standalone;
        self
    }

    /// Toggle policy enforcement. When disabled, every evaluation
    /// short-circuits to `Allow`; the embedding application asserts it
    /// owns all security decisions.
    #[must_use]
    pub const fn with_enforcement(mut self, enabled: bool) -> Self {
        self.enforcement_enabled = enabled;
        self
    }

    /// The hosting URL relative targets resolve against.
    #[must_use]
    pub const fn hosting_url(&self) -> &Url {
        &self.hosting_url
    }

    /// Whether this is an editor/tooling context.
    #[must_use]
    pub const fn is_tooling(&self) -> bool {
        self.tooling
    }

    /// Whether this is a standalone-player context.
    #[must_use]
    pub const fn is_standalone_player(&self) -> bool {
        self.standalone_player
    }

    /// Whether policy enforcement is enabled.
    #[must_use]
    pub const fn enforcement_enabled(&self) -> bool {
        self.enforcement_enabled
    }

    /// Whether the hosting URL itself is file-scheme.
    #[must_use]
    pub fn hosting_is_file(&self) -> bool {
        self.hosting_url.scheme() == "file"
    }

    /// The requester origin derived from the hosting URL.
    #[must_use]
    pub fn origin(&self) -> Origin {
        Origin::from_url(&self.hosting_url)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn context(url: &str) -> SecurityContext {
        SecurityContext::new(Url::parse(url).unwrap())
    }

    #[test]
    fn origin_from_hosting_url() {
        let ctx = context("https://Example.COM/app/index.html");
        assert_eq!(ctx.origin(), Origin::new("https", "example.com", Some(443)));
    }

    #[test]
    fn origin_keeps_explicit_port() {
        let ctx = context("http://example.com:8080/app");
        assert_eq!(ctx.origin().port, Some(8080));
    }

    #[test]
    fn file_hosting_detected() {
        assert!(context("file:///work/project.xfl").hosting_is_file());
        assert!(!context("https://example.com/").hosting_is_file());
    }

    #[test]
    fn flags_default_off() {
        let ctx = context("https://example.com/");
        assert!(!ctx.is_tooling());
        assert!(!ctx.is_standalone_player());
        assert!(ctx.enforcement_enabled());
    }

    #[test]
    fn origin_display() {
        let origin = Origin::new("https", "example.com", Some(443));
        assert_eq!(origin.to_string(), "https://example.com:443");
        let bare = Origin::new("file", "", None);
        assert_eq!(bare.to_string(), "file://");
    }
}
