//! Target URI resolution and policy URL derivation.

use url::Url;

use crate::TargetUriError;

/// Well-known path the policy document is served from.
pub const POLICY_FILE_PATH: &str = "/crossdomain.xml";

/// A (host, port) pair identifying a policy scope.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HostPort {
    /// Target host, lowercase.
    pub host: String,
    /// Target port. Explicit or the scheme default; 0 when the scheme
    /// has no default.
    pub port: u16,
}

impl HostPort {
    /// Extract the host/port key of a URL. `None` when the URL carries
    /// no host (e.g. `file:` URLs).
    #[must_use]
    pub fn from_url(url: &Url) -> Option<Self> {
        let host = url.host_str()?;
        Some(Self {
            host: host.to_ascii_lowercase(),
            port: url.port_or_known_default().unwrap_or(0),
        })
    }
}

impl std::fmt::Display for HostPort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Resolve a target string against the hosting URL.
///
/// Absolute URIs parse directly. A string without a scheme is treated
/// as relative to the hosting URL's directory, i.e. everything up to
/// the last slash of the hosting path.
///
/// # Errors
///
/// Returns [`TargetUriError::Invalid`] for malformed input. This is
/// caller misuse, distinct from a `Deny` decision.
pub fn resolve_target(hosting: &Url, target: &str) -> Result<Url, TargetUriError> {
    let invalid = |source| TargetUriError::Invalid {
        uri: target.to_string(),
        source,
    };
    match Url::parse(target) {
        Ok(url) => Ok(url),
        Err(url::ParseError::RelativeUrlWithoutBase) => hosting.join(target).map_err(invalid),
        Err(err) => Err(invalid(err)),
    }
}

/// Derive the policy URL for a target: the well-known policy path at
/// the target's scheme, host, and port. Deterministic per target.
///
/// # Errors
///
/// Returns [`TargetUriError::MissingHost`] when the target has no host
/// to anchor a policy on.
pub fn policy_url(target: &Url) -> Result<Url, TargetUriError> {
    if target.cannot_be_a_base() || target.host_str().is_none() {
        return Err(TargetUriError::MissingHost(target.to_string()));
    }
    let mut url = target.clone();
    url.set_path(POLICY_FILE_PATH);
    url.set_query(None);
    url.set_fragment(None);
    Ok(url)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn relative_target_resolves_against_hosting_directory() {
        let hosting = url("https://example.com/app/index.html");
        let resolved = resolve_target(&hosting, "data.json").unwrap();
        assert_eq!(resolved.as_str(), "https://example.com/app/data.json");
    }

    #[test]
    fn absolute_target_ignores_hosting() {
        let hosting = url("https://example.com/app/index.html");
        let resolved = resolve_target(&hosting, "https://cdn.example.org/data.json").unwrap();
        assert_eq!(resolved.as_str(), "https://cdn.example.org/data.json");
    }

    #[test]
    fn malformed_target_is_a_configuration_error() {
        let hosting = url("https://example.com/app/");
        assert!(matches!(
            resolve_target(&hosting, "https://exa mple.com/x"),
            Err(TargetUriError::Invalid { .. })
        ));
    }

    #[test]
    fn policy_url_uses_well_known_path() {
        let target = url("https://cdn.example.org/deep/path/data.json?q=1#frag");
        assert_eq!(
            policy_url(&target).unwrap().as_str(),
            "https://cdn.example.org/crossdomain.xml"
        );
    }

    #[test]
    fn policy_url_keeps_explicit_port() {
        let target = url("http://example.com:8080/data");
        assert_eq!(
            policy_url(&target).unwrap().as_str(),
            "http://example.com:8080/crossdomain.xml"
        );
    }

    #[test]
    fn policy_url_requires_a_host() {
        assert!(matches!(
            policy_url(&url("file:///tmp/data.json")),
            Err(TargetUriError::MissingHost(_))
        ));
        assert!(matches!(
            policy_url(&url("data:text/plain,hello")),
            Err(TargetUriError::MissingHost(_))
        ));
    }

    #[test]
    fn host_port_key_lowercases_and_defaults() {
        let key = HostPort::from_url(&url("HTTPS://CDN.Example.ORG/x")).unwrap();
        assert_eq!(
            key,
            HostPort {
                host: "cdn.example.org".to_string(),
                port: 443,
            }
        );
        assert!(HostPort::from_url(&url("file:///tmp/x")).is_none());
    }
}
