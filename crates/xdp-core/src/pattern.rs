//! Wildcard matching for policy domain and port patterns.
//!
//! The matching semantics are a fixed legacy contract: a lone `*`
//! matches everything; `*.example.com` matches `example.com` and every
//! subdomain of it; anything else is a case-insensitive exact match.
//! Port patterns are `*` or a comma list of ports and inclusive
//! `lo-hi` ranges.

use serde::Serialize;

use crate::{ParseError, ParseResult};

/// A domain pattern from an `allow-access-from` rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct DomainPattern(String);

impl DomainPattern {
    /// Create a pattern. Stored lowercase; matching is case-insensitive.
    #[must_use]
    pub fn new(pattern: &str) -> Self {
        Self(pattern.trim().to_ascii_lowercase())
    }

    /// The raw pattern text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Check whether a requester host matches this pattern.
    #[must_use]
    pub fn matches(&self, host: &str) -> bool {
        let host = host.to_ascii_lowercase();
        if self.0 == "*" {
            return true;
        }
        if let Some(suffix) = self.0.strip_prefix("*.") {
            // "*.example.com" covers the bare domain as well. Subdomain
            // matches require a '.' label boundary before the suffix.
            return host == suffix
                || (host.len() > suffix.len()
                    && host.ends_with(suffix)
                    && host.as_bytes()[host.len() - suffix.len() - 1] == b'.');
        }
        host == self.0
    }
}

impl std::fmt::Display for DomainPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An inclusive port range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PortRange {
    /// Lowest port in the range.
    pub lo: u16,
    /// Highest port in the range.
    pub hi: u16,
}

impl PortRange {
    /// Whether a port falls inside this range.
    #[must_use]
    pub const fn contains(self, port: u16) -> bool {
        self.lo <= port && port <= self.hi
    }
}

/// A port pattern from a `to-ports` attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PortPattern {
    /// `*` or an absent attribute: every port matches.
    Any,
    /// An explicit list of ports and ranges.
    Ranges(Vec<PortRange>),
}

impl PortPattern {
    /// Parse a `to-ports` attribute value, e.g. `"507,516-523"`.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::InvalidPortPattern`] for empty segments,
    /// non-numeric ports, or inverted ranges. Fail-closed: a malformed
    /// pattern fails the whole document parse.
    pub fn parse(value: &str) -> ParseResult<Self> {
        let value = value.trim();
        if value == "*" {
            return Ok(Self::Any);
        }

        let invalid = || ParseError::InvalidPortPattern(value.to_string());
        let mut ranges = Vec::new();
        for segment in value.split(',') {
            let segment = segment.trim();
            if segment.is_empty() {
                return Err(invalid());
            }
            let range = match segment.split_once('-') {
                Some((lo, hi)) => PortRange {
                    lo: lo.trim().parse().map_err(|_| invalid())?,
                    hi: hi.trim().parse().map_err(|_| invalid())?,
                },
                None => {
                    let port: u16 = segment.parse().map_err(|_| invalid())?;
                    PortRange { lo: port, hi: port }
                }
            };
            if range.lo > range.hi {
                return Err(invalid());
            }
            ranges.push(range);
        }
        if ranges.is_empty() {
            return Err(invalid());
        }
        Ok(Self::Ranges(ranges))
    }

    /// Check whether a target port matches this pattern.
    #[must_use]
    pub fn matches(&self, port: u16) -> bool {
        match self {
            Self::Any => true,
            Self::Ranges(ranges) => ranges.iter().any(|range| range.contains(port)),
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn lone_wildcard_matches_everything() {
        let pattern = DomainPattern::new("*");
        assert!(pattern.matches("example.com"));
        assert!(pattern.matches("anything.at.all"));
    }

    #[test]
    fn subdomain_wildcard_covers_base_domain() {
        let pattern = DomainPattern::new("*.example.com");
        assert!(pattern.matches("example.com"));
        assert!(pattern.matches("cdn.example.com"));
        assert!(pattern.matches("a.b.example.com"));
    }

    #[test]
    fn subdomain_wildcard_rejects_lookalikes() {
        let pattern = DomainPattern::new("*.example.com");
        assert!(!pattern.matches("example.org"));
        assert!(!pattern.matches("badexample.com"));
        assert!(!pattern.matches("example.com.evil.net"));
        assert!(!pattern.matches("xample.com"));
        assert!(!pattern.matches("com"));
    }

    #[test]
    fn exact_match_is_case_insensitive() {
        let pattern = DomainPattern::new("CDN.Example.COM");
        assert!(pattern.matches("cdn.example.com"));
        assert!(pattern.matches("CDN.EXAMPLE.COM"));
        assert!(!pattern.matches("www.example.com"));
    }

    #[test]
    fn port_pattern_wildcard() {
        let pattern = PortPattern::parse("*").unwrap();
        assert!(pattern.matches(0));
        assert!(pattern.matches(65535));
    }

    #[test]
    fn port_pattern_list_and_ranges() {
        let pattern = PortPattern::parse("507, 516-523").unwrap();
        assert!(pattern.matches(507));
        assert!(pattern.matches(516));
        assert!(pattern.matches(520));
        assert!(pattern.matches(523));
        assert!(!pattern.matches(508));
        assert!(!pattern.matches(524));
    }

    #[test]
    fn port_pattern_rejects_garbage() {
        assert!(PortPattern::parse("").is_err());
        assert!(PortPattern::parse("80,").is_err());
        assert!(PortPattern::parse("abc").is_err());
        assert!(PortPattern::parse("100-50").is_err());
        assert!(PortPattern::parse("70000").is_err());
    }

    #[test]
    fn port_pattern_single_port() {
        let pattern = PortPattern::parse("8080").unwrap();
        assert_eq!(pattern, PortPattern::Ranges(vec![PortRange { lo: 8080, hi: 8080 }]));
        assert!(pattern.matches(8080));
        assert!(!pattern.matches(8081));
    }

    proptest! {
        #[test]
        fn any_matches_every_port(port in any::<u16>()) {
            prop_assert!(PortPattern::Any.matches(port));
        }

        #[test]
        fn ports_inside_a_parsed_range_match(lo in 1u16..1000, span in 0u16..1000, offset in 0u16..1000) {
            let hi = lo.saturating_add(span);
            let pattern = PortPattern::parse(&format!("{lo}-{hi}")).unwrap();
            let sample = lo.saturating_add(offset % (span + 1));
            prop_assert!(pattern.matches(sample));
        }

        #[test]
        fn wildcard_suffix_matches_subdomains(label in "[a-z][a-z0-9]{0,10}") {
            let pattern = DomainPattern::new("*.example.com");
            let host = format!("{label}.example.com");
            prop_assert!(pattern.matches(&host));
        }
    }
}
