//! Connection decision type.

use serde::{Deserialize, Serialize};

/// Outcome of a cross-domain policy check.
///
/// `Unknown` means resolution is incomplete (a fetch is still in
/// flight) and the caller must re-evaluate later; it is never a
/// security outcome. Once a tuple produces `Allow` or `Deny` it stays
/// terminal until the cache is explicitly cleared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    /// Resolution incomplete; poll again later.
    Unknown,
    /// The connection is permitted.
    Allow,
    /// The connection is denied.
    Deny,
}

impl Decision {
    /// Boolean convenience for the raw-socket check: `Allow` is true,
    /// everything else (including `Unknown`) is false.
    #[must_use]
    pub const fn is_allowed(self) -> bool {
        matches!(self, Self::Allow)
    }

    /// Whether this decision is terminal for its cache epoch.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Unknown)
    }
}

impl std::fmt::Display for Decision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unknown => write!(f, "unknown"),
            Self::Allow => write!(f, "allow"),
            Self::Deny => write!(f, "deny"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_allow_is_allowed() {
        assert!(Decision::Allow.is_allowed());
        assert!(!Decision::Deny.is_allowed());
        assert!(!Decision::Unknown.is_allowed());
    }

    #[test]
    fn unknown_is_not_terminal() {
        assert!(!Decision::Unknown.is_terminal());
        assert!(Decision::Allow.is_terminal());
        assert!(Decision::Deny.is_terminal());
    }

    #[test]
    fn display_is_lowercase() {
        assert_eq!(Decision::Allow.to_string(), "allow");
        assert_eq!(Decision::Deny.to_string(), "deny");
        assert_eq!(Decision::Unknown.to_string(), "unknown");
    }

    #[test]
    fn serde_roundtrip() {
        for decision in [Decision::Unknown, Decision::Allow, Decision::Deny] {
            let json = serde_json::to_string(&decision).unwrap();
            let back: Decision = serde_json::from_str(&json).unwrap();
            assert_eq!(back, decision);
        }
    }
}
