//! Policy engine error types.

/// Errors raised while resolving a target URI.
///
/// These indicate caller misuse (malformed input) and are deliberately
/// distinct from a `Deny` decision.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TargetUriError {
    /// The target string could not be parsed as a URI.
    #[error("invalid target URI '{uri}': {source}")]
    Invalid {
        /// The offending target string.
        uri: String,
        /// Underlying URL parse error.
        source: url::ParseError,
    },

    /// The target URI carries no host to key a policy on.
    #[error("target URI '{0}' has no host")]
    MissingHost(String),
}

/// Errors raised while parsing a policy document.
///
/// Parsing is fail-closed: any of these maps to `Deny` at the resolver
/// boundary rather than a partially populated document.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ParseError {
    /// The byte stream is not well-formed XML.
    #[error("malformed policy XML: {0}")]
    Xml(String),

    /// The document root is not `cross-domain-policy`.
    #[error("unexpected root element '{0}'")]
    UnexpectedRoot(String),

    /// The document contains no root element at all.
    #[error("policy document has no root element")]
    MissingRoot,

    /// An `allow-access-from` rule is missing its `domain` attribute.
    #[error("allow-access-from rule is missing its domain attribute")]
    MissingDomain,

    /// A `to-ports` attribute could not be parsed.
    #[error("invalid port pattern '{0}'")]
    InvalidPortPattern(String),

    /// A `site-control` element carries an unrecognized value.
    #[error("unknown site-control value '{0}'")]
    UnknownSiteControl(String),

    /// The document contains no recognizable policy sections.
    #[error("policy document contains no recognizable sections")]
    EmptyPolicy,
}

/// Result type for policy document parsing.
pub type ParseResult<T> = Result<T, ParseError>;
