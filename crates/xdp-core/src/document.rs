//! Policy document parsing and rule evaluation.
//!
//! The grammar is a fixed legacy contract (the Adobe cross-domain
//! policy subset the decision contract needs): a `cross-domain-policy`
//! root, an optional `site-control` element, and `allow-access-from`
//! rules in document order. Parsing is fail-closed: a structural error
//! anywhere fails the whole document.

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use serde::Serialize;

use crate::{DomainPattern, Origin, ParseError, ParseResult, PortPattern};

/// Meta-policy from the `site-control` element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SiteControl {
    /// Any policy file on the host is honored.
    All,
    /// Only policy files served with a policy content type.
    ByContentType,
    /// FTP: only policy files matching a filename convention.
    ByFtpFilename,
    /// Only the master policy file is honored.
    MasterOnly,
    /// No policy files are honored; an explicit deny-all.
    None,
}

impl SiteControl {
    fn parse(value: &str) -> ParseResult<Self> {
        match value {
            "all" => Ok(Self::All),
            "by-content-type" => Ok(Self::ByContentType),
            "by-ftp-filename" => Ok(Self::ByFtpFilename),
            "master-only" => Ok(Self::MasterOnly),
            "none" => Ok(Self::None),
            other => Err(ParseError::UnknownSiteControl(other.to_string())),
        }
    }
}

/// One `allow-access-from` rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccessRule {
    /// Requester hosts this rule grants access to.
    pub domain: DomainPattern,
    /// Target ports this rule covers.
    pub ports: PortPattern,
    /// When false, the rule also grants non-TLS requesters access to a
    /// TLS-served policy (`secure="false"` in the grammar).
    pub secure: bool,
}

/// A parsed policy document: an ordered rule set plus validity
/// metadata. Immutable after parse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PolicyDocument {
    site_control: Option<SiteControl>,
    rules: Vec<AccessRule>,
}

impl PolicyDocument {
    /// Parse an untrusted byte stream into a policy document.
    ///
    /// # Errors
    ///
    /// Fail-closed: malformed XML, a wrong root element, a rule
    /// missing its `domain` attribute, a malformed `to-ports` value,
    /// or a document with no recognizable sections all fail the parse.
    pub fn parse(bytes: &[u8]) -> ParseResult<Self> {
        let text = std::str::from_utf8(bytes).map_err(|err| ParseError::Xml(err.to_string()))?;
        let mut reader = Reader::from_str(text);

        let mut depth = 0usize;
        let mut root_seen = false;
        let mut site_control = None;
        let mut rules = Vec::new();

        loop {
            match reader.read_event() {
                Err(err) => return Err(ParseError::Xml(err.to_string())),
                Ok(Event::Eof) => break,
                Ok(Event::Start(element)) => {
                    if depth == 0 {
                        check_root(&element)?;
                        root_seen = true;
                    } else if depth == 1 {
                        read_section(&element, &mut site_control, &mut rules)?;
                    }
                    depth += 1;
                }
                Ok(Event::Empty(element)) => {
                    if depth == 0 {
                        check_root(&element)?;
                        root_seen = true;
                    } else if depth == 1 {
                        read_section(&element, &mut site_control, &mut rules)?;
                    }
                }
                Ok(Event::End(_)) => depth = depth.saturating_sub(1),
                Ok(_) => {}
            }
        }

        if !root_seen {
            return Err(ParseError::MissingRoot);
        }
        if site_control.is_none() && rules.is_empty() {
            return Err(ParseError::EmptyPolicy);
        }

        Ok(Self {
            site_control,
            rules,
        })
    }

    /// The `site-control` meta-policy, if the document declares one.
    #[must_use]
    pub const fn site_control(&self) -> Option<SiteControl> {
        self.site_control
    }

    /// The rules in document order.
    #[must_use]
    pub fn rules(&self) -> &[AccessRule] {
        &self.rules
    }

    /// Whether this document explicitly denies all cross-domain access.
    #[must_use]
    pub fn is_deny_all(&self) -> bool {
        self.site_control == Some(SiteControl::None)
    }

    /// Evaluate the rule set: a requester is allowed iff at least one
    /// rule's domain pattern matches its host and the rule's port
    /// pattern matches the target port. Any match wins; document order
    /// carries no semantic tie-break. A deny-all document ignores its
    /// rules.
    ///
    /// `target_is_secure` marks a TLS-served policy; such a policy only
    /// grants non-TLS requesters rules carrying `secure="false"`.
    #[must_use]
    pub fn allows(&self, requester: &Origin, target_port: u16, target_is_secure: bool) -> bool {
        if self.is_deny_all() {
            return false;
        }
        self.rules.iter().any(|rule| {
            rule.domain.matches(&requester.host)
                && rule.ports.matches(target_port)
                && (!target_is_secure || requester.is_secure() || !rule.secure)
        })
    }
}

fn check_root(element: &BytesStart<'_>) -> ParseResult<()> {
    if element.name().as_ref() == b"cross-domain-policy" {
        Ok(())
    } else {
        Err(ParseError::UnexpectedRoot(
            String::from_utf8_lossy(element.name().as_ref()).into_owned(),
        ))
    }
}

fn read_section(
    element: &BytesStart<'_>,
    site_control: &mut Option<SiteControl>,
    rules: &mut Vec<AccessRule>,
) -> ParseResult<()> {
    match element.name().as_ref() {
        b"allow-access-from" => {
            let domain = attribute(element, "domain")?.ok_or(ParseError::MissingDomain)?;
            let ports = match attribute(element, "to-ports")? {
                Some(value) => PortPattern::parse(&value)?,
                None => PortPattern::Any,
            };
            let secure = attribute(element, "secure")?.as_deref() != Some("false");
            rules.push(AccessRule {
                domain: DomainPattern::new(&domain),
                ports,
                secure,
            });
        }
        b"site-control" => {
            let value = attribute(element, "permitted-cross-domain-policies")?
                .ok_or_else(|| ParseError::UnknownSiteControl(String::new()))?;
            *site_control = Some(SiteControl::parse(&value)?);
        }
        // Unknown sections (request headers and the like) are outside
        // the decision contract and skipped.
        _ => {}
    }
    Ok(())
}

fn attribute(element: &BytesStart<'_>, name: &str) -> ParseResult<Option<String>> {
    let Some(attr) = element
        .try_get_attribute(name)
        .map_err(|err| ParseError::Xml(err.to_string()))?
    else {
        return Ok(None);
    };
    let value = attr
        .unescape_value()
        .map_err(|err| ParseError::Xml(err.to_string()))?;
    Ok(Some(value.into_owned()))
}
