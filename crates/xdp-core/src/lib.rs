//! XDP Core - Cross-domain policy domain model
//!
//! This crate holds the pure, I/O-free half of the cross-domain policy
//! engine:
//!
//! - **Decisions**: the three-valued [`Decision`] returned by every check
//! - **Policy documents**: [`PolicyDocument`] parsing and rule evaluation
//! - **Patterns**: [`DomainPattern`] and [`PortPattern`] wildcard matching
//! - **Targets**: requester [`Origin`], [`SecurityContext`], target URI
//!   resolution and policy URL derivation
//!
//! Fetching, caching, and the resolution state machine live in
//! `xdp-engine`; this crate never performs network I/O.
//!
//! # Quick Start
//!
//! ```rust
//! use xdp_core::{Origin, PolicyDocument};
//!
//! let doc = PolicyDocument::parse(
//!     br#"<cross-domain-policy>
//!           <allow-access-from domain="*.example.com"/>
//!         </cross-domain-policy>"#,
//! ).unwrap();
//!
//! let requester = Origin::new("https", "cdn.example.com", Some(443));
//! assert!(doc.allows(&requester, 443, false));
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

mod context;
mod decision;
mod document;
mod error;
mod pattern;
mod target;

pub use context::*;
pub use decision::*;
pub use document::*;
pub use error::*;
pub use pattern::*;
pub use target::*;
