//! XDP Engine - Cross-domain policy resolution
//!
//! The engine decides, for a requesting origin and a target host/port,
//! whether a network connection is permitted, based on a remotely
//! hosted policy document that is fetched, parsed, and cached:
//!
//! - **[`PolicyTransport`]**: the non-blocking fetch capability
//!   (`start_fetch`/`poll`); [`HttpTransport`] is the reqwest-backed
//!   implementation
//! - **[`PolicyProvider`]**: issues at most one underlying download per
//!   policy URL and adapts it to the three-state [`FetchStatus`]
//! - **[`PolicyCache`]**: epoch-tagged resolved-policy and in-flight
//!   maps
//! - **[`PolicyResolver`]**: the evaluation state machine
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use xdp_core::SecurityContext;
//! use xdp_engine::{HttpTransport, PolicyCache, PolicyProvider, PolicyResolver};
//!
//! let context = SecurityContext::new("https://example.com/app".parse()?);
//! let transport = Arc::new(HttpTransport::new(tokio::runtime::Handle::current()));
//! let resolver = PolicyResolver::new(
//!     context,
//!     Arc::new(PolicyCache::new()),
//!     PolicyProvider::queued(transport),
//! );
//!
//! // Poll until the fetch completes; evaluate never blocks.
//! let requester = resolver.context().origin();
//! let decision = resolver.evaluate("https://cdn.example.org/data.json", &requester)?;
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

mod cache;
mod provider;
mod resolver;
mod transport;

pub use cache::*;
pub use provider::*;
pub use resolver::*;
pub use transport::*;
