//! External resolution collaborators
//!
//! A mutable display name is only usable as a list key after resolution to
//! its immutable stable identifier. Resolution is asynchronous, cancellable
//! through its timeout, and decoupled from any transport callback shape: it
//! returns a value, and the engine re-checks store state after it completes.

mod domain;
mod http;
mod secondary;

pub use domain::{DomainProber, DnsProber};
pub use http::HttpProfileResolver;
pub use secondary::HttpSecondaryResolver;

use crate::error::ResolveResult;
use async_trait::async_trait;

/// Outcome of a successful name resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedProfile {
    /// Canonical hyphenated 128-bit stable identifier
    pub stable_id: String,
    /// The name as the authority spells it (casing may differ from input)
    pub canonical_name: String,
}

/// Resolver for primary-platform names
// async_trait required for dyn-compatibility with Arc<dyn ProfileResolver>
#[async_trait]
pub trait ProfileResolver: Send + Sync {
    /// Resolve a display name to its stable identifier
    async fn resolve(&self, name: &str) -> ResolveResult<ResolvedProfile>;
}

/// Resolver for secondary-platform names (prefix already stripped)
#[async_trait]
pub trait SecondaryResolver: Send + Sync {
    /// Resolve a secondary-platform name to its stable identifier
    async fn resolve(&self, name: &str) -> ResolveResult<ResolvedProfile>;
}
