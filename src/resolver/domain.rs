//! Domain reachability probe
//!
//! A domain add is validated by forward-resolving the domain; the entry is
//! still keyed by the literal domain string, never the resolved address.

use async_trait::async_trait;
use tracing::debug;

/// Default game port appended for the lookup
const PROBE_PORT: u16 = 25565;

/// Forward-resolvability check for domain adds
#[async_trait]
pub trait DomainProber: Send + Sync {
    /// Whether the domain currently resolves to at least one address
    async fn probe(&self, domain: &str) -> bool;
}

/// System-resolver-backed probe
#[derive(Debug, Default, Clone, Copy)]
pub struct DnsProber;

#[async_trait]
impl DomainProber for DnsProber {
    async fn probe(&self, domain: &str) -> bool {
        match tokio::net::lookup_host((domain, PROBE_PORT)).await {
            Ok(mut addrs) => addrs.next().is_some(),
            Err(e) => {
                debug!(domain = %domain, error = %e, "Domain did not resolve");
                false
            }
        }
    }
}
