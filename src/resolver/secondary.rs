//! Secondary-platform resolver
//!
//! Players from the secondary client ecosystem are identified by a prefixed
//! display name. The prefix-stripped name resolves through a Geyser-style
//! API (`GET {base}/v2/xbox/xuid/{gamertag}` → `{"xuid": <number>}`); the
//! stable identifier is the xuid embedded in the low 64 bits of an otherwise
//! zero UUID, the convention the secondary platform uses on the server side.

use crate::config::SecondaryPlatformConfig;
use crate::error::{ResolveError, ResolveResult};
use crate::resolver::{ResolvedProfile, SecondaryResolver};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::instrument;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
struct XuidBody {
    xuid: u64,
}

/// Resolver backed by the secondary platform's HTTP API
pub struct HttpSecondaryResolver {
    http: Client,
    base_url: String,
    prefix: String,
    timeout_secs: u64,
}

impl HttpSecondaryResolver {
    /// Create a resolver from configuration; `None` when the secondary
    /// platform is not configured
    pub fn from_config(
        config: &SecondaryPlatformConfig,
        timeout_secs: u64,
    ) -> ResolveResult<Option<Self>> {
        if !config.enabled {
            return Ok(None);
        }
        let (Some(prefix), Some(api_url)) = (&config.prefix, &config.api_url) else {
            // loader validation guarantees both when enabled
            return Ok(None);
        };

        let http = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(format!("gatelist/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(ResolveError::Network)?;

        Ok(Some(Self {
            http,
            base_url: api_url.trim_end_matches('/').to_string(),
            prefix: prefix.clone(),
            timeout_secs,
        }))
    }
}

#[async_trait]
impl SecondaryResolver for HttpSecondaryResolver {
    #[instrument(skip(self), fields(name = %name))]
    async fn resolve(&self, name: &str) -> ResolveResult<ResolvedProfile> {
        let url = format!("{}/v2/xbox/xuid/{}", self.base_url, name);

        let response = self.http.get(&url).send().await.map_err(|e| {
            if e.is_timeout() {
                ResolveError::Timeout {
                    timeout_secs: self.timeout_secs,
                }
            } else {
                ResolveError::Network(e)
            }
        })?;

        let status = response.status().as_u16();
        let retry_after = super::http::retry_after_secs(&response);
        let body = response.text().await.map_err(ResolveError::Network)?;

        if !(200..300).contains(&status) {
            return Err(ResolveError::from_status(status, name, &body, retry_after));
        }

        let parsed: XuidBody = serde_json::from_str(&body)
            .map_err(|e| ResolveError::InvalidResponse(e.to_string()))?;

        // xuid in the low 64 bits, zero high bits
        let stable_id = Uuid::from_u64_pair(0, parsed.xuid).hyphenated().to_string();

        Ok(ResolvedProfile {
            stable_id,
            // stored display name keeps the platform prefix
            canonical_name: format!("{}{}", self.prefix, name),
        })
    }
}
