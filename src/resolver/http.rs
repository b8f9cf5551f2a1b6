//! HTTP profile resolver
//!
//! Resolves a primary-platform display name against a Mojang-style profile
//! API: `GET {base}/users/profiles/minecraft/{name}` answering
//! `{"id": "<32 hex>", "name": "<canonical>"}`. An unknown name answers
//! 404 (or, historically, 204 No Content); both map to `NotFound`. A 429
//! maps to `RateLimited`, never `NotFound`.

use crate::config::ResolverConfig;
use crate::error::{ResolveError, ResolveResult};
use crate::resolver::{ProfileResolver, ResolvedProfile};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, instrument};
use uuid::Uuid;

/// Profile body returned by the lookup service
#[derive(Debug, Deserialize)]
struct ProfileBody {
    id: String,
    name: String,
}

/// Error body some services return with HTTP 200
#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: Option<String>,
    #[serde(rename = "errorMessage")]
    error_message: Option<String>,
}

/// Resolver backed by an HTTP profile API
pub struct HttpProfileResolver {
    http: Client,
    config: ResolverConfig,
    timeout_secs: u64,
}

impl HttpProfileResolver {
    /// Create a resolver from configuration
    pub fn new(config: &ResolverConfig) -> ResolveResult<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .pool_max_idle_per_host(4)
            .user_agent(format!("gatelist/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(ResolveError::Network)?;

        Ok(Self {
            http,
            config: config.clone(),
            timeout_secs: config.timeout_secs,
        })
    }

    fn map_send_error(&self, err: reqwest::Error) -> ResolveError {
        if err.is_timeout() {
            ResolveError::Timeout {
                timeout_secs: self.timeout_secs,
            }
        } else {
            ResolveError::Network(err)
        }
    }
}

/// Seconds from a Retry-After header, if present and delta-seconds form
pub(crate) fn retry_after_secs(response: &reqwest::Response) -> Option<u64> {
    response
        .headers()
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}

/// Canonicalize a possibly-undashed 32-hex identifier to hyphenated form
pub(crate) fn canonical_stable_id(raw: &str) -> ResolveResult<String> {
    let id = Uuid::parse_str(raw)
        .map_err(|e| ResolveError::InvalidResponse(format!("bad stable id '{raw}': {e}")))?;
    Ok(id.hyphenated().to_string())
}

#[async_trait]
impl ProfileResolver for HttpProfileResolver {
    #[instrument(skip(self), fields(name = %name))]
    async fn resolve(&self, name: &str) -> ResolveResult<ResolvedProfile> {
        let url = self.config.profile_endpoint(name);

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        let status = response.status().as_u16();
        let retry_after = retry_after_secs(&response);
        let body = response.text().await.map_err(ResolveError::Network)?;

        if !(200..300).contains(&status) || body.is_empty() {
            return Err(ResolveError::from_status(status, name, &body, retry_after));
        }

        // Some services answer 200 with an error body
        if let Ok(err) = serde_json::from_str::<ErrorBody>(&body)
            && err.error.is_some()
        {
            debug!(error = ?err.error_message, "Lookup service reported an error body");
            return Err(ResolveError::NotFound {
                name: name.to_string(),
            });
        }

        let profile: ProfileBody = serde_json::from_str(&body)
            .map_err(|e| ResolveError::InvalidResponse(e.to_string()))?;

        Ok(ResolvedProfile {
            stable_id: canonical_stable_id(&profile.id)?,
            canonical_name: profile.name,
        })
    }
}
