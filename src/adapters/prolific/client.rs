//! Prolific HTTP client with rate limiting.
//!
//! Every request carries the configured timeout. Callers wait on
//! [`StudyProvider::ready`] before each request; it is backed by a `governor`
//! rate limiter shared by all clones of the client, so a sweep over many tests
//! cannot burst past the provider's limits.

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use reqwest::{Client, Url};
use tracing::{debug, instrument};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{ProviderConfig, StudyRecord};
use crate::domain::ports::StudyProvider;

use super::models::ProlificStudy;

/// HTTP client for the Prolific REST API.
#[derive(Clone)]
pub struct ProlificClient {
    http: Client,
    base_url: Url,
    api_token: String,
    timeout: Duration,
    rate_limiter: Arc<DefaultDirectRateLimiter>,
}

impl std::fmt::Debug for ProlificClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProlificClient")
            .field("base_url", &self.base_url.as_str())
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl ProlificClient {
    /// Build a client from provider configuration.
    ///
    /// Fails when no API token is configured or the base URL cannot carry a path.
    pub fn from_config(config: &ProviderConfig) -> DomainResult<Self> {
        let api_token = config
            .api_token
            .clone()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| {
                DomainError::ValidationFailed(
                    "provider.api_token is not set (PANELSYNC_PROVIDER__API_TOKEN)".to_string(),
                )
            })?;

        let timeout = config.request_timeout();
        let http = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout.min(Duration::from_secs(10)))
            .build()
            .map_err(|e| DomainError::ValidationFailed(format!("failed to build HTTP client: {e}")))?;

        let base_url = Url::parse(config.base_url.trim())
            .ok()
            .filter(|u| !u.cannot_be_a_base())
            .ok_or_else(|| {
                DomainError::ValidationFailed(format!(
                    "provider.base_url is not a usable URL: {}",
                    config.base_url
                ))
            })?;

        let per_minute = NonZeroU32::new(config.requests_per_minute).unwrap_or(NonZeroU32::MIN);

        Ok(Self {
            http,
            base_url,
            api_token,
            timeout,
            rate_limiter: Arc::new(RateLimiter::direct(Quota::per_minute(per_minute))),
        })
    }

    /// `{base}/studies/{id}/` with the id percent-encoded as one path segment.
    fn study_url(&self, study_id: &str) -> DomainResult<Url> {
        if matches!(study_id.trim(), "" | "." | "..") {
            return Err(DomainError::ValidationFailed(format!(
                "invalid study id: {study_id:?}"
            )));
        }
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| {
                DomainError::ValidationFailed(format!("base URL cannot carry a path: {}", self.base_url))
            })?
            .pop_if_empty()
            .extend(["studies", study_id, ""]);
        Ok(url)
    }

    fn map_send_error(&self, study_id: &str, err: &reqwest::Error) -> DomainError {
        if err.is_timeout() {
            DomainError::ProviderTimeout {
                study_id: study_id.to_string(),
                timeout: self.timeout,
            }
        } else {
            DomainError::ProviderRequestFailed {
                study_id: study_id.to_string(),
                message: err.to_string(),
            }
        }
    }
}

#[async_trait]
impl StudyProvider for ProlificClient {
    async fn ready(&self) {
        self.rate_limiter.until_ready().await;
    }

    #[instrument(skip(self), fields(base_url = %self.base_url))]
    async fn get_study(&self, study_id: &str) -> DomainResult<StudyRecord> {
        let url = self.study_url(study_id)?;
        let resp = self
            .http
            .get(url)
            .header("Authorization", format!("Token {}", self.api_token))
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| self.map_send_error(study_id, &e))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(DomainError::ProviderRequestFailed {
                study_id: study_id.to_string(),
                message: format!("provider returned {status}: {body}"),
            });
        }

        let study: ProlificStudy = resp
            .json()
            .await
            .map_err(|e| DomainError::ProviderRequestFailed {
                study_id: study_id.to_string(),
                message: format!("unparseable study payload: {e}"),
            })?;

        debug!(study_id, status = %study.status, "Fetched study");
        Ok(study.into())
    }
}
