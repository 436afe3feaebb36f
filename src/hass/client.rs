//! Home Assistant REST client
//!
//! Two endpoints are used:
//! - `POST {base}/api/services/{domain}/{service}` (bearer auth, JSON body)
//! - `GET  {base}/api/states/{entity_id}`

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::Value;
use tracing::{debug, instrument};
use url::Url;

use crate::ast::ServiceId;
use crate::error::{HearthError, Result};
use crate::util::{truncate_body, CONNECT_TIMEOUT, ERROR_BODY_LIMIT, REQUEST_TIMEOUT};

use super::types::EntityState;

/// Remote automation API used by the engine
///
/// `HassClient` in production, `MockApi` in tests.
#[async_trait]
pub trait AutomationApi: Send + Sync {
    /// Call a service; `Ok` only when the server accepted it
    async fn call_service(&self, service: &ServiceId, body: &Value) -> Result<()>;

    /// Read the current state of one entity
    async fn get_state(&self, entity_id: &str) -> Result<EntityState>;
}

/// reqwest-backed client with a shared connection pool
#[derive(Clone)]
pub struct HassClient {
    http_client: reqwest::Client,
    base_url: Arc<str>,
    token: Arc<str>,
}

impl HassClient {
    /// Create a client for `base_url` authenticated with a long-lived token
    pub fn new(base_url: &str, token: &str) -> Result<Self> {
        let parsed = Url::parse(base_url).map_err(|e| HearthError::InvalidBaseUrl {
            url: base_url.to_string(),
            reason: e.to_string(),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(HearthError::InvalidBaseUrl {
                url: base_url.to_string(),
                reason: format!("unsupported scheme '{}'", parsed.scheme()),
            });
        }

        let http_client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .connect_timeout(CONNECT_TIMEOUT)
            .user_agent(concat!("hearth/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| HearthError::ConfigError {
                reason: format!("Failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').into(),
            token: token.into(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl std::fmt::Debug for HassClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HassClient")
            .field("base_url", &self.base_url)
            .finish()
    }
}

#[async_trait]
impl AutomationApi for HassClient {
    #[instrument(skip(self, body), fields(service = %service))]
    async fn call_service(&self, service: &ServiceId, body: &Value) -> Result<()> {
        let url = self.url(&service.api_path());
        debug!(%body, "Calling service");

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&self.token)
            .json(body)
            .send()
            .await
            .map_err(|e| HearthError::Transport {
                url: url.clone(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if matches!(status, StatusCode::OK | StatusCode::CREATED) {
            return Ok(());
        }

        let text = response.text().await.unwrap_or_default();
        Err(HearthError::ServiceRejected {
            service: service.to_string(),
            status: status.as_u16(),
            body: truncate_body(&text, ERROR_BODY_LIMIT),
        })
    }

    #[instrument(skip(self))]
    async fn get_state(&self, entity_id: &str) -> Result<EntityState> {
        let url = self.url(&format!("/api/states/{}", entity_id));

        let response = self
            .http_client
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| HearthError::Transport {
                url: url.clone(),
                reason: e.to_string(),
            })?;

        if response.status() != StatusCode::OK {
            return Err(HearthError::StateUnavailable {
                entity_id: entity_id.to_string(),
                status: response.status().as_u16(),
            });
        }

        response
            .json::<EntityState>()
            .await
            .map_err(|e| HearthError::InvalidResponse {
                url,
                details: e.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_invalid_base_url() {
        assert!(matches!(
            HassClient::new("not a url", "t"),
            Err(HearthError::InvalidBaseUrl { .. })
        ));
        assert!(matches!(
            HassClient::new("ftp://ha.local", "t"),
            Err(HearthError::InvalidBaseUrl { .. })
        ));
    }

    #[test]
    fn trims_trailing_slash() {
        let client = HassClient::new("http://ha.local:8123/", "t").unwrap();
        assert_eq!(client.base_url(), "http://ha.local:8123");
        assert_eq!(
            client.url("/api/states/light.a"),
            "http://ha.local:8123/api/states/light.a"
        );
    }

    #[test]
    fn debug_hides_token() {
        let client = HassClient::new("http://ha.local", "secret-token").unwrap();
        assert!(!format!("{:?}", client).contains("secret-token"));
    }
}
