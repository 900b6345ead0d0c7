//! Authenticated API client
//!
//! Wraps outbound collector requests: attaches the bearer credential,
//! performs (or joins) a coordinated refresh when the access token is
//! missing or rejected, and retries the original request exactly once after
//! a successful refresh. Everything that is not an authorization failure
//! propagates immediately.

use std::sync::Arc;
use std::time::Duration;

use pagetrail_domain::constants::UPLOAD_PATH;
use pagetrail_domain::PageVisit;
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use super::auth::CredentialManager;
use super::errors::ApiError;
use crate::http::HttpClient;

/// Configuration for the API client.
#[derive(Debug, Clone)]
pub struct ApiClientConfig {
    /// Base URL for the collector API
    pub base_url: String,
    /// Transport timeout per request
    pub timeout: Duration,
}

impl Default for ApiClientConfig {
    fn default() -> Self {
        Self { base_url: "https://collector.pagetrail.dev".to_string(), timeout: Duration::from_secs(30) }
    }
}

/// Authenticated request executor for the collector API.
///
/// The refresh endpoint is never reached through this client (the
/// credential manager talks to it over the bare transport), so the
/// refresh-on-401 path cannot recurse.
pub struct ApiClient {
    http: HttpClient,
    credentials: Arc<CredentialManager>,
    config: ApiClientConfig,
}

impl ApiClient {
    /// Create a new API client.
    ///
    /// # Errors
    /// Returns `ApiError::Config` when the transport cannot be built.
    pub fn new(
        config: ApiClientConfig,
        credentials: Arc<CredentialManager>,
    ) -> Result<Self, ApiError> {
        let http = HttpClient::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ApiError::Config(format!("failed to build http client: {e}")))?;

        Ok(Self { http, credentials, config })
    }

    /// Execute an authenticated POST.
    ///
    /// `cancel` aborts only this request's network waits; a refresh shared
    /// with other callers keeps running regardless.
    ///
    /// # Errors
    /// Propagates delivery failures after at most one refresh-and-retry.
    #[instrument(skip(self, body, cancel), fields(path = %path))]
    pub async fn post<T: Serialize, R: DeserializeOwned>(
        &self,
        path: &str,
        body: &T,
        cancel: Option<&CancellationToken>,
    ) -> Result<R, ApiError> {
        let url = format!("{}{}", self.config.base_url, path);
        let body = serde_json::to_value(body)
            .map_err(|e| ApiError::Client(format!("failed to serialize body: {e}")))?;

        // Obtain a credential up front; with only a refresh token on hand,
        // join or start the coordinated refresh before the first attempt.
        let mut token = self.credentials.access_token().await.map_err(ApiError::from)?;
        if token.is_none()
            && self.credentials.refresh_token().await.map_err(ApiError::from)?.is_some()
        {
            debug!("no access token, refreshing before first attempt");
            token = self.credentials.refresh().await;
        }

        match self.attempt(&url, &body, token.as_deref(), cancel).await {
            Ok(response) => Ok(response),
            Err(err) if err.is_auth_failure() => {
                let Some(fresh) = self.credentials.refresh().await else {
                    // Refresh failed or was impossible: surface the original
                    // authorization failure.
                    return Err(err);
                };
                debug!("retrying once with refreshed token");
                self.attempt(&url, &body, Some(&fresh), cancel).await
            }
            Err(err) => Err(err),
        }
    }

    /// Deliver one visit to the collector ingestion endpoint.
    ///
    /// # Errors
    /// Propagates delivery failures after at most one refresh-and-retry.
    pub async fn upload_visit(&self, visit: &PageVisit) -> Result<(), ApiError> {
        let _: Value = self.post(UPLOAD_PATH, visit, None).await?;
        Ok(())
    }

    /// Single request round-trip: attach credential, send, classify.
    async fn attempt<R: DeserializeOwned>(
        &self,
        url: &str,
        body: &Value,
        token: Option<&str>,
        cancel: Option<&CancellationToken>,
    ) -> Result<R, ApiError> {
        let mut request = self
            .http
            .request(Method::POST, url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .json(body);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }

        let send = self.http.send(request);
        let response = match cancel {
            Some(cancel) => tokio::select! {
                () = cancel.cancelled() => {
                    debug!(%url, "request cancelled by caller");
                    return Err(ApiError::Cancelled);
                }
                result = send => result.map_err(ApiError::from)?,
            },
            None => send.await.map_err(ApiError::from)?,
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(map_status_error(status, url, &body));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ApiError::Network(format!("failed to read response body: {e}")))?;
        if bytes.is_empty() {
            // 204-style responses: deserialize the unit-ish types from null.
            serde_json::from_value(Value::Null)
                .map_err(|e| ApiError::Client(format!("empty response not deserializable: {e}")))
        } else {
            serde_json::from_slice(&bytes)
                .map_err(|e| ApiError::Client(format!("failed to parse response: {e}")))
        }
    }
}

fn map_status_error(status: StatusCode, url: &str, body: &str) -> ApiError {
    let message = if body.is_empty() {
        format!("{url} returned status {status}")
    } else {
        format!("{url} returned status {status}: {body}")
    };

    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        ApiError::Auth(message)
    } else if status.is_server_error() {
        warn!(%status, %url, "server error from collector");
        ApiError::Server(message)
    } else if status.is_client_error() {
        ApiError::Client(message)
    } else {
        ApiError::Network(message)
    }
}
