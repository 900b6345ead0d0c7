use std::time::Duration;

use pagetrail_domain::PagetrailError;
use reqwest::{Client as ReqwestClient, Method, RequestBuilder, Response};
use tracing::debug;

/// Thin HTTP client wrapper with shared configuration.
///
/// Deliberately performs no transport-level retries: every delivery and
/// refresh is a single network round-trip, and the one permitted retry on
/// authorization failure lives in the API client. Timeouts are the
/// transport's own.
#[derive(Clone)]
pub struct HttpClient {
    client: ReqwestClient,
}

impl HttpClient {
    /// Start building a new HTTP client.
    pub fn builder() -> HttpClientBuilder {
        HttpClientBuilder::default()
    }

    /// Convenience constructor with default configuration.
    ///
    /// # Errors
    /// Returns an error when the underlying client cannot be constructed.
    pub fn new() -> Result<Self, PagetrailError> {
        Self::builder().build()
    }

    /// Create a request builder using the underlying reqwest client.
    pub fn request<U>(&self, method: Method, url: U) -> RequestBuilder
    where
        U: reqwest::IntoUrl,
    {
        self.client.request(method, url)
    }

    /// Execute the provided request builder.
    ///
    /// # Errors
    /// Returns `PagetrailError::Network` when no response was received.
    pub async fn send(&self, builder: RequestBuilder) -> Result<Response, PagetrailError> {
        let request = builder
            .build()
            .map_err(|err| PagetrailError::Internal(format!("invalid request: {err}")))?;

        let method = request.method().clone();
        let url = request.url().clone();
        debug!(%method, %url, "sending HTTP request");

        match self.client.execute(request).await {
            Ok(response) => {
                debug!(%method, %url, status = %response.status(), "received HTTP response");
                Ok(response)
            }
            Err(err) => {
                debug!(%method, %url, error = %err, "HTTP request failed");
                Err(PagetrailError::Network(format!("http request failed: {err}")))
            }
        }
    }
}

/// Builder for [`HttpClient`].
#[derive(Debug)]
pub struct HttpClientBuilder {
    timeout: Duration,
    user_agent: Option<String>,
}

impl Default for HttpClientBuilder {
    fn default() -> Self {
        Self { timeout: Duration::from_secs(30), user_agent: None }
    }
}

impl HttpClientBuilder {
    /// Request timeout applied by the transport.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// User-agent header sent with every request.
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    /// Build the client.
    ///
    /// # Errors
    /// Returns an error when reqwest rejects the configuration.
    pub fn build(self) -> Result<HttpClient, PagetrailError> {
        let mut builder = ReqwestClient::builder().timeout(self.timeout).no_proxy();

        if let Some(agent) = self.user_agent {
            builder = builder.user_agent(agent);
        }

        let client = builder
            .build()
            .map_err(|err| PagetrailError::Internal(format!("failed to build http client: {err}")))?;

        Ok(HttpClient { client })
    }
}
