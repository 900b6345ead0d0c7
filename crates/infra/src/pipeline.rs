//! Delivery pipeline
//!
//! Composition root: wires the state store, credential manager, API
//! client, upload queue, archive, and tracking service into one facade
//! the host embeds. The host feeds it visit and session events; the
//! pipeline handles gating, batching, delivery, and backlog recovery.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use pagetrail_core::storage::StateStore;
use pagetrail_core::{Settings, TrackingService};
use pagetrail_domain::{AuthSignal, PageVisit, Result, SessionId};
use tokio::sync::broadcast;
use tracing::info;

use crate::api::{ApiClient, ApiClientConfig, CredentialManager};
use crate::archive::CsvArchive;
use crate::http::HttpClient;
use crate::notify::NotificationHub;
use crate::sync::{UploadQueue, Uploader};

pub struct DeliveryPipeline {
    tracking: TrackingService,
    uploader: Arc<Uploader>,
    credentials: Arc<CredentialManager>,
    archive: Arc<CsvArchive>,
    hub: Arc<NotificationHub>,
}

impl DeliveryPipeline {
    /// Start configuring a pipeline over the given state store.
    pub fn builder(store: Arc<dyn StateStore>) -> DeliveryPipelineBuilder {
        DeliveryPipelineBuilder {
            store,
            config: ApiClientConfig::default(),
            refresh_path: pagetrail_domain::constants::REFRESH_PATH.to_string(),
        }
    }

    /// Feed one observed page visit through the pipeline.
    ///
    /// # Errors
    /// Returns storage errors; delivery failures are absorbed by queueing.
    pub async fn handle_visit(
        &self,
        session: Option<SessionId>,
        visit: PageVisit,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.tracking.handle_visit(session, visit, now).await
    }

    /// Tell the pipeline a session ended, emitting its held visit when the
    /// dwell threshold was met.
    ///
    /// # Errors
    /// Returns storage errors; delivery failures are absorbed by queueing.
    pub async fn session_closed(&self, session: SessionId, now: DateTime<Utc>) -> Result<()> {
        self.tracking.session_closed(session, now).await
    }

    /// Attempt delivery of any queued backlog. Call at startup and on
    /// connectivity or sign-in changes. Returns the number delivered.
    ///
    /// # Errors
    /// Returns storage errors from the backing store.
    pub async fn drain_backlog(&self) -> Result<usize> {
        self.uploader.drain_backlog().await
    }

    /// Store a credential pair after the host completes a sign-in.
    ///
    /// # Errors
    /// Returns storage errors from the backing store.
    pub async fn store_tokens(&self, access: String, refresh: Option<String>) -> Result<()> {
        self.credentials.store_tokens(access, refresh).await
    }

    /// Forget all credentials.
    ///
    /// # Errors
    /// Returns storage errors from the backing store.
    pub async fn clear_tokens(&self) -> Result<()> {
        self.credentials.clear_tokens().await
    }

    /// Subscribe to authentication signals.
    #[must_use]
    pub fn subscribe_auth(&self) -> broadcast::Receiver<AuthSignal> {
        self.hub.subscribe()
    }

    /// Export the local CSV archive.
    ///
    /// # Errors
    /// Returns storage errors from the backing store.
    pub async fn export_archive(&self) -> Result<String> {
        self.archive.export().await
    }

    /// Clear the local CSV archive.
    ///
    /// # Errors
    /// Returns storage errors from the backing store.
    pub async fn clear_archive(&self) -> Result<()> {
        self.archive.clear().await
    }
}

pub struct DeliveryPipelineBuilder {
    store: Arc<dyn StateStore>,
    config: ApiClientConfig,
    refresh_path: String,
}

impl DeliveryPipelineBuilder {
    /// Base URL of the collector API.
    #[must_use]
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.config.base_url = base_url.into();
        self
    }

    /// Transport timeout per request.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Build the pipeline, seeding default settings for any key the store
    /// does not already hold.
    ///
    /// # Errors
    /// Returns an error when the transport cannot be built or the settings
    /// seed fails.
    pub async fn build(self) -> Result<DeliveryPipeline> {
        Settings::ensure_defaults(self.store.as_ref()).await?;

        let hub = Arc::new(NotificationHub::new());
        let refresh_url = format!("{}{}", self.config.base_url, self.refresh_path);
        let credentials = Arc::new(CredentialManager::new(
            self.store.clone(),
            HttpClient::builder().timeout(self.config.timeout).build()?,
            refresh_url,
            hub.clone(),
        ));
        let client = Arc::new(ApiClient::new(self.config, credentials.clone())?);

        let queue = Arc::new(UploadQueue::new(self.store.clone()));
        let archive = Arc::new(CsvArchive::new(self.store.clone()));
        let uploader =
            Arc::new(Uploader::new(client, queue, archive.clone(), hub.clone()));

        let tracking =
            TrackingService::new(self.store.clone(), uploader.clone(), hub.clone());

        info!("delivery pipeline assembled");
        Ok(DeliveryPipeline { tracking, uploader, credentials, archive, hub })
    }
}
