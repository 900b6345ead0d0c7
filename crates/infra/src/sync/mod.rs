//! Visit delivery
//!
//! The forwarder port abstracts "send one visit to the collector"; the
//! queue buffers visits that could not be delivered; the uploader ties the
//! two together behind the core's sink port.

pub mod queue;
pub mod uploader;

use async_trait::async_trait;
use pagetrail_domain::PageVisit;

use crate::api::{ApiClient, ApiError};

/// Port for delivering a single visit to the collector.
#[async_trait]
pub trait VisitForwarder: Send + Sync {
    /// Deliver one visit. One call means at most one logical delivery
    /// attempt (the authenticated client may retry once internally after
    /// a credential refresh).
    async fn forward(&self, visit: &PageVisit) -> Result<(), ApiError>;
}

#[async_trait]
impl VisitForwarder for ApiClient {
    async fn forward(&self, visit: &PageVisit) -> Result<(), ApiError> {
        self.upload_visit(visit).await
    }
}

pub use queue::UploadQueue;
pub use uploader::Uploader;
