//! Uploader
//!
//! Implements the core's visit sink: archive locally, try to deliver, and
//! fall back to the durable queue when delivery fails. A successful fresh
//! delivery doubles as proof the collector is reachable, so it triggers a
//! backlog drain.

use std::sync::Arc;

use async_trait::async_trait;
use pagetrail_core::{AuthNotifier, VisitSink};
use pagetrail_domain::{AuthSignal, PageVisit, Result};
use tracing::{debug, warn};

use super::{UploadQueue, VisitForwarder};
use crate::archive::CsvArchive;

pub struct Uploader {
    forwarder: Arc<dyn VisitForwarder>,
    queue: Arc<UploadQueue>,
    archive: Arc<CsvArchive>,
    notifier: Arc<dyn AuthNotifier>,
}

impl Uploader {
    pub fn new(
        forwarder: Arc<dyn VisitForwarder>,
        queue: Arc<UploadQueue>,
        archive: Arc<CsvArchive>,
        notifier: Arc<dyn AuthNotifier>,
    ) -> Self {
        Self { forwarder, queue, archive, notifier }
    }

    /// Attempt delivery of the queued backlog. Exposed for startup and
    /// reconnect sweeps; also runs after every successful fresh delivery.
    ///
    /// # Errors
    /// Returns storage errors from the backing store.
    pub async fn drain_backlog(&self) -> Result<usize> {
        self.queue.drain(self.forwarder.as_ref()).await
    }
}

#[async_trait]
impl VisitSink for Uploader {
    async fn submit(&self, visit: PageVisit) -> Result<()> {
        // The archive is best-effort; a storage hiccup must not block
        // delivery.
        if let Err(err) = self.archive.append(&visit).await {
            warn!(error = %err, "failed to archive visit locally");
        }

        match self.forwarder.forward(&visit).await {
            Ok(()) => {
                debug!(url = %visit.url, "visit delivered");
                if let Err(err) = self.drain_backlog().await {
                    warn!(error = %err, "backlog drain after delivery failed");
                }
                Ok(())
            }
            Err(err) => {
                warn!(error = %err, url = %visit.url, "delivery failed, queueing visit");
                if err.is_auth_failure() {
                    self.notifier.notify(AuthSignal::Invalid).await;
                }
                self.queue.enqueue(visit).await
            }
        }
    }
}
