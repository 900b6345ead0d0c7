//! Durable upload queue
//!
//! Bounded FIFO backlog of visits awaiting delivery, persisted in the
//! state store so it survives restarts. Enqueueing past capacity drops the
//! oldest entries; draining delivers in order and stops at the first
//! failure, persisting whatever is still undelivered.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use pagetrail_core::storage::{StateStore, StateStoreExt};
use pagetrail_domain::constants::{keys, UPLOAD_QUEUE_CAPACITY};
use pagetrail_domain::{PageVisit, Result};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use super::VisitForwarder;

pub struct UploadQueue {
    store: Arc<dyn StateStore>,
    capacity: usize,
    draining: AtomicBool,
}

/// Clears the drain flag on every exit path, early returns included.
struct DrainGuard<'a>(&'a AtomicBool);

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl UploadQueue {
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self { store, capacity: UPLOAD_QUEUE_CAPACITY, draining: AtomicBool::new(false) }
    }

    #[cfg(test)]
    fn with_capacity(store: Arc<dyn StateStore>, capacity: usize) -> Self {
        Self { store, capacity, draining: AtomicBool::new(false) }
    }

    /// Append a visit to the backlog. When the queue is full the oldest
    /// entries are dropped so the newest visits are the ones preserved.
    ///
    /// # Errors
    /// Returns storage errors from the backing store.
    pub async fn enqueue(&self, visit: PageVisit) -> Result<()> {
        let mut pending = self.load().await?;
        pending.push(visit);
        if pending.len() > self.capacity {
            let dropped = pending.len() - self.capacity;
            pending.drain(..dropped);
            warn!(dropped, "upload queue full, oldest entries dropped");
        }
        let size = pending.len();
        self.persist(&pending).await?;
        debug!(size, "visit queued for later delivery");
        Ok(())
    }

    /// Number of visits currently waiting.
    ///
    /// # Errors
    /// Returns storage errors from the backing store.
    pub async fn len(&self) -> Result<usize> {
        Ok(self.load().await?.len())
    }

    /// True when nothing is waiting.
    ///
    /// # Errors
    /// Returns storage errors from the backing store.
    pub async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }

    /// Deliver queued visits oldest-first through `forwarder`.
    ///
    /// Stops at the first delivery failure and persists the undelivered
    /// remainder, failed entry included, so order is preserved for the
    /// next drain. A drain already in progress makes this call a no-op.
    /// Returns the number of visits delivered.
    ///
    /// The drain works on the snapshot loaded at entry: a visit enqueued
    /// while a pass is mid-flight is overwritten when the pass persists
    /// its final state. Callers are expected to route fresh visits
    /// through delivery first and enqueue only on failure, which keeps
    /// the two paths from interleaving in practice.
    ///
    /// # Errors
    /// Returns storage errors; delivery failures end the drain but are
    /// not themselves errors.
    pub async fn drain(&self, forwarder: &dyn VisitForwarder) -> Result<usize> {
        if self.draining.swap(true, Ordering::AcqRel) {
            debug!("drain already in progress, skipping");
            return Ok(0);
        }
        let _guard = DrainGuard(&self.draining);

        let pending = self.load().await?;
        if pending.is_empty() {
            return Ok(0);
        }
        info!(size = pending.len(), "draining upload backlog");

        for (delivered, visit) in pending.iter().enumerate() {
            if let Err(err) = forwarder.forward(visit).await {
                warn!(error = %err, delivered, remaining = pending.len() - delivered,
                    "backlog delivery failed, keeping remainder");
                self.persist(&pending[delivered..]).await?;
                return Ok(delivered);
            }
        }

        self.persist(&[]).await?;
        info!(delivered = pending.len(), "upload backlog fully drained");
        Ok(pending.len())
    }

    async fn load(&self) -> Result<Vec<PageVisit>> {
        let value = self.store.get_value(keys::PENDING_UPLOADS).await?;
        let pending = match value {
            Some(Value::Array(items)) => items
                .into_iter()
                .filter_map(|item| serde_json::from_value(item).ok())
                .collect(),
            _ => Vec::new(),
        };
        Ok(pending)
    }

    async fn persist(&self, pending: &[PageVisit]) -> Result<()> {
        self.store.set_value(keys::PENDING_UPLOADS, json!(pending)).await
    }
}
