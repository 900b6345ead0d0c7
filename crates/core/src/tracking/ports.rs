//! Port interfaces for event delivery
//!
//! These traits define the boundaries between core business logic
//! and infrastructure implementations.

use async_trait::async_trait;
use pagetrail_domain::{AuthSignal, PageVisit, Result};

/// Accepts visits the tracking service decided to report.
///
/// Implementations own the network attempt and the failure backlog; a
/// submitted visit is either delivered or queued, never dropped.
#[async_trait]
pub trait VisitSink: Send + Sync {
    /// Hand a visit over for delivery.
    async fn submit(&self, visit: PageVisit) -> Result<()>;
}

/// Fire-and-forget signal channel toward the UI collaborator.
///
/// Delivery is best-effort by design: implementations swallow send
/// failures and must never affect pipeline control flow.
#[async_trait]
pub trait AuthNotifier: Send + Sync {
    /// Emit a signal. Infallible by contract.
    async fn notify(&self, signal: AuthSignal);
}
