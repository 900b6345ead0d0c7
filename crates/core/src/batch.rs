//! Per-session dwell-time batching
//!
//! Coalesces rapid events for the same logical session into one report. A
//! page only counts once its session moved on (new URL or session closed)
//! and the page was held for at least the configured dwell threshold;
//! shorter stays are discarded unemitted. Pending state lives in memory
//! only; losing it on abrupt termination is accepted behavior.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use pagetrail_domain::{PageVisit, SessionId};
use tracing::debug;

/// Held state for one session: the page currently open and when it opened.
#[derive(Debug, Clone)]
struct PendingVisit {
    url: String,
    started_at: DateTime<Utc>,
    visit: PageVisit,
}

/// Per-session batching state machine.
///
/// Not synchronized internally; callers wrap it in their own lock (the
/// tracking service holds it behind a `tokio::sync::Mutex`).
#[derive(Debug, Default)]
pub struct SessionBatcher {
    sessions: HashMap<SessionId, PendingVisit>,
}

impl SessionBatcher {
    /// Create an empty batcher.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one event into the state machine.
    ///
    /// Returns the previously held visit when the session just left a page
    /// it dwelled on for at least `threshold`; `None` otherwise. The
    /// incoming visit always becomes (or updates) the held state.
    pub fn observe(
        &mut self,
        session: SessionId,
        visit: PageVisit,
        now: DateTime<Utc>,
        threshold: Duration,
    ) -> Option<PageVisit> {
        match self.sessions.get_mut(&session) {
            None => {
                self.sessions.insert(
                    session,
                    PendingVisit { url: visit.url.clone(), started_at: now, visit },
                );
                None
            }
            Some(pending) if pending.url == visit.url => {
                // Same logical page, refreshed metadata. Keep started_at.
                pending.visit = visit;
                None
            }
            Some(_) => {
                let emitted = self.settle(session, now, threshold);
                self.sessions.insert(
                    session,
                    PendingVisit { url: visit.url.clone(), started_at: now, visit },
                );
                emitted
            }
        }
    }

    /// Apply the dwell rule to a session that formally ended, removing its
    /// state. Returns the held visit when it qualified for emission.
    pub fn close(
        &mut self,
        session: SessionId,
        now: DateTime<Utc>,
        threshold: Duration,
    ) -> Option<PageVisit> {
        self.settle(session, now, threshold)
    }

    /// Discard pending state for a session without emission. Used when
    /// immediate delivery mode supersedes interval bookkeeping.
    pub fn reset(&mut self, session: SessionId) {
        if self.sessions.remove(&session).is_some() {
            debug!(%session, "discarded pending batch state");
        }
    }

    /// Number of sessions currently holding state.
    #[must_use]
    pub fn pending_sessions(&self) -> usize {
        self.sessions.len()
    }

    fn settle(
        &mut self,
        session: SessionId,
        now: DateTime<Utc>,
        threshold: Duration,
    ) -> Option<PageVisit> {
        let pending = self.sessions.remove(&session)?;
        let elapsed = now.signed_duration_since(pending.started_at);
        let qualified = elapsed
            .to_std()
            .map(|elapsed| elapsed >= threshold)
            .unwrap_or(false); // clock went backwards; treat as too brief

        if qualified {
            debug!(%session, url = %pending.url, "dwell threshold met, emitting held visit");
            Some(pending.visit)
        } else {
            debug!(%session, url = %pending.url, "held visit below dwell threshold, discarded");
            None
        }
    }
}
