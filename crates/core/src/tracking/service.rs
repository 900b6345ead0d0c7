//! Tracking service - core business logic
//!
//! One entry point per host event: `handle_visit` for an observed page,
//! `session_closed` when a session formally ends. The service reloads its
//! settings from the store on every event (the UI may change them at any
//! time), applies the logging/auth/filter gates, then either submits
//! immediately or routes through the session batcher.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use pagetrail_domain::{AuthSignal, PageVisit, Result, SessionId};
use tokio::sync::Mutex;
use tracing::{debug, instrument};

use super::ports::{AuthNotifier, VisitSink};
use crate::batch::SessionBatcher;
use crate::filter::UrlFilter;
use crate::settings::Settings;
use crate::storage::{StateStore, StateStoreExt};

/// Orchestrates the gate → batch → submit flow for incoming events.
pub struct TrackingService {
    store: Arc<dyn StateStore>,
    sink: Arc<dyn VisitSink>,
    notifier: Arc<dyn AuthNotifier>,
    batcher: Mutex<SessionBatcher>,
}

impl TrackingService {
    /// Create a new tracking service.
    pub fn new(
        store: Arc<dyn StateStore>,
        sink: Arc<dyn VisitSink>,
        notifier: Arc<dyn AuthNotifier>,
    ) -> Self {
        Self { store, sink, notifier, batcher: Mutex::new(SessionBatcher::new()) }
    }

    /// Process one observed page visit.
    ///
    /// `session` is absent when the host cannot attribute the event to a
    /// session; such events bypass batching entirely.
    #[instrument(skip(self, visit), fields(url = %visit.url, session = ?session))]
    pub async fn handle_visit(
        &self,
        session: Option<SessionId>,
        visit: PageVisit,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let settings = Settings::load(self.store.as_ref()).await?;
        if !settings.logging_enabled {
            debug!("logging disabled, dropping event");
            return Ok(());
        }

        if !self.store.token_set().await?.has_any() {
            debug!("no credentials present, requesting authentication");
            self.notifier.notify(AuthSignal::Required).await;
            return Ok(());
        }

        let filter = UrlFilter::compile(settings.filter_mode, &settings.ignore_patterns);
        if !filter.should_log(&visit.url) {
            debug!("url excluded by filter");
            return Ok(());
        }

        let Some(session) = session.filter(|_| settings.batch_mode_enabled) else {
            // Immediate mode. Any pending interval state for this session is
            // stale and must not be emitted later.
            if let Some(session) = session {
                self.batcher.lock().await.reset(session);
            }
            return self.sink.submit(visit).await;
        };

        let emitted = self.batcher.lock().await.observe(
            session,
            visit,
            now,
            settings.dwell_threshold,
        );
        if let Some(held) = emitted {
            self.sink.submit(held).await?;
        }
        Ok(())
    }

    /// Process a session-end notification, emitting the held visit when it
    /// met the dwell threshold.
    #[instrument(skip(self))]
    pub async fn session_closed(&self, session: SessionId, now: DateTime<Utc>) -> Result<()> {
        let settings = Settings::load(self.store.as_ref()).await?;
        let has_tokens = self.store.token_set().await?.has_any();

        if !settings.logging_enabled || !settings.batch_mode_enabled || !has_tokens {
            // No emission in these states, but the session is over: drop its
            // bookkeeping either way.
            self.batcher.lock().await.reset(session);
            return Ok(());
        }

        let emitted =
            self.batcher.lock().await.close(session, now, settings.dwell_threshold);
        if let Some(held) = emitted {
            self.sink.submit(held).await?;
        }
        Ok(())
    }
}
