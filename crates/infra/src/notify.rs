//! Auth notification hub
//!
//! Fan-out for authentication signals. Producers call through the core's
//! notifier port; any number of consumers subscribe for UI prompts or
//! re-login flows. Publishing never fails: with no subscribers the signal
//! is simply dropped.

use async_trait::async_trait;
use pagetrail_core::AuthNotifier;
use pagetrail_domain::AuthSignal;
use tokio::sync::broadcast;
use tracing::debug;

const CHANNEL_CAPACITY: usize = 16;

pub struct NotificationHub {
    sender: broadcast::Sender<AuthSignal>,
}

impl Default for NotificationHub {
    fn default() -> Self {
        Self::new()
    }
}

impl NotificationHub {
    #[must_use]
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    /// Subscribe to subsequent auth signals. Signals published before the
    /// subscription are not replayed.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<AuthSignal> {
        self.sender.subscribe()
    }
}

#[async_trait]
impl AuthNotifier for NotificationHub {
    async fn notify(&self, signal: AuthSignal) {
        debug!(?signal, "publishing auth signal");
        // Err means no live subscribers, which is fine.
        let _ = self.sender.send(signal);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_receive_signals() {
        let hub = NotificationHub::new();
        let mut rx = hub.subscribe();

        hub.notify(AuthSignal::Required).await;
        hub.notify(AuthSignal::Invalid).await;

        assert_eq!(rx.recv().await.unwrap(), AuthSignal::Required);
        assert_eq!(rx.recv().await.unwrap(), AuthSignal::Invalid);
    }

    #[tokio::test]
    async fn publishing_without_subscribers_is_fine() {
        let hub = NotificationHub::new();
        hub.notify(AuthSignal::Invalid).await;
    }

    #[tokio::test]
    async fn each_subscriber_gets_its_own_copy() {
        let hub = NotificationHub::new();
        let mut a = hub.subscribe();
        let mut b = hub.subscribe();

        hub.notify(AuthSignal::Required).await;

        assert_eq!(a.recv().await.unwrap(), AuthSignal::Required);
        assert_eq!(b.recv().await.unwrap(), AuthSignal::Required);
    }
}
