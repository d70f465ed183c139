//! Lifecycle notifications
//!
//! Notifications model the webhook call made when a job becomes ready or
//! active. Delivery failures are logged by the orchestrator and never
//! change job state.

use crate::error::NotifyError;
use async_trait::async_trait;
use provisioning_types::EventEnvelope;
use tokio::sync::broadcast;

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, envelope: EventEnvelope) -> Result<(), NotifyError>;
}

/// Fan-out of events to in-process subscribers
#[derive(Debug, Clone)]
pub struct BroadcastNotifier {
    tx: broadcast::Sender<EventEnvelope>,
}

impl BroadcastNotifier {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.tx.subscribe()
    }
}

impl Default for BroadcastNotifier {
    fn default() -> Self {
        Self::new(1000)
    }
}

#[async_trait]
impl Notifier for BroadcastNotifier {
    async fn notify(&self, envelope: EventEnvelope) -> Result<(), NotifyError> {
        // No subscribers is not a delivery failure
        let _ = self.tx.send(envelope);
        Ok(())
    }
}
