//! src/eventbus/mod.rs
//!
//! Provides an in-process event bus that supports guaranteed delivery
//! to multiple subscribers via bounded MPSC queues. The relay uses it for
//! the "configuration updated" notification and for the process-wide
//! shutdown signal.

use std::sync::Arc;
use tokio::sync::{mpsc, watch, Mutex};
use chrono::{DateTime, Utc};

/// Events published across the relay.
#[derive(Debug, Clone)]
pub enum RelayEvent {
    /// The stored config was replaced (e.g. a new Twitch token arrived from
    /// the auth flow). Subscribers must re-fetch rather than trust any copy.
    ConfigUpdated { modified_date: DateTime<Utc> },

    /// Free-form administrative notice, mostly for debugging.
    SystemMessage(String),
}

impl RelayEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            RelayEvent::ConfigUpdated { .. } => "config-updated",
            RelayEvent::SystemMessage(_) => "system_message",
        }
    }
}

/// Each subscriber gets its own `mpsc::Sender<RelayEvent>` for guaranteed delivery.
///
/// - If the subscriber's channel buffer fills, `publish` will await
///   until there's space (backpressure).
/// - If the subscriber has dropped the `Receiver`, its sender is pruned on
///   the next publish.
#[derive(Clone)]
pub struct EventBus {
    subscribers: Arc<Mutex<Vec<mpsc::Sender<RelayEvent>>>>,
    shutdown_tx: watch::Sender<bool>,
    pub shutdown_rx: watch::Receiver<bool>,
}

/// Default size for each subscriber's buffer.
const DEFAULT_BUFFER_SIZE: usize = 256;

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    /// Create a new, empty event bus.
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            subscribers: Arc::new(Mutex::new(vec![])),
            shutdown_tx: tx,
            shutdown_rx: rx,
        }
    }

    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    pub fn is_shutdown(&self) -> bool {
        *self.shutdown_rx.borrow()
    }

    /// A fresh receiver for the shutdown flag, for tasks that `select!` on it.
    pub fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.shutdown_rx.clone()
    }

    /// Returns a receiver on which events will be delivered.
    pub async fn subscribe(&self, buffer_size: Option<usize>) -> mpsc::Receiver<RelayEvent> {
        let size = buffer_size.unwrap_or(DEFAULT_BUFFER_SIZE);
        let (tx, rx) = mpsc::channel(size);
        let mut subs = self.subscribers.lock().await;
        subs.push(tx);
        rx
    }

    /// Publish an event to all subscribers.
    pub async fn publish(&self, event: RelayEvent) {
        let senders = {
            let mut subs = self.subscribers.lock().await;
            subs.retain(|s| !s.is_closed());
            subs.clone()
        };
        for s in senders {
            let _ = s.send(event.clone()).await;
        }
    }

    /// Convenience method: announce that the stored config changed.
    pub async fn publish_config_updated(&self, modified_date: DateTime<Utc>) {
        self.publish(RelayEvent::ConfigUpdated { modified_date }).await;
    }

    pub async fn subscriber_count(&self) -> usize {
        self.subscribers.lock().await.len()
    }
}
