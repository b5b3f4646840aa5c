//! src/platforms/sink.rs
//!
//! Inbound delivery from adapters to the relay coordinator. Every adapter is
//! constructed with an `EventSink` that stamps its events with the adapter's
//! slot and generation and pushes them onto one FIFO queue. Closing the
//! sink's gate stops delivery from that instance for good.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::mpsc;
use tracing::{debug, trace};

use cmdrelay_common::error::Error;
use cmdrelay_common::models::{ChannelRef, ChatMessage, Platform};
use cmdrelay_common::traits::platform_traits::{PlatformIntegration, StreamMonitor};

/// Which adapter position an event came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AdapterSlot {
    TwitchChat,
    StreamMonitor,
    YouTube,
    Discord,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AdapterEvent {
    Message(ChatMessage),
    /// The adapter finished joining. `self_id` is the account id the adapter
    /// posts as, when the platform reports one (Discord's Ready).
    Connected {
        platform: Platform,
        self_id: Option<String>,
    },
    StreamOnline,
    StreamOffline,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AdapterEnvelope {
    pub slot: AdapterSlot,
    pub generation: u64,
    pub event: AdapterEvent,
}

/// Sending half handed to an adapter at construction.
#[derive(Clone)]
pub struct EventSink {
    slot: AdapterSlot,
    generation: u64,
    open: Arc<AtomicBool>,
    tx: mpsc::UnboundedSender<AdapterEnvelope>,
}

impl EventSink {
    pub fn new(
        slot: AdapterSlot,
        generation: u64,
        tx: mpsc::UnboundedSender<AdapterEnvelope>,
    ) -> Self {
        Self {
            slot,
            generation,
            open: Arc::new(AtomicBool::new(true)),
            tx,
        }
    }

    /// Returns false when the event was dropped (gate closed or nobody listening).
    pub fn emit(&self, event: AdapterEvent) -> bool {
        if !self.is_open() {
            trace!(slot = ?self.slot, generation = self.generation, "sink closed; dropping event");
            return false;
        }
        let env = AdapterEnvelope {
            slot: self.slot,
            generation: self.generation,
            event,
        };
        self.tx.send(env).is_ok()
    }

    pub fn message(&self, msg: ChatMessage) -> bool {
        self.emit(AdapterEvent::Message(msg))
    }

    pub fn close(&self) {
        if self.open.swap(false, Ordering::SeqCst) {
            debug!(slot = ?self.slot, generation = self.generation, "event sink closed");
        }
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    pub fn slot(&self) -> AdapterSlot {
        self.slot
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Owns one adapter instance together with the gate of the sink it was
/// built with. Consuming `close` shuts the gate before tearing the adapter
/// down, so nothing it says on the way out reaches the coordinator.
pub struct AdapterHandle<T: ?Sized> {
    inner: Box<T>,
    sink: EventSink,
}

pub type ChatHandle = AdapterHandle<dyn PlatformIntegration>;
pub type MonitorHandle = AdapterHandle<dyn StreamMonitor>;

impl<T: ?Sized> AdapterHandle<T> {
    pub fn new(inner: Box<T>, sink: EventSink) -> Self {
        Self { inner, sink }
    }

    pub fn generation(&self) -> u64 {
        self.sink.generation()
    }

    pub fn is_open(&self) -> bool {
        self.sink.is_open()
    }

    pub fn get(&self) -> &T {
        &self.inner
    }

    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }
}

impl AdapterHandle<dyn PlatformIntegration> {
    pub async fn send(&self, channel: &ChannelRef, text: &str) -> Result<(), Error> {
        self.inner.send_message(channel, text).await
    }

    pub async fn close(mut self) -> Result<(), Error> {
        self.sink.close();
        self.inner.disconnect().await
    }
}

impl AdapterHandle<dyn StreamMonitor> {
    pub async fn close(mut self) -> Result<(), Error> {
        self.sink.close();
        self.inner.stop().await
    }
}
