// File: src/platforms/mod.rs

pub use cmdrelay_common::traits::platform_traits::{ConnectionStatus, PlatformIntegration, StreamMonitor};

pub mod sink;
pub mod factory;
pub mod discord;
pub mod twitch_irc;
pub mod twitch_helix;
pub mod youtube;

pub use factory::{AdapterFactory, LiveAdapterFactory};
pub use sink::{AdapterEnvelope, AdapterEvent, AdapterHandle, AdapterSlot, ChatHandle, EventSink, MonitorHandle};
