// File: src/platforms/twitch_helix/mod.rs

pub mod client;
pub mod monitor;
pub mod requests;

pub use client::TwitchHelixClient;
pub use monitor::TwitchStreamMonitor;
