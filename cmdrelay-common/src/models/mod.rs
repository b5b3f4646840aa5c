// File: cmdrelay-common/src/models/mod.rs
pub mod command;
pub mod config;
pub mod message;
pub mod platform;

pub use command::{Command, DEFAULT_COMMAND_NAMES};
pub use config::RelayConfig;
pub use message::{ChannelRef, ChatMessage};
pub use platform::Platform;
