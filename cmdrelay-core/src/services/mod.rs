// File: src/services/mod.rs

pub mod command_filter;
pub mod command_service;
pub mod config_service;
pub mod relay_coordinator;

pub use command_service::CommandService;
pub use config_service::ConfigService;
pub use relay_coordinator::{RelayCoordinator, SurfaceState, TwitchState};
