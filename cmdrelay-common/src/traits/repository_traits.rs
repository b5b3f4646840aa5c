use async_trait::async_trait;
use uuid::Uuid;
use crate::error::Error;
use crate::models::{Command, RelayConfig};

/// Storage for the singleton relay configuration.
#[async_trait]
pub trait ConfigRepository: Send + Sync {
    /// Returns the one stored config, or `None` before first boot.
    async fn get_config(&self) -> Result<Option<RelayConfig>, Error>;
    async fn create_config(&self, config: &RelayConfig) -> Result<(), Error>;
    async fn replace_config(&self, config: &RelayConfig) -> Result<(), Error>;
}

#[async_trait]
pub trait CommandRepository: Send + Sync {
    async fn create_command(&self, cmd: &Command) -> Result<(), Error>;
    async fn get_command_by_id(&self, command_id: Uuid) -> Result<Option<Command>, Error>;
    async fn get_command_by_name(&self, command_name: &str) -> Result<Option<Command>, Error>;
    /// All commands in insertion order.
    async fn list_commands(&self) -> Result<Vec<Command>, Error>;
    async fn update_command(&self, cmd: &Command) -> Result<(), Error>;
    async fn delete_command(&self, command_id: Uuid) -> Result<(), Error>;
}
