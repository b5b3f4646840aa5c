// File: cmdrelay-core/src/services/command_service.rs

use std::sync::Arc;
use chrono::Utc;
use tracing::{debug, info};
use uuid::Uuid;

use cmdrelay_common::models::{Command, DEFAULT_COMMAND_NAMES};

use crate::Error;
use crate::repositories::CommandRepository;

/// Operator-facing command administration.
pub struct CommandService {
    command_repo: Arc<dyn CommandRepository>,
}

impl CommandService {
    pub fn new(command_repo: Arc<dyn CommandRepository>) -> Self {
        debug!("Initializing CommandService");
        Self { command_repo }
    }

    /// Inserts the default command set, all enabled, but only into an empty
    /// store. Returns whether anything was written.
    pub async fn seed_default_commands(&self) -> Result<bool, Error> {
        if !self.command_repo.list_commands().await?.is_empty() {
            debug!("Commands already present; skipping seed");
            return Ok(false);
        }
        for name in DEFAULT_COMMAND_NAMES {
            self.command_repo.create_command(&Command::new(name, true)).await?;
        }
        info!("Seeded {} default commands", DEFAULT_COMMAND_NAMES.len());
        Ok(true)
    }

    pub async fn list_commands(&self) -> Result<Vec<Command>, Error> {
        self.command_repo.list_commands().await
    }

    pub async fn create_command(&self, command_name: &str, is_enabled: bool) -> Result<Command, Error> {
        let name = command_name.trim();
        if !Command::is_valid_name(name) {
            return Err(Error::Config(format!(
                "command name '{}' must start with '!' and contain no spaces",
                name
            )));
        }
        if self.command_repo.get_command_by_name(name).await?.is_some() {
            return Err(Error::Conflict(format!("command '{}' already exists", name)));
        }

        debug!("Creating command '{}'", name);
        let cmd = Command::new(name, is_enabled);
        self.command_repo.create_command(&cmd).await?;
        Ok(cmd)
    }

    pub async fn set_command_enabled(&self, command_id: Uuid, is_enabled: bool) -> Result<Command, Error> {
        let mut cmd = self
            .command_repo
            .get_command_by_id(command_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("command {}", command_id)))?;
        cmd.is_enabled = is_enabled;
        cmd.updated_at = Utc::now();
        self.command_repo.update_command(&cmd).await?;
        Ok(cmd)
    }

    pub async fn delete_command(&self, command_id: Uuid) -> Result<(), Error> {
        if self.command_repo.get_command_by_id(command_id).await?.is_none() {
            return Err(Error::NotFound(format!("command {}", command_id)));
        }
        self.command_repo.delete_command(command_id).await
    }
}
