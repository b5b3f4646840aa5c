//! In-process repositories. Used by tests and when the server runs without a
//! database; contents are lost on exit.

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;
use cmdrelay_common::error::Error;
use cmdrelay_common::models::{Command, RelayConfig};
use cmdrelay_common::traits::repository_traits::{CommandRepository, ConfigRepository};

#[derive(Default)]
pub struct InMemoryConfigRepository {
    config: RwLock<Option<RelayConfig>>,
}

impl InMemoryConfigRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: RelayConfig) -> Self {
        Self { config: RwLock::new(Some(config)) }
    }
}

#[async_trait]
impl ConfigRepository for InMemoryConfigRepository {
    async fn get_config(&self) -> Result<Option<RelayConfig>, Error> {
        Ok(self.config.read().await.clone())
    }

    async fn create_config(&self, config: &RelayConfig) -> Result<(), Error> {
        let mut guard = self.config.write().await;
        if guard.is_some() {
            return Err(Error::Conflict("a relay config already exists".into()));
        }
        *guard = Some(config.clone());
        Ok(())
    }

    async fn replace_config(&self, config: &RelayConfig) -> Result<(), Error> {
        let mut guard = self.config.write().await;
        match guard.as_ref() {
            Some(existing) if existing.config_id == config.config_id => {
                *guard = Some(config.clone());
                Ok(())
            }
            _ => Err(Error::NotFound(format!("relay config {}", config.config_id))),
        }
    }
}

/// Keeps commands in a `Vec` so listing returns insertion order.
#[derive(Default)]
pub struct InMemoryCommandRepository {
    commands: RwLock<Vec<Command>>,
}

impl InMemoryCommandRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_commands(commands: Vec<Command>) -> Self {
        Self { commands: RwLock::new(commands) }
    }
}

#[async_trait]
impl CommandRepository for InMemoryCommandRepository {
    async fn create_command(&self, cmd: &Command) -> Result<(), Error> {
        let mut guard = self.commands.write().await;
        if guard.iter().any(|c| c.command_name == cmd.command_name) {
            return Err(Error::Conflict(format!("command '{}' already exists", cmd.command_name)));
        }
        if guard.iter().any(|c| c.command_id == cmd.command_id) {
            return Err(Error::Conflict(format!("command id {} already exists", cmd.command_id)));
        }
        guard.push(cmd.clone());
        Ok(())
    }

    async fn get_command_by_id(&self, command_id: Uuid) -> Result<Option<Command>, Error> {
        let guard = self.commands.read().await;
        Ok(guard.iter().find(|c| c.command_id == command_id).cloned())
    }

    async fn get_command_by_name(&self, command_name: &str) -> Result<Option<Command>, Error> {
        let guard = self.commands.read().await;
        Ok(guard.iter().find(|c| c.command_name == command_name).cloned())
    }

    async fn list_commands(&self) -> Result<Vec<Command>, Error> {
        Ok(self.commands.read().await.clone())
    }

    async fn update_command(&self, cmd: &Command) -> Result<(), Error> {
        let mut guard = self.commands.write().await;
        if guard
            .iter()
            .any(|c| c.command_name == cmd.command_name && c.command_id != cmd.command_id)
        {
            return Err(Error::Conflict(format!("command '{}' already exists", cmd.command_name)));
        }
        match guard.iter_mut().find(|c| c.command_id == cmd.command_id) {
            Some(slot) => {
                *slot = cmd.clone();
                Ok(())
            }
            None => Err(Error::NotFound(format!("command {}", cmd.command_id))),
        }
    }

    async fn delete_command(&self, command_id: Uuid) -> Result<(), Error> {
        self.commands.write().await.retain(|c| c.command_id != command_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn config_is_a_singleton() -> Result<(), Error> {
        let repo = InMemoryConfigRepository::new();
        assert!(repo.get_config().await?.is_none());

        let cfg = RelayConfig::default();
        repo.create_config(&cfg).await?;
        assert!(matches!(repo.create_config(&RelayConfig::default()).await, Err(Error::Conflict(_))));

        let mut changed = cfg.clone();
        changed.twitch_access_token = "new".into();
        repo.replace_config(&changed).await?;
        assert_eq!(repo.get_config().await?.unwrap().twitch_access_token, "new");

        let stranger = RelayConfig::default();
        assert!(matches!(repo.replace_config(&stranger).await, Err(Error::NotFound(_))));
        Ok(())
    }

    #[tokio::test]
    async fn commands_keep_insertion_order_and_unique_names() -> Result<(), Error> {
        let repo = InMemoryCommandRepository::new();
        repo.create_command(&Command::new("!queue", true)).await?;
        repo.create_command(&Command::new("!bsr", true)).await?;
        assert!(matches!(
            repo.create_command(&Command::new("!bsr", false)).await,
            Err(Error::Conflict(_))
        ));

        let names: Vec<_> = repo.list_commands().await?.into_iter().map(|c| c.command_name).collect();
        assert_eq!(names, vec!["!queue", "!bsr"]);

        let mut bsr = repo.get_command_by_name("!bsr").await?.unwrap();
        bsr.command_name = "!queue".into();
        assert!(matches!(repo.update_command(&bsr).await, Err(Error::Conflict(_))));

        bsr.command_name = "!bsr".into();
        bsr.is_enabled = false;
        repo.update_command(&bsr).await?;
        assert!(!repo.get_command_by_id(bsr.command_id).await?.unwrap().is_enabled);

        repo.delete_command(bsr.command_id).await?;
        assert_eq!(repo.list_commands().await?.len(), 1);
        Ok(())
    }
}
