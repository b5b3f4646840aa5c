// File: cmdrelay-core/src/services/config_service.rs

use std::sync::Arc;
use chrono::Utc;
use tracing::{debug, info};
use uuid::Uuid;

use cmdrelay_common::models::RelayConfig;

use crate::Error;
use crate::eventbus::EventBus;
use crate::repositories::ConfigRepository;

/// Reads and writes the singleton relay config and announces changes.
pub struct ConfigService {
    config_repo: Arc<dyn ConfigRepository>,
    event_bus: Arc<EventBus>,
}

impl ConfigService {
    pub fn new(config_repo: Arc<dyn ConfigRepository>, event_bus: Arc<EventBus>) -> Self {
        Self { config_repo, event_bus }
    }

    /// Ensures the store holds a config. On first boot the process settings
    /// become the stored record; afterwards the store wins, except that an
    /// empty `twitch_client_id` is filled in from the settings.
    pub async fn bootstrap(&self, settings: &RelayConfig) -> Result<RelayConfig, Error> {
        match self.config_repo.get_config().await? {
            None => {
                let cfg = RelayConfig {
                    config_id: Uuid::new_v4(),
                    modified_date: Utc::now(),
                    ..settings.clone()
                };
                self.config_repo.create_config(&cfg).await?;
                info!("Created relay config {}", cfg.config_id);
                Ok(cfg)
            }
            Some(mut cfg) => {
                if cfg.twitch_client_id.trim().is_empty() && !settings.twitch_client_id.trim().is_empty() {
                    cfg.twitch_client_id = settings.twitch_client_id.clone();
                    cfg.touch();
                    self.config_repo.replace_config(&cfg).await?;
                    info!("Filled missing twitch_client_id in relay config {}", cfg.config_id);
                } else {
                    debug!("Using stored relay config {}", cfg.config_id);
                }
                Ok(cfg)
            }
        }
    }

    pub async fn current(&self) -> Result<RelayConfig, Error> {
        self.config_repo
            .get_config()
            .await?
            .ok_or_else(|| Error::NotFound("relay config".into()))
    }

    /// Stores a new Twitch access token and publishes `ConfigUpdated`.
    /// Nothing is published when the write fails.
    pub async fn update_twitch_token(&self, access_token: &str) -> Result<RelayConfig, Error> {
        let token = access_token.trim();
        if token.is_empty() {
            return Err(Error::Config("twitch access token must not be empty".into()));
        }

        let mut cfg = self.current().await?;
        cfg.twitch_access_token = token.to_string();
        cfg.touch();
        self.config_repo.replace_config(&cfg).await?;

        info!("Twitch access token replaced; announcing config update");
        self.event_bus.publish_config_updated(cfg.modified_date).await;
        Ok(cfg)
    }
}
