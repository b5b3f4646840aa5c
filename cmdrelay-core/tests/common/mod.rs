// tests/common/mod.rs
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{sleep, Instant};

use cmdrelay_common::models::{Command, RelayConfig};
use cmdrelay_core::eventbus::EventBus;
use cmdrelay_core::repositories::{InMemoryCommandRepository, InMemoryConfigRepository};
use cmdrelay_core::services::RelayCoordinator;
use cmdrelay_core::test_utils::{FakeAdapterFactory, RecordingTelemetry};
use cmdrelay_core::Error;

pub const DISCORD_CHANNEL: &str = "555000111";

pub struct Harness {
    pub coordinator: Arc<RelayCoordinator>,
    pub factory: Arc<FakeAdapterFactory>,
    pub telemetry: RecordingTelemetry,
    pub bus: Arc<EventBus>,
    pub config_repo: Arc<InMemoryConfigRepository>,
    pub command_repo: Arc<InMemoryCommandRepository>,
}

pub fn settings(enable_youtube: bool, enable_discord: bool) -> RelayConfig {
    RelayConfig {
        enable_youtube,
        enable_discord,
        google_credentials_file: "/etc/cmdrelay/google.json".into(),
        discord_token: "discord-token".into(),
        discord_channel_id: DISCORD_CHANNEL.into(),
        twitch_user_name: "relaybot".into(),
        twitch_access_token: "oauth:first-token".into(),
        twitch_channel: "#streamer".into(),
        twitch_client_id: "client-id".into(),
        ..Default::default()
    }
}

pub fn commands(list: &[(&str, bool)]) -> Vec<Command> {
    list.iter().map(|(n, e)| Command::new(n, *e)).collect()
}

impl Harness {
    pub fn new(settings: RelayConfig, seeded: Vec<Command>) -> Self {
        Self::with_factory(settings, seeded, FakeAdapterFactory::new())
    }

    pub fn with_factory(settings: RelayConfig, seeded: Vec<Command>, factory: FakeAdapterFactory) -> Self {
        let factory = Arc::new(factory);
        let telemetry = RecordingTelemetry::new();
        let bus = Arc::new(EventBus::new());
        let config_repo = Arc::new(InMemoryConfigRepository::new());
        let command_repo = Arc::new(InMemoryCommandRepository::with_commands(seeded));
        let coordinator = Arc::new(RelayCoordinator::new(
            config_repo.clone(),
            command_repo.clone(),
            bus.clone(),
            Arc::new(telemetry.clone()),
            factory.clone(),
            settings,
        ));
        Self { coordinator, factory, telemetry, bus, config_repo, command_repo }
    }

    /// Starts the coordinator and spawns its event loop.
    pub async fn start_and_run(&self) -> Result<JoinHandle<Result<(), Error>>, Error> {
        self.coordinator.start().await?;
        let coordinator = self.coordinator.clone();
        Ok(tokio::spawn(async move { coordinator.run().await }))
    }
}

/// Polls `check` until it holds or two seconds pass.
pub async fn eventually<F: Fn() -> bool>(check: F) -> bool {
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        if check() {
            return true;
        }
        sleep(Duration::from_millis(10)).await;
    }
    check()
}
