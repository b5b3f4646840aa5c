// tests/reconfiguration_tests.rs

mod common;

use cmdrelay_common::models::Platform;
use cmdrelay_core::platforms::{AdapterEnvelope, AdapterEvent, AdapterSlot};
use cmdrelay_core::services::{ConfigService, SurfaceState, TwitchState};
use cmdrelay_core::Error;

use common::{commands, eventually, settings, Harness};

#[tokio::test]
async fn token_update_rebuilds_twitch_from_new_config() -> Result<(), Error> {
    let h = Harness::new(settings(false, false), commands(&[("!bsr", true)]));
    let run = h.start_and_run().await?;

    let old_chat = h.factory.latest_twitch().expect("first twitch chat");
    let old_monitor = h.factory.latest_monitor().expect("first monitor");
    assert_eq!(old_chat.generation(), 1);

    let config_service = ConfigService::new(h.config_repo.clone(), h.bus.clone());
    config_service.update_twitch_token("second-token").await?;

    assert!(eventually(|| h.factory.twitch_remotes().len() == 2).await);
    assert!(eventually(|| h.factory.monitor_remotes().len() == 2).await);
    // Waits on the coordinator lock, i.e. for the rebuild to finish.
    assert_eq!(h.coordinator.generation().await, 2);
    assert_eq!(
        h.factory.observed_twitch_tokens(),
        vec!["oauth:first-token".to_string(), "second-token".to_string()]
    );

    // Old pair is closed and disconnected before the new one is in place.
    assert!(!old_chat.sink_open());
    assert_eq!(old_chat.disconnects(), 1);
    assert!(!old_monitor.sink_open());
    assert_eq!(old_monitor.stops(), 1);

    let new_chat = h.factory.latest_twitch().unwrap();
    assert_eq!(new_chat.generation(), 2);
    assert!(new_chat.is_connected());
    assert_eq!(h.coordinator.twitch_state().await, TwitchState::Running);
    assert_eq!(
        h.coordinator.current_config().await.unwrap().twitch_access_token,
        "second-token"
    );

    h.bus.shutdown();
    run.await.expect("run task")?;
    Ok(())
}

#[tokio::test]
async fn retired_instance_cannot_cause_dispatch() -> Result<(), Error> {
    let h = Harness::new(settings(true, false), commands(&[("!bsr", true)]));
    h.coordinator.start().await?;

    let old_chat = h.factory.latest_twitch().unwrap();
    let old_monitor = h.factory.latest_monitor().unwrap();

    h.coordinator.on_configuration_updated().await;
    let new_chat = h.factory.latest_twitch().unwrap();
    let youtube = h.factory.youtube().unwrap();

    // Closed gates refuse new events outright.
    assert!(!old_chat.emit(AdapterEvent::Connected { platform: Platform::Twitch, self_id: None }));
    assert!(!old_monitor.go_online());

    // Anything already queued under the old generation is discarded.
    h.coordinator
        .handle_envelope(AdapterEnvelope {
            slot: AdapterSlot::StreamMonitor,
            generation: 1,
            event: AdapterEvent::StreamOnline,
        })
        .await;
    h.coordinator
        .handle_envelope(AdapterEnvelope {
            slot: AdapterSlot::TwitchChat,
            generation: 1,
            event: AdapterEvent::Connected { platform: Platform::Twitch, self_id: None },
        })
        .await;
    assert_eq!(youtube.connects(), 0);
    assert!(new_chat.sent().is_empty());
    assert!(old_chat.sent().is_empty());

    // The same event under the current generation is honoured.
    h.coordinator
        .handle_envelope(AdapterEnvelope {
            slot: AdapterSlot::StreamMonitor,
            generation: 2,
            event: AdapterEvent::StreamOnline,
        })
        .await;
    assert_eq!(youtube.connects(), 1);
    assert_eq!(h.coordinator.youtube_state().await, SurfaceState::Connected);
    Ok(())
}

#[tokio::test]
async fn echo_surfaces_survive_reconfiguration() -> Result<(), Error> {
    let h = Harness::new(settings(true, true), vec![]);
    h.coordinator.start().await?;

    h.coordinator.on_configuration_updated().await;

    let discord = h.factory.discord().unwrap();
    let youtube = h.factory.youtube().unwrap();
    assert!(discord.sink_open());
    assert!(youtube.sink_open());
    assert_eq!(discord.disconnects(), 0);
    assert_eq!(h.coordinator.discord_state().await, SurfaceState::Connected);
    assert_eq!(h.factory.twitch_remotes().len(), 2);
    Ok(())
}

#[tokio::test]
async fn relay_after_rebuild_uses_new_adapter() -> Result<(), Error> {
    let h = Harness::new(settings(true, false), commands(&[("!bsr", true)]));
    let run = h.start_and_run().await?;
    let old_chat = h.factory.latest_twitch().unwrap();

    let config_service = ConfigService::new(h.config_repo.clone(), h.bus.clone());
    config_service.update_twitch_token("second-token").await?;
    assert!(eventually(|| h.factory.twitch_remotes().len() == 2).await);

    let youtube = h.factory.youtube().unwrap();
    assert!(youtube.say("UC1", "live-chat-1", "!bsr after"));

    let new_chat = h.factory.latest_twitch().unwrap();
    assert!(eventually(|| !new_chat.sent().is_empty()).await);
    assert_eq!(new_chat.sent_texts(), vec!["!bsr after"]);
    assert!(old_chat.sent().is_empty());

    h.bus.shutdown();
    run.await.expect("run task")?;
    Ok(())
}

#[tokio::test]
async fn update_before_start_is_ignored() {
    let h = Harness::new(settings(false, false), vec![]);
    h.coordinator.on_configuration_updated().await;
    assert!(h.factory.twitch_remotes().is_empty());
    assert_eq!(h.coordinator.twitch_state().await, TwitchState::Stopped);
}

#[tokio::test]
async fn offline_seen_first_by_rebuilt_monitor_releases_youtube() -> Result<(), Error> {
    let h = Harness::new(settings(true, false), vec![]);
    let run = h.start_and_run().await?;
    let youtube = h.factory.youtube().unwrap();

    assert!(h.factory.latest_monitor().unwrap().go_online());
    assert!(eventually(|| youtube.is_connected()).await);
    assert_eq!(h.coordinator.youtube_state().await, SurfaceState::Connected);

    let config_service = ConfigService::new(h.config_repo.clone(), h.bus.clone());
    config_service.update_twitch_token("second-token").await?;
    assert!(eventually(|| h.factory.monitor_remotes().len() == 2).await);
    assert_eq!(h.coordinator.generation().await, 2);
    // YouTube lives outside the Twitch pair and stays up across the rebuild.
    assert_eq!(h.coordinator.youtube_state().await, SurfaceState::Connected);

    // The new monitor's first poll finds the stream already down.
    let new_monitor = h.factory.latest_monitor().unwrap();
    assert_eq!(new_monitor.generation(), 2);
    assert!(new_monitor.go_offline());
    assert!(eventually(|| !youtube.is_connected()).await);
    assert_eq!(h.coordinator.youtube_state().await, SurfaceState::Idle);
    assert_eq!(youtube.disconnects(), 1);

    h.bus.shutdown();
    run.await.expect("run task")?;
    Ok(())
}
