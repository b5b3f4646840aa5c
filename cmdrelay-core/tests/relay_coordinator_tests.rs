// tests/relay_coordinator_tests.rs

mod common;

use cmdrelay_common::models::{ChannelRef, ChatMessage, Platform};
use cmdrelay_core::platforms::AdapterEvent;
use cmdrelay_core::repositories::CommandRepository;
use cmdrelay_core::services::{SurfaceState, TwitchState};
use cmdrelay_core::Error;

use common::{commands, eventually, settings, Harness, DISCORD_CHANNEL};

fn youtube_msg(text: &str) -> ChatMessage {
    ChatMessage::new(Platform::YouTube, "Viewer", "UC1", text, ChannelRef::new("live-chat-1"))
}

fn discord_msg(author_id: &str, channel: &str, text: &str) -> ChatMessage {
    ChatMessage::new(Platform::Discord, "someone", author_id, text, ChannelRef::new(channel))
}

#[tokio::test]
async fn startup_seeds_commands_and_starts_twitch() -> Result<(), Error> {
    let h = Harness::new(settings(false, false), vec![]);
    h.coordinator.start().await?;

    let names: Vec<_> = h.command_repo.list_commands().await?.into_iter().map(|c| c.command_name).collect();
    assert_eq!(names, vec!["!bsr", "!bshelp", "!queue", "!link", "!request", "!bomb"]);

    assert_eq!(h.coordinator.twitch_state().await, TwitchState::Running);
    assert_eq!(h.coordinator.youtube_state().await, SurfaceState::Disabled);
    assert_eq!(h.coordinator.discord_state().await, SurfaceState::Disabled);
    assert_eq!(h.coordinator.generation().await, 1);

    let twitch = h.factory.latest_twitch().expect("twitch chat built");
    assert!(twitch.is_connected());
    assert_eq!(h.factory.latest_monitor().expect("monitor built").starts(), 1);
    assert!(h.factory.youtube().is_none());
    assert!(h.factory.discord().is_none());

    assert!(matches!(h.coordinator.start().await, Err(Error::Startup(_))));
    Ok(())
}

#[tokio::test]
async fn existing_commands_are_not_reseeded() -> Result<(), Error> {
    let h = Harness::new(settings(false, false), commands(&[("!custom", true)]));
    h.coordinator.start().await?;
    assert_eq!(h.command_repo.list_commands().await?.len(), 1);
    Ok(())
}

#[tokio::test]
async fn only_enabled_commands_are_relayed() -> Result<(), Error> {
    let h = Harness::new(settings(true, false), commands(&[("!bsr", true), ("!queue", false)]));
    h.coordinator.start().await?;
    let twitch = h.factory.latest_twitch().expect("twitch chat built");

    h.coordinator.on_inbound_message(youtube_msg("!queue 5")).await;
    assert!(twitch.sent().is_empty());

    h.coordinator.on_inbound_message(youtube_msg("!bsr next")).await;
    assert_eq!(twitch.sent(), vec![(ChannelRef::new("#streamer"), "!bsr next".to_string())]);

    h.coordinator.on_inbound_message(youtube_msg("hello chat")).await;
    assert_eq!(twitch.sent().len(), 1);
    Ok(())
}

#[tokio::test]
async fn command_list_goes_to_echo_surfaces_only() -> Result<(), Error> {
    let h = Harness::new(
        settings(true, true),
        commands(&[("!bsr", true), ("!queue", false), ("!link", true)]),
    );
    h.coordinator.start().await?;

    h.coordinator
        .on_discord_inbound_message(discord_msg("123", DISCORD_CHANNEL, "!proxycommands"))
        .await;

    let expected = "Proxy commands: !bsr, !link".to_string();
    let discord = h.factory.discord().expect("discord built");
    let youtube = h.factory.youtube().expect("youtube built");
    let twitch = h.factory.latest_twitch().expect("twitch built");

    assert_eq!(discord.sent(), vec![(ChannelRef::new(DISCORD_CHANNEL), expected.clone())]);
    assert_eq!(youtube.sent(), vec![(ChannelRef::new("live-chat-1"), expected)]);
    assert!(twitch.sent().is_empty());
    Ok(())
}

#[tokio::test]
async fn command_list_request_wins_over_matching() -> Result<(), Error> {
    let h = Harness::new(settings(true, false), commands(&[("!proxy", true)]));
    h.coordinator.start().await?;

    h.coordinator.on_inbound_message(youtube_msg("!proxycommands please")).await;

    assert!(h.factory.latest_twitch().unwrap().sent().is_empty());
    assert_eq!(h.factory.youtube().unwrap().sent_texts(), vec!["Proxy commands: !proxy"]);
    Ok(())
}

#[tokio::test]
async fn discord_gates_drop_self_and_foreign_channel() -> Result<(), Error> {
    let h = Harness::new(settings(false, true), commands(&[("!bsr", true)]));
    let run = h.start_and_run().await?;
    let discord = h.factory.discord().expect("discord built");
    let twitch = h.factory.latest_twitch().expect("twitch built");

    assert!(discord.emit(AdapterEvent::Connected {
        platform: Platform::Discord,
        self_id: Some("999".into()),
    }));
    assert!(discord.say("999", DISCORD_CHANNEL, "!bsr from the bot"));
    assert!(discord.say("123", "777", "!bsr elsewhere"));
    assert!(discord.say("123", DISCORD_CHANNEL, "!bsr right here"));

    assert!(eventually(|| !twitch.sent().is_empty()).await);
    assert_eq!(twitch.sent_texts(), vec!["!bsr right here"]);

    h.bus.shutdown();
    run.await.expect("run task")?;
    Ok(())
}

#[tokio::test]
async fn discord_self_filter_starts_at_ready() -> Result<(), Error> {
    let h = Harness::new(settings(false, true), commands(&[("!bsr", true)]));
    let run = h.start_and_run().await?;
    let discord = h.factory.discord().expect("discord built");
    let twitch = h.factory.latest_twitch().expect("twitch built");

    // No Ready yet, so the bot's id is unknown and its lines are relayed.
    assert!(discord.say("999", DISCORD_CHANNEL, "!bsr before ready"));
    assert!(eventually(|| twitch.sent().len() == 1).await);

    assert!(discord.emit(AdapterEvent::Connected {
        platform: Platform::Discord,
        self_id: Some("999".into()),
    }));
    assert!(discord.say("999", DISCORD_CHANNEL, "!bsr after ready"));
    assert!(discord.say("123", DISCORD_CHANNEL, "!bsr from a user"));

    assert!(eventually(|| twitch.sent().len() == 2).await);
    assert_eq!(twitch.sent_texts(), vec!["!bsr before ready", "!bsr from a user"]);

    h.bus.shutdown();
    run.await.expect("run task")?;
    Ok(())
}

#[tokio::test]
async fn youtube_batch_is_relayed_in_order() -> Result<(), Error> {
    let h = Harness::new(settings(true, false), commands(&[("!bsr", true)]));
    let run = h.start_and_run().await?;
    let youtube = h.factory.youtube().expect("youtube built");
    let twitch = h.factory.latest_twitch().expect("twitch built");

    for text in ["!bsr 1", "!bsr 2", "!bsr 3"] {
        assert!(youtube.say("UC1", "live-chat-1", text));
    }
    assert!(eventually(|| twitch.sent().len() == 3).await);
    assert_eq!(twitch.sent_texts(), vec!["!bsr 1", "!bsr 2", "!bsr 3"]);

    h.bus.shutdown();
    run.await.expect("run task")?;
    Ok(())
}

#[tokio::test]
async fn twitch_chat_is_logged_not_relayed() -> Result<(), Error> {
    let h = Harness::new(settings(false, false), commands(&[("!bsr", true)]));
    let run = h.start_and_run().await?;
    let twitch = h.factory.latest_twitch().expect("twitch built");

    assert!(twitch.say("42", "#streamer", "!bsr loop"));
    assert!(twitch.emit(AdapterEvent::Connected { platform: Platform::Twitch, self_id: None }));

    // The announcement is queued behind the chat line, so once it shows up
    // the chat line has been handled.
    assert!(eventually(|| !twitch.sent().is_empty()).await);
    assert_eq!(twitch.sent_texts(), vec!["cmdrelay for Twitch has connected."]);

    h.bus.shutdown();
    run.await.expect("run task")?;
    Ok(())
}

#[tokio::test]
async fn stream_signals_drive_youtube() -> Result<(), Error> {
    let h = Harness::new(settings(true, false), vec![]);
    let run = h.start_and_run().await?;
    let youtube = h.factory.youtube().expect("youtube built");
    let monitor = h.factory.latest_monitor().expect("monitor built");

    assert_eq!(h.coordinator.youtube_state().await, SurfaceState::Idle);
    assert_eq!(youtube.connects(), 0);

    assert!(monitor.go_online());
    assert!(eventually(|| youtube.is_connected()).await);
    assert_eq!(h.coordinator.youtube_state().await, SurfaceState::Connected);

    assert!(youtube.emit(AdapterEvent::Connected { platform: Platform::YouTube, self_id: None }));
    assert!(eventually(|| !youtube.sent().is_empty()).await);
    assert_eq!(
        youtube.sent(),
        vec![(ChannelRef::new("live-chat-1"), "cmdrelay for YouTube has connected.".to_string())]
    );

    // A second online signal while connected is a no-op.
    h.coordinator.on_stream_online().await;
    assert_eq!(youtube.connects(), 1);

    assert!(monitor.go_offline());
    assert!(eventually(|| !youtube.is_connected()).await);
    assert_eq!(h.coordinator.youtube_state().await, SurfaceState::Idle);
    assert_eq!(youtube.disconnects(), 1);

    h.bus.shutdown();
    run.await.expect("run task")?;
    Ok(())
}

#[tokio::test]
async fn stream_online_with_youtube_disabled_does_nothing() -> Result<(), Error> {
    let h = Harness::new(settings(false, false), vec![]);
    h.coordinator.start().await?;
    h.coordinator.on_stream_online().await;
    h.coordinator.on_stream_offline().await;
    assert_eq!(h.coordinator.youtube_state().await, SurfaceState::Disabled);
    assert!(h.telemetry.errors_from("RelayCoordinator").is_empty());
    Ok(())
}

#[tokio::test]
async fn shutdown_tears_everything_down() -> Result<(), Error> {
    let h = Harness::new(settings(true, true), vec![]);
    let run = h.start_and_run().await?;

    h.bus.shutdown();
    run.await.expect("run task")?;

    let twitch = h.factory.latest_twitch().unwrap();
    let monitor = h.factory.latest_monitor().unwrap();
    let discord = h.factory.discord().unwrap();
    let youtube = h.factory.youtube().unwrap();

    assert_eq!(twitch.disconnects(), 1);
    assert!(!twitch.sink_open());
    assert_eq!(monitor.stops(), 1);
    assert!(!monitor.sink_open());
    assert_eq!(discord.disconnects(), 1);
    assert!(!discord.sink_open());
    assert!(!youtube.sink_open());
    assert_eq!(h.coordinator.twitch_state().await, TwitchState::Stopped);
    Ok(())
}
