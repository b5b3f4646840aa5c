// cmdrelay-server/src/settings.rs
//
// Process settings that seed the stored relay config on first boot.

use cmdrelay_common::models::RelayConfig;

pub const ENABLE_YOUTUBE: &str = "ENABLE_YOUTUBE";
pub const ENABLE_DISCORD: &str = "ENABLE_DISCORD";
pub const GOOGLE_CREDENTIALS_FILE: &str = "GOOGLE_CREDENTIALS_FILE";
pub const YOUTUBE_USER_EMAIL: &str = "YOUTUBE_USER_EMAIL";
pub const DISCORD_TOKEN: &str = "DISCORD_TOKEN";
pub const DISCORD_CHANNEL_ID: &str = "DISCORD_CHANNEL_ID";
pub const TWITCH_USER_NAME: &str = "TWITCH_USER_NAME";
pub const TWITCH_ACCESS_TOKEN: &str = "TWITCH_ACCESS_TOKEN";
pub const TWITCH_CHANNEL: &str = "TWITCH_CHANNEL";
pub const TWITCH_CLIENT_ID: &str = "TWITCH_CLIENT_ID";

/// Reads the settings from the process environment (after `.env` is loaded).
pub fn from_env() -> RelayConfig {
    from_lookup(|key| std::env::var(key).ok())
}

/// Builds the initial config from any key lookup. Missing keys become
/// empty strings or `false`.
pub fn from_lookup<F>(lookup: F) -> RelayConfig
where
    F: Fn(&str) -> Option<String>,
{
    let text = |key: &str| lookup(key).map(|v| v.trim().to_string()).unwrap_or_default();
    let flag = |key: &str| lookup(key).map(|v| parse_flag(&v)).unwrap_or(false);

    RelayConfig {
        enable_youtube: flag(ENABLE_YOUTUBE),
        enable_discord: flag(ENABLE_DISCORD),
        google_credentials_file: text(GOOGLE_CREDENTIALS_FILE),
        youtube_user_email: text(YOUTUBE_USER_EMAIL),
        discord_token: text(DISCORD_TOKEN),
        discord_channel_id: text(DISCORD_CHANNEL_ID),
        twitch_user_name: text(TWITCH_USER_NAME),
        twitch_access_token: text(TWITCH_ACCESS_TOKEN),
        twitch_channel: text(TWITCH_CHANNEL),
        twitch_client_id: text(TWITCH_CLIENT_ID),
        ..Default::default()
    }
}

fn parse_flag(raw: &str) -> bool {
    matches!(raw.trim(), "true" | "True" | "1")
}
