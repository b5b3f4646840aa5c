// File: cmdrelay-common/src/models/config.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The single relay configuration record. Exactly one lives in the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelayConfig {
    pub config_id: Uuid,
    pub enable_youtube: bool,
    pub enable_discord: bool,
    pub google_credentials_file: String,
    pub youtube_user_email: String,
    pub discord_token: String,
    pub discord_channel_id: String,
    pub twitch_user_name: String,
    pub twitch_access_token: String,
    pub twitch_channel: String,
    pub twitch_client_id: String,
    pub modified_date: DateTime<Utc>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            config_id: Uuid::new_v4(),
            enable_youtube: false,
            enable_discord: false,
            google_credentials_file: String::new(),
            youtube_user_email: String::new(),
            discord_token: String::new(),
            discord_channel_id: String::new(),
            twitch_user_name: String::new(),
            twitch_access_token: String::new(),
            twitch_channel: String::new(),
            twitch_client_id: String::new(),
            modified_date: Utc::now(),
        }
    }
}

impl RelayConfig {
    /// Copy with every secret blanked, for showing to an operator.
    pub fn redacted(&self) -> Self {
        fn mask(s: &str) -> String {
            if s.is_empty() { String::new() } else { "********".to_string() }
        }
        Self {
            discord_token: mask(&self.discord_token),
            twitch_access_token: mask(&self.twitch_access_token),
            ..self.clone()
        }
    }

    pub fn touch(&mut self) {
        self.modified_date = Utc::now();
    }
}
