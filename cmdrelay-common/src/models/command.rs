use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};
use uuid::Uuid;

/// Command names seeded into an empty store on first boot, in this order.
pub const DEFAULT_COMMAND_NAMES: [&str; 6] = ["!bsr", "!bshelp", "!queue", "!link", "!request", "!bomb"];

/// A chat command (e.g. `!bsr`) that may be relayed to Twitch when enabled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    pub command_id: Uuid,
    pub command_name: String,
    pub is_enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Command {
    pub fn new(command_name: &str, is_enabled: bool) -> Self {
        let now = Utc::now();
        Self {
            command_id: Uuid::new_v4(),
            command_name: command_name.to_string(),
            is_enabled,
            created_at: now,
            updated_at: now,
        }
    }

    /// Names must be non-empty and start with `!`.
    pub fn is_valid_name(name: &str) -> bool {
        name.len() > 1 && name.starts_with('!') && !name.chars().any(char::is_whitespace)
    }
}
