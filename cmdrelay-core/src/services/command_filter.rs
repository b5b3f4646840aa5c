//! Pure allow-list matching for relayed chat commands.
//!
//! Nothing here touches the store or an adapter; the coordinator fetches the
//! command list and passes it in.

use cmdrelay_common::models::{ChatMessage, Command, RelayConfig};

/// Prefix that asks the relay to list its commands.
pub const COMMAND_LIST_PREFIX: &str = "!proxycommands";

const COMMAND_LIST_HEADER: &str = "Proxy commands: ";

pub fn is_command_list_request(text: &str) -> bool {
    text.starts_with(COMMAND_LIST_PREFIX)
}

/// Returns the first enabled command whose name is a prefix of `text`.
///
/// Matching is a plain string prefix with no delimiter check, so `!bsrfoo`
/// matches `!bsr`.
pub fn match_command<'a>(text: &str, commands: &'a [Command]) -> Option<&'a Command> {
    commands
        .iter()
        .find(|cmd| cmd.is_enabled && text.starts_with(cmd.command_name.as_str()))
}

/// The enabled subset, in store order.
pub fn enabled_commands(commands: &[Command]) -> Vec<Command> {
    commands.iter().filter(|c| c.is_enabled).cloned().collect()
}

/// `"Proxy commands: !a, !b, !c"`.
pub fn format_command_list(commands: &[Command]) -> String {
    let mut out = String::from(COMMAND_LIST_HEADER);
    for (i, cmd) in commands.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        out.push_str(&cmd.command_name);
    }
    out
}

/// True when a Discord message was written by the relay's own bot account.
/// Without a known bot id nothing is treated as our own.
pub fn is_own_message(msg: &ChatMessage, bot_user_id: Option<&str>) -> bool {
    match bot_user_id {
        Some(id) if !id.is_empty() => msg.author_id == id,
        _ => false,
    }
}

/// True when a Discord message arrived on the one channel the relay listens to.
pub fn is_configured_channel(msg: &ChatMessage, config: &RelayConfig) -> bool {
    let configured = config.discord_channel_id.trim();
    !configured.is_empty() && msg.origin.as_str() == configured
}

#[cfg(test)]
mod tests {
    use super::*;
    use cmdrelay_common::models::{ChannelRef, Platform};

    fn cmds(list: &[(&str, bool)]) -> Vec<Command> {
        list.iter().map(|(n, e)| Command::new(n, *e)).collect()
    }

    #[test]
    fn list_request_needs_the_literal_prefix() {
        assert!(is_command_list_request("!proxycommands"));
        assert!(is_command_list_request("!proxycommands please"));
        assert!(!is_command_list_request(" !proxycommands"));
        assert!(!is_command_list_request("!proxy"));
        assert!(!is_command_list_request("!PROXYCOMMANDS"));
    }

    #[test]
    fn first_enabled_prefix_wins() {
        let list = cmds(&[("!b", false), ("!bs", true), ("!bsr", true)]);
        let hit = match_command("!bsr 25f", &list).unwrap();
        assert_eq!(hit.command_name, "!bs");
    }

    #[test]
    fn prefix_match_has_no_delimiter_check() {
        let list = cmds(&[("!bsr", true)]);
        assert!(match_command("!bsrfoo", &list).is_some());
        assert!(match_command("!bs", &list).is_none());
        assert!(match_command("hello !bsr", &list).is_none());
    }

    #[test]
    fn disabled_commands_never_match() {
        let list = cmds(&[("!bsr", true), ("!queue", false)]);
        assert!(match_command("!queue 5", &list).is_none());
        assert_eq!(match_command("!bsr next", &list).unwrap().command_name, "!bsr");
    }

    #[test]
    fn empty_list_matches_nothing() {
        assert!(match_command("!bsr", &[]).is_none());
    }

    #[test]
    fn format_joins_without_leading_separator() {
        let list = cmds(&[("!bsr", true), ("!queue", true), ("!link", true)]);
        assert_eq!(format_command_list(&list), "Proxy commands: !bsr, !queue, !link");
        assert_eq!(format_command_list(&list), format_command_list(&list));
        assert_eq!(format_command_list(&list[..1]), "Proxy commands: !bsr");
        assert_eq!(format_command_list(&[]), "Proxy commands: ");
    }

    #[test]
    fn enabled_commands_keeps_order() {
        let list = cmds(&[("!a", true), ("!b", false), ("!c", true)]);
        let names: Vec<_> = enabled_commands(&list).into_iter().map(|c| c.command_name).collect();
        assert_eq!(names, vec!["!a", "!c"]);
    }

    #[test]
    fn discord_gates() {
        let config = RelayConfig { discord_channel_id: "42".into(), ..Default::default() };
        let msg = ChatMessage::new(Platform::Discord, "bot", "7", "!bsr", ChannelRef::new("42"));

        assert!(is_own_message(&msg, Some("7")));
        assert!(!is_own_message(&msg, Some("8")));
        assert!(!is_own_message(&msg, None));

        assert!(is_configured_channel(&msg, &config));
        let elsewhere = ChatMessage::new(Platform::Discord, "u", "1", "!bsr", ChannelRef::new("43"));
        assert!(!is_configured_channel(&elsewhere, &config));
        assert!(!is_configured_channel(&msg, &RelayConfig::default()));
    }
}
