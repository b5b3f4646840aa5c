pub mod client;
pub mod runtime;

pub use runtime::{normalize_channel, normalize_oauth_token, IrcConnector, TwitchIrcPlatform, TwitchTlsConnector};
