pub mod runtime;

pub use runtime::DiscordPlatform;
