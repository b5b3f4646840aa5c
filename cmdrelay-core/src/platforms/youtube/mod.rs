pub mod client;
pub mod runtime;

pub use client::{GoogleCredentials, LiveChatApi, YouTubeApiClient};
pub use runtime::YouTubePlatform;
