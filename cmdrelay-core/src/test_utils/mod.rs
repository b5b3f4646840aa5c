// File: cmdrelay-core/src/test_utils/mod.rs

pub mod fakes;
pub mod helpers;

pub use fakes::{FakeAdapterFactory, FakeChatAdapter, FakeChatRemote, FakeMonitorRemote, FakeStreamMonitor};
pub use crate::telemetry::RecordingTelemetry;
