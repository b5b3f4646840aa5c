// File: cmdrelay-core/src/telemetry.rs

use std::fmt;
use std::sync::{Arc, Mutex};
use tracing::{error, info, warn};

use crate::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TelemetryLevel {
    Info,
    Warning,
    Error,
}

impl fmt::Display for TelemetryLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TelemetryLevel::Info => write!(f, "info"),
            TelemetryLevel::Warning => write!(f, "warning"),
            TelemetryLevel::Error => write!(f, "error"),
        }
    }
}

/// Sink for operational events. `source` names the component that raised
/// the event (e.g. `RelayCoordinator.on_stream_online`).
pub trait Telemetry: Send + Sync {
    fn emit(&self, level: TelemetryLevel, source: &str, message: &str);

    fn info(&self, source: &str, message: &str) {
        self.emit(TelemetryLevel::Info, source, message);
    }

    fn warning(&self, source: &str, message: &str) {
        self.emit(TelemetryLevel::Warning, source, message);
    }

    fn error(&self, source: &str, message: &str) {
        self.emit(TelemetryLevel::Error, source, message);
    }

    /// Reports a caught failure, including its `source()` chain.
    fn exception(&self, source: &str, err: &Error) {
        let mut text = err.to_string();
        let mut cause = std::error::Error::source(err);
        while let Some(inner) = cause {
            text.push_str(&format!("\n  caused by: {}", inner));
            cause = inner.source();
        }
        self.emit(TelemetryLevel::Error, source, &text);
    }
}

/// Routes telemetry into `tracing`.
#[derive(Debug, Default, Clone)]
pub struct TracingTelemetry;

impl Telemetry for TracingTelemetry {
    fn emit(&self, level: TelemetryLevel, source: &str, message: &str) {
        match level {
            TelemetryLevel::Info => info!(source = %source, "[{}] {}", source, message),
            TelemetryLevel::Warning => warn!(source = %source, "[{}] {}", source, message),
            TelemetryLevel::Error => error!(source = %source, "[{}] {}", source, message),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryRecord {
    pub level: TelemetryLevel,
    pub source: String,
    pub message: String,
}

/// Keeps every emitted record in memory. Used by tests to assert that a
/// failure was reported rather than propagated.
#[derive(Debug, Default, Clone)]
pub struct RecordingTelemetry {
    records: Arc<Mutex<Vec<TelemetryRecord>>>,
}

impl RecordingTelemetry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<TelemetryRecord> {
        match self.records.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn errors_from(&self, source_prefix: &str) -> Vec<TelemetryRecord> {
        self.records()
            .into_iter()
            .filter(|r| r.level == TelemetryLevel::Error && r.source.starts_with(source_prefix))
            .collect()
    }
}

impl Telemetry for RecordingTelemetry {
    fn emit(&self, level: TelemetryLevel, source: &str, message: &str) {
        let record = TelemetryRecord {
            level,
            source: source.to_string(),
            message: message.to_string(),
        };
        match self.records.lock() {
            Ok(mut guard) => guard.push(record),
            Err(poisoned) => poisoned.into_inner().push(record),
        }
    }
}
