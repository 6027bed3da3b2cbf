use std::sync::atomic::{AtomicU8, Ordering};

use clap::ValueEnum;
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
pub enum Level {
    Debug,
    Info,
    Warn,
    Error,
}

impl Level {
    fn as_str(self) -> &'static str {
        match self {
            Level::Debug => "debug",
            Level::Info => "info",
            Level::Warn => "warn",
            Level::Error => "error",
        }
    }
}

static MIN_LEVEL: AtomicU8 = AtomicU8::new(Level::Info as u8);

/// Set the process-wide threshold below which events are discarded.
pub fn set_level(level: Level) {
    MIN_LEVEL.store(level as u8, Ordering::Relaxed);
}

pub fn enabled(level: Level) -> bool {
    level as u8 >= MIN_LEVEL.load(Ordering::Relaxed)
}

#[derive(Serialize)]
struct LogEvent<'a> {
    level: &'a str,
    event: &'a str,
    message: &'a str,
    timestamp_ms: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    metadata: Option<Value>,
}

// stdout belongs to the quote table, so every event goes to stderr.
fn emit(level: Level, event: &str, message: &str, metadata: Option<Value>) {
    if !enabled(level) {
        return;
    }

    let entry = LogEvent {
        level: level.as_str(),
        event,
        message,
        timestamp_ms: chrono::Utc::now().timestamp_millis(),
        metadata,
    };

    match serde_json::to_string(&entry) {
        Ok(payload) => eprintln!("{payload}"),
        Err(err) => eprintln!(
            "{{\"level\":\"error\",\"event\":\"logging_failure\",\"message\":\"failed to serialise log\",\"error\":\"{err}\"}}"
        ),
    }
}

pub fn debug(event: &str, message: &str, metadata: Value) {
    emit(Level::Debug, event, message, Some(metadata));
}

pub fn info(event: &str, message: &str, metadata: Value) {
    emit(Level::Info, event, message, Some(metadata));
}

pub fn warn(event: &str, message: &str, metadata: Value) {
    emit(Level::Warn, event, message, Some(metadata));
}

pub fn error(event: &str, message: &str, metadata: Value) {
    emit(Level::Error, event, message, Some(metadata));
}

pub fn info_simple(event: &str, message: &str) {
    emit(Level::Info, event, message, None);
}
