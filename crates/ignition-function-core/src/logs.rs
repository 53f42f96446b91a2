//! The per-function ring-buffer log store backing `/logs`: bounded, oldest
//! dropped on overflow, queryable by the control plane. Every entry pushed
//! here is also emitted through `tracing` at the matching level, so
//! operators get both the structured buffer and the ambient log stream.

use std::collections::VecDeque;

use dashmap::DashMap;
use parking_lot::Mutex;
use time::OffsetDateTime;

pub const DEFAULT_CAPACITY: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

impl LogLevel {
    fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

#[derive(Debug, Clone)]
struct LogEntry {
    timestamp: OffsetDateTime,
    level: LogLevel,
    message: String,
}

impl LogEntry {
    fn format(&self) -> String {
        format!(
            "[{}] {} {}",
            self.timestamp
                .format(&time::format_description::well_known::Rfc3339)
                .unwrap_or_else(|_| self.timestamp.to_string()),
            self.level.as_str(),
            self.message
        )
    }
}

/// One bounded ring buffer per function key.
pub struct LogStore {
    capacity: usize,
    buffers: DashMap<String, Mutex<VecDeque<LogEntry>>>,
}

impl LogStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            buffers: DashMap::new(),
        }
    }

    pub fn push(&self, key: &str, level: LogLevel, message: impl Into<String>) {
        let message = message.into();
        match level {
            LogLevel::Info => tracing::info!(function = %key, "{message}"),
            LogLevel::Warn => tracing::warn!(function = %key, "{message}"),
            LogLevel::Error => tracing::error!(function = %key, "{message}"),
        }

        let entry = LogEntry {
            timestamp: OffsetDateTime::now_utc(),
            level,
            message,
        };
        let buffer = self
            .buffers
            .entry(key.to_string())
            .or_insert_with(|| Mutex::new(VecDeque::with_capacity(self.capacity)));
        let mut buffer = buffer.lock();
        if buffer.len() == self.capacity {
            buffer.pop_front();
        }
        buffer.push_back(entry);
    }

    /// Formatted log lines for `key`, newest-last, optionally filtered to
    /// entries within the last `since` seconds and/or the final `tail`
    /// entries.
    pub fn get(&self, key: &str, since_seconds: Option<i64>, tail: Option<usize>) -> Vec<String> {
        let Some(buffer) = self.buffers.get(key) else {
            return Vec::new();
        };
        let buffer = buffer.lock();
        let cutoff = since_seconds.map(|secs| OffsetDateTime::now_utc() - time::Duration::seconds(secs));

        let mut entries: Vec<&LogEntry> = buffer
            .iter()
            .filter(|entry| cutoff.map(|cutoff| entry.timestamp >= cutoff).unwrap_or(true))
            .collect();

        if let Some(tail) = tail {
            let skip = entries.len().saturating_sub(tail);
            entries = entries.split_off(skip);
        }

        entries.into_iter().map(LogEntry::format).collect()
    }
}

impl Default for LogStore {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
