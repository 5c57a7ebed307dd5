//! User-facing activity log.
//!
//! Separate from the `tracing` diagnostics: entries here are what the
//! dashboard's log panel shows, filters and exports.

use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::error::MarketError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Info,
    Warning,
    Error,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Info => "INFO",
            LogLevel::Warning => "WARNING",
            LogLevel::Error => "ERROR",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = MarketError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "INFO" => Ok(LogLevel::Info),
            "WARNING" | "WARN" => Ok(LogLevel::Warning),
            "ERROR" => Ok(LogLevel::Error),
            other => Err(MarketError::invalid_request(format!("unknown log level {other:?}"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: u64,
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub source: String,
    pub message: String,
    pub user_email: Option<String>,
}

/// All set fields must match; an empty filter matches everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LogFilter {
    pub level: Option<LogLevel>,
    pub source: Option<String>,
    pub date_from: Option<DateTime<Utc>>,
    pub date_to: Option<DateTime<Utc>>,
}

impl LogFilter {
    pub fn matches(&self, entry: &LogEntry) -> bool {
        if self.level.is_some_and(|level| level != entry.level) {
            return false;
        }
        if let Some(source) = &self.source {
            if !entry.source.eq_ignore_ascii_case(source.trim()) {
                return false;
            }
        }
        if self.date_from.is_some_and(|from| entry.timestamp < from) {
            return false;
        }
        if self.date_to.is_some_and(|to| entry.timestamp > to) {
            return false;
        }
        true
    }
}

struct LogState {
    entries: VecDeque<LogEntry>,
    next_id: u64,
}

/// Bounded in-memory log; the oldest entry is evicted once `capacity` is hit.
pub struct LogBook {
    state: Mutex<LogState>,
    capacity: usize,
}

impl LogBook {
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::new(LogState {
                entries: VecDeque::new(),
                next_id: 1,
            }),
            capacity: capacity.max(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, LogState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn record(
        &self,
        level: LogLevel,
        source: &str,
        message: impl Into<String>,
        user_email: Option<String>,
    ) -> LogEntry {
        self.record_at(level, source, message, user_email, Utc::now())
    }

    pub fn record_at(
        &self,
        level: LogLevel,
        source: &str,
        message: impl Into<String>,
        user_email: Option<String>,
        timestamp: DateTime<Utc>,
    ) -> LogEntry {
        let mut state = self.lock();
        let entry = LogEntry {
            id: state.next_id,
            timestamp,
            level,
            source: source.to_string(),
            message: message.into(),
            user_email,
        };
        state.next_id += 1;
        if state.entries.len() == self.capacity {
            state.entries.pop_front();
        }
        state.entries.push_back(entry.clone());
        entry
    }

    pub fn info(&self, source: &str, message: impl Into<String>) -> LogEntry {
        self.record(LogLevel::Info, source, message, None)
    }

    pub fn warning(&self, source: &str, message: impl Into<String>) -> LogEntry {
        self.record(LogLevel::Warning, source, message, None)
    }

    pub fn error(&self, source: &str, message: impl Into<String>) -> LogEntry {
        self.record(LogLevel::Error, source, message, None)
    }

    /// Matching entries, newest first.
    pub fn query(&self, filter: &LogFilter) -> Vec<LogEntry> {
        self.lock()
            .entries
            .iter()
            .rev()
            .filter(|e| filter.matches(e))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove every entry. Ids keep increasing afterwards.
    pub fn clear(&self) -> usize {
        let mut state = self.lock();
        let removed = state.entries.len();
        state.entries.clear();
        removed
    }
}
