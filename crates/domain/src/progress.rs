//! Operator-visible progress stream

use std::sync::{Arc, RwLock};
use uuid::Uuid;

use crate::model::{LogEntry, LogLevel};
use crate::ports::{Clock, SystemClock};

/// Append-only, timestamped progress log shared between a session and its
/// in-flight fetch. Every entry is mirrored to `tracing`.
#[derive(Clone)]
pub struct ProgressLog {
    entries: Arc<RwLock<Vec<LogEntry>>>,
    clock: Arc<dyn Clock>,
}

impl ProgressLog {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Arc::new(RwLock::new(Vec::new())),
            clock,
        }
    }

    pub fn info(&self, message: impl Into<String>) {
        self.record(LogLevel::Info, message.into());
    }

    pub fn success(&self, message: impl Into<String>) {
        self.record(LogLevel::Success, message.into());
    }

    pub fn warning(&self, message: impl Into<String>) {
        self.record(LogLevel::Warning, message.into());
    }

    pub fn error(&self, message: impl Into<String>) {
        self.record(LogLevel::Error, message.into());
    }

    /// Snapshot of all entries so far, oldest first
    pub fn entries(&self) -> Vec<LogEntry> {
        match self.entries.read() {
            Ok(entries) => entries.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn len(&self) -> usize {
        match self.entries.read() {
            Ok(entries) => entries.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn record(&self, level: LogLevel, message: String) {
        match level {
            LogLevel::Info | LogLevel::Success => {
                tracing::info!(target: "luckydraw::progress", kind = level.as_str(), "{}", message)
            }
            LogLevel::Warning => {
                tracing::warn!(target: "luckydraw::progress", "{}", message)
            }
            LogLevel::Error => {
                tracing::error!(target: "luckydraw::progress", "{}", message)
            }
        }

        let entry = LogEntry {
            id: Uuid::new_v4(),
            timestamp: self.clock.now(),
            level,
            message,
        };

        match self.entries.write() {
            Ok(mut entries) => entries.push(entry),
            Err(poisoned) => poisoned.into_inner().push(entry),
        }
    }
}

impl Default for ProgressLog {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

impl std::fmt::Debug for ProgressLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressLog")
            .field("entries", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entries_keep_order_and_level() {
        let log = ProgressLog::default();
        log.info("resolving");
        log.warning("page 2 empty");
        log.success("done");

        let entries = log.entries();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].level, LogLevel::Info);
        assert_eq!(entries[1].message, "page 2 empty");
        assert_eq!(entries[2].level, LogLevel::Success);
    }

    #[test]
    fn test_clones_share_entries() {
        let log = ProgressLog::default();
        let handle = log.clone();
        handle.error("boom");
        assert_eq!(log.len(), 1);
    }
}
