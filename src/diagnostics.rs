//! Field diagnostics for automation runs.
//!
//! Components receive a [`DiagnosticsLog`] at construction. When diagnostics
//! are off they get [`NoopLog`], and the [`diag!`](crate::diag) macro skips
//! building the structured payload entirely.

use crate::errors::Result;
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, VecDeque};
use std::path::Path;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub level: LogLevel,
    pub message: String,
    pub data: Value,
}

/// Exportable picture of what the automation saw.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosticsSnapshot {
    pub run_id: Uuid,
    pub exported_at: chrono::DateTime<chrono::Utc>,
    pub entries: Vec<LogEntry>,
    /// Latest value recorded per state key (`detection`, `extraction`, ...).
    pub states: BTreeMap<String, Value>,
    pub screenshot_base64: Option<String>,
}

impl DiagnosticsSnapshot {
    pub fn export_to(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

pub trait DiagnosticsLog: Send + Sync {
    fn is_enabled(&self) -> bool;

    fn record(&self, level: LogLevel, message: &str, data: Value);

    fn record_state(&self, _key: &str, _value: Value) {}

    fn attach_screenshot(&self, _png: &[u8]) {}

    fn snapshot(&self) -> Option<DiagnosticsSnapshot> {
        None
    }

    fn clear(&self) {}
}

/// Record an entry only when the log is enabled.
///
/// ```ignore
/// diag!(log, Info, "region settled", { "length": 1200 });
/// ```
#[macro_export]
macro_rules! diag {
    ($log:expr, $level:ident, $message:expr) => {
        if $log.is_enabled() {
            $log.record(
                $crate::diagnostics::LogLevel::$level,
                $message,
                serde_json::Value::Null,
            );
        }
    };
    ($log:expr, $level:ident, $message:expr, $($data:tt)+) => {
        if $log.is_enabled() {
            $log.record(
                $crate::diagnostics::LogLevel::$level,
                $message,
                serde_json::json!($($data)+),
            );
        }
    };
}

pub struct NoopLog;

impl DiagnosticsLog for NoopLog {
    fn is_enabled(&self) -> bool {
        false
    }

    fn record(&self, _level: LogLevel, _message: &str, _data: Value) {}
}

#[derive(Default)]
struct RingState {
    entries: VecDeque<LogEntry>,
    states: BTreeMap<String, Value>,
    screenshot: Option<Vec<u8>>,
}

/// Bounded in-memory log; the oldest entry is evicted once `capacity` is reached.
pub struct RingBufferLog {
    run_id: Uuid,
    capacity: usize,
    inner: Mutex<RingState>,
}

impl RingBufferLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            capacity: capacity.max(1),
            inner: Mutex::new(RingState::default()),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.inner.lock().map(|s| s.entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl DiagnosticsLog for RingBufferLog {
    fn is_enabled(&self) -> bool {
        true
    }

    fn record(&self, level: LogLevel, message: &str, data: Value) {
        tracing::debug!(target: "chat_ragent::diagnostics", ?level, %data, "{}", message);

        let Ok(mut state) = self.inner.lock() else {
            return;
        };
        while state.entries.len() >= self.capacity {
            state.entries.pop_front();
        }
        state.entries.push_back(LogEntry {
            timestamp: chrono::Utc::now(),
            level,
            message: message.to_string(),
            data,
        });
    }

    fn record_state(&self, key: &str, value: Value) {
        if let Ok(mut state) = self.inner.lock() {
            state.states.insert(key.to_string(), value);
        }
    }

    fn attach_screenshot(&self, png: &[u8]) {
        if let Ok(mut state) = self.inner.lock() {
            state.screenshot = Some(png.to_vec());
        }
    }

    fn snapshot(&self) -> Option<DiagnosticsSnapshot> {
        let state = self.inner.lock().ok()?;
        Some(DiagnosticsSnapshot {
            run_id: self.run_id,
            exported_at: chrono::Utc::now(),
            entries: state.entries.iter().cloned().collect(),
            states: state.states.clone(),
            screenshot_base64: state
                .screenshot
                .as_ref()
                .map(|png| base64::engine::general_purpose::STANDARD.encode(png)),
        })
    }

    fn clear(&self) {
        if let Ok(mut state) = self.inner.lock() {
            *state = RingState::default();
        }
    }
}

/// Pick the logger implementation for the runtime flag.
pub fn from_flag(enabled: bool, capacity: usize) -> Arc<dyn DiagnosticsLog> {
    if enabled {
        Arc::new(RingBufferLog::new(capacity))
    } else {
        Arc::new(NoopLog)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn ring_buffer_evicts_oldest_first() {
        let log = RingBufferLog::new(3);
        for i in 0..5 {
            log.record(LogLevel::Info, &format!("entry {}", i), json!({ "i": i }));
        }

        let snapshot = log.snapshot().unwrap();
        let messages: Vec<_> = snapshot.entries.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(messages, vec!["entry 2", "entry 3", "entry 4"]);
        assert_eq!(log.len(), 3);
    }

    #[test]
    fn snapshot_carries_latest_state_and_screenshot() {
        let log = RingBufferLog::new(10);
        log.record_state("detection", json!({ "phase": "GENERATING" }));
        log.record_state("detection", json!({ "phase": "COMPLETE" }));
        log.attach_screenshot(&[0x89, 0x50, 0x4e, 0x47]);

        let snapshot = log.snapshot().unwrap();
        assert_eq!(snapshot.states["detection"]["phase"], "COMPLETE");
        assert_eq!(snapshot.screenshot_base64.as_deref(), Some("iVBORw=="));
    }

    #[test]
    fn clear_drops_everything() {
        let log = RingBufferLog::new(10);
        log.record(LogLevel::Warn, "one", Value::Null);
        log.record_state("request", json!({}));
        log.clear();

        let snapshot = log.snapshot().unwrap();
        assert!(snapshot.entries.is_empty());
        assert!(snapshot.states.is_empty());
        assert!(log.is_empty());
    }

    #[test]
    fn noop_log_is_disabled_and_exports_nothing() {
        let log = NoopLog;
        diag!(log, Error, "ignored", { "x": 1 });
        assert!(!log.is_enabled());
        assert!(log.snapshot().is_none());
    }

    #[test]
    fn diag_macro_records_structured_data() {
        let log = RingBufferLog::new(4);
        let selector = "#prompt-textarea";
        diag!(log, Info, "located", { "selector": selector });
        diag!(log, Debug, "tick");

        let snapshot = log.snapshot().unwrap();
        assert_eq!(snapshot.entries[0].data["selector"], selector);
        assert_eq!(snapshot.entries[1].level, LogLevel::Debug);
        assert!(snapshot.entries[1].data.is_null());
    }

    #[test]
    fn snapshot_exports_as_json() {
        let log = RingBufferLog::new(2);
        log.record(LogLevel::Info, "saved", json!({ "id": "abc" }));
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snapshot.json");

        log.snapshot().unwrap().export_to(&path).unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        let parsed: DiagnosticsSnapshot = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed.entries.len(), 1);
        assert_eq!(parsed.entries[0].data["id"], "abc");
    }
}
