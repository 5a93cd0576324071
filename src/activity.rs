//! Activity log sinks.
//!
//! The activity log is the human-readable narration of every state
//! transition and request result. It is a pure append-text sink: rendering
//! and scrolling belong to whatever shell displays it.
//!
//! Diagnostics still go through `tracing`; the activity log is what a user
//! watching the client would read.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use parking_lot::Mutex;
use serde::Serialize;
use tracing::info;

// ============================================================================
// ActivityLog
// ============================================================================

/// Append-only narration sink.
///
/// Implementations must not panic; appending can never fail.
pub trait ActivityLog: Send + Sync {
    /// Appends one line of narration.
    fn append(&self, line: &str);
}

// ============================================================================
// MemoryLog
// ============================================================================

/// In-memory activity log, one line per append.
#[derive(Debug, Default)]
pub struct MemoryLog {
    buffer: Mutex<String>,
}

impl MemoryLog {
    /// Creates an empty log.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns everything appended so far.
    #[must_use]
    pub fn contents(&self) -> String {
        self.buffer.lock().clone()
    }

    /// Returns `true` if any appended line contains `needle`.
    #[must_use]
    pub fn contains(&self, needle: &str) -> bool {
        self.buffer.lock().contains(needle)
    }

    /// Clears the log.
    pub fn clear(&self) {
        self.buffer.lock().clear();
    }
}

impl ActivityLog for MemoryLog {
    fn append(&self, line: &str) {
        let mut buffer = self.buffer.lock();
        buffer.push_str(line);
        buffer.push('\n');
    }
}

// ============================================================================
// TracingLog
// ============================================================================

/// Forwards narration to `tracing` under the `activity` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLog;

impl ActivityLog for TracingLog {
    fn append(&self, line: &str) {
        info!(target: "activity", "{line}");
    }
}

// ============================================================================
// Rendering
// ============================================================================

/// Renders a value for the activity log.
///
/// Falls back to `Debug` when JSON serialization fails, so rendering never
/// errors.
pub fn render<T>(value: &T) -> String
where
    T: Serialize + fmt::Debug + ?Sized,
{
    serde_json::to_string(value).unwrap_or_else(|_| format!("{value:?}"))
}

/// Pretty variant of [`render`], used for error payloads.
pub fn render_pretty<T>(value: &T) -> String
where
    T: Serialize + fmt::Debug + ?Sized,
{
    serde_json::to_string_pretty(value).unwrap_or_else(|_| format!("{value:?}"))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::BTreeMap;

    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn test_memory_log_appends_lines() {
        let log = MemoryLog::new();
        log.append("Initializing Wallet Connect Client");
        log.append("Got approval");

        assert_eq!(
            log.contents(),
            "Initializing Wallet Connect Client\nGot approval\n"
        );
        assert!(log.contains("Got approval"));

        log.clear();
        assert!(log.contents().is_empty());
    }

    #[test]
    fn test_render_json() {
        assert_eq!(render(&json!({"topic": "T1"})), r#"{"topic":"T1"}"#);
    }

    #[test]
    fn test_render_falls_back_on_unserializable() {
        // Non-string map keys cannot be serialized to JSON.
        let mut map = BTreeMap::new();
        map.insert((1, 2), "value");

        let rendered = render(&map);
        assert!(rendered.contains("value"));
    }

    proptest! {
        #[test]
        fn test_render_never_empty_for_strings(s in ".*") {
            let rendered = render(&s);
            prop_assert!(rendered.starts_with('"'));
        }
    }
}
