//! Structured observability hooks for chat log persistence.
//!
//! Errors that are absorbed rather than returned (corrupt documents, failed
//! writes, unserializable entries) are reported to a [`HistoryObserver`].
//! [`TracingObserver`] turns them into `tracing` events; [`RecordingObserver`]
//! keeps them in memory so tests can assert on them.

use std::fmt;
use std::sync::Mutex;

use tracing::{debug, warn};

use crate::error::ChatLogError;

/// Operation during which an error was absorbed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Load,
    Save,
    Encode,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Load => "load",
            Self::Save => "save",
            Self::Encode => "encode",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sink for persistence events.
pub trait HistoryObserver: Send + Sync {
    /// An error was absorbed; the caller received the safe default instead.
    fn absorbed(&self, op: Operation, location: &str, error: &ChatLogError);

    /// A document was written successfully.
    fn saved(&self, _location: &str, _entries: usize) {}

    /// Entries were evicted from the front of a legacy log.
    fn evicted(&self, _location: &str, _count: usize) {}
}

/// Emits every event through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl HistoryObserver for TracingObserver {
    fn absorbed(&self, op: Operation, location: &str, error: &ChatLogError) {
        emit_absorbed(op, location, error);
    }

    fn saved(&self, location: &str, entries: usize) {
        emit_saved(location, entries);
    }

    fn evicted(&self, location: &str, count: usize) {
        emit_evicted(location, count);
    }
}

/// Emit event: an error was absorbed (warning level).
pub fn emit_absorbed(op: Operation, location: &str, error: &ChatLogError) {
    warn!(
        event = "history.absorbed",
        op = %op,
        location = %location,
        error_kind = error.kind(),
        error = %error,
    );
}

/// Emit event: a log document was saved.
pub fn emit_saved(location: &str, entries: usize) {
    debug!(event = "history.saved", location = %location, entries = entries);
}

/// Emit event: legacy log entries were evicted.
pub fn emit_evicted(location: &str, count: usize) {
    debug!(event = "history.evicted", location = %location, count = count);
}

/// An event captured by [`RecordingObserver`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HistoryEvent {
    Absorbed {
        op: Operation,
        location: String,
        kind: &'static str,
    },
    Saved {
        location: String,
        entries: usize,
    },
    Evicted {
        location: String,
        count: usize,
    },
}

/// Collects events in memory.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<HistoryEvent>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<HistoryEvent> {
        self.lock().clone()
    }

    /// Absorbed errors of `op`, as `(location, error kind)` pairs.
    pub fn absorbed_events(&self, op: Operation) -> Vec<(String, &'static str)> {
        self.lock()
            .iter()
            .filter_map(|e| match e {
                HistoryEvent::Absorbed {
                    op: o,
                    location,
                    kind,
                } if *o == op => Some((location.clone(), *kind)),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn push(&self, event: HistoryEvent) {
        self.lock().push(event);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<HistoryEvent>> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl HistoryObserver for RecordingObserver {
    fn absorbed(&self, op: Operation, location: &str, error: &ChatLogError) {
        self.push(HistoryEvent::Absorbed {
            op,
            location: location.to_string(),
            kind: error.kind(),
        });
    }

    fn saved(&self, location: &str, entries: usize) {
        self.push(HistoryEvent::Saved {
            location: location.to_string(),
            entries,
        });
    }

    fn evicted(&self, location: &str, count: usize) {
        self.push(HistoryEvent::Evicted {
            location: location.to_string(),
            count,
        });
    }
}
