//! Rolling window construction over a full conversation history.
//!
//! The window is the longest trailing run of entries whose encoded sizes sum
//! to at most the byte budget. The walk goes newest to oldest and stops at the
//! first entry that would overflow; older entries are never considered even
//! if they would fit on their own.

use serde::Serialize;

use crate::codec::encoded_size;
use crate::config::ChatLogConfig;
use crate::obs::{HistoryObserver, Operation, TracingObserver};

const ENCODE_LOCATION: &str = "rolling window";

/// Result of a rolling window build.
#[derive(Debug, Clone, PartialEq)]
pub struct RollingWindow<T> {
    /// Selected entries, oldest first.
    pub entries: Vec<T>,
    /// Sum of the encoded sizes of `entries`.
    pub total_bytes: usize,
    /// Entries passed over because they could not be encoded.
    pub skipped: usize,
    /// Older entries cut off once the budget was reached.
    pub excluded: usize,
    pub max_bytes: usize,
}

impl<T> RollingWindow<T> {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn into_entries(self) -> Vec<T> {
        self.entries
    }
}

/// Builds rolling windows under a fixed byte budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RollingWindowBuilder {
    max_bytes: usize,
}

impl RollingWindowBuilder {
    pub fn new(max_bytes: usize) -> Self {
        Self { max_bytes }
    }

    pub fn from_config(config: &ChatLogConfig) -> Self {
        Self::new(config.max_context_length)
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    /// Build the rolling window for `history` (ordered oldest to newest).
    ///
    /// Entries that fail to encode are reported to `observer` and skipped
    /// without counting against the budget.
    pub fn build<T>(&self, history: &[T], observer: &dyn HistoryObserver) -> RollingWindow<T>
    where
        T: Serialize + Clone,
    {
        let mut newest_first = Vec::new();
        let mut total_bytes = 0usize;
        let mut skipped = 0usize;
        let mut excluded = 0usize;

        for (idx, entry) in history.iter().enumerate().rev() {
            let size = match encoded_size(entry) {
                Ok(size) => size,
                Err(e) => {
                    observer.absorbed(Operation::Encode, ENCODE_LOCATION, &e);
                    skipped += 1;
                    continue;
                }
            };

            if total_bytes + size > self.max_bytes {
                excluded = idx + 1;
                break;
            }
            newest_first.push(entry.clone());
            total_bytes += size;
        }

        newest_first.reverse();
        RollingWindow {
            entries: newest_first,
            total_bytes,
            skipped,
            excluded,
            max_bytes: self.max_bytes,
        }
    }
}

/// Rolling window entries for `history` under `max_bytes`, reporting through `tracing`.
pub fn build_rolling_history<T>(history: &[T], max_bytes: usize) -> Vec<T>
where
    T: Serialize + Clone,
{
    RollingWindowBuilder::new(max_bytes)
        .build(history, &TracingObserver)
        .into_entries()
}
