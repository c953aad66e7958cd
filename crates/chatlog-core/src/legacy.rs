//! Legacy single-budget retention: a log truncated in place from the front.
//!
//! Unlike the rolling window, this log is both the record and the working
//! copy. After every append, the oldest entries are evicted one at a time
//! until the encoded total is within budget or the log is empty, regardless
//! of how large each individual entry is.

use serde::Serialize;

use crate::codec::encoded_size;
use crate::config::ChatLogConfig;

/// Result of a legacy truncation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvictionReport {
    pub evicted: usize,
    pub remaining: usize,
    pub total_bytes: usize,
}

/// FIFO-from-front retention policy under a byte budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LegacyLog {
    max_bytes: usize,
}

impl LegacyLog {
    pub fn new(max_bytes: usize) -> Self {
        Self { max_bytes }
    }

    pub fn from_config(config: &ChatLogConfig) -> Self {
        Self::new(config.max_context_length)
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    /// Evict from the oldest end until the log fits the budget.
    ///
    /// Entries that cannot be encoded weigh nothing here; they are dropped
    /// when the log is persisted.
    pub fn truncate<T: Serialize>(&self, log: &mut Vec<T>) -> EvictionReport {
        let sizes: Vec<usize> = log.iter().map(|e| encoded_size(e).unwrap_or(0)).collect();
        let mut total_bytes: usize = sizes.iter().sum();

        let mut evicted = 0;
        while total_bytes > self.max_bytes && evicted < sizes.len() {
            total_bytes -= sizes[evicted];
            evicted += 1;
        }
        log.drain(..evicted);

        EvictionReport {
            evicted,
            remaining: log.len(),
            total_bytes,
        }
    }

    /// Append `entry` then truncate.
    pub fn append<T: Serialize>(&self, log: &mut Vec<T>, entry: T) -> EvictionReport {
        log.push(entry);
        self.truncate(log)
    }
}
