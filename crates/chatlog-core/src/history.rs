//! Per-stream history persistence: the operations startup and per-turn
//! orchestration call.
//!
//! Load never fails for a valid stream: missing or corrupt documents and
//! storage errors yield an empty history. Save never fails for a valid
//! stream either: storage errors are reported to the observer and the
//! caller keeps its in-memory copy. An unknown stream identifier is the only
//! error returned.
//!
//! There is no locking across calls. Two threads saving the same stream race
//! and the last write wins; distinct streams never share a document.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::codec::{decode_document, encode_document};
use crate::config::ChatLogConfig;
use crate::error::Result;
use crate::legacy::{EvictionReport, LegacyLog};
use crate::obs::{HistoryObserver, Operation, TracingObserver};
use crate::registry::{LogKind, StreamId, StreamLocations, StreamRegistry};
use crate::store::{FsLogStore, LogStore};
use crate::window::{RollingWindow, RollingWindowBuilder};

/// Outcome of a save that was attempted for a valid stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveReport {
    pub location: String,
    /// Whether the document was replaced on storage.
    pub persisted: bool,
    /// Entries written to the document.
    pub written: usize,
    /// Entries left out because they could not be encoded.
    pub skipped: usize,
}

/// Histories of one stream as seen at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamState<T> {
    pub stream: StreamId,
    pub full_history: Vec<T>,
    pub rolling_history: Vec<T>,
}

/// Store, registry, retention policies and observer for all streams.
pub struct HistoryManager {
    store: Arc<dyn LogStore>,
    registry: StreamRegistry,
    window: RollingWindowBuilder,
    legacy: LegacyLog,
    observer: Arc<dyn HistoryObserver>,
}

impl HistoryManager {
    pub fn new(store: Arc<dyn LogStore>, config: &ChatLogConfig) -> Self {
        Self {
            store,
            registry: StreamRegistry::from_config(config),
            window: RollingWindowBuilder::from_config(config),
            legacy: LegacyLog::from_config(config),
            observer: Arc::new(TracingObserver),
        }
    }

    /// Filesystem-backed manager rooted at `config.log_dir`.
    pub fn open(config: &ChatLogConfig) -> Result<Self> {
        let store = FsLogStore::new(&config.log_dir)?;
        Ok(Self::new(Arc::new(store), config))
    }

    pub fn with_observer(mut self, observer: Arc<dyn HistoryObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn registry(&self) -> &StreamRegistry {
        &self.registry
    }

    pub fn max_context_length(&self) -> usize {
        self.window.max_bytes()
    }

    pub fn streams(&self) -> Vec<StreamId> {
        self.registry.streams()
    }

    pub fn locations(&self, stream: StreamId) -> Result<StreamLocations> {
        self.registry.resolve(stream)
    }

    /// Storage location of one of a stream's documents.
    pub fn location(&self, stream: StreamId, kind: LogKind) -> Result<String> {
        let locations = self.registry.resolve(stream)?;
        Ok(self.store.location(locations.get(kind)))
    }

    /// Load any of a stream's documents.
    pub fn load<T: DeserializeOwned>(&self, stream: StreamId, kind: LogKind) -> Result<Vec<T>> {
        let locations = self.registry.resolve(stream)?;
        Ok(self.load_document(locations.get(kind)))
    }

    /// Overwrite any of a stream's documents with `entries` as given.
    pub fn save<T: Serialize>(
        &self,
        stream: StreamId,
        kind: LogKind,
        entries: &[T],
    ) -> Result<SaveReport> {
        let locations = self.registry.resolve(stream)?;
        Ok(self.save_document(locations.get(kind), entries))
    }

    pub fn load_full<T: DeserializeOwned>(&self, stream: StreamId) -> Result<Vec<T>> {
        self.load(stream, LogKind::Full)
    }

    pub fn save_full<T: Serialize>(&self, stream: StreamId, history: &[T]) -> Result<SaveReport> {
        self.save(stream, LogKind::Full, history)
    }

    pub fn load_rolling<T: DeserializeOwned>(&self, stream: StreamId) -> Result<Vec<T>> {
        self.load(stream, LogKind::Rolling)
    }

    pub fn save_rolling<T: Serialize>(
        &self,
        stream: StreamId,
        rolling: &[T],
    ) -> Result<SaveReport> {
        self.save(stream, LogKind::Rolling, rolling)
    }

    /// Rolling window of `full_history` under this manager's budget.
    pub fn build_rolling<T: Serialize + Clone>(&self, full_history: &[T]) -> RollingWindow<T> {
        self.window.build(full_history, self.observer.as_ref())
    }

    /// Recompute the rolling history from `full_history` and persist it.
    pub fn rebuild_rolling<T: Serialize + Clone>(
        &self,
        stream: StreamId,
        full_history: &[T],
    ) -> Result<Vec<T>> {
        let locations = self.registry.resolve(stream)?;
        let window = self.build_rolling(full_history);
        debug!(
            stream = %stream,
            entries = window.len(),
            total_bytes = window.total_bytes,
            excluded = window.excluded,
            "rolling history rebuilt"
        );
        self.save_document(&locations.rolling, &window.entries);
        Ok(window.entries)
    }

    /// Startup step: load the full history and derive its rolling window.
    pub fn bootstrap<T>(&self, stream: StreamId) -> Result<StreamState<T>>
    where
        T: Serialize + DeserializeOwned + Clone,
    {
        let _span = tracing::debug_span!("chatlog.bootstrap", stream = %stream).entered();
        let full_history: Vec<T> = self.load_full(stream)?;
        let rolling_history = self.build_rolling(&full_history).into_entries();
        debug!(
            full = full_history.len(),
            rolling = rolling_history.len(),
            "stream loaded"
        );
        Ok(StreamState {
            stream,
            full_history,
            rolling_history,
        })
    }

    /// Per-turn step: append `entry`, persist the full history, then rebuild
    /// and persist the rolling history, which is returned.
    ///
    /// The entry stays in `full_history` even if persistence fails.
    pub fn record_turn<T: Serialize + Clone>(
        &self,
        stream: StreamId,
        full_history: &mut Vec<T>,
        entry: T,
    ) -> Result<Vec<T>> {
        let locations = self.registry.resolve(stream)?;
        let _span = tracing::debug_span!("chatlog.turn", stream = %stream).entered();
        full_history.push(entry);
        self.save_document(&locations.full, full_history);
        let window = self.build_rolling(full_history);
        self.save_document(&locations.rolling, &window.entries);
        Ok(window.entries)
    }

    pub fn load_legacy<T: DeserializeOwned>(&self, stream: StreamId) -> Result<Vec<T>> {
        self.load(stream, LogKind::Legacy)
    }

    /// Truncate `log` in place to the budget, then persist it.
    pub fn save_legacy<T: Serialize>(
        &self,
        stream: StreamId,
        log: &mut Vec<T>,
    ) -> Result<EvictionReport> {
        let locations = self.registry.resolve(stream)?;
        let report = self.legacy.truncate(log);
        if report.evicted > 0 {
            self.observer
                .evicted(&self.store.location(&locations.legacy), report.evicted);
        }
        self.save_document(&locations.legacy, log);
        Ok(report)
    }

    /// Load the legacy log, append `entry`, truncate and persist.
    pub fn append_legacy<T>(&self, stream: StreamId, entry: T) -> Result<Vec<T>>
    where
        T: Serialize + DeserializeOwned,
    {
        let mut log: Vec<T> = self.load_legacy(stream)?;
        log.push(entry);
        self.save_legacy(stream, &mut log)?;
        Ok(log)
    }

    fn load_document<T: DeserializeOwned>(&self, name: &str) -> Vec<T> {
        let location = self.store.location(name);
        let bytes = match self.store.read_document(name) {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return Vec::new(),
            Err(e) => {
                self.observer.absorbed(Operation::Load, &location, &e);
                return Vec::new();
            }
        };
        match decode_document(&bytes) {
            Ok(entries) => entries,
            Err(e) => {
                self.observer.absorbed(Operation::Load, &location, &e);
                Vec::new()
            }
        }
    }

    fn save_document<T: Serialize>(&self, name: &str, entries: &[T]) -> SaveReport {
        let location = self.store.location(name);
        let mut skipped = 0;
        let encoded = encode_document(entries, |_, e| {
            skipped += 1;
            self.observer.absorbed(Operation::Encode, &location, &e);
        });
        let written = entries.len() - skipped;

        let result = encoded.and_then(|data| self.store.write_document(name, &data));
        let persisted = match result {
            Ok(()) => {
                self.observer.saved(&location, written);
                true
            }
            Err(e) => {
                self.observer.absorbed(Operation::Save, &location, &e);
                false
            }
        };

        SaveReport {
            location,
            persisted,
            written,
            skipped,
        }
    }
}

impl std::fmt::Debug for HistoryManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HistoryManager")
            .field("registry", &self.registry)
            .field("window", &self.window)
            .field("legacy", &self.legacy)
            .finish_non_exhaustive()
    }
}
