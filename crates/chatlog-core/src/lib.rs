//! Chatlog Core Library
//!
//! Durable conversation logs for one or more concurrent conversational
//! agents, and budget-bounded rolling context windows rebuilt from them.
//!
//! Each stream (the unlabeled default stream or an allow-listed agent) owns
//! a full history document, a rolling history document and a legacy
//! single-budget document. [`HistoryManager`] is the entry point used by
//! startup and per-turn orchestration.

pub mod codec;
pub mod config;
pub mod error;
pub mod history;
pub mod legacy;
pub mod obs;
pub mod registry;
pub mod store;
pub mod telemetry;
pub mod window;

pub use codec::{decode, decode_document, encode, encode_document, encoded_size, ChatEntry, Entry};
pub use config::{ChatLogConfig, DEFAULT_LOG_DIR, DEFAULT_MAX_CONTEXT_LENGTH};
pub use error::{ChatLogError, Result};
pub use history::{HistoryManager, SaveReport, StreamState};
pub use legacy::{EvictionReport, LegacyLog};
pub use obs::{HistoryEvent, HistoryObserver, Operation, RecordingObserver, TracingObserver};
pub use registry::{LogKind, StreamId, StreamLocations, StreamRegistry};
pub use store::{FsLogStore, LogStore, MemoryLogStore};
pub use telemetry::init_tracing;
pub use window::{build_rolling_history, RollingWindow, RollingWindowBuilder};

/// Chatlog version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
