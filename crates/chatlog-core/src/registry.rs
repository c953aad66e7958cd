//! Stream registry: maps stream identifiers to their log document names.
//!
//! Document names are a pure function of the stream identifier; nothing has
//! to be registered before a stream can be resolved.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::config::ChatLogConfig;
use crate::error::{ChatLogError, Result};

/// Identity of one isolated conversation stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamId {
    /// The unlabeled stream.
    Default,
    /// A labeled agent stream, e.g. `ai_1`.
    Agent(u32),
}

impl StreamId {
    pub fn agent(id: u32) -> Self {
        Self::Agent(id)
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Default => f.write_str("default"),
            Self::Agent(id) => write!(f, "ai_{id}"),
        }
    }
}

impl FromStr for StreamId {
    type Err = ChatLogError;

    /// Accepts `default`, `ai_<n>` or a bare agent number `<n>`.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() || s.eq_ignore_ascii_case("default") {
            return Ok(Self::Default);
        }
        let digits = s.strip_prefix("ai_").unwrap_or(s);
        digits
            .parse::<u32>()
            .map(Self::Agent)
            .map_err(|_| ChatLogError::InvalidStream(s.to_string()))
    }
}

/// Kind of log document owned by a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogKind {
    /// Append-only record of every entry.
    Full,
    /// Budget-bounded suffix of the full log, rebuilt on demand.
    Rolling,
    /// Truncated-in-place single-budget log.
    Legacy,
}

impl LogKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Rolling => "rolling",
            Self::Legacy => "legacy",
        }
    }
}

impl fmt::Display for LogKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogKind {
    type Err = ChatLogError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "full" => Ok(Self::Full),
            "rolling" => Ok(Self::Rolling),
            "legacy" => Ok(Self::Legacy),
            other => Err(ChatLogError::Config(format!("unknown log kind {other:?}"))),
        }
    }
}

/// Document names owned by one stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamLocations {
    pub full: String,
    pub rolling: String,
    pub legacy: String,
}

impl StreamLocations {
    pub fn get(&self, kind: LogKind) -> &str {
        match kind {
            LogKind::Full => &self.full,
            LogKind::Rolling => &self.rolling,
            LogKind::Legacy => &self.legacy,
        }
    }
}

/// Validates stream identifiers against the agent allow-list.
#[derive(Debug, Clone)]
pub struct StreamRegistry {
    allowed_agents: BTreeSet<u32>,
}

impl StreamRegistry {
    pub fn new(allowed_agents: impl IntoIterator<Item = u32>) -> Self {
        Self {
            allowed_agents: allowed_agents.into_iter().collect(),
        }
    }

    pub fn from_config(config: &ChatLogConfig) -> Self {
        Self::new(config.agent_ids.iter().copied())
    }

    /// Resolve a stream to its document names.
    pub fn resolve(&self, stream: StreamId) -> Result<StreamLocations> {
        match stream {
            StreamId::Default => Ok(StreamLocations {
                full: "chat_history_full.json".to_string(),
                rolling: "chat_history.json".to_string(),
                legacy: "chat_history_small.json".to_string(),
            }),
            StreamId::Agent(id) if self.allowed_agents.contains(&id) => Ok(StreamLocations {
                full: format!("chat_history_full_ai_{id}.json"),
                rolling: format!("chat_history_ai_{id}.json"),
                legacy: format!("chat_history_small_ai_{id}.json"),
            }),
            StreamId::Agent(_) => Err(ChatLogError::InvalidStream(stream.to_string())),
        }
    }

    /// Parse and resolve a textual stream identifier.
    pub fn resolve_str(&self, raw: &str) -> Result<(StreamId, StreamLocations)> {
        let stream: StreamId = raw.parse()?;
        let locations = self.resolve(stream)?;
        Ok((stream, locations))
    }

    /// Every resolvable stream: the default stream followed by allowed agents.
    pub fn streams(&self) -> Vec<StreamId> {
        std::iter::once(StreamId::Default)
            .chain(self.allowed_agents.iter().copied().map(StreamId::Agent))
            .collect()
    }
}
