//! Configuration for chat log storage and context budgets.

use std::collections::BTreeSet;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{ChatLogError, Result};

/// Default namespace directory for log documents.
pub const DEFAULT_LOG_DIR: &str = "chat_logs";

/// Default rolling-context budget, in encoded bytes.
pub const DEFAULT_MAX_CONTEXT_LENGTH: usize = 4000;

pub const ENV_LOG_DIR: &str = "CHATLOG_DIR";
pub const ENV_MAX_CONTEXT: &str = "CHATLOG_MAX_CONTEXT";
pub const ENV_AGENTS: &str = "CHATLOG_AGENTS";

/// Storage namespace, byte budget and agent allow-list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatLogConfig {
    pub log_dir: PathBuf,
    pub max_context_length: usize,
    pub agent_ids: BTreeSet<u32>,
}

impl Default for ChatLogConfig {
    fn default() -> Self {
        Self {
            log_dir: PathBuf::from(DEFAULT_LOG_DIR),
            max_context_length: DEFAULT_MAX_CONTEXT_LENGTH,
            agent_ids: BTreeSet::from([1, 2]),
        }
    }
}

impl ChatLogConfig {
    /// Defaults overlaid with `CHATLOG_DIR`, `CHATLOG_MAX_CONTEXT` and
    /// `CHATLOG_AGENTS` when set.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();
        if let Some(dir) = lookup(ENV_LOG_DIR) {
            config.log_dir = PathBuf::from(dir);
        }
        if let Some(raw) = lookup(ENV_MAX_CONTEXT) {
            config.max_context_length = raw.trim().parse().map_err(|_| {
                ChatLogError::Config(format!("{ENV_MAX_CONTEXT} must be a byte count, got {raw:?}"))
            })?;
        }
        if let Some(raw) = lookup(ENV_AGENTS) {
            config.agent_ids = parse_agent_ids(&raw)?;
        }
        Ok(config)
    }

    pub fn with_log_dir(mut self, log_dir: impl Into<PathBuf>) -> Self {
        self.log_dir = log_dir.into();
        self
    }

    pub fn with_max_context_length(mut self, max_context_length: usize) -> Self {
        self.max_context_length = max_context_length;
        self
    }

    pub fn with_agent_ids(mut self, agent_ids: impl IntoIterator<Item = u32>) -> Self {
        self.agent_ids = agent_ids.into_iter().collect();
        self
    }
}

/// Parse a comma-separated agent allow-list such as `"1,2"`.
pub fn parse_agent_ids(raw: &str) -> Result<BTreeSet<u32>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<u32>()
                .map_err(|_| ChatLogError::Config(format!("invalid agent id {s:?}")))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ChatLogConfig::default();
        assert_eq!(config.log_dir, PathBuf::from("chat_logs"));
        assert_eq!(config.max_context_length, 4000);
        assert_eq!(config.agent_ids, BTreeSet::from([1, 2]));
    }

    #[test]
    fn test_env_overlay() {
        let config = ChatLogConfig::from_lookup(lookup(&[
            (ENV_LOG_DIR, "/tmp/logs"),
            (ENV_MAX_CONTEXT, " 2500 "),
            (ENV_AGENTS, "1, 2,7"),
        ]))
        .unwrap();
        assert_eq!(config.log_dir, PathBuf::from("/tmp/logs"));
        assert_eq!(config.max_context_length, 2500);
        assert_eq!(config.agent_ids, BTreeSet::from([1, 2, 7]));
    }

    #[test]
    fn test_env_absent_keeps_defaults() {
        let config = ChatLogConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, ChatLogConfig::default());
    }

    #[test]
    fn test_invalid_budget_rejected() {
        let err = ChatLogConfig::from_lookup(lookup(&[(ENV_MAX_CONTEXT, "lots")])).unwrap_err();
        assert!(matches!(err, ChatLogError::Config(_)));
        assert!(err.to_string().contains(ENV_MAX_CONTEXT));
    }

    #[test]
    fn test_invalid_agent_rejected() {
        assert!(matches!(parse_agent_ids("1,two"), Err(ChatLogError::Config(_))));
        assert!(parse_agent_ids("").unwrap().is_empty());
    }

    #[test]
    fn test_partial_deserialize_uses_defaults() {
        let config: ChatLogConfig =
            serde_json::from_str(r#"{"max_context_length": 123}"#).unwrap();
        assert_eq!(config.max_context_length, 123);
        assert_eq!(config.log_dir, PathBuf::from(DEFAULT_LOG_DIR));
    }

    #[test]
    fn test_builder_setters() {
        let config = ChatLogConfig::default()
            .with_log_dir("elsewhere")
            .with_max_context_length(10)
            .with_agent_ids([3]);
        assert_eq!(config.log_dir, PathBuf::from("elsewhere"));
        assert_eq!(config.max_context_length, 10);
        assert_eq!(config.agent_ids, BTreeSet::from([3]));
    }
}
