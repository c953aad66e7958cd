//! Chatlog CLI - inspect and maintain per-agent conversation logs
//!
//! ## Commands
//!
//! - `streams`: List configured streams and their log documents
//! - `show`: Print a stream's full, rolling or legacy history
//! - `append`: Record a turn (full history + rebuilt rolling history)
//! - `rebuild`: Recompute a stream's rolling history from its full history
//! - `legacy-append`: Append to a stream's single-budget legacy log

use std::path::PathBuf;

use anyhow::{Context, Result};
use chatlog_core::{
    config, ChatEntry, ChatLogConfig, Entry, HistoryManager, LogKind, StreamId, DEFAULT_LOG_DIR,
    DEFAULT_MAX_CONTEXT_LENGTH,
};
use clap::{Parser, Subcommand};
use tracing::{info, Level};

#[derive(Parser, Debug)]
#[command(name = "chatlog")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(
    about = "Durable conversation logs with budget-bounded rolling context",
    long_about = None
)]
struct Cli {
    /// Directory holding the log documents
    #[arg(long, global = true, env = config::ENV_LOG_DIR, default_value = DEFAULT_LOG_DIR)]
    log_dir: PathBuf,

    /// Rolling context budget in encoded bytes
    #[arg(
        long,
        global = true,
        env = config::ENV_MAX_CONTEXT,
        default_value_t = DEFAULT_MAX_CONTEXT_LENGTH
    )]
    max_context: usize,

    /// Allowed agent ids
    #[arg(
        long,
        global = true,
        env = config::ENV_AGENTS,
        value_delimiter = ',',
        default_values_t = [1u32, 2]
    )]
    agents: Vec<u32>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List streams and the documents they own
    Streams,

    /// Print a stream's history as JSON
    Show {
        /// Stream id: `default`, `ai_<n>` or `<n>`
        stream: String,

        /// Which log to print: full, rolling or legacy
        #[arg(long, default_value = "full")]
        log: LogKind,
    },

    /// Record a turn: append to the full history and rebuild the rolling history
    Append {
        stream: String,

        #[arg(short, long, default_value = "user")]
        role: String,

        #[arg(short, long)]
        content: String,
    },

    /// Rebuild the rolling history from the full history
    Rebuild { stream: String },

    /// Append to the legacy single-budget log
    LegacyAppend {
        stream: String,

        #[arg(short, long, default_value = "user")]
        role: String,

        #[arg(short, long)]
        content: String,
    },
}

impl Cli {
    fn config(&self) -> ChatLogConfig {
        ChatLogConfig::default()
            .with_log_dir(&self.log_dir)
            .with_max_context_length(self.max_context)
            .with_agent_ids(self.agents.iter().copied())
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    chatlog_core::init_tracing(cli.json, level);

    let manager = HistoryManager::open(&cli.config())
        .with_context(|| format!("Failed to open log directory {:?}", cli.log_dir))?;

    let output = run(&manager, &cli.command)?;
    println!("{output}");
    Ok(())
}

fn run(manager: &HistoryManager, command: &Commands) -> Result<String> {
    match command {
        Commands::Streams => cmd_streams(manager),
        Commands::Show { stream, log } => cmd_show(manager, stream, *log),
        Commands::Append {
            stream,
            role,
            content,
        } => cmd_append(manager, stream, role, content),
        Commands::Rebuild { stream } => cmd_rebuild(manager, stream),
        Commands::LegacyAppend {
            stream,
            role,
            content,
        } => cmd_legacy_append(manager, stream, role, content),
    }
}

fn parse_stream(manager: &HistoryManager, raw: &str) -> Result<StreamId> {
    let (stream, _) = manager
        .registry()
        .resolve_str(raw)
        .with_context(|| format!("Unknown stream {raw:?}"))?;
    Ok(stream)
}

fn cmd_streams(manager: &HistoryManager) -> Result<String> {
    let mut out = String::new();
    for stream in manager.streams() {
        out.push_str(&format!("{stream}\n"));
        for kind in [LogKind::Full, LogKind::Rolling, LogKind::Legacy] {
            let location = manager.location(stream, kind)?;
            out.push_str(&format!("  {kind:<8} {location}\n"));
        }
    }
    Ok(out.trim_end().to_string())
}

fn cmd_show(manager: &HistoryManager, raw: &str, kind: LogKind) -> Result<String> {
    let stream = parse_stream(manager, raw)?;
    let entries: Vec<Entry> = manager.load(stream, kind)?;
    serde_json::to_string_pretty(&entries).context("Failed to render history")
}

fn cmd_append(manager: &HistoryManager, raw: &str, role: &str, content: &str) -> Result<String> {
    let stream = parse_stream(manager, raw)?;
    let mut full: Vec<Entry> = manager.load_full(stream)?;
    let entry = serde_json::to_value(ChatEntry::new(role, content))?;
    let rolling = manager.record_turn(stream, &mut full, entry)?;
    info!(stream = %stream, full = full.len(), rolling = rolling.len(), "turn recorded");
    Ok(format!(
        "{stream}: {} entries in full history, {} in rolling history",
        full.len(),
        rolling.len()
    ))
}

fn cmd_rebuild(manager: &HistoryManager, raw: &str) -> Result<String> {
    let stream = parse_stream(manager, raw)?;
    let full: Vec<Entry> = manager.load_full(stream)?;
    let rolling = manager.rebuild_rolling(stream, &full)?;
    Ok(format!(
        "{stream}: rolling history rebuilt with {} of {} entries (budget {} bytes)",
        rolling.len(),
        full.len(),
        manager.max_context_length()
    ))
}

fn cmd_legacy_append(
    manager: &HistoryManager,
    raw: &str,
    role: &str,
    content: &str,
) -> Result<String> {
    let stream = parse_stream(manager, raw)?;
    let entry = serde_json::to_value(ChatEntry::new(role, content))?;
    let log = manager.append_legacy(stream, entry)?;
    Ok(format!("{stream}: legacy log holds {} entries", log.len()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn manager_in(dir: &std::path::Path, args: &[&str]) -> (Cli, HistoryManager) {
        let log_dir = dir.join("logs");
        let mut argv = vec!["chatlog", "--log-dir", log_dir.to_str().unwrap()];
        argv.extend_from_slice(args);
        let cli = Cli::try_parse_from(argv).unwrap();
        let manager = HistoryManager::open(&cli.config()).unwrap();
        (cli, manager)
    }

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_global_settings() {
        let cli = Cli::try_parse_from([
            "chatlog",
            "--max-context",
            "1000",
            "--agents",
            "1,2,5",
            "show",
            "ai_5",
            "--log",
            "rolling",
        ])
        .unwrap();
        let config = cli.config();
        assert_eq!(config.max_context_length, 1000);
        assert!(config.agent_ids.contains(&5));
        match cli.command {
            Commands::Show { stream, log } => {
                assert_eq!(stream, "ai_5");
                assert_eq!(log, LogKind::Rolling);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn append_then_show() {
        let dir = tempfile::tempdir().unwrap();
        let (cli, manager) = manager_in(dir.path(), &["append", "ai_1", "-c", "hello"]);
        let out = run(&manager, &cli.command).unwrap();
        assert!(out.contains("1 entries in full history"));

        let shown = cmd_show(&manager, "ai_1", LogKind::Rolling).unwrap();
        let parsed: Vec<Entry> = serde_json::from_str(&shown).unwrap();
        assert_eq!(parsed, vec![serde_json::json!({"role": "user", "content": "hello"})]);
    }

    #[test]
    fn rebuild_respects_budget() {
        let dir = tempfile::tempdir().unwrap();
        let (_cli, manager) = manager_in(dir.path(), &["--max-context", "40", "streams"]);
        for i in 0..3 {
            cmd_append(&manager, "default", "user", &format!("m{i}")).unwrap();
        }
        let out = cmd_rebuild(&manager, "default").unwrap();
        // Each entry is 33 bytes, so only the newest fits in 40.
        assert!(out.contains("1 of 3 entries"));
    }

    #[test]
    fn unknown_stream_fails() {
        let dir = tempfile::tempdir().unwrap();
        let (cli, manager) = manager_in(dir.path(), &["rebuild", "ai_3"]);
        let err = run(&manager, &cli.command).unwrap_err();
        assert!(format!("{err:#}").contains("invalid stream identifier"));
    }

    #[test]
    fn streams_lists_every_document() {
        let dir = tempfile::tempdir().unwrap();
        let (_cli, manager) = manager_in(dir.path(), &["streams"]);
        let out = cmd_streams(&manager).unwrap();
        assert!(out.contains("default"));
        assert!(out.contains("chat_history_small_ai_2.json"));
        assert_eq!(out.lines().count(), 12);
    }
}
