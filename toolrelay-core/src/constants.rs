//! Application constants
//!
//! Single source of truth for paths and tuning defaults.

/// Default configuration file path
pub const CONFIG_PATH: &str = "config/client.toml";

/// Default environment file path
pub const ENV_PATH: &str = "config/.env";

pub const DEFAULT_HANDSHAKE_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_CALL_TIMEOUT_MS: u64 = 30_000;

/// Tool rounds allowed per user turn before the loop gives up.
pub const DEFAULT_MAX_TOOL_ROUNDS: usize = 3;

/// Transcript length that triggers compaction.
pub const DEFAULT_COMPACT_THRESHOLD: usize = 24;
/// Turns always kept verbatim by compaction.
pub const DEFAULT_KEEP_RECENT: usize = 8;
/// Topic tags carried by one summary turn.
pub const MAX_SUMMARY_TOPICS: usize = 8;

pub const DEFAULT_OPENAI_ENDPOINT: &str = "https://api.openai.com";
pub const DEFAULT_OLLAMA_ENDPOINT: &str = "http://127.0.0.1:11434";
