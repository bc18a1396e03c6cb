// SPDX-FileCopyrightText: 2026 TableTalk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the TableTalk dialogue orchestrator.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use serde::{Deserialize, Serialize};

/// Top-level TableTalk configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable
/// overrides. All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TableTalkConfig {
    /// Agent identity and behavior settings.
    #[serde(default)]
    pub agent: AgentConfig,

    /// HTTP/WebSocket server settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// LLM completion provider settings.
    #[serde(default)]
    pub llm: LlmConfig,

    /// Text-to-speech provider settings.
    #[serde(default)]
    pub speech: SpeechConfig,

    /// Realtime voice credential issuer settings.
    #[serde(default)]
    pub realtime: RealtimeConfig,

    /// Session registry policies (idle eviction, rate limits, heartbeat).
    #[serde(default)]
    pub session: SessionConfig,
}

/// Agent identity and behavior configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AgentConfig {
    /// Display name of the agent.
    #[serde(default = "default_agent_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// When enabled, text responses skip speech synthesis for latency.
    #[serde(default)]
    pub performance_mode: bool,

    /// Override for the intent-extraction system prompt. The output schema
    /// contract (`id`, `isCompleted`, `fields`, `nextPrompt`) always applies;
    /// this only changes the natural-language style guide around it.
    #[serde(default)]
    pub system_prompt: Option<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: default_agent_name(),
            log_level: default_log_level(),
            performance_mode: false,
            system_prompt: None,
        }
    }
}

fn default_agent_name() -> String {
    "tabletalk".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// HTTP/WebSocket server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Host address to bind.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to bind.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,

    /// Timeout for individual storage operations, in seconds.
    #[serde(default = "default_storage_timeout")]
    pub op_timeout_secs: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
            op_timeout_secs: default_storage_timeout(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("tabletalk").join("tabletalk.db"))
        .and_then(|p| p.to_str().map(String::from))
        .unwrap_or_else(|| "tabletalk.db".to_string())
}

fn default_wal_mode() -> bool {
    true
}

fn default_storage_timeout() -> u64 {
    5
}

/// LLM completion provider configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LlmConfig {
    /// API key for the completion provider. `None` requires env override.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Chat completions endpoint URL.
    #[serde(default = "default_llm_endpoint")]
    pub endpoint: String,

    /// Model identifier for intent extraction and summaries.
    #[serde(default = "default_llm_model")]
    pub model: String,

    /// Per-attempt request timeout, in seconds.
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,

    /// Maximum number of attempts per completion.
    #[serde(default = "default_llm_retries")]
    pub max_retries: u32,

    /// Exponential backoff base delay between attempts, in milliseconds.
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,

    /// Exponential backoff delay cap, in milliseconds.
    #[serde(default = "default_backoff_cap_ms")]
    pub backoff_cap_ms: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            endpoint: default_llm_endpoint(),
            model: default_llm_model(),
            timeout_secs: default_llm_timeout(),
            max_retries: default_llm_retries(),
            backoff_base_ms: default_backoff_base_ms(),
            backoff_cap_ms: default_backoff_cap_ms(),
        }
    }
}

fn default_llm_endpoint() -> String {
    "https://api.openai.com/v1/chat/completions".to_string()
}

fn default_llm_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_llm_timeout() -> u64 {
    8
}

fn default_llm_retries() -> u32 {
    3
}

fn default_backoff_base_ms() -> u64 {
    1000
}

fn default_backoff_cap_ms() -> u64 {
    3000
}

fn default_max_retries() -> u32 {
    3
}

/// Text-to-speech provider configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SpeechConfig {
    /// Active provider: "google" (primary) or "elevenlabs" (secondary).
    #[serde(default = "default_speech_provider")]
    pub provider: String,

    /// API key for Google Cloud Text-to-Speech.
    #[serde(default)]
    pub google_api_key: Option<String>,

    /// API key for ElevenLabs.
    #[serde(default)]
    pub elevenlabs_api_key: Option<String>,

    /// Google voice name.
    #[serde(default = "default_google_voice")]
    pub voice: String,

    /// ElevenLabs voice id.
    #[serde(default = "default_elevenlabs_voice")]
    pub elevenlabs_voice_id: String,

    /// Synthesis request timeout, in seconds.
    #[serde(default = "default_speech_timeout")]
    pub timeout_secs: u64,

    /// Maximum number of attempts per synthesis request.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Exponential backoff base delay between attempts, in milliseconds.
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,

    /// Exponential backoff delay cap, in milliseconds.
    #[serde(default = "default_backoff_cap_ms")]
    pub backoff_cap_ms: u64,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            provider: default_speech_provider(),
            google_api_key: None,
            elevenlabs_api_key: None,
            voice: default_google_voice(),
            elevenlabs_voice_id: default_elevenlabs_voice(),
            timeout_secs: default_speech_timeout(),
            max_retries: default_max_retries(),
            backoff_base_ms: default_backoff_base_ms(),
            backoff_cap_ms: default_backoff_cap_ms(),
        }
    }
}

fn default_speech_provider() -> String {
    "google".to_string()
}

fn default_google_voice() -> String {
    "en-US-Neural2-F".to_string()
}

fn default_elevenlabs_voice() -> String {
    "21m00Tcm4TlvDq8ikWAM".to_string()
}

fn default_speech_timeout() -> u64 {
    15
}

/// Realtime voice credential issuer configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RealtimeConfig {
    /// Feature toggle; when off the orchestrator answers credential
    /// requests with an error frame.
    #[serde(default)]
    pub enabled: bool,

    /// API key for the upstream realtime API.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Session-mint endpoint URL.
    #[serde(default = "default_realtime_endpoint")]
    pub endpoint: String,

    /// Realtime model identifier.
    #[serde(default = "default_realtime_model")]
    pub model: String,

    /// Realtime voice name.
    #[serde(default = "default_realtime_voice")]
    pub voice: String,

    /// Mint request timeout, in seconds.
    #[serde(default = "default_realtime_timeout")]
    pub timeout_secs: u64,

    /// Maximum number of attempts per mint request.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Exponential backoff base delay between attempts, in milliseconds.
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,

    /// Exponential backoff delay cap, in milliseconds.
    #[serde(default = "default_backoff_cap_ms")]
    pub backoff_cap_ms: u64,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_key: None,
            endpoint: default_realtime_endpoint(),
            model: default_realtime_model(),
            voice: default_realtime_voice(),
            timeout_secs: default_realtime_timeout(),
            max_retries: default_max_retries(),
            backoff_base_ms: default_backoff_base_ms(),
            backoff_cap_ms: default_backoff_cap_ms(),
        }
    }
}

fn default_realtime_endpoint() -> String {
    "https://api.openai.com/v1/realtime/sessions".to_string()
}

fn default_realtime_model() -> String {
    "gpt-4o-realtime-preview".to_string()
}

fn default_realtime_voice() -> String {
    "verse".to_string()
}

fn default_realtime_timeout() -> u64 {
    10
}

/// Session registry policies.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SessionConfig {
    /// Sessions idle longer than this are evicted and marked completed.
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,

    /// Interval between idle-eviction sweeps.
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,

    /// Minimum seconds between greeting requests per user.
    #[serde(default = "default_greeting_interval")]
    pub greeting_interval_secs: u64,

    /// WebSocket ping interval for idle connections.
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_timeout_secs: default_idle_timeout(),
            sweep_interval_secs: default_sweep_interval(),
            greeting_interval_secs: default_greeting_interval(),
            heartbeat_interval_secs: default_heartbeat_interval(),
        }
    }
}

fn default_idle_timeout() -> u64 {
    300
}

fn default_sweep_interval() -> u64 {
    60
}

fn default_greeting_interval() -> u64 {
    5
}

fn default_heartbeat_interval() -> u64 {
    30
}
