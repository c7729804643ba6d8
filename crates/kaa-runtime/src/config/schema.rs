//! Configuration schema definitions.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use kaa_framework::{
    Backpressure, EngineConfig, InvocationMode, InvokerConfig, PoolConfig,
};
use serde::{Deserialize, Serialize};

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    /// Server host name.
    #[serde(default = "default_server")]
    pub server: String,

    /// Server port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Whether to connect over TLS.
    #[serde(default = "default_ssl")]
    pub ssl: bool,

    /// Connection timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Nickname to register with.
    #[serde(default = "default_nick")]
    pub nick: String,

    /// Real name sent at registration.
    #[serde(default = "default_realname")]
    pub realname: String,

    /// Channels to join after registration.
    #[serde(default = "default_channels")]
    pub channels: Vec<String>,

    /// Script plugin files loaded at startup and watched for changes.
    #[serde(default)]
    pub plugins: Vec<PathBuf>,

    #[serde(default)]
    pub dispatch: DispatchConfig,

    #[serde(default)]
    pub reload: ReloadConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            server: default_server(),
            port: default_port(),
            ssl: default_ssl(),
            timeout_secs: default_timeout_secs(),
            nick: default_nick(),
            realname: default_realname(),
            channels: default_channels(),
            plugins: Vec::new(),
            dispatch: DispatchConfig::default(),
            reload: ReloadConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl BotConfig {
    /// Connection timeout as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_server() -> String {
    "irc.voxinfinitus.net".to_string()
}

fn default_port() -> u16 {
    6697
}

fn default_ssl() -> bool {
    true
}

fn default_timeout_secs() -> u64 {
    300
}

fn default_nick() -> String {
    "Kaa".to_string()
}

fn default_realname() -> String {
    "Kaa the rock python".to_string()
}

fn default_channels() -> Vec<String> {
    vec!["#voxinfinitus".to_string()]
}

// =============================================================================
// Dispatch
// =============================================================================

/// How inbound lines reach the dispatch engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InboundMode {
    /// The client pushes lines onto a bounded channel.
    #[default]
    Channel,
    /// The client overwrites a shared context that the engine polls.
    Polling,
}

/// Dispatch and invocation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Single-character command prefix.
    #[serde(default = "default_prefix")]
    pub prefix: String,

    /// Maximum characters per outbound line.
    #[serde(default = "default_line_limit")]
    pub line_limit: usize,

    #[serde(default)]
    pub inbound: InboundMode,

    /// Poll interval for [`InboundMode::Polling`], in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    #[serde(default)]
    pub mode: InvocationMode,

    /// Worker tasks in concurrent mode.
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Capacity of the job queue and of the inbound channel.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    #[serde(default)]
    pub backpressure: Backpressure,

    /// Per-invocation timeout in seconds; 0 disables it.
    #[serde(default = "default_handler_timeout_secs")]
    pub handler_timeout_secs: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            prefix: default_prefix(),
            line_limit: default_line_limit(),
            inbound: InboundMode::default(),
            poll_interval_ms: default_poll_interval_ms(),
            mode: InvocationMode::default(),
            workers: default_workers(),
            queue_capacity: default_queue_capacity(),
            backpressure: Backpressure::default(),
            handler_timeout_secs: default_handler_timeout_secs(),
        }
    }
}

impl DispatchConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn handler_timeout(&self) -> Option<Duration> {
        (self.handler_timeout_secs > 0).then(|| Duration::from_secs(self.handler_timeout_secs))
    }

    /// Converts to the invoker's settings.
    pub fn to_invoker_config(&self) -> InvokerConfig {
        InvokerConfig {
            prefix: self.prefix.clone(),
            line_limit: self.line_limit,
            timeout: self.handler_timeout(),
        }
    }

    /// Converts to the engine's settings.
    pub fn to_engine_config(&self) -> EngineConfig {
        EngineConfig {
            mode: self.mode,
            poll_interval: self.poll_interval(),
            pool: PoolConfig {
                workers: self.workers,
                queue_capacity: self.queue_capacity,
                backpressure: self.backpressure,
            },
        }
    }
}

fn default_prefix() -> String {
    ".".to_string()
}

fn default_line_limit() -> usize {
    kaa_framework::DEFAULT_LINE_LIMIT
}

fn default_poll_interval_ms() -> u64 {
    10
}

fn default_workers() -> usize {
    8
}

fn default_queue_capacity() -> usize {
    256
}

fn default_handler_timeout_secs() -> u64 {
    30
}

// =============================================================================
// Reload
// =============================================================================

/// Live reload settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReloadConfig {
    #[serde(default = "default_reload_enabled")]
    pub enabled: bool,

    /// Interval between modification time checks, in milliseconds.
    #[serde(default = "default_reload_interval_ms")]
    pub interval_ms: u64,
}

impl Default for ReloadConfig {
    fn default() -> Self {
        Self {
            enabled: default_reload_enabled(),
            interval_ms: default_reload_interval_ms(),
        }
    }
}

impl ReloadConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

fn default_reload_enabled() -> bool {
    true
}

fn default_reload_interval_ms() -> u64 {
    1000
}

// =============================================================================
// Logging
// =============================================================================

/// Output format for log lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Full,
    Pretty,
    /// Requires the `json-log` feature.
    Json,
}

/// Where log lines are written.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    #[default]
    Stdout,
    Stderr,
    File,
}

/// When file output starts a new file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogRotation {
    #[default]
    Never,
    Hourly,
    Daily,
}

/// Which span lifecycle events are logged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpanEventConfig {
    #[serde(default)]
    pub new: bool,
    #[serde(default)]
    pub enter: bool,
    #[serde(default)]
    pub exit: bool,
    #[serde(default)]
    pub close: bool,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Base level (trace, debug, info, warn, error). `RUST_LOG` wins over it.
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub format: LogFormat,

    #[serde(default)]
    pub output: LogOutput,

    /// Log file for [`LogOutput::File`].
    #[serde(default)]
    pub file_path: Option<PathBuf>,

    #[serde(default)]
    pub rotation: LogRotation,

    #[serde(default)]
    pub thread_ids: bool,

    /// Include source file and line number.
    #[serde(default)]
    pub file_location: bool,

    #[serde(default)]
    pub span_events: SpanEventConfig,

    /// Per-module levels, e.g. `kaa_framework = "debug"`.
    #[serde(default)]
    pub filters: HashMap<String, String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
            output: LogOutput::default(),
            file_path: None,
            rotation: LogRotation::default(),
            thread_ids: false,
            file_location: false,
            span_events: SpanEventConfig::default(),
            filters: HashMap::new(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}
