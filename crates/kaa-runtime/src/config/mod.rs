//! Configuration module for the Kaa runtime.
//!
//! This module provides TOML-based configuration loading and validation for
//! the connection, dispatch, reload and logging settings of a bot.

pub mod error;
pub mod loader;
pub mod schema;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, Profile, load_config, load_config_from_file};
pub use schema::{
    BotConfig, DispatchConfig, InboundMode, LogFormat, LogOutput, LogRotation, LoggingConfig,
    ReloadConfig, SpanEventConfig,
};
pub use validation::validate_config;
