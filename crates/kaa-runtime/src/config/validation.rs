//! Configuration validation utilities.

use super::error::{ConfigError, ConfigResult};
use super::schema::{BotConfig, DispatchConfig, LoggingConfig, ReloadConfig};

const VALID_LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Validates the entire configuration.
pub fn validate_config(config: &BotConfig) -> ConfigResult<()> {
    validate_connection(config)?;
    validate_dispatch(&config.dispatch)?;
    validate_reload(&config.reload)?;
    validate_logging(&config.logging)?;
    Ok(())
}

fn validate_connection(config: &BotConfig) -> ConfigResult<()> {
    if config.server.trim().is_empty() {
        return Err(ConfigError::missing_field("server"));
    }

    if config.port == 0 {
        return Err(ConfigError::validation("Port must be greater than 0"));
    }

    if config.nick.trim().is_empty() {
        return Err(ConfigError::missing_field("nick"));
    }

    if config.nick.contains(char::is_whitespace) {
        return Err(ConfigError::validation("Nick cannot contain whitespace"));
    }

    Ok(())
}

fn validate_dispatch(dispatch: &DispatchConfig) -> ConfigResult<()> {
    let mut chars = dispatch.prefix.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) if !c.is_whitespace() => {}
        _ => {
            return Err(ConfigError::validation(format!(
                "Prefix must be a single non-whitespace character, got {:?}",
                dispatch.prefix
            )));
        }
    }

    if dispatch.line_limit == 0 {
        return Err(ConfigError::validation("Line limit must be greater than 0"));
    }

    if dispatch.poll_interval_ms == 0 {
        return Err(ConfigError::validation(
            "Poll interval must be greater than 0",
        ));
    }

    if dispatch.workers == 0 {
        return Err(ConfigError::validation("Worker count must be greater than 0"));
    }

    if dispatch.queue_capacity == 0 {
        return Err(ConfigError::validation(
            "Queue capacity must be greater than 0",
        ));
    }

    Ok(())
}

fn validate_reload(reload: &ReloadConfig) -> ConfigResult<()> {
    if reload.interval_ms == 0 {
        return Err(ConfigError::validation(
            "Reload interval must be greater than 0",
        ));
    }
    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> ConfigResult<()> {
    validate_level(&logging.level)?;
    for level in logging.filters.values() {
        validate_level(level)?;
    }
    Ok(())
}

fn validate_level(level: &str) -> ConfigResult<()> {
    if !VALID_LOG_LEVELS.contains(&level.to_lowercase().as_str()) {
        return Err(ConfigError::validation(format!(
            "Invalid log level: {level}. Valid values are: {VALID_LOG_LEVELS:?}"
        )));
    }
    Ok(())
}
