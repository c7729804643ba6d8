//! Runtime error types.

use std::path::PathBuf;

use kaa_core::{ClientError, RegistrationError, UnitId};
use thiserror::Error;

use crate::config::ConfigError;

/// Errors raised while loading or reloading a source unit.
///
/// During live reload these are logged and the unit's previous
/// registrations stay in effect.
#[derive(Error, Debug)]
pub enum ReloadError {
    /// The unit's file could not be read.
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The unit's file could not be parsed.
    #[error("Failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },

    /// The unit's entries were rejected by the registry.
    #[error("Registration failed: {0}")]
    Registration(#[from] RegistrationError),

    /// No tracked unit has this id.
    #[error("Unknown source unit: {0}")]
    UnknownUnit(UnitId),
}

/// Result type for source unit operations.
pub type ReloadResult<T> = Result<T, ReloadError>;

/// Errors that can occur during runtime operations.
#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Client error: {0}")]
    Client(#[from] ClientError),

    #[error("Registration error: {0}")]
    Registration(#[from] RegistrationError),

    #[error("Reload error: {0}")]
    Reload(#[from] ReloadError),

    /// The builder was not given a protocol client.
    #[error("No protocol client configured")]
    MissingClient,
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
