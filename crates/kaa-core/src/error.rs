//! Unified error types for the Kaa core.
//!
//! Each layer owns its own taxonomy; everything here is shared by the
//! registry, the handler abstraction and the protocol client traits.

use std::time::Duration;

use thiserror::Error;

// =============================================================================
// Registration Errors
// =============================================================================

/// Errors raised while adding handlers to the [`HookRegistry`](crate::HookRegistry).
///
/// These are the only errors that keep a handler from ever becoming active.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistrationError {
    /// A command hook with this keyword is already registered.
    #[error("duplicate command hook '{hook}'")]
    DuplicateHook {
        /// The conflicting hook.
        hook: String,
    },

    /// No hook was given and the handler has no usable name (e.g. a closure).
    #[error("cannot infer a hook from handler '{handler}'; pass one explicitly")]
    UnnamedHandler {
        /// The handler's type name.
        handler: String,
    },

    /// The hook is empty or contains whitespace.
    #[error("invalid hook '{hook}'")]
    InvalidHook {
        /// The rejected hook.
        hook: String,
    },
}

// =============================================================================
// Extraction / Handler Errors
// =============================================================================

/// Errors that can occur while extracting handler parameters from an invocation.
#[derive(Debug, Clone, Error)]
pub enum ExtractError {
    /// The arguments were malformed; the text is sent back to the caller.
    #[error("{0}")]
    Usage(String),

    /// A required piece of the line was absent.
    #[error("missing {0}")]
    Missing(&'static str),

    /// Custom extraction error.
    #[error("{0}")]
    Custom(String),
}

impl ExtractError {
    /// Creates a custom extraction error.
    pub fn custom(msg: impl Into<String>) -> Self {
        Self::Custom(msg.into())
    }
}

/// Result type for extraction operations.
pub type ExtractResult<T> = Result<T, ExtractError>;

/// A handler invocation that did not produce a reply.
#[derive(Debug, Clone, Error)]
pub enum HandlerError {
    /// The handler returned an error value.
    #[error("handler failed: {0}")]
    Failed(String),

    /// The handler panicked.
    #[error("handler panicked: {0}")]
    Panicked(String),

    /// The handler ran longer than the configured timeout.
    #[error("handler timed out after {0:?}")]
    TimedOut(Duration),

    /// The handler was cancelled during shutdown.
    #[error("handler cancelled")]
    Cancelled,

    /// A handler parameter could not be extracted.
    #[error(transparent)]
    Extract(#[from] ExtractError),
}

impl HandlerError {
    /// Creates a failure from any displayable error.
    pub fn failed(err: impl std::fmt::Display) -> Self {
        Self::Failed(err.to_string())
    }
}

// =============================================================================
// Client Errors
// =============================================================================

/// Errors surfaced by a protocol client.
#[derive(Debug, Clone, Error)]
pub enum ClientError {
    /// The client has no live session.
    #[error("client is not connected")]
    NotConnected,

    /// The consumer side of the inbound channel is gone.
    #[error("inbound channel closed")]
    Closed,

    /// An outbound message could not be delivered.
    #[error("failed to send message: {0}")]
    SendFailed(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for ClientError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for registry operations.
pub type RegistrationResult<T> = Result<T, RegistrationError>;

/// Result type for protocol client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// What a handler produces: an optional reply, or the reason there is none.
pub type HandlerResult = Result<Option<String>, HandlerError>;
