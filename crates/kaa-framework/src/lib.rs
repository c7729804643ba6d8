//! # Kaa Framework
//!
//! Everything between a parsed line and a sent reply.
//!
//! This layer provides:
//! - Handler trait for Axum-style argument extraction
//! - Reply conversion and protocol-sized chunking
//! - The [`Invoker`], a `tower::Service` running one handler per job
//! - A bounded [`WorkerPool`] with a backpressure policy
//! - The [`DispatchEngine`] matching lines against the hook registry
//! - Clap-based command arguments (with `command` feature)

pub mod engine;
pub mod error;
pub mod extractor;
pub mod handler;
pub mod invoker;
pub mod pool;
pub mod reply;

#[cfg(feature = "command")]
pub mod command;

pub use engine::{DispatchEngine, DispatchReport, EngineConfig, InvocationMode};
pub use error::{DispatchError, DispatchResult};
pub use extractor::{Args, FromInvocation, Line, Sender};
pub use handler::{Handler, HandlerFn, into_handler};
pub use invoker::{
    DEFAULT_LINE_LIMIT, InvocationJob, InvocationOutcome, Invoker, InvokerConfig, command_args,
};
pub use pool::{Backpressure, PoolConfig, WorkerPool};
pub use reply::{IntoReply, chunk_reply};

#[cfg(feature = "command")]
pub use command::{CommandArgs, shell_split};
