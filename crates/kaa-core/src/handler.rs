//! Type-erased handlers and the per-call invocation context.
//!
//! The concrete, Axum-style `Handler<T>` trait lives in `kaa-framework`; the
//! registry only needs the erased form defined here.

use std::sync::Arc;

use futures::future::BoxFuture;

use crate::error::HandlerResult;
use crate::line::InboundLine;

/// Context handed to a handler for one invocation.
///
/// Created immediately before the call and dropped right after it. Handlers
/// only ever see their own copy, never the shared inbound context.
#[derive(Debug, Clone)]
pub struct Invocation {
    line: Arc<InboundLine>,
    hook: String,
    args: String,
}

impl Invocation {
    /// Creates a new invocation.
    pub fn new(line: Arc<InboundLine>, hook: impl Into<String>, args: impl Into<String>) -> Self {
        Self {
            line,
            hook: hook.into(),
            args: args.into(),
        }
    }

    /// The line that triggered this invocation.
    pub fn line(&self) -> &InboundLine {
        &self.line
    }

    /// A clone of the line `Arc`.
    pub fn line_arc(&self) -> Arc<InboundLine> {
        Arc::clone(&self.line)
    }

    /// The hook that matched.
    pub fn hook(&self) -> &str {
        &self.hook
    }

    /// Argument text following the hook, trimmed.
    pub fn args(&self) -> &str {
        &self.args
    }
}

/// Type-erased handler trait for dynamic dispatch.
pub trait ErasedHandler: Send + Sync {
    /// The handler's type name, used to infer a hook when none is given.
    fn name(&self) -> &str;

    /// Whether the handler wants the [`Invocation`].
    fn takes_args(&self) -> bool;

    /// Runs the handler.
    ///
    /// `invocation` is `Some` exactly when [`takes_args`](Self::takes_args)
    /// returns `true`.
    fn call(&self, invocation: Option<Invocation>) -> BoxFuture<'static, HandlerResult>;
}

/// A type-erased handler that can be stored in the registry.
pub type BoxedHandler = Arc<dyn ErasedHandler>;
