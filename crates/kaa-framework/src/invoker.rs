//! Turning one match into one handler call.
//!
//! The [`Invoker`] takes an [`InvocationJob`] (a registration plus the line it
//! matched), re-validates the match, extracts the argument text, calls the
//! handler, and delivers any reply through the outbound side of the protocol
//! client, chunked to the protocol's line limit.
//!
//! Everything that can go wrong inside a handler (error values, panics,
//! timeouts, cancellation) is caught here and reported as an
//! [`InvocationOutcome`]. Nothing propagates to the dispatch loop.
//!
//! # Tower Service Integration
//!
//! `Invoker` implements `tower::Service<InvocationJob>`, so middleware can be
//! layered around it:
//!
//! ```rust,ignore
//! use tower::ServiceBuilder;
//!
//! let service = ServiceBuilder::new()
//!     .concurrency_limit(4)
//!     .service(invoker);
//! ```

use std::any::Any;
use std::convert::Infallible;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use futures::FutureExt;
use futures::future::BoxFuture;
use kaa_core::{
    BoxedOutbound, ClientError, DeliveryMode, ExtractError, HandlerError, HandlerRegistration,
    HandlerResult, HookKind, InboundLine, Invocation,
};
use tokio_util::sync::CancellationToken;
use tower::Service;
use tracing::{debug, error, trace, warn};

use crate::reply::chunk_reply;

/// Default maximum characters per outbound line.
pub const DEFAULT_LINE_LIMIT: usize = 400;

/// One scheduled handler call.
#[derive(Debug, Clone)]
pub struct InvocationJob {
    /// The matched registration.
    pub registration: Arc<HandlerRegistration>,
    /// The line it matched.
    pub line: Arc<InboundLine>,
}

impl InvocationJob {
    /// Creates a new job.
    pub fn new(registration: Arc<HandlerRegistration>, line: Arc<InboundLine>) -> Self {
        Self { registration, line }
    }

    /// The hook of the registration being invoked.
    pub fn hook(&self) -> &str {
        self.registration.hook()
    }
}

/// How an invocation ended.
#[derive(Debug, Clone)]
pub enum InvocationOutcome {
    /// A reply was sent in this many chunks.
    Replied { chunks: usize },
    /// The handler ran and had nothing to say.
    Silent,
    /// The line no longer matches the hook; the handler was not called.
    Mismatch,
    /// The handler failed; no reply was sent.
    Failed(HandlerError),
    /// The line has neither a channel nor a sender to answer.
    NoTarget,
    /// The reply could not be delivered.
    SendFailed(ClientError),
}

impl InvocationOutcome {
    /// Returns `true` if a reply went out.
    pub fn is_replied(&self) -> bool {
        matches!(self, Self::Replied { .. })
    }
}

/// Settings for an [`Invoker`].
#[derive(Debug, Clone)]
pub struct InvokerConfig {
    /// Command prefix, e.g. `.`.
    pub prefix: String,
    /// Maximum characters per outbound line.
    pub line_limit: usize,
    /// Upper bound on a single handler run. `None` disables the timeout.
    pub timeout: Option<Duration>,
}

impl Default for InvokerConfig {
    fn default() -> Self {
        Self {
            prefix: ".".to_string(),
            line_limit: DEFAULT_LINE_LIMIT,
            timeout: Some(Duration::from_secs(30)),
        }
    }
}

/// Resolves jobs into handler calls and replies.
///
/// Cheap to clone; clones share the outbound handle and cancellation token.
#[derive(Clone)]
pub struct Invoker {
    outbound: BoxedOutbound,
    config: Arc<InvokerConfig>,
    cancel: CancellationToken,
}

impl Invoker {
    /// Creates an invoker replying through `outbound`.
    pub fn new(outbound: BoxedOutbound, config: InvokerConfig) -> Self {
        Self {
            outbound,
            config: Arc::new(config),
            cancel: CancellationToken::new(),
        }
    }

    /// Uses `token` to cancel in-flight handlers.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// The token that cancels in-flight handlers.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Returns the invoker's configuration.
    pub fn config(&self) -> &InvokerConfig {
        &self.config
    }

    /// Runs one job to completion.
    pub async fn invoke(&self, job: InvocationJob) -> InvocationOutcome {
        let InvocationJob { registration, line } = job;
        let hook = registration.hook();
        let handler = Arc::clone(registration.handler());

        let Some(args) = self.extract_args(&registration, &line) else {
            trace!(hook, "Line no longer matches hook, skipping");
            return InvocationOutcome::Mismatch;
        };

        let invocation = handler
            .takes_args()
            .then(|| Invocation::new(Arc::clone(&line), hook, args));

        let reply = match self.run_guarded(handler.call(invocation)).await {
            Ok(Some(reply)) if !reply.is_empty() => reply,
            Ok(_) => return InvocationOutcome::Silent,
            Err(HandlerError::Extract(ExtractError::Usage(usage))) => {
                debug!(hook, "Replying with usage text");
                usage
            }
            Err(err) => {
                error!(hook, handler = handler.name(), error = %err, "Handler failed");
                return InvocationOutcome::Failed(err);
            }
        };

        self.deliver(&line, &reply, registration.options().delivery_mode())
            .await
    }

    /// Re-validates the match and returns the argument text.
    fn extract_args(&self, registration: &HandlerRegistration, line: &InboundLine) -> Option<String> {
        match registration.kind() {
            HookKind::Command => {
                let body = line.message.strip_prefix(self.config.prefix.as_str())?;
                command_args(body, registration.hook()).map(str::to_string)
            }
            HookKind::Event => (line.command.as_deref() == Some(registration.hook()))
                .then(|| line.message.trim().to_string()),
        }
    }

    /// Runs a handler future, converting panics, timeouts and cancellation
    /// into [`HandlerError`]s.
    async fn run_guarded(&self, call: BoxFuture<'static, HandlerResult>) -> HandlerResult {
        let guarded = AssertUnwindSafe(call).catch_unwind();

        let bounded = async {
            match self.config.timeout {
                Some(limit) => tokio::time::timeout(limit, guarded)
                    .await
                    .map_err(|_| HandlerError::TimedOut(limit)),
                None => Ok(guarded.await),
            }
        };

        tokio::select! {
            _ = self.cancel.cancelled() => Err(HandlerError::Cancelled),
            result = bounded => match result {
                Ok(Ok(result)) => result,
                Ok(Err(panic)) => Err(HandlerError::Panicked(panic_message(panic.as_ref()))),
                Err(err) => Err(err),
            },
        }
    }

    /// Sends `reply` to the line's reply target, one chunk per message.
    async fn deliver(&self, line: &InboundLine, reply: &str, mode: DeliveryMode) -> InvocationOutcome {
        let Some(target) = line.reply_target() else {
            warn!(raw = %line.raw, "No reply target for line, dropping reply");
            return InvocationOutcome::NoTarget;
        };

        let chunks = chunk_reply(reply, self.config.line_limit);
        for chunk in &chunks {
            if let Err(err) = self.outbound.send(target, chunk, mode).await {
                error!(reply_to = target, error = %err, "Failed to send reply");
                return InvocationOutcome::SendFailed(err);
            }
        }

        trace!(reply_to = target, chunks = chunks.len(), ?mode, "Reply sent");
        InvocationOutcome::Replied {
            chunks: chunks.len(),
        }
    }
}

impl std::fmt::Debug for Invoker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Invoker")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// If `body` (a message with the prefix removed) invokes `hook`, returns the
/// trimmed argument text.
///
/// `body` must equal the hook exactly, or be the hook followed by whitespace.
/// A hook that merely shares a prefix with the word (`go` vs `google`) does
/// not match.
pub fn command_args<'a>(body: &'a str, hook: &str) -> Option<&'a str> {
    let rest = body.strip_prefix(hook)?;
    if rest.is_empty() {
        return Some("");
    }
    rest.starts_with(char::is_whitespace).then(|| rest.trim())
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

// ============================================================================
// Tower Service Implementation
// ============================================================================

impl Service<InvocationJob> for Invoker {
    type Response = InvocationOutcome;
    type Error = Infallible;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, job: InvocationJob) -> Self::Future {
        let invoker = self.clone();
        Box::pin(async move { Ok(invoker.invoke(job).await) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::Args;
    use crate::handler::into_handler;
    use kaa_core::{HandlerOptions, HookRegistry, MemoryClient, SentMessage};
    use tower::ServiceExt;

    fn setup() -> (Arc<MemoryClient>, Invoker) {
        let client = Arc::new(MemoryClient::new());
        let invoker = Invoker::new(client.clone(), InvokerConfig::default());
        (client, invoker)
    }

    fn register<F, T>(registry: &HookRegistry, hook: &str, options: HandlerOptions, f: F) -> Arc<HandlerRegistration>
    where
        F: crate::handler::Handler<T>,
        T: 'static,
    {
        registry
            .register_command(Some(hook), into_handler(f), options, None)
            .unwrap()
    }

    async fn google(Args(query): Args) -> String {
        format!("searching for {query}")
    }

    #[test]
    fn test_command_args_matching() {
        assert_eq!(command_args("google", "google"), Some(""));
        assert_eq!(command_args("google  cats ", "google"), Some("cats"));
        assert_eq!(command_args("google", "go"), None);
        assert_eq!(command_args("goo", "google"), None);
    }

    #[tokio::test]
    async fn test_google_example() {
        let (client, invoker) = setup();
        let registry = HookRegistry::new();
        let reg = register(&registry, "google", HandlerOptions::default(), google);

        let line = Arc::new(InboundLine::privmsg("alice", "#rust", ".google cats"));
        let outcome = invoker.invoke(InvocationJob::new(reg, line)).await;

        assert!(outcome.is_replied());
        assert_eq!(
            client.sent(),
            [SentMessage {
                target: "#rust".to_string(),
                text: "searching for cats".to_string(),
                mode: DeliveryMode::Message,
            }]
        );
    }

    #[tokio::test]
    async fn test_revalidation_rejects_changed_line() {
        let (client, invoker) = setup();
        let registry = HookRegistry::new();
        let reg = register(&registry, "go", HandlerOptions::default(), google);

        let line = Arc::new(InboundLine::privmsg("alice", "#rust", ".google cats"));
        let outcome = invoker.invoke(InvocationJob::new(reg, line)).await;

        assert!(matches!(outcome, InvocationOutcome::Mismatch));
        assert!(client.sent().is_empty());
    }

    #[tokio::test]
    async fn test_long_reply_is_chunked_as_action() {
        let (client, invoker) = setup();
        let registry = HookRegistry::new();
        let options = HandlerOptions {
            action: true,
            notice: false,
        };
        let reg = register(&registry, "long", options, || async { "y".repeat(950) });

        let line = Arc::new(InboundLine::privmsg("alice", "Kaa", ".long"));
        let outcome = invoker.invoke(InvocationJob::new(reg, line)).await;

        assert!(matches!(outcome, InvocationOutcome::Replied { chunks: 3 }));
        let sent = client.sent();
        assert!(sent.iter().all(|m| m.target == "alice" && m.mode == DeliveryMode::Action));
        assert_eq!(sent.iter().map(|m| m.text.as_str()).collect::<String>(), "y".repeat(950));
    }

    #[tokio::test]
    async fn test_failures_produce_no_reply() {
        let (client, invoker) = setup();
        let registry = HookRegistry::new();

        let failing = register(&registry, "fail", HandlerOptions::default(), || async {
            Err::<String, _>("backend unavailable")
        });
        let panicking = register(&registry, "panic", HandlerOptions::default(), || async {
            if true {
                panic!("handler bug");
            }
            "unreachable"
        });

        let line = Arc::new(InboundLine::privmsg("alice", "#rust", ".fail"));
        let outcome = invoker.invoke(InvocationJob::new(failing, line)).await;
        assert!(matches!(outcome, InvocationOutcome::Failed(HandlerError::Failed(_))));

        let line = Arc::new(InboundLine::privmsg("alice", "#rust", ".panic"));
        let outcome = invoker.invoke(InvocationJob::new(panicking, line)).await;
        assert!(
            matches!(outcome, InvocationOutcome::Failed(HandlerError::Panicked(msg)) if msg == "handler bug")
        );

        assert!(client.sent().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_handler_times_out() {
        let client = Arc::new(MemoryClient::new());
        let config = InvokerConfig {
            timeout: Some(Duration::from_millis(50)),
            ..InvokerConfig::default()
        };
        let invoker = Invoker::new(client.clone(), config);
        let registry = HookRegistry::new();
        let reg = register(&registry, "slow", HandlerOptions::default(), || async {
            tokio::time::sleep(Duration::from_secs(10)).await;
            "late"
        });

        let line = Arc::new(InboundLine::privmsg("alice", "#rust", ".slow"));
        let outcome = invoker.invoke(InvocationJob::new(reg, line)).await;

        assert!(matches!(outcome, InvocationOutcome::Failed(HandlerError::TimedOut(_))));
        assert!(client.sent().is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_handler() {
        let (client, invoker) = setup();
        let registry = HookRegistry::new();
        let reg = register(&registry, "hang", HandlerOptions::default(), || async {
            futures::future::pending::<()>().await;
        });

        invoker.cancellation().cancel();
        let line = Arc::new(InboundLine::privmsg("alice", "#rust", ".hang"));
        let outcome = invoker.invoke(InvocationJob::new(reg, line)).await;

        assert!(matches!(outcome, InvocationOutcome::Failed(HandlerError::Cancelled)));
        assert!(client.sent().is_empty());
    }

    #[tokio::test]
    async fn test_event_invocation_through_service() {
        let (client, invoker) = setup();
        let registry = HookRegistry::new();
        let reg = registry
            .register_subscription(
                "JOIN",
                into_handler(|Args(text): Args| async move { format!("welcome{text}") }),
                HandlerOptions {
                    action: false,
                    notice: true,
                },
                None,
            )
            .unwrap();

        let line = Arc::new(InboundLine::event("JOIN", "bob", "#rust"));
        let outcome = invoker
            .oneshot(InvocationJob::new(reg, line))
            .await
            .unwrap_or_else(|never| match never {});

        assert!(outcome.is_replied());
        assert_eq!(client.sent()[0].text, "welcome");
        assert_eq!(client.sent()[0].mode, DeliveryMode::Notice);
    }
}
