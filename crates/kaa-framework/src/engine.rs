//! Line dispatch for the Kaa framework.
//!
//! This module provides the [`DispatchEngine`], which decides which
//! registrations a line triggers and schedules one invocation per match.
//!
//! # Matching
//!
//! For every line with at least one parameter:
//!
//! 1. If the message starts with the command prefix, every command
//!    registration is checked in stored order. The message (minus the prefix)
//!    must equal the hook, or be the hook followed by whitespace.
//! 2. If the protocol verb is an event verb (upper-case, so numerics such as
//!    `001` are not), every subscription under exactly that verb is scheduled
//!    in registration order.
//!
//! # Inbound models
//!
//! Lines either arrive on a bounded channel ([`run_channel`]) or are polled
//! from a [`SharedInbound`] context whose staleness flag guarantees each line
//! is scanned at most once ([`run_polling`]).
//!
//! [`run_channel`]: DispatchEngine::run_channel
//! [`run_polling`]: DispatchEngine::run_polling

use std::sync::Arc;
use std::time::Duration;

use kaa_core::{HookRegistry, InboundLine, SharedInbound};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, Level, debug, info, span, trace, warn};

use crate::error::DispatchError;
use crate::invoker::{InvocationJob, Invoker, command_args};
use crate::pool::{PoolConfig, WorkerPool};

/// How scheduled invocations run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvocationMode {
    /// Each invocation is awaited inline, in match order.
    Sequential,
    /// Invocations go to the worker pool.
    #[default]
    Concurrent,
}

/// Settings for a [`DispatchEngine`].
///
/// The command prefix is taken from the invoker's configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Inline or pooled invocation.
    pub mode: InvocationMode,
    /// Sleep between scans of a shared context.
    pub poll_interval: Duration,
    /// Worker pool settings, used in concurrent mode.
    pub pool: PoolConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            mode: InvocationMode::Concurrent,
            poll_interval: Duration::from_millis(10),
            pool: PoolConfig::default(),
        }
    }
}

/// What dispatching one line did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Jobs handed to the pool, or run inline in sequential mode.
    pub scheduled: usize,
    /// Jobs discarded by the `drop` backpressure policy.
    pub dropped: usize,
    /// Jobs rejected by the `reject` policy or by a closed pool.
    pub rejected: usize,
}

impl DispatchReport {
    /// Total number of matches.
    pub fn matched(&self) -> usize {
        self.scheduled + self.dropped + self.rejected
    }
}

/// Matches lines against the registry and schedules invocations.
pub struct DispatchEngine {
    registry: Arc<HookRegistry>,
    invoker: Invoker,
    pool: Option<WorkerPool>,
    config: EngineConfig,
}

impl DispatchEngine {
    /// Creates an engine. In concurrent mode this spawns the worker pool, so
    /// it must be called from within a Tokio runtime.
    pub fn new(registry: Arc<HookRegistry>, invoker: Invoker, config: EngineConfig) -> Self {
        let pool = match config.mode {
            InvocationMode::Concurrent => Some(WorkerPool::spawn(invoker.clone(), config.pool)),
            InvocationMode::Sequential => None,
        };

        Self {
            registry,
            invoker,
            pool,
            config,
        }
    }

    /// The registry this engine reads.
    pub fn registry(&self) -> &Arc<HookRegistry> {
        &self.registry
    }

    /// The invoker running matched jobs.
    pub fn invoker(&self) -> &Invoker {
        &self.invoker
    }

    /// The engine's configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Returns one job per registration `line` triggers, in dispatch order.
    pub fn matches(&self, line: &Arc<InboundLine>) -> Vec<InvocationJob> {
        if line.params.is_empty() {
            return Vec::new();
        }

        let mut jobs = Vec::new();

        if let Some(body) = line.message.strip_prefix(self.invoker.config().prefix.as_str()) {
            jobs.extend(
                self.registry
                    .lookup_commands()
                    .into_iter()
                    .filter(|registration| command_args(body, registration.hook()).is_some())
                    .map(|registration| InvocationJob::new(registration, Arc::clone(line))),
            );
        }

        if let Some(verb) = line.command.as_deref().filter(|_| line.has_event_verb()) {
            jobs.extend(
                self.registry
                    .lookup_subscriptions(verb)
                    .into_iter()
                    .map(|registration| InvocationJob::new(registration, Arc::clone(line))),
            );
        }

        jobs
    }

    /// Dispatches one line.
    pub async fn dispatch_line(&self, line: Arc<InboundLine>) -> DispatchReport {
        let span = span!(
            Level::DEBUG,
            "dispatch",
            command = line.command.as_deref().unwrap_or(""),
            sender = line.sender.as_deref().unwrap_or("")
        );

        async {
            let jobs = self.matches(&line);
            let mut report = DispatchReport::default();

            for job in jobs {
                match &self.pool {
                    Some(pool) => match pool.submit(job).await {
                        Ok(()) => report.scheduled += 1,
                        Err(DispatchError::Dropped { .. }) => report.dropped += 1,
                        Err(DispatchError::Rejected { .. }) => report.rejected += 1,
                        Err(err @ DispatchError::PoolClosed) => {
                            warn!(error = %err, "Cannot schedule invocation");
                            report.rejected += 1;
                        }
                    },
                    None => {
                        let hook = job.hook().to_string();
                        let outcome = self.invoker.invoke(job).await;
                        trace!(hook = %hook, ?outcome, "Invocation finished");
                        report.scheduled += 1;
                    }
                }
            }

            if report.matched() > 0 {
                debug!(
                    scheduled = report.scheduled,
                    dropped = report.dropped,
                    rejected = report.rejected,
                    "Line dispatched"
                );
            }
            report
        }
        .instrument(span)
        .await
    }

    /// Scans the shared context once.
    ///
    /// Returns `None` without scheduling anything when the context is stale.
    /// The context is always stale afterwards.
    pub async fn scan(&self, shared: &SharedInbound) -> Option<DispatchReport> {
        let line = shared.acknowledge()?;
        Some(self.dispatch_line(line).await)
    }

    /// Dispatches lines from `rx` until it closes or `cancel` fires.
    pub async fn run_channel(
        &self,
        mut rx: mpsc::Receiver<Arc<InboundLine>>,
        cancel: CancellationToken,
    ) {
        info!("Dispatch loop started (channel)");
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                line = rx.recv() => match line {
                    Some(line) => {
                        self.dispatch_line(line).await;
                    }
                    None => {
                        debug!("Inbound channel closed");
                        break;
                    }
                },
            }
        }
        info!("Dispatch loop stopped");
    }

    /// Scans `shared` every poll interval until `cancel` fires.
    pub async fn run_polling(&self, shared: SharedInbound, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        info!(poll_interval = ?self.config.poll_interval, "Dispatch loop started (polling)");
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    self.scan(&shared).await;
                }
            }
        }
        info!("Dispatch loop stopped");
    }

    /// Cancels in-flight handlers and stops the worker pool.
    pub async fn shutdown(&self) {
        match &self.pool {
            Some(pool) => pool.shutdown().await,
            None => self.invoker.cancellation().cancel(),
        }
    }
}

impl std::fmt::Debug for DispatchEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchEngine")
            .field("config", &self.config)
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}
