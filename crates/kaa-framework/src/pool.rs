//! Bounded worker pool for concurrent invocations.
//!
//! A fixed number of worker tasks pull [`InvocationJob`]s from one bounded
//! queue and hand them to the [`Invoker`]. When the queue is full the
//! configured [`Backpressure`] policy decides what happens to the new job.
//!
//! The pool shares the invoker's cancellation token: [`WorkerPool::shutdown`]
//! cancels in-flight handlers, stops the workers and waits for them to exit.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tower::ServiceExt;
use tracing::{debug, info, trace, warn};

use crate::error::{DispatchError, DispatchResult};
use crate::invoker::{InvocationJob, Invoker};

/// What to do with a new job when the queue is full.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backpressure {
    /// Wait for space in the queue.
    #[default]
    Block,
    /// Discard the new job quietly.
    Drop,
    /// Discard the new job and warn.
    Reject,
}

/// Sizing and policy for a [`WorkerPool`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
    /// Number of worker tasks.
    pub workers: usize,
    /// Jobs that may wait in the queue.
    pub queue_capacity: usize,
    /// Policy when the queue is full.
    pub backpressure: Backpressure,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            workers: 8,
            queue_capacity: 256,
            backpressure: Backpressure::Block,
        }
    }
}

/// A fixed set of workers running invocations.
pub struct WorkerPool {
    tx: mpsc::Sender<InvocationJob>,
    backpressure: Backpressure,
    tracker: TaskTracker,
    cancel: CancellationToken,
}

impl WorkerPool {
    /// Spawns the workers onto the current Tokio runtime.
    ///
    /// Zero workers or a zero-capacity queue are raised to one.
    pub fn spawn(invoker: Invoker, config: PoolConfig) -> Self {
        let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));
        let rx = Arc::new(Mutex::new(rx));
        let cancel = invoker.cancellation().clone();
        let tracker = TaskTracker::new();

        for worker in 0..config.workers.max(1) {
            tracker.spawn(worker_loop(
                worker,
                invoker.clone(),
                Arc::clone(&rx),
                cancel.clone(),
            ));
        }
        tracker.close();

        info!(
            workers = config.workers.max(1),
            queue_capacity = config.queue_capacity.max(1),
            backpressure = ?config.backpressure,
            "Worker pool started"
        );

        Self {
            tx,
            backpressure: config.backpressure,
            tracker,
            cancel,
        }
    }

    /// Queues a job according to the backpressure policy.
    pub async fn submit(&self, job: InvocationJob) -> DispatchResult<()> {
        if self.cancel.is_cancelled() {
            return Err(DispatchError::PoolClosed);
        }

        match self.backpressure {
            Backpressure::Block => tokio::select! {
                _ = self.cancel.cancelled() => Err(DispatchError::PoolClosed),
                sent = self.tx.send(job) => sent.map_err(|_| DispatchError::PoolClosed),
            },
            Backpressure::Drop | Backpressure::Reject => match self.tx.try_send(job) {
                Ok(()) => Ok(()),
                Err(mpsc::error::TrySendError::Full(job)) => {
                    let hook = job.hook().to_string();
                    if self.backpressure == Backpressure::Drop {
                        debug!(hook = %hook, "Queue full, dropping invocation");
                        Err(DispatchError::Dropped { hook })
                    } else {
                        warn!(hook = %hook, "Queue full, rejecting invocation");
                        Err(DispatchError::Rejected { hook })
                    }
                }
                Err(mpsc::error::TrySendError::Closed(_)) => Err(DispatchError::PoolClosed),
            },
        }
    }

    /// Returns `true` once the pool has been shut down.
    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Cancels in-flight handlers and waits for every worker to exit.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        self.tracker.wait().await;
        info!("Worker pool stopped");
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("backpressure", &self.backpressure)
            .field("workers", &self.tracker.len())
            .field("closed", &self.is_closed())
            .finish()
    }
}

async fn worker_loop(
    worker: usize,
    invoker: Invoker,
    rx: Arc<Mutex<mpsc::Receiver<InvocationJob>>>,
    cancel: CancellationToken,
) {
    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            job = async { rx.lock().await.recv().await } => job,
        };
        let Some(job) = next else { break };

        let hook = job.hook().to_string();
        let outcome = invoker
            .clone()
            .oneshot(job)
            .await
            .unwrap_or_else(|never| match never {});
        trace!(worker, hook = %hook, ?outcome, "Invocation finished");
    }
    debug!(worker, "Worker exiting");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::into_handler;
    use crate::invoker::InvokerConfig;
    use kaa_core::{HandlerOptions, HandlerRegistration, HookRegistry, InboundLine, MemoryClient};
    use std::time::Duration;
    use tokio::sync::{Notify, Semaphore};
    use tokio_test::{assert_err, assert_ok};

    struct Gated {
        client: Arc<MemoryClient>,
        registration: Arc<HandlerRegistration>,
        started: Arc<Notify>,
        gate: Arc<Semaphore>,
    }

    /// A `.wait` command that signals `started` and then blocks on `gate`.
    fn gated() -> Gated {
        let client = Arc::new(MemoryClient::new());
        let started = Arc::new(Notify::new());
        let gate = Arc::new(Semaphore::new(0));
        let registry = HookRegistry::new();

        let (s, g) = (Arc::clone(&started), Arc::clone(&gate));
        let handler = move || {
            let (started, gate) = (Arc::clone(&s), Arc::clone(&g));
            async move {
                started.notify_one();
                let _permit = gate.acquire().await;
                "done"
            }
        };
        let registration = registry
            .register_command(Some("wait"), into_handler(handler), HandlerOptions::default(), None)
            .unwrap();

        Gated {
            client,
            registration,
            started,
            gate,
        }
    }

    fn job(registration: &Arc<HandlerRegistration>) -> InvocationJob {
        let line = Arc::new(InboundLine::privmsg("alice", "#rust", ".wait"));
        InvocationJob::new(Arc::clone(registration), line)
    }

    fn pool(client: &Arc<MemoryClient>, backpressure: Backpressure) -> WorkerPool {
        let invoker = Invoker::new(client.clone(), InvokerConfig::default());
        WorkerPool::spawn(
            invoker,
            PoolConfig {
                workers: 1,
                queue_capacity: 1,
                backpressure,
            },
        )
    }

    async fn wait_for_replies(client: &MemoryClient, count: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while client.sent().len() < count {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("replies did not arrive in time");
    }

    #[tokio::test]
    async fn test_reject_when_full() {
        let g = gated();
        let pool = pool(&g.client, Backpressure::Reject);

        assert_ok!(pool.submit(job(&g.registration)).await);
        g.started.notified().await;
        assert_ok!(pool.submit(job(&g.registration)).await);

        assert_eq!(
            pool.submit(job(&g.registration)).await,
            Err(DispatchError::Rejected {
                hook: "wait".to_string()
            })
        );

        g.gate.add_permits(2);
        wait_for_replies(&g.client, 2).await;
        pool.shutdown().await;
    }

    #[tokio::test]
    async fn test_drop_when_full() {
        let g = gated();
        let pool = pool(&g.client, Backpressure::Drop);

        assert_ok!(pool.submit(job(&g.registration)).await);
        g.started.notified().await;
        assert_ok!(pool.submit(job(&g.registration)).await);

        let err = assert_err!(pool.submit(job(&g.registration)).await);
        assert!(matches!(err, DispatchError::Dropped { .. }));

        g.gate.add_permits(2);
        wait_for_replies(&g.client, 2).await;
        pool.shutdown().await;
    }

    #[tokio::test]
    async fn test_shutdown_cancels_in_flight() {
        let g = gated();
        let pool = pool(&g.client, Backpressure::Block);

        pool.submit(job(&g.registration)).await.unwrap();
        g.started.notified().await;

        pool.shutdown().await;
        assert!(pool.is_closed());
        assert!(g.client.sent().is_empty());
        assert_eq!(
            pool.submit(job(&g.registration)).await,
            Err(DispatchError::PoolClosed)
        );
    }

    #[test]
    fn test_backpressure_names() {
        let parsed: Vec<Backpressure> = ["block", "drop", "reject"]
            .into_iter()
            .map(|name| serde::de::value::StrDeserializer::<serde::de::value::Error>::new(name))
            .map(|de| Backpressure::deserialize(de).unwrap())
            .collect();
        assert_eq!(
            parsed,
            [Backpressure::Block, Backpressure::Drop, Backpressure::Reject]
        );
    }
}
