//! Protocol client seams.
//!
//! The wire-level client (connection setup, TLS, framing, keepalive) is an
//! external collaborator. The core consumes it through two narrow traits:
//!
//! - [`Outbound`]: `send(target, text, mode)`, used by the invoker to reply.
//! - [`ProtocolClient`]: the `connect()` / `run()` lifecycle. `run` receives
//!   an [`InboundPublisher`] and feeds every parsed line into it.

mod memory;

pub use memory::{MemoryClient, SentMessage};

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::context::SharedInbound;
use crate::error::{ClientError, ClientResult};
use crate::hook::DeliveryMode;
use crate::line::InboundLine;

/// Outbound side of a protocol client.
#[async_trait]
pub trait Outbound: Send + Sync + 'static {
    /// Sends one protocol line worth of `text` to `target`.
    async fn send(&self, target: &str, text: &str, mode: DeliveryMode) -> ClientResult<()>;
}

/// A protocol client with a connect/run lifecycle.
#[async_trait]
pub trait ProtocolClient: Outbound {
    /// Establishes the network session.
    async fn connect(&self) -> ClientResult<()>;

    /// Starts feeding received lines into `publisher`.
    ///
    /// Implementations typically spawn their read loop and return once it is
    /// running.
    async fn run(&self, publisher: InboundPublisher) -> ClientResult<()>;
}

/// A shared outbound handle.
pub type BoxedOutbound = Arc<dyn Outbound>;

/// A shared protocol client handle.
pub type BoxedClient = Arc<dyn ProtocolClient>;

/// Where a protocol client publishes parsed lines.
#[derive(Debug, Clone)]
pub enum InboundPublisher {
    /// Push each line onto a bounded channel consumed by the dispatch engine.
    Channel(mpsc::Sender<Arc<InboundLine>>),
    /// Overwrite the shared context; the dispatch engine polls it.
    ///
    /// A line published before the previous one was scanned replaces it.
    Shared(SharedInbound),
}

impl InboundPublisher {
    /// Publishes one line.
    pub async fn publish(&self, line: InboundLine) -> ClientResult<()> {
        match self {
            Self::Channel(tx) => tx
                .send(Arc::new(line))
                .await
                .map_err(|_| ClientError::Closed),
            Self::Shared(shared) => {
                shared.publish(line);
                Ok(())
            }
        }
    }
}
