//! In-memory protocol client.
//!
//! Records every outbound message and lets callers inject inbound lines
//! without a network. Used by tests and by embedders that drive the engine
//! from another source.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::trace;

use super::{InboundPublisher, Outbound, ProtocolClient};
use crate::error::{ClientError, ClientResult};
use crate::hook::DeliveryMode;
use crate::line::InboundLine;

/// A message recorded by [`MemoryClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub target: String,
    pub text: String,
    pub mode: DeliveryMode,
}

/// Protocol client that keeps everything in memory.
#[derive(Debug, Default)]
pub struct MemoryClient {
    connected: AtomicBool,
    publisher: Mutex<Option<InboundPublisher>>,
    sent: Mutex<Vec<SentMessage>>,
}

impl MemoryClient {
    /// Creates a disconnected client.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` after [`connect`](ProtocolClient::connect).
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Feeds a line in as if it had been received from the network.
    pub async fn inject(&self, line: InboundLine) -> ClientResult<()> {
        let publisher = self.publisher.lock().clone();
        match publisher {
            Some(publisher) => publisher.publish(line).await,
            None => Err(ClientError::NotConnected),
        }
    }

    /// Everything sent so far.
    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().clone()
    }

    /// Drains the recorded messages.
    pub fn take_sent(&self) -> Vec<SentMessage> {
        std::mem::take(&mut *self.sent.lock())
    }
}

#[async_trait]
impl Outbound for MemoryClient {
    async fn send(&self, target: &str, text: &str, mode: DeliveryMode) -> ClientResult<()> {
        trace!(target_name = target, ?mode, "Recording outbound message");
        self.sent.lock().push(SentMessage {
            target: target.to_string(),
            text: text.to_string(),
            mode,
        });
        Ok(())
    }
}

#[async_trait]
impl ProtocolClient for MemoryClient {
    async fn connect(&self) -> ClientResult<()> {
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn run(&self, publisher: InboundPublisher) -> ClientResult<()> {
        if !self.is_connected() {
            return Err(ClientError::NotConnected);
        }
        *self.publisher.lock() = Some(publisher);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::SharedInbound;

    #[tokio::test]
    async fn test_inject_requires_run() {
        let client = MemoryClient::new();
        let line = InboundLine::privmsg("alice", "#rust", "hi");
        assert!(matches!(
            client.inject(line.clone()).await,
            Err(ClientError::NotConnected)
        ));

        let shared = SharedInbound::new();
        client.connect().await.unwrap();
        client
            .run(InboundPublisher::Shared(shared.clone()))
            .await
            .unwrap();
        client.inject(line).await.unwrap();
        assert!(!shared.is_stale());
    }

    #[tokio::test]
    async fn test_records_sent_messages() {
        let client = MemoryClient::new();
        client.send("#rust", "hello", DeliveryMode::Notice).await.unwrap();

        let sent = client.take_sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].mode, DeliveryMode::Notice);
        assert!(client.sent().is_empty());
    }
}
