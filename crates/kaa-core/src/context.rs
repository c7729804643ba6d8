//! The shared inbound context.
//!
//! [`SharedInbound`] holds the single most recently received line together
//! with a staleness flag. The protocol client publishes into it, the
//! dispatch engine reads and acknowledges it, and both serialize on the same
//! mutex. A line is therefore scanned at most once: after the first
//! acknowledgement it stays stale until the producer publishes new content.

use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};

use crate::line::InboundLine;

/// The most recently received line and whether it has been scanned.
#[derive(Debug)]
pub struct InboundContext {
    line: Option<Arc<InboundLine>>,
    stale: bool,
}

impl Default for InboundContext {
    fn default() -> Self {
        Self::new()
    }
}

impl InboundContext {
    /// Creates an empty context. Nothing to scan, so it starts stale.
    pub fn new() -> Self {
        Self {
            line: None,
            stale: true,
        }
    }

    /// Returns the current line, fresh or not.
    pub fn line(&self) -> Option<&Arc<InboundLine>> {
        self.line.as_ref()
    }

    /// Returns `true` once the current line has been scanned.
    pub fn is_stale(&self) -> bool {
        self.stale
    }

    /// Marks the current line as scanned. Idempotent.
    pub fn mark_stale(&mut self) {
        self.stale = true;
    }

    /// Replaces the line and resets the flag to fresh.
    pub fn publish(&mut self, line: Arc<InboundLine>) {
        self.line = Some(line);
        self.stale = false;
    }

    /// Returns the line if it is fresh, marking it stale in the same step.
    pub fn acknowledge(&mut self) -> Option<Arc<InboundLine>> {
        if self.stale {
            return None;
        }
        self.stale = true;
        self.line.clone()
    }
}

/// Cheaply cloneable handle to an [`InboundContext`] and its lock.
#[derive(Debug, Clone, Default)]
pub struct SharedInbound {
    inner: Arc<Mutex<InboundContext>>,
}

impl SharedInbound {
    /// Creates a new, empty shared context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Locks the context.
    pub fn lock(&self) -> MutexGuard<'_, InboundContext> {
        self.inner.lock()
    }

    /// Producer side: overwrite the current line with a fresh one.
    pub fn publish(&self, line: impl Into<Arc<InboundLine>>) {
        self.inner.lock().publish(line.into());
    }

    /// Consumer side: read-and-acknowledge under the lock.
    pub fn acknowledge(&self) -> Option<Arc<InboundLine>> {
        self.inner.lock().acknowledge()
    }

    /// Returns `true` if the current line has already been scanned.
    pub fn is_stale(&self) -> bool {
        self.inner.lock().is_stale()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_context_is_stale() {
        let shared = SharedInbound::new();
        assert!(shared.is_stale());
        assert!(shared.acknowledge().is_none());
    }

    #[test]
    fn test_acknowledge_once_per_publish() {
        let shared = SharedInbound::new();
        shared.publish(InboundLine::privmsg("alice", "#rust", "hi"));

        assert!(!shared.is_stale());
        let line = shared.acknowledge().expect("fresh line");
        assert_eq!(line.message, "hi");

        assert!(shared.is_stale());
        assert!(shared.acknowledge().is_none());

        // The line itself is still readable after acknowledgement.
        assert!(shared.lock().line().is_some());
    }

    #[test]
    fn test_publish_resets_staleness() {
        let shared = SharedInbound::new();
        shared.publish(InboundLine::privmsg("alice", "#rust", "one"));
        shared.acknowledge();

        shared.publish(InboundLine::privmsg("alice", "#rust", "two"));
        assert_eq!(shared.acknowledge().map(|l| l.message.clone()).as_deref(), Some("two"));
    }
}
