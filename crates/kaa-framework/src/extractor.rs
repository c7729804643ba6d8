//! Extractors for handler parameters.
//!
//! Any handler taking one or more parameters receives the [`Invocation`];
//! each parameter pulls the piece it needs through [`FromInvocation`].

use std::ops::Deref;
use std::sync::Arc;

use kaa_core::{ExtractError, ExtractResult, InboundLine, Invocation};

/// Types that can be built from an invocation.
pub trait FromInvocation: Sized {
    /// Performs the extraction.
    fn from_invocation(invocation: &Invocation) -> ExtractResult<Self>;
}

impl FromInvocation for Invocation {
    fn from_invocation(invocation: &Invocation) -> ExtractResult<Self> {
        Ok(invocation.clone())
    }
}

/// The argument text following the hook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Args(pub String);

impl Deref for Args {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl FromInvocation for Args {
    fn from_invocation(invocation: &Invocation) -> ExtractResult<Self> {
        Ok(Args(invocation.args().to_string()))
    }
}

/// The inbound line that triggered the invocation.
#[derive(Debug, Clone)]
pub struct Line(pub Arc<InboundLine>);

impl Deref for Line {
    type Target = InboundLine;

    fn deref(&self) -> &InboundLine {
        &self.0
    }
}

impl FromInvocation for Line {
    fn from_invocation(invocation: &Invocation) -> ExtractResult<Self> {
        Ok(Line(invocation.line_arc()))
    }
}

/// Nickname of whoever sent the line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sender(pub String);

impl FromInvocation for Sender {
    fn from_invocation(invocation: &Invocation) -> ExtractResult<Self> {
        invocation
            .line()
            .sender
            .clone()
            .map(Sender)
            .ok_or(ExtractError::Missing("sender"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extractors() {
        let line = Arc::new(InboundLine::privmsg("alice", "#rust", ".google cats"));
        let invocation = Invocation::new(line, "google", "cats");

        assert_eq!(&*Args::from_invocation(&invocation).unwrap(), "cats");
        assert_eq!(Line::from_invocation(&invocation).unwrap().message, ".google cats");
        assert_eq!(
            Sender::from_invocation(&invocation).unwrap(),
            Sender("alice".to_string())
        );
    }

    #[test]
    fn test_missing_sender() {
        let line = Arc::new(InboundLine {
            command: Some("PING".to_string()),
            ..Default::default()
        });
        let invocation = Invocation::new(line, "PING", "");
        assert!(matches!(
            Sender::from_invocation(&invocation),
            Err(ExtractError::Missing("sender"))
        ));
    }
}
