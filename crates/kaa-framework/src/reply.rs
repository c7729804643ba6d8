//! Handler return values and reply chunking.

use std::fmt::Display;

use kaa_core::{HandlerError, HandlerResult};

/// Conversion from a handler's return value into an optional reply.
///
/// Implemented for the common shapes a handler returns:
///
/// - `()`: never replies
/// - `String` / `&'static str`: replies unless empty
/// - `Option<T>`: replies only with `Some`
/// - `Result<T, E>`: an `Err` becomes a [`HandlerError::Failed`] and is
///   logged instead of sent
pub trait IntoReply {
    /// Performs the conversion.
    fn into_reply(self) -> HandlerResult;
}

impl IntoReply for () {
    fn into_reply(self) -> HandlerResult {
        Ok(None)
    }
}

impl IntoReply for String {
    fn into_reply(self) -> HandlerResult {
        Ok((!self.is_empty()).then_some(self))
    }
}

impl IntoReply for &'static str {
    fn into_reply(self) -> HandlerResult {
        self.to_string().into_reply()
    }
}

impl<T: IntoReply> IntoReply for Option<T> {
    fn into_reply(self) -> HandlerResult {
        match self {
            Some(value) => value.into_reply(),
            None => Ok(None),
        }
    }
}

impl<T: IntoReply, E: Display> IntoReply for Result<T, E> {
    fn into_reply(self) -> HandlerResult {
        match self {
            Ok(value) => value.into_reply(),
            Err(err) => Err(HandlerError::failed(err)),
        }
    }
}

/// Splits `text` into chunks of at most `limit` characters.
///
/// Produces `ceil(chars / limit)` chunks whose concatenation is `text`.
/// Splits on character boundaries, never inside a UTF-8 sequence. A `limit`
/// of zero disables chunking.
pub fn chunk_reply(text: &str, limit: usize) -> Vec<&str> {
    if text.is_empty() {
        return Vec::new();
    }
    if limit == 0 {
        return vec![text];
    }

    let mut chunks = Vec::new();
    let mut rest = text;
    while !rest.is_empty() {
        let split = rest
            .char_indices()
            .nth(limit)
            .map_or(rest.len(), |(index, _)| index);
        let (head, tail) = rest.split_at(split);
        chunks.push(head);
        rest = tail;
    }
    chunks
}
