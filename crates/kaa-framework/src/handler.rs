//! Handler system for the Kaa framework.
//!
//! Handlers are plain async functions. The [`Handler`] trait is implemented
//! through blanket implementations for functions of different arities,
//! similar to Axum's handler system:
//!
//! - a function with **no parameters** does not take arguments; the invoker
//!   calls it without building anything for it;
//! - a function with **one or more parameters** takes arguments; each
//!   parameter is extracted from the [`Invocation`] via [`FromInvocation`].
//!
//! The return value is turned into a reply via [`IntoReply`].
//!
//! ```rust,ignore
//! async fn ping() -> &'static str {
//!     "pong"
//! }
//!
//! async fn google(Args(query): Args) -> String {
//!     format!("https://www.google.com/search?q={query}")
//! }
//!
//! async fn greet(Sender(nick): Sender, line: Line) -> Option<String> {
//!     line.is_channel().then(|| format!("hello {nick}"))
//! }
//! ```

use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use futures::future::BoxFuture;
use kaa_core::{BoxedHandler, ErasedHandler, ExtractError, HandlerResult, Invocation};

use crate::extractor::FromInvocation;
use crate::reply::IntoReply;

// ============================================================================
// Handler Trait
// ============================================================================

/// The core trait for command and event handlers.
///
/// Automatically implemented for async functions (and closures) that take
/// 0-8 parameters implementing [`FromInvocation`] and return something
/// implementing [`IntoReply`].
pub trait Handler<T>: Clone + Send + Sync + 'static {
    /// The type of future calling this handler returns.
    type Future: Future<Output = HandlerResult> + Send + 'static;

    /// Whether the handler wants the invocation context.
    const TAKES_ARGS: bool;

    /// Calls the handler. `invocation` is only read when `TAKES_ARGS`.
    fn call(self, invocation: Option<Invocation>) -> Self::Future;
}

// Implementation for functions with no parameters
impl<F, Fut> Handler<()> for F
where
    F: FnOnce() -> Fut + Clone + Send + Sync + 'static,
    Fut: Future + Send + 'static,
    Fut::Output: IntoReply,
{
    type Future = BoxFuture<'static, HandlerResult>;

    const TAKES_ARGS: bool = false;

    fn call(self, _invocation: Option<Invocation>) -> Self::Future {
        Box::pin(async move { (self)().await.into_reply() })
    }
}

/// Macro to generate Handler implementations for functions with different arities.
macro_rules! impl_handler {
    (
        $($ty:ident),*
    ) => {
        #[allow(non_snake_case)]
        impl<F, Fut, $($ty,)*> Handler<($($ty,)*)> for F
        where
            F: FnOnce($($ty,)*) -> Fut + Clone + Send + Sync + 'static,
            Fut: Future + Send + 'static,
            Fut::Output: IntoReply,
            $( $ty: FromInvocation + Send + 'static, )*
        {
            type Future = BoxFuture<'static, HandlerResult>;

            const TAKES_ARGS: bool = true;

            fn call(self, invocation: Option<Invocation>) -> Self::Future {
                Box::pin(async move {
                    let invocation = invocation.ok_or(ExtractError::Missing("invocation"))?;
                    $(
                        let $ty = $ty::from_invocation(&invocation)?;
                    )*

                    (self)($($ty,)*).await.into_reply()
                })
            }
        }
    };
}

impl_handler!(T1);
impl_handler!(T1, T2);
impl_handler!(T1, T2, T3);
impl_handler!(T1, T2, T3, T4);
impl_handler!(T1, T2, T3, T4, T5);
impl_handler!(T1, T2, T3, T4, T5, T6);
impl_handler!(T1, T2, T3, T4, T5, T6, T7);
impl_handler!(T1, T2, T3, T4, T5, T6, T7, T8);

// ============================================================================
// HandlerFn - type erasure
// ============================================================================

/// Wraps a [`Handler`] so it can be stored as a [`BoxedHandler`].
pub struct HandlerFn<F, T> {
    f: F,
    name: &'static str,
    _marker: PhantomData<fn() -> T>,
}

impl<F, T> HandlerFn<F, T> {
    /// Creates a new handler function wrapper.
    pub fn new(f: F) -> Self {
        Self {
            f,
            name: std::any::type_name::<F>(),
            _marker: PhantomData,
        }
    }
}

impl<F: Clone, T> Clone for HandlerFn<F, T> {
    fn clone(&self) -> Self {
        Self {
            f: self.f.clone(),
            name: self.name,
            _marker: PhantomData,
        }
    }
}

impl<F, T> ErasedHandler for HandlerFn<F, T>
where
    F: Handler<T>,
    T: 'static,
{
    fn name(&self) -> &str {
        self.name
    }

    fn takes_args(&self) -> bool {
        F::TAKES_ARGS
    }

    fn call(&self, invocation: Option<Invocation>) -> BoxFuture<'static, HandlerResult> {
        Box::pin(self.f.clone().call(invocation))
    }
}

/// Convert a handler function into a boxed handler.
pub fn into_handler<F, T>(f: F) -> BoxedHandler
where
    F: Handler<T>,
    T: 'static,
{
    Arc::new(HandlerFn::new(f))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::{Args, Sender};
    use kaa_core::{HandlerError, InboundLine};

    async fn ping() -> &'static str {
        "pong"
    }

    async fn echo(Args(text): Args) -> String {
        text
    }

    async fn whoami(Sender(nick): Sender, Args(text): Args) -> String {
        format!("{nick}: {text}")
    }

    fn invocation(args: &str) -> Invocation {
        let line = Arc::new(InboundLine::privmsg("alice", "#rust", format!(".x {args}")));
        Invocation::new(line, "x", args)
    }

    #[tokio::test]
    async fn test_zero_arity_handler() {
        let handler = into_handler(ping);
        assert!(!handler.takes_args());
        assert_eq!(handler.call(None).await.unwrap().as_deref(), Some("pong"));
    }

    #[tokio::test]
    async fn test_extracting_handlers() {
        let handler = into_handler(echo);
        assert!(handler.takes_args());
        assert_eq!(
            handler.call(Some(invocation("cats"))).await.unwrap().as_deref(),
            Some("cats")
        );

        let handler = into_handler(whoami);
        assert_eq!(
            handler.call(Some(invocation("hi"))).await.unwrap().as_deref(),
            Some("alice: hi")
        );
    }

    #[tokio::test]
    async fn test_missing_invocation_is_extract_error() {
        let handler = into_handler(echo);
        assert!(matches!(
            handler.call(None).await,
            Err(HandlerError::Extract(ExtractError::Missing("invocation")))
        ));
    }

    #[test]
    fn test_handler_name_is_type_name() {
        let handler = into_handler(ping);
        assert!(handler.name().ends_with("::ping"));

        let closure = into_handler(|| async {});
        assert!(closure.name().contains("{{closure}}"));
    }
}
