//! # Kaa Core
//!
//! Data model shared by every layer of the Kaa chat bot engine:
//!
//! - [`InboundLine`]: one parsed protocol line
//! - [`SharedInbound`]: the lock-guarded "latest line" context with its
//!   staleness flag
//! - [`HookRegistry`]: command and event registrations
//! - [`Invocation`] and [`ErasedHandler`]: what a handler sees and how the
//!   registry stores it
//! - [`Outbound`] / [`ProtocolClient`]: the seams to the wire-level client

pub mod client;
pub mod context;
pub mod error;
pub mod handler;
pub mod hook;
pub mod line;
pub mod registry;

pub use client::{
    BoxedClient, BoxedOutbound, InboundPublisher, MemoryClient, Outbound, ProtocolClient,
    SentMessage,
};
pub use context::{InboundContext, SharedInbound};
pub use error::{
    ClientError, ClientResult, ExtractError, ExtractResult, HandlerError, HandlerResult,
    RegistrationError, RegistrationResult,
};
pub use handler::{BoxedHandler, ErasedHandler, Invocation};
pub use hook::{DeliveryMode, HandlerOptions, HandlerRegistration, HookEntry, HookKind, UnitId};
pub use line::{InboundLine, is_event_verb};
pub use registry::{HookRegistry, infer_hook};
