//! # Kaa
//!
//! A hook-driven dispatch engine for line-oriented chat bots.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐     ┌────────────────┐     ┌─────────────┐     ┌─────────┐
//! │  Client  │────▶│ DispatchEngine │────▶│ WorkerPool  │────▶│ Invoker │──▶ replies
//! │ (lines)  │     │ (hook matching)│     │ (bounded)   │     │         │
//! └──────────┘     └────────────────┘     └─────────────┘     └─────────┘
//!                          ▲
//!                  ┌───────┴──────┐     ┌──────────────┐
//!                  │ HookRegistry │◀────│ LiveReloader │◀── plugin files
//!                  └──────────────┘     └──────────────┘
//! ```
//!
//! - **Client**: parses protocol lines and sends replies (`ProtocolClient`)
//! - **HookRegistry**: command keywords and event verbs mapped to handlers
//! - **DispatchEngine**: schedules one invocation per matching hook
//! - **Invoker**: runs a handler and delivers its reply in protocol-sized chunks
//! - **LiveReloader**: swaps a plugin file's hooks when the file changes
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use kaa::prelude::*;
//!
//! async fn google(Args(query): Args) -> String {
//!     format!("https://www.google.com/search?q={query}")
//! }
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let bot = Bot::builder().client(client).build()?;
//!     bot.command(HookSpec::inferred().help("Search the web"), google)?;
//!     bot.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `command`: clap-based `CommandArgs<T>` extractor (default)
//! - `json-log`: JSON log output

pub use kaa_core as core;
pub use kaa_framework as framework;
pub use kaa_runtime as runtime;

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use kaa::prelude::*;
/// ```
pub mod prelude {
    // Runtime - main entry point
    pub use kaa_runtime::{Bot, BotConfig, ConfigLoader, HookSpec, ScriptPlugin, logging};

    // Extractors - for handler parameters
    pub use kaa_framework::{Args, FromInvocation, Line, Sender};

    // Structured command support (requires "command" feature)
    #[cfg(feature = "command")]
    pub use kaa_framework::CommandArgs;

    // Protocol client seam - for custom clients
    pub use kaa_core::{
        ClientResult, DeliveryMode, InboundLine, InboundPublisher, Invocation, MemoryClient,
        Outbound, ProtocolClient,
    };
}
