//! Kaa Runtime - the layer that turns the dispatch core into a running bot.
//!
//! This crate provides:
//! - Layered configuration (`BotConfig`, `ConfigLoader`)
//! - Logging configuration (`LoggingBuilder`)
//! - Reloadable source units (`SourceUnit`, `ScriptPlugin`)
//! - Live reload by modification time (`LiveReloader`)
//! - The bot facade (`Bot`, `HookSpec`)
//!
//! ```ignore
//! use kaa_runtime::{Bot, ConfigLoader, HookSpec, logging};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ConfigLoader::new().load()?;
//!     logging::init_from_config(&config.logging);
//!
//!     let bot = Bot::builder().config(config).client(client).build()?;
//!     bot.command(HookSpec::named("ping"), || async { "pong" })?;
//!     bot.load_configured_plugins()?;
//!
//!     // Run until Ctrl+C
//!     bot.run().await?;
//!     Ok(())
//! }
//! ```

pub mod bot;
pub mod config;
pub mod error;
pub mod logging;
pub mod reloader;
pub mod source;

// Re-exports
pub use bot::{Bot, BotBuilder, HookSpec};
pub use config::{BotConfig, ConfigError, ConfigLoader, ConfigResult, Profile};
pub use error::{ReloadError, ReloadResult, RuntimeError, RuntimeResult};
pub use logging::{LoggingBuilder, SpanEvents};
pub use reloader::{LiveReloader, ReloadReport};
pub use source::{BoxedSource, ScriptPlugin, SourceUnit};

// Re-export tracing for use by other crates
pub use tracing;
pub use tracing_subscriber;

/// Prelude module for convenient imports.
///
/// This provides all the commonly used logging macros:
/// - `trace!`, `debug!`, `info!`, `warn!`, `error!`
/// - `span`, `event`
/// - `instrument` attribute
/// - `Level` for span creation
pub mod prelude {
    pub use tracing::{Level, debug, error, event, info, instrument, span, trace, warn};
}
