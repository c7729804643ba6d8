//! The bot facade.
//!
//! A [`Bot`] ties together the configuration, the protocol client, the hook
//! registry, the dispatch engine and the live reloader. It is an ordinary
//! value built by the caller; several bots can live in one process.
//!
//! ```rust,ignore
//! use kaa_runtime::{Bot, HookSpec};
//!
//! async fn google(Args(query): Args) -> String {
//!     format!("https://www.google.com/search?q={query}")
//! }
//!
//! let bot = Bot::builder().client(client).build()?;
//! bot.command(HookSpec::inferred().help("Search the web"), google)?;
//! bot.load_configured_plugins()?;
//! bot.run().await?;
//! ```

use std::future::Future;
use std::sync::Arc;

use kaa_core::{
    BoxedClient, BoxedOutbound, HandlerOptions, HookEntry, HookRegistry, InboundPublisher,
    ProtocolClient, RegistrationResult, SharedInbound, infer_hook,
};
use kaa_framework::{DispatchEngine, Handler, Invoker, into_handler};
use tokio::signal;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{info, warn};

use crate::config::{BotConfig, ConfigLoader, InboundMode, validate_config};
use crate::error::{RuntimeError, RuntimeResult};
use crate::reloader::LiveReloader;
use crate::source::{BoxedSource, ScriptPlugin};

/// How a handler is registered: its hook, delivery options and help text.
#[derive(Debug, Clone, Default)]
pub struct HookSpec {
    hook: Option<String>,
    options: HandlerOptions,
    help: Option<String>,
}

impl HookSpec {
    /// Use the handler function's own name as the hook.
    pub fn inferred() -> Self {
        Self::default()
    }

    /// Use `hook` as the hook.
    pub fn named(hook: impl Into<String>) -> Self {
        Self {
            hook: Some(hook.into()),
            ..Self::default()
        }
    }

    /// Reply as an action (`/me`).
    pub fn action(mut self) -> Self {
        self.options.action = true;
        self
    }

    /// Reply as a notice.
    pub fn notice(mut self) -> Self {
        self.options.notice = true;
        self
    }

    /// Help text shown by help listings.
    pub fn help(mut self, text: impl Into<String>) -> Self {
        self.help = Some(text.into());
        self
    }
}

/// Builder for [`Bot`].
#[derive(Default)]
pub struct BotBuilder {
    config: Option<BotConfig>,
    loader: Option<ConfigLoader>,
    client: Option<(BoxedClient, BoxedOutbound)>,
    registry: Option<Arc<HookRegistry>>,
}

impl BotBuilder {
    /// Uses `config` as is (after validation) instead of loading one.
    pub fn config(mut self, config: BotConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Loads the configuration through `loader`.
    pub fn loader(mut self, loader: ConfigLoader) -> Self {
        self.loader = Some(loader);
        self
    }

    /// The protocol client to connect with and reply through.
    pub fn client<C: ProtocolClient>(mut self, client: Arc<C>) -> Self {
        let outbound: BoxedOutbound = client.clone();
        let client: BoxedClient = client;
        self.client = Some((client, outbound));
        self
    }

    /// Shares an existing registry.
    pub fn registry(mut self, registry: Arc<HookRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Builds the bot. In concurrent mode this spawns the worker pool, so it
    /// must be called from within a Tokio runtime.
    pub fn build(self) -> RuntimeResult<Bot> {
        let config = match (self.config, self.loader) {
            (Some(config), _) => {
                validate_config(&config)?;
                config
            }
            (None, Some(loader)) => loader.load()?,
            (None, None) => ConfigLoader::new().load()?,
        };
        let (client, outbound) = self.client.ok_or(RuntimeError::MissingClient)?;
        let registry = self.registry.unwrap_or_default();

        let cancel = CancellationToken::new();
        let invoker = Invoker::new(outbound, config.dispatch.to_invoker_config())
            .with_cancellation(cancel.child_token());
        let engine = DispatchEngine::new(
            Arc::clone(&registry),
            invoker,
            config.dispatch.to_engine_config(),
        );
        let reloader =
            LiveReloader::new(Arc::clone(&registry)).with_interval(config.reload.interval());

        Ok(Bot {
            config: Arc::new(config),
            client,
            registry,
            engine: Arc::new(engine),
            reloader: Arc::new(reloader),
            cancel,
        })
    }
}

/// A configured bot.
pub struct Bot {
    config: Arc<BotConfig>,
    client: BoxedClient,
    registry: Arc<HookRegistry>,
    engine: Arc<DispatchEngine>,
    reloader: Arc<LiveReloader>,
    cancel: CancellationToken,
}

impl Bot {
    /// Starts building a bot.
    pub fn builder() -> BotBuilder {
        BotBuilder::default()
    }

    /// The validated configuration.
    pub fn config(&self) -> &BotConfig {
        &self.config
    }

    /// The registry every handler is registered in.
    pub fn registry(&self) -> &Arc<HookRegistry> {
        &self.registry
    }

    /// The dispatch engine.
    pub fn engine(&self) -> &Arc<DispatchEngine> {
        &self.engine
    }

    /// The reloader watching loaded source units.
    pub fn reloader(&self) -> &Arc<LiveReloader> {
        &self.reloader
    }

    /// Token that stops the bot's loops when cancelled.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Registers `handler` as a command and hands it back unchanged.
    pub fn command<H, T>(&self, spec: HookSpec, handler: H) -> RegistrationResult<H>
    where
        H: Handler<T>,
        T: 'static,
    {
        let entry = HookEntry::command(spec.hook, into_handler(handler.clone()))
            .with_options(spec.options)
            .with_help(spec.help);
        self.registry.register(entry)?;
        Ok(handler)
    }

    /// Registers `handler` for an event verb and hands it back unchanged.
    ///
    /// An inferred hook is the handler's name in upper case, so `fn join`
    /// subscribes to `JOIN`. A named hook must already be an all-caps verb;
    /// `"join"` or `"001"` fails with `InvalidHook`.
    pub fn event<H, T>(&self, spec: HookSpec, handler: H) -> RegistrationResult<H>
    where
        H: Handler<T>,
        T: 'static,
    {
        let boxed = into_handler(handler.clone());
        let hook = match spec.hook {
            Some(hook) => hook,
            None => infer_hook(boxed.name())?.to_uppercase(),
        };
        let entry = HookEntry::event(hook, boxed)
            .with_options(spec.options)
            .with_help(spec.help);
        self.registry.register(entry)?;
        Ok(handler)
    }

    /// Loads a source unit and watches it for changes.
    pub fn load_source(&self, unit: BoxedSource) -> RuntimeResult<usize> {
        Ok(self.reloader.load(unit)?)
    }

    /// Loads every plugin file listed in the configuration.
    pub fn load_configured_plugins(&self) -> RuntimeResult<usize> {
        let mut total = 0;
        for path in &self.config.plugins {
            total += self.load_source(Arc::new(ScriptPlugin::new(path)))?;
        }
        Ok(total)
    }

    /// Help text for a command, if it is registered.
    pub fn help_text(&self, hook: &str) -> Option<String> {
        self.registry.help(hook)
    }

    /// Every registered command hook.
    pub fn hooks(&self) -> Vec<String> {
        self.registry.command_hooks()
    }

    /// Runs until Ctrl+C or SIGTERM.
    pub async fn run(&self) -> RuntimeResult<()> {
        self.run_until(wait_for_shutdown()).await
    }

    /// Connects, runs the dispatch and reload loops until `shutdown`
    /// completes (or the bot's token is cancelled), then stops them and
    /// cancels in-flight handlers.
    pub async fn run_until<F>(&self, shutdown: F) -> RuntimeResult<()>
    where
        F: Future<Output = ()>,
    {
        self.client.connect().await?;
        info!(
            server = %self.config.server,
            port = self.config.port,
            nick = %self.config.nick,
            "Connected"
        );

        let tracker = TaskTracker::new();
        let engine = Arc::clone(&self.engine);
        let cancel = self.cancel.clone();

        match self.config.dispatch.inbound {
            InboundMode::Channel => {
                let (tx, rx) = mpsc::channel(self.config.dispatch.queue_capacity);
                self.client.run(InboundPublisher::Channel(tx)).await?;
                tracker.spawn(async move { engine.run_channel(rx, cancel).await });
            }
            InboundMode::Polling => {
                let shared = SharedInbound::new();
                self.client.run(InboundPublisher::Shared(shared.clone())).await?;
                tracker.spawn(async move { engine.run_polling(shared, cancel).await });
            }
        }

        if self.config.reload.enabled {
            let reloader = Arc::clone(&self.reloader);
            let cancel = self.cancel.clone();
            tracker.spawn(reloader.run(cancel));
        }
        tracker.close();

        info!(
            commands = self.registry.command_count(),
            subscriptions = self.registry.subscription_count(),
            "Bot is running"
        );

        tokio::select! {
            _ = shutdown => {}
            _ = self.cancel.cancelled() => {}
        }

        info!("Shutting down");
        self.cancel.cancel();
        tracker.wait().await;
        self.engine.shutdown().await;
        Ok(())
    }
}

impl std::fmt::Debug for Bot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bot")
            .field("nick", &self.config.nick)
            .field("server", &self.config.server)
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

/// Waits for Ctrl+C, or SIGTERM on Unix.
async fn wait_for_shutdown() {
    #[cfg(unix)]
    {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = signal::ctrl_c() => info!("Received Ctrl+C, shutting down"),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down"),
                }
                return;
            }
            Err(err) => warn!(error = %err, "Cannot listen for SIGTERM"),
        }
    }

    match signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl+C, shutting down"),
        Err(err) => {
            warn!(error = %err, "Cannot listen for Ctrl+C, running until cancelled");
            futures::future::pending::<()>().await;
        }
    }
}
