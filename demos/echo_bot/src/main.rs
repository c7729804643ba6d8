//! Echo Bot Example
//!
//! A console bot for the Kaa dispatch engine. IRC lines (or bare chat text)
//! are read from stdin and replies are written to stdout as IRC lines.
//!
//! # Usage
//!
//! ```bash
//! cargo run --package echo-bot -- --prefix !
//! ```
//!
//! Then type for example:
//!
//! ```text
//! .ping
//! .google rust async
//! .repeat -n 3 hello
//! :bob!b@host JOIN #console
//! ```

mod console;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use kaa::core::HookRegistry;
use kaa::prelude::*;
use tracing::info;

use crate::console::ConsoleClient;

#[derive(Parser, Debug)]
#[command(name = "echo-bot", about = "A console echo bot for Kaa")]
struct Cli {
    /// Configuration file to load instead of searching for kaa.toml
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Configuration profile (development, production, ...)
    #[arg(short, long)]
    profile: Option<String>,

    /// Command prefix override
    #[arg(long)]
    prefix: Option<String>,
}

// ============================================================================
// Handler Functions
// ============================================================================

async fn ping() -> &'static str {
    "pong"
}

async fn echo(Args(text): Args) -> Option<String> {
    (!text.is_empty()).then_some(text)
}

async fn google(Args(query): Args) -> String {
    let query: Vec<&str> = query.split_whitespace().collect();
    format!("https://www.google.com/search?q={}", query.join("+"))
}

/// Greets whoever joins a channel.
async fn join(Sender(nick): Sender, line: Line) -> Option<String> {
    line.is_channel().then(|| format!("welcome, {nick}"))
}

#[derive(Parser, Debug, Clone)]
struct Repeat {
    /// How many times to repeat the text
    #[arg(short = 'n', long, default_value_t = 2)]
    times: usize,

    /// Text to repeat
    #[arg(required = true)]
    text: Vec<String>,
}

async fn repeat(cmd: CommandArgs<Repeat>) -> String {
    let text = cmd.text.join(" ");
    vec![text; cmd.times.min(10)].join(" ")
}

/// Lists commands, or shows one command's help text.
fn help_handler(
    registry: Arc<HookRegistry>,
) -> impl Fn(Args) -> std::future::Ready<String> + Clone + Send + Sync + 'static {
    move |Args(hook): Args| {
        let reply = if hook.is_empty() {
            format!("commands: {}", registry.command_hooks().join(", "))
        } else {
            registry
                .help(&hook)
                .map(|help| format!("{hook}: {help}"))
                .unwrap_or_else(|| format!("no such command: {hook}"))
        };
        std::future::ready(reply)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut loader = ConfigLoader::new().set("logging.output", "stderr");
    if let Some(path) = &cli.config {
        loader = loader.file(path);
    }
    if let Some(profile) = &cli.profile {
        loader = loader.profile(profile);
    }
    if let Some(prefix) = &cli.prefix {
        loader = loader.set("dispatch.prefix", prefix);
    }
    let config = loader.load()?;
    logging::init_from_config(&config.logging);

    let bot = Bot::builder()
        .config(config)
        .client(ConsoleClient::new())
        .build()?;

    bot.command(HookSpec::inferred().help("Replies with pong"), ping)?;
    bot.command(HookSpec::inferred().help("Echoes the arguments"), echo)?;
    bot.command(HookSpec::inferred().help("Links a web search"), google)?;
    bot.command(
        HookSpec::named("me").action().help("Echoes the arguments as an action"),
        echo,
    )?;
    bot.command(
        HookSpec::inferred().help("Repeats text: repeat [-n TIMES] TEXT..."),
        repeat,
    )?;
    bot.command(
        HookSpec::named("help").notice().help("Lists commands or shows help for one"),
        help_handler(Arc::clone(bot.registry())),
    )?;
    bot.event(HookSpec::inferred(), join)?;

    let loaded = bot.load_configured_plugins()?;
    info!(
        commands = bot.hooks().len(),
        plugin_hooks = loaded,
        prefix = %bot.config().dispatch.prefix,
        "Echo bot ready, type lines on stdin"
    );

    bot.run().await?;
    Ok(())
}
