//! Reloadable source units.
//!
//! A [`SourceUnit`] is anything file-backed that produces a set of hook
//! entries. The [`LiveReloader`](crate::reloader::LiveReloader) watches its
//! path and swaps its registrations whenever the file changes.
//!
//! [`ScriptPlugin`] is the built-in unit: a TOML file of template replies.
//!
//! ```toml
//! [[command]]
//! hook = "google"
//! reply = "https://www.google.com/search?q={args}"
//! help = "Search the web"
//!
//! [[event]]
//! hook = "JOIN"
//! reply = "welcome to {target}, {sender}"
//! notice = true
//! ```
//!
//! Templates may use `{args}`, `{sender}`, `{target}`, `{hook}` and
//! `{message}`. Unknown placeholders are left as written.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use figment::Figment;
use figment::providers::{Format, Toml};
use kaa_core::{HandlerOptions, HookEntry, Invocation, UnitId};
use kaa_framework::into_handler;
use serde::Deserialize;

use crate::error::{ReloadError, ReloadResult};

/// A file-backed set of hook entries.
pub trait SourceUnit: Send + Sync + 'static {
    /// Owner id for the unit's registrations.
    fn id(&self) -> &UnitId;

    /// The file whose modification time triggers a reload.
    fn path(&self) -> &Path;

    /// Builds the unit's entries from its current contents.
    fn load(&self) -> ReloadResult<Vec<HookEntry>>;
}

/// A shared source unit handle.
pub type BoxedSource = Arc<dyn SourceUnit>;

#[derive(Debug, Deserialize)]
struct ScriptFile {
    #[serde(default, rename = "command")]
    commands: Vec<ScriptHook>,
    #[serde(default, rename = "event")]
    events: Vec<ScriptHook>,
}

#[derive(Debug, Deserialize)]
struct ScriptHook {
    hook: String,
    reply: String,
    #[serde(default)]
    help: Option<String>,
    #[serde(default)]
    action: bool,
    #[serde(default)]
    notice: bool,
}

impl ScriptHook {
    fn into_entry(self, command: bool) -> HookEntry {
        let template: Arc<str> = Arc::from(self.reply);
        let handler = into_handler(move |invocation: Invocation| {
            let template = Arc::clone(&template);
            async move { render(&template, &invocation) }
        });

        let entry = if command {
            HookEntry::command(Some(self.hook), handler)
        } else {
            HookEntry::event(self.hook, handler)
        };

        entry
            .with_options(HandlerOptions {
                action: self.action,
                notice: self.notice,
            })
            .with_help(self.help)
    }
}

/// A TOML file of template-reply commands and events.
#[derive(Debug, Clone)]
pub struct ScriptPlugin {
    id: UnitId,
    path: PathBuf,
}

impl ScriptPlugin {
    /// A plugin backed by `path`, owning registrations under the path's name.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self {
            id: UnitId::new(path.display().to_string()),
            path,
        }
    }
}

impl SourceUnit for ScriptPlugin {
    fn id(&self) -> &UnitId {
        &self.id
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> ReloadResult<Vec<HookEntry>> {
        let text = std::fs::read_to_string(&self.path).map_err(|source| ReloadError::Io {
            path: self.path.clone(),
            source,
        })?;

        let script: ScriptFile = Figment::from(Toml::string(&text))
            .extract()
            .map_err(|err| ReloadError::Parse {
                path: self.path.clone(),
                message: err.to_string(),
            })?;

        let commands = script.commands.into_iter().map(|hook| hook.into_entry(true));
        let events = script.events.into_iter().map(|hook| hook.into_entry(false));
        Ok(commands.chain(events).collect())
    }
}

/// Fills a reply template from an invocation.
pub fn render(template: &str, invocation: &Invocation) -> String {
    let line = invocation.line();
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];

        let Some(close) = after.find('}') else {
            out.push_str(&rest[open..]);
            return out;
        };

        let name = &after[..close];
        let value = match name {
            "args" => Some(invocation.args()),
            "sender" => Some(line.sender.as_deref().unwrap_or("")),
            "target" => Some(line.target.as_deref().unwrap_or("")),
            "hook" => Some(invocation.hook()),
            "message" => Some(line.message.as_str()),
            _ => None,
        };

        match value {
            Some(value) => out.push_str(value),
            None => {
                out.push('{');
                out.push_str(name);
                out.push('}');
            }
        }
        rest = &after[close + 1..];
    }

    out.push_str(rest);
    out
}
