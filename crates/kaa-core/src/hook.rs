//! Hooks and handler registrations.

use std::fmt;
use std::sync::Arc;

use crate::handler::BoxedHandler;

/// What kind of trigger a hook is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookKind {
    /// Prefix-triggered keyword, unique across the registry.
    Command,
    /// Protocol verb, any number of handlers.
    Event,
}

impl fmt::Display for HookKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Command => f.write_str("command"),
            Self::Event => f.write_str("event"),
        }
    }
}

/// How a reply is delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeliveryMode {
    /// A plain message.
    #[default]
    Message,
    /// A `/me`-style action.
    Action,
    /// A notice.
    Notice,
}

/// Per-handler delivery options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HandlerOptions {
    /// Emit replies as actions.
    pub action: bool,
    /// Emit replies as notices.
    pub notice: bool,
}

impl HandlerOptions {
    /// The delivery mode these options select. `action` wins over `notice`.
    pub fn delivery_mode(&self) -> DeliveryMode {
        if self.action {
            DeliveryMode::Action
        } else if self.notice {
            DeliveryMode::Notice
        } else {
            DeliveryMode::Message
        }
    }
}

/// Identifies the source unit (e.g. a plugin file) that owns a set of
/// registrations, so they can be swapped out together on reload.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UnitId(String);

impl UnitId {
    /// Creates a unit id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UnitId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// A registration that has not been added to a registry yet.
///
/// `hook: None` asks the registry to infer the hook from the handler's name.
#[derive(Clone)]
pub struct HookEntry {
    /// Command or event.
    pub kind: HookKind,
    /// The hook, or `None` to use the handler's name.
    pub hook: Option<String>,
    /// The handler to call.
    pub handler: BoxedHandler,
    /// Delivery options for replies.
    pub options: HandlerOptions,
    /// Help text shown by help listings.
    pub help: Option<String>,
}

impl HookEntry {
    /// A command entry.
    pub fn command(hook: Option<String>, handler: BoxedHandler) -> Self {
        Self {
            kind: HookKind::Command,
            hook,
            handler,
            options: HandlerOptions::default(),
            help: None,
        }
    }

    /// An event entry.
    pub fn event(hook: impl Into<String>, handler: BoxedHandler) -> Self {
        Self {
            kind: HookKind::Event,
            hook: Some(hook.into()),
            handler,
            options: HandlerOptions::default(),
            help: None,
        }
    }

    /// Sets the delivery options.
    pub fn with_options(mut self, options: HandlerOptions) -> Self {
        self.options = options;
        self
    }

    /// Sets the help text.
    pub fn with_help(mut self, help: Option<String>) -> Self {
        self.help = help;
        self
    }
}

impl fmt::Debug for HookEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookEntry")
            .field("kind", &self.kind)
            .field("hook", &self.hook)
            .field("handler", &self.handler.name())
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

/// A live handler registration.
///
/// Immutable once created. Reloading a unit drops the old registrations and
/// inserts new ones; nothing is ever mutated in place.
pub struct HandlerRegistration {
    hook: String,
    kind: HookKind,
    handler: BoxedHandler,
    options: HandlerOptions,
    help: Option<String>,
    unit: Option<UnitId>,
}

impl HandlerRegistration {
    pub(crate) fn new(
        hook: String,
        entry: HookEntry,
        unit: Option<UnitId>,
    ) -> Arc<Self> {
        Arc::new(Self {
            hook,
            kind: entry.kind,
            handler: entry.handler,
            options: entry.options,
            help: entry.help,
            unit,
        })
    }

    /// The resolved hook.
    pub fn hook(&self) -> &str {
        &self.hook
    }

    pub fn kind(&self) -> HookKind {
        self.kind
    }

    /// The type-erased handler.
    pub fn handler(&self) -> &BoxedHandler {
        &self.handler
    }

    /// Delivery options for replies.
    pub fn options(&self) -> HandlerOptions {
        self.options
    }

    /// Help text, or a placeholder when none was given.
    pub fn help(&self) -> &str {
        self.help.as_deref().unwrap_or("no help provided")
    }

    /// The owning source unit, if any.
    pub fn unit(&self) -> Option<&UnitId> {
        self.unit.as_ref()
    }
}

impl fmt::Debug for HandlerRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerRegistration")
            .field("hook", &self.hook)
            .field("kind", &self.kind)
            .field("handler", &self.handler.name())
            .field("options", &self.options)
            .field("unit", &self.unit)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delivery_mode_precedence() {
        assert_eq!(HandlerOptions::default().delivery_mode(), DeliveryMode::Message);

        let notice = HandlerOptions {
            action: false,
            notice: true,
        };
        assert_eq!(notice.delivery_mode(), DeliveryMode::Notice);

        let both = HandlerOptions {
            action: true,
            notice: true,
        };
        assert_eq!(both.delivery_mode(), DeliveryMode::Action);
    }
}
