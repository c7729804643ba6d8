//! The hook registry.
//!
//! [`HookRegistry`] stores two independent collections:
//!
//! - **commands**: keyword hooks, unique across the registry, kept in
//!   insertion order.
//! - **subscriptions**: event verbs, each mapping to an ordered list of
//!   handlers. No uniqueness constraint.
//!
//! The registry is read on every dispatched line and written rarely
//! (startup, reloads), so both tables sit behind a single
//! `parking_lot::RwLock`. Readers always receive `Arc` snapshots, and a
//! whole source unit is swapped inside one write section via
//! [`replace_unit`](HookRegistry::replace_unit), so a dispatch pass never
//! observes a half-applied reload.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info};

use crate::error::{RegistrationError, RegistrationResult};
use crate::handler::BoxedHandler;
use crate::hook::{HandlerOptions, HandlerRegistration, HookEntry, HookKind, UnitId};
use crate::line::is_event_verb;

#[derive(Default)]
struct HookTables {
    commands: Vec<Arc<HandlerRegistration>>,
    subscriptions: HashMap<String, Vec<Arc<HandlerRegistration>>>,
}

impl HookTables {
    fn command_owner(&self, hook: &str) -> Option<Option<&UnitId>> {
        self.commands
            .iter()
            .find(|r| r.hook() == hook)
            .map(|r| r.unit())
    }

    fn insert(&mut self, registration: Arc<HandlerRegistration>) {
        match registration.kind() {
            HookKind::Command => self.commands.push(registration),
            HookKind::Event => self
                .subscriptions
                .entry(registration.hook().to_string())
                .or_default()
                .push(registration),
        }
    }

    fn remove_unit(&mut self, unit: &UnitId) -> usize {
        let before = self.len();
        self.commands.retain(|r| r.unit() != Some(unit));
        for handlers in self.subscriptions.values_mut() {
            handlers.retain(|r| r.unit() != Some(unit));
        }
        self.subscriptions.retain(|_, handlers| !handlers.is_empty());
        before - self.len()
    }

    fn len(&self) -> usize {
        self.commands.len() + self.subscriptions.values().map(Vec::len).sum::<usize>()
    }
}

/// Registry of command and event hooks.
#[derive(Default)]
pub struct HookRegistry {
    tables: RwLock<HookTables>,
}

impl HookRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a command handler.
    ///
    /// When `hook` is `None` the handler's own name is used as the key.
    /// Fails with [`RegistrationError::DuplicateHook`] if the key is taken.
    pub fn register_command(
        &self,
        hook: Option<&str>,
        handler: BoxedHandler,
        options: HandlerOptions,
        help: Option<String>,
    ) -> RegistrationResult<Arc<HandlerRegistration>> {
        let entry = HookEntry::command(hook.map(str::to_string), handler)
            .with_options(options)
            .with_help(help);
        self.register(entry)
    }

    /// Appends an event handler under `hook`. Never fails on duplicates.
    pub fn register_subscription(
        &self,
        hook: &str,
        handler: BoxedHandler,
        options: HandlerOptions,
        help: Option<String>,
    ) -> RegistrationResult<Arc<HandlerRegistration>> {
        let entry = HookEntry::event(hook, handler)
            .with_options(options)
            .with_help(help);
        self.register(entry)
    }

    /// Registers a prepared entry that belongs to no source unit.
    pub fn register(&self, entry: HookEntry) -> RegistrationResult<Arc<HandlerRegistration>> {
        let registration = prepare(entry, None)?;

        let mut tables = self.tables.write();
        if registration.kind() == HookKind::Command
            && tables.command_owner(registration.hook()).is_some()
        {
            return Err(RegistrationError::DuplicateHook {
                hook: registration.hook().to_string(),
            });
        }
        tables.insert(Arc::clone(&registration));
        drop(tables);

        debug!(
            hook = %registration.hook(),
            kind = %registration.kind(),
            handler = registration.handler().name(),
            "Handler registered"
        );
        Ok(registration)
    }

    /// Atomically replaces every registration owned by `unit`.
    ///
    /// All entries are validated before the registry is touched: a hook that
    /// is invalid, duplicated within `entries`, or already owned by another
    /// unit fails the whole call and leaves the previous registrations in
    /// effect. Returns the number of registrations now owned by `unit`.
    pub fn replace_unit(&self, unit: &UnitId, entries: Vec<HookEntry>) -> RegistrationResult<usize> {
        let prepared = entries
            .into_iter()
            .map(|entry| prepare(entry, Some(unit.clone())))
            .collect::<RegistrationResult<Vec<_>>>()?;

        let mut tables = self.tables.write();

        let mut seen = HashSet::new();
        for registration in prepared.iter().filter(|r| r.kind() == HookKind::Command) {
            let taken_elsewhere = matches!(
                tables.command_owner(registration.hook()),
                Some(owner) if owner != Some(unit)
            );
            if !seen.insert(registration.hook()) || taken_elsewhere {
                return Err(RegistrationError::DuplicateHook {
                    hook: registration.hook().to_string(),
                });
            }
        }

        let removed = tables.remove_unit(unit);
        let added = prepared.len();
        for registration in prepared {
            tables.insert(registration);
        }
        drop(tables);

        info!(unit = %unit, removed, added, "Unit registrations swapped");
        Ok(added)
    }

    /// Removes every registration owned by `unit`, returning how many went.
    pub fn remove_unit(&self, unit: &UnitId) -> usize {
        self.tables.write().remove_unit(unit)
    }

    /// Removes a single command hook. Returns `true` if it existed.
    pub fn unregister_command(&self, hook: &str) -> bool {
        let mut tables = self.tables.write();
        let before = tables.commands.len();
        tables.commands.retain(|r| r.hook() != hook);
        before != tables.commands.len()
    }

    /// Snapshot of all command registrations, in stored order.
    pub fn lookup_commands(&self) -> Vec<Arc<HandlerRegistration>> {
        self.tables.read().commands.clone()
    }

    /// Snapshot of the handlers subscribed to `hook`, in registration order.
    pub fn lookup_subscriptions(&self, hook: &str) -> Vec<Arc<HandlerRegistration>> {
        self.tables
            .read()
            .subscriptions
            .get(hook)
            .cloned()
            .unwrap_or_default()
    }

    /// Help text for a command hook.
    pub fn help(&self, hook: &str) -> Option<String> {
        self.tables
            .read()
            .commands
            .iter()
            .find(|r| r.hook() == hook)
            .map(|r| r.help().to_string())
    }

    /// All command hooks, in stored order.
    pub fn command_hooks(&self) -> Vec<String> {
        self.tables
            .read()
            .commands
            .iter()
            .map(|r| r.hook().to_string())
            .collect()
    }

    /// Returns the number of registered commands.
    pub fn command_count(&self) -> usize {
        self.tables.read().commands.len()
    }

    /// Returns the number of registered event handlers across all verbs.
    pub fn subscription_count(&self) -> usize {
        self.tables
            .read()
            .subscriptions
            .values()
            .map(Vec::len)
            .sum()
    }
}

impl std::fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookRegistry")
            .field("command_count", &self.command_count())
            .field("subscription_count", &self.subscription_count())
            .finish()
    }
}

/// Resolves the entry's hook and validates it.
fn prepare(entry: HookEntry, unit: Option<UnitId>) -> RegistrationResult<Arc<HandlerRegistration>> {
    let hook = match &entry.hook {
        Some(hook) => hook.clone(),
        None => infer_hook(entry.handler.name())?,
    };

    if hook.is_empty() || hook.chars().any(char::is_whitespace) {
        return Err(RegistrationError::InvalidHook { hook });
    }
    // Dispatch only looks up all-caps verbs, so anything else would never fire.
    if entry.kind == HookKind::Event && !is_event_verb(&hook) {
        return Err(RegistrationError::InvalidHook { hook });
    }

    Ok(HandlerRegistration::new(hook, entry, unit))
}

/// Derives a hook from a handler's type name: `my_bot::plugins::google`
/// becomes `google`. Closures and other anonymous types have no usable name.
pub fn infer_hook(type_name: &str) -> RegistrationResult<String> {
    let name = type_name.rsplit("::").next().unwrap_or(type_name);
    let usable = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_alphanumeric() || c == '_');

    if usable {
        Ok(name.to_string())
    } else {
        Err(RegistrationError::UnnamedHandler {
            handler: type_name.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HandlerResult;
    use crate::handler::{ErasedHandler, Invocation};
    use futures::future::BoxFuture;

    struct Named(&'static str);

    impl ErasedHandler for Named {
        fn name(&self) -> &str {
            self.0
        }

        fn takes_args(&self) -> bool {
            false
        }

        fn call(&self, _invocation: Option<Invocation>) -> BoxFuture<'static, HandlerResult> {
            Box::pin(async { Ok(None) })
        }
    }

    fn handler(name: &'static str) -> BoxedHandler {
        Arc::new(Named(name))
    }

    fn command(hook: &str) -> HookEntry {
        HookEntry::command(Some(hook.to_string()), handler("test::h"))
    }

    #[test]
    fn test_duplicate_command_fails() {
        let registry = HookRegistry::new();
        registry
            .register_command(Some("google"), handler("a::f"), HandlerOptions::default(), None)
            .unwrap();

        let err = registry
            .register_command(Some("google"), handler("a::g"), HandlerOptions::default(), None)
            .unwrap_err();
        assert_eq!(
            err,
            RegistrationError::DuplicateHook {
                hook: "google".to_string()
            }
        );

        registry
            .register_command(Some("weather"), handler("a::w"), HandlerOptions::default(), None)
            .unwrap();
        assert_eq!(registry.command_count(), 2);
    }

    #[test]
    fn test_hook_inferred_from_handler_name() {
        let registry = HookRegistry::new();
        let reg = registry
            .register_command(None, handler("bot::plugins::google"), HandlerOptions::default(), None)
            .unwrap();
        assert_eq!(reg.hook(), "google");

        let err = registry
            .register_command(None, handler("bot::plugins::google"), HandlerOptions::default(), None)
            .unwrap_err();
        assert!(matches!(err, RegistrationError::DuplicateHook { .. }));
    }

    #[test]
    fn test_closure_name_cannot_be_inferred() {
        let err = infer_hook("bot::main::{{closure}}").unwrap_err();
        assert!(matches!(err, RegistrationError::UnnamedHandler { .. }));
    }

    #[test]
    fn test_invalid_hook_rejected() {
        let registry = HookRegistry::new();
        let err = registry
            .register_command(Some("two words"), handler("a::f"), HandlerOptions::default(), None)
            .unwrap_err();
        assert!(matches!(err, RegistrationError::InvalidHook { .. }));
    }

    #[test]
    fn test_event_hook_must_be_a_verb() {
        let registry = HookRegistry::new();
        for hook in ["join", "Join", "001"] {
            let err = registry
                .register_subscription(hook, handler("a::j"), HandlerOptions::default(), None)
                .unwrap_err();
            assert!(matches!(err, RegistrationError::InvalidHook { .. }), "{hook}");
        }
        assert_eq!(registry.subscription_count(), 0);
    }

    #[test]
    fn test_subscriptions_keep_registration_order() {
        let registry = HookRegistry::new();
        for name in ["a::first", "a::second", "a::third"] {
            registry
                .register_subscription("JOIN", handler(name), HandlerOptions::default(), None)
                .unwrap();
        }
        // Duplicate handlers are fine for events.
        registry
            .register_subscription("JOIN", handler("a::first"), HandlerOptions::default(), None)
            .unwrap();

        let names: Vec<_> = registry
            .lookup_subscriptions("JOIN")
            .iter()
            .map(|r| r.handler().name().to_string())
            .collect();
        assert_eq!(names, ["a::first", "a::second", "a::third", "a::first"]);
        assert!(registry.lookup_subscriptions("PART").is_empty());
    }

    #[test]
    fn test_replace_unit_swaps_registrations() {
        let registry = HookRegistry::new();
        let unit = UnitId::from("plugin_foo");

        registry
            .replace_unit(&unit, vec![command("foo"), HookEntry::event("JOIN", handler("a::j"))])
            .unwrap();
        assert_eq!(registry.command_hooks(), ["foo"]);
        assert_eq!(registry.subscription_count(), 1);

        registry.replace_unit(&unit, vec![command("bar")]).unwrap();
        assert_eq!(registry.command_hooks(), ["bar"]);
        assert_eq!(registry.subscription_count(), 0);
    }

    #[test]
    fn test_replace_unit_conflict_keeps_old_entries() {
        let registry = HookRegistry::new();
        registry
            .register_command(Some("taken"), handler("a::t"), HandlerOptions::default(), None)
            .unwrap();

        let unit = UnitId::from("plugin_foo");
        registry.replace_unit(&unit, vec![command("foo")]).unwrap();

        let err = registry
            .replace_unit(&unit, vec![command("foo"), command("taken")])
            .unwrap_err();
        assert!(matches!(err, RegistrationError::DuplicateHook { hook } if hook == "taken"));

        let err = registry
            .replace_unit(&unit, vec![command("x"), command("x")])
            .unwrap_err();
        assert!(matches!(err, RegistrationError::DuplicateHook { .. }));

        assert_eq!(registry.command_hooks(), ["taken", "foo"]);
    }

    #[test]
    fn test_remove_unit_and_help() {
        let registry = HookRegistry::new();
        let unit = UnitId::from("u");
        registry
            .replace_unit(
                &unit,
                vec![command("foo").with_help(Some("does foo".to_string()))],
            )
            .unwrap();
        assert_eq!(registry.help("foo").as_deref(), Some("does foo"));

        assert_eq!(registry.remove_unit(&unit), 1);
        assert!(registry.help("foo").is_none());
        assert!(!registry.unregister_command("foo"));
    }
}
