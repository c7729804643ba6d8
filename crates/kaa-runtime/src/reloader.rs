//! Live reload of source units.
//!
//! The [`LiveReloader`] polls the modification time of every tracked unit's
//! file. When a time advances the unit is loaded again and its registrations
//! are swapped in one registry write via [`HookRegistry::replace_unit`].
//!
//! A revision that fails to load is logged and skipped: the unit's previous
//! registrations keep answering, and the failed revision is not retried until
//! the file changes again.
//!
//! A unit tracked before its file exists is loaded once the file appears.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use kaa_core::{HookRegistry, UnitId};
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::error::{ReloadError, ReloadResult};
use crate::source::BoxedSource;

/// Default interval between modification time checks.
pub const DEFAULT_RELOAD_INTERVAL: Duration = Duration::from_secs(1);

/// What one polling pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReloadReport {
    /// Units whose file could be stat'ed.
    pub checked: usize,
    /// Units reloaded successfully.
    pub reloaded: usize,
    /// Units whose new revision was rejected.
    pub failed: usize,
}

struct TrackedUnit {
    unit: BoxedSource,
    watched: Option<PathBuf>,
    modified: Option<SystemTime>,
}

impl TrackedUnit {
    fn new(unit: BoxedSource) -> Self {
        let watched = resolve_watch_path(unit.path());
        let modified = watched.as_deref().and_then(modified_time);
        Self {
            unit,
            watched,
            modified,
        }
    }

    /// Stats the watched file. Returns the new time if it advanced, or if
    /// the file was first seen after tracking started.
    fn check(&mut self) -> Option<Option<SystemTime>> {
        if self.watched.is_none() {
            self.watched = resolve_watch_path(self.unit.path());
        }

        let Some(mtime) = self.watched.as_deref().and_then(modified_time) else {
            debug!(unit = %self.unit.id(), path = %self.unit.path().display(), "Cannot stat source unit, skipping");
            return None;
        };

        match self.modified {
            Some(previous) if mtime <= previous => Some(None),
            _ => Some(Some(mtime)),
        }
    }
}

/// Watches source units and swaps their registrations when they change.
pub struct LiveReloader {
    registry: Arc<HookRegistry>,
    units: Mutex<Vec<TrackedUnit>>,
    interval: Duration,
}

impl LiveReloader {
    /// Creates a reloader that updates `registry`.
    pub fn new(registry: Arc<HookRegistry>) -> Self {
        Self {
            registry,
            units: Mutex::new(Vec::new()),
            interval: DEFAULT_RELOAD_INTERVAL,
        }
    }

    /// Sets the polling interval.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Loads `unit`, registers its entries and starts tracking it.
    ///
    /// Unlike a reload, a failure here is returned and the unit is not
    /// tracked.
    pub fn load(&self, unit: BoxedSource) -> ReloadResult<usize> {
        let count = self.apply(&unit)?;
        self.track(unit);
        Ok(count)
    }

    /// Starts tracking `unit` without loading it.
    ///
    /// Its current modification time is recorded, so only later changes
    /// trigger a reload. Tracking the same id again replaces the old entry.
    pub fn track(&self, unit: BoxedSource) {
        let tracked = TrackedUnit::new(unit);
        debug!(
            unit = %tracked.unit.id(),
            watched = ?tracked.watched,
            "Tracking source unit"
        );

        let mut units = self.units.lock();
        units.retain(|t| t.unit.id() != tracked.unit.id());
        units.push(tracked);
    }

    /// Stops tracking a unit. Its registrations stay.
    pub fn untrack(&self, id: &UnitId) -> bool {
        let mut units = self.units.lock();
        let before = units.len();
        units.retain(|t| t.unit.id() != id);
        units.len() != before
    }

    /// Ids of every tracked unit.
    pub fn tracked(&self) -> Vec<UnitId> {
        self.units.lock().iter().map(|t| t.unit.id().clone()).collect()
    }

    /// Checks every tracked unit once and reloads the ones that changed.
    pub fn poll_once(&self) -> ReloadReport {
        let mut report = ReloadReport::default();
        let mut units = self.units.lock();

        for tracked in units.iter_mut() {
            let Some(change) = tracked.check() else {
                continue;
            };
            report.checked += 1;

            let Some(mtime) = change else { continue };
            tracked.modified = Some(mtime);

            match self.apply(&tracked.unit) {
                Ok(_) => report.reloaded += 1,
                Err(err) => {
                    error!(
                        unit = %tracked.unit.id(),
                        error = %err,
                        "Reload failed, keeping previous registrations"
                    );
                    report.failed += 1;
                }
            }
        }

        report
    }

    /// Reloads one tracked unit now, whatever its modification time.
    pub fn reload(&self, id: &UnitId) -> ReloadResult<usize> {
        let mut units = self.units.lock();
        let tracked = units
            .iter_mut()
            .find(|t| t.unit.id() == id)
            .ok_or_else(|| ReloadError::UnknownUnit(id.clone()))?;

        if let Some(mtime) = tracked.watched.as_deref().and_then(modified_time) {
            tracked.modified = Some(mtime);
        }
        self.apply(&tracked.unit)
    }

    /// Polls every interval until `cancel` fires.
    ///
    /// Each pass stats, reads and parses files, so it runs on the blocking
    /// thread pool.
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        info!(interval = ?self.interval, units = self.units.lock().len(), "Live reload started");
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let reloader = Arc::clone(&self);
                    match tokio::task::spawn_blocking(move || reloader.poll_once()).await {
                        Ok(report) if report.reloaded + report.failed > 0 => {
                            debug!(?report, "Reload pass finished");
                        }
                        Ok(_) => {}
                        Err(err) => error!(error = %err, "Reload pass panicked"),
                    }
                }
            }
        }
        info!("Live reload stopped");
    }

    fn apply(&self, unit: &BoxedSource) -> ReloadResult<usize> {
        let entries = unit.load()?;
        let count = self.registry.replace_unit(unit.id(), entries)?;
        info!(unit = %unit.id(), registrations = count, "Source unit loaded");
        Ok(count)
    }
}

impl std::fmt::Debug for LiveReloader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveReloader")
            .field("units", &self.tracked())
            .field("interval", &self.interval)
            .finish()
    }
}

/// The nearest existing file at or above `path`.
fn resolve_watch_path(path: &Path) -> Option<PathBuf> {
    path.ancestors()
        .find(|candidate| candidate.is_file())
        .map(Path::to_path_buf)
}

fn modified_time(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{ScriptPlugin, SourceUnit};
    use kaa_core::{InboundLine, Invocation, MemoryClient};
    use kaa_framework::{DispatchEngine, EngineConfig, InvocationMode, Invoker, InvokerConfig};

    fn write_plugin(path: &Path, body: &str, age: u64) {
        std::fs::write(path, body).unwrap();
        let mtime = SystemTime::now() + Duration::from_secs(age);
        std::fs::File::options()
            .write(true)
            .open(path)
            .unwrap()
            .set_modified(mtime)
            .unwrap();
    }

    fn hello(reply: &str) -> String {
        format!("[[command]]\nhook = \"hello\"\nreply = \"{reply}\"\n")
    }

    async fn ask(registry: &HookRegistry, hook: &str) -> Option<String> {
        let registration = registry
            .lookup_commands()
            .into_iter()
            .find(|r| r.hook() == hook)?;
        let line = Arc::new(InboundLine::privmsg("alice", "#rust", format!(".{hook}")));
        registration
            .handler()
            .call(Some(Invocation::new(line, hook, "")))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_changed_file_replaces_command() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hello.toml");
        write_plugin(&path, &hello("v1"), 0);

        let registry = Arc::new(HookRegistry::new());
        let reloader = LiveReloader::new(Arc::clone(&registry));
        reloader.load(Arc::new(ScriptPlugin::new(&path))).unwrap();
        assert_eq!(ask(&registry, "hello").await.as_deref(), Some("v1"));

        assert_eq!(reloader.poll_once().reloaded, 0);

        write_plugin(&path, &hello("v2"), 10);
        let report = reloader.poll_once();
        assert_eq!(report.reloaded, 1);
        assert_eq!(registry.command_count(), 1);
        assert_eq!(ask(&registry, "hello").await.as_deref(), Some("v2"));
    }

    /// Dispatches `text` from `#rust` and returns the replies sent.
    async fn dispatch(registry: &Arc<HookRegistry>, text: &str) -> Vec<String> {
        let client = Arc::new(MemoryClient::new());
        let invoker = Invoker::new(client.clone(), InvokerConfig::default());
        let engine = DispatchEngine::new(
            Arc::clone(registry),
            invoker,
            EngineConfig {
                mode: InvocationMode::Sequential,
                ..Default::default()
            },
        );
        engine
            .dispatch_line(Arc::new(InboundLine::privmsg("alice", "#rust", text)))
            .await;
        client.sent().into_iter().map(|m| m.text).collect()
    }

    #[tokio::test]
    async fn test_broken_revision_keeps_old_command() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hello.toml");
        write_plugin(&path, &hello("v1"), 0);

        let registry = Arc::new(HookRegistry::new());
        let reloader = LiveReloader::new(Arc::clone(&registry));
        reloader.load(Arc::new(ScriptPlugin::new(&path))).unwrap();

        write_plugin(&path, "[[command]\nthis is not toml", 10);
        let report = reloader.poll_once();
        assert_eq!(report.failed, 1);
        assert_eq!(dispatch(&registry, ".hello").await, ["v1"]);

        let report = reloader.poll_once();
        assert_eq!(report, ReloadReport { checked: 1, ..Default::default() });

        write_plugin(&path, &hello("v3"), 20);
        assert_eq!(reloader.poll_once().reloaded, 1);
        assert_eq!(ask(&registry, "hello").await.as_deref(), Some("v3"));
    }

    #[tokio::test]
    async fn test_explicit_reload_and_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hello.toml");
        write_plugin(&path, &hello("v1"), 0);

        let registry = Arc::new(HookRegistry::new());
        let reloader = LiveReloader::new(Arc::clone(&registry));
        let plugin = Arc::new(ScriptPlugin::new(&path));
        let id = plugin.id().clone();
        reloader.load(plugin).unwrap();

        std::fs::write(&path, hello("v2")).unwrap();
        assert_eq!(reloader.reload(&id).unwrap(), 1);
        assert_eq!(ask(&registry, "hello").await.as_deref(), Some("v2"));

        assert!(matches!(
            reloader.reload(&UnitId::new("nope")),
            Err(ReloadError::UnknownUnit(_))
        ));

        std::fs::remove_file(&path).unwrap();
        assert_eq!(reloader.poll_once(), ReloadReport::default());
        assert_eq!(ask(&registry, "hello").await.as_deref(), Some("v2"));
    }

    #[tokio::test]
    async fn test_file_created_after_tracking_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("late.toml");

        let registry = Arc::new(HookRegistry::new());
        let reloader = LiveReloader::new(Arc::clone(&registry));
        reloader.track(Arc::new(ScriptPlugin::new(&path)));
        assert_eq!(reloader.poll_once(), ReloadReport::default());

        std::fs::write(&path, "[[command]]\nhook = \"late\"\nreply = \"here\"\n").unwrap();
        let report = reloader.poll_once();
        assert_eq!(report.reloaded, 1);
        assert_eq!(registry.command_hooks(), ["late"]);

        assert_eq!(reloader.poll_once().reloaded, 0);
        assert_eq!(dispatch(&registry, ".late").await, ["here"]);
    }

    #[tokio::test]
    async fn test_run_reloads_until_cancelled() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hello.toml");
        write_plugin(&path, &hello("v1"), 0);

        let registry = Arc::new(HookRegistry::new());
        let reloader =
            Arc::new(LiveReloader::new(Arc::clone(&registry)).with_interval(Duration::from_millis(5)));
        reloader.load(Arc::new(ScriptPlugin::new(&path))).unwrap();

        let cancel = CancellationToken::new();
        let task = tokio::spawn(Arc::clone(&reloader).run(cancel.clone()));

        write_plugin(&path, &hello("v2"), 10);
        tokio::time::timeout(Duration::from_secs(5), async {
            while dispatch(&registry, ".hello").await != ["v2"] {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("reload did not happen in time");

        cancel.cancel();
        task.await.unwrap();
    }

    #[test]
    fn test_resolve_watch_path_walks_up() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("plugin.toml");
        std::fs::write(&file, "").unwrap();

        assert_eq!(
            resolve_watch_path(&file.join("inner")),
            Some(file.clone())
        );
        assert_eq!(resolve_watch_path(dir.path()), None);
    }
}
