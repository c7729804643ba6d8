//! Configuration loader using figment.
//!
//! # Configuration Priority (lowest to highest)
//!
//! 1. Built-in defaults
//! 2. Profile-specific config file (`kaa.{profile}.toml`)
//! 3. Main config file (`kaa.toml` or `config.toml`)
//! 4. Environment variables (`KAA_*`)
//! 5. Programmatic overrides
//!
//! # Environment Variable Mapping
//!
//! Environment variables are mapped using the `KAA_` prefix with `__` as separator:
//!
//! - `KAA_NICK=Kaa2` → `nick = "Kaa2"`
//! - `KAA_DISPATCH__PREFIX=!` → `dispatch.prefix = "!"`
//! - `KAA_LOGGING__LEVEL=debug` → `logging.level = "debug"`
//!
//! # Example
//!
//! ```rust,ignore
//! use kaa_runtime::config::ConfigLoader;
//!
//! let config = ConfigLoader::new()
//!     .profile("production")
//!     .set("dispatch.prefix", "!")
//!     .load()?;
//! ```

use std::path::{Path, PathBuf};

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::Serialize;
use tracing::{debug, info, trace, warn};

use super::error::{ConfigError, ConfigResult};
use super::schema::BotConfig;
use super::validation::validate_config;

const CONFIG_FILE_NAMES: [&str; 2] = ["kaa.toml", "config.toml"];

/// Configuration profile for environment-specific settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Profile {
    #[default]
    Development,
    Production,
    Custom(String),
}

impl Profile {
    /// Returns the profile name as a string.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
            Self::Custom(name) => name,
        }
    }

    /// Parses a profile name, accepting `dev` and `prod` shorthands.
    pub fn parse(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            "development" | "dev" => Self::Development,
            other => Self::Custom(other.to_string()),
        }
    }

    /// Reads `KAA_PROFILE`, defaulting to development.
    pub fn from_env() -> Self {
        std::env::var("KAA_PROFILE")
            .map(|p| Self::parse(&p))
            .unwrap_or_default()
    }
}

impl std::fmt::Display for Profile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Configuration loader with figment-based multi-source support.
pub struct ConfigLoader {
    overrides: Figment,
    profile: Profile,
    search_paths: Vec<PathBuf>,
    load_env: bool,
    config_file: Option<PathBuf>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Creates a new configuration loader with defaults.
    pub fn new() -> Self {
        Self {
            overrides: Figment::new(),
            profile: Profile::from_env(),
            search_paths: Vec::new(),
            load_env: true,
            config_file: None,
        }
    }

    /// Sets the configuration profile.
    pub fn profile(mut self, profile: impl AsRef<str>) -> Self {
        self.profile = Profile::parse(profile.as_ref());
        self
    }

    /// Adds a search path for configuration files.
    ///
    /// Without explicit search paths the current directory and
    /// `<user config dir>/kaa` are searched.
    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.search_paths.push(path.as_ref().to_path_buf());
        self
    }

    /// Loads exactly this file instead of searching.
    pub fn file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_file = Some(path.as_ref().to_path_buf());
        self
    }

    /// Enables loading environment variables (default: true).
    pub fn with_env(mut self) -> Self {
        self.load_env = true;
        self
    }

    /// Disables loading environment variables.
    pub fn without_env(mut self) -> Self {
        self.load_env = false;
        self
    }

    /// Overrides a single (dotted) key, e.g. `set("dispatch.prefix", "!")`.
    pub fn set<T: Serialize>(mut self, key: &str, value: T) -> Self {
        self.overrides = self.overrides.merge(Serialized::default(key, value));
        self
    }

    /// Overrides everything with `config`.
    pub fn merge(mut self, config: BotConfig) -> Self {
        self.overrides = self.overrides.merge(Serialized::defaults(config));
        self
    }

    /// Loads, extracts and validates the configuration.
    pub fn load(self) -> ConfigResult<BotConfig> {
        let profile = self.profile.clone();
        let figment = self.build_figment()?;

        let config: BotConfig = figment.extract()?;
        validate_config(&config)?;

        debug!(
            profile = %profile,
            server = %config.server,
            nick = %config.nick,
            plugins = config.plugins.len(),
            "Configuration loaded successfully"
        );

        Ok(config)
    }

    fn build_figment(self) -> ConfigResult<Figment> {
        let mut figment = Figment::from(Serialized::defaults(BotConfig::default()));

        if let Some(path) = &self.config_file {
            if !path.exists() {
                return Err(ConfigError::FileNotFound(path.clone()));
            }
            info!(path = %path.display(), "Loading configuration file");
            figment = figment.merge(Toml::file(path));
        } else {
            figment = self.load_config_files(figment);
        }

        if self.load_env {
            trace!("Loading environment variables with KAA_ prefix");
            figment = figment.merge(
                Env::prefixed("KAA_")
                    .ignore(&["PROFILE"])
                    .split("__"),
            );
        }

        Ok(figment.merge(self.overrides))
    }

    fn resolve_search_paths(&self) -> Vec<PathBuf> {
        if !self.search_paths.is_empty() {
            return self.search_paths.clone();
        }

        let mut paths = Vec::new();
        if let Ok(cwd) = std::env::current_dir() {
            paths.push(cwd);
        }
        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("kaa"));
        }
        paths
    }

    /// Merges the first base file found, preceded by its profile variant.
    fn load_config_files(&self, mut figment: Figment) -> Figment {
        for search_path in self.resolve_search_paths() {
            for base_name in CONFIG_FILE_NAMES {
                let Some((stem, ext)) = base_name.rsplit_once('.') else {
                    continue;
                };

                let profile_path =
                    search_path.join(format!("{stem}.{}.{ext}", self.profile.as_str()));
                if profile_path.exists() {
                    debug!(path = %profile_path.display(), "Loading profile-specific config");
                    figment = figment.merge(Toml::file(&profile_path));
                }

                let base_path = search_path.join(base_name);
                if base_path.exists() {
                    info!(path = %base_path.display(), "Loading configuration file");
                    return figment.merge(Toml::file(&base_path));
                }
            }
        }

        warn!("No configuration file found, using defaults");
        figment
    }
}

/// Loads the configuration from the default locations.
pub fn load_config() -> ConfigResult<BotConfig> {
    ConfigLoader::new().load()
}

/// Loads the configuration from a specific file, with env overrides.
pub fn load_config_from_file(path: impl AsRef<Path>) -> ConfigResult<BotConfig> {
    ConfigLoader::new().file(path).load()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn loader(dir: &Path) -> ConfigLoader {
        ConfigLoader::new()
            .profile("development")
            .search_path(dir)
            .without_env()
    }

    #[test]
    fn test_defaults_without_files() {
        let dir = tempfile::tempdir().unwrap();
        let config = loader(dir.path()).load().unwrap();

        assert_eq!(config.server, "irc.voxinfinitus.net");
        assert_eq!(config.port, 6697);
        assert!(config.ssl);
        assert_eq!(config.nick, "Kaa");
        assert_eq!(config.channels, ["#voxinfinitus"]);
        assert_eq!(config.dispatch.prefix, ".");
        assert_eq!(config.dispatch.line_limit, 400);
        assert_eq!(config.reload.interval_ms, 1000);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_file_and_profile_layering() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("kaa.toml"),
            "nick = \"Kaa2\"\nchannels = [\"#rust\"]\n\n[dispatch]\nprefix = \"!\"\nmode = \"sequential\"\n",
        )
        .unwrap();
        fs::write(
            dir.path().join("kaa.production.toml"),
            "nick = \"ProdKaa\"\nport = 7000\n",
        )
        .unwrap();

        let config = loader(dir.path()).load().unwrap();
        assert_eq!(config.nick, "Kaa2");
        assert_eq!(config.channels, ["#rust"]);
        assert_eq!(config.dispatch.prefix, "!");
        assert_eq!(config.dispatch.mode, kaa_framework::InvocationMode::Sequential);

        let config = loader(dir.path()).profile("prod").load().unwrap();
        assert_eq!(config.port, 7000);
        assert_eq!(config.nick, "Kaa2", "base file wins over the profile file");
    }

    #[test]
    fn test_overrides_win() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("config.toml"), "[dispatch]\nprefix = \"!\"\n").unwrap();

        let config = loader(dir.path()).set("dispatch.prefix", "~").load().unwrap();
        assert_eq!(config.dispatch.prefix, "~");
    }

    #[test]
    fn test_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.toml");
        assert!(matches!(
            ConfigLoader::new().without_env().file(&missing).load(),
            Err(ConfigError::FileNotFound(path)) if path == missing
        ));

        let path = dir.path().join("bot.toml");
        fs::write(&path, "plugins = [\"plugins/hello.toml\"]\n").unwrap();
        let config = ConfigLoader::new().without_env().file(&path).load().unwrap();
        assert_eq!(config.plugins, [PathBuf::from("plugins/hello.toml")]);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("kaa.toml"), "[dispatch]\nprefix = \"!!\"\n").unwrap();
        assert!(matches!(
            loader(dir.path()).load(),
            Err(ConfigError::ValidationError { .. })
        ));

        fs::write(dir.path().join("kaa.toml"), "port = \"not a port\"\n").unwrap();
        assert!(matches!(
            loader(dir.path()).load(),
            Err(ConfigError::ParseError(_))
        ));
    }

    #[test]
    fn test_profile_parse() {
        assert_eq!(Profile::parse("prod"), Profile::Production);
        assert_eq!(Profile::parse("DEV"), Profile::Development);
        assert_eq!(Profile::parse("staging"), Profile::Custom("staging".to_string()));
    }
}
