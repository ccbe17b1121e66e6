//! Layered configuration loading with figment.
//!
//! Sources, lowest priority first:
//!
//! 1. Built-in defaults
//! 2. Profile file (`astron.{profile}.toml` / `astron.{profile}.yaml`)
//! 3. Main file (`astron.toml` / `astron.yaml`)
//! 4. Environment variables (`ASTRON_*`, `__` separates nesting levels)
//! 5. Programmatic merges
//!
//! `ASTRON_ROUTER__PREFIX=?` sets `router.prefix`, and
//! `ASTRON_LOGGING__LEVEL=debug` sets `logging.level`.
//!
//! The `toml-config` and `yaml-config` features decide which file formats
//! are searched.
//!
//! ```rust,ignore
//! let config = ConfigLoader::new()
//!     .profile("production")
//!     .with_current_dir()
//!     .load()?;
//! ```

use std::path::{Path, PathBuf};

use figment::Figment;
#[cfg(any(feature = "yaml-config", feature = "toml-config"))]
use figment::providers::Format;
#[cfg(feature = "toml-config")]
use figment::providers::Toml;
#[cfg(feature = "yaml-config")]
use figment::providers::Yaml;
use figment::providers::{Env, Serialized};
use tracing::{debug, info, trace, warn};

use super::error::{ConfigError, ConfigResult};
use super::schema::AstronConfig;
use super::validation::validate_config;

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "ASTRON_";

/// Environment variable naming the profile.
pub const PROFILE_ENV: &str = "ASTRON_PROFILE";

/// Directory name under the user config dir.
const APP_DIR: &str = "astron";

/// Configuration profile for environment-specific settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Profile {
    #[default]
    Development,
    Production,
    Custom(String),
}

impl Profile {
    /// Parses a profile name; `prod` and `dev` are accepted.
    pub fn parse(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            "development" | "dev" => Self::Development,
            other => Self::Custom(other.to_string()),
        }
    }

    /// Returns the profile name as a string.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
            Self::Custom(name) => name,
        }
    }

    /// Reads `ASTRON_PROFILE`, defaulting to development.
    pub fn from_env() -> Self {
        std::env::var(PROFILE_ENV)
            .map(|p| Self::parse(&p))
            .unwrap_or_default()
    }
}

impl std::fmt::Display for Profile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Builder for a layered [`AstronConfig`].
pub struct ConfigLoader {
    figment: Figment,
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
    /// A loader with the profile taken from the environment.
    pub fn new() -> Self {
        Self {
            figment: Figment::new(),
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
    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.search_paths.push(path.as_ref().to_path_buf());
        self
    }

    /// Adds the current directory to the search paths.
    pub fn with_current_dir(self) -> Self {
        match std::env::current_dir() {
            Ok(cwd) => self.search_path(cwd),
            Err(_) => self,
        }
    }

    /// Adds `<config_dir>/astron` to the search paths.
    pub fn with_user_config_dir(self) -> Self {
        match dirs::config_dir() {
            Some(dir) => self.search_path(dir.join(APP_DIR)),
            None => self,
        }
    }

    /// Loads exactly this file instead of searching.
    pub fn file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_file = Some(path.as_ref().to_path_buf());
        self
    }

    /// Reads `ASTRON_*` variables (the default).
    pub fn with_env(mut self) -> Self {
        self.load_env = true;
        self
    }

    /// Ignores the environment.
    pub fn without_env(mut self) -> Self {
        self.load_env = false;
        self
    }

    /// Merges a configuration on top of every other source.
    pub fn merge(mut self, config: AstronConfig) -> Self {
        self.figment = self.figment.merge(Serialized::defaults(config));
        self
    }

    /// Loads the configuration without validating it.
    pub fn load(self) -> ConfigResult<AstronConfig> {
        let profile = self.profile.clone();
        let figment = self.build_figment()?;

        let config: AstronConfig = figment.extract().map_err(Box::new)?;

        debug!(
            profile = %profile,
            logging_level = %config.logging.level,
            "Configuration loaded"
        );
        Ok(config)
    }

    /// Loads and validates the configuration.
    pub fn load_validated(self) -> ConfigResult<AstronConfig> {
        let config = self.load()?;
        validate_config(&config)?;
        Ok(config)
    }

    fn build_figment(mut self) -> ConfigResult<Figment> {
        let mut figment = Figment::from(Serialized::defaults(AstronConfig::default()));

        if let Some(path) = self.config_file.take() {
            if !path.exists() {
                return Err(ConfigError::FileNotFound(path));
            }
            info!(path = %path.display(), "Loading configuration file");
            figment = Self::merge_config_file(figment, &path)?;
        } else {
            figment = self.load_config_files(figment);
        }

        if self.load_env {
            trace!(prefix = ENV_PREFIX, "Loading environment variables");
            figment = figment.merge(Env::prefixed(ENV_PREFIX).ignore(&["profile"]).split("__"));
        }

        // Programmatic merges win over everything else.
        Ok(figment.merge(std::mem::take(&mut self.figment)))
    }

    fn merge_config_file(figment: Figment, path: &Path) -> ConfigResult<Figment> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();
        match ext.as_str() {
            #[cfg(feature = "toml-config")]
            "toml" => Ok(figment.merge(Toml::file(path))),
            #[cfg(feature = "yaml-config")]
            "yaml" | "yml" => Ok(figment.merge(Yaml::file(path))),
            _ => Err(ConfigError::UnsupportedFormat(ext)),
        }
    }

    fn resolve_search_paths(&self) -> Vec<PathBuf> {
        if !self.search_paths.is_empty() {
            return self.search_paths.clone();
        }
        let mut paths = Vec::new();
        if let Ok(cwd) = std::env::current_dir() {
            paths.push(cwd);
        }
        if let Some(dir) = dirs::config_dir() {
            paths.push(dir.join(APP_DIR));
        }
        paths
    }

    /// Names of the files searched for, per enabled format.
    fn base_names() -> Vec<&'static str> {
        #[allow(unused_mut)]
        let mut names = Vec::new();
        #[cfg(feature = "toml-config")]
        names.push("astron.toml");
        #[cfg(feature = "yaml-config")]
        names.extend(["astron.yaml", "astron.yml"]);
        names
    }

    /// Merges the profile file and main file from the first search path
    /// that has a main file.
    fn load_config_files(&self, mut figment: Figment) -> Figment {
        for search_path in self.resolve_search_paths() {
            for base_name in Self::base_names() {
                let Some((stem, ext)) = base_name.rsplit_once('.') else {
                    continue;
                };
                let base_path = search_path.join(base_name);
                if !base_path.exists() {
                    continue;
                }

                let profile_path =
                    search_path.join(format!("{stem}.{}.{ext}", self.profile.as_str()));
                if profile_path.exists() {
                    debug!(path = %profile_path.display(), "Loading profile configuration");
                    figment = Self::merge_found(figment, &profile_path);
                }

                info!(path = %base_path.display(), "Loading configuration file");
                return Self::merge_found(figment, &base_path);
            }
        }

        warn!("No configuration file found, using defaults");
        figment
    }

    fn merge_found(figment: Figment, path: &Path) -> Figment {
        match Self::merge_config_file(figment.clone(), path) {
            Ok(merged) => merged,
            Err(_) => figment,
        }
    }
}

/// Loads the configuration from the default locations and validates it.
pub fn load_config() -> ConfigResult<AstronConfig> {
    ConfigLoader::new().load_validated()
}

/// Loads and validates one configuration file, with environment overrides.
pub fn load_config_from_file<P: AsRef<Path>>(path: P) -> ConfigResult<AstronConfig> {
    ConfigLoader::new().file(path).load_validated()
}
