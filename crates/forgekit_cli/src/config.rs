//! Configuration file support for forgekit.
//!
//! Configuration is loaded with the following precedence (highest to lowest):
//! 1. CLI flags (`--provider`, `--host`)
//! 2. Environment variables (prefixed with `FORGEKIT_`, e.g. `FORGEKIT_PROVIDER_TOKEN`)
//! 3. Local config file (./forgekit.toml)
//! 4. XDG config file (~/.config/forgekit/config.toml)
//! 5. Built-in defaults
//!
//! Example config file:
//! ```toml
//! [provider]
//! kind = "stash"          # stash | github | gitlab
//! host = "https://stash.example.com"
//! token = "..."           # or use FORGEKIT_PROVIDER_TOKEN
//! requests_per_second = 5
//! timeout_secs = 30
//!
//! [reconcile]
//! max_retries = 3
//! deadline_secs = 300
//! ```

use std::path::PathBuf;
use std::time::Duration;

use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use directories::ProjectDirs;
use forgekit::platform::{DEFAULT_TIMEOUT_SECS, ProviderConfig, ProviderError, ProviderKind};
use forgekit::retry::{DEFAULT_MAX_RETRIES, RetryConfig};
use serde::Deserialize;
use thiserror::Error;

/// Errors turning the loaded configuration into a provider connection.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(
        "no provider configured: set `kind` under [provider] in forgekit.toml, \
         FORGEKIT_PROVIDER_KIND, or pass --provider"
    )]
    MissingKind,
    #[error(transparent)]
    Provider(#[from] ProviderError),
}

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Which backend to talk to and how.
    pub provider: ProviderSection,
    /// Defaults for the `reconcile` command.
    pub reconcile: ReconcileConfig,
}

/// Provider connection settings.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ProviderSection {
    /// `stash`, `github` or `gitlab`.
    pub kind: Option<String>,
    /// Base URL. Optional for github and gitlab.
    pub host: Option<String>,
    /// API token.
    /// Can also be set via FORGEKIT_PROVIDER_TOKEN environment variable.
    pub token: Option<String>,
    /// Client-side request pacing. 0 disables it.
    pub requests_per_second: Option<u32>,
    pub timeout_secs: u64,
}

impl Default for ProviderSection {
    fn default() -> Self {
        Self {
            kind: None,
            host: None,
            token: None,
            requests_per_second: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

/// Reconcile command defaults.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ReconcileConfig {
    /// Retries after the first attempt for rate-limited or transport failures.
    pub max_retries: usize,
    /// Deadline for a whole manifest run.
    pub deadline_secs: u64,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            deadline_secs: 300,
        }
    }
}

impl ReconcileConfig {
    pub fn retry(&self) -> RetryConfig {
        RetryConfig::default().with_max_retries(self.max_retries)
    }

    pub fn deadline(&self) -> Duration {
        Duration::from_secs(self.deadline_secs)
    }
}

impl Config {
    /// Load configuration using the config crate's layered approach.
    ///
    /// A file that fails to parse is logged and defaults are used instead.
    pub fn load() -> Self {
        let mut builder = ConfigBuilder::builder();

        if let Some(xdg_config) = Self::default_config_path()
            && xdg_config.exists()
        {
            tracing::debug!("Loading config from {:?}", xdg_config);
            builder = builder.add_source(
                File::from(xdg_config)
                    .format(FileFormat::Toml)
                    .required(false),
            );
        }

        let local_config = PathBuf::from("forgekit.toml");
        if local_config.exists() {
            tracing::debug!("Loading config from ./forgekit.toml");
            builder = builder.add_source(
                File::from(local_config)
                    .format(FileFormat::Toml)
                    .required(false),
            );
        }

        // FORGEKIT_PROVIDER_TOKEN -> provider.token
        builder = builder.add_source(
            Environment::with_prefix("FORGEKIT")
                .separator("_")
                .try_parsing(true),
        );

        match builder.build() {
            Ok(settings) => match settings.try_deserialize::<Config>() {
                Ok(config) => config,
                Err(e) => {
                    tracing::warn!("Failed to deserialize config: {}", e);
                    Config::default()
                }
            },
            Err(e) => {
                tracing::warn!("Failed to build config: {}", e);
                Config::default()
            }
        }
    }

    /// Apply command-line overrides.
    pub fn with_overrides(mut self, kind: Option<String>, host: Option<String>) -> Self {
        if kind.is_some() {
            self.provider.kind = kind;
        }
        if host.is_some() {
            self.provider.host = host;
        }
        self
    }

    /// The library-level connection settings.
    pub fn provider_config(&self) -> Result<ProviderConfig, ConfigError> {
        let kind: ProviderKind = self
            .provider
            .kind
            .as_deref()
            .ok_or(ConfigError::MissingKind)?
            .parse()?;
        let mut config = ProviderConfig::new(kind, self.provider.host.clone().unwrap_or_default());
        config.token = self.provider.token.clone();
        config.requests_per_second = self.provider.requests_per_second;
        config.timeout_secs = self.provider.timeout_secs;
        Ok(config)
    }

    /// Get the default config file path.
    pub fn default_config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "forgekit").map(|dirs| dirs.config_dir().join("config.toml"))
    }
}
