//! CLI configuration.
//!
//! Settings come from an optional TOML file, then the environment, then
//! command-line overrides:
//!
//! ```toml
//! [store]
//! backend = "http"            # or "dir"
//! base_url = "https://carelease.blob.core.windows.net/boards/"
//! dir = "/srv/firmware"       # for backend = "dir"
//! timeout_secs = 5
//!
//! [retry]
//! max_attempts = 3
//! initial_delay_ms = 200
//! max_delay_ms = 5000
//! ```

use crate::cli::CliError;
use crate::retry::RetryConfig;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Environment variable naming the config file.
pub const CONFIG_ENV: &str = "FWREL_CONFIG";
/// Environment variable overriding the blob container URL.
pub const BLOB_URL_ENV: &str = "FWREL_BLOB_URL";
/// Environment variable holding the container's SAS query string.
pub const QUERY_STRING_ENV: &str = "AZURE_BLOB_QUERYSTRING";
/// Default blob container.
pub const DEFAULT_BASE_URL: &str = "https://carelease.blob.core.windows.net/boards/";

/// Blob store backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Remote container over HTTP.
    #[default]
    Http,
    /// Local directory.
    Dir,
}

/// `[store]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreConfig {
    /// Which backend to use.
    pub backend: StoreBackend,
    /// Container URL, with trailing slash.
    pub base_url: String,
    /// Directory for the `dir` backend.
    pub dir: Option<PathBuf>,
    /// Per-request timeout.
    pub timeout_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Http,
            base_url: DEFAULT_BASE_URL.to_string(),
            dir: None,
            timeout_secs: 5,
        }
    }
}

impl StoreConfig {
    /// Per-request timeout as a [`Duration`].
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// `[retry]` section, applied when a manifest save loses a race.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetrySettings {
    /// Total attempts including the first.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub initial_delay_ms: u64,
    /// Upper bound on the delay between retries.
    pub max_delay_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 200,
            max_delay_ms: 5000,
        }
    }
}

impl RetrySettings {
    /// Backoff parameters for [`crate::retry::with_retry`].
    #[must_use]
    pub fn to_retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_attempts: self.max_attempts.max(1),
            initial_delay: Duration::from_millis(self.initial_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
            ..RetryConfig::default()
        }
    }
}

/// Complete CLI configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FwrelConfig {
    /// Blob store settings.
    pub store: StoreConfig,
    /// Conflict retry settings.
    pub retry: RetrySettings,
}

impl FwrelConfig {
    /// Parses a TOML document. Missing keys take their defaults.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for malformed TOML, unknown keys or a
    /// zero `store.timeout_secs`.
    pub fn from_toml_str(contents: &str) -> Result<Self, CliError> {
        let config: Self = toml::from_str(contents).map_err(|e| {
            CliError::config_with_help(
                format!("Invalid configuration: {e}"),
                "See `fwrel --help` for the supported [store] and [retry] keys",
            )
        })?;
        if config.store.timeout_secs == 0 {
            return Err(CliError::config_with_help(
                "Invalid configuration: store.timeout_secs must be at least 1",
                "Set a per-request timeout in seconds, e.g. timeout_secs = 5",
            ));
        }
        Ok(config)
    }

    /// Default config file location, `<config dir>/fwrel/config.toml`.
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("fwrel").join("config.toml"))
    }

    /// Loads the config file.
    ///
    /// An explicit `path` must exist. Without one, the default location is
    /// used if present, otherwise all defaults apply.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the file cannot be read or parsed.
    pub fn load(path: Option<&Path>) -> Result<Self, CliError> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => match Self::default_path().filter(|p| p.is_file()) {
                Some(path) => path,
                None => {
                    debug!("No config file, using defaults");
                    return Ok(Self::default());
                }
            },
        };

        debug!(path = %path.display(), "Loading config");
        let contents = std::fs::read_to_string(&path).map_err(|e| {
            CliError::config_with_help(
                format!("Failed to read config {}: {e}", path.display()),
                format!("Check the --config path or unset {CONFIG_ENV}"),
            )
        })?;
        Self::from_toml_str(&contents)
    }

    /// Applies environment overrides.
    pub fn apply_env(&mut self) {
        if let Ok(url) = std::env::var(BLOB_URL_ENV)
            && !url.is_empty()
        {
            self.store.base_url = url;
        }
    }

    /// Selects the directory backend rooted at `dir`.
    #[must_use]
    pub fn with_store_dir(mut self, dir: Option<PathBuf>) -> Self {
        if let Some(dir) = dir {
            self.store.backend = StoreBackend::Dir;
            self.store.dir = Some(dir);
        }
        self
    }

    /// File, then environment, then `--store-dir`.
    ///
    /// # Errors
    ///
    /// See [`FwrelConfig::load`].
    pub fn resolve(path: Option<&Path>, store_dir: Option<PathBuf>) -> Result<Self, CliError> {
        let mut config = Self::load(path)?;
        config.apply_env();
        Ok(config.with_store_dir(store_dir))
    }
}

/// The container credential from [`QUERY_STRING_ENV`].
#[must_use]
pub fn query_string_from_env() -> Option<SecretString> {
    std::env::var(QUERY_STRING_ENV)
        .ok()
        .filter(|value| !value.is_empty())
        .map(SecretString::from)
}
