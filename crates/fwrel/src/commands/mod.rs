//! Command implementations.
//!
//! Each `execute_*` function returns the text to print on stdout; the binary
//! does the printing.

pub mod pcb_file;
pub mod promote;
pub mod register;
pub mod stable;
pub mod staging;

use crate::cli::{Cli, CliError, Commands, OkEnvelope};
use crate::config::{FwrelConfig, QUERY_STRING_ENV, StoreBackend, query_string_from_env};
use crate::http::HttpTransport;
use crate::retry::RetryConfig;
use fwrel_release::{BlobTransport, DirTransport};
use serde::Serialize;
use std::fmt::Display;
use tracing::debug;

/// Resolved settings shared by the store-backed commands.
#[derive(Debug, Clone)]
pub struct CommandContext {
    /// Effective configuration.
    pub config: FwrelConfig,
    /// Emit JSON envelopes instead of text.
    pub json: bool,
}

impl CommandContext {
    /// Creates a context.
    #[must_use]
    pub const fn new(config: FwrelConfig, json: bool) -> Self {
        Self { config, json }
    }

    /// Conflict retry parameters.
    #[must_use]
    pub fn retry(&self) -> RetryConfig {
        self.config.retry.to_retry_config()
    }

    /// Opens the configured blob store.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when the backend is missing what it
    /// needs (a directory, or the container credential).
    pub fn open_transport(&self) -> Result<Box<dyn BlobTransport>, CliError> {
        open_transport(&self.config)
    }
}

/// Opens the blob store described by `config`.
///
/// # Errors
///
/// See [`CommandContext::open_transport`].
pub fn open_transport(config: &FwrelConfig) -> Result<Box<dyn BlobTransport>, CliError> {
    let store = &config.store;
    match store.backend {
        StoreBackend::Dir => {
            let dir = store.dir.clone().ok_or_else(|| {
                CliError::config_with_help(
                    "The dir backend needs a directory",
                    "Pass --store-dir or set store.dir in the config file",
                )
            })?;
            debug!(dir = %dir.display(), "Using directory blob store");
            Ok(Box::new(DirTransport::new(dir)))
        }
        StoreBackend::Http => {
            let query_string = query_string_from_env().ok_or_else(|| {
                CliError::config_with_help(
                    format!("{QUERY_STRING_ENV} is not set"),
                    format!("Export the container's SAS query string as {QUERY_STRING_ENV}"),
                )
            })?;
            debug!(base_url = %store.base_url, "Using HTTP blob store");
            let transport = HttpTransport::new(&store.base_url, query_string, store.timeout())
                .map_err(|e| CliError::config(format!("Failed to create HTTP client: {e}")))?;
            Ok(Box::new(transport))
        }
    }
}

/// Formats `value` as text, or as an [`OkEnvelope`] in JSON mode.
///
/// # Errors
///
/// Returns a configuration error if JSON serialization fails.
pub fn render<T: Serialize + Display>(value: &T, json: bool) -> Result<String, CliError> {
    if json {
        serde_json::to_string_pretty(&OkEnvelope::new(value))
            .map_err(|e| CliError::config(format!("Failed to serialize output: {e}")))
    } else {
        Ok(value.to_string().trim_end().to_string())
    }
}

/// Runs the parsed command line.
///
/// # Errors
///
/// Returns the command's error, already mapped to its exit-code category.
pub fn run(cli: &Cli) -> Result<String, CliError> {
    let context = || -> Result<CommandContext, CliError> {
        let config = FwrelConfig::resolve(cli.config.as_deref(), cli.store_dir.clone())?;
        Ok(CommandContext::new(config, cli.json))
    };

    match &cli.command {
        Commands::Register {
            pcb_file,
            pcb_versions,
            module,
        } => register::execute_register(&context()?, pcb_file, pcb_versions, module),
        Commands::Promote {
            current,
            breaking,
            fw_version,
            module,
            force_latest,
            artifact,
            dry_run,
        } => promote::execute_promote(
            &context()?,
            &promote::PromoteArgs {
                current,
                breaking,
                fw_version,
                module,
                force_latest: *force_latest,
                artifact: artifact.as_deref(),
                dry_run: *dry_run,
            },
        ),
        Commands::Stable {
            current,
            breaking,
            module,
            target_staging_release,
            dry_run,
        } => stable::execute_stable(
            &context()?,
            &stable::StableArgs {
                current,
                breaking,
                module,
                target: target_staging_release,
                dry_run: *dry_run,
            },
        ),
        Commands::Staging { module } => staging::execute_staging(&context()?, module.as_deref()),
        Commands::PcbFile { file, field, part } => {
            pcb_file::execute_pcb_file(file, (*field).into(), (*part).into(), cli.json)
        }
    }
}

/// Strips a leading `v`/`V` from a firmware version argument.
#[must_use]
pub fn strip_version_prefix(version: &str) -> &str {
    version.trim().trim_start_matches(['v', 'V'])
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_strip_version_prefix() {
        assert_eq!(strip_version_prefix("v2.0.0"), "2.0.0");
        assert_eq!(strip_version_prefix("V1.4.1"), "1.4.1");
        assert_eq!(strip_version_prefix("1.0.0"), "1.0.0");
    }

    #[test]
    fn test_dir_backend_requires_dir() {
        let mut config = FwrelConfig::default();
        config.store.backend = StoreBackend::Dir;
        let Err(err) = open_transport(&config) else {
            panic!("expected a configuration error");
        };
        assert!(matches!(err, CliError::Config { .. }));
    }

    #[test]
    fn test_dir_backend_opens() {
        let temp = TempDir::new().unwrap();
        let config = FwrelConfig::default().with_store_dir(Some(temp.path().to_path_buf()));
        let transport = open_transport(&config).unwrap();
        assert_eq!(transport.name(), "dir");
    }

    #[test]
    fn test_http_backend_requires_credential() {
        temp_env::with_var_unset(QUERY_STRING_ENV, || {
            let Err(err) = open_transport(&FwrelConfig::default()) else {
                panic!("expected a configuration error");
            };
            assert!(err.to_string().contains(QUERY_STRING_ENV));
        });
    }

    #[test]
    fn test_render_json_envelope() {
        let out = render(&"hello", true).unwrap();
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["status"], "ok");
        assert_eq!(value["data"], "hello");
    }
}
