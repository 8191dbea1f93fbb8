use crate::tracing::{LogLevel, TracingFormat};
use clap::{Parser, Subcommand, ValueEnum};
use fwrel_release::{PcbField, VersionPart};
use miette::{Diagnostic, Report};
use serde::{Deserialize, Serialize};
use std::io::{self, Write};
use std::path::PathBuf;
use thiserror::Error;

/// Exit codes for the CLI application
pub const EXIT_OK: i32 = 0;
/// CLI or configuration error exit code
pub const EXIT_CLI: i32 = 2;
/// Rejected release request exit code
pub const EXIT_PRECONDITION: i32 = 3;
/// Blob store failure exit code
pub const EXIT_STORE: i32 = 4;

/// CLI-specific error types with proper exit code mapping
#[derive(Error, Debug, Clone, Diagnostic)]
pub enum CliError {
    /// CLI or configuration error (exit code 2)
    #[error("CLI/configuration error: {message}")]
    #[diagnostic(code(fwrel::cli::config))]
    Config {
        /// The error message
        message: String,
        /// Optional help text
        #[help]
        help: Option<String>,
    },
    /// The request does not fit the manifest (exit code 3)
    #[error("Release rejected: {message}")]
    #[diagnostic(code(fwrel::cli::precondition))]
    Precondition {
        /// The error message
        message: String,
        /// Optional help text
        #[help]
        help: Option<String>,
    },
    /// The blob store failed (exit code 4)
    #[error("Blob store error: {message}")]
    #[diagnostic(code(fwrel::cli::store))]
    Store {
        /// The error message
        message: String,
        /// Optional help text
        #[help]
        help: Option<String>,
    },
}

impl CliError {
    /// Create a new configuration error
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            help: None,
        }
    }

    /// Create a new configuration error with help text
    #[must_use]
    pub fn config_with_help(message: impl Into<String>, help: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            help: Some(help.into()),
        }
    }

    /// Create a new precondition error
    #[must_use]
    pub fn precondition(message: impl Into<String>) -> Self {
        Self::Precondition {
            message: message.into(),
            help: None,
        }
    }

    /// Create a new store error
    #[must_use]
    pub fn store(message: impl Into<String>) -> Self {
        Self::Store {
            message: message.into(),
            help: None,
        }
    }

    /// Add help text to an existing error, returning a new error with the help text set.
    #[must_use]
    pub fn with_help(self, help_text: impl Into<String>) -> Self {
        let help = Some(help_text.into());
        match self {
            Self::Config { message, .. } => Self::Config { message, help },
            Self::Precondition { message, .. } => Self::Precondition { message, help },
            Self::Store { message, .. } => Self::Store { message, help },
        }
    }

    /// Short code used in the JSON error envelope.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Config { .. } => "config",
            Self::Precondition { .. } => "precondition",
            Self::Store { .. } => "store",
        }
    }
}

/// Convert `fwrel_release::Error` to appropriate `CliError` variant.
///
/// - Rejected requests (unknown or unstaged versions, bad input) -> Precondition (exit code 3)
/// - Blob store failures -> Store (exit code 4)
/// - Configuration and local I/O -> Config (exit code 2)
impl From<fwrel_release::Error> for CliError {
    fn from(err: fwrel_release::Error) -> Self {
        use fwrel_release::Error as E;

        let help = Diagnostic::help(&err).map(|h| h.to_string());
        let cli = match &err {
            E::InvalidVersion { .. }
            | E::UnknownVersion { .. }
            | E::TargetNotStaged { .. }
            | E::NotAheadOfStable { .. } => Self::precondition(err.to_string()),
            E::PcbFile { message, path } => {
                let path_str = path
                    .as_ref()
                    .map_or(String::new(), |p| format!(" ({})", p.display()));
                Self::precondition(format!("{message}{path_str}"))
            }
            E::StoreUnavailable { .. }
            | E::StoreTimeout { .. }
            | E::StoreConflict { .. }
            | E::ArtifactNotFound { .. }
            | E::ManifestCorrupt { .. }
            | E::Json(_) => Self::store(err.to_string()),
            // Extract just the message to avoid "Configuration error: Configuration error:"
            E::Config { message, .. } => Self::config(message.clone()),
            E::Io(_) => Self::config(err.to_string()),
        };
        match help {
            Some(h) => cli.with_help(h),
            None => cli,
        }
    }
}

/// Map CLI error to appropriate exit code
#[must_use]
pub const fn exit_code_for(err: &CliError) -> i32 {
    match err {
        CliError::Config { .. } => EXIT_CLI,
        CliError::Precondition { .. } => EXIT_PRECONDITION,
        CliError::Store { .. } => EXIT_STORE,
    }
}

/// Render error appropriately based on JSON flag
pub fn render_error(err: &CliError, json_mode: bool) {
    if json_mode {
        let error_envelope = ErrorEnvelope::new(serde_json::json!({
            "code": err.code(),
            "message": err.to_string()
        }));

        match serde_json::to_string(&error_envelope) {
            Ok(json) => println!("{json}"),
            Err(_) => eprintln!("Error serializing error response"),
        }
    } else {
        let report = Report::new(err.clone());
        eprintln!("{report:?}");
        let _ = io::stderr().flush();
    }
}

/// Success response envelope for JSON output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OkEnvelope<T> {
    /// Status indicator - always "ok" for success
    pub status: &'static str,
    /// The actual data payload
    pub data: T,
}

impl<T> OkEnvelope<T> {
    /// Create a new success envelope
    #[must_use]
    pub const fn new(data: T) -> Self {
        Self { status: "ok", data }
    }
}

/// Error response envelope for JSON output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorEnvelope<E> {
    /// Status indicator - always "error" for failures
    pub status: &'static str,
    /// The error details
    pub error: E,
}

impl<E> ErrorEnvelope<E> {
    /// Create a new error envelope
    #[must_use]
    pub const fn new(error: E) -> Self {
        Self {
            status: "error",
            error,
        }
    }
}

/// PCB version file field selector.
#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum FieldArg {
    /// Newest supported PCB revision
    Latest,
    /// Oldest supported PCB revision
    Breaking,
}

impl From<FieldArg> for PcbField {
    fn from(arg: FieldArg) -> Self {
        match arg {
            FieldArg::Latest => Self::Latest,
            FieldArg::Breaking => Self::Breaking,
        }
    }
}

/// Version component selector.
#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum PartArg {
    /// Major number
    Major,
    /// Minor number
    Minor,
    /// `major.minor`
    Both,
}

impl From<PartArg> for VersionPart {
    fn from(arg: PartArg) -> Self {
        match arg {
            PartArg::Major => Self::Major,
            PartArg::Minor => Self::Minor,
            PartArg::Both => Self::Both,
        }
    }
}

/// Main CLI entry point for fwrel.
///
/// Stages and promotes PCB-versioned firmware releases in blob storage.
#[derive(Parser, Debug)]
#[command(name = "fwrel")]
#[command(about = "Stage and promote PCB-versioned firmware releases")]
#[command(long_about = None)]
#[command(version)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Logging verbosity level.
    #[arg(
        short = 'L',
        long,
        global = true,
        help = "Set logging level",
        default_value = "warn",
        value_enum
    )]
    pub level: LogLevel,

    /// Log output format.
    #[arg(
        long,
        global = true,
        help = "Log output format",
        default_value = "compact",
        value_enum
    )]
    pub log_format: TracingFormat,

    /// Emit JSON envelope instead of text.
    #[arg(long, global = true, help = "Emit JSON envelope instead of text")]
    pub json: bool,

    /// Path to the TOML config file.
    #[arg(
        long,
        global = true,
        env = "FWREL_CONFIG",
        help = "Path to the TOML config file",
        value_name = "PATH"
    )]
    pub config: Option<PathBuf>,

    /// Use a local directory as the blob store.
    #[arg(
        long,
        global = true,
        help = "Use a local directory as the blob store",
        value_name = "DIR"
    )]
    pub store_dir: Option<PathBuf>,
}

/// Available CLI subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Register the PCB versions declared by a PCB version file.
    #[command(about = "Register PCB versions for a module")]
    Register {
        /// PCB version file
        #[arg(help = "PCB version file (missing file registers 0.0)")]
        pcb_file: PathBuf,
        /// Additional PCB versions to register.
        #[arg(
            short = 'P',
            long = "pcb_versions",
            num_args = 0..,
            help = "Additional PCB versions to register",
            value_name = "VERSION"
        )]
        pcb_versions: Vec<String>,
        /// Module name.
        #[arg(short = 'm', long, env = "MODULE_NAME", help = "Module name")]
        module: String,
    },
    /// Release a firmware build to staging, or straight to stable.
    #[command(about = "Release a firmware build to staging")]
    Promote {
        /// PCB version the build targets.
        #[arg(short = 'c', long, help = "Current PCB version")]
        current: String,
        /// Oldest PCB version the build supports.
        #[arg(short = 'b', long, help = "Breaking PCB version")]
        breaking: String,
        /// Firmware version of the build.
        #[arg(long = "fw_version", alias = "fw", help = "Firmware version")]
        fw_version: String,
        /// Module name.
        #[arg(short = 'm', long, help = "Module name")]
        module: String,
        /// Make the build stable immediately.
        #[arg(
            short = 'f',
            long = "force_latest",
            help = "Skip staging and make the build stable"
        )]
        force_latest: bool,
        /// Firmware image to upload.
        #[arg(
            long,
            help = "Firmware image to upload (default: <module>.zip)",
            value_name = "PATH"
        )]
        artifact: Option<PathBuf>,
        /// Print the actions without writing anything.
        #[arg(long, help = "Print the actions without writing anything")]
        dry_run: bool,
    },
    /// Mark a staged build stable.
    #[command(about = "Move a staging release to stable")]
    Stable {
        /// PCB version the staged build was released for.
        #[arg(short = 'c', long, help = "Current PCB version")]
        current: String,
        /// Oldest PCB version the build supports.
        #[arg(short = 'b', long, help = "Breaking PCB version")]
        breaking: String,
        /// Module name.
        #[arg(short = 'm', long, help = "Module name")]
        module: String,
        /// Staged firmware version to promote.
        #[arg(
            short = 't',
            long = "target_staging_release",
            help = "Staged firmware version to make stable"
        )]
        target_staging_release: String,
        /// Print the actions without writing anything.
        #[arg(long, help = "Print the actions without writing anything")]
        dry_run: bool,
    },
    /// List pending staging versions.
    #[command(about = "List staging versions")]
    Staging {
        /// Module name; all modules in the naming map when omitted.
        #[arg(short = 'm', long, help = "Module name (default: every module)")]
        module: Option<String>,
    },
    /// Print one field of a PCB version file.
    #[command(name = "pcb-file", about = "Print a field of a PCB version file")]
    PcbFile {
        /// PCB version file
        file: PathBuf,
        /// Which version to print.
        #[arg(value_enum)]
        field: FieldArg,
        /// Which component(s) to print.
        #[arg(value_enum)]
        part: PartArg,
    },
}

/// Parse command-line arguments.
#[must_use]
pub fn parse() -> Cli {
    Cli::parse()
}
