//! fwrel CLI Application

#![allow(clippy::print_stdout, clippy::print_stderr)]

use fwrel::cli::{self, EXIT_CLI, EXIT_OK, exit_code_for, render_error};
use fwrel::commands;
use fwrel::tracing::{TracingConfig, init_tracing};

fn main() {
    // NOTE: Using eprintln! in panic hook is intentional - tracing infrastructure
    // may be corrupted during a panic, so we use the most reliable output method.
    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("Application panicked: {panic_info}");
        eprintln!("Internal error occurred. Run with RUST_LOG=debug for more information.");
    }));

    // reqwest is built without a default TLS provider
    let _ = rustls::crypto::ring::default_provider().install_default();

    let cli = cli::parse();

    let tracing_config = TracingConfig {
        format: cli.log_format,
        level: cli.level,
        ..Default::default()
    };
    if let Err(err) = init_tracing(tracing_config) {
        eprintln!("{err:?}");
        std::process::exit(EXIT_CLI);
    }

    let code = match commands::run(&cli) {
        Ok(output) => {
            if !output.is_empty() {
                println!("{output}");
            }
            EXIT_OK
        }
        Err(err) => {
            render_error(&err, cli.json);
            exit_code_for(&err)
        }
    };
    std::process::exit(code);
}
