//! fwrel - firmware release management CLI
//!
//! Thin command surface over [`fwrel_release`]: it resolves configuration,
//! opens a blob store (an HTTP container or a local directory), runs one
//! release operation and renders the result as text or a JSON envelope.
//!
//! # Commands
//!
//! - `fwrel register` - register the PCB versions of a module
//! - `fwrel promote` - upload a build and stage it (or force it stable)
//! - `fwrel stable` - move a staged build to stable
//! - `fwrel staging` - list pending staging candidates
//! - `fwrel pcb-file` - print a field of a PCB version file

// CLI crate prints command output and diagnostics
#![allow(clippy::print_stdout, clippy::print_stderr)]

/// CLI argument parsing and exit codes.
pub mod cli;
/// Command implementations.
pub mod commands;
/// TOML and environment configuration.
pub mod config;
/// HTTP blob container transport.
pub mod http;
/// Retry with exponential backoff for manifest write conflicts.
pub mod retry;
/// Tracing subscriber setup.
pub mod tracing;
