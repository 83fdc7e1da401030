//! cli
//!
//! Command-line interface layer for autopropose.
//!
//! # Responsibilities
//!
//! - Parse command-line arguments and global flags
//! - Install the log subscriber
//! - Delegate to command handlers
//!
//! # Architecture
//!
//! The CLI layer is thin. It parses arguments via clap, merges them with the
//! configuration file and hands the unit of work to [`crate::publish`]. Typed
//! library errors become `anyhow` errors here and nowhere else.

pub mod args;
pub mod commands;
mod logging;

pub use args::{Cli, Shell};

use std::process::ExitCode;

use anyhow::Result;

use crate::ui::output::Verbosity;

/// Per-invocation settings shared by all commands.
#[derive(Debug, Clone, Copy)]
pub struct Context {
    /// Debug logging requested
    pub debug: bool,
    /// Minimal output requested
    pub quiet: bool,
}

impl Context {
    /// Output verbosity for these flags.
    pub fn verbosity(&self) -> Verbosity {
        Verbosity::from_flags(self.quiet, self.debug)
    }
}

/// Run the CLI application.
///
/// This is the main entry point called from `main.rs`.
pub fn run() -> Result<ExitCode> {
    let cli = Cli::parse_args();
    logging::init(cli.debug);

    let ctx = Context {
        debug: cli.debug,
        quiet: cli.quiet,
    };
    commands::dispatch(cli.command, &ctx)
}
