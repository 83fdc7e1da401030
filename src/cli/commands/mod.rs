//! cli::commands
//!
//! Command dispatch and handlers.
//!
//! # Architecture
//!
//! Each command handler:
//! 1. Merges command-line flags with the configuration file
//! 2. Calls into the library
//! 3. Formats and displays output
//!
//! # Async Work
//!
//! Forge calls are async. `ap run` drives its unit of work on a
//! current-thread tokio runtime, so from the shell the command is an
//! ordinary blocking process.

mod completion;
mod config_cmd;
mod run;

pub use completion::completion;
pub use config_cmd::{init as config_init, path as config_path, show as config_show};
pub use run::{default_branch_name, run, script_runner, ScriptOutcome};

use std::process::ExitCode;

use anyhow::Result;

use super::args::{Command, ConfigAction};
use super::Context;

/// Dispatch a command to its handler.
pub fn dispatch(command: Command, ctx: &Context) -> Result<ExitCode> {
    match command {
        Command::Run(args) => run::run(ctx, args),
        Command::Config { action } => {
            match action {
                ConfigAction::Show => config_cmd::show(ctx)?,
                ConfigAction::Path => config_cmd::path(ctx)?,
                ConfigAction::Init { force } => config_cmd::init(ctx, force)?,
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Completion { shell } => {
            completion::completion(shell)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}
