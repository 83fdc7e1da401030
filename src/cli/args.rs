//! cli::args
//!
//! Command-line argument definitions using clap derive.
//!
//! # Global Flags
//!
//! These flags are available on all commands:
//! - `--help` / `-h`: Show help
//! - `--version`: Show version
//! - `--debug`: Enable debug logging
//! - `--quiet` / `-q`: Minimal output

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::git::ColocatedBranch;
use crate::publish::PublishMode;

/// autopropose - apply automated changes and publish them as pushes or merge proposals
#[derive(Parser, Debug)]
#[command(name = "ap")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Minimal output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Parser::parse()
    }
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a script against a branch and publish the result
    #[command(
        name = "run",
        long_about = "Run a script against a branch and publish the result.\n\n\
            The branch is cloned into a temporary directory and the script runs there \
            through `sh -c`. Whatever the script prints on stdout becomes the proposal \
            description and commit message. Changes are committed and then pushed or \
            proposed according to --mode.\n\n\
            Running the same script again is safe: an existing derived branch and its \
            open proposal are updated rather than duplicated, and a proposal whose \
            changes have landed on the main branch is closed.",
        after_help = "\
WORKFLOW EXAMPLES:
    # Propose a fix against the default branch
    ap run https://github.com/owner/repo ./fix-typos.sh

    # Push directly if allowed, otherwise open a proposal
    ap run git@github.com:owner/repo.git ./bump.sh --mode attempt-push

    # See what would change without pushing anything
    ap run https://github.com/owner/repo ./fix-typos.sh --dry-run --diff

    # Start over, discarding the previous derived branch
    ap run https://github.com/owner/repo ./fix-typos.sh --refresh"
    )]
    Run(RunArgs),

    /// Show or create the configuration file
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Generate shell completion scripts
    #[command(
        name = "completion",
        long_about = "Generate shell completion scripts for tab-completion.\n\n\
            Outputs a completion script for the specified shell. Add the output \
            to your shell's configuration to enable tab-completion.",
        after_help = "\
WORKFLOW EXAMPLES:
    # Bash: add to ~/.bashrc
    eval \"$(ap completion bash)\"

    # Zsh: add to ~/.zshrc
    eval \"$(ap completion zsh)\"

    # Fish: save to completions directory
    ap completion fish > ~/.config/fish/completions/ap.fish"
    )]
    Completion {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Arguments for `ap run`.
#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Location of the repository to work on
    pub url: String,

    /// Shell command to run in the working clone
    pub script: String,

    /// Branch to work on (defaults to the repository's default branch)
    #[arg(long)]
    pub branch: Option<String>,

    /// Derived branch name (defaults to the script's file stem)
    #[arg(long)]
    pub name: Option<String>,

    /// How to publish: push, attempt-push, propose or push-derived
    #[arg(long, value_parser = parse_mode)]
    pub mode: Option<PublishMode>,

    /// Label to attach to a new proposal (repeatable)
    #[arg(long = "label", value_name = "LABEL")]
    pub labels: Vec<String>,

    /// Reviewer to request on a new proposal (repeatable)
    #[arg(long = "reviewer", value_name = "USER")]
    pub reviewers: Vec<String>,

    /// Owner of the derived branch
    #[arg(long)]
    pub owner: Option<String>,

    /// Tag that may be pushed along with the branch (repeatable)
    #[arg(long = "tag", value_name = "TAG")]
    pub tags: Vec<String>,

    /// Colocated branch to carry along, as NAME or FROM:TO (repeatable)
    #[arg(long = "colocated", value_name = "NAME")]
    pub colocated: Vec<ColocatedBranch>,

    /// Merge commit message for the proposal
    #[arg(long)]
    pub commit_message: Option<String>,

    /// Make changes locally but don't push or propose anything
    #[arg(long)]
    pub dry_run: bool,

    /// Ignore any existing derived branch and start over from main
    #[arg(long)]
    pub refresh: bool,

    /// Propose even if merging would change nothing
    #[arg(long)]
    pub allow_empty: bool,

    /// Overwrite a derived branch that has no proposal against the main branch
    #[arg(long)]
    pub overwrite_unrelated: bool,

    /// Let maintainers of the main branch push to the derived branch
    #[arg(long)]
    pub allow_collaboration: bool,

    /// Print the diff of the change
    #[arg(long)]
    pub diff: bool,

    /// Directory to create working clones in
    #[arg(long, value_name = "DIR")]
    pub storage_dir: Option<PathBuf>,
}

fn parse_mode(s: &str) -> Result<PublishMode, String> {
    s.parse().map_err(|e: crate::publish::PublishError| e.to_string())
}

/// Config subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum ConfigAction {
    /// Print the effective configuration
    Show,
    /// Print the path of the configuration file in use
    Path,
    /// Write a default configuration file
    Init {
        /// Replace an existing file
        #[arg(long)]
        force: bool,
    },
}

/// Supported shells for completion generation.
#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
}
