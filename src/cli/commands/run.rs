//! run command - Run a script against a branch and publish the result

use std::path::Path;
use std::process::{Command, ExitCode, Stdio};

use anyhow::{Context as _, Result};

use crate::cli::args::RunArgs;
use crate::cli::Context;
use crate::core::config::Config;
use crate::core::types::BranchName;
use crate::forge::ForgeError;
use crate::git::Branch;
use crate::publish::{
    propose_or_push, ChangeResult, PublishError, PublishMode, RunOptions, RunOutcome, Workspace,
};
use crate::ui::output;

/// What the script did to the working clone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptOutcome {
    /// The script left changes behind (committed by us or by the script)
    Committed,
    /// The working clone is exactly as the script found it
    MadeNoChanges,
}

/// Run `ap run`.
pub fn run(ctx: &Context, args: RunArgs) -> Result<ExitCode> {
    let verbosity = ctx.verbosity();
    let config = Config::load().context("Failed to load configuration")?;

    let main = Branch::open(&args.url, args.branch.as_deref())
        .with_context(|| format!("Failed to open branch at {}", args.url))?;
    let name = match &args.name {
        Some(name) => BranchName::new(name.as_str()).context("Invalid derived branch name")?,
        None => default_branch_name(&args.script)?,
    };
    output::debug(format!("main branch {}, derived name {}", main, name), verbosity);

    let options = RunOptions {
        mode: args.mode.unwrap_or_else(|| config.mode()),
        labels: or_config(args.labels, config.labels()),
        reviewers: or_config(args.reviewers, config.reviewers()),
        derived_owner: args.owner.or_else(|| config.derived_owner().map(String::from)),
        tags: or_config(args.tags, config.tags()),
        allow_collaboration: args.allow_collaboration || config.allow_collaboration(),
        allow_empty: args.allow_empty,
        dry_run: args.dry_run,
        refresh: args.refresh,
        overwrite_unrelated: args.overwrite_unrelated || config.overwrite_unrelated(),
        fail_on_unrelated: true,
        colocated: args.colocated,
        storage_dir: args
            .storage_dir
            .or_else(|| config.storage_dir().map(Path::to_path_buf)),
        capture_diff: args.diff,
        forge_settings: config.forge(),
    };
    let mode = options.mode;
    let dry_run = options.dry_run;

    let script = args.script.clone();
    let commit_message = args.commit_message.clone();
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;
    let outcome = runtime.block_on(propose_or_push(
        &main,
        &name,
        |ws| script_runner(ws, &script, commit_message.as_deref()),
        options,
        None,
    ));

    match outcome {
        Ok(outcome) => Ok(report(ctx, &main, &name, outcome, dry_run)),
        Err(PublishError::Forge(ForgeError::UnsupportedForge(_))) => {
            output::error(format!(
                "No known supported forge for {}. Set [forge] provider in the configuration?",
                main.url()
            ));
            Ok(ExitCode::FAILURE)
        }
        Err(PublishError::Forge(ForgeError::AuthRequired(hint))) => {
            output::error(format!(
                "Credentials for the forge hosting {} are missing: {}",
                main.url(),
                hint
            ));
            Ok(ExitCode::FAILURE)
        }
        Err(PublishError::EmptyProposal) => {
            output::warn(
                "Merging the changes would not change the main branch; nothing proposed.",
                verbosity,
            );
            Ok(ExitCode::SUCCESS)
        }
        Err(e @ PublishError::UnrelatedBranchExists { .. }) => {
            output::error(format!(
                "{}. Pass --overwrite-unrelated to replace it or --name to pick another.",
                e
            ));
            Ok(ExitCode::FAILURE)
        }
        Err(e) if e.is_permission_denied() && mode == PublishMode::Push => {
            output::error(format!("Permission denied pushing to {}: {}", main, e));
            Ok(ExitCode::FAILURE)
        }
        Err(e) => Err(e).with_context(|| format!("Failed to publish changes to {}", main)),
    }
}

/// Print what happened and pick the exit code.
fn report(
    ctx: &Context,
    main: &Branch,
    name: &BranchName,
    outcome: RunOutcome<ScriptOutcome>,
    dry_run: bool,
) -> ExitCode {
    let verbosity = ctx.verbosity();
    if let Some(diff) = &outcome.diff {
        print!("{}", diff);
    }
    if outcome.refreshed {
        output::warn(
            "The derived branch conflicted with the main branch; started over from main.",
            verbosity,
        );
    }

    let result = &outcome.result;
    match &result.proposal {
        Some(proposal) if proposal.dry_run => {
            let action = if result.is_new { "create" } else { "update" };
            output::success(
                format!("Would {} merge proposal from {}", action, proposal.source),
                verbosity,
            )
        }
        Some(proposal) if result.is_new => {
            output::success(format!("Merge proposal created: {}", proposal.url), verbosity)
        }
        Some(proposal) => {
            output::success(format!("Merge proposal updated: {}", proposal.url), verbosity)
        }
        None if outcome.value == ScriptOutcome::MadeNoChanges => {
            output::error("Script did not make any changes.");
            return ExitCode::FAILURE;
        }
        None if dry_run => output::success(
            format!("Would publish changes to {} ({})", main, result.mode),
            verbosity,
        ),
        None => match result.mode {
            PublishMode::Push | PublishMode::AttemptPush => {
                output::success(format!("Pushed changes to {}", main), verbosity)
            }
            PublishMode::PushDerived => {
                output::success(format!("Pushed derived branch {}", name), verbosity)
            }
            PublishMode::Propose => output::print("No merge proposal created.", verbosity),
        },
    }

    ExitCode::SUCCESS
}

/// Run `script` through `sh -c` in the working clone and commit the result.
///
/// The script's stdout is the proposal description and, unless
/// `commit_message` is given, the commit message. A script may commit on
/// its own; any leftover changes are committed on top.
pub fn script_runner(
    ws: &mut Workspace,
    script: &str,
    commit_message: Option<&str>,
) -> Result<ChangeResult<ScriptOutcome>, PublishError> {
    let output = Command::new("sh")
        .arg("-c")
        .arg(script)
        .current_dir(ws.path())
        .stdin(Stdio::null())
        .stderr(Stdio::inherit())
        .output()
        .map_err(|e| PublishError::Change {
            message: format!("failed to start {}: {}", script, e),
        })?;
    if !output.status.success() {
        return Err(PublishError::Change {
            message: match output.status.code() {
                Some(code) => format!("script {} failed with exit code {}", script, code),
                None => format!("script {} was killed by a signal", script),
            },
        });
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let description = Some(stdout.trim().to_string()).filter(|d| !d.is_empty());
    let message = commit_message
        .map(String::from)
        .or_else(|| description.clone())
        .unwrap_or_else(|| format!("Run {}", script));

    ws.local().commit_all(&message)?;
    if !ws.changes_since_resume()? {
        return Ok(ChangeResult::unchanged(ScriptOutcome::MadeNoChanges));
    }

    let mut change = ChangeResult::new(ScriptOutcome::Committed, description);
    if let Some(message) = commit_message {
        change = change.with_commit_message(message);
    }
    Ok(change)
}

/// Derived branch name for a script: the file stem of its first word.
///
/// ```
/// use autopropose::cli::commands::default_branch_name;
///
/// let name = default_branch_name("./scripts/fix-typos.sh --all").unwrap();
/// assert_eq!(name.as_str(), "fix-typos");
/// ```
pub fn default_branch_name(script: &str) -> Result<BranchName> {
    let program = script.split_whitespace().next().unwrap_or(script);
    let stem = Path::new(program)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    BranchName::new(stem.as_str())
        .with_context(|| format!("Cannot derive a branch name from '{}'; pass --name", script))
}

fn or_config(flags: Vec<String>, configured: Vec<String>) -> Vec<String> {
    if flags.is_empty() {
        configured
    } else {
        flags
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn branch_name_from_script() {
        assert_eq!(default_branch_name("fix.sh").unwrap().as_str(), "fix");
        assert_eq!(
            default_branch_name("/usr/bin/codemod --apply").unwrap().as_str(),
            "codemod"
        );
    }

    #[test]
    fn branch_name_from_empty_script_fails() {
        assert!(default_branch_name("").is_err());
    }

    #[test]
    fn flags_override_config() {
        let configured = vec!["automated".to_string()];
        assert_eq!(or_config(vec![], configured.clone()), configured);
        assert_eq!(
            or_config(vec!["manual".to_string()], configured),
            vec!["manual".to_string()]
        );
    }
}
