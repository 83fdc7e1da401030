//! publish::runner
//!
//! One unit of work: find earlier work, make the change, publish it.
//!
//! # Example
//!
//! ```ignore
//! use autopropose::publish::{propose_or_push, ChangeResult, RunOptions};
//!
//! let outcome = propose_or_push(
//!     &main,
//!     &name,
//!     |ws| {
//!         std::fs::write(ws.path().join("NEWS"), "fixed\n")?;
//!         ws.local().commit_all("Update NEWS")?;
//!         Ok(ChangeResult::new((), Some("Update NEWS".into())))
//!     },
//!     RunOptions::default(),
//!     Some(&forge),
//! )
//! .await?;
//! ```

use std::path::PathBuf;

use tracing::{info, warn};

use super::controller::{publish_changes, PublishOptions, PublishResult};
use super::error::PublishError;
use super::mode::PublishMode;
use super::resolver::{find_existing_proposed, ResumeState};
use super::workspace::{Workspace, WorkspaceOptions};
use crate::core::config::ForgeConfig;
use crate::core::types::BranchName;
use crate::forge::{get_forge, DescriptionFormat, Forge, ForgeError, MergeProposal};
use crate::git::{Branch, ColocatedBranch};

/// What a change callback produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeResult<R> {
    /// Caller's own result
    pub value: R,
    /// Proposal description; the resumed proposal's is reused when `None`
    pub description: Option<String>,
    /// Merge commit message
    pub commit_message: Option<String>,
    /// Whether a new proposal may be created
    pub create_proposal: bool,
}

impl<R> ChangeResult<R> {
    /// A change that may be proposed with `description`.
    pub fn new(value: R, description: Option<String>) -> Self {
        Self {
            value,
            description,
            commit_message: None,
            create_proposal: true,
        }
    }

    /// A change that made no commits; existing proposals may still be
    /// updated or closed, but none is created.
    pub fn unchanged(value: R) -> Self {
        Self {
            value,
            description: None,
            commit_message: None,
            create_proposal: false,
        }
    }

    /// Set the merge commit message.
    pub fn with_commit_message(mut self, message: impl Into<String>) -> Self {
        self.commit_message = Some(message.into());
        self
    }
}

/// Settings for [`propose_or_push`].
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Publication strategy
    pub mode: PublishMode,
    /// Labels for new proposals
    pub labels: Vec<String>,
    /// Reviewers for new proposals
    pub reviewers: Vec<String>,
    /// Owner of the derived branch
    pub derived_owner: Option<String>,
    /// Tags that may be pushed
    pub tags: Vec<String>,
    /// Let target maintainers push to the derived branch
    pub allow_collaboration: bool,
    /// Skip the empty-diff check
    pub allow_empty: bool,
    /// Change nothing remotely
    pub dry_run: bool,
    /// Ignore any derived branch and start over from main
    pub refresh: bool,
    /// Overwrite a derived branch that has no proposal against main
    pub overwrite_unrelated: bool,
    /// Fail instead of skipping the resume when such a branch is kept
    pub fail_on_unrelated: bool,
    /// Colocated branches carried from main
    pub colocated: Vec<ColocatedBranch>,
    /// Parent directory for working clones
    pub storage_dir: Option<PathBuf>,
    /// Capture the diff of the change
    pub capture_diff: bool,
    /// Used to resolve a forge when none is supplied
    pub forge_settings: ForgeConfig,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            mode: PublishMode::Propose,
            labels: Vec::new(),
            reviewers: Vec::new(),
            derived_owner: None,
            tags: Vec::new(),
            allow_collaboration: false,
            allow_empty: false,
            dry_run: false,
            refresh: false,
            overwrite_unrelated: false,
            fail_on_unrelated: false,
            colocated: Vec::new(),
            storage_dir: None,
            capture_diff: false,
            forge_settings: ForgeConfig::default(),
        }
    }
}

/// Result of [`propose_or_push`].
#[derive(Debug, Clone)]
pub struct RunOutcome<R> {
    /// What was published
    pub result: PublishResult,
    /// The change callback's value
    pub value: R,
    /// Whether the resume branch was abandoned for conflicting with main
    pub refreshed: bool,
    /// Unified diff of the change, when requested
    pub diff: Option<String>,
}

/// Apply `changer` to a working clone of `main` and publish the result
/// under the derived branch `name`.
///
/// # Errors
///
/// - [`PublishError::UnrelatedBranchExists`] if `fail_on_unrelated` is set
///   and a derived branch without a proposal would be kept
/// - whatever the change callback or publication fails with
pub async fn propose_or_push<R, F>(
    main: &Branch,
    name: &BranchName,
    changer: F,
    options: RunOptions,
    forge: Option<&dyn Forge>,
) -> Result<RunOutcome<R>, PublishError>
where
    F: FnOnce(&mut Workspace) -> Result<ChangeResult<R>, PublishError>,
{
    let loaded = match forge {
        Some(_) => None,
        None => match get_forge(main, &options.forge_settings) {
            Ok(forge) => Some(forge),
            Err(ForgeError::UnsupportedForge(reason)) if options.mode.pushes_to_main() => {
                warn!(%reason, "unsupported forge, existing proposals won't be found");
                None
            }
            Err(e) => return Err(e.into()),
        },
    };
    let forge = forge.or(loaded.as_deref());

    let state = match forge {
        Some(forge) => {
            find_existing_proposed(
                main,
                forge,
                name,
                options.derived_owner.as_deref(),
                options.overwrite_unrelated,
            )
            .await?
        }
        None => ResumeState::NoResume,
    };

    if let ResumeState::ResumeUnrelated {
        branch,
        overwrite: false,
    } = &state
    {
        if options.fail_on_unrelated && !options.refresh {
            return Err(PublishError::UnrelatedBranchExists {
                name: name.to_string(),
                main: main.to_string(),
            });
        }
        warn!(branch = %branch, "derived branch has no proposal, not resuming it");
    }

    let (mut resume_branch, mut overwrite, existing_proposal) = state.into_parts();
    if options.refresh {
        info!(name = %name, "refreshing, starting over from main");
        resume_branch = None;
        overwrite = true;
    }

    let mut ws = Workspace::acquire(
        main,
        WorkspaceOptions {
            resume_branch,
            additional_colocated_branches: options.colocated.clone(),
            dir: options.storage_dir.clone(),
            ..Default::default()
        },
    )?;

    let change = changer(&mut ws)?;
    let diff = if options.capture_diff {
        let mut out = Vec::new();
        ws.show_diff(&mut out)?;
        Some(String::from_utf8_lossy(&out).into_owned())
    } else {
        None
    };

    let ChangeResult {
        value,
        description,
        commit_message,
        create_proposal,
    } = change;
    let describe = |_: DescriptionFormat, existing: Option<&MergeProposal>| {
        description
            .clone()
            .or_else(|| existing.and_then(|p| p.description.clone()))
    };
    let commit = |existing: Option<&MergeProposal>| {
        commit_message
            .clone()
            .or_else(|| existing.and_then(|p| p.commit_message.clone()))
    };

    let publish_options = PublishOptions {
        mode: options.mode,
        name: name.clone(),
        labels: options.labels,
        reviewers: options.reviewers,
        derived_owner: options.derived_owner,
        tags: options.tags,
        allow_create_proposal: create_proposal,
        overwrite_existing: overwrite,
        existing_proposal,
        allow_collaboration: options.allow_collaboration,
        allow_empty: options.allow_empty,
        dry_run: options.dry_run,
        forge_settings: options.forge_settings,
    };
    let result = publish_changes(&ws, forge, publish_options, &describe, Some(&commit)).await?;

    Ok(RunOutcome {
        result,
        value,
        refreshed: ws.refreshed(),
        diff,
    })
}
