//! publish::controller
//!
//! Decide how a workspace's changes reach the remote, and do it.
//!
//! # Decision Tree
//!
//! ```text
//! no changes since main ──> close existing proposal, done
//! push-derived ───────────> push derived branch, done
//! push / attempt-push ────> push to main
//!                             └─ permission denied under attempt-push ──> propose
//! propose ────────────────> diff gate -> push derived -> reopen/update or create proposal
//! ```
//!
//! Pushes to main never overwrite. Derived branches are overwritten only
//! when the caller asked for it or the workspace was refreshed.

use tracing::{debug, info, warn};

use super::diff_gate::check_proposal_diff;
use super::error::PublishError;
use super::mode::PublishMode;
use super::workspace::Workspace;
use crate::core::config::ForgeConfig;
use crate::core::types::BranchName;
use crate::forge::{
    get_forge, DerivedTarget, DescriptionFormat, Forge, ForgeError, MergeProposal, ProposalStatus,
};
use crate::git::{Branch, ColocatedBranch, Git, PushOptions};

/// Produces a proposal description in the forge's markup, given the
/// proposal being resumed.
pub type DescribeFn<'a> = dyn Fn(DescriptionFormat, Option<&MergeProposal>) -> Option<String> + 'a;

/// Produces a merge commit message, given the proposal being resumed.
pub type CommitMessageFn<'a> = dyn Fn(Option<&MergeProposal>) -> Option<String> + 'a;

/// Settings for [`publish_changes`].
#[derive(Debug, Clone)]
pub struct PublishOptions {
    /// Publication strategy
    pub mode: PublishMode,
    /// Derived branch name
    pub name: BranchName,
    /// Labels for new proposals
    pub labels: Vec<String>,
    /// Reviewers for new proposals
    pub reviewers: Vec<String>,
    /// Owner of the derived branch (the authenticated user when unset)
    pub derived_owner: Option<String>,
    /// Tags that may be pushed alongside branches
    pub tags: Vec<String>,
    /// Whether a new proposal may be created (updates are always allowed)
    pub allow_create_proposal: bool,
    /// Whether the derived branch may be overwritten
    pub overwrite_existing: bool,
    /// Proposal found for the derived branch
    pub existing_proposal: Option<MergeProposal>,
    /// Let target maintainers push to the derived branch
    pub allow_collaboration: bool,
    /// Skip the empty-diff check
    pub allow_empty: bool,
    /// Compute everything, change nothing remotely
    pub dry_run: bool,
    /// Used to resolve a forge when none is supplied
    pub forge_settings: ForgeConfig,
}

impl PublishOptions {
    /// Options for `mode` publishing to the derived branch `name`.
    pub fn new(mode: PublishMode, name: BranchName) -> Self {
        Self {
            mode,
            name,
            labels: Vec::new(),
            reviewers: Vec::new(),
            derived_owner: None,
            tags: Vec::new(),
            allow_create_proposal: true,
            overwrite_existing: false,
            existing_proposal: None,
            allow_collaboration: false,
            allow_empty: false,
            dry_run: false,
            forge_settings: ForgeConfig::default(),
        }
    }
}

/// What [`publish_changes`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishResult {
    /// Mode actually used, after any fallback
    pub mode: PublishMode,
    /// Proposal created or updated
    pub proposal: Option<MergeProposal>,
    /// Whether the proposal was created by this call
    pub is_new: bool,
}

impl PublishResult {
    fn without_proposal(mode: PublishMode) -> Self {
        Self {
            mode,
            proposal: None,
            is_new: false,
        }
    }
}

/// Everything [`propose_changes`] needs beyond the branches and forge.
#[derive(Debug, Clone)]
pub struct ProposeRequest {
    /// Derived branch name
    pub name: BranchName,
    /// Proposal description
    pub description: String,
    /// Existing derived branch to push to
    pub resume_branch: Option<Branch>,
    /// Existing proposal to update
    pub resume_proposal: Option<MergeProposal>,
    /// Whether the derived branch may be overwritten
    pub overwrite: bool,
    /// Labels for a new proposal
    pub labels: Vec<String>,
    /// Reviewers for a new proposal
    pub reviewers: Vec<String>,
    /// Merge commit message
    pub commit_message: Option<String>,
    /// Colocated branches to push alongside
    pub colocated: Vec<ColocatedBranch>,
    /// Skip the empty-diff check
    pub allow_empty: bool,
    /// Tags that may be pushed
    pub tags: Vec<String>,
    /// Owner of the derived branch
    pub owner: Option<String>,
    /// Let target maintainers push to the derived branch
    pub allow_collaboration: bool,
    /// Keep every change in memory
    pub dry_run: bool,
}

/// Publish the changes in `ws` according to `options.mode`.
///
/// `forge` is resolved from the main branch when not supplied. For direct
/// pushes an unsupported host is tolerated and the push goes to the main
/// branch's own location.
///
/// # Errors
///
/// - [`PublishError::DescriptionMissing`] if proposing without a description
/// - [`PublishError::EmptyProposal`] if the changes are already on main
/// - [`PublishError::Git`] with a permission error if `push` is refused
pub async fn publish_changes(
    ws: &Workspace,
    forge: Option<&dyn Forge>,
    options: PublishOptions,
    describe: &DescribeFn<'_>,
    commit_message: Option<&CommitMessageFn<'_>>,
) -> Result<PublishResult, PublishError> {
    let PublishOptions {
        mut mode,
        name,
        labels,
        reviewers,
        derived_owner,
        tags,
        allow_create_proposal,
        overwrite_existing,
        existing_proposal,
        allow_collaboration,
        allow_empty,
        dry_run,
        forge_settings,
    } = options;
    let main = ws.main_branch();

    if !ws.changes_since_main()? {
        if let Some(mut existing) = existing_proposal {
            info!(url = %existing.url, "no changes left, closing existing proposal");
            if !dry_run {
                let loaded = load_forge(forge, main, &forge_settings, false)?;
                let forge = required(forge.or(loaded.as_deref()), main)?;
                forge.close_proposal(&mut existing).await?;
            }
        }
        return Ok(PublishResult::without_proposal(mode));
    }

    if !ws.changes_since_resume()? {
        info!("no new revisions, making sure the proposal is up to date");
    }

    let loaded = load_forge(forge, main, &forge_settings, mode.pushes_to_main())?;
    let forge = forge.or(loaded.as_deref());
    let overwrite = overwrite_existing || ws.refreshed();

    if mode == PublishMode::PushDerived {
        let forge = required(forge, main)?;
        if dry_run {
            info!(name = %name, "dry run, not pushing derived branch");
            return Ok(PublishResult::without_proposal(mode));
        }
        let target = push_derived_changes(
            ws.local(),
            ws.local_branch(),
            main,
            forge,
            &name,
            overwrite,
            derived_owner.as_deref(),
            &tags,
        )
        .await?;
        info!(url = %target.public_url, "pushed derived branch");
        return Ok(PublishResult::without_proposal(mode));
    }

    if mode.pushes_to_main() {
        let pushed = push_changes(
            ws.local(),
            ws.local_branch(),
            main,
            forge,
            ws.colocated_branches(),
            dry_run,
            &tags,
        );
        match pushed {
            Ok(()) => return Ok(PublishResult::without_proposal(mode)),
            Err(e) if e.is_permission_denied() && mode == PublishMode::AttemptPush => {
                info!("push access denied, falling back to propose");
                mode = PublishMode::Propose;
            }
            Err(e) => {
                warn!(error = %e, "push to main failed");
                return Err(e);
            }
        }
    }

    let forge = required(forge, main)?;
    if ws.resume_branch().is_none() && !allow_create_proposal {
        debug!("no proposal to update and creation is not allowed");
        return Ok(PublishResult::without_proposal(mode));
    }

    let resumed = ws.resume_branch().and(existing_proposal.as_ref());
    let description = describe(forge.description_format(), resumed)
        .filter(|d| !d.trim().is_empty())
        .ok_or(PublishError::DescriptionMissing)?;
    let commit_message = commit_message.and_then(|f| f(resumed));

    let request = ProposeRequest {
        name,
        description,
        resume_branch: ws.resume_branch().cloned(),
        resume_proposal: existing_proposal,
        overwrite,
        labels,
        reviewers,
        commit_message,
        colocated: ws.colocated_branches().to_vec(),
        allow_empty,
        tags,
        owner: derived_owner,
        allow_collaboration,
        dry_run,
    };
    let (proposal, is_new) =
        propose_changes(ws.local(), ws.local_branch(), main, forge, request).await?;
    Ok(PublishResult {
        mode,
        proposal: Some(proposal),
        is_new,
    })
}

/// Push the local branch and the colocated branches present locally to
/// main.
///
/// Never overwrites: a diverged main fails with a diverged error.
pub fn push_changes(
    local: &Git,
    local_branch: &BranchName,
    main: &Branch,
    forge: Option<&dyn Forge>,
    colocated: &[ColocatedBranch],
    dry_run: bool,
    tags: &[String],
) -> Result<(), PublishError> {
    let push_url = match forge {
        Some(forge) => forge.get_push_url(main),
        None => main.url().to_string(),
    };
    info!(url = %push_url, "pushing to main");
    if dry_run {
        return Ok(());
    }

    let target = Branch::new(push_url.clone(), main.name().clone());
    local.push(
        local_branch,
        &target,
        &PushOptions {
            overwrite: false,
            tags: tags.to_vec(),
        },
    )?;
    push_colocated(local, &push_url, colocated, false)?;
    Ok(())
}

/// Ensure the derived repository exists and push the local branch to it.
#[allow(clippy::too_many_arguments)]
pub async fn push_derived_changes(
    local: &Git,
    local_branch: &BranchName,
    main: &Branch,
    forge: &dyn Forge,
    name: &BranchName,
    overwrite: bool,
    owner: Option<&str>,
    tags: &[String],
) -> Result<DerivedTarget, PublishError> {
    let target = forge.publish_derived(main, name, owner).await?;
    local.push(
        local_branch,
        &Branch::new(target.push_url.clone(), name.clone()),
        &PushOptions {
            overwrite,
            tags: tags.to_vec(),
        },
    )?;
    Ok(target)
}

/// Create or update the merge proposal for the local branch.
///
/// Returns the proposal and whether it was created by this call.
///
/// # Errors
///
/// - [`PublishError::EmptyProposal`] before anything is pushed, unless
///   `allow_empty` is set
pub async fn propose_changes(
    local: &Git,
    local_branch: &BranchName,
    main: &Branch,
    forge: &dyn Forge,
    request: ProposeRequest,
) -> Result<(MergeProposal, bool), PublishError> {
    if !request.allow_empty {
        check_proposal_diff(local, &local.head_oid()?, main)?;
    }

    let source = if request.dry_run {
        request
            .resume_branch
            .clone()
            .unwrap_or_else(|| Branch::new(local.git_dir().display().to_string(), local_branch.clone()))
    } else {
        let push_options = PushOptions {
            overwrite: request.overwrite,
            tags: request.tags.clone(),
        };
        let (source, push_url) = match &request.resume_branch {
            Some(resume) => {
                let push_url = forge.get_push_url(resume);
                let target = Branch::new(push_url.clone(), resume.name().clone());
                local.push(local_branch, &target, &push_options)?;
                (resume.clone(), push_url)
            }
            None => {
                let target = push_derived_changes(
                    local,
                    local_branch,
                    main,
                    forge,
                    &request.name,
                    request.overwrite,
                    request.owner.as_deref(),
                    &request.tags,
                )
                .await?;
                (target.branch, target.push_url)
            }
        };
        push_colocated(local, &push_url, &request.colocated, request.overwrite)?;
        source
    };

    let mut resume_proposal = match request.resume_proposal {
        Some(p) if request.dry_run => Some(p.to_dry_run()),
        other => other,
    };

    let reopen_failed = match resume_proposal.as_mut() {
        Some(proposal) if proposal.is_closed() => match reopen(forge, proposal).await {
            Ok(()) => false,
            Err(e @ (ForgeError::ReopenFailed { .. } | ForgeError::NotImplemented(_))) => {
                info!(error = %e, "reopening proposal failed, creating a new one");
                true
            }
            Err(e) => return Err(e.into()),
        },
        _ => false,
    };
    if reopen_failed {
        resume_proposal = None;
    }

    if let Some(mut proposal) = resume_proposal {
        if proposal.description.as_deref() != Some(request.description.as_str()) {
            set_description(forge, &mut proposal, &request.description).await?;
        }
        if let Some(message) = &request.commit_message {
            if proposal.commit_message.as_deref() != Some(message.as_str()) {
                match set_commit_message(forge, &mut proposal, message).await {
                    Ok(()) | Err(ForgeError::NotImplemented(_)) => {}
                    Err(e) => return Err(e.into()),
                }
            }
        }
        info!(url = %proposal.url, "updated existing proposal");
        return Ok((proposal, false));
    }

    let builder = forge
        .get_proposer(&source, main)
        .description(request.description)
        .labels(&request.labels)
        .reviewers(&request.reviewers)
        .commit_message(request.commit_message)
        .allow_collaboration(request.allow_collaboration);
    let proposal = if request.dry_run {
        builder.dry_run()
    } else {
        builder.create(forge).await?
    };
    info!(url = %proposal.url, dry_run = request.dry_run, "created proposal");
    Ok((proposal, true))
}

/// Push each colocated branch that exists locally to `push_url`.
fn push_colocated(
    local: &Git,
    push_url: &str,
    colocated: &[ColocatedBranch],
    overwrite: bool,
) -> Result<(), PublishError> {
    for colo in colocated {
        if local.branch_head(&colo.to)?.is_none() {
            debug!(branch = %colo.to, "colocated branch absent locally");
            continue;
        }
        local.push(
            &colo.to,
            &Branch::new(push_url, colo.from.clone()),
            &PushOptions {
                overwrite,
                tags: Vec::new(),
            },
        )?;
    }
    Ok(())
}

/// Resolve a forge for `main` unless one was supplied.
fn load_forge(
    supplied: Option<&dyn Forge>,
    main: &Branch,
    settings: &ForgeConfig,
    tolerate_unsupported: bool,
) -> Result<Option<Box<dyn Forge>>, ForgeError> {
    if supplied.is_some() {
        return Ok(None);
    }
    match get_forge(main, settings) {
        Ok(forge) => Ok(Some(forge)),
        Err(ForgeError::UnsupportedForge(reason)) if tolerate_unsupported => {
            warn!(%reason, "unsupported forge, pushing to the branch location directly");
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

fn required<'a>(forge: Option<&'a dyn Forge>, main: &Branch) -> Result<&'a dyn Forge, ForgeError> {
    forge.ok_or_else(|| ForgeError::UnsupportedForge(main.url().to_string()))
}

// Dry-run proposals are updated in memory only.

async fn reopen(forge: &dyn Forge, proposal: &mut MergeProposal) -> Result<(), ForgeError> {
    if proposal.dry_run {
        proposal.status = ProposalStatus::Open;
        return Ok(());
    }
    forge.reopen_proposal(proposal).await
}

async fn set_description(
    forge: &dyn Forge,
    proposal: &mut MergeProposal,
    description: &str,
) -> Result<(), ForgeError> {
    if proposal.dry_run {
        proposal.description = Some(description.to_string());
        return Ok(());
    }
    forge.set_description(proposal, description).await
}

async fn set_commit_message(
    forge: &dyn Forge,
    proposal: &mut MergeProposal,
    message: &str,
) -> Result<(), ForgeError> {
    if proposal.dry_run {
        proposal.commit_message = Some(message.to_string());
        return Ok(());
    }
    forge.set_commit_message(proposal, message).await
}
