//! publish::workspace
//!
//! Disposable working clone of a main branch.
//!
//! # Lifecycle
//!
//! [`Workspace::acquire`] builds the clone in temporary storage and brings
//! it to the state a change should be applied on:
//!
//! 1. Seed from the cached branch, else the resume branch, else main.
//! 2. Fetch main and record its head (`main_branch_revid`).
//! 3. A cached seed is overwritten from the resume branch or main.
//! 4. When resuming, main is pulled in if it fast-forwards and the
//!    colocated branches are reset to main's copies.
//! 5. A resume branch that conflicts with main is abandoned: the clone is
//!    reset to main and the workspace is marked refreshed.
//! 6. The resulting head is recorded as `base_revid`.
//!
//! Storage is removed when the workspace is dropped, on every exit path,
//! unless [`Workspace::defer_destroy`] hands it to the caller first.
//!
//! # Example
//!
//! ```ignore
//! use autopropose::publish::{Workspace, WorkspaceOptions};
//!
//! let ws = Workspace::acquire(&main, WorkspaceOptions::default())?;
//! std::fs::write(ws.path().join("NEWS"), "fixed\n")?;
//! ws.local().commit_all("Update NEWS")?;
//! assert!(ws.changes_since_main()?);
//! ```

use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::{debug, info};

use super::conflict::{merge_conflicts_at, MAIN_TRACKING_REF};
use super::error::PublishError;
use crate::core::types::{BranchName, Oid};
use crate::git::{create_sprout, Branch, ColocatedBranch, Git};

/// Ref holding the resume or cached source head during acquisition.
const SOURCE_TRACKING_REF: &str = "refs/autopropose/source";

/// Namespace for main's colocated branch heads.
const COLOCATED_TRACKING_PREFIX: &str = "refs/autopropose/colocated/";

/// Inputs to [`Workspace::acquire`] beyond the main branch.
#[derive(Debug, Clone, Default)]
pub struct WorkspaceOptions {
    /// Derived branch to continue from
    pub resume_branch: Option<Branch>,
    /// Local mirror to seed from, to save a full fetch
    pub cached_branch: Option<Branch>,
    /// Colocated branches carried from main
    pub additional_colocated_branches: Vec<ColocatedBranch>,
    /// Colocated branches of the resume branch, if they differ
    pub resume_colocated_branches: Option<Vec<ColocatedBranch>>,
    /// Parent directory for the temporary storage
    pub dir: Option<PathBuf>,
}

/// A branch's state at main and in the working clone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultBranch {
    /// Branch name in the working clone
    pub name: BranchName,
    /// Head at main when the workspace was acquired
    pub main: Option<Oid>,
    /// Current head in the working clone
    pub local: Option<Oid>,
}

impl ResultBranch {
    /// Whether the working clone differs from main for this branch.
    pub fn changed(&self) -> bool {
        self.main != self.local
    }
}

/// Ephemeral working clone plus the bookkeeping needed to publish from it.
pub struct Workspace {
    main_branch: Branch,
    resume_branch: Option<Branch>,
    cached_branch: Option<Branch>,
    colocated: Vec<ColocatedBranch>,
    local: Git,
    local_branch: BranchName,
    path: PathBuf,
    main_branch_revid: Oid,
    main_colocated_revids: Vec<(BranchName, Oid)>,
    base_revid: Oid,
    refreshed: bool,
    // Declared last: the repository handle must close before removal.
    storage: Option<TempDir>,
}

impl std::fmt::Debug for Workspace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Workspace")
            .field("main_branch", &self.main_branch)
            .field("resume_branch", &self.resume_branch)
            .field("path", &self.path)
            .field("main_branch_revid", &self.main_branch_revid)
            .field("base_revid", &self.base_revid)
            .field("refreshed", &self.refreshed)
            .finish()
    }
}

impl Workspace {
    /// Create the working clone for `main`.
    ///
    /// # Errors
    ///
    /// - [`PublishError::Io`] if temporary storage can't be created
    /// - [`PublishError::Git`] if a branch can't be fetched
    pub fn acquire(main: &Branch, options: WorkspaceOptions) -> Result<Workspace, PublishError> {
        let WorkspaceOptions {
            resume_branch,
            cached_branch,
            additional_colocated_branches: colocated,
            resume_colocated_branches,
            dir,
        } = options;

        let mut builder = tempfile::Builder::new();
        builder.prefix("autopropose-");
        let storage = match &dir {
            Some(parent) => builder.tempdir_in(parent)?,
            None => builder.tempdir()?,
        };
        let path = storage.path().to_path_buf();

        let (seed, seed_colocated) = match (&cached_branch, &resume_branch) {
            (Some(cached), _) => (cached, colocated.clone()),
            (None, Some(resume)) => (
                resume,
                resume_colocated_branches.unwrap_or_else(|| colocated.clone()),
            ),
            (None, None) => (main, colocated.clone()),
        };
        debug!(seed = %seed, path = %path.display(), "seeding workspace");
        let local = create_sprout(seed, &seed_colocated, &path)?;
        let local_branch = seed.name().clone();

        let main_branch_revid = local.fetch_branch(main, MAIN_TRACKING_REF)?;
        let main_colocated_revids = fetch_main_colocated(&local, main, &colocated)?;

        if cached_branch.is_some() {
            let source = resume_branch.as_ref().unwrap_or(main);
            let head = local.fetch_branch(source, SOURCE_TRACKING_REF)?;
            local.reset_hard(&head)?;
            debug!(source = %source, "overwrote cached seed");
        }

        if resume_branch.is_some() {
            // fast-forward only; a diverged main is handled by the conflict check
            let head = local.head_oid()?;
            if head != main_branch_revid && local.is_ancestor(&head, &main_branch_revid)? {
                local.reset_hard(&main_branch_revid)?;
            }
        }
        if resume_branch.is_some() || cached_branch.is_some() {
            for (name, oid) in &main_colocated_revids {
                local.set_branch(name, oid)?;
            }
        }

        let refreshed = match &resume_branch {
            Some(_) => merge_conflicts_at(&local, &main_branch_revid, &local.head_oid()?)?,
            None => false,
        };
        let resume_branch = if refreshed {
            info!("resume branch conflicts with main, restarting from main");
            local.reset_hard(&main_branch_revid)?;
            None
        } else {
            resume_branch
        };

        let base_revid = local.head_oid()?;
        info!(
            main = %main,
            base = %base_revid.short(8),
            refreshed,
            "workspace ready"
        );
        Ok(Workspace {
            main_branch: main.clone(),
            resume_branch,
            cached_branch,
            colocated,
            local,
            local_branch,
            path,
            main_branch_revid,
            main_colocated_revids,
            base_revid,
            refreshed,
            storage: Some(storage),
        })
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Whether the working clone has moved away from main's head.
    pub fn changes_since_main(&self) -> Result<bool, PublishError> {
        Ok(self.local.head_oid()? != self.main_branch_revid)
    }

    /// Whether the working clone has moved since acquisition.
    pub fn changes_since_resume(&self) -> Result<bool, PublishError> {
        Ok(self.local.head_oid()? != self.base_revid)
    }

    /// Main branch and colocated branches with their main and local heads.
    pub fn result_branches(&self) -> Result<Vec<ResultBranch>, PublishError> {
        let mut branches = vec![ResultBranch {
            name: self.local_branch.clone(),
            main: Some(self.main_branch_revid.clone()),
            local: Some(self.local.head_oid()?),
        }];
        for colo in &self.colocated {
            let main = self
                .main_colocated_revids
                .iter()
                .find(|(name, _)| name == &colo.to)
                .map(|(_, oid)| oid.clone());
            branches.push(ResultBranch {
                name: colo.to.clone(),
                main,
                local: self.local.branch_head(&colo.to)?,
            });
        }
        Ok(branches)
    }

    /// Whether any result branch differs from main.
    pub fn any_branch_changes(&self) -> Result<bool, PublishError> {
        Ok(self.result_branches()?.iter().any(ResultBranch::changed))
    }

    /// Write a unified diff of the changes made since acquisition.
    pub fn show_diff(&self, out: &mut dyn Write) -> Result<(), PublishError> {
        let patch = self
            .local
            .diff_patch(&self.base_revid, &self.local.head_oid()?)?;
        out.write_all(patch.as_bytes())?;
        Ok(())
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// The main branch.
    pub fn main_branch(&self) -> &Branch {
        &self.main_branch
    }

    /// The branch being resumed, if any survived acquisition.
    pub fn resume_branch(&self) -> Option<&Branch> {
        self.resume_branch.as_ref()
    }

    /// The cached branch the clone was seeded from.
    pub fn cached_branch(&self) -> Option<&Branch> {
        self.cached_branch.as_ref()
    }

    /// Colocated branches carried in the clone.
    pub fn colocated_branches(&self) -> &[ColocatedBranch] {
        &self.colocated
    }

    /// The working clone.
    pub fn local(&self) -> &Git {
        &self.local
    }

    /// The working clone, for registering merge hooks.
    pub fn local_mut(&mut self) -> &mut Git {
        &mut self.local
    }

    /// Name of the checked-out branch in the clone.
    pub fn local_branch(&self) -> &BranchName {
        &self.local_branch
    }

    /// Working tree location.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Main's head at acquisition.
    pub fn main_branch_revid(&self) -> &Oid {
        &self.main_branch_revid
    }

    /// The clone's head at the end of acquisition.
    pub fn base_revid(&self) -> &Oid {
        &self.base_revid
    }

    /// Whether the resume branch was discarded for conflicting with main.
    pub fn refreshed(&self) -> bool {
        self.refreshed
    }

    /// Keep the storage past the workspace's lifetime.
    ///
    /// The returned directory is removed when the caller drops it. Returns
    /// `None` if storage was already handed out.
    pub fn defer_destroy(&mut self) -> Option<TempDir> {
        self.storage.take()
    }
}

/// Fetch main's colocated branches that exist and return their heads,
/// keyed by local name.
fn fetch_main_colocated(
    local: &Git,
    main: &Branch,
    colocated: &[ColocatedBranch],
) -> Result<Vec<(BranchName, Oid)>, PublishError> {
    if colocated.is_empty() {
        return Ok(Vec::new());
    }
    let advertised = Git::list_remote_refs(main.url())?;
    let present: Vec<&ColocatedBranch> = colocated
        .iter()
        .filter(|c| advertised.iter().any(|r| r.name == c.from.refname()))
        .collect();
    if present.is_empty() {
        return Ok(Vec::new());
    }

    let refspecs: Vec<String> = present
        .iter()
        .map(|c| format!("+{}:{}{}", c.from.refname(), COLOCATED_TRACKING_PREFIX, c.to))
        .collect();
    local.fetch(main.url(), &refspecs)?;

    let mut heads = Vec::with_capacity(present.len());
    for colo in present {
        let refname = format!("{}{}", COLOCATED_TRACKING_PREFIX, colo.to);
        if let Some(oid) = local.try_resolve_ref(&refname)? {
            heads.push((colo.to.clone(), oid));
        }
    }
    Ok(heads)
}
