//! publish::conflict
//!
//! Decide whether a candidate branch would conflict with main.
//!
//! # Design
//!
//! The check never moves a branch, the index or the working tree. Main's
//! head is fetched into a private tracking ref and the merge is built in
//! memory, so there is nothing to roll back afterwards. Merge hooks are
//! suspended for the preview: a conflict a hook could paper over is still a
//! reason to restart from main.

use tracing::debug;

use crate::core::types::Oid;
use crate::git::{Branch, Git, GitError, HookPolicy};

/// Ref that holds main's head inside a working clone.
///
/// Lives outside `refs/heads/` so fetching it never moves a local branch.
pub(crate) const MAIN_TRACKING_REF: &str = "refs/autopropose/main";

/// Fetch `main` into `local` and check whether `candidate` conflicts with it.
///
/// # Errors
///
/// - [`GitError::BranchNotFound`] if main has no such branch
/// - [`GitError::Transport`] if main can't be reached
pub fn merge_conflicts(local: &Git, main: &Branch, candidate: &Oid) -> Result<bool, GitError> {
    let main_head = local.fetch_branch(main, MAIN_TRACKING_REF)?;
    merge_conflicts_at(local, &main_head, candidate)
}

/// Check whether `candidate` conflicts with `main_head`, both present in
/// `local`.
///
/// - main already contained in the candidate: no conflict
/// - no common history: conflicted
/// - otherwise: whether a plain three-way merge leaves conflicts
pub fn merge_conflicts_at(local: &Git, main_head: &Oid, candidate: &Oid) -> Result<bool, GitError> {
    if local.is_ancestor(main_head, candidate)? {
        return Ok(false);
    }
    if local.merge_base(main_head, candidate)?.is_none() {
        debug!(main = %main_head.short(8), candidate = %candidate.short(8), "unrelated histories");
        return Ok(true);
    }
    let preview = local.merge_preview(candidate, main_head, HookPolicy::Suspended)?;
    Ok(preview.has_conflicts())
}
