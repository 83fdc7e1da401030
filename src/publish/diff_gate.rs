//! publish::diff_gate
//!
//! Refuse proposals that would change nothing once merged.
//!
//! A derived branch can carry commits and still be empty in effect: the
//! same change may already have landed on main by another route. The gate
//! merges the candidate into main in memory (hooks enabled, since that is
//! what a real merge would do) and compares the result with main's tree.

use tracing::debug;

use super::conflict::MAIN_TRACKING_REF;
use super::error::PublishError;
use crate::core::types::Oid;
use crate::git::{Branch, Git, HookPolicy};

/// Check that merging `candidate` into `main` would change main.
///
/// Conflicting or unrelated histories count as non-empty: a human has to
/// look at those anyway.
///
/// # Errors
///
/// - [`PublishError::EmptyProposal`] if the merged tree equals main's tree
/// - [`PublishError::Git`] if main can't be fetched
pub fn check_proposal_diff(local: &Git, candidate: &Oid, main: &Branch) -> Result<(), PublishError> {
    let main_head = local.fetch_branch(main, MAIN_TRACKING_REF)?;

    if local.merge_base(&main_head, candidate)?.is_none() {
        return Ok(());
    }

    let preview = local.merge_preview(&main_head, candidate, HookPolicy::Enabled)?;
    let Some(merged) = preview.tree else {
        debug!(conflicts = ?preview.conflicts, "proposal conflicts with main");
        return Ok(());
    };

    if merged == local.tree_of(&main_head)? {
        debug!(candidate = %candidate.short(8), "merge leaves main unchanged");
        return Err(PublishError::EmptyProposal);
    }
    Ok(())
}
