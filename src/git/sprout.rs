//! git::sprout
//!
//! Create a local working clone ("sprout") of a branch.
//!
//! The sprout is a fresh repository with a working tree, holding the source
//! branch under its own name plus any requested colocated branches. Only
//! colocated branches that exist at the source are fetched.

use std::path::Path;

use tracing::{debug, info};

use super::branch::{Branch, ColocatedBranch};
use super::interface::{Git, GitError};

/// Clone `source` into `dir`, which must be empty or absent.
///
/// The source branch is checked out. Colocated branches are fetched as
/// local branches named by their `to` name.
///
/// # Errors
///
/// - [`GitError::BranchNotFound`] if the source branch doesn't exist
/// - [`GitError::Transport`] if the source can't be reached
pub fn create_sprout(
    source: &Branch,
    colocated: &[ColocatedBranch],
    dir: &Path,
) -> Result<Git, GitError> {
    let advertised = Git::list_remote_refs(source.url())?;
    let exists = |refname: &str| advertised.iter().any(|r| r.name == refname);

    let source_ref = source.name().refname();
    if !exists(&source_ref) {
        return Err(GitError::BranchNotFound {
            url: source.url().to_string(),
            branch: source.name().to_string(),
        });
    }

    let mut refspecs = vec![format!("+{0}:{0}", source_ref)];
    for colo in colocated {
        if exists(&colo.from.refname()) {
            refspecs.push(format!("+{}:{}", colo.from.refname(), colo.to.refname()));
        } else {
            debug!(branch = %colo.from, "colocated branch absent at source");
        }
    }

    let git = Git::init(dir)?;
    git.fetch(source.url(), &refspecs)?;
    git.checkout_branch(source.name())?;
    info!(source = %source, dir = %dir.display(), "created working clone");
    Ok(git)
}
