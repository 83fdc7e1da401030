//! publish::error
//!
//! Errors from the publication workflow.

use thiserror::Error;

use crate::forge::ForgeError;
use crate::git::GitError;

/// Errors from publishing a change set.
#[derive(Debug, Error)]
pub enum PublishError {
    /// The requested publish mode is not one of the known modes.
    #[error("unsupported publish mode '{0}', expected one of: push, attempt-push, propose, push-derived")]
    UnsupportedMode(String),

    /// A proposal needs a description and none was produced.
    #[error("no description was provided for the merge proposal")]
    DescriptionMissing,

    /// Merging the change set into main would change nothing.
    #[error("merging the changes into the main branch leaves it unchanged")]
    EmptyProposal,

    /// A derived branch exists that no proposal against main accounts for.
    #[error("derived branch '{name}' exists but is not associated with a proposal against {main}")]
    UnrelatedBranchExists {
        /// Derived branch name
        name: String,
        /// Main branch location
        main: String,
    },

    /// The change callback failed.
    #[error("change failed: {message}")]
    Change {
        /// What went wrong
        message: String,
    },

    /// Workspace storage could not be prepared.
    #[error("workspace storage: {0}")]
    Io(#[from] std::io::Error),

    /// Version control failure.
    #[error(transparent)]
    Git(#[from] GitError),

    /// Hosting service failure.
    #[error(transparent)]
    Forge(#[from] ForgeError),
}

impl PublishError {
    /// Whether the error means the push target refused our credentials.
    pub fn is_permission_denied(&self) -> bool {
        matches!(self, PublishError::Git(e) if e.is_permission_denied())
    }
}
