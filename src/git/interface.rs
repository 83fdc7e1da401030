//! git::interface
//!
//! Git interface implementation using git2.
//!
//! This module provides the **single doorway** to all Git operations. All
//! repository reads and writes, fetches and pushes flow through [`Git`],
//! which returns strong types and normalizes libgit2 errors into typed
//! failure categories.
//!
//! # Error Handling
//!
//! Push failures are classified so callers can react to them:
//! - [`GitError::PermissionDenied`]: the identity may not write to the target
//!   (authentication refused, HTTP 401/403, protected or locked ref)
//! - [`GitError::Diverged`]: the remote ref is not an ancestor of what is
//!   being pushed and the push did not ask to overwrite
//! - [`GitError::PushRejected`]: any other per-ref rejection
//!
//! # Example
//!
//! ```ignore
//! use autopropose::git::{Branch, Git, PushOptions};
//!
//! let git = Git::open(Path::new("."))?;
//! let target = Branch::open("https://github.com/owner/repo", None)?;
//! git.push(&local_branch, &target, &PushOptions::default())?;
//! ```

use std::cell::RefCell;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info, warn};

use super::branch::Branch;
use crate::core::types::{BranchName, Oid, TypeError};

/// Errors from Git operations.
#[derive(Debug, Error)]
pub enum GitError {
    /// Not inside a Git repository.
    #[error("not a git repository: {path}")]
    NotARepo {
        /// The path that was searched
        path: PathBuf,
    },

    /// Repository is bare (no working directory).
    #[error("bare repository not supported here")]
    BareRepo,

    /// No known format recognizes the location.
    #[error("not a branch location: {url}")]
    NotABranch {
        /// The location that was probed
        url: String,
    },

    /// The remote repository has no branches yet.
    #[error("repository at {url} has no branches")]
    EmptyRepository {
        /// The remote location
        url: String,
    },

    /// The named branch does not exist at the remote location.
    #[error("branch '{branch}' not found at {url}")]
    BranchNotFound {
        /// The remote location
        url: String,
        /// The missing branch
        branch: String,
    },

    /// Requested ref does not exist.
    #[error("ref not found: {refname}")]
    RefNotFound {
        /// The ref that was not found
        refname: String,
    },

    /// Object not found in repository.
    #[error("object not found: {oid}")]
    ObjectNotFound {
        /// The OID that was not found
        oid: String,
    },

    /// Invalid object id format.
    #[error("invalid object id: {oid}")]
    InvalidOid {
        /// The invalid OID string
        oid: String,
    },

    /// Invalid ref or branch name.
    #[error("invalid ref name: {message}")]
    InvalidRefName {
        /// Description of the problem
        message: String,
    },

    /// The push was refused because the identity may not write there.
    #[error("permission denied pushing to {url}: {message}")]
    PermissionDenied {
        /// The push target
        url: String,
        /// What the server or transport reported
        message: String,
    },

    /// The target branch has history the pushed branch does not contain.
    #[error("branch '{branch}' at {url} has diverged")]
    Diverged {
        /// The push target
        url: String,
        /// The target branch
        branch: String,
    },

    /// The remote rejected a ref update for another reason.
    #[error("push of {refname} rejected: {message}")]
    PushRejected {
        /// The rejected ref
        refname: String,
        /// The rejection reason
        message: String,
    },

    /// Network or transport failure talking to a remote.
    #[error("transport error for {url}: {message}")]
    Transport {
        /// The remote location
        url: String,
        /// The error message
        message: String,
    },

    /// Filesystem error around a repository.
    #[error("repository access error: {message}")]
    AccessError {
        /// Description of the error
        message: String,
    },

    /// Internal git2 error.
    #[error("git error: {message}")]
    Internal {
        /// The error message
        message: String,
    },
}

impl GitError {
    /// Create a GitError from a git2::Error with richer context.
    pub(crate) fn from_git2(err: git2::Error, context: &str) -> Self {
        match err.code() {
            git2::ErrorCode::NotFound if context.starts_with("refs/") || context == "HEAD" => {
                GitError::RefNotFound {
                    refname: context.to_string(),
                }
            }
            git2::ErrorCode::NotFound => GitError::ObjectNotFound {
                oid: context.to_string(),
            },
            git2::ErrorCode::UnbornBranch => GitError::RefNotFound {
                refname: context.to_string(),
            },
            git2::ErrorCode::InvalidSpec => GitError::InvalidRefName {
                message: format!("{}: {}", context, err.message()),
            },
            git2::ErrorCode::Locked => GitError::AccessError {
                message: format!("repository is locked: {}", err.message()),
            },
            _ => GitError::Internal {
                message: format!("{}: {}", context, err.message()),
            },
        }
    }

    /// Map a failure talking to a remote.
    pub(crate) fn transport(err: git2::Error, url: &str) -> Self {
        GitError::Transport {
            url: url.to_string(),
            message: err.message().to_string(),
        }
    }

    /// Whether this is a permission denial on push.
    pub fn is_permission_denied(&self) -> bool {
        matches!(self, GitError::PermissionDenied { .. })
    }
}

impl From<git2::Error> for GitError {
    fn from(err: git2::Error) -> Self {
        GitError::Internal {
            message: err.message().to_string(),
        }
    }
}

impl From<TypeError> for GitError {
    fn from(err: TypeError) -> Self {
        match err {
            TypeError::InvalidOid(msg) => GitError::InvalidOid { oid: msg },
            other => GitError::InvalidRefName {
                message: other.to_string(),
            },
        }
    }
}

/// Phrases in transport or server messages that mean the identity may not
/// write to the target. A lock failure on the target ref is reported the
/// same way: in practice the ref is held by a protection hook or another
/// writer the identity cannot override.
const DENIAL_PHRASES: &[&str] = &[
    "permission denied",
    "access denied",
    "forbidden",
    "authentication required",
    "protected branch",
    "http status code: 401",
    "http status code: 403",
    "failed to lock",
    "cannot lock ref",
];

/// Whether `message` reports a denial. The target URL is blanked out
/// first and phrases only match on word boundaries, so host and path
/// names never count.
fn mentions_denial(message: &str, url: &str) -> bool {
    let mut lower = message.to_ascii_lowercase();
    let url = url.to_ascii_lowercase();
    if !url.is_empty() {
        lower = lower.replace(&url, " ");
    }
    DENIAL_PHRASES
        .iter()
        .any(|phrase| contains_phrase(&lower, phrase))
}

fn contains_phrase(haystack: &str, phrase: &str) -> bool {
    let is_word = |c: Option<char>| c.is_some_and(|c| c.is_ascii_alphanumeric());
    haystack.match_indices(phrase).any(|(start, _)| {
        let before = haystack[..start].chars().next_back();
        let after = haystack[start + phrase.len()..].chars().next();
        !is_word(before) && !is_word(after)
    })
}

/// Classify an error returned by `git2::Remote::push`.
pub(crate) fn classify_push_error(err: git2::Error, target: &Branch) -> GitError {
    match err.code() {
        git2::ErrorCode::NotFastForward => GitError::Diverged {
            url: target.url().to_string(),
            branch: target.name().to_string(),
        },
        git2::ErrorCode::Auth | git2::ErrorCode::Locked => GitError::PermissionDenied {
            url: target.url().to_string(),
            message: err.message().to_string(),
        },
        _ if mentions_denial(err.message(), target.url()) => GitError::PermissionDenied {
            url: target.url().to_string(),
            message: err.message().to_string(),
        },
        _ => GitError::transport(err, target.url()),
    }
}

/// Classify a per-ref rejection reported through `push_update_reference`.
pub(crate) fn classify_rejection(refname: &str, message: &str, target: &Branch) -> GitError {
    let lower = message.to_ascii_lowercase();
    if lower.contains("non-fast-forward") || lower.contains("fetch first") {
        GitError::Diverged {
            url: target.url().to_string(),
            branch: target.name().to_string(),
        }
    } else if mentions_denial(message, target.url()) {
        GitError::PermissionDenied {
            url: target.url().to_string(),
            message: format!("{}: {}", refname, message),
        }
    } else {
        GitError::PushRejected {
            refname: refname.to_string(),
            message: message.to_string(),
        }
    }
}

/// A ref advertised by a remote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteRef {
    /// Full ref name
    pub name: String,
    /// Target object
    pub oid: Oid,
}

/// How a push treats the target ref and tags.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PushOptions {
    /// Replace the target ref even if it is not an ancestor
    pub overwrite: bool,
    /// Tags that may be pushed alongside the branch; tags missing locally
    /// are skipped
    pub tags: Vec<String>,
}

/// Credential callbacks shared by fetch, push and ls-remote.
///
/// SSH keys come from the agent and HTTPS credentials from the user's
/// configured credential helper. Authentication itself is out of scope,
/// so after a few refused attempts the callback gives up instead of looping.
pub(crate) fn remote_callbacks<'cb>() -> git2::RemoteCallbacks<'cb> {
    let mut callbacks = git2::RemoteCallbacks::new();
    let config = git2::Config::open_default().ok();
    let mut attempts = 0u8;
    callbacks.credentials(move |url, username, allowed| {
        attempts += 1;
        if attempts > 3 {
            return Err(git2::Error::new(
                git2::ErrorCode::Auth,
                git2::ErrorClass::Net,
                "credentials refused",
            ));
        }
        if allowed.contains(git2::CredentialType::SSH_KEY) {
            if let Some(user) = username {
                return git2::Cred::ssh_key_from_agent(user);
            }
        }
        if allowed.contains(git2::CredentialType::USER_PASS_PLAINTEXT) {
            if let Some(cfg) = &config {
                return git2::Cred::credential_helper(cfg, url, username);
            }
        }
        git2::Cred::default()
    });
    callbacks
}

pub(crate) fn to_git2_oid(oid: &Oid) -> Result<git2::Oid, GitError> {
    git2::Oid::from_str(oid.as_str()).map_err(|_| GitError::InvalidOid {
        oid: oid.to_string(),
    })
}

pub(crate) fn from_git2_oid(oid: git2::Oid) -> Result<Oid, GitError> {
    Ok(Oid::new(oid.to_string())?)
}

/// The Git interface.
///
/// This is the **single point of interaction** with Git. No other module
/// imports `git2`. A `Git` also carries the merge hooks used by its merge
/// previews (see [`crate::git::MergeHook`]); hooks belong to the handle,
/// never to process-global state.
pub struct Git {
    /// The underlying git2 repository
    pub(crate) repo: git2::Repository,
    /// Content mergers consulted when a preview runs with hooks enabled
    pub(crate) hooks: Vec<Box<dyn super::merge::MergeHook>>,
}

impl std::fmt::Debug for Git {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Git")
            .field("path", &self.repo.path())
            .field("hooks", &self.hooks.len())
            .finish()
    }
}

impl Git {
    // =========================================================================
    // Repository Opening and Creation
    // =========================================================================

    /// Open a repository at the given path.
    ///
    /// Uses `git2::Repository::discover`, so `path` can be any directory
    /// within the repository.
    ///
    /// # Errors
    ///
    /// - [`GitError::NotARepo`] if no repository is found
    /// - [`GitError::BareRepo`] if the repository has no working directory
    pub fn open(path: &Path) -> Result<Self, GitError> {
        let repo = git2::Repository::discover(path).map_err(|_| GitError::NotARepo {
            path: path.to_path_buf(),
        })?;

        if repo.is_bare() {
            return Err(GitError::BareRepo);
        }

        Ok(Self::wrap(repo))
    }

    /// Create a new repository with a working tree.
    pub fn init(path: &Path) -> Result<Self, GitError> {
        let repo = git2::Repository::init(path).map_err(|e| GitError::AccessError {
            message: format!("cannot create repository at {}: {}", path.display(), e.message()),
        })?;
        Ok(Self::wrap(repo))
    }

    /// Create a new bare repository, e.g. to host a derived branch.
    pub fn init_bare(path: &Path) -> Result<Self, GitError> {
        let repo = git2::Repository::init_bare(path).map_err(|e| GitError::AccessError {
            message: format!("cannot create repository at {}: {}", path.display(), e.message()),
        })?;
        Ok(Self::wrap(repo))
    }

    fn wrap(repo: git2::Repository) -> Self {
        Self {
            repo,
            hooks: Vec::new(),
        }
    }

    /// Path to the `.git` directory (or the repository itself when bare).
    pub fn git_dir(&self) -> &Path {
        self.repo.path()
    }

    /// Path to the working tree, if any.
    pub fn workdir(&self) -> Option<&Path> {
        self.repo.workdir()
    }

    // =========================================================================
    // Ref Resolution
    // =========================================================================

    /// Resolve a ref to the commit it points at.
    ///
    /// # Errors
    ///
    /// - [`GitError::RefNotFound`] if the ref doesn't exist
    pub fn resolve_ref(&self, refname: &str) -> Result<Oid, GitError> {
        let commit = self
            .repo
            .find_reference(refname)
            .and_then(|r| r.peel_to_commit())
            .map_err(|e| GitError::from_git2(e, refname))?;
        from_git2_oid(commit.id())
    }

    /// Resolve a ref, returning None if it doesn't exist.
    pub fn try_resolve_ref(&self, refname: &str) -> Result<Option<Oid>, GitError> {
        match self.resolve_ref(refname) {
            Ok(oid) => Ok(Some(oid)),
            Err(GitError::RefNotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Get HEAD commit OID.
    ///
    /// # Errors
    ///
    /// - [`GitError::RefNotFound`] if HEAD is unborn (new repository)
    pub fn head_oid(&self) -> Result<Oid, GitError> {
        let commit = self
            .repo
            .head()
            .and_then(|h| h.peel_to_commit())
            .map_err(|e| GitError::from_git2(e, "HEAD"))?;
        from_git2_oid(commit.id())
    }

    /// Head of a local branch, or None if the branch doesn't exist.
    pub fn branch_head(&self, branch: &BranchName) -> Result<Option<Oid>, GitError> {
        self.try_resolve_ref(&branch.refname())
    }

    /// Get the current branch name, if on a branch.
    pub fn current_branch(&self) -> Result<Option<BranchName>, GitError> {
        let head = match self.repo.head() {
            Ok(h) => h,
            Err(e) if e.code() == git2::ErrorCode::UnbornBranch => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(head.name().and_then(BranchName::from_refname))
    }

    /// Tags present in the repository.
    pub fn list_tags(&self) -> Result<Vec<String>, GitError> {
        let names = self.repo.tag_names(None)?;
        Ok(names.iter().flatten().map(String::from).collect())
    }

    // =========================================================================
    // Ref Mutation
    // =========================================================================

    /// Point a local branch at `oid`, creating or moving it.
    pub fn set_branch(&self, branch: &BranchName, oid: &Oid) -> Result<(), GitError> {
        self.repo
            .reference(
                &branch.refname(),
                to_git2_oid(oid)?,
                true,
                "autopropose: set branch",
            )
            .map_err(|e| GitError::from_git2(e, &branch.refname()))?;
        Ok(())
    }

    /// Make `branch` the current branch and force the working tree to match.
    pub fn checkout_branch(&self, branch: &BranchName) -> Result<(), GitError> {
        self.repo
            .set_head(&branch.refname())
            .map_err(|e| GitError::from_git2(e, &branch.refname()))?;
        self.repo
            .checkout_head(Some(git2::build::CheckoutBuilder::new().force()))?;
        Ok(())
    }

    /// Move the current branch to `oid`, resetting index and working tree.
    pub fn reset_hard(&self, oid: &Oid) -> Result<(), GitError> {
        let object = self
            .repo
            .find_object(to_git2_oid(oid)?, None)
            .map_err(|e| GitError::from_git2(e, oid.as_str()))?;
        self.repo.reset(&object, git2::ResetType::Hard, None)?;
        debug!(oid = %oid.short(8), "reset working tree");
        Ok(())
    }

    // =========================================================================
    // Ancestry Queries
    // =========================================================================

    /// Find the merge base of two commits, or None for unrelated histories.
    pub fn merge_base(&self, oid1: &Oid, oid2: &Oid) -> Result<Option<Oid>, GitError> {
        match self.repo.merge_base(to_git2_oid(oid1)?, to_git2_oid(oid2)?) {
            Ok(oid) => Ok(Some(from_git2_oid(oid)?)),
            Err(e) if e.code() == git2::ErrorCode::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Check if `ancestor` is an ancestor of `descendant`.
    ///
    /// A commit is its own ancestor.
    pub fn is_ancestor(&self, ancestor: &Oid, descendant: &Oid) -> Result<bool, GitError> {
        if ancestor == descendant {
            return Ok(true);
        }
        Ok(self
            .repo
            .graph_descendant_of(to_git2_oid(descendant)?, to_git2_oid(ancestor)?)?)
    }

    /// Tree of a commit.
    pub fn tree_of(&self, commit: &Oid) -> Result<Oid, GitError> {
        let commit = self
            .repo
            .find_commit(to_git2_oid(commit)?)
            .map_err(|e| GitError::from_git2(e, commit.as_str()))?;
        from_git2_oid(commit.tree_id())
    }

    // =========================================================================
    // Working Tree
    // =========================================================================

    /// Stage everything in the working tree and commit it on HEAD.
    ///
    /// Returns `None` when the staged tree equals HEAD's tree, i.e. there
    /// was nothing to commit.
    pub fn commit_all(&self, message: &str) -> Result<Option<Oid>, GitError> {
        if self.repo.is_bare() {
            return Err(GitError::BareRepo);
        }

        let mut index = self.repo.index()?;
        index.add_all(["*"].iter(), git2::IndexAddOption::DEFAULT, None)?;
        index.update_all(["*"].iter(), None)?;
        index.write()?;
        let tree_id = index.write_tree()?;

        let parent = match self.repo.head() {
            Ok(head) => Some(head.peel_to_commit()?),
            Err(e) if e.code() == git2::ErrorCode::UnbornBranch => None,
            Err(e) => return Err(e.into()),
        };
        if parent.as_ref().map(|p| p.tree_id()) == Some(tree_id) {
            debug!("nothing to commit");
            return Ok(None);
        }

        let signature = self.signature()?;
        let tree = self.repo.find_tree(tree_id)?;
        let parents: Vec<&git2::Commit> = parent.iter().collect();
        let oid = self.repo.commit(
            Some("HEAD"),
            &signature,
            &signature,
            message,
            &tree,
            &parents,
        )?;
        info!(oid = %oid, "committed changes");
        Ok(Some(from_git2_oid(oid)?))
    }

    /// The configured identity, or a fixed automation identity.
    fn signature(&self) -> Result<git2::Signature<'static>, GitError> {
        match self.repo.signature() {
            Ok(sig) => Ok(sig.to_owned()),
            Err(_) => Ok(git2::Signature::now(
                "autopropose",
                "autopropose@localhost",
            )?),
        }
    }

    /// Unified patch between two commits.
    pub fn diff_patch(&self, from: &Oid, to: &Oid) -> Result<String, GitError> {
        let old_tree = self.repo.find_commit(to_git2_oid(from)?)?.tree()?;
        let new_tree = self.repo.find_commit(to_git2_oid(to)?)?.tree()?;
        let diff = self
            .repo
            .diff_tree_to_tree(Some(&old_tree), Some(&new_tree), None)?;

        let mut patch = Vec::new();
        diff.print(git2::DiffFormat::Patch, |_delta, _hunk, line| {
            if matches!(line.origin(), '+' | '-' | ' ') {
                patch.push(line.origin() as u8);
            }
            patch.extend_from_slice(line.content());
            true
        })?;
        Ok(String::from_utf8_lossy(&patch).into_owned())
    }

    // =========================================================================
    // Remote Operations
    // =========================================================================

    /// List the refs a remote advertises.
    pub fn list_remote_refs(url: &str) -> Result<Vec<RemoteRef>, GitError> {
        let mut remote =
            git2::Remote::create_detached(url).map_err(|e| GitError::transport(e, url))?;
        let connection = remote
            .connect_auth(git2::Direction::Fetch, Some(remote_callbacks()), None)
            .map_err(|e| GitError::transport(e, url))?;
        let heads = connection.list().map_err(|e| GitError::transport(e, url))?;

        let mut refs = Vec::with_capacity(heads.len());
        for head in heads {
            refs.push(RemoteRef {
                name: head.name().to_string(),
                oid: from_git2_oid(head.oid())?,
            });
        }
        Ok(refs)
    }

    /// The branch a remote's HEAD points at.
    ///
    /// Returns `None` when the remote has no branches.
    pub fn remote_default_branch(url: &str) -> Result<Option<BranchName>, GitError> {
        let mut remote =
            git2::Remote::create_detached(url).map_err(|e| GitError::transport(e, url))?;
        let connection = remote
            .connect_auth(git2::Direction::Fetch, Some(remote_callbacks()), None)
            .map_err(|e| GitError::transport(e, url))?;
        match connection.default_branch() {
            Ok(buf) => Ok(buf.as_str().and_then(BranchName::from_refname)),
            Err(e) if e.code() == git2::ErrorCode::NotFound => Ok(None),
            Err(e) => Err(GitError::transport(e, url)),
        }
    }

    /// Fetch refspecs from `url` into this repository.
    ///
    /// Tags reachable from the fetched history come along.
    pub fn fetch(&self, url: &str, refspecs: &[String]) -> Result<(), GitError> {
        let mut remote = self
            .repo
            .remote_anonymous(url)
            .map_err(|e| GitError::transport(e, url))?;
        let mut options = git2::FetchOptions::new();
        options.remote_callbacks(remote_callbacks());
        options.download_tags(git2::AutotagOption::All);
        remote
            .fetch(refspecs, Some(&mut options), None)
            .map_err(|e| GitError::transport(e, url))?;
        debug!(url, ?refspecs, "fetched");
        Ok(())
    }

    /// Fetch the head of `branch` into the local ref `into` and return it.
    ///
    /// `into` should live outside `refs/heads/` so no local branch moves.
    pub fn fetch_branch(&self, branch: &Branch, into: &str) -> Result<Oid, GitError> {
        let refspec = format!("+{}:{}", branch.name().refname(), into);
        self.fetch(branch.url(), &[refspec])?;
        self.try_resolve_ref(into)?
            .ok_or_else(|| GitError::BranchNotFound {
                url: branch.url().to_string(),
                branch: branch.name().to_string(),
            })
    }

    /// Push a local branch to `target`.
    ///
    /// Without `overwrite` the remote only accepts fast-forwards; a diverged
    /// target fails with [`GitError::Diverged`].
    pub fn push(
        &self,
        local: &BranchName,
        target: &Branch,
        options: &PushOptions,
    ) -> Result<(), GitError> {
        if self.branch_head(local)?.is_none() {
            return Err(GitError::RefNotFound {
                refname: local.refname(),
            });
        }

        let force = if options.overwrite { "+" } else { "" };
        let mut refspecs = vec![format!(
            "{}{}:{}",
            force,
            local.refname(),
            target.name().refname()
        )];
        let local_tags = self.list_tags()?;
        for tag in &options.tags {
            if local_tags.contains(tag) {
                refspecs.push(format!("refs/tags/{0}:refs/tags/{0}", tag));
            } else {
                debug!(tag = %tag, "tag not present locally, not pushing");
            }
        }

        let mut remote = self
            .repo
            .remote_anonymous(target.url())
            .map_err(|e| GitError::transport(e, target.url()))?;

        let rejections: RefCell<Vec<(String, String)>> = RefCell::new(Vec::new());
        let mut callbacks = remote_callbacks();
        callbacks.push_update_reference(|refname, status| {
            if let Some(message) = status {
                warn!(refname, message, "push rejected");
                rejections
                    .borrow_mut()
                    .push((refname.to_string(), message.to_string()));
            }
            Ok(())
        });
        let mut push_options = git2::PushOptions::new();
        push_options.remote_callbacks(callbacks);

        info!(
            branch = %local,
            url = target.url(),
            target = %target.name(),
            overwrite = options.overwrite,
            "pushing"
        );
        remote
            .push(&refspecs, Some(&mut push_options))
            .map_err(|e| classify_push_error(e, target))?;

        let first_rejection = rejections.borrow().first().cloned();
        if let Some((refname, message)) = first_rejection {
            return Err(classify_rejection(&refname, &message, target));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target() -> Branch {
        Branch::new("https://example.com/repo.git", BranchName::new("main").unwrap())
    }

    mod push_classification {
        use super::*;

        #[test]
        fn not_fast_forward_is_diverged() {
            let err = git2::Error::new(
                git2::ErrorCode::NotFastForward,
                git2::ErrorClass::Reference,
                "cannot push non-fastforwardable reference",
            );
            assert!(matches!(
                classify_push_error(err, &target()),
                GitError::Diverged { .. }
            ));
        }

        #[test]
        fn auth_is_permission_denied() {
            let err = git2::Error::new(
                git2::ErrorCode::Auth,
                git2::ErrorClass::Http,
                "authentication required",
            );
            assert!(classify_push_error(err, &target()).is_permission_denied());
        }

        #[test]
        fn http_403_is_permission_denied() {
            let err = git2::Error::from_str("unexpected http status code: 403");
            assert!(classify_push_error(err, &target()).is_permission_denied());
        }

        #[test]
        fn daemon_refusal_is_permission_denied() {
            let err = git2::Error::from_str(
                "remote error: access denied or repository not exported: /up.git",
            );
            assert!(classify_push_error(err, &target()).is_permission_denied());
        }

        #[test]
        fn ssh_refusal_is_permission_denied() {
            let err = git2::Error::new(
                git2::ErrorCode::GenericError,
                git2::ErrorClass::Ssh,
                "git@example.com: Permission denied (publickey).",
            );
            assert!(classify_push_error(err, &target()).is_permission_denied());
        }

        #[test]
        fn unrelated_network_failures_are_transport() {
            let mirror = Branch::new(
                "https://mirror-4013.example.com/repo.git",
                BranchName::new("main").unwrap(),
            );
            for message in [
                "failed to connect to mirror-4013.example.com: connection timed out",
                "connection blocked by proxy",
                "clock skew detected; certificate not yet valid",
                "failed to send request to https://mirror-4013.example.com/repo.git",
            ] {
                let err = git2::Error::new(
                    git2::ErrorCode::GenericError,
                    git2::ErrorClass::Net,
                    message,
                );
                assert!(
                    matches!(classify_push_error(err, &mirror), GitError::Transport { .. }),
                    "{} should be a transport error",
                    message
                );
            }
        }

        #[test]
        fn denial_words_in_the_url_do_not_count() {
            let forbidden = Branch::new(
                "https://example.com/forbidden/repo.git",
                BranchName::new("main").unwrap(),
            );
            let err =
                git2::Error::from_str("failed to resolve https://example.com/forbidden/repo.git");
            assert!(!classify_push_error(err, &forbidden).is_permission_denied());
        }

        #[test]
        fn other_failures_are_transport() {
            let err = git2::Error::from_str("failed to resolve address for example.com");
            assert!(matches!(
                classify_push_error(err, &target()),
                GitError::Transport { .. }
            ));
        }

        #[test]
        fn rejection_messages() {
            assert!(matches!(
                classify_rejection("refs/heads/main", "non-fast-forward", &target()),
                GitError::Diverged { .. }
            ));
            assert!(classify_rejection(
                "refs/heads/main",
                "failed to lock file 'refs/heads/main.lock' for writing",
                &target()
            )
            .is_permission_denied());
            assert!(
                classify_rejection("refs/heads/main", "protected branch hook declined", &target())
                    .is_permission_denied()
            );
            assert!(matches!(
                classify_rejection("refs/heads/main", "funny refname", &target()),
                GitError::PushRejected { .. }
            ));
            assert!(matches!(
                classify_rejection(
                    "refs/heads/main",
                    "pre-receive hook blocked the update",
                    &target()
                ),
                GitError::PushRejected { .. }
            ));
        }
    }

    mod git_error {
        use super::*;

        #[test]
        fn not_found_on_ref_is_ref_not_found() {
            let err = git2::Error::new(
                git2::ErrorCode::NotFound,
                git2::ErrorClass::Reference,
                "no such ref",
            );
            assert!(matches!(
                GitError::from_git2(err, "refs/heads/x"),
                GitError::RefNotFound { .. }
            ));
        }

        #[test]
        fn not_found_on_object_is_object_not_found() {
            let err = git2::Error::new(
                git2::ErrorCode::NotFound,
                git2::ErrorClass::Odb,
                "object missing",
            );
            assert!(matches!(
                GitError::from_git2(err, "abc123"),
                GitError::ObjectNotFound { .. }
            ));
        }

        #[test]
        fn display_formatting() {
            let err = GitError::PermissionDenied {
                url: "https://example.com/r".to_string(),
                message: "403".to_string(),
            };
            assert_eq!(
                err.to_string(),
                "permission denied pushing to https://example.com/r: 403"
            );
        }
    }
}
