//! forge::traits
//!
//! Forge trait definition for interacting with remote hosting services.
//!
//! # Design
//!
//! The `Forge` trait is async because forge operations involve network I/O.
//! All methods return `Result` so API failures stay typed. A forge knows how
//! to find and create derived branches (forks) for a main branch, and how to
//! find, create and update merge proposals between two branches.
//!
//! Proposal mutations take `&mut MergeProposal` and update the value in
//! place once the host has accepted the change.
//!
//! # Example
//!
//! ```ignore
//! use autopropose::forge::{Forge, StatusFilter};
//!
//! async fn open_proposals(forge: &dyn Forge, source: &Branch, target: &Branch) {
//!     let open = forge.iter_proposals(source, target, StatusFilter::Open).await?;
//!     for proposal in open {
//!         println!("{}", proposal.url);
//!     }
//! }
//! ```

use async_trait::async_trait;
use thiserror::Error;

use super::proposal::{MergeProposal, ProposalBuilder};
use crate::core::types::BranchName;
use crate::git::Branch;

/// Errors from forge operations.
///
/// These map to the common failure modes of hosting services.
#[derive(Debug, Clone, Error)]
pub enum ForgeError {
    /// No forge implementation handles this location.
    #[error("unsupported forge: {0}")]
    UnsupportedForge(String),

    /// Authentication is required but no credentials are available.
    #[error("authentication required: {0}")]
    AuthRequired(String),

    /// Authentication failed (invalid token, expired, insufficient permissions).
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// The requested resource was not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Rate limit exceeded.
    #[error("rate limited")]
    RateLimited,

    /// API returned an error.
    #[error("API error: {status} - {message}")]
    ApiError {
        /// HTTP status code
        status: u16,
        /// Error message from the API
        message: String,
    },

    /// Network or connection error.
    #[error("network error: {0}")]
    NetworkError(String),

    /// A closed proposal could not be reopened.
    #[error("cannot reopen proposal {url}: {reason}")]
    ReopenFailed {
        /// Web URL of the proposal
        url: String,
        /// Why the host refused
        reason: String,
    },

    /// The operation is not supported by this forge.
    #[error("not implemented: {0}")]
    NotImplemented(String),
}

/// Markup a forge renders proposal descriptions in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescriptionFormat {
    /// Plain text
    Plain,
    /// Markdown
    Markdown,
    /// HTML
    Html,
}

impl std::fmt::Display for DescriptionFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DescriptionFormat::Plain => write!(f, "plain"),
            DescriptionFormat::Markdown => write!(f, "markdown"),
            DescriptionFormat::Html => write!(f, "html"),
        }
    }
}

/// Which proposals `iter_proposals` returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusFilter {
    /// Open proposals only
    Open,
    /// Closed without merging
    Closed,
    /// Merged
    Merged,
    /// Every proposal
    All,
}

/// Where a derived branch lives once it has been published.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivedTarget {
    /// The derived branch, addressed the way proposals refer to it
    pub branch: Branch,
    /// Location to push the derived branch to
    pub push_url: String,
    /// Web URL of the derived repository
    pub public_url: String,
}

/// Everything needed to open a merge proposal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProposalRequest {
    /// Branch with the changes
    pub source: Branch,
    /// Branch to merge into
    pub target: Branch,
    /// Proposal title
    pub title: Option<String>,
    /// Proposal description
    pub description: String,
    /// Labels to attach
    pub labels: Vec<String>,
    /// Reviewers to request
    pub reviewers: Vec<String>,
    /// Commit message to use when merging
    pub commit_message: Option<String>,
    /// Let maintainers of the target push to the source branch
    pub allow_collaboration: bool,
}

/// The Forge trait for interacting with remote hosting services.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync` to allow use across async tasks.
///
/// # Error Handling
///
/// All methods return `Result<T, ForgeError>`. Callers should handle:
/// - `AuthRequired` / `AuthFailed`: credentials missing or refused
/// - `NotFound`: resource doesn't exist
/// - `NotImplemented`: the host has no such concept (e.g. merge commit
///   messages on GitHub)
/// - `RateLimited`: back off and retry later
#[async_trait]
pub trait Forge: Send + Sync {
    /// Get the forge name (e.g., "github", "gitlab").
    fn name(&self) -> &'static str;

    /// Markup used for proposal descriptions.
    fn description_format(&self) -> DescriptionFormat;

    /// Location to push to for `branch`.
    ///
    /// Defaults to the branch's own location.
    fn get_push_url(&self, branch: &Branch) -> String {
        branch.url().to_string()
    }

    /// Find the derived branch `name` owned by `owner` (the authenticated
    /// user when `None`).
    ///
    /// Returns `None` if the derived repository or the branch is missing.
    async fn get_derived_branch(
        &self,
        main: &Branch,
        name: &BranchName,
        owner: Option<&str>,
    ) -> Result<Option<Branch>, ForgeError>;

    /// Proposals from `source` into `target` with the given status.
    async fn iter_proposals(
        &self,
        source: &Branch,
        target: &Branch,
        status: StatusFilter,
    ) -> Result<Vec<MergeProposal>, ForgeError>;

    /// Proposals opened by the authenticated user, across all projects on
    /// this host.
    async fn iter_my_proposals(
        &self,
        status: StatusFilter,
    ) -> Result<Vec<MergeProposal>, ForgeError>;

    /// Ensure the derived repository for `main` exists under `owner` and
    /// return where the derived branch `name` should be pushed.
    async fn publish_derived(
        &self,
        main: &Branch,
        name: &BranchName,
        owner: Option<&str>,
    ) -> Result<DerivedTarget, ForgeError>;

    /// Start building a proposal from `source` into `target`.
    fn get_proposer(&self, source: &Branch, target: &Branch) -> ProposalBuilder {
        ProposalBuilder::new(source.clone(), target.clone())
    }

    /// Open a new proposal.
    async fn create_proposal(&self, request: ProposalRequest)
        -> Result<MergeProposal, ForgeError>;

    /// Replace a proposal's description.
    async fn set_description(
        &self,
        proposal: &mut MergeProposal,
        description: &str,
    ) -> Result<(), ForgeError>;

    /// Replace a proposal's merge commit message.
    async fn set_commit_message(
        &self,
        proposal: &mut MergeProposal,
        message: &str,
    ) -> Result<(), ForgeError>;

    /// Close a proposal without merging.
    async fn close_proposal(&self, proposal: &mut MergeProposal) -> Result<(), ForgeError>;

    /// Reopen a closed proposal.
    ///
    /// # Errors
    ///
    /// - `ReopenFailed` if the host refuses (e.g. the source was force-pushed)
    async fn reopen_proposal(&self, proposal: &mut MergeProposal) -> Result<(), ForgeError>;
}
