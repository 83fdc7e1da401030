//! forge::mock
//!
//! Mock forge implementation for deterministic testing.
//!
//! # Design
//!
//! The mock forge keeps proposals in memory and hosts derived branches in
//! real bare repositories under a root directory, so pushes made by the
//! publish workflow land somewhere they can be inspected. Derived
//! repositories live at `<root>/<owner>/<main repository name>`.
//!
//! Failure scenarios are configured with [`FailOn`], and every call is
//! recorded as a [`MockOperation`].
//!
//! # Example
//!
//! ```
//! use autopropose::forge::mock::MockForge;
//! use autopropose::forge::Forge;
//!
//! let dir = tempfile::TempDir::new().unwrap();
//! let forge = MockForge::new(dir.path());
//! assert_eq!(forge.name(), "mock");
//! assert_eq!(forge.proposal_count(), 0);
//! ```

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::proposal::{MergeProposal, ProposalStatus};
use super::traits::{
    DerivedTarget, DescriptionFormat, Forge, ForgeError, ProposalRequest, StatusFilter,
};
use crate::core::types::BranchName;
use crate::git::{Branch, Git};

/// Owner used when callers don't name one.
pub const MOCK_USER: &str = "mock-user";

/// Mock forge for testing.
///
/// Thread-safe via internal `Arc<Mutex<...>>` wrapping; clones share state.
#[derive(Debug, Clone)]
pub struct MockForge {
    /// Internal state shared across clones.
    inner: Arc<Mutex<MockForgeInner>>,
    /// Directory holding derived repositories.
    root: PathBuf,
}

/// Internal mutable state.
#[derive(Debug)]
struct MockForgeInner {
    /// Stored proposals, in creation order.
    proposals: Vec<MergeProposal>,
    /// Next proposal number to assign.
    next_id: u64,
    /// Method to fail on (for testing error paths).
    fail_on: Option<FailOn>,
    /// Whether reopening closed proposals is refused.
    refuse_reopen: bool,
    /// Recorded operations for verification.
    operations: Vec<MockOperation>,
}

/// Configuration for which operation should fail.
#[derive(Debug, Clone)]
pub enum FailOn {
    /// Fail get_derived_branch with the given error.
    GetDerivedBranch(ForgeError),
    /// Fail iter_proposals with the given error.
    IterProposals(ForgeError),
    /// Fail iter_my_proposals with the given error.
    IterMyProposals(ForgeError),
    /// Fail publish_derived with the given error.
    PublishDerived(ForgeError),
    /// Fail create_proposal with the given error.
    CreateProposal(ForgeError),
    /// Fail set_description with the given error.
    SetDescription(ForgeError),
    /// Fail set_commit_message with the given error.
    SetCommitMessage(ForgeError),
    /// Fail close_proposal with the given error.
    CloseProposal(ForgeError),
}

/// Recorded operation for test verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockOperation {
    GetDerivedBranch {
        name: String,
        owner: Option<String>,
    },
    IterProposals {
        source: String,
        target: String,
    },
    IterMyProposals,
    PublishDerived {
        name: String,
        owner: Option<String>,
    },
    CreateProposal {
        source: String,
        target: String,
        title: Option<String>,
    },
    SetDescription {
        id: u64,
    },
    SetCommitMessage {
        id: u64,
    },
    CloseProposal {
        id: u64,
    },
    ReopenProposal {
        id: u64,
    },
}

impl MockForge {
    /// Create a mock forge hosting derived repositories under `root`.
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(MockForgeInner {
                proposals: Vec::new(),
                next_id: 1,
                fail_on: None,
                refuse_reopen: false,
                operations: Vec::new(),
            })),
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Configure the mock to fail on a specific operation.
    ///
    /// ```
    /// use autopropose::forge::mock::{FailOn, MockForge};
    /// use autopropose::forge::ForgeError;
    ///
    /// let dir = tempfile::TempDir::new().unwrap();
    /// let forge = MockForge::new(dir.path())
    ///     .fail_on(FailOn::CreateProposal(ForgeError::RateLimited));
    /// ```
    pub fn fail_on(self, fail_on: FailOn) -> Self {
        self.inner.lock().unwrap().fail_on = Some(fail_on);
        self
    }

    /// Clear the failure configuration.
    pub fn clear_fail_on(&self) {
        self.inner.lock().unwrap().fail_on = None;
    }

    /// Refuse to reopen closed proposals, as hosts do after a force push.
    pub fn refuse_reopen(self) -> Self {
        self.inner.lock().unwrap().refuse_reopen = true;
        self
    }

    /// Get all recorded operations.
    pub fn operations(&self) -> Vec<MockOperation> {
        self.inner.lock().unwrap().operations.clone()
    }

    /// Clear recorded operations.
    pub fn clear_operations(&self) {
        self.inner.lock().unwrap().operations.clear();
    }

    /// All stored proposals.
    pub fn proposals(&self) -> Vec<MergeProposal> {
        self.inner.lock().unwrap().proposals.clone()
    }

    /// A stored proposal by number.
    pub fn proposal(&self, id: u64) -> Option<MergeProposal> {
        self.inner
            .lock()
            .unwrap()
            .proposals
            .iter()
            .find(|p| p.id == id)
            .cloned()
    }

    /// Number of stored proposals.
    pub fn proposal_count(&self) -> usize {
        self.inner.lock().unwrap().proposals.len()
    }

    /// Change a stored proposal's status, as if someone acted on the host.
    pub fn set_status(&self, id: u64, status: ProposalStatus) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(proposal) = inner.proposals.iter_mut().find(|p| p.id == id) {
            proposal.status = status;
        }
    }

    /// Record whether the host can merge proposal `id`.
    pub fn set_mergeable(&self, id: u64, mergeable: Option<bool>) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(proposal) = inner.proposals.iter_mut().find(|p| p.id == id) {
            proposal.mergeable = mergeable;
        }
    }

    /// Location of the derived repository for `main` owned by `owner`.
    pub fn derived_path(&self, main: &Branch, owner: Option<&str>) -> PathBuf {
        let base = main
            .url()
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or("repo");
        let base = base.strip_suffix(".git").unwrap_or(base);
        self.root.join(owner.unwrap_or(MOCK_USER)).join(base)
    }

    fn derived_url(&self, main: &Branch, owner: Option<&str>) -> String {
        self.derived_path(main, owner).to_string_lossy().into_owned()
    }

    /// Record an operation.
    fn record(&self, op: MockOperation) {
        self.inner.lock().unwrap().operations.push(op);
    }

    /// Check if we should fail and return the error if so.
    fn check_fail(&self, expected: &str) -> Result<(), ForgeError> {
        let inner = self.inner.lock().unwrap();
        let err = match &inner.fail_on {
            Some(FailOn::GetDerivedBranch(e)) if expected == "get_derived_branch" => e,
            Some(FailOn::IterProposals(e)) if expected == "iter_proposals" => e,
            Some(FailOn::IterMyProposals(e)) if expected == "iter_my_proposals" => e,
            Some(FailOn::PublishDerived(e)) if expected == "publish_derived" => e,
            Some(FailOn::CreateProposal(e)) if expected == "create_proposal" => e,
            Some(FailOn::SetDescription(e)) if expected == "set_description" => e,
            Some(FailOn::SetCommitMessage(e)) if expected == "set_commit_message" => e,
            Some(FailOn::CloseProposal(e)) if expected == "close_proposal" => e,
            _ => return Ok(()),
        };
        Err(err.clone())
    }

    /// Apply `update` to the stored copy of `proposal` and mirror it back.
    fn update_stored(
        &self,
        proposal: &mut MergeProposal,
        update: impl FnOnce(&mut MergeProposal),
    ) -> Result<(), ForgeError> {
        let mut inner = self.inner.lock().unwrap();
        let stored = inner
            .proposals
            .iter_mut()
            .find(|p| p.id == proposal.id)
            .ok_or_else(|| ForgeError::NotFound(format!("proposal #{}", proposal.id)))?;
        update(stored);
        *proposal = stored.clone();
        Ok(())
    }
}

fn git_failure(err: crate::git::GitError) -> ForgeError {
    ForgeError::NetworkError(err.to_string())
}

#[async_trait]
impl Forge for MockForge {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn description_format(&self) -> DescriptionFormat {
        DescriptionFormat::Markdown
    }

    async fn get_derived_branch(
        &self,
        main: &Branch,
        name: &BranchName,
        owner: Option<&str>,
    ) -> Result<Option<Branch>, ForgeError> {
        self.record(MockOperation::GetDerivedBranch {
            name: name.to_string(),
            owner: owner.map(String::from),
        });
        self.check_fail("get_derived_branch")?;

        if !self.derived_path(main, owner).exists() {
            return Ok(None);
        }
        let branch = Branch::new(self.derived_url(main, owner), name.clone());
        match branch.head().map_err(git_failure)? {
            Some(_) => Ok(Some(branch)),
            None => Ok(None),
        }
    }

    async fn iter_proposals(
        &self,
        source: &Branch,
        target: &Branch,
        status: StatusFilter,
    ) -> Result<Vec<MergeProposal>, ForgeError> {
        self.record(MockOperation::IterProposals {
            source: source.to_string(),
            target: target.to_string(),
        });
        self.check_fail("iter_proposals")?;

        let inner = self.inner.lock().unwrap();
        Ok(inner
            .proposals
            .iter()
            .filter(|p| &p.source == source && &p.target == target && p.matches(status))
            .cloned()
            .collect())
    }

    async fn iter_my_proposals(
        &self,
        status: StatusFilter,
    ) -> Result<Vec<MergeProposal>, ForgeError> {
        self.record(MockOperation::IterMyProposals);
        self.check_fail("iter_my_proposals")?;

        let inner = self.inner.lock().unwrap();
        Ok(inner
            .proposals
            .iter()
            .filter(|p| p.owner.as_deref() == Some(MOCK_USER) && p.matches(status))
            .cloned()
            .collect())
    }

    async fn publish_derived(
        &self,
        main: &Branch,
        name: &BranchName,
        owner: Option<&str>,
    ) -> Result<DerivedTarget, ForgeError> {
        self.record(MockOperation::PublishDerived {
            name: name.to_string(),
            owner: owner.map(String::from),
        });
        self.check_fail("publish_derived")?;

        let path = self.derived_path(main, owner);
        if !path.exists() {
            std::fs::create_dir_all(&path).map_err(|e| ForgeError::NetworkError(e.to_string()))?;
            Git::init_bare(&path).map_err(git_failure)?;
        }
        let url = self.derived_url(main, owner);
        Ok(DerivedTarget {
            branch: Branch::new(url.clone(), name.clone()),
            push_url: url.clone(),
            public_url: format!("file://{}#{}", url, name),
        })
    }

    async fn create_proposal(
        &self,
        request: ProposalRequest,
    ) -> Result<MergeProposal, ForgeError> {
        self.record(MockOperation::CreateProposal {
            source: request.source.to_string(),
            target: request.target.to_string(),
            title: request.title.clone(),
        });
        self.check_fail("create_proposal")?;

        let mut inner = self.inner.lock().unwrap();
        let id = inner.next_id;
        inner.next_id += 1;

        let proposal = MergeProposal {
            id,
            url: format!("https://forge.invalid/mock/proposals/{}", id),
            title: request.title,
            description: Some(request.description),
            commit_message: request.commit_message,
            labels: request.labels,
            reviewers: request.reviewers,
            owner: Some(MOCK_USER.to_string()),
            status: ProposalStatus::Open,
            source: request.source,
            target: request.target,
            mergeable: None,
            dry_run: false,
        };
        inner.proposals.push(proposal.clone());
        Ok(proposal)
    }

    async fn set_description(
        &self,
        proposal: &mut MergeProposal,
        description: &str,
    ) -> Result<(), ForgeError> {
        self.record(MockOperation::SetDescription { id: proposal.id });
        self.check_fail("set_description")?;
        self.update_stored(proposal, |p| p.description = Some(description.to_string()))
    }

    async fn set_commit_message(
        &self,
        proposal: &mut MergeProposal,
        message: &str,
    ) -> Result<(), ForgeError> {
        self.record(MockOperation::SetCommitMessage { id: proposal.id });
        self.check_fail("set_commit_message")?;
        self.update_stored(proposal, |p| p.commit_message = Some(message.to_string()))
    }

    async fn close_proposal(&self, proposal: &mut MergeProposal) -> Result<(), ForgeError> {
        self.record(MockOperation::CloseProposal { id: proposal.id });
        self.check_fail("close_proposal")?;
        self.update_stored(proposal, |p| p.status = ProposalStatus::Closed)
    }

    async fn reopen_proposal(&self, proposal: &mut MergeProposal) -> Result<(), ForgeError> {
        self.record(MockOperation::ReopenProposal { id: proposal.id });
        if self.inner.lock().unwrap().refuse_reopen {
            return Err(ForgeError::ReopenFailed {
                url: proposal.url.clone(),
                reason: "source branch was rewritten".to_string(),
            });
        }
        self.update_stored(proposal, |p| p.status = ProposalStatus::Open)
    }
}
