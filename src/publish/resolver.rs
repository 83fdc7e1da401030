//! publish::resolver
//!
//! Decide whether a run resumes an earlier derived branch.
//!
//! # States
//!
//! | State | Condition | Resume from | Overwrite |
//! |---|---|---|---|
//! | `NoResume` | no derived branch | - | no |
//! | `ResumeOpen` | derived branch with an open proposal | derived branch | no |
//! | `ResumeStaleMerged` | proposals exist, none open | - | yes |
//! | `ResumeUnrelated` | derived branch, no proposal against main | - | caller's choice |
//!
//! A stale branch is overwritten because whatever it held has been merged
//! or rejected; starting again from main is the only sensible history.
//!
//! [`iter_conflicted`] works the other way round: starting from the
//! proposals the user has open, it finds those the host can no longer
//! merge so that they can be refreshed.

use tracing::{debug, info, warn};

use crate::core::types::BranchName;
use crate::forge::{Forge, ForgeError, MergeProposal, StatusFilter};
use crate::git::Branch;

/// Outcome of looking for an earlier derived branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResumeState {
    /// No derived branch exists yet.
    NoResume,
    /// The derived branch backs an open proposal; continue from it.
    ResumeOpen {
        /// The derived branch
        branch: Branch,
        /// Its open proposal
        proposal: MergeProposal,
    },
    /// Every proposal from the derived branch is closed or merged.
    ResumeStaleMerged {
        /// The derived branch
        branch: Branch,
    },
    /// The derived branch has never been proposed against main.
    ResumeUnrelated {
        /// The derived branch
        branch: Branch,
        /// Whether the caller allowed overwriting it
        overwrite: bool,
    },
}

impl ResumeState {
    /// Classify a derived branch from the proposals filed from it.
    ///
    /// The first open proposal wins.
    pub fn classify(
        derived: Option<Branch>,
        proposals: Vec<MergeProposal>,
        overwrite_unrelated: bool,
    ) -> ResumeState {
        let Some(branch) = derived else {
            return ResumeState::NoResume;
        };
        if proposals.is_empty() {
            return ResumeState::ResumeUnrelated {
                branch,
                overwrite: overwrite_unrelated,
            };
        }
        match proposals.into_iter().find(|p| p.is_open()) {
            Some(proposal) => ResumeState::ResumeOpen { branch, proposal },
            None => ResumeState::ResumeStaleMerged { branch },
        }
    }

    /// Branch to seed the workspace from, if resuming.
    pub fn resume_branch(&self) -> Option<&Branch> {
        match self {
            ResumeState::ResumeOpen { branch, .. } => Some(branch),
            _ => None,
        }
    }

    /// Whether republishing must overwrite the derived branch.
    pub fn overwrite(&self) -> bool {
        match self {
            ResumeState::NoResume | ResumeState::ResumeOpen { .. } => false,
            ResumeState::ResumeStaleMerged { .. } => true,
            ResumeState::ResumeUnrelated { overwrite, .. } => *overwrite,
        }
    }

    /// The open proposal being resumed.
    pub fn proposal(&self) -> Option<&MergeProposal> {
        match self {
            ResumeState::ResumeOpen { proposal, .. } => Some(proposal),
            _ => None,
        }
    }

    /// The derived branch found on the forge, whatever its state.
    pub fn derived_branch(&self) -> Option<&Branch> {
        match self {
            ResumeState::NoResume => None,
            ResumeState::ResumeOpen { branch, .. }
            | ResumeState::ResumeStaleMerged { branch }
            | ResumeState::ResumeUnrelated { branch, .. } => Some(branch),
        }
    }

    /// Split into resume branch, overwrite flag and resumed proposal.
    pub fn into_parts(self) -> (Option<Branch>, bool, Option<MergeProposal>) {
        let overwrite = self.overwrite();
        match self {
            ResumeState::ResumeOpen { branch, proposal } => (Some(branch), overwrite, Some(proposal)),
            _ => (None, overwrite, None),
        }
    }
}

/// Look up the derived branch `name` of `main` and the proposals filed
/// from it.
///
/// # Errors
///
/// Forge failures are propagated; a missing derived repository is
/// [`ResumeState::NoResume`], not an error.
pub async fn find_existing_proposed(
    main: &Branch,
    forge: &dyn Forge,
    name: &BranchName,
    owner: Option<&str>,
    overwrite_unrelated: bool,
) -> Result<ResumeState, ForgeError> {
    let Some(derived) = forge.get_derived_branch(main, name, owner).await? else {
        debug!(name = %name, "no derived branch");
        return Ok(ResumeState::NoResume);
    };

    let proposals = forge
        .iter_proposals(&derived, main, StatusFilter::All)
        .await?;
    let state = ResumeState::classify(Some(derived), proposals, overwrite_unrelated);
    match &state {
        ResumeState::ResumeOpen { proposal, .. } => {
            info!(url = %proposal.url, "resuming open proposal")
        }
        ResumeState::ResumeStaleMerged { .. } => info!(name = %name, "derived branch is stale"),
        ResumeState::ResumeUnrelated { overwrite, .. } => {
            info!(name = %name, overwrite, "derived branch has no proposal")
        }
        ResumeState::NoResume => {}
    }
    Ok(state)
}

/// A proposal found by [`iter_all_proposals`], with the forge hosting it.
#[derive(Clone)]
pub struct ForgeProposal<'a> {
    /// Forge the proposal lives on
    pub forge: &'a dyn Forge,
    /// The proposal
    pub proposal: MergeProposal,
}

/// An open proposal the host reports as unmergeable.
#[derive(Clone)]
pub struct ConflictedProposal<'a> {
    /// Branch the proposal targets
    pub main: Branch,
    /// Derived branch to resume from when refreshing
    pub resume_branch: Branch,
    /// Forge the proposal lives on
    pub forge: &'a dyn Forge,
    /// The proposal
    pub proposal: MergeProposal,
}

impl std::fmt::Debug for ConflictedProposal<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConflictedProposal")
            .field("main", &self.main)
            .field("resume_branch", &self.resume_branch)
            .field("forge", &self.forge.name())
            .field("proposal", &self.proposal.url)
            .finish()
    }
}

/// Every proposal of the authenticated user on each of `forges`, for each
/// status in `statuses`.
///
/// Forges without credentials are skipped.
///
/// # Errors
///
/// Any other forge failure is propagated.
pub async fn iter_all_proposals<'a>(
    forges: &[&'a dyn Forge],
    statuses: &[StatusFilter],
) -> Result<Vec<ForgeProposal<'a>>, ForgeError> {
    let mut found = Vec::new();
    for &forge in forges {
        for &status in statuses {
            match forge.iter_my_proposals(status).await {
                Ok(proposals) => found.extend(
                    proposals
                        .into_iter()
                        .map(|proposal| ForgeProposal { forge, proposal }),
                ),
                Err(ForgeError::AuthRequired(_)) => {
                    warn!(forge = forge.name(), "not logged in, skipping");
                    break;
                }
                Err(e) => return Err(e),
            }
        }
    }
    Ok(found)
}

/// Open proposals from derived branches called `name` that the host can
/// no longer merge.
///
/// Proposals whose mergeability the host hasn't computed are skipped.
///
/// # Errors
///
/// Forge failures other than missing credentials are propagated.
pub async fn iter_conflicted<'a>(
    forges: &[&'a dyn Forge],
    name: &BranchName,
) -> Result<Vec<ConflictedProposal<'a>>, ForgeError> {
    let mut conflicted = Vec::new();
    for ForgeProposal { forge, proposal } in
        iter_all_proposals(forges, &[StatusFilter::Open]).await?
    {
        match proposal.can_be_merged() {
            Ok(true) => continue,
            Ok(false) => {}
            Err(e) => {
                debug!(url = %proposal.url, error = %e, "mergeability unknown");
                continue;
            }
        }
        if proposal.source.name() != name {
            continue;
        }
        info!(url = %proposal.url, "proposal has conflicts");
        conflicted.push(ConflictedProposal {
            main: proposal.target.clone(),
            resume_branch: proposal.source.clone(),
            forge,
            proposal,
        });
    }
    Ok(conflicted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forge::mock::MockForge;
    use crate::forge::ProposalStatus;

    fn branch(url: &str, name: &str) -> Branch {
        Branch::new(url, BranchName::new(name).unwrap())
    }

    fn proposal(id: u64, status: ProposalStatus) -> MergeProposal {
        MergeProposal {
            id,
            url: format!("https://forge.invalid/{id}"),
            title: None,
            description: None,
            commit_message: None,
            labels: vec![],
            reviewers: vec![],
            owner: None,
            status,
            source: branch("/derived", "fix"),
            target: branch("/main", "main"),
            mergeable: None,
            dry_run: false,
        }
    }

    mod classify {
        use super::*;

        #[test]
        fn no_derived_branch() {
            let state = ResumeState::classify(None, vec![], true);
            assert_eq!(state, ResumeState::NoResume);
            assert!(!state.overwrite());
        }

        #[test]
        fn first_open_proposal_wins() {
            let state = ResumeState::classify(
                Some(branch("/derived", "fix")),
                vec![
                    proposal(1, ProposalStatus::Merged),
                    proposal(2, ProposalStatus::Open),
                    proposal(3, ProposalStatus::Open),
                ],
                false,
            );
            assert_eq!(state.proposal().map(|p| p.id), Some(2));
            assert!(state.resume_branch().is_some());
            assert!(!state.overwrite());
        }

        #[test]
        fn closed_unmerged_counts_as_stale() {
            let state = ResumeState::classify(
                Some(branch("/derived", "fix")),
                vec![proposal(1, ProposalStatus::Closed)],
                false,
            );
            assert!(matches!(state, ResumeState::ResumeStaleMerged { .. }));
            assert!(state.overwrite());
            assert!(state.resume_branch().is_none());
        }

        #[test]
        fn unrelated_follows_caller() {
            for allowed in [false, true] {
                let state =
                    ResumeState::classify(Some(branch("/derived", "fix")), vec![], allowed);
                assert!(matches!(state, ResumeState::ResumeUnrelated { .. }));
                assert_eq!(state.overwrite(), allowed);
                assert!(state.derived_branch().is_some());
            }
        }

        #[test]
        fn into_parts_only_resumes_open() {
            let (resume, overwrite, existing) = ResumeState::classify(
                Some(branch("/derived", "fix")),
                vec![proposal(7, ProposalStatus::Open)],
                false,
            )
            .into_parts();
            assert!(resume.is_some());
            assert!(!overwrite);
            assert_eq!(existing.map(|p| p.id), Some(7));
        }
    }

    #[tokio::test]
    async fn missing_derived_repository_is_no_resume() {
        let dir = tempfile::TempDir::new().unwrap();
        let forge = MockForge::new(dir.path());
        let main = branch("/srv/upstream", "main");
        let state = find_existing_proposed(
            &main,
            &forge,
            &BranchName::new("fix").unwrap(),
            None,
            false,
        )
        .await
        .unwrap();
        assert_eq!(state, ResumeState::NoResume);
    }

    mod conflicted {
        use super::*;
        use crate::forge::mock::FailOn;
        use crate::forge::ProposalRequest;

        async fn open(forge: &MockForge, name: &str, mergeable: Option<bool>) -> u64 {
            let proposal = forge
                .create_proposal(ProposalRequest {
                    source: branch("/derived", name),
                    target: branch("/main", "main"),
                    title: None,
                    description: format!("Run {}", name),
                    labels: vec![],
                    reviewers: vec![],
                    commit_message: None,
                    allow_collaboration: false,
                })
                .await
                .unwrap();
            forge.set_mergeable(proposal.id, mergeable);
            proposal.id
        }

        #[tokio::test]
        async fn only_unmergeable_proposals_for_the_name() {
            let dir = tempfile::TempDir::new().unwrap();
            let forge = MockForge::new(dir.path());
            open(&forge, "fix", Some(true)).await;
            let stuck = open(&forge, "fix", Some(false)).await;
            open(&forge, "fix", None).await;
            open(&forge, "other", Some(false)).await;
            let closed = open(&forge, "fix", Some(false)).await;
            forge.set_status(closed, ProposalStatus::Closed);

            let found = iter_conflicted(&[&forge], &BranchName::new("fix").unwrap())
                .await
                .unwrap();

            assert_eq!(found.len(), 1);
            assert_eq!(found[0].proposal.id, stuck);
            assert_eq!(found[0].main, branch("/main", "main"));
            assert_eq!(found[0].resume_branch, branch("/derived", "fix"));
            assert_eq!(found[0].forge.name(), "mock");
        }

        #[tokio::test]
        async fn forges_without_credentials_are_skipped() {
            let dir = tempfile::TempDir::new().unwrap();
            let anonymous = MockForge::new(dir.path().join("a"))
                .fail_on(FailOn::IterMyProposals(ForgeError::AuthRequired("no token".into())));
            let forge = MockForge::new(dir.path().join("b"));
            open(&forge, "fix", Some(false)).await;

            let found = iter_conflicted(&[&anonymous, &forge], &BranchName::new("fix").unwrap())
                .await
                .unwrap();
            assert_eq!(found.len(), 1);
        }

        #[tokio::test]
        async fn other_failures_propagate() {
            let dir = tempfile::TempDir::new().unwrap();
            let forge = MockForge::new(dir.path())
                .fail_on(FailOn::IterMyProposals(ForgeError::RateLimited));
            let result = iter_all_proposals(&[&forge], &[StatusFilter::Open]).await;
            assert!(matches!(result, Err(ForgeError::RateLimited)));
        }

        #[tokio::test]
        async fn all_proposals_per_status() {
            let dir = tempfile::TempDir::new().unwrap();
            let forge = MockForge::new(dir.path());
            open(&forge, "fix", None).await;
            let merged = open(&forge, "old", None).await;
            forge.set_status(merged, ProposalStatus::Merged);

            let found = iter_all_proposals(
                &[&forge],
                &[StatusFilter::Open, StatusFilter::Merged, StatusFilter::Closed],
            )
            .await
            .unwrap();
            let statuses: Vec<ProposalStatus> =
                found.iter().map(|f| f.proposal.status).collect();
            assert_eq!(statuses, vec![ProposalStatus::Open, ProposalStatus::Merged]);
        }
    }
}
