//! forge::proposal
//!
//! Merge proposals and the builder used to open them.

use super::traits::{Forge, ForgeError, ProposalRequest, StatusFilter};
use crate::git::Branch;

/// Proposal state on the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProposalStatus {
    /// Open and awaiting review/merge
    Open,
    /// Closed without being merged
    Closed,
    /// Merged
    Merged,
}

impl std::fmt::Display for ProposalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProposalStatus::Open => write!(f, "open"),
            ProposalStatus::Closed => write!(f, "closed"),
            ProposalStatus::Merged => write!(f, "merged"),
        }
    }
}

/// A merge proposal (pull request, merge request) between two branches.
///
/// Proposals with `dry_run` set exist only in memory: they were synthesized
/// instead of created, or copied from a real proposal so that updates made
/// during a dry run never reach the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeProposal {
    /// Host-assigned number
    pub id: u64,
    /// Web URL
    pub url: String,
    /// Title
    pub title: Option<String>,
    /// Description
    pub description: Option<String>,
    /// Merge commit message, where the host supports one
    pub commit_message: Option<String>,
    /// Labels
    pub labels: Vec<String>,
    /// Requested reviewers
    pub reviewers: Vec<String>,
    /// Owner of the source branch
    pub owner: Option<String>,
    /// Current state
    pub status: ProposalStatus,
    /// Branch with the changes
    pub source: Branch,
    /// Branch to merge into
    pub target: Branch,
    /// Whether the host can merge it as is; `None` until the host has
    /// checked
    pub mergeable: Option<bool>,
    /// In-memory only
    pub dry_run: bool,
}

impl MergeProposal {
    /// Whether the proposal is open.
    pub fn is_open(&self) -> bool {
        self.status == ProposalStatus::Open
    }

    /// Whether the proposal was closed without merging.
    pub fn is_closed(&self) -> bool {
        self.status == ProposalStatus::Closed
    }

    /// Whether the proposal was merged.
    pub fn is_merged(&self) -> bool {
        self.status == ProposalStatus::Merged
    }

    /// Whether the host reports the proposal as mergeable.
    ///
    /// # Errors
    ///
    /// - `NotImplemented` if the host has not computed mergeability
    pub fn can_be_merged(&self) -> Result<bool, ForgeError> {
        self.mergeable.ok_or_else(|| {
            ForgeError::NotImplemented(format!("mergeability of proposal {}", self.url))
        })
    }

    /// Whether the proposal passes `filter`.
    pub fn matches(&self, filter: StatusFilter) -> bool {
        match filter {
            StatusFilter::All => true,
            StatusFilter::Open => self.is_open(),
            StatusFilter::Closed => self.is_closed(),
            StatusFilter::Merged => self.is_merged(),
        }
    }

    /// In-memory copy of this proposal for a dry run.
    pub fn to_dry_run(&self) -> MergeProposal {
        MergeProposal {
            dry_run: true,
            ..self.clone()
        }
    }
}

/// Derive a proposal title from its description.
///
/// Takes the first non-empty line, drops markdown heading markers and cuts
/// at the end of the first sentence.
pub fn title_from_description(description: &str) -> Option<String> {
    let line = description
        .lines()
        .map(|l| l.trim_start_matches('#').trim())
        .find(|l| !l.is_empty())?;
    let sentence = match line.find(". ") {
        Some(end) => &line[..end],
        None => line.trim_end_matches('.'),
    };
    (!sentence.is_empty()).then(|| sentence.to_string())
}

/// Builder for a new merge proposal.
///
/// Obtained from [`Forge::get_proposer`].
#[derive(Debug, Clone)]
pub struct ProposalBuilder {
    request: ProposalRequest,
}

impl ProposalBuilder {
    /// Start a proposal from `source` into `target`.
    pub fn new(source: Branch, target: Branch) -> Self {
        Self {
            request: ProposalRequest {
                source,
                target,
                title: None,
                description: String::new(),
                labels: Vec::new(),
                reviewers: Vec::new(),
                commit_message: None,
                allow_collaboration: false,
            },
        }
    }

    /// Set the description.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.request.description = description.into();
        self
    }

    /// Set an explicit title instead of deriving one.
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.request.title = Some(title.into());
        self
    }

    /// Attach labels.
    pub fn labels(mut self, labels: &[String]) -> Self {
        self.request.labels = labels.to_vec();
        self
    }

    /// Request reviewers.
    pub fn reviewers(mut self, reviewers: &[String]) -> Self {
        self.request.reviewers = reviewers.to_vec();
        self
    }

    /// Set the merge commit message.
    pub fn commit_message(mut self, message: Option<String>) -> Self {
        self.request.commit_message = message;
        self
    }

    /// Let target maintainers push to the source branch.
    pub fn allow_collaboration(mut self, allow: bool) -> Self {
        self.request.allow_collaboration = allow;
        self
    }

    /// Finish the request, deriving the title if none was set.
    pub fn build(mut self) -> ProposalRequest {
        if self.request.title.is_none() {
            self.request.title = title_from_description(&self.request.description);
        }
        self.request
    }

    /// Open the proposal on `forge`.
    pub async fn create(self, forge: &dyn Forge) -> Result<MergeProposal, ForgeError> {
        forge.create_proposal(self.build()).await
    }

    /// Synthesize the proposal without contacting the host.
    pub fn dry_run(self) -> MergeProposal {
        let request = self.build();
        MergeProposal {
            id: 0,
            url: String::new(),
            title: request.title,
            description: Some(request.description),
            commit_message: request.commit_message,
            labels: request.labels,
            reviewers: request.reviewers,
            owner: None,
            status: ProposalStatus::Open,
            source: request.source,
            target: request.target,
            mergeable: None,
            dry_run: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::BranchName;

    fn branch(url: &str, name: &str) -> Branch {
        Branch::new(url, BranchName::new(name).unwrap())
    }

    mod title {
        use super::*;

        #[test]
        fn first_line_wins() {
            assert_eq!(
                title_from_description("Fix typos\n\nLonger explanation."),
                Some("Fix typos".to_string())
            );
        }

        #[test]
        fn heading_markers_stripped() {
            assert_eq!(
                title_from_description("\n## Update copyright years\n"),
                Some("Update copyright years".to_string())
            );
        }

        #[test]
        fn cut_at_first_sentence() {
            assert_eq!(
                title_from_description("Fix lintian warnings. Also bump standards."),
                Some("Fix lintian warnings".to_string())
            );
            assert_eq!(
                title_from_description("Remove trailing whitespace."),
                Some("Remove trailing whitespace".to_string())
            );
        }

        #[test]
        fn blank_description_has_no_title() {
            assert_eq!(title_from_description(""), None);
            assert_eq!(title_from_description("  \n#\n"), None);
        }
    }

    mod builder {
        use super::*;

        #[test]
        fn build_derives_title() {
            let request = ProposalBuilder::new(branch("/s", "fix"), branch("/t", "main"))
                .description("Fix the frobnicator\n\nDetails")
                .labels(&["automated".to_string()])
                .build();
            assert_eq!(request.title.as_deref(), Some("Fix the frobnicator"));
            assert_eq!(request.labels, vec!["automated"]);
            assert!(!request.allow_collaboration);
        }

        #[test]
        fn explicit_title_kept() {
            let request = ProposalBuilder::new(branch("/s", "fix"), branch("/t", "main"))
                .description("Body")
                .title("Custom")
                .build();
            assert_eq!(request.title.as_deref(), Some("Custom"));
        }

        #[test]
        fn dry_run_is_open_and_marked() {
            let proposal = ProposalBuilder::new(branch("/s", "fix"), branch("/t", "main"))
                .description("Fix things")
                .commit_message(Some("Fix things".to_string()))
                .dry_run();
            assert!(proposal.dry_run);
            assert!(proposal.is_open());
            assert_eq!(proposal.description.as_deref(), Some("Fix things"));
            assert_eq!(proposal.target.name().as_str(), "main");
        }
    }

    #[test]
    fn to_dry_run_copies() {
        let real = ProposalBuilder::new(branch("/s", "fix"), branch("/t", "main"))
            .description("x")
            .dry_run();
        let real = MergeProposal {
            mergeable: None,
            dry_run: false,
            id: 7,
            status: ProposalStatus::Closed,
            ..real
        };
        let copy = real.to_dry_run();
        assert!(copy.dry_run);
        assert_eq!(copy.id, 7);
        assert!(copy.is_closed());
        assert!(!real.dry_run);
    }

    #[test]
    fn status_filter() {
        let mut proposal = ProposalBuilder::new(branch("/s", "fix"), branch("/t", "main")).dry_run();
        assert!(proposal.matches(StatusFilter::Open));
        assert!(proposal.matches(StatusFilter::All));
        proposal.status = ProposalStatus::Merged;
        assert!(proposal.matches(StatusFilter::Merged));
        assert!(!proposal.matches(StatusFilter::Closed));
        assert_eq!(proposal.status.to_string(), "merged");
    }
}
