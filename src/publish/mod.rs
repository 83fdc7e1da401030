//! publish
//!
//! The publication workflow: take a change made in a disposable working
//! clone and deliver it as a push, a derived branch or a merge proposal,
//! idempotently across runs.
//!
//! # Architecture
//!
//! A run reconciles four pieces of state that drift independently between
//! runs: the working clone, the main branch, an earlier derived branch and
//! an earlier proposal.
//!
//! 1. **Resolve**: [`find_existing_proposed`] classifies the derived branch
//!    into a [`ResumeState`]
//! 2. **Acquire**: [`Workspace::acquire`] seeds the clone and restarts from
//!    main when the resume branch conflicts ([`merge_conflicts`])
//! 3. **Change**: the caller's callback edits and commits
//! 4. **Publish**: [`publish_changes`] pushes or proposes, refusing empty
//!    proposals ([`check_proposal_diff`])
//!
//! [`propose_or_push`] runs all four. [`iter_conflicted`] finds open
//! proposals that need such a run because the host can't merge them.
//!
//! # Invariants
//!
//! - The clone is seeded from exactly one of cached, resume or main branch
//! - Conflict and diff checks never move a branch, the index or the
//!   working tree
//! - Pushes to main never overwrite
//! - At most one open proposal is tracked per derived branch

mod conflict;
mod controller;
mod diff_gate;
mod error;
mod mode;
mod resolver;
mod runner;
mod workspace;

pub use conflict::{merge_conflicts, merge_conflicts_at};
pub use controller::{
    propose_changes, publish_changes, push_changes, push_derived_changes, CommitMessageFn,
    DescribeFn, ProposeRequest, PublishOptions, PublishResult,
};
pub use diff_gate::check_proposal_diff;
pub use error::PublishError;
pub use mode::PublishMode;
pub use resolver::{
    find_existing_proposed, iter_all_proposals, iter_conflicted, ConflictedProposal, ForgeProposal,
    ResumeState,
};
pub use runner::{propose_or_push, ChangeResult, RunOptions, RunOutcome};
pub use workspace::{ResultBranch, Workspace, WorkspaceOptions};
