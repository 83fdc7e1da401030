//! autopropose - deliver automated changes to remote branches
//!
//! autopropose takes a change-producing action, applies it to a disposable
//! clone of a target branch and publishes the result: a direct push, a push to
//! an owned derived branch, or a merge proposal on the hosting platform.
//! Repeated runs are idempotent. An existing derived branch and its proposal
//! are resumed instead of duplicated, and proposals that would not change
//! anything are refused.
//!
//! # Architecture
//!
//! - [`cli`] - Command-line interface (`ap run`, `ap config`, `ap completion`)
//! - [`publish`] - The publication workflow: workspace, conflict and diff
//!   checks, resume resolution and the push/propose decision tree
//! - [`forge`] - Abstraction for hosting platforms (GitHub, GitLab, mock)
//! - [`git`] - Single interface for all Git operations
//! - [`core`] - Domain types and configuration
//! - [`ui`] - User-facing output
//!
//! # Invariants
//!
//! 1. The working clone is seeded from exactly one source branch
//! 2. At most one open proposal is tracked per derived branch name and owner
//! 3. Pushes to the main branch never rewrite its history
//! 4. The working clone's storage is released on every exit path unless the
//!    caller takes ownership of it

pub mod cli;
pub mod core;
pub mod forge;
pub mod git;
pub mod publish;
pub mod ui;
