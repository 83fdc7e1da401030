//! git
//!
//! Single interface for all Git operations.
//!
//! # Architecture
//!
//! This module is the **only doorway** to Git. Repository reads and writes,
//! fetches, pushes and merge previews flow through [`Git`]. No other module
//! imports `git2`, and nothing shells out to the git CLI.
//!
//! # Responsibilities
//!
//! - Branch locations and their probing ([`Branch`])
//! - Working clones ([`create_sprout`])
//! - Ref reads and updates, ancestry queries
//! - Fetch, push and ls-remote with classified failures
//! - In-memory merge previews with pluggable content hooks
//!
//! # Example
//!
//! ```ignore
//! use autopropose::git::{create_sprout, Branch, HookPolicy};
//!
//! let main = Branch::open("https://github.com/owner/repo", None)?;
//! let git = create_sprout(&main, &[], dir.path())?;
//! let head = git.head_oid()?;
//! let preview = git.merge_preview(&head, &other, HookPolicy::Suspended)?;
//! ```

mod branch;
mod interface;
mod merge;
mod sprout;

pub use branch::{probe_location, Branch, ColocatedBranch};
pub use interface::{Git, GitError, PushOptions, RemoteRef};
pub use merge::{HookPolicy, MergeHook, MergePreview};
pub use sprout::create_sprout;
