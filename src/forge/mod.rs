//! forge
//!
//! Abstraction for hosting services (GitHub, GitLab, etc.).
//!
//! # Architecture
//!
//! The `Forge` trait defines the interface for interacting with hosting
//! services: derived branches, merge proposals and their metadata. The
//! publish workflow resolves a forge with [`get_forge`] rather than
//! importing specific implementations.
//!
//! # Modules
//!
//! - `traits`: Core `Forge` trait and request types
//! - `proposal`: `MergeProposal` and `ProposalBuilder`
//! - [`github`]: GitHub implementation using the REST API
//! - `gitlab`: GitLab implementation (requires `gitlab` feature)
//! - [`mock`]: Mock implementation for deterministic testing
//! - `factory`: Forge selection and creation
//!
//! # Example
//!
//! ```ignore
//! use autopropose::forge::{get_forge, Forge};
//!
//! let forge = get_forge(&main, &config.forge())?;
//! let proposal = forge
//!     .get_proposer(&derived, &main)
//!     .description("Fix typos")
//!     .labels(&["automated".to_string()])
//!     .create(forge.as_ref())
//!     .await?;
//! println!("Created {}", proposal.url);
//! ```

mod factory;
pub mod github;
#[cfg(feature = "gitlab")]
pub mod gitlab;
pub mod mock;
mod proposal;
mod traits;

pub use factory::{create_forge, detect_provider, get_forge, valid_forge_names, ForgeProvider};
pub use proposal::{title_from_description, MergeProposal, ProposalBuilder, ProposalStatus};
pub use traits::*;
