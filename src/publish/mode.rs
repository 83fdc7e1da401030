//! publish::mode
//!
//! How a change set reaches the remote.

use std::fmt;
use std::str::FromStr;

use super::error::PublishError;

/// Publication strategy.
///
/// The set is closed: parsing any other name fails with
/// [`PublishError::UnsupportedMode`].
///
/// ```
/// use autopropose::publish::PublishMode;
///
/// let mode: PublishMode = "attempt-push".parse().unwrap();
/// assert_eq!(mode, PublishMode::AttemptPush);
/// assert!("merge".parse::<PublishMode>().is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PublishMode {
    /// Push directly to the main branch; permission denial is fatal.
    Push,
    /// Push directly, falling back to a proposal when refused.
    AttemptPush,
    /// Push a derived branch and open or update a proposal.
    Propose,
    /// Push a derived branch without a proposal.
    PushDerived,
}

impl PublishMode {
    /// All modes, in the order they are documented.
    pub const ALL: [PublishMode; 4] = [
        PublishMode::Push,
        PublishMode::AttemptPush,
        PublishMode::Propose,
        PublishMode::PushDerived,
    ];

    /// Name used on the command line and in configuration.
    pub fn as_str(&self) -> &'static str {
        match self {
            PublishMode::Push => "push",
            PublishMode::AttemptPush => "attempt-push",
            PublishMode::Propose => "propose",
            PublishMode::PushDerived => "push-derived",
        }
    }

    /// Whether this mode pushes straight to the main branch.
    pub fn pushes_to_main(&self) -> bool {
        matches!(self, PublishMode::Push | PublishMode::AttemptPush)
    }
}

impl FromStr for PublishMode {
    type Err = PublishError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PublishMode::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| PublishError::UnsupportedMode(s.to_string()))
    }
}

impl fmt::Display for PublishMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
