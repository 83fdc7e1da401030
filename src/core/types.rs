//! core::types
//!
//! Strong types for branch names and revisions.
//!
//! # Types
//!
//! - [`BranchName`] - Validated Git branch name
//! - [`Oid`] - Git object identifier (SHA)
//!
//! # Validation
//!
//! Both types validate at construction time, so a value that exists is a
//! value Git will accept.
//!
//! ```
//! use autopropose::core::types::{BranchName, Oid};
//!
//! let branch = BranchName::new("fix-typos").unwrap();
//! assert_eq!(branch.as_str(), "fix-typos");
//!
//! assert!(BranchName::new("bad..name").is_err());
//! assert!(Oid::new("not-a-sha").is_err());
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from type validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid branch name '{name}': {reason}")]
    InvalidBranchName { name: String, reason: &'static str },

    #[error("invalid object id: {0}")]
    InvalidOid(String),
}

/// Substrings Git refuses anywhere in a ref name, with the reason reported.
const FORBIDDEN_SEQUENCES: &[(&str, &str)] = &[
    ("..", "contains '..'"),
    ("@{", "contains '@{'"),
    ("//", "contains '//'"),
    ("/.", "has a component starting with '.'"),
    (".lock/", "has a component ending with '.lock'"),
];

/// Characters Git refuses anywhere in a ref name.
const FORBIDDEN_CHARS: &[char] = &[' ', '~', '^', ':', '\\', '?', '*', '['];

/// A validated Git branch name.
///
/// Follows `git check-ref-format --branch`: no empty names, no `@`, no
/// leading `.`/`-`, no trailing `/` or `.lock`, none of `..`, `@{`, `//`,
/// no spaces, control characters or glob/revision syntax.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BranchName(String);

impl BranchName {
    /// Create a new validated branch name.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidBranchName` if Git would reject the name.
    pub fn new(name: impl Into<String>) -> Result<Self, TypeError> {
        let name = name.into();
        match Self::check(&name) {
            Ok(()) => Ok(Self(name)),
            Err(reason) => Err(TypeError::InvalidBranchName { name, reason }),
        }
    }

    fn check(name: &str) -> Result<(), &'static str> {
        if name.is_empty() {
            return Err("is empty");
        }
        if name == "@" {
            return Err("is the reserved name '@'");
        }
        if name.starts_with('.') || name.starts_with('-') {
            return Err("starts with '.' or '-'");
        }
        if name.ends_with('/') || name.ends_with(".lock") || name.ends_with('.') {
            return Err("ends with '/', '.' or '.lock'");
        }
        if let Some((_, reason)) = FORBIDDEN_SEQUENCES
            .iter()
            .find(|(needle, _)| name.contains(needle))
        {
            return Err(*reason);
        }
        if name.chars().any(|c| FORBIDDEN_CHARS.contains(&c)) {
            return Err("contains a space or one of ~^:\\?*[");
        }
        if name.chars().any(|c| c.is_ascii_control()) {
            return Err("contains control characters");
        }
        Ok(())
    }

    /// Get the branch name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The full ref name, `refs/heads/<name>`.
    pub fn refname(&self) -> String {
        format!("refs/heads/{}", self.0)
    }

    /// Parse a `refs/heads/<name>` ref back into a branch name.
    ///
    /// Returns `None` for refs outside `refs/heads/`.
    pub fn from_refname(refname: &str) -> Option<Self> {
        refname
            .strip_prefix("refs/heads/")
            .and_then(|name| Self::new(name).ok())
    }
}

impl TryFrom<String> for BranchName {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<BranchName> for String {
    fn from(name: BranchName) -> Self {
        name.0
    }
}

impl AsRef<str> for BranchName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for BranchName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A Git object identifier (SHA-1 or SHA-256), normalized to lowercase.
///
/// ```
/// use autopropose::core::types::Oid;
///
/// let oid = Oid::new("ABC123DEF4567890ABC123DEF4567890ABC12345").unwrap();
/// assert_eq!(oid.as_str(), "abc123def4567890abc123def4567890abc12345");
/// assert_eq!(oid.short(7), "abc123d");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Oid(String);

impl Oid {
    /// Create a new validated object id.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidOid` unless the input is 40 or 64 hex digits.
    pub fn new(oid: impl Into<String>) -> Result<Self, TypeError> {
        let oid = oid.into().to_ascii_lowercase();
        if oid.len() != 40 && oid.len() != 64 {
            return Err(TypeError::InvalidOid(format!(
                "expected 40 or 64 hex characters, got {}",
                oid.len()
            )));
        }
        if !oid.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(TypeError::InvalidOid(format!("'{}' is not hexadecimal", oid)));
        }
        Ok(Self(oid))
    }

    /// Abbreviated form: the first `len` characters, or the whole id.
    pub fn short(&self, len: usize) -> &str {
        &self.0[..len.min(self.0.len())]
    }

    /// Get the object id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Oid {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<Oid> for String {
    fn from(oid: Oid) -> Self {
        oid.0
    }
}

impl AsRef<str> for Oid {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Oid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
