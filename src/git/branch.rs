//! git::branch
//!
//! Branch locations: a repository URL plus a branch name.
//!
//! Opening a location runs it through a fixed list of probers. The first
//! prober that recognizes the location normalizes it; if none does the
//! location is not a branch.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use super::interface::{Git, GitError};
use crate::core::types::{BranchName, Oid};

/// A named branch in a (possibly remote) repository.
///
/// Equality compares the location string and the branch name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Branch {
    url: String,
    name: BranchName,
}

type Prober = fn(&str) -> Option<String>;

/// Location probers, tried in order.
const PROBERS: &[(&str, Prober)] = &[
    ("local-path", probe_local_path),
    ("file-url", probe_file_url),
    ("remote-url", probe_remote_url),
    ("scp-like", probe_scp_like),
];

fn probe_local_path(location: &str) -> Option<String> {
    let path = Path::new(location);
    if !path.exists() {
        return None;
    }
    git2::Repository::open(path).ok()?;
    let canonical = path.canonicalize().ok()?;
    Some(canonical.to_string_lossy().into_owned())
}

fn probe_file_url(location: &str) -> Option<String> {
    location
        .strip_prefix("file://")
        .and_then(probe_local_path)
}

fn probe_remote_url(location: &str) -> Option<String> {
    let (scheme, rest) = location.split_once("://")?;
    let known = matches!(scheme, "http" | "https" | "ssh" | "git" | "git+ssh");
    (known && !rest.is_empty()).then(|| location.to_string())
}

fn probe_scp_like(location: &str) -> Option<String> {
    // user@host:path, without a scheme
    let (user_host, path) = location.split_once(':')?;
    let (user, host) = user_host.split_once('@')?;
    let valid = !user.is_empty() && !host.is_empty() && !path.is_empty() && !path.starts_with("//");
    valid.then(|| location.to_string())
}

/// Normalize a location, or fail with [`GitError::NotABranch`].
pub fn probe_location(location: &str) -> Result<String, GitError> {
    PROBERS
        .iter()
        .find_map(|(_, probe)| probe(location))
        .ok_or_else(|| GitError::NotABranch {
            url: location.to_string(),
        })
}

impl Branch {
    /// Build a branch reference without probing the location.
    pub fn new(url: impl Into<String>, name: BranchName) -> Self {
        Self {
            url: url.into(),
            name,
        }
    }

    /// Open a branch at `location`.
    ///
    /// With no `name`, the branch the remote's HEAD points at is used.
    ///
    /// # Errors
    ///
    /// - [`GitError::NotABranch`] if no prober recognizes the location
    /// - [`GitError::EmptyRepository`] if no name is given and the remote
    ///   has no default branch
    /// - [`GitError::InvalidRefName`] if `name` is not a valid branch name
    pub fn open(location: &str, name: Option<&str>) -> Result<Self, GitError> {
        let url = probe_location(location)?;
        let name = match name {
            Some(name) => BranchName::new(name)?,
            None => Git::remote_default_branch(&url)?
                .ok_or_else(|| GitError::EmptyRepository { url: url.clone() })?,
        };
        Ok(Self { url, name })
    }

    /// Repository location.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Branch name.
    pub fn name(&self) -> &BranchName {
        &self.name
    }

    /// Another branch in the same repository.
    pub fn colocated(&self, name: &BranchName) -> Branch {
        Branch::new(self.url.clone(), name.clone())
    }

    /// Current head of the branch, or None if it doesn't exist.
    pub fn head(&self) -> Result<Option<Oid>, GitError> {
        let refname = self.name.refname();
        Ok(Git::list_remote_refs(&self.url)?
            .into_iter()
            .find(|r| r.name == refname)
            .map(|r| r.oid))
    }
}

impl fmt::Display for Branch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.url, self.name)
    }
}

/// A colocated branch carried along with the main branch.
///
/// `from` is the name at the source repository and on push targets, `to`
/// the name used in the working clone.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ColocatedBranch {
    /// Name in the source repository and on push targets
    pub from: BranchName,
    /// Name in the working clone
    pub to: BranchName,
}

impl ColocatedBranch {
    /// A colocated branch that keeps its name.
    pub fn same(name: BranchName) -> Self {
        Self {
            from: name.clone(),
            to: name,
        }
    }
}

impl FromStr for ColocatedBranch {
    type Err = GitError;

    /// Parse `name` or `from:to`.
    ///
    /// `:` can never appear in a branch name, so the split is unambiguous.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(':') {
            Some((from, to)) => Ok(Self {
                from: BranchName::new(from)?,
                to: BranchName::new(to)?,
            }),
            None => Ok(Self::same(BranchName::new(s)?)),
        }
    }
}

impl fmt::Display for ColocatedBranch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.from == self.to {
            write!(f, "{}", self.from)
        } else {
            write!(f, "{}:{}", self.from, self.to)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    mod probing {
        use super::*;

        #[test]
        fn remote_schemes_accepted() {
            for url in [
                "https://github.com/owner/repo",
                "http://example.com/repo.git",
                "ssh://git@example.com/repo.git",
                "git://example.com/repo",
            ] {
                assert_eq!(probe_location(url).unwrap(), url);
            }
        }

        #[test]
        fn scp_like_accepted() {
            let url = "git@github.com:owner/repo.git";
            assert_eq!(probe_location(url).unwrap(), url);
        }

        #[test]
        fn unknown_locations_rejected() {
            for url in ["ftp://example.com/repo", "/definitely/not/here", "plain-word"] {
                assert!(
                    matches!(probe_location(url), Err(GitError::NotABranch { .. })),
                    "{url} should not probe"
                );
            }
        }

        #[test]
        fn local_repository_is_canonicalized() {
            let dir = TempDir::new().unwrap();
            git2::Repository::init_bare(dir.path()).unwrap();

            let probed = probe_location(dir.path().to_str().unwrap()).unwrap();
            let expected = dir.path().canonicalize().unwrap();
            assert_eq!(probed, expected.to_string_lossy());

            let via_file_url = format!("file://{}", dir.path().display());
            assert_eq!(probe_location(&via_file_url).unwrap(), probed);
        }

        #[test]
        fn plain_directory_is_not_a_branch() {
            let dir = TempDir::new().unwrap();
            assert!(probe_location(dir.path().to_str().unwrap()).is_err());
        }
    }

    mod colocated {
        use super::*;

        #[test]
        fn parse_single_name() {
            let colo: ColocatedBranch = "upstream".parse().unwrap();
            assert_eq!(colo.from, colo.to);
            assert_eq!(colo.to_string(), "upstream");
        }

        #[test]
        fn parse_rename() {
            let colo: ColocatedBranch = "pristine-tar:pristine".parse().unwrap();
            assert_eq!(colo.from.as_str(), "pristine-tar");
            assert_eq!(colo.to.as_str(), "pristine");
            assert_eq!(colo.to_string(), "pristine-tar:pristine");
        }

        #[test]
        fn parse_rejects_bad_names() {
            assert!("bad name".parse::<ColocatedBranch>().is_err());
            assert!("a:b:c".parse::<ColocatedBranch>().is_err());
        }
    }

    #[test]
    fn colocated_shares_url() {
        let main = Branch::new("https://example.com/r", BranchName::new("main").unwrap());
        let other = main.colocated(&BranchName::new("upstream").unwrap());
        assert_eq!(other.url(), main.url());
        assert_eq!(other.name().as_str(), "upstream");
        assert_ne!(other, main);
    }

    #[test]
    fn open_with_explicit_name_skips_remote() {
        let branch = Branch::open("https://example.com/r", Some("feature")).unwrap();
        assert_eq!(branch.name().as_str(), "feature");
        assert_eq!(branch.to_string(), "https://example.com/r [feature]");
    }
}
