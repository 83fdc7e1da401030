//! forge::factory
//!
//! Forge selection and creation.
//!
//! # Design
//!
//! This module is the central place for forge selection. The publish
//! workflow calls [`get_forge`] instead of importing specific forge
//! implementations, so core logic only ever sees `dyn Forge`.
//!
//! # Provider Detection
//!
//! The provider is detected by probing the main branch URL:
//! - GitHub URLs (`github.com`) → `GitHubForge`
//! - GitLab URLs (`gitlab.com` and configured hosts) → `GitLabForge`
//!   (when the `gitlab` feature is enabled)
//!
//! Tokens are read from environment variables named in the forge settings.
//!
//! # Example
//!
//! ```ignore
//! use autopropose::forge::get_forge;
//!
//! let forge = get_forge(&main_branch, &config.forge())?;
//! println!("publishing through {}", forge.name());
//! ```

use super::github::{parse_github_url, GitHubForge};
use super::traits::{Forge, ForgeError};
use crate::core::config::ForgeConfig;
use crate::git::Branch;

#[cfg(feature = "gitlab")]
use super::gitlab::{parse_gitlab_url, GitLabForge};

/// Supported forge providers.
///
/// Use `ForgeProvider::all()` to get the providers available in the current
/// build configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForgeProvider {
    /// GitHub (always available)
    GitHub,
    /// GitLab (requires `gitlab` feature)
    #[cfg(feature = "gitlab")]
    GitLab,
}

impl ForgeProvider {
    /// Get all available providers.
    ///
    /// ```
    /// use autopropose::forge::ForgeProvider;
    ///
    /// assert!(ForgeProvider::all().contains(&ForgeProvider::GitHub));
    /// ```
    pub fn all() -> &'static [ForgeProvider] {
        &[
            ForgeProvider::GitHub,
            #[cfg(feature = "gitlab")]
            ForgeProvider::GitLab,
        ]
    }

    /// Provider name as used in configuration files.
    pub fn name(&self) -> &'static str {
        match self {
            ForgeProvider::GitHub => "github",
            #[cfg(feature = "gitlab")]
            ForgeProvider::GitLab => "gitlab",
        }
    }

    /// Parse a provider name, case-insensitively.
    ///
    /// ```
    /// use autopropose::forge::ForgeProvider;
    ///
    /// assert_eq!(ForgeProvider::parse("GitHub"), Some(ForgeProvider::GitHub));
    /// assert_eq!(ForgeProvider::parse("unknown"), None);
    /// ```
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "github" => Some(ForgeProvider::GitHub),
            #[cfg(feature = "gitlab")]
            "gitlab" => Some(ForgeProvider::GitLab),
            _ => None,
        }
    }

    /// Environment variable holding this provider's token.
    fn token_env<'a>(&self, settings: &'a ForgeConfig) -> &'a str {
        match self {
            ForgeProvider::GitHub => settings.github_token_env(),
            #[cfg(feature = "gitlab")]
            ForgeProvider::GitLab => settings.gitlab_token_env(),
        }
    }
}

impl std::fmt::Display for ForgeProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Detect the forge provider from a repository URL.
///
/// ```
/// use autopropose::core::config::ForgeConfig;
/// use autopropose::forge::{detect_provider, ForgeProvider};
///
/// assert_eq!(
///     detect_provider("git@github.com:owner/repo.git", &ForgeConfig::default()),
///     Some(ForgeProvider::GitHub)
/// );
/// assert_eq!(detect_provider("/srv/git/repo", &ForgeConfig::default()), None);
/// ```
#[cfg_attr(not(feature = "gitlab"), allow(unused_variables))]
pub fn detect_provider(url: &str, settings: &ForgeConfig) -> Option<ForgeProvider> {
    if parse_github_url(url).is_some() {
        return Some(ForgeProvider::GitHub);
    }

    #[cfg(feature = "gitlab")]
    if parse_gitlab_url(url, &settings.gitlab_hosts()).is_some() {
        return Some(ForgeProvider::GitLab);
    }

    None
}

/// Resolve the forge hosting `main`.
///
/// The provider is taken from the settings override or detected from the
/// URL; the token is read from the provider's environment variable.
///
/// # Errors
///
/// - `ForgeError::UnsupportedForge` if no provider handles the URL
/// - `ForgeError::AuthRequired` if the token variable is unset or empty
pub fn get_forge(main: &Branch, settings: &ForgeConfig) -> Result<Box<dyn Forge>, ForgeError> {
    let provider = match settings.provider.as_deref() {
        Some(name) => resolve_provider_override(name)?,
        None => detect_provider(main.url(), settings)
            .ok_or_else(|| ForgeError::UnsupportedForge(main.url().to_string()))?,
    };

    let env = provider.token_env(settings);
    let token = std::env::var(env)
        .ok()
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| ForgeError::AuthRequired(format!("set the {} environment variable", env)))?;

    create_forge(provider, main.url(), &token, settings)
}

/// Create a forge for a specific provider.
#[cfg_attr(not(feature = "gitlab"), allow(unused_variables))]
pub fn create_forge(
    provider: ForgeProvider,
    url: &str,
    token: &str,
    settings: &ForgeConfig,
) -> Result<Box<dyn Forge>, ForgeError> {
    match provider {
        ForgeProvider::GitHub => {
            let mut forge = GitHubForge::from_remote_url(url, token).ok_or_else(|| {
                ForgeError::UnsupportedForge(format!(
                    "cannot parse '{}' as a GitHub URL; expected \
                     git@github.com:owner/repo.git or https://github.com/owner/repo",
                    url
                ))
            })?;
            if let Some(base) = &settings.github_api_base {
                forge = forge.with_api_base(base.clone());
            }
            Ok(Box::new(forge))
        }
        #[cfg(feature = "gitlab")]
        ForgeProvider::GitLab => {
            let forge = GitLabForge::from_remote_url(url, token, &settings.gitlab_hosts())
                .ok_or_else(|| {
                    ForgeError::UnsupportedForge(format!(
                        "cannot parse '{}' as a GitLab URL; expected \
                         git@host:group/project.git or https://host/group/project",
                        url
                    ))
                })?;
            Ok(Box::new(forge))
        }
    }
}

/// Resolve a provider override string to a ForgeProvider.
fn resolve_provider_override(name: &str) -> Result<ForgeProvider, ForgeError> {
    if let Some(provider) = ForgeProvider::parse(name) {
        return Ok(provider);
    }

    if is_known_but_disabled(name) {
        return Err(ForgeError::NotImplemented(format!(
            "forge '{}' is not enabled in this build; rebuild with `--features {}`",
            name, name
        )));
    }

    Err(ForgeError::UnsupportedForge(format!(
        "unknown forge provider '{}', available: {}",
        name,
        available_providers_string()
    )))
}

/// Check if a provider name is known but disabled.
fn is_known_but_disabled(name: &str) -> bool {
    match name.to_lowercase().as_str() {
        #[cfg(not(feature = "gitlab"))]
        "gitlab" => true,
        _ => false,
    }
}

fn available_providers_string() -> String {
    ForgeProvider::all()
        .iter()
        .map(|p| p.name())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Forge names accepted in configuration.
///
/// Includes every known forge, not only enabled ones, so a config naming
/// gitlab stays valid across builds.
pub fn valid_forge_names() -> &'static [&'static str] {
    &["github", "gitlab"]
}
