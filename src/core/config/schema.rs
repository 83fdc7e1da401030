//! core::config::schema
//!
//! Configuration schema types.
//!
//! # Example
//!
//! ```toml
//! [publish]
//! mode = "propose"
//! labels = ["automated"]
//! derived_owner = "bot"
//! tags = ["v1.0"]
//!
//! [forge]
//! github_token_env = "GITHUB_TOKEN"
//! gitlab_hosts = ["gitlab.example.com"]
//! ```
//!
//! # Validation
//!
//! Values are validated after parsing: the mode must be one of the known
//! publish modes, the provider override must name a built forge, and lists
//! may not contain empty entries.

use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::ConfigError;
use crate::publish::PublishMode;

/// The whole configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigFile {
    /// Defaults for `ap run`
    pub publish: Option<PublishDefaults>,

    /// Forge selection and credentials lookup
    pub forge: Option<ForgeConfig>,
}

impl ConfigFile {
    /// Validate the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if any value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(publish) = &self.publish {
            publish.validate()?;
        }
        if let Some(forge) = &self.forge {
            forge.validate()?;
        }
        Ok(())
    }
}

/// Defaults applied to every publish run unless overridden on the command line.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct PublishDefaults {
    /// Publish mode: push, attempt-push, propose or push-derived
    pub mode: Option<String>,

    /// Labels attached to new proposals
    pub labels: Option<Vec<String>>,

    /// Reviewers requested on new proposals
    pub reviewers: Option<Vec<String>>,

    /// Owner of derived branches (defaults to the authenticated user)
    pub derived_owner: Option<String>,

    /// Allow maintainers of the target to push to the derived branch
    pub allow_collaboration: Option<bool>,

    /// Tags that may be pushed alongside branches
    pub tags: Option<Vec<String>>,

    /// Overwrite a derived branch that has no proposal against main
    pub overwrite_unrelated: Option<bool>,

    /// Directory in which working clones are created
    pub storage_dir: Option<PathBuf>,
}

impl PublishDefaults {
    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(mode) = &self.mode {
            PublishMode::from_str(mode).map_err(|e| ConfigError::InvalidValue(e.to_string()))?;
        }
        for (field, values) in [
            ("labels", &self.labels),
            ("reviewers", &self.reviewers),
            ("tags", &self.tags),
        ] {
            if values.iter().flatten().any(|v| v.trim().is_empty()) {
                return Err(ConfigError::InvalidValue(format!(
                    "publish.{} cannot contain empty entries",
                    field
                )));
            }
        }
        if matches!(&self.derived_owner, Some(owner) if owner.is_empty()) {
            return Err(ConfigError::InvalidValue(
                "publish.derived_owner cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Forge selection settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ForgeConfig {
    /// Force a provider instead of detecting it from the branch URL
    pub provider: Option<String>,

    /// Environment variable holding the GitHub token
    pub github_token_env: Option<String>,

    /// GitHub API base URL (GitHub Enterprise)
    pub github_api_base: Option<String>,

    /// Environment variable holding the GitLab token
    pub gitlab_token_env: Option<String>,

    /// Self-hosted GitLab hosts, in addition to gitlab.com
    pub gitlab_hosts: Option<Vec<String>>,
}

impl ForgeConfig {
    /// Default environment variable for the GitHub token.
    pub const DEFAULT_GITHUB_TOKEN_ENV: &'static str = "GITHUB_TOKEN";

    /// Default environment variable for the GitLab token.
    pub const DEFAULT_GITLAB_TOKEN_ENV: &'static str = "GITLAB_TOKEN";

    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(provider) = &self.provider {
            let valid = crate::forge::valid_forge_names();
            if !valid.contains(&provider.as_str()) {
                return Err(ConfigError::InvalidValue(format!(
                    "invalid forge '{}', must be one of: {}",
                    provider,
                    valid.join(", ")
                )));
            }
        }
        for var in [&self.github_token_env, &self.gitlab_token_env]
            .into_iter()
            .flatten()
        {
            if var.is_empty() || var.contains('=') {
                return Err(ConfigError::InvalidValue(format!(
                    "'{}' is not a usable environment variable name",
                    var
                )));
            }
        }
        Ok(())
    }

    /// Environment variable consulted for the GitHub token.
    pub fn github_token_env(&self) -> &str {
        self.github_token_env
            .as_deref()
            .unwrap_or(Self::DEFAULT_GITHUB_TOKEN_ENV)
    }

    /// Environment variable consulted for the GitLab token.
    pub fn gitlab_token_env(&self) -> &str {
        self.gitlab_token_env
            .as_deref()
            .unwrap_or(Self::DEFAULT_GITLAB_TOKEN_ENV)
    }

    /// Hosts treated as GitLab instances.
    pub fn gitlab_hosts(&self) -> Vec<&str> {
        let mut hosts = vec!["gitlab.com"];
        hosts.extend(self.gitlab_hosts.iter().flatten().map(String::as_str));
        hosts
    }
}
