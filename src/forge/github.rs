//! forge::github
//!
//! GitHub forge implementation using the REST API.
//!
//! # Design
//!
//! Derived branches live in forks: the derived repository for
//! `owner/repo` owned by `bot` is `bot/repo`. Proposals are pull requests
//! whose head is `bot:<name>` and whose base is the main branch.
//!
//! GitHub has no separate merge commit message on a pull request, so
//! [`Forge::set_commit_message`] returns `ForgeError::NotImplemented`.
//!
//! # Rate Limiting
//!
//! Rate limit responses surface as `ForgeError::RateLimited`; retrying is
//! the caller's responsibility.
//!
//! # Example
//!
//! ```ignore
//! use autopropose::forge::github::GitHubForge;
//!
//! let forge = GitHubForge::from_remote_url("https://github.com/owner/repo", token)
//!     .expect("github url");
//! let fork = forge.get_derived_branch(&main, &name, Some("bot")).await?;
//! ```

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::time::sleep;
use tracing::{debug, info, warn};

use super::proposal::{MergeProposal, ProposalStatus};
use super::traits::{
    DerivedTarget, DescriptionFormat, Forge, ForgeError, ProposalRequest, StatusFilter,
};
use crate::core::types::BranchName;
use crate::git::Branch;

/// Default GitHub API base URL.
const DEFAULT_API_BASE: &str = "https://api.github.com";

/// Web host used for repository and branch URLs.
const WEB_BASE: &str = "https://github.com";

/// User-Agent header value for API requests.
const USER_AGENT_VALUE: &str = "autopropose";

/// How often to check whether a new fork exists yet.
const FORK_POLL_ATTEMPTS: u32 = 10;

/// Delay between fork checks.
const FORK_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// GitHub forge implementation.
pub struct GitHubForge {
    /// HTTP client for making requests
    client: Client,
    /// Personal access token
    token: String,
    /// Owner of the main repository (user or organization)
    owner: String,
    /// Main repository name
    repo: String,
    /// API base URL (configurable for GitHub Enterprise and tests)
    api_base: String,
    /// Login of the authenticated user, once looked up
    current_user: Mutex<Option<String>>,
}

// Custom Debug to avoid exposing the token
impl std::fmt::Debug for GitHubForge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubForge")
            .field("owner", &self.owner)
            .field("repo", &self.repo)
            .field("api_base", &self.api_base)
            .finish_non_exhaustive()
    }
}

impl GitHubForge {
    /// Create a forge for `owner/repo`.
    pub fn new(token: impl Into<String>, owner: impl Into<String>, repo: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            token: token.into(),
            owner: owner.into(),
            repo: repo.into(),
            api_base: DEFAULT_API_BASE.to_string(),
            current_user: Mutex::new(None),
        }
    }

    /// Use a different API base URL.
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    /// Create a forge from a repository URL.
    ///
    /// Returns `None` if the URL is not a GitHub repository URL.
    pub fn from_remote_url(url: &str, token: impl Into<String>) -> Option<Self> {
        let (owner, repo) = parse_github_url(url)?;
        Some(Self::new(token, owner, repo))
    }

    /// Owner of the main repository.
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Main repository name.
    pub fn repo(&self) -> &str {
        &self.repo
    }

    /// Build common headers for API requests.
    fn headers(&self) -> Result<HeaderMap, ForgeError> {
        let mut headers = HeaderMap::new();
        let auth = HeaderValue::from_str(&format!("Bearer {}", self.token)).map_err(|_| {
            ForgeError::AuthFailed("token contains characters not allowed in a header".into())
        })?;
        headers.insert(AUTHORIZATION, auth);
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE));
        headers.insert(
            "X-GitHub-Api-Version",
            HeaderValue::from_static("2022-11-28"),
        );
        Ok(headers)
    }

    /// Build URL for a repository endpoint.
    fn repo_url(&self, owner: &str, repo: &str, path: &str) -> String {
        format!("{}/repos/{}/{}/{}", self.api_base, owner, repo, path)
    }

    /// Repository a branch URL points at, defaulting to the main repository.
    fn repo_of(&self, branch: &Branch) -> (String, String) {
        parse_github_url(branch.url()).unwrap_or_else(|| (self.owner.clone(), self.repo.clone()))
    }

    /// Send a request and decode the JSON response.
    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ForgeError> {
        let response = request
            .headers(self.headers()?)
            .send()
            .await
            .map_err(|e| ForgeError::NetworkError(e.to_string()))?;
        self.handle_response(response).await
    }

    /// Like [`send`](Self::send), mapping 404 to `None`.
    async fn send_optional<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<Option<T>, ForgeError> {
        match self.send(request).await {
            Ok(value) => Ok(Some(value)),
            Err(ForgeError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Handle API response, mapping errors appropriately.
    async fn handle_response<T: DeserializeOwned>(
        &self,
        response: Response,
    ) -> Result<T, ForgeError> {
        let status = response.status();

        if status.is_success() {
            response.json().await.map_err(|e| ForgeError::ApiError {
                status: status.as_u16(),
                message: format!("failed to parse response: {}", e),
            })
        } else {
            Err(Self::error_for(response, status).await)
        }
    }

    /// Map an error response from the API.
    async fn error_for(response: Response, status: StatusCode) -> ForgeError {
        let message = match response.json::<GitHubErrorResponse>().await {
            Ok(err) => err.message,
            Err(_) => "unknown error".to_string(),
        };

        match status {
            StatusCode::UNAUTHORIZED => ForgeError::AuthFailed("invalid or expired token".into()),
            StatusCode::FORBIDDEN if message.to_lowercase().contains("rate limit") => {
                ForgeError::RateLimited
            }
            StatusCode::FORBIDDEN => ForgeError::AuthFailed(format!("permission denied: {}", message)),
            StatusCode::NOT_FOUND => ForgeError::NotFound(message),
            StatusCode::TOO_MANY_REQUESTS => ForgeError::RateLimited,
            _ if status.is_server_error() => ForgeError::ApiError {
                status: status.as_u16(),
                message: format!("GitHub server error: {}", message),
            },
            _ => ForgeError::ApiError {
                status: status.as_u16(),
                message,
            },
        }
    }

    /// Login of the authenticated user.
    async fn current_user(&self) -> Result<String, ForgeError> {
        if let Some(login) = self.cached_user() {
            return Ok(login);
        }
        let user: GitHubUser = self
            .send(self.client.get(format!("{}/user", self.api_base)))
            .await?;
        if let Ok(mut cache) = self.current_user.lock() {
            *cache = Some(user.login.clone());
        }
        Ok(user.login)
    }

    fn cached_user(&self) -> Option<String> {
        self.current_user.lock().ok().and_then(|c| c.clone())
    }

    async fn resolve_owner(&self, owner: Option<&str>) -> Result<String, ForgeError> {
        match owner {
            Some(owner) => Ok(owner.to_string()),
            None => self.current_user().await,
        }
    }

    /// Wait until `owner/repo` can be fetched. Forks are created in the
    /// background, so pushing right after the fork request can fail.
    async fn wait_for_repository(&self, owner: &str, repo: &str) -> Result<(), ForgeError> {
        let url = format!("{}/repos/{}/{}", self.api_base, owner, repo);
        for attempt in 1..=FORK_POLL_ATTEMPTS {
            let found: Option<GitHubRepository> =
                self.send_optional(self.client.get(&url)).await?;
            if found.is_some() {
                debug!(owner, repo, attempt, "fork is ready");
                return Ok(());
            }
            if attempt < FORK_POLL_ATTEMPTS {
                sleep(FORK_POLL_INTERVAL).await;
            }
        }
        warn!(owner, repo, "fork not visible yet, pushing anyway");
        Ok(())
    }

    async fn patch_pull(
        &self,
        proposal: &MergeProposal,
        body: &UpdatePullBody<'_>,
    ) -> Result<GitHubPullRequest, ForgeError> {
        let (owner, repo) = self.repo_of(&proposal.target);
        let url = self.repo_url(&owner, &repo, &format!("pulls/{}", proposal.id));
        self.send(self.client.patch(url).json(body)).await
    }
}

#[async_trait]
impl Forge for GitHubForge {
    fn name(&self) -> &'static str {
        "github"
    }

    fn description_format(&self) -> DescriptionFormat {
        DescriptionFormat::Markdown
    }

    async fn get_derived_branch(
        &self,
        main: &Branch,
        name: &BranchName,
        owner: Option<&str>,
    ) -> Result<Option<Branch>, ForgeError> {
        let owner = self.resolve_owner(owner).await?;
        let (_, repo) = self.repo_of(main);
        let url = self.repo_url(&owner, &repo, &format!("branches/{}", name));

        let found: Option<GitHubBranch> = self.send_optional(self.client.get(url)).await?;
        Ok(found.map(|_| Branch::new(format!("{}/{}/{}", WEB_BASE, owner, repo), name.clone())))
    }

    async fn iter_proposals(
        &self,
        source: &Branch,
        target: &Branch,
        status: StatusFilter,
    ) -> Result<Vec<MergeProposal>, ForgeError> {
        let (source_owner, _) = self.repo_of(source);
        let (target_owner, target_repo) = self.repo_of(target);
        let state = match status {
            StatusFilter::Open => "open",
            StatusFilter::Closed | StatusFilter::Merged => "closed",
            StatusFilter::All => "all",
        };
        let url = self.repo_url(&target_owner, &target_repo, "pulls");
        let head = format!("{}:{}", source_owner, source.name());
        let request = self.client.get(url).query(&[
            ("head", head.as_str()),
            ("base", target.name().as_str()),
            ("state", state),
            ("per_page", "100"),
        ]);

        let pulls: Vec<GitHubPullRequest> = self.send(request).await?;
        debug!(count = pulls.len(), head = %head, "listed pull requests");
        Ok(pulls
            .into_iter()
            .map(|pr| pr.into_proposal(source.clone(), target.clone()))
            .filter(|p| p.matches(status))
            .collect())
    }

    async fn iter_my_proposals(
        &self,
        status: StatusFilter,
    ) -> Result<Vec<MergeProposal>, ForgeError> {
        let login = self.current_user().await?;
        let qualifier = match status {
            StatusFilter::Open => " is:open",
            StatusFilter::Closed => " is:closed is:unmerged",
            StatusFilter::Merged => " is:merged",
            StatusFilter::All => "",
        };
        let query = format!("is:pr author:{}{}", login, qualifier);
        let request = self
            .client
            .get(format!("{}/search/issues", self.api_base))
            .query(&[("q", query.as_str()), ("per_page", "100")]);
        let results: GitHubSearchResults = self.send(request).await?;
        debug!(count = results.items.len(), "found own pull requests");

        // Search results carry neither branches nor mergeability
        let mut proposals = Vec::with_capacity(results.items.len());
        for item in results.items {
            let url = format!("{}/pulls/{}", item.repository_url, item.number);
            let pr: GitHubPullRequest = self.send(self.client.get(url)).await?;
            let (Some(source), Some(target)) = (pr.head_branch(), pr.base_branch()) else {
                debug!(url = %pr.html_url, "skipping pull request without a usable head or base");
                continue;
            };
            let proposal = pr.into_proposal(source, target);
            if proposal.matches(status) {
                proposals.push(proposal);
            }
        }
        Ok(proposals)
    }

    async fn publish_derived(
        &self,
        main: &Branch,
        name: &BranchName,
        owner: Option<&str>,
    ) -> Result<DerivedTarget, ForgeError> {
        let current = self.current_user().await?;
        let owner = owner.map(str::to_string).unwrap_or_else(|| current.clone());
        let (main_owner, repo) = self.repo_of(main);

        let existing: Option<GitHubRepository> = self
            .send_optional(
                self.client
                    .get(format!("{}/repos/{}/{}", self.api_base, owner, repo)),
            )
            .await?;
        if existing.is_none() {
            info!(owner = %owner, repo = %repo, "creating fork");
            let body = CreateForkBody {
                organization: (owner != current).then_some(owner.as_str()),
            };
            let _fork: GitHubRepository = self
                .send(
                    self.client
                        .post(self.repo_url(&main_owner, &repo, "forks"))
                        .json(&body),
                )
                .await?;
            self.wait_for_repository(&owner, &repo).await?;
        }

        let repo_url = format!("{}/{}/{}", WEB_BASE, owner, repo);
        Ok(DerivedTarget {
            branch: Branch::new(repo_url.clone(), name.clone()),
            push_url: format!("{}.git", repo_url),
            public_url: format!("{}/tree/{}", repo_url, name),
        })
    }

    async fn create_proposal(
        &self,
        request: ProposalRequest,
    ) -> Result<MergeProposal, ForgeError> {
        let (source_owner, _) = self.repo_of(&request.source);
        let (target_owner, target_repo) = self.repo_of(&request.target);
        let head = format!("{}:{}", source_owner, request.source.name());
        let title = request
            .title
            .clone()
            .unwrap_or_else(|| request.source.name().to_string());

        let body = CreatePullBody {
            title: &title,
            body: &request.description,
            head: &head,
            base: request.target.name().as_str(),
            maintainer_can_modify: request.allow_collaboration,
        };
        let pr: GitHubPullRequest = self
            .send(
                self.client
                    .post(self.repo_url(&target_owner, &target_repo, "pulls"))
                    .json(&body),
            )
            .await?;
        info!(number = pr.number, url = %pr.html_url, "created pull request");

        if !request.labels.is_empty() {
            let url = self.repo_url(
                &target_owner,
                &target_repo,
                &format!("issues/{}/labels", pr.number),
            );
            let _labels: Vec<GitHubLabel> = self
                .send(self.client.post(url).json(&LabelsBody {
                    labels: &request.labels,
                }))
                .await?;
        }
        if !request.reviewers.is_empty() {
            let url = self.repo_url(
                &target_owner,
                &target_repo,
                &format!("pulls/{}/requested_reviewers", pr.number),
            );
            let _pr: GitHubPullRequest = self
                .send(self.client.post(url).json(&ReviewersBody {
                    reviewers: &request.reviewers,
                }))
                .await?;
        }

        let mut proposal = pr.into_proposal(request.source, request.target);
        proposal.labels = request.labels;
        proposal.reviewers = request.reviewers;
        proposal.commit_message = request.commit_message;
        Ok(proposal)
    }

    async fn set_description(
        &self,
        proposal: &mut MergeProposal,
        description: &str,
    ) -> Result<(), ForgeError> {
        self.patch_pull(
            proposal,
            &UpdatePullBody {
                body: Some(description),
                state: None,
            },
        )
        .await?;
        proposal.description = Some(description.to_string());
        Ok(())
    }

    async fn set_commit_message(
        &self,
        _proposal: &mut MergeProposal,
        _message: &str,
    ) -> Result<(), ForgeError> {
        Err(ForgeError::NotImplemented(
            "GitHub pull requests have no merge commit message".into(),
        ))
    }

    async fn close_proposal(&self, proposal: &mut MergeProposal) -> Result<(), ForgeError> {
        self.patch_pull(
            proposal,
            &UpdatePullBody {
                body: None,
                state: Some("closed"),
            },
        )
        .await?;
        proposal.status = ProposalStatus::Closed;
        Ok(())
    }

    async fn reopen_proposal(&self, proposal: &mut MergeProposal) -> Result<(), ForgeError> {
        let result = self
            .patch_pull(
                proposal,
                &UpdatePullBody {
                    body: None,
                    state: Some("open"),
                },
            )
            .await;
        match result {
            Ok(_) => {
                proposal.status = ProposalStatus::Open;
                Ok(())
            }
            Err(ForgeError::ApiError {
                status: 422,
                message,
            }) => Err(ForgeError::ReopenFailed {
                url: proposal.url.clone(),
                reason: message,
            }),
            Err(e) => Err(e),
        }
    }
}

// --------------------------------------------------------------------------
// API Request/Response Types
// --------------------------------------------------------------------------

#[derive(Serialize)]
struct CreatePullBody<'a> {
    title: &'a str,
    body: &'a str,
    head: &'a str,
    base: &'a str,
    maintainer_can_modify: bool,
}

#[derive(Serialize)]
struct UpdatePullBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    body: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    state: Option<&'a str>,
}

#[derive(Serialize)]
struct LabelsBody<'a> {
    labels: &'a [String],
}

#[derive(Serialize)]
struct ReviewersBody<'a> {
    reviewers: &'a [String],
}

#[derive(Serialize)]
struct CreateForkBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    organization: Option<&'a str>,
}

/// GitHub error response format.
#[derive(Deserialize)]
struct GitHubErrorResponse {
    message: String,
}

#[derive(Deserialize)]
struct GitHubUser {
    login: String,
}

#[derive(Deserialize)]
struct GitHubBranch {
    #[allow(dead_code)]
    name: String,
}

#[derive(Deserialize)]
struct GitHubRepository {
    #[allow(dead_code)]
    full_name: String,
}

#[derive(Deserialize)]
struct GitHubLabel {
    name: String,
}

/// GitHub PR response format.
#[derive(Deserialize)]
struct GitHubPullRequest {
    number: u64,
    html_url: String,
    state: String,
    title: String,
    body: Option<String>,
    merged_at: Option<String>,
    #[serde(default)]
    labels: Vec<GitHubLabel>,
    #[serde(default)]
    requested_reviewers: Vec<GitHubUser>,
    user: Option<GitHubUser>,
    #[serde(default)]
    mergeable: Option<bool>,
    #[serde(default)]
    head: Option<GitHubPullRef>,
    #[serde(default)]
    base: Option<GitHubPullRef>,
}

/// One side of a pull request.
#[derive(Deserialize)]
struct GitHubPullRef {
    #[serde(rename = "ref")]
    name: String,
    /// Missing once a fork has been deleted
    repo: Option<GitHubPullRepo>,
}

#[derive(Deserialize)]
struct GitHubPullRepo {
    html_url: String,
}

#[derive(Deserialize)]
struct GitHubSearchResults {
    items: Vec<GitHubSearchItem>,
}

#[derive(Deserialize)]
struct GitHubSearchItem {
    number: u64,
    repository_url: String,
}

impl GitHubPullRef {
    fn branch(&self) -> Option<Branch> {
        let repo = self.repo.as_ref()?;
        let name = BranchName::new(self.name.as_str()).ok()?;
        Some(Branch::new(repo.html_url.clone(), name))
    }
}

impl GitHubPullRequest {
    fn status(&self) -> ProposalStatus {
        if self.merged_at.is_some() {
            ProposalStatus::Merged
        } else if self.state == "closed" {
            ProposalStatus::Closed
        } else {
            ProposalStatus::Open
        }
    }

    fn head_branch(&self) -> Option<Branch> {
        self.head.as_ref().and_then(GitHubPullRef::branch)
    }

    fn base_branch(&self) -> Option<Branch> {
        self.base.as_ref().and_then(GitHubPullRef::branch)
    }

    fn into_proposal(self, source: Branch, target: Branch) -> MergeProposal {
        let status = self.status();
        MergeProposal {
            id: self.number,
            url: self.html_url,
            title: Some(self.title),
            description: self.body,
            commit_message: None,
            labels: self.labels.into_iter().map(|l| l.name).collect(),
            reviewers: self.requested_reviewers.into_iter().map(|u| u.login).collect(),
            owner: self.user.map(|u| u.login),
            status,
            source,
            target,
            mergeable: self.mergeable,
            dry_run: false,
        }
    }
}

// --------------------------------------------------------------------------
// URL Parsing
// --------------------------------------------------------------------------

/// Parse a GitHub repository URL to extract owner and repo.
///
/// Supports SSH, scp-like and HTTPS forms, with or without `.git`.
///
/// ```
/// use autopropose::forge::github::parse_github_url;
///
/// let (owner, repo) = parse_github_url("git@github.com:octocat/hello-world.git").unwrap();
/// assert_eq!(owner, "octocat");
/// assert_eq!(repo, "hello-world");
/// ```
pub fn parse_github_url(url: &str) -> Option<(String, String)> {
    let rest = url
        .strip_prefix("git@github.com:")
        .or_else(|| url.strip_prefix("ssh://git@github.com/"))
        .or_else(|| url.strip_prefix("https://github.com/"))
        .or_else(|| url.strip_prefix("http://github.com/"))?;
    let rest = rest.trim_end_matches('/');
    let rest = rest.strip_suffix(".git").unwrap_or(rest);

    let (owner, repo) = rest.split_once('/')?;
    // owner/repo/tree/branch and similar web paths
    let repo = repo.split('/').next().unwrap_or(repo);
    if owner.is_empty() || repo.is_empty() {
        return None;
    }
    Some((owner.to_string(), repo.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    mod parse_github_url {
        use super::*;

        #[test]
        fn ssh_forms() {
            for url in [
                "git@github.com:owner/repo.git",
                "git@github.com:owner/repo",
                "ssh://git@github.com/owner/repo.git",
            ] {
                assert_eq!(
                    parse_github_url(url),
                    Some(("owner".to_string(), "repo".to_string())),
                    "{url}"
                );
            }
        }

        #[test]
        fn https_forms() {
            for url in [
                "https://github.com/owner/repo",
                "https://github.com/owner/repo.git",
                "https://github.com/owner/repo/",
                "http://github.com/owner/repo",
            ] {
                assert_eq!(
                    parse_github_url(url),
                    Some(("owner".to_string(), "repo".to_string())),
                    "{url}"
                );
            }
        }

        #[test]
        fn repo_with_dots_and_hyphens() {
            assert_eq!(
                parse_github_url("https://github.com/my-org/my.repo-name.git"),
                Some(("my-org".to_string(), "my.repo-name".to_string()))
            );
        }

        #[test]
        fn non_github() {
            assert_eq!(parse_github_url("https://gitlab.com/owner/repo"), None);
            assert_eq!(parse_github_url("/srv/git/repo"), None);
        }

        #[test]
        fn incomplete() {
            assert_eq!(parse_github_url("https://github.com/owner"), None);
            assert_eq!(parse_github_url("https://github.com/owner/"), None);
        }
    }

    mod forge {
        use super::*;

        #[test]
        fn from_remote_url() {
            let forge = GitHubForge::from_remote_url("git@github.com:owner/repo.git", "t").unwrap();
            assert_eq!(forge.owner(), "owner");
            assert_eq!(forge.repo(), "repo");
            assert_eq!(forge.name(), "github");
            assert_eq!(forge.description_format(), DescriptionFormat::Markdown);
        }

        #[test]
        fn api_base_trailing_slash_trimmed() {
            let forge = GitHubForge::new("t", "o", "r").with_api_base("http://127.0.0.1:9/");
            assert_eq!(forge.repo_url("o", "r", "pulls"), "http://127.0.0.1:9/repos/o/r/pulls");
        }

        #[test]
        fn debug_redacts_token() {
            let forge = GitHubForge::new("secret_token_abc123", "owner", "repo");
            let debug = format!("{:?}", forge);
            assert!(!debug.contains("secret_token_abc123"));
            assert!(debug.contains("owner"));
        }

        #[test]
        fn header_rejects_bad_token() {
            let forge = GitHubForge::new("bad\ntoken", "o", "r");
            assert!(matches!(forge.headers(), Err(ForgeError::AuthFailed(_))));
        }
    }

    mod pull_request {
        use super::*;

        fn pr(state: &str, merged_at: Option<&str>) -> GitHubPullRequest {
            GitHubPullRequest {
                number: 42,
                html_url: "https://github.com/owner/repo/pull/42".to_string(),
                state: state.to_string(),
                title: "Fix typos".to_string(),
                body: Some("Fix typos".to_string()),
                merged_at: merged_at.map(String::from),
                labels: vec![GitHubLabel {
                    name: "automated".to_string(),
                }],
                requested_reviewers: vec![],
                user: Some(GitHubUser {
                    login: "bot".to_string(),
                }),
                mergeable: None,
                head: None,
                base: None,
            }
        }

        fn branches() -> (Branch, Branch) {
            (
                Branch::new("https://github.com/bot/repo", BranchName::new("fix").unwrap()),
                Branch::new("https://github.com/owner/repo", BranchName::new("main").unwrap()),
            )
        }

        #[test]
        fn status_mapping() {
            assert_eq!(pr("open", None).status(), ProposalStatus::Open);
            assert_eq!(pr("closed", None).status(), ProposalStatus::Closed);
            assert_eq!(
                pr("closed", Some("2024-01-01T00:00:00Z")).status(),
                ProposalStatus::Merged
            );
        }

        #[test]
        fn into_proposal() {
            let (source, target) = branches();
            let proposal = pr("open", None).into_proposal(source.clone(), target);
            assert_eq!(proposal.id, 42);
            assert_eq!(proposal.labels, vec!["automated"]);
            assert_eq!(proposal.owner.as_deref(), Some("bot"));
            assert_eq!(proposal.source, source);
            assert!(!proposal.dry_run);
            assert!(proposal.can_be_merged().is_err());
        }

        #[test]
        fn head_of_deleted_fork_has_no_branch() {
            let mut pull = pr("open", None);
            pull.head = Some(GitHubPullRef {
                name: "fix".to_string(),
                repo: None,
            });
            pull.base = Some(GitHubPullRef {
                name: "main".to_string(),
                repo: Some(GitHubPullRepo {
                    html_url: "https://github.com/owner/repo".to_string(),
                }),
            });
            assert!(pull.head_branch().is_none());
            assert_eq!(pull.base_branch(), Some(branches().1));
        }
    }
}
