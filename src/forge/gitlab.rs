//! forge::gitlab
//!
//! GitLab forge implementation using the REST v4 API.
//!
//! # Design
//!
//! Derived branches live in forks under the derived owner's namespace.
//! Proposals are merge requests; their `iid` is scoped to the target
//! project, which is recovered from the proposal's target branch URL.
//!
//! # Feature Flag
//!
//! This module is only available when the `gitlab` feature is enabled:
//!
//! ```toml
//! [dependencies]
//! autopropose = { version = "0.1", features = ["gitlab"] }
//! ```

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::proposal::{MergeProposal, ProposalStatus};
use super::traits::{
    DerivedTarget, DescriptionFormat, Forge, ForgeError, ProposalRequest, StatusFilter,
};
use crate::core::types::BranchName;
use crate::git::Branch;

/// GitLab forge implementation.
pub struct GitLabForge {
    /// HTTP client for making requests
    client: Client,
    /// Personal access token
    token: String,
    /// Web host, e.g. `gitlab.com`
    host: String,
    /// Namespace of the main project (user or group path)
    owner: String,
    /// Main project name
    project: String,
    /// API base URL
    api_base: String,
    /// Username of the authenticated user, once looked up
    current_user: Mutex<Option<String>>,
}

impl std::fmt::Debug for GitLabForge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitLabForge")
            .field("host", &self.host)
            .field("owner", &self.owner)
            .field("project", &self.project)
            .field("api_base", &self.api_base)
            .finish_non_exhaustive()
    }
}

impl GitLabForge {
    /// Create a forge for `owner/project` on `host`.
    pub fn new(
        token: impl Into<String>,
        host: impl Into<String>,
        owner: impl Into<String>,
        project: impl Into<String>,
    ) -> Self {
        let host = host.into();
        Self {
            client: Client::new(),
            token: token.into(),
            api_base: format!("https://{}/api/v4", host),
            host,
            owner: owner.into(),
            project: project.into(),
            current_user: Mutex::new(None),
        }
    }

    /// Use a different API base URL.
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    /// Create a forge from a project URL on one of `hosts`.
    pub fn from_remote_url(url: &str, token: impl Into<String>, hosts: &[&str]) -> Option<Self> {
        let (host, owner, project) = parse_gitlab_url(url, hosts)?;
        Some(Self::new(token, host, owner, project))
    }

    /// Namespace of the main project.
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Main project name.
    pub fn project(&self) -> &str {
        &self.project
    }

    fn headers(&self) -> Result<HeaderMap, ForgeError> {
        let mut headers = HeaderMap::new();
        let token = HeaderValue::from_str(&self.token).map_err(|_| {
            ForgeError::AuthFailed("token contains characters not allowed in a header".into())
        })?;
        headers.insert("PRIVATE-TOKEN", token);
        headers.insert(USER_AGENT, HeaderValue::from_static("autopropose"));
        Ok(headers)
    }

    /// API URL for a project, addressed by its URL-encoded path.
    fn project_url(&self, owner: &str, project: &str, path: &str) -> String {
        let id = encode_path(&format!("{}/{}", owner, project));
        if path.is_empty() {
            format!("{}/projects/{}", self.api_base, id)
        } else {
            format!("{}/projects/{}/{}", self.api_base, id, path)
        }
    }

    fn web_url(&self, owner: &str, project: &str) -> String {
        format!("https://{}/{}/{}", self.host, owner, project)
    }

    /// Project a branch URL points at, defaulting to the main project.
    fn project_of(&self, branch: &Branch) -> (String, String) {
        parse_gitlab_url(branch.url(), &[self.host.as_str()])
            .map(|(_, owner, project)| (owner, project))
            .unwrap_or_else(|| (self.owner.clone(), self.project.clone()))
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ForgeError> {
        let response = request
            .headers(self.headers()?)
            .send()
            .await
            .map_err(|e| ForgeError::NetworkError(e.to_string()))?;
        Self::handle_response(response).await
    }

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

    async fn handle_response<T: DeserializeOwned>(response: Response) -> Result<T, ForgeError> {
        let status = response.status();
        if status.is_success() {
            return response.json().await.map_err(|e| ForgeError::ApiError {
                status: status.as_u16(),
                message: format!("failed to parse response: {}", e),
            });
        }

        let message = match response.json::<GitLabErrorResponse>().await {
            Ok(err) => err.message.or(err.error).unwrap_or_else(|| "unknown error".into()),
            Err(_) => "unknown error".to_string(),
        };
        Err(match status {
            StatusCode::UNAUTHORIZED => ForgeError::AuthFailed("invalid or expired token".into()),
            StatusCode::FORBIDDEN => ForgeError::AuthFailed(format!("permission denied: {}", message)),
            StatusCode::NOT_FOUND => ForgeError::NotFound(message),
            StatusCode::TOO_MANY_REQUESTS => ForgeError::RateLimited,
            _ => ForgeError::ApiError {
                status: status.as_u16(),
                message,
            },
        })
    }

    async fn current_user(&self) -> Result<String, ForgeError> {
        if let Some(name) = self.current_user.lock().ok().and_then(|c| c.clone()) {
            return Ok(name);
        }
        let user: GitLabUser = self
            .send(self.client.get(format!("{}/user", self.api_base)))
            .await?;
        if let Ok(mut cache) = self.current_user.lock() {
            *cache = Some(user.username.clone());
        }
        Ok(user.username)
    }

    async fn resolve_owner(&self, owner: Option<&str>) -> Result<String, ForgeError> {
        match owner {
            Some(owner) => Ok(owner.to_string()),
            None => self.current_user().await,
        }
    }

    async fn user_ids(&self, usernames: &[String]) -> Result<Vec<u64>, ForgeError> {
        let mut ids = Vec::with_capacity(usernames.len());
        for username in usernames {
            let users: Vec<GitLabUser> = self
                .send(
                    self.client
                        .get(format!("{}/users", self.api_base))
                        .query(&[("username", username.as_str())]),
                )
                .await?;
            match users.first() {
                Some(user) => ids.push(user.id),
                None => return Err(ForgeError::NotFound(format!("user '{}'", username))),
            }
        }
        Ok(ids)
    }

    async fn update_merge_request(
        &self,
        proposal: &MergeProposal,
        body: &UpdateMergeRequestBody<'_>,
    ) -> Result<GitLabMergeRequest, ForgeError> {
        let (owner, project) = self.project_of(&proposal.target);
        let url = self.project_url(&owner, &project, &format!("merge_requests/{}", proposal.id));
        self.send(self.client.put(url).json(body)).await
    }

    /// Web URL of the project with numeric `id`, looked up once per call
    /// through `cache`.
    async fn project_web_url(
        &self,
        id: u64,
        cache: &mut HashMap<u64, String>,
    ) -> Result<String, ForgeError> {
        if let Some(url) = cache.get(&id) {
            return Ok(url.clone());
        }
        let project: GitLabProject = self
            .send(self.client.get(format!("{}/projects/{}", self.api_base, id)))
            .await?;
        cache.insert(id, project.web_url.clone());
        Ok(project.web_url)
    }
}

#[async_trait]
impl Forge for GitLabForge {
    fn name(&self) -> &'static str {
        "gitlab"
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
        let (_, project) = self.project_of(main);
        let url = self.project_url(
            &owner,
            &project,
            &format!("repository/branches/{}", encode_path(name.as_str())),
        );
        let found: Option<GitLabBranch> = self.send_optional(self.client.get(url)).await?;
        Ok(found.map(|_| Branch::new(self.web_url(&owner, &project), name.clone())))
    }

    async fn iter_proposals(
        &self,
        source: &Branch,
        target: &Branch,
        status: StatusFilter,
    ) -> Result<Vec<MergeProposal>, ForgeError> {
        let (source_owner, source_project) = self.project_of(source);
        let (target_owner, target_project) = self.project_of(target);

        let source_info: Option<GitLabProject> = self
            .send_optional(
                self.client
                    .get(self.project_url(&source_owner, &source_project, "")),
            )
            .await?;
        let Some(source_info) = source_info else {
            return Ok(Vec::new());
        };

        let state = match status {
            StatusFilter::Open => "opened",
            StatusFilter::Closed => "closed",
            StatusFilter::Merged => "merged",
            StatusFilter::All => "all",
        };
        let request = self
            .client
            .get(self.project_url(&target_owner, &target_project, "merge_requests"))
            .query(&[
                ("source_branch", source.name().as_str()),
                ("target_branch", target.name().as_str()),
                ("state", state),
                ("per_page", "100"),
            ]);
        let requests: Vec<GitLabMergeRequest> = self.send(request).await?;
        debug!(count = requests.len(), "listed merge requests");

        Ok(requests
            .into_iter()
            .filter(|mr| mr.source_project_id == source_info.id)
            .map(|mr| mr.into_proposal(source.clone(), target.clone()))
            .filter(|p| p.matches(status))
            .collect())
    }

    async fn iter_my_proposals(
        &self,
        status: StatusFilter,
    ) -> Result<Vec<MergeProposal>, ForgeError> {
        let state = match status {
            StatusFilter::Open => "opened",
            StatusFilter::Closed => "closed",
            StatusFilter::Merged => "merged",
            StatusFilter::All => "all",
        };
        let request = self
            .client
            .get(format!("{}/merge_requests", self.api_base))
            .query(&[
                ("scope", "created_by_me"),
                ("state", state),
                ("per_page", "100"),
            ]);
        let requests: Vec<GitLabMergeRequest> = self.send(request).await?;
        debug!(count = requests.len(), "listed own merge requests");

        let mut projects = HashMap::new();
        let mut proposals = Vec::with_capacity(requests.len());
        for mr in requests {
            let (Ok(source_name), Ok(target_name)) = (
                BranchName::new(mr.source_branch.as_str()),
                BranchName::new(mr.target_branch.as_str()),
            ) else {
                debug!(url = %mr.web_url, "skipping merge request with unusable branch names");
                continue;
            };
            let source_url = self.project_web_url(mr.source_project_id, &mut projects).await?;
            let target_url = self.project_web_url(mr.target_project_id, &mut projects).await?;
            let proposal = mr.into_proposal(
                Branch::new(source_url, source_name),
                Branch::new(target_url, target_name),
            );
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
        let owner = self.resolve_owner(owner).await?;
        let (main_owner, project) = self.project_of(main);

        let existing: Option<GitLabProject> = self
            .send_optional(self.client.get(self.project_url(&owner, &project, "")))
            .await?;
        if existing.is_none() {
            info!(owner = %owner, project = %project, "creating fork");
            let _fork: GitLabProject = self
                .send(
                    self.client
                        .post(self.project_url(&main_owner, &project, "fork"))
                        .json(&ForkBody {
                            namespace_path: &owner,
                        }),
                )
                .await?;
        }

        let web = self.web_url(&owner, &project);
        Ok(DerivedTarget {
            branch: Branch::new(web.clone(), name.clone()),
            push_url: format!("{}.git", web),
            public_url: format!("{}/-/tree/{}", web, name),
        })
    }

    async fn create_proposal(
        &self,
        request: ProposalRequest,
    ) -> Result<MergeProposal, ForgeError> {
        let (source_owner, source_project) = self.project_of(&request.source);
        let (target_owner, target_project) = self.project_of(&request.target);

        let target_info: GitLabProject = self
            .send(
                self.client
                    .get(self.project_url(&target_owner, &target_project, "")),
            )
            .await?;
        let reviewer_ids = self.user_ids(&request.reviewers).await?;
        let title = request
            .title
            .clone()
            .unwrap_or_else(|| request.source.name().to_string());
        let labels = request.labels.join(",");

        let body = CreateMergeRequestBody {
            source_branch: request.source.name().as_str(),
            target_branch: request.target.name().as_str(),
            target_project_id: target_info.id,
            title: &title,
            description: &request.description,
            labels: (!labels.is_empty()).then_some(labels.as_str()),
            reviewer_ids,
            allow_collaboration: request.allow_collaboration,
            squash_commit_message: request.commit_message.as_deref(),
        };
        let mr: GitLabMergeRequest = self
            .send(
                self.client
                    .post(self.project_url(&source_owner, &source_project, "merge_requests"))
                    .json(&body),
            )
            .await?;
        info!(iid = mr.iid, url = %mr.web_url, "created merge request");

        let mut proposal = mr.into_proposal(request.source, request.target);
        proposal.reviewers = request.reviewers;
        proposal.commit_message = request.commit_message;
        Ok(proposal)
    }

    async fn set_description(
        &self,
        proposal: &mut MergeProposal,
        description: &str,
    ) -> Result<(), ForgeError> {
        self.update_merge_request(
            proposal,
            &UpdateMergeRequestBody {
                description: Some(description),
                state_event: None,
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
            "GitLab merge requests take a commit message only at creation".into(),
        ))
    }

    async fn close_proposal(&self, proposal: &mut MergeProposal) -> Result<(), ForgeError> {
        self.update_merge_request(
            proposal,
            &UpdateMergeRequestBody {
                description: None,
                state_event: Some("close"),
            },
        )
        .await?;
        proposal.status = ProposalStatus::Closed;
        Ok(())
    }

    async fn reopen_proposal(&self, proposal: &mut MergeProposal) -> Result<(), ForgeError> {
        let result = self
            .update_merge_request(
                proposal,
                &UpdateMergeRequestBody {
                    description: None,
                    state_event: Some("reopen"),
                },
            )
            .await;
        match result {
            Ok(mr) if mr.state == "opened" => {
                proposal.status = ProposalStatus::Open;
                Ok(())
            }
            Ok(mr) => Err(ForgeError::ReopenFailed {
                url: proposal.url.clone(),
                reason: format!("merge request is still {}", mr.state),
            }),
            Err(ForgeError::ApiError { status, message }) if status == 405 || status == 422 => {
                Err(ForgeError::ReopenFailed {
                    url: proposal.url.clone(),
                    reason: message,
                })
            }
            Err(e) => Err(e),
        }
    }
}

// --------------------------------------------------------------------------
// API Request/Response Types
// --------------------------------------------------------------------------

#[derive(Serialize)]
struct CreateMergeRequestBody<'a> {
    source_branch: &'a str,
    target_branch: &'a str,
    target_project_id: u64,
    title: &'a str,
    description: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    labels: Option<&'a str>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    reviewer_ids: Vec<u64>,
    allow_collaboration: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    squash_commit_message: Option<&'a str>,
}

#[derive(Serialize)]
struct UpdateMergeRequestBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    state_event: Option<&'a str>,
}

#[derive(Serialize)]
struct ForkBody<'a> {
    namespace_path: &'a str,
}

#[derive(Deserialize)]
struct GitLabErrorResponse {
    message: Option<String>,
    error: Option<String>,
}

#[derive(Deserialize)]
struct GitLabUser {
    id: u64,
    username: String,
}

#[derive(Deserialize)]
struct GitLabProject {
    id: u64,
    #[serde(default)]
    web_url: String,
}

#[derive(Deserialize)]
struct GitLabBranch {
    #[allow(dead_code)]
    name: String,
}

#[derive(Deserialize)]
struct GitLabMergeRequest {
    iid: u64,
    web_url: String,
    title: String,
    description: Option<String>,
    state: String,
    source_project_id: u64,
    #[serde(default)]
    target_project_id: u64,
    #[serde(default)]
    source_branch: String,
    #[serde(default)]
    target_branch: String,
    #[serde(default)]
    has_conflicts: Option<bool>,
    #[serde(default)]
    labels: Vec<String>,
    author: Option<GitLabUser>,
}

impl GitLabMergeRequest {
    fn status(&self) -> ProposalStatus {
        match self.state.as_str() {
            "merged" => ProposalStatus::Merged,
            "closed" | "locked" => ProposalStatus::Closed,
            _ => ProposalStatus::Open,
        }
    }

    fn into_proposal(self, source: Branch, target: Branch) -> MergeProposal {
        let status = self.status();
        MergeProposal {
            id: self.iid,
            url: self.web_url,
            title: Some(self.title),
            description: self.description,
            commit_message: None,
            labels: self.labels,
            reviewers: Vec::new(),
            owner: self.author.map(|a| a.username),
            status,
            source,
            target,
            mergeable: self.has_conflicts.map(|conflicts| !conflicts),
            dry_run: false,
        }
    }
}

// --------------------------------------------------------------------------
// URL Parsing
// --------------------------------------------------------------------------

/// Percent-encode a project path or branch name for use as a path segment.
fn encode_path(path: &str) -> String {
    let mut encoded = String::with_capacity(path.len());
    for byte in path.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                encoded.push(byte as char)
            }
            _ => encoded.push_str(&format!("%{:02X}", byte)),
        }
    }
    encoded
}

/// Parse a GitLab project URL on one of `hosts`.
///
/// Returns `(host, namespace, project)`. Nested groups stay in the
/// namespace.
///
/// ```
/// use autopropose::forge::gitlab::parse_gitlab_url;
///
/// let (host, owner, project) =
///     parse_gitlab_url("git@gitlab.com:group/subgroup/project.git", &["gitlab.com"]).unwrap();
/// assert_eq!(host, "gitlab.com");
/// assert_eq!(owner, "group/subgroup");
/// assert_eq!(project, "project");
/// ```
pub fn parse_gitlab_url(url: &str, hosts: &[&str]) -> Option<(String, String, String)> {
    for host in hosts {
        let ssh = format!("git@{}:", host);
        let ssh_url = format!("ssh://git@{}/", host);
        let https = format!("https://{}/", host);
        let http = format!("http://{}/", host);
        let rest = url
            .strip_prefix(ssh.as_str())
            .or_else(|| url.strip_prefix(ssh_url.as_str()))
            .or_else(|| url.strip_prefix(https.as_str()))
            .or_else(|| url.strip_prefix(http.as_str()));
        if let Some(rest) = rest {
            let (owner, project) = parse_gitlab_path(rest)?;
            return Some((host.to_string(), owner, project));
        }
    }
    None
}

/// Split a project path into namespace and project.
fn parse_gitlab_path(path: &str) -> Option<(String, String)> {
    // web URLs such as group/project/-/tree/main
    let path = path.split("/-/").next().unwrap_or(path);
    let path = path.trim_end_matches('/');
    let path = path.strip_suffix(".git").unwrap_or(path);

    let (owner, project) = path.rsplit_once('/')?;
    if owner.is_empty() || project.is_empty() {
        return None;
    }
    Some((owner.to_string(), project.to_string()))
}
