//! Integration tests for the GitHub forge against a mock HTTP server.

use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use autopropose::core::types::BranchName;
use autopropose::forge::github::GitHubForge;
use autopropose::forge::{
    Forge, ForgeError, MergeProposal, ProposalRequest, ProposalStatus, StatusFilter,
};
use autopropose::git::Branch;

fn branch(url: &str, name: &str) -> Branch {
    Branch::new(url, BranchName::new(name).unwrap())
}

fn main_branch() -> Branch {
    branch("https://github.com/upstream/project", "main")
}

fn derived_branch() -> Branch {
    branch("https://github.com/bot/project", "fix-typos")
}

fn forge(server: &MockServer) -> GitHubForge {
    GitHubForge::new("test-token", "upstream", "project").with_api_base(server.uri())
}

fn pull(number: u64, state: &str, merged_at: Option<&str>) -> serde_json::Value {
    json!({
        "number": number,
        "html_url": format!("https://github.com/upstream/project/pull/{}", number),
        "state": state,
        "title": "Fix typos",
        "body": "Fix typos in the docs.",
        "merged_at": merged_at,
        "labels": [{"name": "automated"}],
        "requested_reviewers": [],
        "user": {"login": "bot"}
    })
}

fn open_proposal(number: u64) -> MergeProposal {
    MergeProposal {
        id: number,
        url: format!("https://github.com/upstream/project/pull/{}", number),
        title: Some("Fix typos".to_string()),
        description: Some("Fix typos in the docs.".to_string()),
        commit_message: None,
        labels: Vec::new(),
        reviewers: Vec::new(),
        owner: Some("bot".to_string()),
        status: ProposalStatus::Open,
        source: derived_branch(),
        target: main_branch(),
        mergeable: None,
        dry_run: false,
    }
}

mod lookups {
    use super::*;

    #[tokio::test]
    async fn derived_branch_found_for_current_user() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/user"))
            .and(header("authorization", "Bearer test-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"login": "bot"})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/repos/bot/project/branches/fix-typos"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"name": "fix-typos"})))
            .mount(&server)
            .await;

        let found = forge(&server)
            .get_derived_branch(&main_branch(), &BranchName::new("fix-typos").unwrap(), None)
            .await
            .unwrap();
        assert_eq!(found, Some(derived_branch()));
    }

    #[tokio::test]
    async fn missing_derived_branch_is_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/someone/project/branches/fix-typos"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({"message": "Not Found"})))
            .mount(&server)
            .await;

        let found = forge(&server)
            .get_derived_branch(
                &main_branch(),
                &BranchName::new("fix-typos").unwrap(),
                Some("someone"),
            )
            .await
            .unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn proposals_filtered_by_head_and_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/upstream/project/pulls"))
            .and(query_param("head", "bot:fix-typos"))
            .and(query_param("base", "main"))
            .and(query_param("state", "all"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                pull(3, "open", None),
                pull(2, "closed", Some("2024-01-01T00:00:00Z")),
                pull(1, "closed", None),
            ])))
            .mount(&server)
            .await;

        let proposals = forge(&server)
            .iter_proposals(&derived_branch(), &main_branch(), StatusFilter::All)
            .await
            .unwrap();

        let statuses: Vec<ProposalStatus> = proposals.iter().map(|p| p.status).collect();
        assert_eq!(
            statuses,
            vec![
                ProposalStatus::Open,
                ProposalStatus::Merged,
                ProposalStatus::Closed
            ]
        );
        assert_eq!(proposals[0].labels, vec!["automated".to_string()]);
        assert_eq!(proposals[0].source, derived_branch());
    }

    #[tokio::test]
    async fn own_proposals_carry_branches_and_mergeability() {
        let server = MockServer::start().await;
        let repository_url = format!("{}/repos/upstream/project", server.uri());
        Mock::given(method("GET"))
            .and(path("/user"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"login": "bot"})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/search/issues"))
            .and(query_param("q", "is:pr author:bot is:open"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "total_count": 2,
                "items": [
                    {"number": 7, "repository_url": repository_url},
                    {"number": 8, "repository_url": repository_url},
                ]
            })))
            .mount(&server)
            .await;

        let mut conflicted = pull(7, "open", None);
        conflicted["mergeable"] = json!(false);
        conflicted["head"] = json!({
            "ref": "fix-typos",
            "repo": {"html_url": "https://github.com/bot/project"}
        });
        conflicted["base"] = json!({
            "ref": "main",
            "repo": {"html_url": "https://github.com/upstream/project"}
        });
        Mock::given(method("GET"))
            .and(path("/repos/upstream/project/pulls/7"))
            .respond_with(ResponseTemplate::new(200).set_body_json(conflicted))
            .mount(&server)
            .await;

        // The fork behind this one was deleted
        let mut orphaned = pull(8, "open", None);
        orphaned["head"] = json!({"ref": "gone", "repo": null});
        orphaned["base"] = json!({
            "ref": "main",
            "repo": {"html_url": "https://github.com/upstream/project"}
        });
        Mock::given(method("GET"))
            .and(path("/repos/upstream/project/pulls/8"))
            .respond_with(ResponseTemplate::new(200).set_body_json(orphaned))
            .mount(&server)
            .await;

        let proposals = forge(&server)
            .iter_my_proposals(StatusFilter::Open)
            .await
            .unwrap();

        assert_eq!(proposals.len(), 1);
        assert_eq!(proposals[0].id, 7);
        assert_eq!(proposals[0].source, derived_branch());
        assert_eq!(proposals[0].target, main_branch());
        assert_eq!(proposals[0].can_be_merged().ok(), Some(false));
    }

    #[tokio::test]
    async fn unauthorized_is_auth_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/upstream/project/pulls"))
            .respond_with(
                ResponseTemplate::new(401).set_body_json(json!({"message": "Bad credentials"})),
            )
            .mount(&server)
            .await;

        let result = forge(&server)
            .iter_proposals(&derived_branch(), &main_branch(), StatusFilter::Open)
            .await;
        assert!(matches!(result, Err(ForgeError::AuthFailed(_))));
    }
}

mod mutations {
    use super::*;

    #[tokio::test]
    async fn publish_derived_forks_when_missing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/user"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"login": "bot"})))
            .mount(&server)
            .await;
        // Missing at first, visible once the fork has been requested
        Mock::given(method("GET"))
            .and(path("/repos/bot/project"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({"message": "Not Found"})))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/repos/bot/project"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"full_name": "bot/project"})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/repos/upstream/project/forks"))
            .respond_with(
                ResponseTemplate::new(202).set_body_json(json!({"full_name": "bot/project"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let target = forge(&server)
            .publish_derived(&main_branch(), &BranchName::new("fix-typos").unwrap(), None)
            .await
            .unwrap();

        assert_eq!(target.branch, derived_branch());
        assert_eq!(target.push_url, "https://github.com/bot/project.git");
    }

    #[tokio::test]
    async fn publish_derived_reuses_existing_fork() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/user"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"login": "bot"})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/repos/bot/project"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"full_name": "bot/project"})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/repos/upstream/project/forks"))
            .respond_with(ResponseTemplate::new(202))
            .expect(0)
            .mount(&server)
            .await;

        let target = forge(&server)
            .publish_derived(
                &main_branch(),
                &BranchName::new("fix-typos").unwrap(),
                Some("bot"),
            )
            .await
            .unwrap();
        assert_eq!(target.branch, derived_branch());
    }

    #[tokio::test]
    async fn create_proposal_applies_labels() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/repos/upstream/project/pulls"))
            .and(body_partial_json(json!({
                "head": "bot:fix-typos",
                "base": "main",
                "title": "Fix typos",
                "maintainer_can_modify": true
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(pull(5, "open", None)))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/repos/upstream/project/issues/5/labels"))
            .and(body_partial_json(json!({"labels": ["automated"]})))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!([{"name": "automated"}])),
            )
            .expect(1)
            .mount(&server)
            .await;

        let proposal = forge(&server)
            .create_proposal(ProposalRequest {
                source: derived_branch(),
                target: main_branch(),
                title: Some("Fix typos".to_string()),
                description: "Fix typos in the docs.".to_string(),
                labels: vec!["automated".to_string()],
                reviewers: Vec::new(),
                commit_message: None,
                allow_collaboration: true,
            })
            .await
            .unwrap();

        assert_eq!(proposal.id, 5);
        assert!(proposal.is_open());
        assert_eq!(proposal.labels, vec!["automated".to_string()]);
    }

    #[tokio::test]
    async fn set_description_patches_body() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path("/repos/upstream/project/pulls/4"))
            .and(body_partial_json(json!({"body": "New text"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(pull(4, "open", None)))
            .expect(1)
            .mount(&server)
            .await;

        let mut proposal = open_proposal(4);
        forge(&server)
            .set_description(&mut proposal, "New text")
            .await
            .unwrap();
        assert_eq!(proposal.description.as_deref(), Some("New text"));
    }

    #[tokio::test]
    async fn close_then_refused_reopen() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path("/repos/upstream/project/pulls/4"))
            .and(body_partial_json(json!({"state": "closed"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(pull(4, "closed", None)))
            .mount(&server)
            .await;
        Mock::given(method("PATCH"))
            .and(path("/repos/upstream/project/pulls/4"))
            .and(body_partial_json(json!({"state": "open"})))
            .respond_with(ResponseTemplate::new(422).set_body_json(
                json!({"message": "state cannot be changed. The fix-typos branch was force-pushed"}),
            ))
            .mount(&server)
            .await;

        let forge = forge(&server);
        let mut proposal = open_proposal(4);
        forge.close_proposal(&mut proposal).await.unwrap();
        assert!(proposal.is_closed());

        let result = forge.reopen_proposal(&mut proposal).await;
        assert!(matches!(result, Err(ForgeError::ReopenFailed { .. })));
        assert!(proposal.is_closed());
    }

    #[tokio::test]
    async fn commit_message_not_supported() {
        let server = MockServer::start().await;
        let mut proposal = open_proposal(4);
        let result = forge(&server)
            .set_commit_message(&mut proposal, "Merge fix")
            .await;
        assert!(matches!(result, Err(ForgeError::NotImplemented(_))));
    }
}
