//! Property-based tests for domain types and resume classification.
//!
//! These tests use proptest to verify invariants hold across
//! randomly generated inputs.

use proptest::prelude::*;

use autopropose::core::types::{BranchName, Oid};
use autopropose::forge::{title_from_description, MergeProposal, ProposalStatus};
use autopropose::git::{Branch, ColocatedBranch};
use autopropose::publish::{PublishMode, ResumeState};

/// Strategy for generating valid branch name characters.
fn branch_name_char() -> impl Strategy<Value = char> {
    prop_oneof![
        prop::char::range('a', 'z'),
        prop::char::range('A', 'Z'),
        prop::char::range('0', '9'),
        Just('-'),
        Just('_'),
        Just('.'),
        Just('/'),
    ]
}

/// Strategy for generating valid branch names.
fn valid_branch_name() -> impl Strategy<Value = String> {
    prop::collection::vec(branch_name_char(), 1..40).prop_filter_map(
        "must be valid branch name",
        |chars| {
            let name: String = chars.into_iter().collect();
            BranchName::new(name.as_str()).ok().map(|_| name)
        },
    )
}

/// Strategy for generating valid hex OIDs.
fn valid_oid_string() -> impl Strategy<Value = String> {
    prop::collection::vec(
        prop::sample::select(vec![
            '0', '1', '2', '3', '4', '5', '6', '7', '8', '9', 'a', 'b', 'c', 'd', 'e', 'f',
        ]),
        40,
    )
    .prop_map(|chars| chars.into_iter().collect())
}

fn status() -> impl Strategy<Value = ProposalStatus> {
    prop_oneof![
        Just(ProposalStatus::Open),
        Just(ProposalStatus::Closed),
        Just(ProposalStatus::Merged),
    ]
}

fn proposal(id: u64, status: ProposalStatus) -> MergeProposal {
    MergeProposal {
        id,
        url: format!("https://forge.invalid/proposals/{}", id),
        title: None,
        description: Some("Fix typos".to_string()),
        commit_message: None,
        labels: Vec::new(),
        reviewers: Vec::new(),
        owner: None,
        status,
        source: derived(),
        target: Branch::new("/srv/upstream", BranchName::new("main").unwrap()),
        mergeable: None,
        dry_run: false,
    }
}

fn derived() -> Branch {
    Branch::new("/srv/derived", BranchName::new("fix").unwrap())
}

proptest! {
    /// Branch names that validate are usable as refs and parse back.
    #[test]
    fn branch_name_refname_roundtrip(name in valid_branch_name()) {
        let branch = BranchName::new(name.as_str()).unwrap();
        let refname = branch.refname();
        prop_assert!(refname.starts_with("refs/heads/"));
        prop_assert_eq!(BranchName::from_refname(&refname), Some(branch));
    }

    /// Names containing a forbidden character never validate.
    #[test]
    fn forbidden_chars_rejected(
        prefix in "[a-z]{1,10}",
        bad in prop::sample::select(vec![' ', '~', '^', ':', '\\', '?', '*', '[']),
        suffix in "[a-z]{1,10}",
    ) {
        let name = format!("{}{}{}", prefix, bad, suffix);
        prop_assert!(BranchName::new(name).is_err());
    }

    /// `from:to` colocated specs keep both names.
    #[test]
    fn colocated_spec_parses(from in valid_branch_name(), to in valid_branch_name()) {
        let spec = format!("{}:{}", from, to);
        let colocated: ColocatedBranch = spec.parse().unwrap();
        prop_assert_eq!(colocated.from.as_str(), from.as_str());
        prop_assert_eq!(colocated.to.as_str(), to.as_str());
    }

    /// OIDs are normalized to lowercase.
    #[test]
    fn oid_normalized_to_lowercase(oid_str in valid_oid_string()) {
        let oid = Oid::new(oid_str.to_uppercase()).unwrap();
        prop_assert_eq!(oid.as_str(), oid_str.as_str());
    }

    /// Oid::short returns correct prefix.
    #[test]
    fn oid_short_is_prefix(oid_str in valid_oid_string(), len in 1usize..40) {
        let oid = Oid::new(oid_str.as_str()).unwrap();
        prop_assert!(oid_str.starts_with(oid.short(len)));
        prop_assert_eq!(oid.short(len).len(), len);
    }

    /// Titles are a single line taken from the description.
    #[test]
    fn title_is_single_line(description in "[ -~\n]{0,200}") {
        if let Some(title) = title_from_description(&description) {
            prop_assert!(!title.contains('\n'));
            prop_assert!(!title.is_empty());
            prop_assert!(description.contains(title.as_str()));
        }
    }

    /// Unknown mode names never parse.
    #[test]
    fn unknown_modes_rejected(name in "[a-z-]{1,20}") {
        let known = PublishMode::ALL.iter().any(|m| m.as_str() == name);
        prop_assert_eq!(name.parse::<PublishMode>().is_ok(), known);
    }

    /// Without a derived branch nothing is resumed, whatever the proposals.
    #[test]
    fn no_derived_branch_never_resumes(
        statuses in prop::collection::vec(status(), 0..6),
        overwrite in any::<bool>(),
    ) {
        let proposals = statuses
            .into_iter()
            .enumerate()
            .map(|(i, s)| proposal(i as u64 + 1, s))
            .collect();
        prop_assert_eq!(
            ResumeState::classify(None, proposals, overwrite),
            ResumeState::NoResume
        );
    }

    /// A branch is resumed exactly when an open proposal exists, and then
    /// its history is never overwritten.
    #[test]
    fn resume_iff_open_proposal(
        statuses in prop::collection::vec(status(), 0..6),
        overwrite in any::<bool>(),
    ) {
        let has_open = statuses.contains(&ProposalStatus::Open);
        let has_any = !statuses.is_empty();
        let proposals = statuses
            .into_iter()
            .enumerate()
            .map(|(i, s)| proposal(i as u64 + 1, s))
            .collect();

        let state = ResumeState::classify(Some(derived()), proposals, overwrite);
        prop_assert_eq!(state.resume_branch().is_some(), has_open);
        prop_assert_eq!(state.proposal().is_some(), has_open);
        if has_open {
            prop_assert!(!state.overwrite());
            prop_assert!(state.proposal().unwrap().is_open());
        } else if has_any {
            prop_assert!(state.overwrite());
        } else {
            prop_assert_eq!(state.overwrite(), overwrite);
        }
    }
}
