#[path = "common/mod.rs"]
mod common;

use anyhow::{bail, Result};
use common::*;
use convtree::{
    ConversationETL, ConversationRegistry, ExportFormat, PostIndex, PostQuery, PostSource, RawPostRecord,
    Reconstruction,
};
use rayon::prelude::*;
use serde_json::json;

fn thread_index() -> PostIndex {
    PostIndex::from_records(vec![
        raw(post("100", "100", None, "Alice", "luna", 500, 2)),
        raw(post("101", "100", Some("100"), "Bob", "luna reply", 1, 0)),
        raw(post("102", "100", Some("100"), "Carol", "luna reply", 1, 0)),
        raw(json!({"id": "103", "conversationId": "100", "inReplyToTweetId": "100", "rawContent": "no author", "sourceLabel": WEB_APP})),
        raw(post_with(
            post("104", "100", Some("100"), "Mallory", "luna spam", 0, 0),
            json!({"sourceLabel": "Botomatic"}),
        )),
        raw(post_with(post("0", "100", Some("101"), "Nobody", "luna nameless", 0, 0), json!({"id": null}))),
    ])
}

#[test]
fn claim_is_first_caller_wins() {
    let reg = ConversationRegistry::new();
    assert!(reg.is_empty());
    assert!(reg.claim("42"));
    assert!(!reg.claim("42"));
    assert!(reg.is_claimed("42"));
    assert!(!reg.is_claimed("43"));
    assert_eq!(reg.len(), 1);

    assert!(reg.release("42"));
    assert!(!reg.release("42"));
    assert!(reg.claim("42"));
}

#[test]
fn concurrent_claims_admit_exactly_one() {
    let reg = ConversationRegistry::new();
    let winners = (0..256).into_par_iter().filter(|_| reg.claim("1523")).count();
    assert_eq!(winners, 1);

    let distinct = (0..256).into_par_iter().filter(|i| reg.claim(&i.to_string())).count();
    assert_eq!(distinct, 256);
    assert_eq!(reg.len(), 257);
}

#[test]
fn reconstruct_builds_once() {
    let idx = thread_index();
    let etl = ConversationETL::new().progress(false);

    match etl.reconstruct(&idx, "100", &PostQuery::new()).unwrap() {
        Reconstruction::Built { tree, stats, malformed, filtered } => {
            assert_eq!(tree.root().id, "100");
            assert_eq!(stats.linked, 2);
            assert_eq!(stats.duplicates, 1, "the root comes back with the candidates");
            // one record without an author, one without an id
            assert_eq!(malformed, 2);
            assert_eq!(filtered, 1);
            assert!(tree.find("101").is_some() && tree.find("102").is_some());
        }
        other => panic!("expected a tree, got {other:?}"),
    }

    // clones share the registry
    let again = etl.clone().reconstruct(&idx, "100", &PostQuery::new()).unwrap();
    assert!(matches!(again, Reconstruction::AlreadyClaimed));
}

#[test]
fn parallel_reconstruction_builds_each_conversation_once() {
    let idx = thread_index();
    let etl = ConversationETL::new().progress(false);
    let q = PostQuery::new();

    let built = (0..32)
        .into_par_iter()
        .map(|_| etl.reconstruct(&idx, "100", &q).unwrap())
        .filter(|r| matches!(r, Reconstruction::Built { .. }))
        .count();
    assert_eq!(built, 1);
}

/// A conversation whose root is missing is not claimed: it can still be built later
/// once the root shows up.
#[test]
fn missing_root_leaves_conversation_unclaimed() {
    let etl = ConversationETL::new().progress(false);
    let empty = PostIndex::new();

    let outcome = etl.reconstruct(&empty, "100", &PostQuery::new()).unwrap();
    assert!(matches!(outcome, Reconstruction::RootUnavailable));
    assert!(!etl.shared_registry().is_claimed("100"));

    let later = etl.reconstruct(&thread_index(), "100", &PostQuery::new()).unwrap();
    assert!(matches!(later, Reconstruction::Built { .. }));
}

/// Answers root lookups with a reply instead of the thread's first post.
struct MisfiledRoot(PostIndex);

impl PostSource for MisfiledRoot {
    fn fetch_by_conversation(&self, _: &str) -> Result<Vec<RawPostRecord>> {
        self.0.fetch_by_conversation("101")
    }
    fn fetch_by_query(&self, query: &PostQuery) -> Result<Vec<RawPostRecord>> {
        self.0.fetch_by_query(query)
    }
}

#[test]
fn non_root_record_is_not_used_as_root() {
    let etl = ConversationETL::new().progress(false);
    let source = MisfiledRoot(thread_index());

    let outcome = etl.reconstruct(&source, "100", &PostQuery::new()).unwrap();
    assert!(matches!(outcome, Reconstruction::RootUnavailable));
    assert!(etl.shared_registry().is_empty());
}

/// A run whose output cannot be promoted gives its conversations back and leaves no
/// staging file; the next run exports them.
#[test]
fn failed_export_releases_its_claims() {
    let idx = thread_index();
    let etl = ConversationETL::new().progress(false);
    let dir = tempfile::tempdir().unwrap();
    let q = PostQuery::new().keyword("luna");

    // a non-empty directory sits where the output file should go
    let blocked = dir.path().join("out.tsv");
    std::fs::create_dir_all(blocked.join("occupied")).unwrap();

    let err = etl.export(&idx, &q, &blocked, ExportFormat::Tsv).unwrap_err();
    assert!(format!("{err:#}").contains("out.tsv"), "{err:#}");
    assert!(!etl.shared_registry().is_claimed("100"));
    assert!(!dir.path().join("out.tsv.inprogress").exists());

    let good = dir.path().join("good.tsv");
    let retry = etl.export(&idx, &q, &good, ExportFormat::Tsv).unwrap();
    assert_eq!(retry.skipped_claimed, 0);
    assert_eq!(retry.conversations, 1);
    assert_eq!(retry.rows, 2);
    assert_eq!(read_lines(&good).len(), 3);
    assert!(etl.shared_registry().is_claimed("100"));
}

/// Serves seeds and roots, but every conversation lookup fails.
struct FlakyReplies(PostIndex);

impl PostSource for FlakyReplies {
    fn fetch_by_conversation(&self, conversation_id: &str) -> Result<Vec<RawPostRecord>> {
        self.0.fetch_by_conversation(conversation_id)
    }
    fn fetch_by_query(&self, query: &PostQuery) -> Result<Vec<RawPostRecord>> {
        if query.conversation_id.is_some() {
            bail!("rate limited");
        }
        self.0.fetch_by_query(query)
    }
}

#[test]
fn failed_reply_fetch_skips_but_keeps_the_claim() {
    let source = FlakyReplies(thread_index());
    let etl = ConversationETL::new().progress(false);
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("flaky.tsv");

    let reconstruct = etl.clone().reconstruct(&source, "100", &PostQuery::new());
    let err = reconstruct.unwrap_err();
    assert!(format!("{err:#}").contains("rate limited"));
    assert!(etl.shared_registry().is_claimed("100"));

    let fresh = ConversationETL::new().progress(false);
    let summary = fresh.export(&source, &PostQuery::new().keyword("luna"), &out, ExportFormat::Tsv).unwrap();
    assert_eq!(summary.skipped_fetch_failed, 1);
    assert_eq!(summary.rows, 0);
    assert!(fresh.shared_registry().is_claimed("100"));
    assert_eq!(read_lines(&out).len(), 1);
}

/// A failing seed query aborts the run and leaves no output behind.
#[test]
fn failed_seed_query_aborts_export() {
    struct Down;
    impl PostSource for Down {
        fn fetch_by_conversation(&self, _: &str) -> Result<Vec<RawPostRecord>> {
            Ok(Vec::new())
        }
        fn fetch_by_query(&self, _: &PostQuery) -> Result<Vec<RawPostRecord>> {
            bail!("connection refused")
        }
    }

    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("down.tsv");
    let err = ConversationETL::new()
        .progress(false)
        .export(&Down, &PostQuery::new().keyword("shib"), &out, ExportFormat::Tsv)
        .unwrap_err();
    assert!(format!("{err:#}").contains("connection refused"));
    assert!(!out.exists());
}
