#![allow(dead_code)]

use convtree::{PostNode, RawPostRecord};
use serde_json::{json, Value};
use std::fs::{self, File};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

pub const WEB_APP: &str = "Twitter Web App";

/// Write a compressed `.zst` file containing the provided JSONL lines.
/// This mirrors the corpus's posts_YYYY-MM monthly dumps but with tiny content.
pub fn write_zst_lines(path: &Path, lines: &[String]) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    let f = File::create(path).unwrap();
    let mut enc = zstd::stream::write::Encoder::new(f, 3).unwrap();
    for l in lines {
        writeln!(&mut enc, "{}", l).unwrap();
    }
    enc.finish().unwrap();
}

/// Plain (uncompressed) JSONL dump.
pub fn write_jsonl_lines(path: &Path, lines: &[String]) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    let mut f = File::create(path).unwrap();
    for l in lines {
        writeln!(&mut f, "{}", l).unwrap();
    }
}

/// Read a JSONL file into a vector of `serde_json::Value` (skips empty lines).
pub fn read_jsonl_values(path: &Path) -> Vec<Value> {
    read_lines(path).iter().map(|s| serde_json::from_str(s).unwrap()).collect()
}

/// Read a text file line-by-line into strings (useful for .tsv).
pub fn read_lines(path: &Path) -> Vec<String> {
    let f = File::open(path).unwrap();
    let r = BufReader::new(f);
    r.lines().map(|l| l.unwrap()).filter(|s| !s.is_empty()).collect()
}

/// A scraper-shaped post. `name` doubles as username (lowercased) and display name.
pub fn post(id: &str, conv: &str, reply_to: Option<&str>, name: &str, text: &str, likes: u64, replies: u64) -> Value {
    json!({
        "id": id,
        "conversationId": conv,
        "inReplyToTweetId": reply_to,
        "rawContent": text,
        "date": "2022-05-02T10:00:00+00:00",
        "url": format!("https://twitter.com/{}/status/{id}", name.to_lowercase()),
        "user": {
            "username": name.to_lowercase(),
            "displayname": name,
            "statusesCount": 1200,
            "followersCount": 45,
            "verified": false
        },
        "likeCount": likes,
        "replyCount": replies,
        "retweetCount": 0,
        "sourceLabel": WEB_APP,
        "lang": "en"
    })
}

/// Same as `post`, with fields overridden by `patch` (top-level keys only).
pub fn post_with(mut base: Value, patch: Value) -> Value {
    if let (Some(b), Some(p)) = (base.as_object_mut(), patch.as_object()) {
        for (k, v) in p {
            b.insert(k.clone(), v.clone());
        }
    }
    base
}

pub fn raw(v: Value) -> RawPostRecord {
    serde_json::from_value(v).unwrap()
}

pub fn node(v: Value) -> PostNode {
    PostNode::from_raw(raw(v)).unwrap()
}

/// Build a tiny corpus under a fresh temp dir:
///
/// `posts_2022-05.zst`
/// - conversation 100: root by Alice (500 likes, 2 replies)
///     101 Bob -> 100 (1 reply), 102 Carol -> 100, 104 Eve -> 999 (parent never scraped),
///     105 Mallory -> 101 posted from the "Botomatic" client
///     plus a repeated copy of 102
/// - 200: root by Frank with 300 likes and no replies
/// - 301: Gina replying to conversation 300, whose root is missing
/// - 400: root by Hank with only 5 likes
/// - 500: root by Ivy posted from "Botomatic"
/// - 600: record without a user (malformed)
/// - one line that is not JSON
///
/// `posts_2022-06.jsonl`
/// - 103 Dave -> 101, dated 2022-06-01 (outside a May seed window)
///
/// Every post mentions "luna"; replies all carry fewer than 200 likes.
pub fn make_corpus_basic() -> PathBuf {
    let dir = tempfile::tempdir().unwrap();
    let base = dir.into_path();

    let may = vec![
        post("100", "100", None, "Alice", "LUNA is crashing", 500, 2).to_string(),
        post("101", "100", Some("100"), "Bob", "luna to zero", 10, 1).to_string(),
        post("102", "100", Some("100"), "Carol", "buying luna\nthe dip", 3, 0).to_string(),
        post("102", "100", Some("100"), "Carol", "buying luna\nthe dip", 3, 0).to_string(),
        post("104", "100", Some("999"), "Eve", "luna orphan", 1, 0).to_string(),
        post_with(
            post("105", "100", Some("101"), "Mallory", "luna giveaway", 0, 0),
            json!({"sourceLabel": "Botomatic"}),
        )
        .to_string(),
        post("200", "200", None, "Frank", "luna single", 300, 0).to_string(),
        post("301", "300", Some("300"), "Gina", "luna where is the root", 250, 0).to_string(),
        post("400", "400", None, "Hank", "luna low", 5, 3).to_string(),
        post_with(post("500", "500", None, "Ivy", "luna bot", 900, 1), json!({"sourceLabel": "Botomatic"})).to_string(),
        json!({"id": "600", "conversationId": "600", "rawContent": "luna broken", "likeCount": 1000,
               "date": "2022-05-04T00:00:00Z", "lang": "en", "sourceLabel": WEB_APP})
        .to_string(),
        "not json at all".to_string(),
    ];
    write_zst_lines(&base.join("posts_2022-05.zst"), &may);

    let june = vec![post_with(
        post("103", "100", Some("101"), "Dave", "luna lol", 2, 0),
        json!({"date": "2022-06-01T08:30:00Z"}),
    )
    .to_string()];
    write_jsonl_lines(&base.join("posts_2022-06.jsonl"), &june);

    base
}
