#[path = "common/mod.rs"]
mod common;

use common::*;
use convtree::{matches_query, parse_day, source_allowed, within_days, PostQuery};
use serde_json::json;
use time::macros::{date, datetime};

#[test]
fn parses_and_prints_scraper_syntax() {
    let q: PostQuery = r#""Terra Luna" crash lang:EN since:2022-05-01 until:2022-05-05"#.parse().unwrap();

    assert_eq!(q.keywords, vec!["crash", "terra luna"]);
    assert_eq!(q.language.as_deref(), Some("en"));
    assert_eq!(q.since, Some(date!(2022 - 05 - 01)));
    assert_eq!(q.until, Some(date!(2022 - 05 - 05)));
    assert_eq!(q.conversation_id, None);

    let printed = q.to_string();
    assert_eq!(printed, r#""crash" "terra luna" lang:en since:2022-05-01 until:2022-05-05"#);
    assert_eq!(printed.parse::<PostQuery>().unwrap(), q);
}

#[test]
fn rejects_bad_dates_and_quotes() {
    assert!("luna since:2022-13-01".parse::<PostQuery>().is_err());
    assert!(r#""luna crash"#.parse::<PostQuery>().is_err());
    assert!(parse_day("05/01/2022").is_err());
    assert_eq!(parse_day(" 2021-10-20 ").unwrap(), date!(2021 - 10 - 20));
}

/// Reply lookups keep the topic filter but not the seed window.
#[test]
fn narrowing_drops_the_window() {
    let seed = PostQuery::new()
        .keyword("Doge")
        .language("en")
        .since(date!(2021 - 04 - 10))
        .until(date!(2021 - 05 - 10));
    let narrowed = seed.narrowed_to("1390000000000000000");

    assert_eq!(narrowed.keywords, vec!["doge"]);
    assert_eq!(narrowed.language.as_deref(), Some("en"));
    assert_eq!(narrowed.conversation_id.as_deref(), Some("1390000000000000000"));
    assert_eq!((narrowed.since, narrowed.until), (None, None));
    assert_eq!(narrowed.to_string(), r#""doge" lang:en conversation_id:1390000000000000000"#);
}

#[test]
fn records_must_match_every_keyword() {
    let rec = raw(post("1", "1", None, "Alice", "LUNA and UST depeg", 0, 0));

    assert!(matches_query(&rec, &PostQuery::new()));
    assert!(matches_query(&rec, &PostQuery::new().keyword("luna").keyword("ust")));
    assert!(!matches_query(&rec, &PostQuery::new().keyword("luna").keyword("shib")));
    assert!(matches_query(&rec, &PostQuery::new().language("EN")));
    assert!(!matches_query(&rec, &PostQuery::new().language("ja")));
    assert!(matches_query(&rec, &PostQuery::new().conversation("1")));
    assert!(!matches_query(&rec, &PostQuery::new().conversation("2")));
}

#[test]
fn date_bounds_are_half_open() {
    let rec = raw(post("1", "1", None, "Alice", "luna", 0, 0)); // 2022-05-02
    let q = |since, until| PostQuery::new().since(since).until(until);

    assert!(matches_query(&rec, &q(date!(2022 - 05 - 02), date!(2022 - 05 - 03))));
    assert!(!matches_query(&rec, &q(date!(2022 - 05 - 01), date!(2022 - 05 - 02))));
    assert!(!matches_query(&rec, &q(date!(2022 - 05 - 03), date!(2022 - 05 - 10))));

    let undated = raw(post_with(post("2", "2", None, "Bob", "luna", 0, 0), json!({"date": null})));
    assert!(!matches_query(&undated, &q(date!(2022 - 01 - 01), date!(2023 - 01 - 01))));

    // offsets are folded into the UTC day
    let late_evening = datetime!(2022-05-02 22:30:00 -05:00);
    assert!(within_days(Some(late_evening), Some(date!(2022 - 05 - 03)), None));
    assert!(!within_days(None, None, None));
}

#[test]
fn source_filter_is_exact() {
    let allowed = vec![WEB_APP.to_string()];
    assert!(source_allowed(WEB_APP, Some(&allowed)));
    assert!(!source_allowed("twitter web app", Some(&allowed)));
    assert!(!source_allowed("", Some(&allowed)));
    assert!(source_allowed("Botomatic", None));
}
