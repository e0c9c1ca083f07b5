//! Raw scraper record schema. Mirrors the camelCase JSON emitted by the post scraper;
//! unknown fields are ignored by serde.

use serde::{de, Deserialize, Deserializer};
use serde_json::Value;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

/// One post as delivered by the upstream source, before normalization.
/// Identifier fields accept strings, numbers or null (`lenient_id`).
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawPostRecord {
    #[serde(default, deserialize_with = "lenient_id")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "lenient_id")]
    pub conversation_id: Option<String>,
    #[serde(default, alias = "inReplyToId", deserialize_with = "lenient_id")]
    pub in_reply_to_tweet_id: Option<String>,

    #[serde(default, alias = "content")]
    pub raw_content: Option<String>,
    /// RFC3339 string, `YYYY-MM-DD HH:MM:SS+HH:MM`, or unix seconds.
    #[serde(default)]
    pub date: Option<Value>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub user: Option<RawUser>,

    #[serde(default)]
    pub like_count: Option<u64>,
    #[serde(default)]
    pub reply_count: Option<u64>,
    #[serde(default)]
    pub retweet_count: Option<u64>,
    #[serde(default)]
    pub source_label: Option<String>,
    #[serde(default)]
    pub lang: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawUser {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub displayname: Option<String>,
    #[serde(default)]
    pub statuses_count: Option<u64>,
    #[serde(default)]
    pub followers_count: Option<u64>,
    #[serde(default)]
    pub verified: Option<bool>,
    #[serde(default)]
    pub label: Option<RawUserLabel>,
}

/// Account label attached by the platform (e.g. "Automated").
#[derive(Clone, Debug, Default, Deserialize)]
pub struct RawUserLabel {
    #[serde(default)]
    pub description: Option<String>,
}

impl RawPostRecord {
    /// Parse one JSON line.
    #[inline]
    pub fn from_json_line(line: &str) -> serde_json::Result<Self> {
        serde_json::from_str(line)
    }

    /// Best-effort timestamp; `None` if absent or unparsable.
    pub fn timestamp(&self) -> Option<OffsetDateTime> {
        parse_post_date(self.date.as_ref()?)
    }
}

fn lenient_id<'de, D>(de: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(de)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => {
            let s = s.trim();
            Ok(if s.is_empty() { None } else { Some(s.to_string()) })
        }
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(de::Error::custom(format!("identifier must be string or number, got {other}"))),
    }
}

pub(crate) fn parse_post_date(v: &Value) -> Option<OffsetDateTime> {
    match v {
        Value::Number(n) => n.as_i64().and_then(|ts| OffsetDateTime::from_unix_timestamp(ts).ok()),
        Value::String(s) => {
            let s = s.trim();
            OffsetDateTime::parse(s, &Rfc3339).ok().or_else(|| {
                // `YYYY-MM-DD HH:MM:SS+HH:MM` uses a space instead of `T`
                OffsetDateTime::parse(&s.replacen(' ', "T", 1), &Rfc3339).ok()
            })
        }
        _ => None,
    }
}
