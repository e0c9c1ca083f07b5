use crate::error::ConvoError;
use crate::record::RawPostRecord;
use time::OffsetDateTime;

/// A normalized post. Built once from a `RawPostRecord`; never mutated afterwards.
/// Tree linkage (parent/children) lives in the owning `ConversationTree` arena.
///
/// Equality is by `id` only, including against a bare `&str` identifier.
#[derive(Clone, Debug)]
pub struct PostNode {
    pub id: String,
    pub conversation_id: String,
    pub in_reply_to_id: Option<String>,

    pub raw_text: String,
    pub username: String,
    pub author_name: String,
    /// `"{author_name}: {raw_text}"`
    pub message: String,

    pub date: Option<OffsetDateTime>,
    pub url: Option<String>,
    pub like_count: u64,
    pub reply_count: u64,
    pub retweet_count: u64,
    pub source_label: String,
    pub language: String,

    pub author_status_count: u64,
    pub author_follower_count: u64,
    /// `None` unless the platform labels the account.
    pub is_automated: Option<bool>,
    pub is_verified: bool,
}

impl PostNode {
    /// Normalize a raw record. Fails only when `id`, `conversationId` or the author is missing.
    pub fn from_raw(raw: RawPostRecord) -> Result<Self, ConvoError> {
        let date = raw.timestamp();
        let RawPostRecord {
            id,
            conversation_id,
            in_reply_to_tweet_id,
            raw_content,
            url,
            user,
            like_count,
            reply_count,
            retweet_count,
            source_label,
            lang,
            ..
        } = raw;

        let id = id.ok_or_else(|| ConvoError::missing("id", None))?;
        let conversation_id = conversation_id.ok_or_else(|| ConvoError::missing("conversationId", Some(&id)))?;
        let user = user.ok_or_else(|| ConvoError::missing("user", Some(&id)))?;
        let username = user
            .username
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| ConvoError::missing("user.username", Some(&id)))?;
        let author_name = user
            .displayname
            .filter(|d| !d.trim().is_empty())
            .unwrap_or_else(|| username.clone());

        let raw_text = collapse_newlines(raw_content.as_deref().unwrap_or_default());
        let message = format!("{author_name}: {raw_text}");

        let is_automated = user
            .label
            .map(|l| l.description.as_deref() == Some("Automated"));

        Ok(Self {
            id,
            conversation_id,
            in_reply_to_id: in_reply_to_tweet_id,
            raw_text,
            username,
            author_name,
            message,
            date,
            url,
            like_count: like_count.unwrap_or(0),
            reply_count: reply_count.unwrap_or(0),
            retweet_count: retweet_count.unwrap_or(0),
            source_label: source_label.unwrap_or_default(),
            language: lang.unwrap_or_default(),
            author_status_count: user.statuses_count.unwrap_or(0),
            author_follower_count: user.followers_count.unwrap_or(0),
            is_automated,
            is_verified: user.verified.unwrap_or(false),
        })
    }

    /// The thread's original post: no parent and `id == conversation_id`.
    #[inline]
    pub fn is_root(&self) -> bool {
        self.in_reply_to_id.is_none() && self.id == self.conversation_id
    }

    #[inline]
    pub fn replies_to(&self, parent_id: &str) -> bool {
        self.in_reply_to_id.as_deref() == Some(parent_id)
    }
}

impl PartialEq for PostNode {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}
impl Eq for PostNode {}

impl PartialEq<str> for PostNode {
    fn eq(&self, other: &str) -> bool {
        self.id == other
    }
}

impl PartialEq<&str> for PostNode {
    fn eq(&self, other: &&str) -> bool {
        self.id == *other
    }
}

impl std::hash::Hash for PostNode {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// `\r\n`, `\r` and `\n` each become one space.
fn collapse_newlines(s: &str) -> String {
    s.replace("\r\n", " ").replace(['\r', '\n'], " ")
}
