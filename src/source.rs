//! Post sources: the seam between reconstruction and whatever supplies raw posts.

use crate::filters::matches_query;
use crate::query::PostQuery;
use crate::record::RawPostRecord;
use ahash::AHashMap;
use anyhow::Result;

/// Supplier of raw post records (scraper, archive, fixture...).
/// Transport concerns (retries, rate limits) belong to the implementation.
pub trait PostSource {
    /// Records whose id is `conversation_id`, i.e. the thread's root post.
    /// Empty when the root is unavailable (deleted, private, never scraped).
    fn fetch_by_conversation(&self, conversation_id: &str) -> Result<Vec<RawPostRecord>>;

    /// Records matching `query`, in source order.
    fn fetch_by_query(&self, query: &PostQuery) -> Result<Vec<RawPostRecord>>;
}

impl<S: PostSource + ?Sized> PostSource for &S {
    fn fetch_by_conversation(&self, conversation_id: &str) -> Result<Vec<RawPostRecord>> {
        (**self).fetch_by_conversation(conversation_id)
    }
    fn fetch_by_query(&self, query: &PostQuery) -> Result<Vec<RawPostRecord>> {
        (**self).fetch_by_query(query)
    }
}

/// In-memory post store indexed by id and conversation id.
/// The first record seen for an id wins; later copies are counted and dropped.
#[derive(Debug, Default)]
pub struct PostIndex {
    records: Vec<RawPostRecord>,
    by_id: AHashMap<String, usize>,
    by_conversation: AHashMap<String, Vec<usize>>,
    duplicates: u64,
    unparsable: u64,
}

impl PostIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records<I>(records: I) -> Self
    where
        I: IntoIterator<Item = RawPostRecord>,
    {
        let mut idx = Self::new();
        for r in records {
            idx.insert(r);
        }
        idx
    }

    /// Add one record. Records without an id are kept (queries can still return them,
    /// normalization rejects them later) but are not addressable by id.
    pub fn insert(&mut self, rec: RawPostRecord) {
        if let Some(id) = rec.id.as_deref() {
            if self.by_id.contains_key(id) {
                self.duplicates += 1;
                return;
            }
        }
        let pos = self.records.len();
        if let Some(id) = rec.id.clone() {
            self.by_id.insert(id, pos);
        }
        if let Some(conv) = rec.conversation_id.clone() {
            self.by_conversation.entry(conv).or_default().push(pos);
        }
        self.records.push(rec);
    }

    pub(crate) fn note_unparsable(&mut self, n: u64) {
        self.unparsable += n;
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Repeated ids dropped on insert.
    pub fn duplicates(&self) -> u64 {
        self.duplicates
    }

    /// Dump lines that were not valid post JSON.
    pub fn unparsable(&self) -> u64 {
        self.unparsable
    }
}

impl PostSource for PostIndex {
    fn fetch_by_conversation(&self, conversation_id: &str) -> Result<Vec<RawPostRecord>> {
        Ok(self
            .by_id
            .get(conversation_id)
            .map(|&i| vec![self.records[i].clone()])
            .unwrap_or_default())
    }

    fn fetch_by_query(&self, query: &PostQuery) -> Result<Vec<RawPostRecord>> {
        let hits = match query.conversation_id.as_deref() {
            Some(conv) => self
                .by_conversation
                .get(conv)
                .map(|ids| {
                    ids.iter()
                        .map(|&i| &self.records[i])
                        .filter(|r| matches_query(r, query))
                        .cloned()
                        .collect()
                })
                .unwrap_or_default(),
            None => self.records.iter().filter(|r| matches_query(r, query)).cloned().collect(),
        };
        Ok(hits)
    }
}
