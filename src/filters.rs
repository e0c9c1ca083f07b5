//! Record-level filters used by post sources and the export pipeline.

use crate::query::PostQuery;
use crate::record::RawPostRecord;
use time::{Date, OffsetDateTime};

/// Decide whether a raw record satisfies `q`. Date bounds reject records without a date.
pub fn matches_query(rec: &RawPostRecord, q: &PostQuery) -> bool {
    if let Some(conv) = q.conversation_id.as_deref() {
        if rec.conversation_id.as_deref() != Some(conv) { return false; }
    }

    if let Some(lang) = q.language.as_deref() {
        match rec.lang.as_deref() {
            Some(l) if l.eq_ignore_ascii_case(lang) => {}
            _ => return false,
        }
    }

    if !q.keywords.is_empty() {
        let hay = rec.raw_content.as_deref().unwrap_or_default().to_lowercase();
        if !q.keywords.iter().all(|kw| hay.contains(kw.as_str())) { return false; }
    }

    if q.since.is_some() || q.until.is_some() {
        return within_days(rec.timestamp(), q.since, q.until);
    }

    true
}

/// `[since, until)` on the UTC calendar day of `ts`.
pub fn within_days(ts: Option<OffsetDateTime>, since: Option<Date>, until: Option<Date>) -> bool {
    let Some(ts) = ts else { return false };
    let day = ts.to_offset(time::UtcOffset::UTC).date();
    if let Some(lo) = since {
        if day < lo { return false; }
    }
    if let Some(hi) = until {
        if day >= hi { return false; }
    }
    true
}

/// `None` accepts every client; otherwise an exact, case-sensitive label match.
#[inline]
pub fn source_allowed(label: &str, allowed: Option<&Vec<String>>) -> bool {
    match allowed {
        Some(list) => list.iter().any(|s| s == label),
        None => true,
    }
}
