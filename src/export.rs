//! Flat per-node export: one row per exported post with its full ancestor conversation.
//! Rows go to `<out>.inprogress` and are promoted atomically on `finish()`.

use crate::node::PostNode;
use crate::util::{create_with_backoff, remove_with_backoff, replace_file_atomic_backoff};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use time::format_description::well_known::Rfc3339;

/// Output encoding for exported rows.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExportFormat {
    /// Header + tab-separated rows; `conversation` is a JSON array, flags are `1`/`0`/empty.
    Tsv,
    /// One JSON object per line.
    Jsonl,
}

/// Column order of the TSV header (and JSON field names).
pub const EXPORT_COLUMNS: [&str; 15] = [
    "username",
    "date",
    "id",
    "likeCount",
    "replyCount",
    "retweetCount",
    "sourceLabel",
    "authorStatusCount",
    "authorFollowerCount",
    "isAutomated",
    "isVerified",
    "language",
    "rawText",
    "conversation",
    "conversationId",
];

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportRow {
    pub username: String,
    /// RFC3339, when the post carried a parsable date.
    pub date: Option<String>,
    pub id: String,
    pub like_count: u64,
    pub reply_count: u64,
    pub retweet_count: u64,
    pub source_label: String,
    pub author_status_count: u64,
    pub author_follower_count: u64,
    pub is_automated: Option<bool>,
    pub is_verified: bool,
    pub language: String,
    pub raw_text: String,
    /// Messages from the thread root down to this post, oldest first.
    pub conversation: Vec<String>,
    pub conversation_id: String,
}

impl ExportRow {
    pub fn from_node(node: &PostNode, conversation: Vec<String>) -> Self {
        Self {
            username: node.username.clone(),
            date: node.date.and_then(|d| d.format(&Rfc3339).ok()),
            id: node.id.clone(),
            like_count: node.like_count,
            reply_count: node.reply_count,
            retweet_count: node.retweet_count,
            source_label: node.source_label.clone(),
            author_status_count: node.author_status_count,
            author_follower_count: node.author_follower_count,
            is_automated: node.is_automated,
            is_verified: node.is_verified,
            language: node.language.clone(),
            raw_text: node.raw_text.clone(),
            conversation,
            conversation_id: node.conversation_id.clone(),
        }
    }

    fn tsv_fields(&self) -> Result<[String; 15]> {
        let flag = |b: bool| if b { "1".to_string() } else { "0".to_string() };
        Ok([
            tsv_clean(&self.username),
            self.date.clone().unwrap_or_default(),
            tsv_clean(&self.id),
            self.like_count.to_string(),
            self.reply_count.to_string(),
            self.retweet_count.to_string(),
            tsv_clean(&self.source_label),
            self.author_status_count.to_string(),
            self.author_follower_count.to_string(),
            self.is_automated.map(flag).unwrap_or_default(),
            flag(self.is_verified),
            tsv_clean(&self.language),
            tsv_clean(&self.raw_text),
            tsv_clean(&serde_json::to_string(&self.conversation)?),
            tsv_clean(&self.conversation_id),
        ])
    }
}

/// Tabs and line breaks would split cells/rows.
fn tsv_clean(s: &str) -> String {
    s.replace(['\t', '\n', '\r'], " ")
}

/// Buffered row sink writing to a staging file next to the final output.
/// Dropping a writer that was never promoted removes the staging file.
pub struct RowWriter {
    format: ExportFormat,
    tmp_path: PathBuf,
    final_path: PathBuf,
    w: Option<BufWriter<File>>,
    rows: u64,
    promoted: bool,
}

impl RowWriter {
    pub fn create(out_path: &Path, format: ExportFormat, write_buf: usize) -> Result<Self> {
        if let Some(parent) = out_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
        }
        let file_name = out_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "export".to_string());
        let tmp_path = out_path.with_file_name(format!("{file_name}.inprogress"));
        let f = create_with_backoff(&tmp_path, 16, 50).with_context(|| format!("create {}", tmp_path.display()))?;
        let mut w = BufWriter::with_capacity(write_buf.max(8 * 1024), f);

        if format == ExportFormat::Tsv {
            w.write_all(EXPORT_COLUMNS.join("\t").as_bytes())?;
            w.write_all(b"\n")?;
        }

        Ok(Self { format, tmp_path, final_path: out_path.to_path_buf(), w: Some(w), rows: 0, promoted: false })
    }

    pub fn write_row(&mut self, row: &ExportRow) -> Result<()> {
        let Some(w) = self.w.as_mut() else { return Ok(()) };
        match self.format {
            ExportFormat::Tsv => {
                w.write_all(row.tsv_fields()?.join("\t").as_bytes())?;
            }
            ExportFormat::Jsonl => {
                serde_json::to_writer(&mut *w, row)?;
            }
        }
        w.write_all(b"\n")?;
        self.rows += 1;
        Ok(())
    }

    #[inline]
    pub fn rows(&self) -> u64 {
        self.rows
    }

    /// Flush and promote the staging file to the final path. Returns rows written.
    pub fn finish(mut self) -> Result<u64> {
        if let Some(mut w) = self.w.take() {
            w.flush().with_context(|| format!("flush {}", self.tmp_path.display()))?;
        }
        replace_file_atomic_backoff(&self.tmp_path, &self.final_path)?;
        self.promoted = true;
        Ok(self.rows)
    }
}

impl Drop for RowWriter {
    fn drop(&mut self) {
        if self.promoted {
            return;
        }
        drop(self.w.take());
        if let Err(e) = remove_with_backoff(&self.tmp_path, 4, 25) {
            tracing::warn!(path = %self.tmp_path.display(), error = %format!("{e:#}"), "could not remove staging file");
        }
    }
}
