use crate::tree::ExpandPolicy;
use std::path::{Path, PathBuf};
use time::Date;

/// Which tree nodes become export rows.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ExportScope {
    /// Every node linked during reconstruction (root excluded), in discovery order.
    #[default]
    AllLinked,
    /// Only linked nodes without linked replies.
    TerminalOnly,
}

/// User-facing options with sensible defaults and builder chaining.
#[derive(Clone, Debug)]
pub struct ExportOptions {
    pub base_dir: PathBuf,             // directory holding posts_YYYY-MM.{zst,jsonl}
    pub corpus_since: Option<Date>,    // inclusive; None = earliest dump
    pub corpus_until: Option<Date>,    // exclusive; None = latest dump
    pub min_likes: u64,                // seed posts below this are ignored
    pub allowed_sources: Option<Vec<String>>, // None = any posting client
    pub expand_policy: ExpandPolicy,
    pub scope: ExportScope,
    pub parallelism: Option<usize>,    // Some(N) to set rayon threads, None to use default
    pub file_concurrency: usize,       // limit number of dumps decoded concurrently
    pub progress: bool,                // show progress bar
    pub progress_label: Option<String>, // optional label for progress bar

    // IO tuning
    pub read_buffer_bytes: usize,      // BufReader capacity
    pub write_buffer_bytes: usize,     // BufWriter capacity
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from("./data"),
            corpus_since: None,
            corpus_until: None,
            min_likes: 200,
            allowed_sources: Some(crate::util::default_allowed_sources()),
            expand_policy: ExpandPolicy::TrustReplyCount,
            scope: ExportScope::AllLinked,
            parallelism: None,
            file_concurrency: 1,
            progress: true,
            progress_label: None,

            read_buffer_bytes: 256 * 1024,
            write_buffer_bytes: 256 * 1024,
        }
    }
}

impl ExportOptions {
    pub fn with_base_dir(mut self, base_dir: impl AsRef<Path>) -> Self {
        self.base_dir = base_dir.as_ref().to_path_buf();
        self
    }
    pub fn with_corpus_window(mut self, since: Option<Date>, until: Option<Date>) -> Self {
        self.corpus_since = since;
        self.corpus_until = until;
        self
    }
    pub fn with_min_likes(mut self, n: u64) -> Self {
        self.min_likes = n;
        self
    }
    /// Replace the allowed posting clients. Labels are trimmed; empty ones dropped.
    pub fn with_allowed_sources<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut v: Vec<String> = labels
            .into_iter()
            .map(|s| s.as_ref().trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        v.sort();
        v.dedup();
        self.allowed_sources = Some(v);
        self
    }
    pub fn with_any_source(mut self) -> Self {
        self.allowed_sources = None;
        self
    }
    pub fn with_expand_policy(mut self, policy: ExpandPolicy) -> Self {
        self.expand_policy = policy;
        self
    }
    pub fn with_scope(mut self, scope: ExportScope) -> Self {
        self.scope = scope;
        self
    }
    pub fn with_parallelism(mut self, threads: usize) -> Self {
        self.parallelism = Some(threads);
        self
    }
    pub fn with_file_concurrency(mut self, n: usize) -> Self {
        self.file_concurrency = n.max(1);
        self
    }
    pub fn with_progress(mut self, yes: bool) -> Self {
        self.progress = yes;
        self
    }
    pub fn with_progress_label(mut self, label: impl Into<String>) -> Self {
        self.progress_label = Some(label.into());
        self
    }

    // IO buffers tuning
    pub fn with_io_buffers(mut self, read_bytes: usize, write_bytes: usize) -> Self {
        self.read_buffer_bytes = read_bytes.max(8 * 1024);
        self.write_buffer_bytes = write_bytes.max(8 * 1024);
        self
    }
}
