use crate::config::{ExportOptions, ExportScope};
use crate::export::{ExportFormat, ExportRow, RowWriter};
use crate::filters::source_allowed;
use crate::node::PostNode;
use crate::progress::make_count_progress;
use crate::query::PostQuery;
use crate::record::RawPostRecord;
use crate::registry::ConversationRegistry;
use crate::source::PostSource;
use crate::tree::{ConversationTree, ExpandPolicy, ReconstructionStats};
use crate::util::{default_allowed_sources, init_tracing_once, merge_extra_sources};
use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use time::Date;

/// Entry point: configure with chained builders, then `export` or `reconstruct`.
///
/// Every clone shares the same `ConversationRegistry`, so a conversation exported by one
/// run is skipped by every later run in the process. Use `.registry(..)` to share one
/// registry across independently built instances.
#[derive(Clone)]
pub struct ConversationETL {
    pub(crate) opts: ExportOptions,
    registry: Arc<ConversationRegistry>,
}

/// Outcome of reconstructing one conversation.
#[derive(Debug)]
pub enum Reconstruction {
    Built {
        tree: ConversationTree,
        stats: ReconstructionStats,
        /// Candidates rejected by normalization.
        malformed: u64,
        /// Candidates posted from a client outside the allowed set.
        filtered: u64,
    },
    /// Another caller claimed this conversation first.
    AlreadyClaimed,
    /// The source returned no usable root record.
    RootUnavailable,
}

/// Counters for one `export` run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExportSummary {
    pub seeds: u64,
    /// Trees built and exported.
    pub conversations: u64,
    /// Root posts without replies, exported as a single row.
    pub single_posts: u64,
    pub rows: u64,
    pub orphaned: u64,
    pub skipped_malformed: u64,
    pub skipped_low_likes: u64,
    pub skipped_source: u64,
    pub skipped_claimed: u64,
    pub skipped_root_unavailable: u64,
    pub skipped_fetch_failed: u64,
    /// Nodes whose ancestor chain failed validation.
    pub skipped_invalid_chain: u64,
}

impl Default for ConversationETL {
    fn default() -> Self {
        Self::new()
    }
}

impl ConversationETL {
    pub fn new() -> Self {
        Self { opts: ExportOptions::default(), registry: Arc::new(ConversationRegistry::new()) }
    }

    // -------- Builder methods --------
    pub fn base_dir(mut self, base: impl AsRef<Path>) -> Self { self.opts = self.opts.with_base_dir(base); self }
    pub fn corpus_window(mut self, since: Option<Date>, until: Option<Date>) -> Self { self.opts = self.opts.with_corpus_window(since, until); self }
    pub fn min_likes(mut self, n: u64) -> Self { self.opts = self.opts.with_min_likes(n); self }
    pub fn allowed_sources<I, S>(mut self, labels: I) -> Self where I: IntoIterator<Item = S>, S: AsRef<str> { self.opts = self.opts.with_allowed_sources(labels); self }
    pub fn any_source(mut self) -> Self { self.opts = self.opts.with_any_source(); self }
    /// Default first-party clients plus any `CONVO_ALLOWED_SOURCES(_FILE)` additions.
    pub fn standard_sources(mut self) -> Self {
        let mut v = default_allowed_sources();
        merge_extra_sources(&mut v);
        self.opts = self.opts.with_allowed_sources(v);
        self
    }
    pub fn expand_policy(mut self, policy: ExpandPolicy) -> Self { self.opts = self.opts.with_expand_policy(policy); self }
    pub fn scope(mut self, scope: ExportScope) -> Self { self.opts = self.opts.with_scope(scope); self }
    pub fn parallelism(mut self, threads: usize) -> Self { self.opts = self.opts.with_parallelism(threads); self }
    pub fn file_concurrency(mut self, n: usize) -> Self { self.opts = self.opts.with_file_concurrency(n); self }
    pub fn progress(mut self, yes: bool) -> Self { self.opts = self.opts.with_progress(yes); self }
    pub fn progress_label(mut self, label: impl Into<String>) -> Self { self.opts = self.opts.with_progress_label(label); self }
    pub fn io_buffers(mut self, read_bytes: usize, write_bytes: usize) -> Self { self.opts = self.opts.with_io_buffers(read_bytes, write_bytes); self }
    pub fn registry(mut self, registry: Arc<ConversationRegistry>) -> Self { self.registry = registry; self }

    pub fn options(&self) -> &ExportOptions {
        &self.opts
    }

    pub fn shared_registry(&self) -> Arc<ConversationRegistry> {
        self.registry.clone()
    }

    pub(crate) fn apply_parallelism(&self) {
        if let Some(n) = self.opts.parallelism {
            if n > 0 {
                rayon::ThreadPoolBuilder::new().num_threads(n).build_global().ok();
            }
        }
    }

    // -------- Operations --------

    /// Run `seed_query` against `source` and export every unclaimed conversation it touches.
    ///
    /// Per seed post:
    ///  - malformed, under `min_likes`, from a disallowed client, or already claimed → skip
    ///  - root post reporting no replies → one row whose conversation is its own message
    ///  - otherwise resolve the root, claim the conversation, fetch candidates with the
    ///    seed query narrowed to the conversation, rebuild the tree, write one row per
    ///    node in `scope`
    ///
    /// Fetch failures for a single conversation are logged and skipped; a failing seed
    /// query aborts the run. Rows are promoted to `out_path` only when the run succeeds.
    /// When the run fails after claiming, its claims are released and the staging file
    /// is removed, so a later run can export those conversations.
    pub fn export<S>(&self, source: &S, seed_query: &PostQuery, out_path: &Path, format: ExportFormat) -> Result<ExportSummary>
    where
        S: PostSource + ?Sized,
    {
        init_tracing_once();

        let seeds = source
            .fetch_by_query(seed_query)
            .with_context(|| format!("seed query `{seed_query}`"))?;
        tracing::info!(query = %seed_query, seeds = seeds.len(), "seed posts fetched");

        let mut claimed = Vec::new();
        match self.export_seeds(source, seed_query, seeds, out_path, format, &mut claimed) {
            Ok(summary) => Ok(summary),
            Err(e) => {
                for conversation_id in &claimed {
                    self.registry.release(conversation_id);
                }
                tracing::warn!(released = claimed.len(), out = %out_path.display(), "export failed, claims released");
                Err(e)
            }
        }
    }

    fn export_seeds<S>(
        &self,
        source: &S,
        seed_query: &PostQuery,
        seeds: Vec<RawPostRecord>,
        out_path: &Path,
        format: ExportFormat,
        claimed: &mut Vec<String>,
    ) -> Result<ExportSummary>
    where
        S: PostSource + ?Sized,
    {
        // dropped unfinished on error, which removes the staging file
        let mut writer = RowWriter::create(out_path, format, self.opts.write_buffer_bytes)?;
        let mut summary = ExportSummary { seeds: seeds.len() as u64, ..Default::default() };

        let label = self.opts.progress_label.as_deref().unwrap_or("Conversations");
        let pb = if self.opts.progress { Some(make_count_progress(seeds.len() as u64, label)) } else { None };

        for raw in seeds {
            self.export_seed(source, seed_query, raw, &mut writer, &mut summary, claimed)?;
            if let Some(pb) = &pb { pb.inc(1); }
        }

        summary.rows = writer.finish()?;
        if let Some(pb) = pb { pb.finish_with_message(format!("{label} done")); }

        tracing::info!(
            conversations = summary.conversations,
            single_posts = summary.single_posts,
            rows = summary.rows,
            out = %out_path.display(),
            "export finished"
        );
        Ok(summary)
    }

    fn export_seed<S>(
        &self,
        source: &S,
        seed_query: &PostQuery,
        raw: RawPostRecord,
        writer: &mut RowWriter,
        summary: &mut ExportSummary,
        claimed: &mut Vec<String>,
    ) -> Result<()>
    where
        S: PostSource + ?Sized,
    {
        let started = Instant::now();
        let seed = match PostNode::from_raw(raw) {
            Ok(n) => n,
            Err(e) => {
                tracing::warn!(error = %e, "skipping seed");
                summary.skipped_malformed += 1;
                return Ok(());
            }
        };

        if seed.like_count < self.opts.min_likes {
            summary.skipped_low_likes += 1;
            return Ok(());
        }
        if !source_allowed(&seed.source_label, self.opts.allowed_sources.as_ref()) {
            summary.skipped_source += 1;
            return Ok(());
        }
        let conversation_id = seed.conversation_id.clone();
        if self.registry.is_claimed(&conversation_id) {
            summary.skipped_claimed += 1;
            return Ok(());
        }

        let single_post = seed.is_root() && seed.reply_count == 0;
        let root = if seed.is_root() {
            seed
        } else {
            match self.resolve_root(source, &conversation_id) {
                Ok(Some(root)) => root,
                Ok(None) => {
                    tracing::debug!(conversation = %conversation_id, "root unavailable, skipping");
                    summary.skipped_root_unavailable += 1;
                    return Ok(());
                }
                Err(e) => {
                    tracing::warn!(conversation = %conversation_id, error = %format!("{e:#}"), "skipping conversation");
                    summary.skipped_fetch_failed += 1;
                    return Ok(());
                }
            }
        };

        if !self.registry.claim(&conversation_id) {
            summary.skipped_claimed += 1;
            return Ok(());
        }
        claimed.push(conversation_id.clone());

        if single_post {
            writer.write_row(&ExportRow::from_node(&root, vec![root.message.clone()]))?;
            summary.single_posts += 1;
            tracing::info!(post = %root.id, "single post exported in {:.2}s", started.elapsed().as_secs_f64());
            return Ok(());
        }

        let (tree, stats) = match self.build_claimed(source, root, seed_query) {
            Ok(Reconstruction::Built { tree, stats, malformed, .. }) => {
                summary.skipped_malformed += malformed;
                (tree, stats)
            }
            Ok(_) => return Ok(()),
            Err(e) => {
                tracing::warn!(conversation = %conversation_id, error = %format!("{e:#}"), "skipping conversation");
                summary.skipped_fetch_failed += 1;
                return Ok(());
            }
        };

        let ids = match self.opts.scope {
            ExportScope::AllLinked => tree.linked_ids().to_vec(),
            ExportScope::TerminalOnly => tree.terminal_ids(),
        };
        for id in ids {
            match tree.conversation(id) {
                Ok(conversation) => writer.write_row(&ExportRow::from_node(&tree[id], conversation))?,
                Err(e) => {
                    tracing::error!(conversation = %conversation_id, post = %tree[id].id, error = %e, "skipping node");
                    summary.skipped_invalid_chain += 1;
                }
            }
        }

        summary.conversations += 1;
        summary.orphaned += stats.orphaned as u64;
        tracing::info!(
            conversation = %conversation_id,
            linked = stats.linked,
            orphaned = stats.orphaned,
            "conversation exported in {:.2}s",
            started.elapsed().as_secs_f64()
        );
        Ok(())
    }

    /// Rebuild one conversation: fetch its root, claim it, then link the candidates
    /// returned by `candidate_query` narrowed to this conversation.
    ///
    /// Claiming happens only once a usable root is in hand; a conversation whose root is
    /// missing stays unclaimed. Source errors propagate.
    pub fn reconstruct<S>(&self, source: &S, conversation_id: &str, candidate_query: &PostQuery) -> Result<Reconstruction>
    where
        S: PostSource + ?Sized,
    {
        if self.registry.is_claimed(conversation_id) {
            return Ok(Reconstruction::AlreadyClaimed);
        }
        let Some(root) = self.resolve_root(source, conversation_id)? else {
            return Ok(Reconstruction::RootUnavailable);
        };
        if !self.registry.claim(conversation_id) {
            return Ok(Reconstruction::AlreadyClaimed);
        }
        self.build_claimed(source, root, candidate_query)
    }

    /// The usable root record of `conversation_id`: it must normalize and carry that id.
    fn resolve_root<S>(&self, source: &S, conversation_id: &str) -> Result<Option<PostNode>>
    where
        S: PostSource + ?Sized,
    {
        let records = source
            .fetch_by_conversation(conversation_id)
            .with_context(|| format!("fetch root of conversation {conversation_id}"))?;
        let Some(raw_root) = records.into_iter().next() else {
            return Ok(None);
        };
        match PostNode::from_raw(raw_root) {
            Ok(n) if n.id == conversation_id && n.conversation_id == conversation_id => Ok(Some(n)),
            Ok(n) => {
                tracing::warn!(conversation = %conversation_id, post = %n.id, "source returned a non-root record");
                Ok(None)
            }
            Err(e) => {
                tracing::warn!(conversation = %conversation_id, error = %e, "root record unusable");
                Ok(None)
            }
        }
    }

    /// Fetch and link candidates under `root`, whose conversation the caller has claimed.
    fn build_claimed<S>(&self, source: &S, root: PostNode, candidate_query: &PostQuery) -> Result<Reconstruction>
    where
        S: PostSource + ?Sized,
    {
        let conversation_id = root.conversation_id.clone();
        let candidates = source
            .fetch_by_query(&candidate_query.narrowed_to(&conversation_id))
            .with_context(|| format!("fetch replies of conversation {conversation_id}"))?;

        let allowed = self.opts.allowed_sources.as_ref();
        let mut pool = Vec::with_capacity(candidates.len());
        let (mut malformed, mut filtered) = (0u64, 0u64);
        for raw in candidates {
            if !source_allowed(raw.source_label.as_deref().unwrap_or_default(), allowed) {
                filtered += 1;
                continue;
            }
            match PostNode::from_raw(raw) {
                Ok(n) => pool.push(n),
                Err(e) => {
                    tracing::warn!(conversation = %conversation_id, error = %e, "skipping candidate");
                    malformed += 1;
                }
            }
        }

        let mut tree = ConversationTree::new(root);
        let stats = tree.populate(pool, self.opts.expand_policy)?;
        Ok(Reconstruction::Built { tree, stats, malformed, filtered })
    }
}
