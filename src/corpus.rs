use crate::concurrency::map_dumps_limited;
use crate::paths::{discover_dumps, plan_dumps};
use crate::pipeline::ConversationETL;
use crate::progress::{make_progress_bar_labeled, total_dump_size};
use crate::record::RawPostRecord;
use crate::source::PostIndex;
use crate::util::init_tracing_once;
use crate::zstd_jsonl::for_each_dump_line;
use anyhow::{Context, Result};

impl ConversationETL {
    /// Load every planned dump under `base_dir` into an in-memory `PostIndex`.
    ///
    /// - `.corpus_window()` restricts which monthly dumps are read; unset bounds take
    ///   the earliest/latest dump on disk.
    /// - Dumps are decoded in parallel, at most `file_concurrency` at a time; records keep
    ///   dump order, so the first copy of a repeated id wins.
    /// - Lines that are not valid post JSON are counted (`PostIndex::unparsable`) and skipped.
    pub fn load_corpus(&self) -> Result<PostIndex> {
        init_tracing_once();
        self.apply_parallelism();

        let discovered = discover_dumps(&self.opts.base_dir);
        let files = plan_dumps(&discovered, self.opts.corpus_since, self.opts.corpus_until);
        if files.is_empty() {
            tracing::warn!(dir = %self.opts.base_dir.display(), "No dump files found matching selection. Check base_dir and corpus window.");
            return Ok(PostIndex::new());
        }
        tracing::info!("Planned {} dump files for loading.", files.len());

        let pb = if self.opts.progress {
            Some(make_progress_bar_labeled(total_dump_size(&files), self.opts.progress_label.as_deref()))
        } else {
            None
        };
        let read_buf = self.opts.read_buffer_bytes;

        let parts = map_dumps_limited(&files, self.opts.file_concurrency, |dump| -> Result<(Vec<RawPostRecord>, u64)> {
            let mut records = Vec::new();
            let mut unparsable = 0u64;
            for_each_dump_line(
                dump,
                read_buf,
                |delta| if let Some(pb) = &pb { pb.inc(delta) },
                |line| {
                    match RawPostRecord::from_json_line(line) {
                        Ok(r) => records.push(r),
                        Err(_) => unparsable += 1,
                    }
                    Ok(())
                },
            )
            .with_context(|| format!("loading {}", dump.path.display()))?;
            Ok((records, unparsable))
        })?;

        let mut index = PostIndex::new();
        for (records, unparsable) in parts {
            index.note_unparsable(unparsable);
            for r in records {
                index.insert(r);
            }
        }

        if let Some(pb) = pb {
            pb.finish_with_message("corpus loaded");
        }
        tracing::info!(
            posts = index.len(),
            duplicates = index.duplicates(),
            unparsable = index.unparsable(),
            "corpus loaded"
        );
        Ok(index)
    }
}
