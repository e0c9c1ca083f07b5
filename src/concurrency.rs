//! Concurrency helper: limit the number of dump files decoded in parallel.

use crate::paths::DumpFile;
use anyhow::Result;
use rayon::prelude::*;

/// Map `f` over `files` with at most `limit` decoders in flight. Results keep input order.
pub fn map_dumps_limited<T, F>(files: &[DumpFile], limit: usize, f: F) -> Result<Vec<T>>
where
    T: Send,
    F: Sync + Fn(&DumpFile) -> Result<T>,
{
    if limit <= 1 {
        return files.iter().map(&f).collect();
    }
    let mut out = Vec::with_capacity(files.len());
    for chunk in files.chunks(limit) {
        out.extend(chunk.par_iter().map(&f).collect::<Result<Vec<_>>>()?);
    }
    Ok(out)
}
