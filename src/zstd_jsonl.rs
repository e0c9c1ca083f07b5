use crate::paths::{DumpFile, DumpFormat};
use crate::util::open_with_backoff;
use anyhow::Result;
use std::fs;
use std::io::{self, BufRead, BufReader, Read};
use std::path::Path;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};
use zstd::stream::read::Decoder;

// ----------------------------- Helpers for full-error logging ------------------------------------

#[inline]
fn warn_decode_skip(path: &Path, e: &anyhow::Error) {
    let abs = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
    tracing::warn!(
        path = %abs.display(),
        error = %e,
        "skipping dump after read/decode error; records already streamed from it are kept"
    );
}

/// A `Read` wrapper that counts on-disk bytes read.
struct CountingReader<R: Read> {
    inner: R,
    counter: Arc<AtomicU64>,
}
impl<R: Read> Read for CountingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.counter.fetch_add(n as u64, Ordering::Relaxed);
        Ok(n)
    }
}

// ----------------------------- Streaming ----------------------------------

/// Stream one dump line-by-line (`\r?\n` stripped), decoding zstd when needed.
/// `on_progress(delta)` receives on-disk bytes consumed.
///
/// A decode or read failure logs one warning, advances progress to the file's size,
/// and skips the rest of the file instead of aborting the run. Errors returned by
/// `on_line` do abort.
pub fn for_each_dump_line(
    dump: &DumpFile,
    read_buf_bytes: usize,
    mut on_progress: impl FnMut(u64),
    mut on_line: impl FnMut(&str) -> Result<()>,
) -> Result<()> {
    let mut reported = 0u64;
    let mut callback_err: Option<anyhow::Error> = None;

    let res = stream_attempt(dump, read_buf_bytes, &mut reported, &mut on_progress, &mut |line: &str| {
        on_line(line).map_err(|e| {
            callback_err = Some(e);
            anyhow::anyhow!("line callback failed")
        })
    });

    if let Some(e) = callback_err {
        return Err(e);
    }
    if let Err(e) = res {
        warn_decode_skip(&dump.path, &e);
        if let Ok(meta) = fs::metadata(&dump.path) {
            on_progress(meta.len().saturating_sub(reported));
        }
    }
    Ok(())
}

fn stream_attempt(
    dump: &DumpFile,
    read_buf_bytes: usize,
    reported: &mut u64,
    on_progress: &mut impl FnMut(u64),
    on_line: &mut impl FnMut(&str) -> Result<()>,
) -> Result<()> {
    let file = open_with_backoff(&dump.path, 16, 50)?;
    let counter = Arc::new(AtomicU64::new(0));
    let cnt = CountingReader { inner: file, counter: counter.clone() };
    let cap = read_buf_bytes.max(8 * 1024);

    let mut reader: Box<dyn BufRead> = match dump.format {
        DumpFormat::Zst => {
            let mut decoder = Decoder::new(cnt)?;
            // large frames otherwise fail with "Frame requires too much memory"
            decoder.window_log_max(31)?;
            Box::new(BufReader::with_capacity(cap, decoder))
        }
        DumpFormat::Jsonl => Box::new(BufReader::with_capacity(cap, cnt)),
    };

    let mut buf = String::with_capacity(16 * 1024);
    loop {
        buf.clear();
        let n = reader.read_line(&mut buf)?;
        let cur = counter.load(Ordering::Relaxed);
        if cur > *reported {
            on_progress(cur - *reported);
            *reported = cur;
        }
        if n == 0 {
            break;
        }
        if buf.ends_with('\n') {
            let _ = buf.pop();
            if buf.ends_with('\r') { let _ = buf.pop(); }
        }
        if buf.trim().is_empty() {
            continue;
        }
        on_line(&buf)?;
    }
    Ok(())
}
