use anyhow::{Context, Result};

static INIT_ONCE: std::sync::Once = std::sync::Once::new();
pub fn init_tracing_once() {
    INIT_ONCE.call_once(|| {
        let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
        let _ = tracing_subscriber::fmt().with_env_filter(env_filter).try_init();
    });
}

// -------- posting clients accepted by default + merging from env/file --------

/// Posting clients whose posts are kept: the first-party web and mobile apps.
/// Third-party schedulers and bots post through other labels.
pub fn default_allowed_sources() -> Vec<String> {
    let defaults = ["Twitter Web App", "Twitter for iPhone", "Twitter for Android"];
    let mut v: Vec<String> = defaults.iter().map(|s| s.to_string()).collect();
    v.sort();
    v
}

/// Merge extra posting clients from env/file into `target` (in-place).
/// - CONVO_ALLOWED_SOURCES: comma/semicolon separated labels (labels contain spaces)
/// - CONVO_ALLOWED_SOURCES_FILE: path to newline-separated file of labels
/// Labels are trimmed, then the list is sort+dedup.
pub fn merge_extra_sources(target: &mut Vec<String>) {
    use std::io::{BufRead, BufReader};

    if let Ok(s) = std::env::var("CONVO_ALLOWED_SOURCES") {
        for raw in s.split(|c: char| c == ',' || c == ';') {
            let n = raw.trim();
            if !n.is_empty() {
                target.push(n.to_string());
            }
        }
    }

    if let Ok(path) = std::env::var("CONVO_ALLOWED_SOURCES_FILE") {
        if !path.trim().is_empty() {
            if let Ok(f) = File::open(&path) {
                for line in BufReader::new(f).lines().map_while(|l| l.ok()) {
                    let n = line.trim();
                    if !n.is_empty() {
                        target.push(n.to_string());
                    }
                }
            } else {
                tracing::warn!("CONVO_ALLOWED_SOURCES_FILE is set but cannot be opened: {}", path);
            }
        }
    }

    for s in target.iter_mut() {
        *s = s.trim().to_string();
    }
    target.sort();
    target.dedup();
}

// -------- robust file ops with backoff (Windows-friendly) --------

use std::fs::{self, File};
use std::io;
use std::path::Path;
use std::thread::sleep;
use std::time::Duration;

/// Transient errors seen on Windows when AV/backup filter drivers, USB/NAS volumes,
/// or sharing violations get in the way:
/// 5 access denied, 21 device not ready, 32 sharing violation, 33 lock violation,
/// 225 AV/PUA block, 433 device missing, 1006 volume altered, 1117 I/O device error,
/// 1224 user-mapped section open.
/// Elsewhere the same numbers mean unrelated, permanent errors (21 is EISDIR on Linux).
fn is_retriable_io_error(e: &io::Error) -> bool {
    cfg!(windows) && matches!(e.raw_os_error(), Some(5 | 21 | 32 | 33 | 225 | 433 | 1006 | 1117 | 1224))
}

/// Run `op` up to `tries` times, sleeping `delay_ms * attempt` between retriable failures.
fn retry_io<T>(tries: usize, delay_ms: u64, what: &str, mut op: impl FnMut() -> io::Result<T>) -> io::Result<T> {
    let mut last_err: Option<io::Error> = None;
    for i in 0..tries.max(1) {
        match op() {
            Ok(v) => return Ok(v),
            Err(e) if is_retriable_io_error(&e) => {
                last_err = Some(e);
                sleep(Duration::from_millis(delay_ms.saturating_mul((i + 1) as u64)));
            }
            Err(e) => return Err(e),
        }
    }
    Err(last_err.unwrap_or_else(|| io::Error::new(io::ErrorKind::Other, format!("{what} failed"))))
}

pub fn open_with_backoff(path: &Path, tries: usize, delay_ms: u64) -> io::Result<File> {
    retry_io(tries, delay_ms, "open", || File::open(path))
}

pub fn create_with_backoff(path: &Path, tries: usize, delay_ms: u64) -> io::Result<File> {
    retry_io(tries, delay_ms, "create", || File::create(path))
}

/// Succeeds if the file doesn't exist.
pub fn remove_with_backoff(path: &Path, tries: usize, delay_ms: u64) -> Result<()> {
    retry_io(tries, delay_ms, "remove", || match fs::remove_file(path) {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    })
    .with_context(|| format!("remove {}", path.display()))
}

/// Atomically replace `dest` with `tmp` (Windows-friendly).
/// If rename fails (e.g., due to sharing), fall back to copy+remove.
pub fn replace_file_atomic_backoff(tmp: &Path, dest: &Path) -> Result<()> {
    let (tries, delay_ms) = (20usize, 50u64);
    if dest.exists() {
        remove_with_backoff(dest, tries, delay_ms)?;
    }
    if retry_io(tries, delay_ms, "rename", || fs::rename(tmp, dest)).is_ok() {
        return Ok(());
    }
    retry_io(tries, delay_ms, "copy", || fs::copy(tmp, dest))
        .with_context(|| format!("copy {} -> {}", tmp.display(), dest.display()))?;
    remove_with_backoff(tmp, tries, delay_ms)
}
