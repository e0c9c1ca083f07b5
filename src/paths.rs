//! Dump discovery: monthly post dumps named `posts_YYYY-MM.zst` or `posts_YYYY-MM.jsonl`.

use regex::Regex;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use time::Date;
use walkdir::WalkDir;

/// Calendar month of a dump file, ordered chronologically.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct YearMonth {
    pub year: u16,
    pub month: u8, // 1..=12
}

impl YearMonth {
    pub fn new(year: u16, month: u8) -> Self {
        assert!((1..=12).contains(&month), "Month must be 1..=12");
        Self { year, month }
    }

    fn succ(self) -> Option<Self> {
        match self.month {
            12 if self.year == u16::MAX => None,
            12 => Some(Self { year: self.year + 1, month: 1 }),
            m => Some(Self { year: self.year, month: m + 1 }),
        }
    }
}

impl From<Date> for YearMonth {
    fn from(d: Date) -> Self {
        let year = d.year().clamp(0, u16::MAX as i32) as u16;
        Self { year, month: d.month() as u8 }
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

/// Encoding of a dump file on disk.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DumpFormat {
    Zst,   // posts_YYYY-MM.zst (zstd-compressed JSONL)
    Jsonl, // posts_YYYY-MM.jsonl
}

#[derive(Clone, Debug)]
pub struct DumpFile {
    pub format: DumpFormat,
    pub ym: YearMonth,
    pub path: PathBuf,
}

fn dump_name_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^posts_(\d{4})-(\d{2})\.(zst|jsonl)$").expect("dump name pattern"))
}

fn parse_dump_name(name: &str) -> Option<(YearMonth, DumpFormat)> {
    let caps = dump_name_re().captures(name)?;
    let year: u16 = caps[1].parse().ok()?;
    let month: u8 = caps[2].parse().ok()?;
    if !(1..=12).contains(&month) {
        return None;
    }
    let format = if &caps[3] == "zst" { DumpFormat::Zst } else { DumpFormat::Jsonl };
    Some((YearMonth { year, month }, format))
}

/// Every dump directly under `dir`, grouped by month. A missing directory yields nothing.
pub fn discover_dumps(dir: &Path) -> BTreeMap<YearMonth, Vec<DumpFile>> {
    let mut map: BTreeMap<YearMonth, Vec<DumpFile>> = BTreeMap::new();
    if !dir.exists() {
        return map;
    }
    for ent in WalkDir::new(dir).min_depth(1).max_depth(1).into_iter().flatten() {
        let Some(name) = ent.file_name().to_str() else { continue };
        if let Some((ym, format)) = parse_dump_name(name) {
            map.entry(ym).or_default().push(DumpFile { format, ym, path: ent.path().to_path_buf() });
        }
    }
    for files in map.values_mut() {
        files.sort_by(|a, b| a.path.cmp(&b.path));
    }
    map
}

/// Select the dumps whose month overlaps `[since, until)`. Open bounds extend to the
/// earliest/latest discovered month; months with no file are skipped.
pub fn plan_dumps(
    discovered: &BTreeMap<YearMonth, Vec<DumpFile>>,
    since: Option<Date>,
    until: Option<Date>,
) -> Vec<DumpFile> {
    let (Some(first), Some(last)) = (discovered.keys().next(), discovered.keys().next_back()) else {
        return Vec::new();
    };
    let lo = since.map(YearMonth::from).unwrap_or(*first);
    let hi = match until {
        Some(u) => match u.previous_day() {
            Some(d) => YearMonth::from(d),
            None => return Vec::new(),
        },
        None => *last,
    };

    let mut jobs = Vec::new();
    let mut curr = if lo <= hi { Some(lo) } else { None };
    while let Some(ym) = curr {
        if let Some(files) = discovered.get(&ym) {
            jobs.extend(files.iter().cloned());
        }
        curr = ym.succ().filter(|n| *n <= hi);
    }
    jobs
}
