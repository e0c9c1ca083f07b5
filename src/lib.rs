mod config;
mod paths;
mod zstd_jsonl;
mod concurrency;
mod progress;
mod util;

mod error;
mod record;
mod node;
mod tree;
mod registry;

mod query;
mod filters;
mod source;
mod export;
mod corpus;
mod pipeline;

pub use crate::config::{ExportOptions, ExportScope};
pub use crate::paths::{discover_dumps, plan_dumps, DumpFile, DumpFormat, YearMonth};
pub use crate::pipeline::{ConversationETL, ExportSummary, Reconstruction};

pub use crate::error::ConvoError;
pub use crate::record::{RawPostRecord, RawUser, RawUserLabel};
pub use crate::node::PostNode;
pub use crate::tree::{ConversationTree, ExpandPolicy, NodeId, ReconstructionStats, StepStats};
pub use crate::registry::ConversationRegistry;

pub use crate::query::{parse_day, PostQuery};
pub use crate::filters::{matches_query, source_allowed, within_days};
pub use crate::source::{PostIndex, PostSource};
pub use crate::export::{ExportFormat, ExportRow, RowWriter, EXPORT_COLUMNS};

// Expose multiprogress and progress helpers.
pub use crate::progress::{set_global_multiprogress, make_count_progress, make_progress_bar_labeled};

//export robust file ops from util so binaries can import from crate root.
pub use crate::util::{default_allowed_sources, open_with_backoff, create_with_backoff, remove_with_backoff, replace_file_atomic_backoff};
