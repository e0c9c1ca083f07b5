use thiserror::Error;

/// Errors raised by post normalization and tree reconstruction.
/// Pipeline/IO code wraps these in `anyhow` with context.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConvoError {
    /// A mandatory field was absent from a raw record.
    #[error("malformed record (id: {}): missing `{field}`", id.as_deref().unwrap_or("?"))]
    MalformedRecord { field: &'static str, id: Option<String> },

    /// Tree linkage broke an invariant (cycle, double link, dangling index).
    #[error("internal invariant violation: {0}")]
    InternalInvariantViolation(String),
}

impl ConvoError {
    pub(crate) fn missing(field: &'static str, id: Option<&str>) -> Self {
        ConvoError::MalformedRecord { field, id: id.map(str::to_string) }
    }
}
