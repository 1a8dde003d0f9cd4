pub mod reader;
pub mod timestamp;

pub use reader::FileSource;
pub use timestamp::{TimestampError, TimestampExtractor};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("timestamp error: {0}")]
    Timestamp(#[from] TimestampError),

    #[error("unparseable line in source '{source_id}': {line}")]
    Parse { source_id: String, line: String },
}

/// A single timestamped log entry. Immutable once produced.
#[derive(Debug, Clone, Serialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub source_id: String,
    pub raw_text: String,
}

/// An independent, internally time-ordered producer of log entries.
///
/// Contract: successive `Ok(Some(_))` results carry non-decreasing
/// timestamps, and once `pop_next` returns `Ok(None)` the source is drained
/// and must keep returning `Ok(None)`.
#[async_trait]
pub trait LogSource: Send {
    /// Stable identity, used for diagnostics and entry labeling.
    fn id(&self) -> &str;

    /// Fetch the next entry. `Ok(None)` is the drained sentinel.
    async fn pop_next(&mut self) -> Result<Option<LogEntry>, SourceError>;

    /// Whether `pop_next` has returned the drained sentinel.
    fn is_drained(&self) -> bool;
}
