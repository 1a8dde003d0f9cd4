use crate::config::types::{ParseErrorStrategy, SourceConfig};
use crate::source::timestamp::TimestampExtractor;
use crate::source::{LogEntry, LogSource, SourceError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use tracing::debug;

/// Reads a log file from the beginning to EOF, one entry per timestamped
/// line. Lines that do not match the timestamp pattern and start with
/// whitespace are continuation lines appended to the previous entry.
///
/// The file is read to completion and the source then drains; there is no
/// follow mode, since a followed file never drains and the merger's
/// watermark bookkeeping requires draining to be terminal.
pub struct FileSource {
    source_id: String,
    path: PathBuf,
    extractor: TimestampExtractor,
    on_parse_error: ParseErrorStrategy,

    file: Option<BufReader<File>>,
    pending: Option<PendingEntry>,
    drained: bool,
}

struct PendingEntry {
    text: String,
    timestamp: DateTime<Utc>,
}

impl FileSource {
    pub fn new(
        source_id: String,
        config: &SourceConfig,
        on_parse_error: ParseErrorStrategy,
    ) -> Result<Self, SourceError> {
        let extractor =
            TimestampExtractor::new(&config.timestamp.pattern, &config.timestamp.format)?;

        Ok(Self {
            source_id,
            path: config.path.clone(),
            extractor,
            on_parse_error,
            file: None,
            pending: None,
            drained: false,
        })
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    fn take_pending(&mut self) -> Option<LogEntry> {
        self.pending.take().map(|pending| LogEntry {
            timestamp: pending.timestamp,
            source_id: self.source_id.clone(),
            raw_text: pending.text,
        })
    }
}

#[async_trait]
impl LogSource for FileSource {
    fn id(&self) -> &str {
        &self.source_id
    }

    fn is_drained(&self) -> bool {
        self.drained
    }

    async fn pop_next(&mut self) -> Result<Option<LogEntry>, SourceError> {
        if self.drained {
            return Ok(None);
        }

        if self.file.is_none() {
            self.file = Some(BufReader::new(File::open(&self.path)?));
        }

        loop {
            let mut line = String::new();
            let bytes_read = self.file.as_mut().unwrap().read_line(&mut line)?;

            if bytes_read == 0 {
                self.drained = true;
                debug!(source = %self.source_id, "reached end of file");
                // A still-buffered entry is emitted as the final record.
                return Ok(self.take_pending());
            }

            let line = line.trim_end_matches(['\n', '\r']).to_string();

            match self.extractor.extract(&line) {
                Ok(Some(timestamp)) => {
                    // A new timestamped line completes the previous entry.
                    let finished = self.take_pending();
                    self.pending = Some(PendingEntry {
                        text: line,
                        timestamp,
                    });
                    if finished.is_some() {
                        return Ok(finished);
                    }
                }
                Ok(None) => {
                    let is_continuation = line.starts_with(char::is_whitespace);
                    if is_continuation {
                        if let Some(pending) = self.pending.as_mut() {
                            pending.text.push('\n');
                            pending.text.push_str(&line);
                            continue;
                        }
                    }

                    match self.on_parse_error {
                        ParseErrorStrategy::Drop => continue,
                        ParseErrorStrategy::Fail => {
                            return Err(SourceError::Parse {
                                source_id: self.source_id.clone(),
                                line,
                            });
                        }
                    }
                }
                Err(e) => match self.on_parse_error {
                    ParseErrorStrategy::Drop => continue,
                    ParseErrorStrategy::Fail => return Err(e.into()),
                },
            }
        }
    }
}
