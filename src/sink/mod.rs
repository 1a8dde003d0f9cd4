use crate::config::types::OutputFormat;
use crate::source::LogEntry;
use async_trait::async_trait;
use thiserror::Error;
use tokio::io::{AsyncWriteExt, Stdout};
use tokio::sync::mpsc;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("output channel closed")]
    ChannelSend,
}

/// Receives merged entries in final chronological order.
///
/// `emit` is called once per entry; `complete` exactly once, after the last
/// `emit`, when the whole merge is finished.
#[async_trait]
pub trait Sink: Send {
    async fn emit(&mut self, entry: LogEntry) -> Result<(), SinkError>;
    async fn complete(&mut self) -> Result<(), SinkError>;
}

/// Writes merged entries to stdout, as plain text or JSON lines.
pub struct ConsoleSink {
    format: OutputFormat,
    prefix_source: bool,
    stdout: Stdout,
}

impl ConsoleSink {
    pub fn new(format: OutputFormat, prefix_source: bool) -> Self {
        Self {
            format,
            prefix_source,
            stdout: tokio::io::stdout(),
        }
    }

    fn render(&self, entry: &LogEntry) -> Result<String, SinkError> {
        let line = match self.format {
            OutputFormat::Text => {
                if self.prefix_source {
                    format!("[{}] {}\n", entry.source_id, entry.raw_text)
                } else {
                    format!("{}\n", entry.raw_text)
                }
            }
            OutputFormat::Json => format!("{}\n", serde_json::to_string(entry)?),
        };
        Ok(line)
    }
}

#[async_trait]
impl Sink for ConsoleSink {
    async fn emit(&mut self, entry: LogEntry) -> Result<(), SinkError> {
        let line = self.render(&entry)?;
        self.stdout.write_all(line.as_bytes()).await?;
        Ok(())
    }

    async fn complete(&mut self) -> Result<(), SinkError> {
        self.stdout.flush().await?;
        Ok(())
    }
}

/// Forwards merged entries into an mpsc channel and closes it on complete.
pub struct ChannelSink {
    tx: Option<mpsc::Sender<LogEntry>>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::Sender<LogEntry>) -> Self {
        Self { tx: Some(tx) }
    }
}

#[async_trait]
impl Sink for ChannelSink {
    async fn emit(&mut self, entry: LogEntry) -> Result<(), SinkError> {
        let tx = self.tx.as_ref().ok_or(SinkError::ChannelSend)?;
        tx.send(entry).await.map_err(|_| SinkError::ChannelSend)
    }

    async fn complete(&mut self) -> Result<(), SinkError> {
        self.tx.take();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn entry(text: &str) -> LogEntry {
        LogEntry {
            timestamp: Utc.with_ymd_and_hms(2025, 12, 4, 10, 0, 0).unwrap(),
            source_id: "app".to_string(),
            raw_text: text.to_string(),
        }
    }

    #[test]
    fn test_render_text() {
        let sink = ConsoleSink::new(OutputFormat::Text, false);
        let line = sink.render(&entry("hello world")).unwrap();
        assert_eq!(line, "hello world\n");
    }

    #[test]
    fn test_render_text_with_source_prefix() {
        let sink = ConsoleSink::new(OutputFormat::Text, true);
        let line = sink.render(&entry("hello world")).unwrap();
        assert_eq!(line, "[app] hello world\n");
    }

    #[test]
    fn test_render_json() {
        let sink = ConsoleSink::new(OutputFormat::Json, false);
        let line = sink.render(&entry("hello")).unwrap();

        let value: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(value["source_id"], "app");
        assert_eq!(value["raw_text"], "hello");
    }

    #[tokio::test]
    async fn test_channel_sink_forwards_and_closes() {
        let (tx, mut rx) = mpsc::channel(10);
        let mut sink = ChannelSink::new(tx);

        sink.emit(entry("one")).await.unwrap();
        sink.complete().await.unwrap();

        assert_eq!(rx.recv().await.unwrap().raw_text, "one");
        // Channel closed after complete.
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_channel_sink_emit_after_complete_fails() {
        let (tx, _rx) = mpsc::channel(10);
        let mut sink = ChannelSink::new(tx);

        sink.complete().await.unwrap();
        let result = sink.emit(entry("late")).await;
        assert!(matches!(result, Err(SinkError::ChannelSend)));
    }
}
