use crate::merge::bucket::BucketMerger;
use crate::puller::PullEvent;
use crate::sink::{Sink, SinkError};
use crate::source::LogEntry;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum MergerError {
    #[error("sink error: {0}")]
    Sink(#[from] SinkError),

    #[error("event channel closed before done")]
    EventChannelClosed,
}

/// Counters reported by a completed merge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeStats {
    pub entries_emitted: u64,
    pub buckets_flushed: u64,
}

/// Consumes the puller's event stream and drives the sink.
///
/// `Data` and `Drained` feed the bucket merger and emit whatever became safe;
/// `Done` flushes the remainder and completes the sink exactly once. A
/// channel that closes before `Done` means the puller failed, in which case
/// the sink is left incomplete and the error surfaces to the pipeline.
pub async fn run_merger<K>(
    mut events: mpsc::Receiver<PullEvent>,
    sink: &mut K,
    source_count: usize,
    granularity: Duration,
    cancel: CancellationToken,
) -> Result<MergeStats, MergerError>
where
    K: Sink,
{
    let mut merger = BucketMerger::new(source_count, granularity);
    let mut stats = MergeStats::default();

    loop {
        let event = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                info!(
                    emitted = stats.entries_emitted,
                    buffered = merger.buffered_count(),
                    "merger cancelled"
                );
                return Ok(stats);
            }
            event = events.recv() => event,
        };
        let Some(event) = event else {
            // A channel torn down by cancellation is not a puller failure.
            if cancel.is_cancelled() {
                return Ok(stats);
            }
            return Err(MergerError::EventChannelClosed);
        };

        match event {
            PullEvent::Data { source, entry } => {
                let ready = merger.observe(source, entry);
                emit_all(sink, ready, &mut stats).await?;
            }
            PullEvent::Drained { source } => {
                debug!(source, buffered = merger.buffered_count(), "source drained");
                let ready = merger.mark_drained(source);
                emit_all(sink, ready, &mut stats).await?;
            }
            PullEvent::Done => {
                let remaining = merger.finish();
                emit_all(sink, remaining, &mut stats).await?;
                sink.complete().await?;

                stats.buckets_flushed = merger.flushed_buckets();
                info!(
                    entries = stats.entries_emitted,
                    buckets = stats.buckets_flushed,
                    "merge complete"
                );
                return Ok(stats);
            }
        }
    }
}

async fn emit_all<K>(
    sink: &mut K,
    entries: Vec<LogEntry>,
    stats: &mut MergeStats,
) -> Result<(), MergerError>
where
    K: Sink,
{
    for entry in entries {
        sink.emit(entry).await?;
        stats.entries_emitted += 1;
    }
    Ok(())
}
