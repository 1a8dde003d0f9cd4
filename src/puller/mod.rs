use crate::source::{LogEntry, LogSource, SourceError};
use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use futures::stream::{FuturesUnordered, StreamExt};
use futures::FutureExt;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

#[derive(Debug, Error)]
pub enum PullerError {
    #[error("source '{id}' fetch failed: {source}")]
    Fetch {
        id: String,
        #[source]
        source: SourceError,
    },

    #[error("source '{id}' went back in time: {current} after {previous}")]
    OrderingViolation {
        id: String,
        previous: DateTime<Utc>,
        current: DateTime<Utc>,
    },

    #[error("event channel closed")]
    ChannelSend,
}

/// Pull events published by the puller, consumed by the merger.
///
/// `source` is the index of the source in the list handed to [`run_puller`].
/// Per-source delivery order matches that source's production order; no
/// cross-source ordering is implied. `Done` is sent exactly once, after the
/// last `Drained`.
#[derive(Debug)]
pub enum PullEvent {
    Data { source: usize, entry: LogEntry },
    Drained { source: usize },
    Done,
}

struct FetchResult<S> {
    fetch_id: u64,
    source_index: usize,
    outcome: Result<Option<LogEntry>, SourceError>,
    source: S,
}

/// Pulls entries from all sources concurrently, keeping exactly one
/// outstanding fetch per non-drained source, and publishes completions as
/// [`PullEvent`]s in whatever order the fetches finish.
///
/// Each source moves into its in-flight fetch future and is handed back with
/// the result before the next fetch for it is issued, so a duplicate
/// concurrent fetch for one source cannot exist. The fetches are interleaved
/// suspension points on this task, not parallel threads.
///
/// A fetch error is fatal: remaining in-flight fetches are dropped and no
/// `Done` is sent. Cancellation likewise stops the loop without `Done`.
pub async fn run_puller<S>(
    sources: Vec<S>,
    events: mpsc::Sender<PullEvent>,
    cancel: CancellationToken,
) -> Result<(), PullerError>
where
    S: LogSource + 'static,
{
    let source_ids: Vec<String> = sources.iter().map(|s| s.id().to_string()).collect();
    let mut last_seen: Vec<Option<DateTime<Utc>>> = vec![None; sources.len()];

    let mut pending: FuturesUnordered<BoxFuture<'static, FetchResult<S>>> =
        FuturesUnordered::new();
    let mut next_fetch_id: u64 = 0;
    for (source_index, source) in sources.into_iter().enumerate() {
        pending.push(fetch(source_index, source, &mut next_fetch_id));
    }

    loop {
        let completed = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                info!("puller cancelled, dropping in-flight fetches");
                return Ok(());
            }
            completed = pending.next() => completed,
        };
        // The pending set only empties once every source has drained.
        let Some(result) = completed else { break };

        let id = &source_ids[result.source_index];
        match result.outcome {
            Ok(Some(entry)) => {
                if let Some(previous) = last_seen[result.source_index] {
                    if entry.timestamp < previous {
                        return Err(PullerError::OrderingViolation {
                            id: id.clone(),
                            previous,
                            current: entry.timestamp,
                        });
                    }
                }
                last_seen[result.source_index] = Some(entry.timestamp);

                trace!(
                    source = %id,
                    fetch_id = result.fetch_id,
                    timestamp = %entry.timestamp,
                    "fetch completed"
                );
                events
                    .send(PullEvent::Data {
                        source: result.source_index,
                        entry,
                    })
                    .await
                    .map_err(|_| PullerError::ChannelSend)?;

                // Re-issue immediately so the source is never idle.
                pending.push(fetch(result.source_index, result.source, &mut next_fetch_id));
            }
            Ok(None) => {
                debug!(source = %id, fetch_id = result.fetch_id, "source drained");
                events
                    .send(PullEvent::Drained {
                        source: result.source_index,
                    })
                    .await
                    .map_err(|_| PullerError::ChannelSend)?;
            }
            Err(source) => {
                return Err(PullerError::Fetch {
                    id: id.clone(),
                    source,
                });
            }
        }
    }

    events
        .send(PullEvent::Done)
        .await
        .map_err(|_| PullerError::ChannelSend)?;
    Ok(())
}

fn fetch<S>(
    source_index: usize,
    mut source: S,
    next_fetch_id: &mut u64,
) -> BoxFuture<'static, FetchResult<S>>
where
    S: LogSource + 'static,
{
    let fetch_id = *next_fetch_id;
    *next_fetch_id += 1;

    async move {
        let outcome = source.pop_next().await;
        FetchResult {
            fetch_id,
            source_index,
            outcome,
            source,
        }
    }
    .boxed()
}
