use crate::merge::runner::{run_merger, MergeStats, MergerError};
use crate::puller::{run_puller, PullerError};
use crate::sink::Sink;
use crate::source::LogSource;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("puller error: {0}")]
    Puller(#[from] PullerError),

    #[error("merger error: {0}")]
    Merger(#[from] MergerError),

    #[error("task join error: {0}")]
    Join(#[from] tokio::task::JoinError),
}

pub struct PipelineOptions {
    pub bucket_granularity: Duration,
    pub buffer_limit: usize,
    pub cancel: CancellationToken,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            bucket_granularity: Duration::from_secs(24 * 60 * 60),
            buffer_limit: 1000,
            cancel: CancellationToken::new(),
        }
    }
}

/// Runs the full merge: spawns the puller, consumes its events with the
/// merger on the current task, and joins both.
///
/// Error precedence on a broken run: a real puller failure outranks the
/// merger's secondary channel-closed error (the closed channel is just the
/// symptom), while a sink failure outranks the puller's resulting send
/// failure for the same reason.
pub async fn run_pipeline<S, K>(
    sources: Vec<S>,
    mut sink: K,
    options: PipelineOptions,
) -> Result<MergeStats, PipelineError>
where
    S: LogSource + 'static,
    K: Sink,
{
    let source_count = sources.len();
    debug!(sources = source_count, "starting pipeline");

    let (events_tx, events_rx) = mpsc::channel(options.buffer_limit);
    let puller = tokio::spawn(run_puller(sources, events_tx, options.cancel.clone()));

    let merged = run_merger(
        events_rx,
        &mut sink,
        source_count,
        options.bucket_granularity,
        options.cancel,
    )
    .await;

    // The merger dropped its receiver, so a still-running puller unblocks
    // with a send failure rather than hanging.
    let pulled = puller.await?;

    match merged {
        Ok(stats) => {
            // A send failure against a receiver the merger dropped on
            // cancellation is teardown, not a data-plane failure.
            match pulled {
                Err(PullerError::ChannelSend) => {}
                other => other?,
            }
            Ok(stats)
        }
        Err(MergerError::EventChannelClosed) => {
            pulled?;
            Err(MergerError::EventChannelClosed.into())
        }
        Err(e) => Err(e.into()),
    }
}
