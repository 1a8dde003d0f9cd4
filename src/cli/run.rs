use crate::config::parse::load_config;
use crate::pipeline::{run_pipeline, PipelineOptions};
use crate::sink::ConsoleSink;
use crate::source::reader::FileSource;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] crate::config::parse::ConfigError),

    #[error("source error: {0}")]
    Source(#[from] crate::source::SourceError),

    #[error("pipeline error: {0}")]
    Pipeline(#[from] crate::pipeline::PipelineError),
}

pub async fn run(config_path: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    let Some(config_path) = config_path else {
        eprintln!("Error: config not found");
        eprintln!("Searched locations:");
        eprintln!("  ~/.config/skein/config.yml");
        eprintln!("  /etc/skein/config.yml");
        eprintln!(
            "\nUse --config <path> to specify a config file, or run 'skein config init' to generate one."
        );
        std::process::exit(1);
    };

    run_merge(&config_path).await.map_err(|e| e.into())
}

async fn run_merge(config_path: &Path) -> Result<(), RunError> {
    info!(config_path = %config_path.display(), "Loading configuration");
    let config = load_config(config_path)?;

    // Sorted name order keeps source indices stable across runs.
    let mut names: Vec<&String> = config.sources.keys().collect();
    names.sort();

    let mut sources = Vec::new();
    for name in names {
        let source_config = &config.sources[name];
        info!(source = %name, path = %source_config.path.display(), "Opening source");
        sources.push(FileSource::new(
            name.clone(),
            source_config,
            config.pipeline.on_parse_error,
        )?);
    }

    if sources.is_empty() {
        warn!("No sources configured, nothing to merge");
    }

    let sink = ConsoleSink::new(config.output.format, config.output.prefix_source);

    let cancel = CancellationToken::new();
    let ctrl_c_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown signal received");
            ctrl_c_cancel.cancel();
        }
    });

    let options = PipelineOptions {
        bucket_granularity: config.merge.bucket_granularity,
        buffer_limit: config.pipeline.buffer_limit,
        cancel,
    };

    let stats = run_pipeline(sources, sink, options).await?;
    info!(
        entries = stats.entries_emitted,
        buckets = stats.buckets_flushed,
        "Merge finished"
    );

    Ok(())
}
