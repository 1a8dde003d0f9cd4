use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub sources: HashMap<String, SourceConfig>,
    #[serde(default)]
    pub merge: MergeConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    #[serde(rename = "type")]
    pub source_type: SourceType,
    pub path: PathBuf,
    pub timestamp: TimestampConfig,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    File,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimestampConfig {
    pub pattern: String,
    pub format: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeConfig {
    /// Width of the time buckets the merger reorders within. Coarser buckets
    /// tolerate more cross-source skew at the cost of more buffering.
    #[serde(with = "humantime_serde", default = "default_bucket_granularity")]
    pub bucket_granularity: Duration,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            bucket_granularity: default_bucket_granularity(),
        }
    }
}

fn default_bucket_granularity() -> Duration {
    Duration::from_secs(24 * 60 * 60)
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub format: OutputFormat,
    #[serde(default)]
    pub prefix_source: bool,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default = "default_buffer_limit")]
    pub buffer_limit: usize,
    #[serde(default)]
    pub on_parse_error: ParseErrorStrategy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            buffer_limit: default_buffer_limit(),
            on_parse_error: ParseErrorStrategy::default(),
        }
    }
}

fn default_buffer_limit() -> usize {
    1000
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParseErrorStrategy {
    #[default]
    Drop,
    Fail,
}
