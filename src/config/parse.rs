use super::expand_tilde;
use super::types::Config;
use crate::source::timestamp::TimestampExtractor;
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("validation failed: {0}")]
    Validation(String),
}

pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let yaml = fs::read_to_string(path).map_err(|e| {
        ConfigError::Io(std::io::Error::new(
            e.kind(),
            format!("failed to read config file '{}': {}", path.display(), e),
        ))
    })?;

    let mut config: Config = serde_yaml::from_str(&yaml)?;

    expand_paths(&mut config);
    validate_config(&config)?;

    Ok(config)
}

fn expand_paths(config: &mut Config) {
    for source in config.sources.values_mut() {
        source.path = expand_tilde(&source.path);
    }
}

fn validate_config(config: &Config) -> Result<(), ConfigError> {
    for (name, source) in &config.sources {
        TimestampExtractor::new(&source.timestamp.pattern, &source.timestamp.format)
            .map_err(|e| ConfigError::Validation(format!("source '{}': {}", name, e)))?;
    }

    let granularity = config.merge.bucket_granularity;
    if granularity.as_secs() == 0 || granularity.subsec_nanos() != 0 {
        return Err(ConfigError::Validation(
            "merge.bucket_granularity must be a positive whole number of seconds".to_string(),
        ));
    }

    if config.pipeline.buffer_limit == 0 {
        return Err(ConfigError::Validation(
            "pipeline.buffer_limit must be greater than zero".to_string(),
        ));
    }

    Ok(())
}
