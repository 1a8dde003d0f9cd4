use std::fs;

const SAMPLE_CONFIG: &str = r#"# skein configuration
#
# Each source is an independent log file whose lines carry non-decreasing
# timestamps. The timestamp pattern must have a named 'ts' capture group;
# format is iso8601, epoch, epoch_ms, or a strptime format string.
sources:
  app:
    type: file
    path: /var/log/app.log
    timestamp:
      pattern: '^(?P<ts>\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}Z)'
      format: iso8601
  worker:
    type: file
    path: /var/log/worker.log
    timestamp:
      pattern: '^\[(?P<ts>\d+)\]'
      format: epoch

merge:
  # Width of the reordering window. Entries are held until no source can
  # still produce anything for a bucket, then emitted fully sorted.
  bucket_granularity: 1day

output:
  format: text        # text | json
  prefix_source: false

pipeline:
  buffer_limit: 1000
  on_parse_error: drop  # drop | fail
"#;

pub fn init(stdout: bool) -> Result<(), Box<dyn std::error::Error>> {
    if stdout {
        print!("{}", SAMPLE_CONFIG);
        return Ok(());
    }

    let Some(home_dir) = dirs::home_dir() else {
        return Err("could not determine home directory; use --stdout instead".into());
    };

    let config_path = home_dir.join(".config/skein/config.yml");
    if config_path.exists() {
        return Err(format!(
            "config already exists at {}; remove it first or use --stdout",
            config_path.display()
        )
        .into());
    }

    if let Some(parent) = config_path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&config_path, SAMPLE_CONFIG)?;

    println!("Wrote config to {}", config_path.display());
    println!("Edit the source paths and timestamp patterns, then run 'skein'.");

    Ok(())
}
