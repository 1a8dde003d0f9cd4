use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use regex::Regex;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TimestampError {
    #[error("regex compilation failed: {0}")]
    InvalidPattern(#[from] regex::Error),

    #[error("pattern missing 'ts' capture group")]
    MissingTsGroup,

    #[error("cannot parse timestamp '{value}' as {format}")]
    Unparseable { value: String, format: String },
}

#[derive(Debug, Clone)]
enum Format {
    Iso8601,
    EpochSecs,
    EpochMillis,
    Strptime(String),
}

/// Pulls a `DateTime<Utc>` out of a log line using a regex with a named
/// `ts` capture group and a format selector.
#[derive(Debug)]
pub struct TimestampExtractor {
    pattern: Regex,
    format: Format,
}

impl TimestampExtractor {
    /// `format` is one of `iso8601`, `epoch`, `epoch_ms`, or a strptime
    /// format string (interpreted as UTC).
    pub fn new(pattern: &str, format: &str) -> Result<Self, TimestampError> {
        let pattern = Regex::new(pattern)?;
        if !pattern.capture_names().flatten().any(|name| name == "ts") {
            return Err(TimestampError::MissingTsGroup);
        }

        let format = match format {
            "iso8601" => Format::Iso8601,
            "epoch" => Format::EpochSecs,
            "epoch_ms" => Format::EpochMillis,
            other => Format::Strptime(other.to_string()),
        };

        Ok(Self { pattern, format })
    }

    /// Returns `None` when the pattern does not match the line.
    pub fn extract(&self, line: &str) -> Result<Option<DateTime<Utc>>, TimestampError> {
        let Some(captures) = self.pattern.captures(line) else {
            return Ok(None);
        };
        let Some(value) = captures.name("ts") else {
            return Ok(None);
        };
        self.parse(value.as_str()).map(Some)
    }

    fn parse(&self, value: &str) -> Result<DateTime<Utc>, TimestampError> {
        let unparseable = || TimestampError::Unparseable {
            value: value.to_string(),
            format: self.format_name().to_string(),
        };

        match &self.format {
            Format::Iso8601 => DateTime::parse_from_rfc3339(value)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|_| unparseable()),
            Format::EpochSecs => value
                .parse::<i64>()
                .ok()
                .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
                .ok_or_else(unparseable),
            Format::EpochMillis => value
                .parse::<i64>()
                .ok()
                .and_then(DateTime::from_timestamp_millis)
                .ok_or_else(unparseable),
            Format::Strptime(fmt) => NaiveDateTime::parse_from_str(value, fmt)
                .map(|naive| Utc.from_utc_datetime(&naive))
                .map_err(|_| unparseable()),
        }
    }

    fn format_name(&self) -> &str {
        match &self.format {
            Format::Iso8601 => "iso8601",
            Format::EpochSecs => "epoch",
            Format::EpochMillis => "epoch_ms",
            Format::Strptime(fmt) => fmt,
        }
    }
}
