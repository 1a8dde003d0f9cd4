use crate::source::LogEntry;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::trace;

/// Buffers entries in coarse time buckets and flushes a bucket once no
/// active source can contribute to it anymore.
///
/// Each source's watermark is the bucket key of its most recent entry.
/// Because sources are individually non-decreasing, a bucket strictly below
/// the minimum watermark across active sources can never receive another
/// entry and is safe to sort and emit.
pub struct BucketMerger {
    granularity_secs: i64,
    buckets: BTreeMap<DateTime<Utc>, Vec<LogEntry>>,
    sources: Vec<SourceState>,
    flushed_buckets: u64,
}

#[derive(Debug, Clone)]
struct SourceState {
    watermark: Option<DateTime<Utc>>,
    active: bool,
}

enum FlushLimit {
    /// Some active source has no watermark yet; nothing is safe.
    Hold,
    /// Buckets strictly below this key are safe.
    Below(DateTime<Utc>),
    /// No active sources remain; everything is safe.
    Everything,
}

impl BucketMerger {
    /// `granularity` must be a positive whole number of seconds (enforced at
    /// config validation).
    pub fn new(source_count: usize, granularity: Duration) -> Self {
        let granularity_secs = granularity.as_secs() as i64;
        assert!(granularity_secs > 0, "bucket granularity must be at least one second");

        Self {
            granularity_secs,
            buckets: BTreeMap::new(),
            sources: vec![
                SourceState {
                    watermark: None,
                    active: true,
                };
                source_count
            ],
            flushed_buckets: 0,
        }
    }

    /// The start instant of the bucket containing `timestamp`.
    pub fn bucket_key(&self, timestamp: DateTime<Utc>) -> DateTime<Utc> {
        let secs = timestamp.timestamp().div_euclid(self.granularity_secs) * self.granularity_secs;
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    /// Buffer an entry from a source, advance that source's watermark, and
    /// return every entry that became safe to emit, in final order.
    pub fn observe(&mut self, source: usize, entry: LogEntry) -> Vec<LogEntry> {
        let key = self.bucket_key(entry.timestamp);
        self.buckets.entry(key).or_default().push(entry);

        if let Some(state) = self.sources.get_mut(source) {
            state.watermark = Some(key);
        }

        self.drain_ready()
    }

    /// Mark a source drained. A drained source no longer constrains the
    /// minimum watermark, which can make previously-held buckets eligible,
    /// so eligible entries are returned here too.
    pub fn mark_drained(&mut self, source: usize) -> Vec<LogEntry> {
        if let Some(state) = self.sources.get_mut(source) {
            state.active = false;
        }

        self.drain_ready()
    }

    /// Flush everything that remains, in final order. Called once no further
    /// entries can ever arrive.
    pub fn finish(&mut self) -> Vec<LogEntry> {
        let remaining = std::mem::take(&mut self.buckets);
        self.emit_buckets(remaining)
    }

    /// Number of entries currently buffered.
    pub fn buffered_count(&self) -> usize {
        self.buckets.values().map(Vec::len).sum()
    }

    /// Number of buckets flushed so far.
    pub fn flushed_buckets(&self) -> u64 {
        self.flushed_buckets
    }

    fn drain_ready(&mut self) -> Vec<LogEntry> {
        let eligible = match self.flush_limit() {
            FlushLimit::Hold => return Vec::new(),
            FlushLimit::Below(key) => {
                // split_off keeps strictly-older buckets here, hands back the rest.
                let retained = self.buckets.split_off(&key);
                std::mem::replace(&mut self.buckets, retained)
            }
            FlushLimit::Everything => std::mem::take(&mut self.buckets),
        };

        self.emit_buckets(eligible)
    }

    fn emit_buckets(&mut self, buckets: BTreeMap<DateTime<Utc>, Vec<LogEntry>>) -> Vec<LogEntry> {
        let mut out = Vec::new();
        for (key, mut entries) in buckets {
            // Stable sort: equal timestamps keep arrival order.
            entries.sort_by_key(|entry| entry.timestamp);
            trace!(bucket = %key, count = entries.len(), "flushing bucket");
            self.flushed_buckets += 1;
            out.extend(entries);
        }
        out
    }

    fn flush_limit(&self) -> FlushLimit {
        let active: Vec<&SourceState> = self.sources.iter().filter(|s| s.active).collect();

        if active.is_empty() {
            return FlushLimit::Everything;
        }
        if active.iter().any(|s| s.watermark.is_none()) {
            return FlushLimit::Hold;
        }

        match active.iter().filter_map(|s| s.watermark).min() {
            Some(min) => FlushLimit::Below(min),
            None => FlushLimit::Hold,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DAY: Duration = Duration::from_secs(24 * 60 * 60);

    fn entry(source: &str, timestamp: &str, text: &str) -> LogEntry {
        LogEntry {
            timestamp: timestamp.parse().unwrap(),
            source_id: source.to_string(),
            raw_text: text.to_string(),
        }
    }

    fn texts(entries: &[LogEntry]) -> Vec<&str> {
        entries.iter().map(|e| e.raw_text.as_str()).collect()
    }

    #[test]
    fn test_bucket_key_truncates_to_granularity() {
        let merger = BucketMerger::new(1, DAY);

        let key = merger.bucket_key("2025-12-04T10:30:00Z".parse().unwrap());
        assert_eq!(key, "2025-12-04T00:00:00Z".parse::<DateTime<Utc>>().unwrap());

        let key = merger.bucket_key("2025-12-04T00:00:00Z".parse().unwrap());
        assert_eq!(key, "2025-12-04T00:00:00Z".parse::<DateTime<Utc>>().unwrap());
    }

    #[test]
    fn test_bucket_key_pre_epoch_truncates_downward() {
        let merger = BucketMerger::new(1, DAY);

        let key = merger.bucket_key("1969-12-31T18:00:00Z".parse().unwrap());
        assert_eq!(key, "1969-12-31T00:00:00Z".parse::<DateTime<Utc>>().unwrap());
    }

    #[test]
    fn test_hold_until_every_active_source_has_watermark() {
        let mut merger = BucketMerger::new(2, DAY);

        // Source 1 has no watermark yet, so nothing may flush even though
        // source 0 is already two days ahead.
        let out = merger.observe(0, entry("a", "2025-12-01T10:00:00Z", "a1"));
        assert!(out.is_empty());
        let out = merger.observe(0, entry("a", "2025-12-03T10:00:00Z", "a2"));
        assert!(out.is_empty());
        assert_eq!(merger.buffered_count(), 2);

        // Source 1's first entry gives it a watermark at day 3: day 1 flushes.
        let out = merger.observe(1, entry("b", "2025-12-03T09:00:00Z", "b1"));
        assert_eq!(texts(&out), vec!["a1"]);
        assert_eq!(merger.buffered_count(), 2);
    }

    #[test]
    fn test_bucket_at_min_watermark_is_retained() {
        let mut merger = BucketMerger::new(2, DAY);

        merger.observe(0, entry("a", "2025-12-01T10:00:00Z", "a1"));
        let out = merger.observe(1, entry("b", "2025-12-01T11:00:00Z", "b1"));

        // Both watermarks sit at day 1; the day-1 bucket can still grow.
        assert!(out.is_empty());
        assert_eq!(merger.buffered_count(), 2);
    }

    #[test]
    fn test_flush_emits_sorted_across_sources() {
        let mut merger = BucketMerger::new(2, DAY);

        merger.observe(0, entry("a", "2025-12-01T20:00:00Z", "a-late"));
        merger.observe(1, entry("b", "2025-12-01T08:00:00Z", "b-early"));
        merger.observe(0, entry("a", "2025-12-02T01:00:00Z", "a-next"));
        let out = merger.observe(1, entry("b", "2025-12-02T02:00:00Z", "b-next"));

        // Day 1 flushed, internally sorted despite arrival order.
        assert_eq!(texts(&out), vec!["b-early", "a-late"]);
    }

    #[test]
    fn test_multiple_buckets_flush_in_ascending_order() {
        let mut merger = BucketMerger::new(2, DAY);

        merger.observe(0, entry("a", "2025-12-01T10:00:00Z", "day1"));
        merger.observe(0, entry("a", "2025-12-02T10:00:00Z", "day2"));
        merger.observe(0, entry("a", "2025-12-04T10:00:00Z", "day4"));
        let out = merger.observe(1, entry("b", "2025-12-04T09:00:00Z", "b-day4"));

        assert_eq!(texts(&out), vec!["day1", "day2"]);
        assert_eq!(merger.flushed_buckets(), 2);
    }

    #[test]
    fn test_drained_source_stops_constraining() {
        let mut merger = BucketMerger::new(2, DAY);

        merger.observe(0, entry("a", "2025-12-01T10:00:00Z", "a1"));
        merger.observe(1, entry("b", "2025-12-01T09:00:00Z", "b1"));
        let out = merger.observe(0, entry("a", "2025-12-03T10:00:00Z", "a2"));
        // Source b's watermark still holds day 1.
        assert!(out.is_empty());

        // Once b drains, only a's watermark (day 3) matters: day 1 flushes.
        let out = merger.mark_drained(1);
        assert_eq!(texts(&out), vec!["b1", "a1"]);
        assert_eq!(merger.buffered_count(), 1);
    }

    #[test]
    fn test_empty_source_never_blocks() {
        let mut merger = BucketMerger::new(2, DAY);

        merger.observe(0, entry("a", "2025-12-01T10:00:00Z", "a1"));
        merger.observe(0, entry("a", "2025-12-03T10:00:00Z", "a2"));

        // Source 1 drains without ever producing a watermark; it must not
        // hold day 1 back.
        let out = merger.mark_drained(1);
        assert_eq!(texts(&out), vec!["a1"]);
    }

    #[test]
    fn test_all_sources_drained_flushes_everything() {
        let mut merger = BucketMerger::new(1, DAY);

        merger.observe(0, entry("a", "2025-12-01T10:00:00Z", "a1"));
        merger.observe(0, entry("a", "2025-12-02T10:00:00Z", "a2"));

        let out = merger.mark_drained(0);
        assert_eq!(texts(&out), vec!["a1", "a2"]);
        assert_eq!(merger.buffered_count(), 0);
    }

    #[test]
    fn test_finish_flushes_remaining_ascending() {
        let mut merger = BucketMerger::new(1, DAY);

        merger.observe(0, entry("a", "2025-12-03T10:00:00Z", "day3"));
        merger.observe(0, entry("a", "2025-12-01T12:00:00Z", "day1-late"));
        merger.observe(0, entry("a", "2025-12-01T08:00:00Z", "day1-early"));

        let out = merger.finish();
        assert_eq!(texts(&out), vec!["day1-early", "day1-late", "day3"]);
        assert_eq!(merger.buffered_count(), 0);
    }

    #[test]
    fn test_equal_timestamps_keep_arrival_order() {
        let mut merger = BucketMerger::new(1, DAY);

        merger.observe(0, entry("a", "2025-12-01T10:00:00Z", "first"));
        merger.observe(0, entry("a", "2025-12-01T10:00:00Z", "second"));
        merger.observe(0, entry("a", "2025-12-01T10:00:00Z", "third"));

        let out = merger.finish();
        assert_eq!(texts(&out), vec!["first", "second", "third"]);
    }

    #[test]
    fn test_fine_granularity_degenerates_to_k_way_merge() {
        let mut merger = BucketMerger::new(2, Duration::from_secs(1));

        let mut out = Vec::new();
        out.extend(merger.observe(0, entry("a", "2025-12-01T10:00:00Z", "a1")));
        out.extend(merger.observe(1, entry("b", "2025-12-01T10:00:01Z", "b1")));
        out.extend(merger.observe(0, entry("a", "2025-12-01T10:00:02Z", "a2")));
        out.extend(merger.observe(1, entry("b", "2025-12-01T10:00:03Z", "b2")));
        out.extend(merger.mark_drained(0));
        out.extend(merger.mark_drained(1));
        out.extend(merger.finish());

        assert_eq!(texts(&out), vec!["a1", "b1", "a2", "b2"]);
    }

    #[test]
    fn test_zero_sources_flush_limit_is_everything() {
        let mut merger = BucketMerger::new(0, DAY);
        assert_eq!(merger.buffered_count(), 0);
        assert!(merger.finish().is_empty());
    }
}
