//! Usage Accounting & Quotas
//!
//! Append-only usage records (line-delimited JSON, flushed per record),
//! rolling-window per-user aggregation, pre-request admission checks, and
//! TTL-based aggregator eviction. On startup the tracker replays records
//! inside the rolling window from the usage log.

use std::collections::VecDeque;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::services::llm::TokenUsage;

/// Default inactivity TTL before an aggregator is evicted.
const AGGREGATOR_TTL_HOURS: i64 = 24;
/// Cleanup sweeps run at most this often.
const CLEANUP_INTERVAL_SECS: i64 = 3600;
/// Tokens a turn is assumed to need at admission time.
const ADMISSION_RESERVE_TOKENS: u64 = 100;

// ============================================================================
// Records
// ============================================================================

/// One appended usage record. Timestamps are UTC ISO-8601.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub thread_id: String,
    pub timestamp: DateTime<Utc>,
    pub query: String,
    pub response: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub provider: String,
    pub model: String,
    pub persona: String,
}

impl UsageRecord {
    pub fn total_tokens(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }
}

/// One turn's token usage entering the aggregator.
#[derive(Debug, Clone)]
pub struct UsageItem {
    pub usage: TokenUsage,
    pub provider: String,
    pub model: String,
}

// ============================================================================
// Quota Types
// ============================================================================

#[derive(Debug, Clone, Copy)]
pub struct QuotaLimits {
    /// Rolling-window token limit. None disables enforcement.
    pub daily_token_limit: Option<u64>,
    pub window_hours: u64,
}

/// Raised when a user is over their rolling-window quota.
#[derive(Debug, Clone, Copy, thiserror::Error)]
#[error("quota exceeded: {current_usage}/{limit} tokens in {window_hours}h window")]
pub struct QuotaExceeded {
    pub current_usage: u64,
    pub limit: u64,
    pub window_hours: u64,
}

// ============================================================================
// Usage Writer
// ============================================================================

/// Append-only JSONL writer for usage records. Flushes after each record.
pub struct UsageWriter {
    path: PathBuf,
    file: Mutex<File>,
}

impl UsageWriter {
    pub fn open(path: impl Into<PathBuf>) -> std::io::Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self { path, file: Mutex::new(file) })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn write(&self, record: &UsageRecord) -> std::io::Result<()> {
        let line = serde_json::to_string(record)?;
        let mut file = self.file.lock().expect("usage writer lock poisoned");
        writeln!(file, "{}", line)?;
        file.flush()
    }

    /// Read all parseable records from a usage log. Malformed lines are
    /// skipped with a warning.
    pub fn read_records(path: impl AsRef<Path>) -> Vec<UsageRecord> {
        let Ok(file) = File::open(path.as_ref()) else {
            return Vec::new();
        };
        let mut records = Vec::new();
        for (i, line) in BufReader::new(file).lines().map_while(Result::ok).enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<UsageRecord>(&line) {
                Ok(record) => records.push(record),
                Err(e) => {
                    tracing::warn!("Skipping malformed usage record on line {}: {}", i + 1, e);
                },
            }
        }
        records
    }
}

// ============================================================================
// Aggregator
// ============================================================================

/// Rolling-window accounting for one user (or anonymous thread).
struct Aggregator {
    events: VecDeque<(DateTime<Utc>, u64)>,
    window_total: u64,
    last_access: DateTime<Utc>,
}

impl Aggregator {
    fn new(now: DateTime<Utc>) -> Self {
        Self { events: VecDeque::new(), window_total: 0, last_access: now }
    }

    fn prune(&mut self, cutoff: DateTime<Utc>) {
        while let Some((ts, tokens)) = self.events.front() {
            if *ts >= cutoff {
                break;
            }
            self.window_total -= tokens;
            self.events.pop_front();
        }
    }

    fn add(&mut self, now: DateTime<Utc>, tokens: u64) {
        self.events.push_back((now, tokens));
        self.window_total += tokens;
        self.last_access = now;
    }

    fn usage_in_window(&mut self, now: DateTime<Utc>, window: Duration) -> u64 {
        self.prune(now - window);
        self.window_total
    }
}

// ============================================================================
// Tracker
// ============================================================================

/// Per-user usage tracking with quota admission.
///
/// Aggregators are keyed by `user_id` when present, else
/// `anonymous:{thread_id}`. Accesses to one aggregator are serialized by its
/// own lock; the map itself is concurrent.
pub struct UsageTracker {
    limits: QuotaLimits,
    enforce: bool,
    writer: Option<UsageWriter>,
    aggregators: DashMap<String, Arc<Mutex<Aggregator>>>,
    last_cleanup: Mutex<DateTime<Utc>>,
    ttl: Duration,
}

impl UsageTracker {
    pub fn new(limits: QuotaLimits, enforce: bool, writer: Option<UsageWriter>) -> Self {
        Self {
            limits,
            enforce,
            writer,
            aggregators: DashMap::new(),
            last_cleanup: Mutex::new(Utc::now()),
            ttl: Duration::hours(AGGREGATOR_TTL_HOURS),
        }
    }

    /// Restore window state by replaying usage log records that fall inside
    /// the rolling window. Returns the number of replayed records.
    pub fn replay_log(&self, path: impl AsRef<Path>) -> usize {
        let now = Utc::now();
        let window = self.window();
        let mut restored = 0;

        for record in UsageWriter::read_records(path) {
            if now - record.timestamp > window {
                continue;
            }
            let key = Self::storage_key(record.user_id.as_deref(), &record.thread_id);
            let aggregator = self.aggregator(&key, record.timestamp);
            let mut guard = aggregator.lock().expect("aggregator lock poisoned");
            guard.add(record.timestamp, record.total_tokens());
            restored += 1;
        }

        if restored > 0 {
            tracing::info!("Restored {} usage records into the quota tracker", restored);
        }
        restored
    }

    fn window(&self) -> Duration {
        Duration::hours(self.limits.window_hours as i64)
    }

    pub fn storage_key(user_id: Option<&str>, thread_id: &str) -> String {
        match user_id {
            Some(user_id) => user_id.to_string(),
            None => format!("anonymous:{}", thread_id),
        }
    }

    fn aggregator(&self, key: &str, now: DateTime<Utc>) -> Arc<Mutex<Aggregator>> {
        self.maybe_cleanup(now);
        self.aggregators
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(Aggregator::new(now))))
            .clone()
    }

    /// Pre-request admission: fails when the user's window usage plus the
    /// admission reserve would exceed the limit. No LLM work may start
    /// after a failure.
    pub fn check_quota(&self, user_id: &str) -> Result<(), QuotaExceeded> {
        if !self.enforce {
            return Ok(());
        }
        let Some(limit) = self.limits.daily_token_limit else {
            return Ok(());
        };

        let now = Utc::now();
        let current_usage = match self.aggregators.get(user_id) {
            Some(entry) => {
                let aggregator = entry.value().clone();
                drop(entry);
                let mut guard = aggregator.lock().expect("aggregator lock poisoned");
                guard.last_access = now;
                guard.usage_in_window(now, self.window())
            },
            None => 0,
        };

        if current_usage + ADMISSION_RESERVE_TOKENS > limit {
            return Err(QuotaExceeded {
                current_usage,
                limit,
                window_hours: self.limits.window_hours,
            });
        }
        Ok(())
    }

    /// Accumulate a turn's tokens and update last access.
    pub fn add_usage_item(&self, user_id: Option<&str>, thread_id: &str, item: &UsageItem) {
        let now = Utc::now();
        let key = Self::storage_key(user_id, thread_id);
        let aggregator = self.aggregator(&key, now);
        let mut guard = aggregator.lock().expect("aggregator lock poisoned");
        guard.add(now, item.usage.total());
        guard.prune(now - self.window());
        tracing::debug!(
            "Usage recorded for '{}': input={}, output={}, window_total={}",
            key,
            item.usage.input_tokens,
            item.usage.output_tokens,
            guard.window_total
        );
    }

    /// Append a record to the usage log. Sink failures never fail the turn.
    pub fn write_record(&self, record: &UsageRecord) {
        let Some(writer) = &self.writer else {
            return;
        };
        if let Err(e) = writer.write(record) {
            tracing::warn!(
                "Failed to write usage record for thread {}: {}",
                record.thread_id,
                e
            );
        }
    }

    /// Current window usage for a storage key (primarily for inspection).
    pub fn window_usage(&self, key: &str) -> u64 {
        let now = Utc::now();
        match self.aggregators.get(key) {
            Some(entry) => {
                let aggregator = entry.value().clone();
                drop(entry);
                let mut guard = aggregator.lock().expect("aggregator lock poisoned");
                guard.usage_in_window(now, self.window())
            },
            None => 0,
        }
    }

    /// Drop aggregators idle past the TTL. Runs at most once per hour.
    fn maybe_cleanup(&self, now: DateTime<Utc>) {
        {
            let mut last = self.last_cleanup.lock().expect("cleanup lock poisoned");
            if (now - *last).num_seconds() < CLEANUP_INTERVAL_SECS {
                return;
            }
            *last = now;
        }
        self.sweep_stale(now);
    }

    /// Remove aggregators whose last access is older than the TTL.
    /// Exposed for the scheduled sweep.
    pub fn sweep_stale(&self, now: DateTime<Utc>) -> usize {
        let ttl = self.ttl;
        let before = self.aggregators.len();
        self.aggregators.retain(|_, aggregator| {
            let guard = aggregator.lock().expect("aggregator lock poisoned");
            now - guard.last_access <= ttl
        });
        let removed = before - self.aggregators.len();
        if removed > 0 {
            tracing::debug!("Cleaned up {} stale usage aggregators", removed);
        }
        removed
    }

    pub fn aggregator_count(&self) -> usize {
        self.aggregators.len()
    }
}

// ============================================================================
// Scheduled Sweep Task
// ============================================================================

/// Hourly eviction sweep for the usage tracker.
pub struct UsageSweepTask {
    pub tracker: Arc<UsageTracker>,
}

impl crate::utils::ScheduledTask for UsageSweepTask {
    fn run(
        &self,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<(), anyhow::Error>> + Send + '_>>
    {
        Box::pin(async move {
            self.tracker.sweep_stale(Utc::now());
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(user: &str, tokens: u64, at: DateTime<Utc>) -> UsageRecord {
        UsageRecord {
            user_id: Some(user.to_string()),
            thread_id: "t1".to_string(),
            timestamp: at,
            query: "q".to_string(),
            response: "r".to_string(),
            input_tokens: tokens / 2,
            output_tokens: tokens - tokens / 2,
            provider: "openai".to_string(),
            model: "gpt-4o".to_string(),
            persona: "core".to_string(),
        }
    }

    fn tracker(limit: Option<u64>, enforce: bool) -> UsageTracker {
        UsageTracker::new(
            QuotaLimits { daily_token_limit: limit, window_hours: 24 },
            enforce,
            None,
        )
    }

    #[test]
    fn test_quota_breach_at_admission() {
        // User u1 has 950 tokens in the window against a limit of 1000; a
        // turn expecting at least 100 tokens must be rejected up front.
        let tracker = tracker(Some(1000), true);
        tracker.add_usage_item(
            Some("u1"),
            "t1",
            &UsageItem {
                usage: TokenUsage { input_tokens: 600, output_tokens: 350 },
                provider: "openai".into(),
                model: "gpt-4o".into(),
            },
        );

        let err = tracker.check_quota("u1").unwrap_err();
        assert_eq!(err.current_usage, 950);
        assert_eq!(err.limit, 1000);
        assert_eq!(err.window_hours, 24);
    }

    #[test]
    fn test_quota_passes_under_limit() {
        let tracker = tracker(Some(1000), true);
        tracker.add_usage_item(
            Some("u1"),
            "t1",
            &UsageItem {
                usage: TokenUsage { input_tokens: 100, output_tokens: 100 },
                provider: "openai".into(),
                model: "gpt-4o".into(),
            },
        );
        assert!(tracker.check_quota("u1").is_ok());
    }

    #[test]
    fn test_check_quota_reflects_added_usage_immediately() {
        let tracker = tracker(Some(1000), true);
        assert!(tracker.check_quota("u1").is_ok());

        tracker.add_usage_item(
            Some("u1"),
            "t1",
            &UsageItem {
                usage: TokenUsage { input_tokens: 500, output_tokens: 450 },
                provider: "openai".into(),
                model: "gpt-4o".into(),
            },
        );
        assert!(tracker.check_quota("u1").is_err());
    }

    #[test]
    fn test_enforcement_disabled_always_passes() {
        let tracker = tracker(Some(10), false);
        tracker.add_usage_item(
            Some("u1"),
            "t1",
            &UsageItem {
                usage: TokenUsage { input_tokens: 100, output_tokens: 100 },
                provider: "openai".into(),
                model: "gpt-4o".into(),
            },
        );
        assert!(tracker.check_quota("u1").is_ok());
    }

    #[test]
    fn test_anonymous_users_keyed_by_thread() {
        assert_eq!(UsageTracker::storage_key(None, "t9"), "anonymous:t9");
        assert_eq!(UsageTracker::storage_key(Some("u1"), "t9"), "u1");
    }

    #[test]
    fn test_replay_restores_only_records_in_window() {
        let tmp = tempfile::tempdir().unwrap();
        let log_path = tmp.path().join("usage.jsonl");
        let writer = UsageWriter::open(&log_path).unwrap();

        let now = Utc::now();
        writer.write(&record("u1", 400, now - Duration::hours(1))).unwrap();
        writer.write(&record("u1", 500, now - Duration::hours(2))).unwrap();
        writer.write(&record("u1", 9000, now - Duration::hours(48))).unwrap();

        let tracker = tracker(Some(1000), true);
        let restored = tracker.replay_log(&log_path);
        assert_eq!(restored, 2);
        assert_eq!(tracker.window_usage("u1"), 900);
        assert!(tracker.check_quota("u1").is_err());
    }

    #[test]
    fn test_writer_appends_one_json_line_per_record() {
        let tmp = tempfile::tempdir().unwrap();
        let log_path = tmp.path().join("usage.jsonl");
        let writer = UsageWriter::open(&log_path).unwrap();

        let now = Utc::now();
        writer.write(&record("u1", 100, now)).unwrap();
        writer.write(&record("u2", 200, now)).unwrap();

        let content = std::fs::read_to_string(&log_path).unwrap();
        let lines: Vec<&str> = content.trim().lines().collect();
        assert_eq!(lines.len(), 2);
        for line in lines {
            let parsed: UsageRecord = serde_json::from_str(line).unwrap();
            assert!(parsed.input_tokens + parsed.output_tokens > 0);
        }
    }

    #[test]
    fn test_records_have_non_negative_and_monotonic_timestamps() {
        let tmp = tempfile::tempdir().unwrap();
        let log_path = tmp.path().join("usage.jsonl");
        let writer = UsageWriter::open(&log_path).unwrap();

        let base = Utc::now();
        for i in 0..5 {
            writer.write(&record("u1", 10, base + Duration::seconds(i))).unwrap();
        }

        let records = UsageWriter::read_records(&log_path);
        let mut last = None;
        for r in records {
            if let Some(prev) = last {
                assert!(r.timestamp >= prev, "timestamps must be non-decreasing per user");
            }
            last = Some(r.timestamp);
        }
    }

    #[test]
    fn test_sweep_removes_idle_aggregators() {
        let tracker = tracker(None, false);
        tracker.add_usage_item(
            Some("u1"),
            "t1",
            &UsageItem {
                usage: TokenUsage { input_tokens: 1, output_tokens: 1 },
                provider: "openai".into(),
                model: "gpt-4o".into(),
            },
        );
        assert_eq!(tracker.aggregator_count(), 1);

        // Nothing is stale yet
        assert_eq!(tracker.sweep_stale(Utc::now()), 0);
        // A sweep 25 hours in the future evicts the idle aggregator
        assert_eq!(tracker.sweep_stale(Utc::now() + Duration::hours(25)), 1);
        assert_eq!(tracker.aggregator_count(), 0);
    }
}
