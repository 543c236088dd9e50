use crate::{masking, parser::ParsedLine};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpikeParams {
    /// Window length in seconds.
    pub window_size: u64,
    pub threshold_mult: f64,
    pub top_k: usize,
}

impl Default for SpikeParams {
    fn default() -> Self {
        Self { window_size: 60, threshold_mult: 2.0, top_k: 10 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpikeItem {
    pub key: String,
    pub window_start: i64,
    pub count: usize,
    pub score: f64,
    pub explanation: String,
    pub example_message: String,
    #[serde(default)]
    pub cluster_id: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowBucket {
    pub count: usize,
    /// First message seen in the window, not the most frequent one.
    pub example_message: String,
}

/// fingerprint -> window start -> bucket
pub type WindowTable = BTreeMap<String, BTreeMap<i64, WindowBucket>>;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WindowingStats {
    pub bucketed: usize,
    pub missing_timestamp: usize,
    pub unparseable_timestamp: usize,
}

pub fn window_start(ts: f64, window_size: u64) -> i64 {
    if window_size == 0 {
        return ts.floor() as i64;
    }
    let w = window_size as f64;
    ((ts / w).floor() * w) as i64
}

pub fn bucket_lines(lines: &[ParsedLine], window_size: u64) -> (WindowTable, WindowingStats) {
    let mut table = WindowTable::new();
    let mut stats = WindowingStats::default();
    for line in lines {
        let ts = match line.epoch_seconds() {
            None => {
                stats.missing_timestamp += 1;
                continue;
            }
            Some(Err(err)) => {
                debug!(line = line.line_number, %err, "excluding line from windowing");
                stats.unparseable_timestamp += 1;
                continue;
            }
            Some(Ok(ts)) => ts,
        };
        let key = masking::fingerprint_line(line);
        let bucket = table
            .entry(key)
            .or_default()
            .entry(window_start(ts, window_size))
            .or_insert_with(|| WindowBucket { count: 0, example_message: line.example_text().to_string() });
        bucket.count += 1;
        stats.bucketed += 1;
    }
    (table, stats)
}

pub fn mean(vals: &[f64]) -> f64 {
    if vals.is_empty() {
        return 0.0;
    }
    vals.iter().sum::<f64>() / vals.len() as f64
}

/// Sample standard deviation (n - 1). Fewer than two points yields 0.
pub fn sample_stdev(vals: &[f64], m: f64) -> f64 {
    if vals.len() < 2 {
        return 0.0;
    }
    let var = vals.iter().map(|&x| (x - m).powi(2)).sum::<f64>() / (vals.len() - 1) as f64;
    var.sqrt()
}

pub fn detect_spikes(lines: &[&str], params: &SpikeParams) -> Vec<SpikeItem> {
    let parsed = crate::parser::parse_lines(lines);
    detect_spikes_parsed(&parsed, params)
}

pub fn detect_spikes_parsed(lines: &[ParsedLine], params: &SpikeParams) -> Vec<SpikeItem> {
    let (table, stats) = bucket_lines(lines, params.window_size);
    debug!(
        bucketed = stats.bucketed,
        missing_timestamp = stats.missing_timestamp,
        unparseable_timestamp = stats.unparseable_timestamp,
        patterns = table.len(),
        "windowed lines for spike detection"
    );

    let mut spikes = Vec::new();
    for (key, windows) in &table {
        // a single window gives no baseline to compare against
        if windows.len() < 2 {
            continue;
        }
        let counts: Vec<f64> = windows.values().map(|b| b.count as f64).collect();
        let m = mean(&counts);
        let stdev = sample_stdev(&counts, m);
        let threshold = m + params.threshold_mult * stdev;

        for (&start, bucket) in windows {
            let count = bucket.count as f64;
            if count <= threshold || bucket.count <= 1 {
                continue;
            }
            let score = if stdev > 0.0 { (count - m) / stdev } else { 0.0 };
            spikes.push(SpikeItem {
                key: key.clone(),
                window_start: start,
                count: bucket.count,
                score,
                explanation: spike_explanation(bucket.count, start, score, m),
                example_message: bucket.example_message.clone(),
                cluster_id: 0,
            });
        }
    }

    spikes.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.key.cmp(&b.key))
            .then_with(|| a.window_start.cmp(&b.window_start))
    });
    spikes.truncate(params.top_k);
    spikes
}

fn spike_explanation(count: usize, start: i64, score: f64, mean: f64) -> String {
    let when = DateTime::<Utc>::from_timestamp(start, 0)
        .map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, true))
        .unwrap_or_else(|| start.to_string());
    format!(
        "{count} occurrences in window starting {when}, {score:.2} standard deviations above the pattern's mean of {mean:.2} per window"
    )
}
