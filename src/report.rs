use crate::anomaly::{self, AnomalyItem, PatternStream};
use crate::cluster::{self, ClusterSummary, ExampleClusterer};
use crate::config::AnalysisConfig;
use crate::parser::{self, ParsedLine};
use crate::temporal::{self, SpikeItem, SpikeParams};
use ahash::AHashSet;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParseSummary {
    pub total_lines: usize,
    pub parsed: usize,
    pub sample: Vec<ParsedLine>,
    pub level_counts: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RarityReport {
    pub total_lines: usize,
    pub unique_patterns: usize,
    pub rare_patterns: Vec<AnomalyItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpikeReport {
    pub total_lines: usize,
    pub unique_patterns: usize,
    pub spike_patterns: Vec<SpikeItem>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub clusters: Vec<ClusterSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub rarity: RarityReport,
    pub spikes: SpikeReport,
}

/// Decodes uploaded bytes as UTF-8, replacing invalid sequences instead of failing.
pub fn decode_input(bytes: &[u8]) -> Cow<'_, str> {
    String::from_utf8_lossy(bytes)
}

pub fn parse_summary(lines: &[&str], sample_size: usize) -> ParseSummary {
    let parsed_lines = parser::parse_lines(lines);
    let mut level_counts: BTreeMap<String, usize> = BTreeMap::new();
    let mut parsed = 0usize;
    for line in &parsed_lines {
        if let Some(level) = &line.level {
            parsed += 1;
            *level_counts.entry(level.clone()).or_insert(0) += 1;
        }
    }
    let sample = parsed_lines.into_iter().take(sample_size).collect();
    ParseSummary { total_lines: lines.len(), parsed, sample, level_counts }
}

pub fn rarity_report(lines: &[&str], top_k: usize) -> RarityReport {
    rarity_from_parsed(&parser::parse_lines(lines), top_k)
}

pub fn spike_report(lines: &[&str], params: &SpikeParams, clusterer: &dyn ExampleClusterer) -> SpikeReport {
    let parsed = parser::parse_lines(lines);
    let report = spikes_from_parsed(&parsed, params);
    with_clusters(report, clusterer)
}

/// Runs rarity and spike analysis over one parsed copy of the input, side by side.
pub fn analyze(lines: &[&str], config: &AnalysisConfig) -> AnalysisReport {
    let parsed = parser::parse_lines(lines);
    let (rarity, spikes) = rayon::join(
        || rarity_from_parsed(&parsed, config.rarity.top_k),
        || spikes_from_parsed(&parsed, &config.spikes),
    );
    let clusterer = config.clustering.build();
    let spikes = with_clusters(spikes, clusterer.as_ref());
    info!(
        total_lines = rarity.total_lines,
        unique_patterns = rarity.unique_patterns,
        rare = rarity.rare_patterns.len(),
        spikes = spikes.spike_patterns.len(),
        "analysis complete"
    );
    AnalysisReport { rarity, spikes }
}

fn rarity_from_parsed(lines: &[ParsedLine], top_k: usize) -> RarityReport {
    let stream = PatternStream::from_lines(lines);
    let rare_patterns = anomaly::rare_pattern_anomalies(&stream.keys, &stream.examples, top_k);
    RarityReport { total_lines: lines.len(), unique_patterns: stream.unique_patterns(), rare_patterns }
}

fn spikes_from_parsed(lines: &[ParsedLine], params: &SpikeParams) -> SpikeReport {
    let unique: AHashSet<String> = lines.iter().map(crate::masking::fingerprint_line).collect();
    SpikeReport {
        total_lines: lines.len(),
        unique_patterns: unique.len(),
        spike_patterns: temporal::detect_spikes_parsed(lines, params),
        clusters: Vec::new(),
    }
}

fn with_clusters(report: SpikeReport, clusterer: &dyn ExampleClusterer) -> SpikeReport {
    let (spike_patterns, clusters) = cluster::assign_clusters(report.spike_patterns, clusterer);
    SpikeReport { spike_patterns, clusters, ..report }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    /// Highest score first.
    Score,
    /// Lowest count first.
    Count,
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "score" => Ok(Self::Score),
            "count" => Ok(Self::Count),
            other => Err(format!("unknown sort order '{other}' (expected score or count)")),
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Score => f.write_str("score"),
            Self::Count => f.write_str("count"),
        }
    }
}

/// Narrows and reorders finished result lists. Empty strings and `None` mean no
/// constraint; `from`/`to` are inclusive epoch-second bounds on a spike's window
/// start and do not apply to rare patterns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultFilter {
    pub level: Option<String>,
    pub logger: Option<String>,
    pub from: Option<i64>,
    pub to: Option<i64>,
    pub sort: Option<SortOrder>,
}

impl ResultFilter {
    /// Matches the `LEVEL |` prefix and the `| logger |` segment of a pattern key.
    pub fn matches_key(&self, key: &str) -> bool {
        if let Some(level) = self.level.as_deref().filter(|l| !l.is_empty()) {
            if !key.starts_with(&format!("{} |", level.to_uppercase())) {
                return false;
            }
        }
        if let Some(logger) = self.logger.as_deref().filter(|l| !l.is_empty()) {
            if !key.contains(&format!(" | {logger} |")) {
                return false;
            }
        }
        true
    }

    fn in_range(&self, window_start: i64) -> bool {
        self.from.map_or(true, |from| window_start >= from) && self.to.map_or(true, |to| window_start <= to)
    }

    pub fn filter_rare(&self, items: Vec<AnomalyItem>) -> Vec<AnomalyItem> {
        let mut kept: Vec<AnomalyItem> = items.into_iter().filter(|i| self.matches_key(&i.key)).collect();
        match self.sort {
            Some(SortOrder::Score) => kept.sort_by(|a, b| b.score.total_cmp(&a.score)),
            Some(SortOrder::Count) => kept.sort_by_key(|i| i.count),
            None => {}
        }
        kept
    }

    pub fn filter_spikes(&self, items: Vec<SpikeItem>) -> Vec<SpikeItem> {
        let mut kept: Vec<SpikeItem> = items
            .into_iter()
            .filter(|i| self.matches_key(&i.key) && self.in_range(i.window_start))
            .collect();
        match self.sort {
            Some(SortOrder::Score) => kept.sort_by(|a, b| b.score.total_cmp(&a.score)),
            Some(SortOrder::Count) => kept.sort_by_key(|i| i.count),
            None => {}
        }
        kept
    }

    pub fn apply_rarity(&self, report: RarityReport) -> RarityReport {
        let rare_patterns = self.filter_rare(report.rare_patterns);
        RarityReport { rare_patterns, ..report }
    }

    /// Cluster summaries survive only while at least one of their spikes does.
    pub fn apply_spikes(&self, report: SpikeReport) -> SpikeReport {
        let spike_patterns = self.filter_spikes(report.spike_patterns);
        let clusters = report
            .clusters
            .into_iter()
            .filter(|c| spike_patterns.iter().any(|s| s.cluster_id == c.cluster_id))
            .collect();
        SpikeReport { spike_patterns, clusters, ..report }
    }

    pub fn apply(&self, report: AnalysisReport) -> AnalysisReport {
        AnalysisReport { rarity: self.apply_rarity(report.rarity), spikes: self.apply_spikes(report.spikes) }
    }
}
