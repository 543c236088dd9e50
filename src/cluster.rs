use crate::masking;
use crate::temporal::SpikeItem;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum ClusterError {
    #[error("drain operation error: {0}")]
    Drain(String),
    #[error("clustering backend unavailable: {0}")]
    Unavailable(String),
    #[error("backend returned {got} assignments for {expected} examples")]
    AssignmentMismatch { expected: usize, got: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterSummary {
    pub cluster_id: usize,
    pub template: String,
    pub size: usize,
    /// Pattern keys of the spike items placed in this cluster.
    #[serde(default)]
    pub keys: Vec<String>,
}

/// One cluster id per input example, in input order, plus a summary per cluster.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Clustering {
    pub assignments: Vec<usize>,
    pub summaries: Vec<ClusterSummary>,
}

pub trait ExampleClusterer: Send + Sync {
    fn name(&self) -> &'static str;
    fn cluster(&self, examples: &[&str]) -> Result<Clustering, ClusterError>;
}

/// Puts every example in cluster 0 and reports no summaries.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopClusterer;

impl ExampleClusterer for NoopClusterer {
    fn name(&self) -> &'static str {
        "none"
    }

    fn cluster(&self, examples: &[&str]) -> Result<Clustering, ClusterError> {
        Ok(Clustering { assignments: vec![0; examples.len()], summaries: Vec::new() })
    }
}

/// Groups examples by the Drain template their masked text settles into.
#[derive(Debug, Clone)]
pub struct DrainClusterer {
    max_depth: u16,
    min_similarity: f32,
    max_children: u16,
}

impl Default for DrainClusterer {
    fn default() -> Self {
        Self::new(4, 0.4, 100)
    }
}

impl DrainClusterer {
    pub fn new(max_depth: u16, min_similarity: f32, max_children: u16) -> Self {
        Self { max_depth, min_similarity, max_children }
    }

    fn tree(&self) -> drain_rs::DrainTree {
        // Examples arrive masked, so digits (and with them IPv4 addresses) are gone;
        // e-mail addresses are still free text.
        let patterns = vec!["%{EMAILADDRESS:EMAIL}"];
        let mut g = grok::Grok::with_patterns();
        drain_rs::DrainTree::new()
            .max_depth(self.max_depth)
            .min_similarity(self.min_similarity)
            .max_children(self.max_children)
            .filter_patterns(patterns)
            .build_patterns(&mut g)
    }
}

impl ExampleClusterer for DrainClusterer {
    fn name(&self) -> &'static str {
        "drain"
    }

    fn cluster(&self, examples: &[&str]) -> Result<Clustering, ClusterError> {
        let masked: Vec<String> = examples.iter().map(|e| masking::mask_message(e)).collect();
        let mut tree = self.tree();
        for line in &masked {
            tree.add_log_line(line)
                .ok_or_else(|| ClusterError::Drain("failed to add log line".into()))?;
        }

        // Templates only generalize while the tree is being built, so read them back
        // in a second pass once every example has been seen.
        let mut ids: HashMap<String, usize> = HashMap::new();
        let mut summaries: Vec<ClusterSummary> = Vec::new();
        let mut assignments = Vec::with_capacity(masked.len());
        for line in &masked {
            let template = tree
                .add_log_line(line)
                .ok_or_else(|| ClusterError::Drain("failed to add log line".into()))?
                .as_string();
            let next_id = summaries.len();
            let id = *ids.entry(template.clone()).or_insert(next_id);
            if id == next_id {
                summaries.push(ClusterSummary { cluster_id: id, template, size: 0, keys: Vec::new() });
            }
            summaries[id].size += 1;
            assignments.push(id);
        }
        Ok(Clustering { assignments, summaries })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClusterBackend {
    #[default]
    None,
    Drain,
}

impl FromStr for ClusterBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" | "off" => Ok(Self::None),
            "drain" => Ok(Self::Drain),
            other => Err(format!("unknown clustering backend '{other}' (expected none or drain)")),
        }
    }
}

impl fmt::Display for ClusterBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("none"),
            Self::Drain => f.write_str("drain"),
        }
    }
}

/// Attaches cluster ids to spike items. Any backend failure leaves every item in
/// cluster 0 and the ranking untouched.
pub fn assign_clusters(
    items: Vec<SpikeItem>,
    clusterer: &dyn ExampleClusterer,
) -> (Vec<SpikeItem>, Vec<ClusterSummary>) {
    if items.is_empty() {
        return (items, Vec::new());
    }
    let examples: Vec<&str> = items.iter().map(|i| i.example_message.as_str()).collect();
    let outcome = clusterer.cluster(&examples).and_then(|c| {
        if c.assignments.len() == examples.len() {
            Ok(c)
        } else {
            Err(ClusterError::AssignmentMismatch { expected: examples.len(), got: c.assignments.len() })
        }
    });
    match outcome {
        Ok(clustering) => {
            debug!(backend = clusterer.name(), clusters = clustering.summaries.len(), "clustered spike examples");
            let mut summaries = clustering.summaries;
            let items: Vec<SpikeItem> = items
                .into_iter()
                .zip(clustering.assignments)
                .map(|(item, cluster_id)| SpikeItem { cluster_id, ..item })
                .collect();
            for item in &items {
                if let Some(summary) = summaries.iter_mut().find(|s| s.cluster_id == item.cluster_id) {
                    if !summary.keys.contains(&item.key) {
                        summary.keys.push(item.key.clone());
                    }
                }
            }
            (items, summaries)
        }
        Err(err) => {
            warn!(backend = clusterer.name(), %err, "clustering failed, keeping default cluster");
            let items = items.into_iter().map(|item| SpikeItem { cluster_id: 0, ..item }).collect();
            (items, Vec::new())
        }
    }
}
