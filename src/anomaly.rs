use crate::{masking, parser::ParsedLine};
use ahash::AHashMap;
use itertools::Itertools;
use serde::{Deserialize, Serialize};

pub type FrequencyTable = AHashMap<String, usize>;
pub type ExampleMap = AHashMap<String, String>;

pub const DEFAULT_TOP_K: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyItem {
    pub key: String,
    pub count: usize,
    pub score: f64,
    pub explanation: String,
    pub example_message: String,
}

/// Fingerprint stream of a whole file plus the first example seen per fingerprint.
#[derive(Debug, Clone, Default)]
pub struct PatternStream {
    pub keys: Vec<String>,
    pub examples: ExampleMap,
}

impl PatternStream {
    pub fn from_lines(lines: &[ParsedLine]) -> Self {
        let mut keys = Vec::with_capacity(lines.len());
        let mut examples = ExampleMap::default();
        for line in lines {
            let key = masking::fingerprint_line(line);
            if !examples.contains_key(&key) {
                examples.insert(key.clone(), line.example_text().to_string());
            }
            keys.push(key);
        }
        Self { keys, examples }
    }

    pub fn unique_patterns(&self) -> usize {
        self.examples.len()
    }
}

pub fn frequency_table<'a, I>(keys: I) -> FrequencyTable
where
    I: IntoIterator<Item = &'a str>,
{
    let mut table = FrequencyTable::default();
    for key in keys {
        *table.entry(key.to_string()).or_insert(0) += 1;
    }
    table
}

/// Ranks fingerprints by ascending count (ties broken by key) and keeps the rarest `top_k`.
pub fn rare_pattern_anomalies(keys: &[String], examples: &ExampleMap, top_k: usize) -> Vec<AnomalyItem> {
    let table = frequency_table(keys.iter().map(String::as_str));
    if table.is_empty() {
        return Vec::new();
    }
    let total: usize = table.values().sum();
    let average = total as f64 / table.len() as f64;

    table
        .iter()
        .sorted_by(|a, b| a.1.cmp(b.1).then_with(|| a.0.cmp(b.0)))
        .take(top_k)
        .map(|(key, &count)| AnomalyItem {
            key: key.clone(),
            count,
            score: rarity_score(count, average),
            explanation: rarity_explanation(count, average),
            example_message: examples.get(key).cloned().unwrap_or_default(),
        })
        .collect()
}

pub fn rarity_score(count: usize, average: f64) -> f64 {
    if average > 0.0 {
        (average - count as f64) / average
    } else {
        0.0
    }
}

fn rarity_explanation(count: usize, average: f64) -> String {
    let times = if count == 1 { "time" } else { "times" };
    if (count as f64) < average {
        format!("Seen {count} {times}, below the average of {average:.2} occurrences per pattern")
    } else {
        format!("Seen {count} {times}, not below the average of {average:.2} occurrences per pattern")
    }
}
