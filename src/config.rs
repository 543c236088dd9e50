//! Analysis configuration: defaults, TOML file, environment overrides.
//!
//! Priority: CLI flags (applied by the binary) > environment > file > defaults.

use crate::anomaly::DEFAULT_TOP_K;
use crate::cluster::{ClusterBackend, DrainClusterer, ExampleClusterer, NoopClusterer};
use crate::temporal::SpikeParams;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

pub const CONFIG_ENV: &str = "LOGSIFT_CONFIG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid value for {key}: {value}")]
    Env { key: String, value: String },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub rarity: RarityConfig,
    pub spikes: SpikeParams,
    pub parse: ParseConfig,
    pub clustering: ClusteringConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RarityConfig {
    pub top_k: usize,
}

impl Default for RarityConfig {
    fn default() -> Self {
        Self { top_k: DEFAULT_TOP_K }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParseConfig {
    /// Number of parsed lines echoed back in a parse summary.
    pub sample_size: usize,
}

impl Default for ParseConfig {
    fn default() -> Self {
        Self { sample_size: 50 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusteringConfig {
    pub backend: ClusterBackend,
    pub max_depth: u16,
    pub min_similarity: f32,
    pub max_children: u16,
}

impl Default for ClusteringConfig {
    fn default() -> Self {
        Self { backend: ClusterBackend::None, max_depth: 4, min_similarity: 0.4, max_children: 100 }
    }
}

impl ClusteringConfig {
    pub fn build(&self) -> Box<dyn ExampleClusterer> {
        match self.backend {
            ClusterBackend::None => Box::new(NoopClusterer),
            ClusterBackend::Drain => {
                Box::new(DrainClusterer::new(self.max_depth, self.min_similarity, self.max_children))
            }
        }
    }
}

impl AnalysisConfig {
    /// Reads the file named by `path` (or `LOGSIFT_CONFIG`) when present, then applies
    /// environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from));
        let mut config = match path {
            Some(p) => {
                info!(path = %p.display(), "loading configuration");
                Self::from_file(&p)?
            }
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    /// Applies `LOGSIFT_*` overrides looked up through `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("LOGSIFT_TOP_K") {
            let top_k = parse_env("LOGSIFT_TOP_K", &v)?;
            self.rarity.top_k = top_k;
            self.spikes.top_k = top_k;
        }
        if let Some(v) = lookup("LOGSIFT_WINDOW_SIZE") {
            self.spikes.window_size = parse_env("LOGSIFT_WINDOW_SIZE", &v)?;
        }
        if let Some(v) = lookup("LOGSIFT_THRESHOLD_MULT") {
            self.spikes.threshold_mult = parse_env("LOGSIFT_THRESHOLD_MULT", &v)?;
        }
        if let Some(v) = lookup("LOGSIFT_CLUSTER_BACKEND") {
            self.clustering.backend = parse_env("LOGSIFT_CLUSTER_BACKEND", &v)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.spikes.window_size == 0 {
            return Err(ConfigError::Invalid("spikes.window_size must be > 0".into()));
        }
        if !self.spikes.threshold_mult.is_finite() || self.spikes.threshold_mult < 0.0 {
            return Err(ConfigError::Invalid("spikes.threshold_mult must be a finite, non-negative number".into()));
        }
        if !(0.0..=1.0).contains(&self.clustering.min_similarity) {
            return Err(ConfigError::Invalid("clustering.min_similarity must be within [0, 1]".into()));
        }
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::Env { key: key.to_string(), value: value.to_string() })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_match_documented_values() {
        let cfg = AnalysisConfig::default();
        assert_eq!(cfg.rarity.top_k, 10);
        assert_eq!(cfg.spikes.window_size, 60);
        assert_eq!(cfg.spikes.threshold_mult, 2.0);
        assert_eq!(cfg.spikes.top_k, 10);
        assert_eq!(cfg.parse.sample_size, 50);
        assert_eq!(cfg.clustering.backend, ClusterBackend::None);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let cfg = AnalysisConfig::from_toml_str(
            r#"
            [spikes]
            window_size = 300

            [clustering]
            backend = "drain"
            "#,
        )
        .expect("partial toml should parse");
        assert_eq!(cfg.spikes.window_size, 300);
        assert_eq!(cfg.spikes.threshold_mult, 2.0);
        assert_eq!(cfg.rarity.top_k, 10);
        assert_eq!(cfg.clustering.backend, ClusterBackend::Drain);
    }

    #[test]
    fn toml_roundtrip() {
        let cfg = AnalysisConfig::default();
        let text = toml::to_string(&cfg).expect("serialize");
        let back = AnalysisConfig::from_toml_str(&text).expect("deserialize");
        assert_eq!(cfg, back);
    }

    #[test]
    fn unknown_backend_is_a_parse_error() {
        let err = AnalysisConfig::from_toml_str("[clustering]\nbackend = \"kmeans\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn env_overrides_apply() {
        let env: HashMap<&str, &str> = [
            ("LOGSIFT_TOP_K", "3"),
            ("LOGSIFT_WINDOW_SIZE", "120"),
            ("LOGSIFT_THRESHOLD_MULT", "3.5"),
            ("LOGSIFT_CLUSTER_BACKEND", "drain"),
        ]
        .into_iter()
        .collect();
        let mut cfg = AnalysisConfig::default();
        cfg.apply_overrides(|k| env.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(cfg.rarity.top_k, 3);
        assert_eq!(cfg.spikes.top_k, 3);
        assert_eq!(cfg.spikes.window_size, 120);
        assert_eq!(cfg.spikes.threshold_mult, 3.5);
        assert_eq!(cfg.clustering.backend, ClusterBackend::Drain);
    }

    #[test]
    fn malformed_env_value_is_reported() {
        let mut cfg = AnalysisConfig::default();
        let err = cfg
            .apply_overrides(|k| (k == "LOGSIFT_WINDOW_SIZE").then(|| "soon".to_string()))
            .unwrap_err();
        match err {
            ConfigError::Env { key, value } => {
                assert_eq!(key, "LOGSIFT_WINDOW_SIZE");
                assert_eq!(value, "soon");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn validate_rejects_zero_window_and_bad_multiplier() {
        let mut cfg = AnalysisConfig::default();
        cfg.spikes.window_size = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = AnalysisConfig::default();
        cfg.spikes.threshold_mult = -1.0;
        assert!(cfg.validate().is_err());

        let mut cfg = AnalysisConfig::default();
        cfg.spikes.threshold_mult = f64::NAN;
        assert!(cfg.validate().is_err());

        let mut cfg = AnalysisConfig::default();
        cfg.clustering.min_similarity = 1.5;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn missing_file_reports_path() {
        let err = AnalysisConfig::from_file(Path::new("/nonexistent/logsift.toml")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/logsift.toml"));
    }
}
