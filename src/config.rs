//! TOML configuration for detection runs.
//!
//! Every section is optional; `Config::default()` is a valid configuration
//! that scans common source extensions with the 0.7 / 0.9 thresholds.
//! [`load_config`] parses and validates in one step, so a `Config` obtained
//! from it is always usable by the engine.

use serde::Deserialize;
use std::collections::BTreeSet;
use std::path::Path;
use std::time::Duration;

use crate::error::ConfigError;
use crate::risk::{RiskPreset, RiskThresholds};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub scan: ScanConfig,
    #[serde(default)]
    pub thresholds: ThresholdConfig,
    #[serde(default)]
    pub risk: RiskConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub corpora: CorporaConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ScanConfig {
    #[serde(default = "default_code_extensions")]
    pub code_extensions: BTreeSet<String>,
    /// Minimum raw content length, in characters.
    #[serde(default = "default_min_file_size")]
    pub min_file_size: usize,
    /// Directory names skipped during local traversal (hidden dirs are always skipped).
    #[serde(default = "default_exclude_dirs")]
    pub exclude_dirs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    #[serde(default)]
    pub max_files_per_corpus: Option<usize>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            code_extensions: default_code_extensions(),
            min_file_size: default_min_file_size(),
            exclude_dirs: default_exclude_dirs(),
            exclude_globs: Vec::new(),
            max_files_per_corpus: None,
        }
    }
}

fn default_code_extensions() -> BTreeSet<String> {
    [
        ".py", ".js", ".ts", ".jsx", ".tsx", ".java", ".cpp", ".c", ".h", ".cs", ".php", ".rb",
        ".go", ".rs", ".swift", ".kt", ".scala", ".vue", ".svelte", ".dart", ".sh", ".sql",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}
fn default_min_file_size() -> usize {
    50
}
fn default_exclude_dirs() -> Vec<String> {
    ["node_modules", "__pycache__", "venv", "env", "target", "vendor"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ThresholdConfig {
    #[serde(default = "default_similarity")]
    pub similarity: f64,
    #[serde(default = "default_high_confidence")]
    pub high_confidence: f64,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            similarity: default_similarity(),
            high_confidence: default_high_confidence(),
        }
    }
}

fn default_similarity() -> f64 {
    0.7
}
fn default_high_confidence() -> f64 {
    0.9
}

/// Risk cutoffs. A preset supplies all four values; explicit fields win.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct RiskConfig {
    #[serde(default)]
    pub preset: Option<String>,
    #[serde(default)]
    pub critical_identical: Option<usize>,
    #[serde(default)]
    pub critical_high_confidence: Option<usize>,
    #[serde(default)]
    pub high_high_confidence: Option<usize>,
    #[serde(default)]
    pub medium_high_confidence: Option<usize>,
}

impl RiskConfig {
    pub fn resolve(&self) -> Result<RiskThresholds, ConfigError> {
        let base = match &self.preset {
            Some(name) => name
                .parse::<RiskPreset>()
                .map_err(|_| ConfigError::UnknownPreset(name.clone()))?
                .thresholds(),
            None => RiskPreset::Enhanced.thresholds(),
        };
        let resolved = RiskThresholds {
            critical_identical: self.critical_identical.unwrap_or(base.critical_identical),
            critical_high_confidence: self
                .critical_high_confidence
                .unwrap_or(base.critical_high_confidence),
            high_high_confidence: self
                .high_high_confidence
                .unwrap_or(base.high_high_confidence),
            medium_high_confidence: self
                .medium_high_confidence
                .unwrap_or(base.medium_high_confidence),
        };
        resolved.validate()?;
        Ok(resolved)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct FetchConfig {
    #[serde(default = "default_max_concurrent_fetches")]
    pub max_concurrent_fetches: usize,
    #[serde(default = "default_timeout_secs")]
    pub per_request_timeout_secs: u64,
    #[serde(default = "default_backoff_secs")]
    pub rate_limit_backoff_secs: u64,
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    /// Name of the environment variable holding the API token.
    #[serde(default = "default_token_env")]
    pub token_env: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_concurrent_fetches: default_max_concurrent_fetches(),
            per_request_timeout_secs: default_timeout_secs(),
            rate_limit_backoff_secs: default_backoff_secs(),
            api_base_url: default_api_base_url(),
            token_env: default_token_env(),
        }
    }
}

impl FetchConfig {
    pub fn per_request_timeout(&self) -> Duration {
        Duration::from_secs(self.per_request_timeout_secs)
    }

    pub fn rate_limit_backoff(&self) -> Duration {
        Duration::from_secs(self.rate_limit_backoff_secs)
    }
}

fn default_max_concurrent_fetches() -> usize {
    8
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_backoff_secs() -> u64 {
    60
}
fn default_api_base_url() -> String {
    "https://api.github.com".to_string()
}
fn default_token_env() -> String {
    "GITHUB_TOKEN".to_string()
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct CorporaConfig {
    #[serde(default)]
    pub target: Option<String>,
    #[serde(default)]
    pub comparisons: Vec<String>,
    /// Every child directory of this path becomes a local comparison corpus.
    #[serde(default)]
    pub local_base: Option<String>,
}

impl Config {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.validated()
    }

    /// Normalize extensions and check every threshold.
    pub fn validated(mut self) -> Result<Self, ConfigError> {
        self.scan.code_extensions = self
            .scan
            .code_extensions
            .iter()
            .map(|ext| normalize_extension(ext))
            .filter(|ext| ext.len() > 1)
            .collect();
        if self.scan.code_extensions.is_empty() {
            return Err(ConfigError::EmptyExtensions);
        }

        check_unit("thresholds.similarity", self.thresholds.similarity)?;
        check_unit("thresholds.high_confidence", self.thresholds.high_confidence)?;
        if self.thresholds.high_confidence < self.thresholds.similarity {
            return Err(ConfigError::ThresholdOrder {
                similarity: self.thresholds.similarity,
                high: self.thresholds.high_confidence,
            });
        }

        if self.fetch.max_concurrent_fetches == 0 {
            return Err(ConfigError::Zero("fetch.max_concurrent_fetches"));
        }
        if self.fetch.per_request_timeout_secs == 0 {
            return Err(ConfigError::Zero("fetch.per_request_timeout_secs"));
        }
        if self.scan.max_files_per_corpus == Some(0) {
            return Err(ConfigError::Zero("scan.max_files_per_corpus"));
        }

        for pattern in &self.scan.exclude_globs {
            globset::Glob::new(pattern).map_err(|source| ConfigError::Glob {
                pattern: pattern.clone(),
                source,
            })?;
        }

        self.risk.resolve()?;
        Ok(self)
    }

    pub fn risk_thresholds(&self) -> Result<RiskThresholds, ConfigError> {
        self.risk.resolve()
    }
}

fn check_unit(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::ThresholdOutOfRange { name, value })
    }
}

/// `"PY"`, `"py"` and `".py"` all become `".py"`.
pub fn normalize_extension(ext: &str) -> String {
    let trimmed = ext.trim().trim_start_matches('.').to_lowercase();
    format!(".{}", trimmed)
}

pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    Config::from_toml_str(&content)
}
