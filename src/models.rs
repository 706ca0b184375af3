//! Core data types that flow through a detection run.
//!
//! A [`CorpusSnapshot`] owns its [`FileRecord`]s. Scoring reads them through
//! shared references and emits [`MatchRecord`]s and [`IdenticalRecord`]s,
//! which the aggregator folds into a [`DetectionReport`].

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::Path;

use crate::risk::{RiskLevel, RiskThresholds};

/// SHA-256 digest of a file's raw bytes.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    pub fn of(bytes: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        Fingerprint(hasher.finalize().into())
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({})", self)
    }
}

impl Serialize for Fingerprint {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// One catalogued file. Immutable once built.
#[derive(Debug, Clone)]
pub struct FileRecord {
    path: String,
    content: String,
    fingerprint: Fingerprint,
    byte_size: usize,
    line_count: usize,
}

impl FileRecord {
    pub fn new(path: impl Into<String>, content: String) -> Self {
        let fingerprint = Fingerprint::of(content.as_bytes());
        let byte_size = content.len();
        let line_count = content.lines().count();
        Self {
            path: path.into(),
            content,
            fingerprint,
            byte_size,
            line_count,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn fingerprint(&self) -> Fingerprint {
        self.fingerprint
    }

    pub fn byte_size(&self) -> usize {
        self.byte_size
    }

    pub fn line_count(&self) -> usize {
        self.line_count
    }

    /// Lowercased extension including the dot, e.g. `".py"`.
    pub fn extension(&self) -> Option<String> {
        path_extension(&self.path)
    }

    pub fn base_name(&self) -> &str {
        base_name(&self.path)
    }
}

pub(crate) fn path_extension(path: &str) -> Option<String> {
    Path::new(path)
        .extension()
        .map(|ext| format!(".{}", ext.to_string_lossy().to_lowercase()))
}

pub(crate) fn base_name(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    Local,
    Remote,
}

impl Origin {
    pub fn as_str(&self) -> &'static str {
        match self {
            Origin::Local => "local",
            Origin::Remote => "remote",
        }
    }
}

/// All files fetched for one corpus. Totals are derived from the file list.
#[derive(Debug, Clone)]
pub struct CorpusSnapshot {
    identifier: String,
    display_name: String,
    origin: Origin,
    files: Vec<FileRecord>,
    total_lines: usize,
}

impl CorpusSnapshot {
    pub fn new(
        identifier: impl Into<String>,
        display_name: impl Into<String>,
        origin: Origin,
        files: Vec<FileRecord>,
    ) -> Self {
        let total_lines = files.iter().map(FileRecord::line_count).sum();
        Self {
            identifier: identifier.into(),
            display_name: display_name.into(),
            origin,
            files,
            total_lines,
        }
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn origin(&self) -> Origin {
        self.origin
    }

    pub fn files(&self) -> &[FileRecord] {
        &self.files
    }

    pub fn total_files(&self) -> usize {
        self.files.len()
    }

    pub fn total_lines(&self) -> usize {
        self.total_lines
    }

    pub fn push(&mut self, file: FileRecord) {
        self.total_lines += file.line_count();
        self.files.push(file);
    }

    pub fn stats(&self) -> CorpusStats {
        CorpusStats {
            identifier: self.identifier.clone(),
            display_name: self.display_name.clone(),
            origin: self.origin,
            total_files: self.total_files(),
            total_lines: self.total_lines,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CorpusStats {
    pub identifier: String,
    pub display_name: String,
    pub origin: Origin,
    pub total_files: usize,
    pub total_lines: usize,
}

/// A pair whose similarity crossed the suspicious threshold.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchRecord {
    pub target_path: String,
    pub comparison_path: String,
    pub comparison_corpus_id: String,
    pub similarity: f64,
    pub target_lines: usize,
    pub comparison_lines: usize,
}

impl MatchRecord {
    pub fn is_high_confidence(&self, threshold: f64) -> bool {
        self.similarity >= threshold
    }
}

/// A pair with equal fingerprints. Similarity is implicitly 1.0.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IdenticalRecord {
    pub target_path: String,
    pub comparison_path: String,
    pub comparison_corpus_id: String,
    pub target_lines: usize,
    pub comparison_lines: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonResult {
    pub corpus: CorpusStats,
    pub matches: Vec<MatchRecord>,
    pub identical: Vec<IdenticalRecord>,
    pub pairs_scored: usize,
    /// Mean over every scored pair, including those below threshold.
    pub average_similarity: f64,
}

impl ComparisonResult {
    pub fn high_confidence_count(&self, threshold: f64) -> usize {
        self.matches
            .iter()
            .filter(|m| m.is_high_confidence(threshold))
            .count()
    }
}

/// A comparison corpus that produced no result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedCorpus {
    pub identifier: String,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ThresholdSummary {
    pub similarity: f64,
    pub high_confidence: f64,
    pub risk: RiskThresholds,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSummary {
    pub corpora_compared: usize,
    pub corpora_skipped: usize,
    pub identical_count: usize,
    pub match_count: usize,
    pub high_confidence_match_count: usize,
}

/// Outcome of a complete run. Built only by [`crate::aggregate::assemble_report`],
/// which derives `risk_level` from the global lists.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionReport {
    pub(crate) target: CorpusStats,
    pub(crate) primary_language: Option<String>,
    pub(crate) comparisons: Vec<ComparisonResult>,
    pub(crate) skipped: Vec<SkippedCorpus>,
    pub(crate) matches: Vec<MatchRecord>,
    pub(crate) identical: Vec<IdenticalRecord>,
    pub(crate) summary: ReportSummary,
    pub(crate) risk_level: RiskLevel,
    pub(crate) thresholds: ThresholdSummary,
    pub(crate) generated_at: DateTime<Utc>,
}

impl DetectionReport {
    pub fn target(&self) -> &CorpusStats {
        &self.target
    }

    pub fn primary_language(&self) -> Option<&str> {
        self.primary_language.as_deref()
    }

    pub fn comparisons(&self) -> &[ComparisonResult] {
        &self.comparisons
    }

    pub fn skipped(&self) -> &[SkippedCorpus] {
        &self.skipped
    }

    pub fn matches(&self) -> &[MatchRecord] {
        &self.matches
    }

    pub fn identical(&self) -> &[IdenticalRecord] {
        &self.identical
    }

    pub fn high_confidence_matches(&self) -> impl Iterator<Item = &MatchRecord> {
        let threshold = self.thresholds.high_confidence;
        self.matches
            .iter()
            .filter(move |m| m.is_high_confidence(threshold))
    }

    pub fn summary(&self) -> &ReportSummary {
        &self.summary
    }

    pub fn risk_level(&self) -> RiskLevel {
        self.risk_level
    }

    pub fn thresholds(&self) -> &ThresholdSummary {
        &self.thresholds
    }

    pub fn generated_at(&self) -> DateTime<Utc> {
        self.generated_at
    }
}
