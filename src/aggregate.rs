//! Result aggregation and report assembly.
//!
//! Scoring produces one [`PairOutcome`] per candidate pair, in whatever order
//! the workers finish. Everything here is order-insensitive on input and
//! sorts explicitly on output, so the report for a given pair of snapshots is
//! always the same apart from `generated_at`.

use chrono::Utc;
use std::collections::HashMap;

use crate::models::{
    ComparisonResult, CorpusSnapshot, CorpusStats, DetectionReport, ReportSummary,
    SkippedCorpus, ThresholdSummary,
};
use crate::risk::RiskThresholds;
use crate::similarity::{PairOutcome, Scorer};

/// Fold the outcomes for one comparison corpus into a [`ComparisonResult`].
///
/// `average_similarity` is the mean over every outcome, below-threshold
/// pairs included, and 0.0 when there are none.
pub fn summarize_corpus(corpus: CorpusStats, outcomes: Vec<PairOutcome>) -> ComparisonResult {
    let pairs_scored = outcomes.len();
    let average_similarity = if pairs_scored == 0 {
        0.0
    } else {
        outcomes.iter().map(PairOutcome::similarity).sum::<f64>() / pairs_scored as f64
    };

    let mut matches = Vec::new();
    let mut identical = Vec::new();
    for outcome in outcomes {
        match outcome {
            PairOutcome::Identical(record) => identical.push(record),
            PairOutcome::Match(record) => matches.push(record),
            PairOutcome::BelowThreshold { .. } => {}
        }
    }
    matches.sort_by(|a, b| {
        (a.target_path.as_str(), a.comparison_path.as_str())
            .cmp(&(b.target_path.as_str(), b.comparison_path.as_str()))
    });
    identical.sort_by(|a, b| {
        (a.target_path.as_str(), a.comparison_path.as_str())
            .cmp(&(b.target_path.as_str(), b.comparison_path.as_str()))
    });

    ComparisonResult {
        corpus,
        matches,
        identical,
        pairs_scored,
        average_similarity,
    }
}

/// Build the final report. The risk level is derived here and nowhere else.
pub fn assemble_report(
    target: &CorpusSnapshot,
    mut comparisons: Vec<ComparisonResult>,
    mut skipped: Vec<SkippedCorpus>,
    scorer: &Scorer,
    risk: RiskThresholds,
) -> DetectionReport {
    comparisons.sort_by(|a, b| a.corpus.identifier.cmp(&b.corpus.identifier));
    skipped.sort_by(|a, b| a.identifier.cmp(&b.identifier));

    // Per-corpus lists are already sorted by (target, comparison) path, so
    // concatenating in corpus order yields the global order.
    let matches: Vec<_> = comparisons
        .iter()
        .flat_map(|c| c.matches.iter().cloned())
        .collect();
    let identical: Vec<_> = comparisons
        .iter()
        .flat_map(|c| c.identical.iter().cloned())
        .collect();

    let high_confidence_match_count = matches
        .iter()
        .filter(|m| m.is_high_confidence(scorer.high_confidence_threshold))
        .count();
    let risk_level = risk.classify(identical.len(), high_confidence_match_count);

    let summary = ReportSummary {
        corpora_compared: comparisons.len(),
        corpora_skipped: skipped.len(),
        identical_count: identical.len(),
        match_count: matches.len(),
        high_confidence_match_count,
    };

    DetectionReport {
        target: target.stats(),
        primary_language: primary_language(target).map(str::to_string),
        comparisons,
        skipped,
        matches,
        identical,
        summary,
        risk_level,
        thresholds: ThresholdSummary {
            similarity: scorer.similarity_threshold,
            high_confidence: scorer.high_confidence_threshold,
            risk,
        },
        generated_at: Utc::now(),
    }
}

/// Language of the most frequent extension in the snapshot, if it is one we
/// can name. Ties go to the alphabetically first extension.
pub fn primary_language(snapshot: &CorpusSnapshot) -> Option<&'static str> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for file in snapshot.files() {
        if let Some(ext) = file.extension() {
            *counts.entry(ext).or_default() += 1;
        }
    }
    let (ext, _) = counts
        .into_iter()
        .max_by(|(ea, ca), (eb, cb)| ca.cmp(cb).then_with(|| eb.cmp(ea)))?;
    language_name(&ext)
}

fn language_name(ext: &str) -> Option<&'static str> {
    let name = match ext {
        ".py" => "Python",
        ".js" | ".jsx" => "JavaScript",
        ".ts" | ".tsx" => "TypeScript",
        ".java" => "Java",
        ".cpp" | ".cc" | ".hpp" => "C++",
        ".c" | ".h" => "C",
        ".cs" => "C#",
        ".php" => "PHP",
        ".rb" => "Ruby",
        ".go" => "Go",
        ".rs" => "Rust",
        ".swift" => "Swift",
        ".kt" => "Kotlin",
        ".scala" => "Scala",
        ".dart" => "Dart",
        ".vue" => "Vue",
        ".svelte" => "Svelte",
        ".sh" => "Shell",
        ".sql" => "SQL",
        _ => return None,
    };
    Some(name)
}
