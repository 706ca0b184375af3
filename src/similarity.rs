//! Pair scoring.
//!
//! `ratio(a, b) = 2 * LCS(a, b) / (|a| + |b|)` over Unicode scalar values.
//! LCS length is symmetric, so the ratio is too, and `ratio(a, a) == 1.0`.
//! Two empty strings score 1.0.
//!
//! LCS length is computed with the bit-parallel recurrence of Allison-Dix /
//! Hyyrö: one machine word per 64 characters of the shorter input, so the
//! cost is `O(|a| * |b| / 64)` with no quadratic table.

use std::collections::HashMap;

use crate::models::{FileRecord, IdenticalRecord, MatchRecord};
use crate::normalize::normalize;

/// Symmetric LCS similarity in `[0, 1]`.
pub fn ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    ratio_chars(&a, &b)
}

pub fn ratio_chars(a: &[char], b: &[char]) -> f64 {
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    (2 * lcs_len(a, b)) as f64 / total as f64
}

/// Length of the longest common subsequence.
pub fn lcs_len(a: &[char], b: &[char]) -> usize {
    if a.is_empty() || b.is_empty() {
        return 0;
    }
    let (pattern, text) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    let words = pattern.len().div_ceil(64);

    let mut masks: HashMap<char, Vec<u64>> = HashMap::new();
    for (i, &c) in pattern.iter().enumerate() {
        masks.entry(c).or_insert_with(|| vec![0; words])[i / 64] |= 1u64 << (i % 64);
    }

    // Zero bits in `v` mark pattern positions that extend the LCS.
    let mut v = vec![u64::MAX; words];
    for c in text {
        let Some(m) = masks.get(c) else {
            continue;
        };
        let mut carry = false;
        for (vw, &mw) in v.iter_mut().zip(m.iter()) {
            let u = *vw & mw;
            let (sum, c1) = vw.overflowing_add(u);
            let (sum, c2) = sum.overflowing_add(carry as u64);
            carry = c1 || c2;
            *vw = sum | (*vw & !mw);
        }
    }

    let tail_bits = pattern.len() % 64;
    v.iter()
        .enumerate()
        .map(|(w, word)| {
            let mask = if w == words - 1 && tail_bits != 0 {
                (1u64 << tail_bits) - 1
            } else {
                u64::MAX
            };
            (!word & mask).count_ones() as usize
        })
        .sum()
}

/// A file prepared for scoring: the stored record plus its normalized text.
///
/// The record is borrowed untouched; only the transient normalized form is
/// owned here.
pub struct PreparedFile<'a> {
    pub record: &'a FileRecord,
    normalized: Vec<char>,
}

impl<'a> PreparedFile<'a> {
    pub fn new(record: &'a FileRecord) -> Self {
        Self {
            record,
            normalized: normalize(record.content()).chars().collect(),
        }
    }
}

/// Result of scoring one candidate pair.
#[derive(Debug, Clone, PartialEq)]
pub enum PairOutcome {
    Identical(IdenticalRecord),
    Match(MatchRecord),
    BelowThreshold { similarity: f64 },
}

impl PairOutcome {
    /// Identical pairs count as 1.0 toward the corpus average.
    pub fn similarity(&self) -> f64 {
        match self {
            PairOutcome::Identical(_) => 1.0,
            PairOutcome::Match(m) => m.similarity,
            PairOutcome::BelowThreshold { similarity } => *similarity,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Scorer {
    pub similarity_threshold: f64,
    pub high_confidence_threshold: f64,
}

impl Default for Scorer {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.7,
            high_confidence_threshold: 0.9,
        }
    }
}

impl Scorer {
    pub fn new(similarity_threshold: f64, high_confidence_threshold: f64) -> Self {
        Self {
            similarity_threshold,
            high_confidence_threshold,
        }
    }

    /// Score raw records, normalizing both sides on the fly.
    pub fn score(
        &self,
        target: &FileRecord,
        comparison: &FileRecord,
        comparison_corpus_id: &str,
    ) -> PairOutcome {
        self.score_prepared(
            &PreparedFile::new(target),
            &PreparedFile::new(comparison),
            comparison_corpus_id,
        )
    }

    pub fn score_prepared(
        &self,
        target: &PreparedFile<'_>,
        comparison: &PreparedFile<'_>,
        comparison_corpus_id: &str,
    ) -> PairOutcome {
        let (t, c) = (target.record, comparison.record);
        if t.fingerprint() == c.fingerprint() {
            return PairOutcome::Identical(IdenticalRecord {
                target_path: t.path().to_string(),
                comparison_path: c.path().to_string(),
                comparison_corpus_id: comparison_corpus_id.to_string(),
                target_lines: t.line_count(),
                comparison_lines: c.line_count(),
            });
        }

        let similarity = ratio_chars(&target.normalized, &comparison.normalized);
        if similarity >= self.similarity_threshold {
            PairOutcome::Match(MatchRecord {
                target_path: t.path().to_string(),
                comparison_path: c.path().to_string(),
                comparison_corpus_id: comparison_corpus_id.to_string(),
                similarity,
                target_lines: t.line_count(),
                comparison_lines: c.line_count(),
            })
        } else {
            PairOutcome::BelowThreshold { similarity }
        }
    }
}
