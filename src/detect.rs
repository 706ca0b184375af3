//! Detection run orchestration.
//!
//! # Pipeline
//!
//! ```text
//! target ──fetch──▶ CorpusSnapshot ─┐
//!                                   ├─▶ candidate pairs ─▶ score (rayon) ─▶ ComparisonResult ─┐
//! comparisons ──fetch (concurrent)──┘                                                          ├─▶ DetectionReport
//!        └── failures / self-comparison ──▶ SkippedCorpus ─────────────────────────────────────┘
//! ```
//!
//! The target fetch is the only fetch that can fail the run. Comparison
//! corpora are fetched concurrently; each failure is logged and recorded as
//! skipped. Scoring runs on the rayon pool inside `spawn_blocking` and polls
//! the cancel token between pairs.
//!
//! Cancellation never yields a partial report: the run returns
//! [`DetectError::Cancelled`] naming the phase it was in.

use rayon::prelude::*;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::aggregate::{assemble_report, summarize_corpus};
use crate::cancel::CancelToken;
use crate::config::Config;
use crate::connector_github::GithubClient;
use crate::error::{ConfigError, DetectError, FetchError};
use crate::models::{ComparisonResult, CorpusSnapshot, DetectionReport, SkippedCorpus};
use crate::pairing::candidate_pairs;
use crate::progress::{DetectProgressEvent, DetectProgressReporter};
use crate::risk::RiskThresholds;
use crate::similarity::{PreparedFile, Scorer};
use crate::source::{open_source, CorpusRef, CorpusSource};

const SELF_COMPARISON: &str = "self-comparison";
const PROGRESS_EVERY: u64 = 1_000;

/// Scoring and classification parameters for a run.
#[derive(Debug, Clone, Copy)]
pub struct DetectSettings {
    pub scorer: Scorer,
    pub risk: RiskThresholds,
}

impl Default for DetectSettings {
    fn default() -> Self {
        Self {
            scorer: Scorer::default(),
            risk: RiskThresholds::default(),
        }
    }
}

impl DetectSettings {
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        Ok(Self {
            scorer: Scorer::new(config.thresholds.similarity, config.thresholds.high_confidence),
            risk: config.risk_thresholds()?,
        })
    }
}

/// Run detection for references given as strings (paths, `owner/repo`, or URLs).
///
/// A comparison reference that cannot be parsed is recorded as skipped; an
/// unparseable target fails the run.
pub async fn run_detection(
    config: &Config,
    target: &str,
    comparisons: &[String],
    cancel: &CancelToken,
    progress: Arc<dyn DetectProgressReporter>,
) -> Result<DetectionReport, DetectError> {
    let settings = DetectSettings::from_config(config)?;
    let target_failure = |source: FetchError| DetectError::TargetFetch {
        corpus: target.to_string(),
        source,
    };

    let client = GithubClient::from_config(&config.fetch).map_err(target_failure)?;
    let target_ref = CorpusRef::parse(target).map_err(target_failure)?;
    let target_source = open_source(&target_ref, config, &client);

    let mut sources = Vec::with_capacity(comparisons.len());
    let mut unresolved = Vec::new();
    for reference in comparisons {
        match CorpusRef::parse(reference) {
            Ok(parsed) => sources.push(open_source(&parsed, config, &client)),
            Err(e) => {
                warn!(corpus = %reference, error = %e, "skipping comparison corpus");
                progress.report(DetectProgressEvent::Skipped {
                    corpus: reference.clone(),
                    reason: e.to_string(),
                });
                unresolved.push(SkippedCorpus {
                    identifier: reference.clone(),
                    reason: e.to_string(),
                });
            }
        }
    }

    execute(&settings, target_source, sources, unresolved, cancel, progress).await
}

/// Run detection over already-constructed sources.
pub async fn run_detection_with_sources(
    settings: &DetectSettings,
    target: Arc<dyn CorpusSource>,
    comparisons: Vec<Arc<dyn CorpusSource>>,
    cancel: &CancelToken,
    progress: Arc<dyn DetectProgressReporter>,
) -> Result<DetectionReport, DetectError> {
    execute(settings, target, comparisons, Vec::new(), cancel, progress).await
}

async fn execute(
    settings: &DetectSettings,
    target: Arc<dyn CorpusSource>,
    comparisons: Vec<Arc<dyn CorpusSource>>,
    mut skipped: Vec<SkippedCorpus>,
    cancel: &CancelToken,
    progress: Arc<dyn DetectProgressReporter>,
) -> Result<DetectionReport, DetectError> {
    // ── Target ──
    info!(corpus = %target.identifier(), "fetching target corpus");
    progress.report(DetectProgressEvent::Fetching {
        corpus: target.identifier().to_string(),
    });
    let fetched = tokio::select! {
        _ = cancel.cancelled() => return Err(DetectError::Cancelled { phase: "fetch" }),
        fetched = target.fetch(cancel) => fetched,
    };
    let target_snapshot = match fetched {
        Ok(snapshot) => snapshot,
        Err(FetchError::Cancelled) => return Err(DetectError::Cancelled { phase: "fetch" }),
        Err(source) => {
            return Err(DetectError::TargetFetch {
                corpus: target.identifier().to_string(),
                source,
            })
        }
    };
    report_fetched(progress.as_ref(), &target_snapshot);

    // ── Comparisons ──
    let mut tasks = JoinSet::new();
    for (idx, source) in comparisons.into_iter().enumerate() {
        if source.same_corpus(target.as_ref()) {
            warn!(corpus = %source.identifier(), "comparison corpus is the target, skipping");
            progress.report(DetectProgressEvent::Skipped {
                corpus: source.identifier().to_string(),
                reason: SELF_COMPARISON.to_string(),
            });
            skipped.push(SkippedCorpus {
                identifier: source.identifier().to_string(),
                reason: SELF_COMPARISON.to_string(),
            });
            continue;
        }
        let cancel = cancel.clone();
        let progress = Arc::clone(&progress);
        tasks.spawn(async move {
            progress.report(DetectProgressEvent::Fetching {
                corpus: source.identifier().to_string(),
            });
            let result = source.fetch(&cancel).await;
            (idx, source.identifier().to_string(), result)
        });
    }

    let mut snapshots: Vec<(usize, CorpusSnapshot)> = Vec::new();
    loop {
        let joined = tokio::select! {
            _ = cancel.cancelled() => {
                tasks.abort_all();
                return Err(DetectError::Cancelled { phase: "fetch" });
            }
            joined = tasks.join_next() => joined,
        };
        let Some(joined) = joined else {
            break;
        };
        match joined {
            Ok((idx, _, Ok(snapshot))) => {
                report_fetched(progress.as_ref(), &snapshot);
                snapshots.push((idx, snapshot));
            }
            Ok((_, _, Err(FetchError::Cancelled))) => {
                tasks.abort_all();
                return Err(DetectError::Cancelled { phase: "fetch" });
            }
            Ok((_, identifier, Err(e))) => {
                warn!(corpus = %identifier, error = %e, "comparison corpus failed, skipping");
                progress.report(DetectProgressEvent::Skipped {
                    corpus: identifier.clone(),
                    reason: e.to_string(),
                });
                skipped.push(SkippedCorpus {
                    identifier,
                    reason: e.to_string(),
                });
            }
            Err(e) => {
                tasks.abort_all();
                return Err(DetectError::Worker(e.to_string()));
            }
        }
    }
    snapshots.sort_by_key(|(idx, _)| *idx);
    let snapshots: Vec<CorpusSnapshot> = snapshots.into_iter().map(|(_, s)| s).collect();

    // ── Scoring ──
    if cancel.is_cancelled() {
        return Err(DetectError::Cancelled { phase: "scoring" });
    }
    let scorer = settings.scorer;
    let worker_cancel = cancel.clone();
    let worker_progress = Arc::clone(&progress);
    let (target_snapshot, results) = tokio::task::spawn_blocking(move || {
        let results = score_corpora(
            &target_snapshot,
            &snapshots,
            &scorer,
            &worker_cancel,
            worker_progress.as_ref(),
        );
        (target_snapshot, results)
    })
    .await
    .map_err(|e| DetectError::Worker(e.to_string()))?;
    let results = results.ok_or(DetectError::Cancelled { phase: "scoring" })?;

    let report = assemble_report(&target_snapshot, results, skipped, &scorer, settings.risk);
    info!(
        risk = %report.risk_level(),
        identical = report.summary().identical_count,
        matches = report.summary().match_count,
        skipped = report.summary().corpora_skipped,
        "detection complete"
    );
    Ok(report)
}

fn report_fetched(progress: &dyn DetectProgressReporter, snapshot: &CorpusSnapshot) {
    info!(
        corpus = %snapshot.identifier(),
        files = snapshot.total_files(),
        lines = snapshot.total_lines(),
        "fetched corpus"
    );
    progress.report(DetectProgressEvent::Fetched {
        corpus: snapshot.identifier().to_string(),
        files: snapshot.total_files() as u64,
        lines: snapshot.total_lines() as u64,
    });
}

/// Score the target against every comparison snapshot.
///
/// Returns `None` if `cancel` fired before scoring finished.
pub fn score_corpora(
    target: &CorpusSnapshot,
    comparisons: &[CorpusSnapshot],
    scorer: &Scorer,
    cancel: &CancelToken,
    progress: &dyn DetectProgressReporter,
) -> Option<Vec<ComparisonResult>> {
    let prepared_target: Vec<PreparedFile<'_>> =
        target.files().par_iter().map(PreparedFile::new).collect();
    comparisons
        .iter()
        .map(|snapshot| score_corpus(target, &prepared_target, snapshot, scorer, cancel, progress))
        .collect()
}

fn score_corpus(
    target: &CorpusSnapshot,
    prepared_target: &[PreparedFile<'_>],
    snapshot: &CorpusSnapshot,
    scorer: &Scorer,
    cancel: &CancelToken,
    progress: &dyn DetectProgressReporter,
) -> Option<ComparisonResult> {
    let corpus_id = snapshot.identifier();
    let pairs = candidate_pairs(target.files(), snapshot.files());
    let total = pairs.len() as u64;
    info!(corpus = %corpus_id, pairs = total, "scoring corpus");
    progress.report(DetectProgressEvent::Scoring {
        corpus: corpus_id.to_string(),
        n: 0,
        total,
    });

    let prepared: Vec<PreparedFile<'_>> =
        snapshot.files().par_iter().map(PreparedFile::new).collect();
    let done = AtomicU64::new(0);
    let outcomes: Option<Vec<_>> = pairs
        .par_iter()
        .map(|&(t, c)| {
            if cancel.is_cancelled() {
                return None;
            }
            let outcome = scorer.score_prepared(&prepared_target[t], &prepared[c], corpus_id);
            let n = done.fetch_add(1, Ordering::Relaxed) + 1;
            if n % PROGRESS_EVERY == 0 && n < total {
                progress.report(DetectProgressEvent::Scoring {
                    corpus: corpus_id.to_string(),
                    n,
                    total,
                });
            }
            Some(outcome)
        })
        .collect();
    let outcomes = outcomes?;

    if total > 0 {
        progress.report(DetectProgressEvent::Scoring {
            corpus: corpus_id.to_string(),
            n: total,
            total,
        });
    }
    Some(summarize_corpus(snapshot.stats(), outcomes))
}
