//! Detection progress reporting.
//!
//! Reports observable progress during `clonescan scan` so users see which
//! corpus is being fetched, how many files it yielded, and how far scoring
//! has got. Progress is emitted on **stderr** so stdout remains parseable
//! when `--json` is used.

use std::io::Write;
use std::sync::Arc;

/// A single progress event.
#[derive(Clone, Debug, PartialEq)]
pub enum DetectProgressEvent {
    /// A corpus fetch has started. Total unknown.
    Fetching { corpus: String },
    /// A corpus fetch finished.
    Fetched {
        corpus: String,
        files: u64,
        lines: u64,
    },
    /// A comparison corpus was dropped from the run.
    Skipped { corpus: String, reason: String },
    /// Scoring against one comparison corpus: n pairs out of total.
    Scoring {
        corpus: String,
        n: u64,
        total: u64,
    },
}

/// Reports detection progress. Implementations write to stderr (human or JSON).
pub trait DetectProgressReporter: Send + Sync {
    fn report(&self, event: DetectProgressEvent);
}

/// Human-friendly progress on stderr: "scan octo/hello  scoring  1,234 / 5,000 pairs".
pub struct StderrProgress;

impl DetectProgressReporter for StderrProgress {
    fn report(&self, event: DetectProgressEvent) {
        let line = match &event {
            DetectProgressEvent::Fetching { corpus } => {
                format!("scan {}  fetching...\n", corpus)
            }
            DetectProgressEvent::Fetched {
                corpus,
                files,
                lines,
            } => format!(
                "scan {}  fetched  {} files, {} lines\n",
                corpus,
                format_number(*files),
                format_number(*lines)
            ),
            DetectProgressEvent::Skipped { corpus, reason } => {
                format!("scan {}  skipped: {}\n", corpus, reason)
            }
            DetectProgressEvent::Scoring { corpus, n, total } => format!(
                "scan {}  scoring  {} / {} pairs\n",
                corpus,
                format_number(*n),
                format_number(*total)
            ),
        };
        let mut stderr = std::io::stderr().lock();
        let _ = stderr.write_all(line.as_bytes());
        let _ = stderr.flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl DetectProgressReporter for JsonProgress {
    fn report(&self, event: DetectProgressEvent) {
        let obj = match &event {
            DetectProgressEvent::Fetching { corpus } => serde_json::json!({
                "event": "progress",
                "corpus": corpus,
                "phase": "fetching"
            }),
            DetectProgressEvent::Fetched {
                corpus,
                files,
                lines,
            } => serde_json::json!({
                "event": "progress",
                "corpus": corpus,
                "phase": "fetched",
                "files": files,
                "lines": lines
            }),
            DetectProgressEvent::Skipped { corpus, reason } => serde_json::json!({
                "event": "progress",
                "corpus": corpus,
                "phase": "skipped",
                "reason": reason
            }),
            DetectProgressEvent::Scoring { corpus, n, total } => serde_json::json!({
                "event": "progress",
                "corpus": corpus,
                "phase": "scoring",
                "n": n,
                "total": total
            }),
        };
        if let Ok(line) = serde_json::to_string(&obj) {
            let mut stderr = std::io::stderr().lock();
            let _ = writeln!(stderr, "{}", line);
            let _ = stderr.flush();
        }
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl DetectProgressReporter for NoProgress {
    fn report(&self, _event: DetectProgressEvent) {}
}

pub(crate) fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + (s.len() - 1) / 3);
    let chars: Vec<char> = s.chars().rev().collect();
    for (i, c) in chars.iter().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(*c);
    }
    result.chars().rev().collect()
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Default: human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    /// The reporter is shared with the scoring workers.
    pub fn reporter(&self) -> Arc<dyn DetectProgressReporter> {
        match self {
            ProgressMode::Off => Arc::new(NoProgress),
            ProgressMode::Human => Arc::new(StderrProgress),
            ProgressMode::Json => Arc::new(JsonProgress),
        }
    }
}
