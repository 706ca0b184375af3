//! Error taxonomy for corpus fetching, configuration, and detection runs.
//!
//! Only [`ConfigError`] and a failed target fetch ever abort a run. Everything
//! else degrades locally: a [`FetchError`] on a comparison corpus marks that
//! corpus as skipped, and a [`DecodeError`] drops a single file.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Failure to obtain a corpus snapshot.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("corpus not found: {0}")]
    NotFound(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Rate limited even after the single backoff retry.
    #[error("rate limited by {url} (retried once after {backoff:?})")]
    RateLimited { url: String, backoff: Duration },

    #[error("HTTP {status} from {url}")]
    Http { status: u16, url: String },

    #[error("network error fetching {url}: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid corpus reference '{0}'")]
    InvalidReference(String),

    #[error("unexpected listing payload from {url}: {message}")]
    Payload { url: String, message: String },

    #[error("fetch cancelled")]
    Cancelled,
}

impl FetchError {
    pub(crate) fn from_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            std::io::ErrorKind::NotFound => FetchError::NotFound(path.display().to_string()),
            std::io::ErrorKind::PermissionDenied => {
                FetchError::PermissionDenied(path.display().to_string())
            }
            _ => FetchError::Io { path, source },
        }
    }
}

/// A single file whose content could not be read as text.
#[derive(Error, Debug)]
#[error("{path} is not valid UTF-8 text")]
pub struct DecodeError {
    pub path: String,
}

/// Invalid configuration. Raised before any corpus is touched.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("scan.code_extensions must not be empty")]
    EmptyExtensions,

    #[error("{name} must be in [0.0, 1.0], got {value}")]
    ThresholdOutOfRange { name: &'static str, value: f64 },

    #[error("thresholds.high_confidence ({high}) must be >= thresholds.similarity ({similarity})")]
    ThresholdOrder { similarity: f64, high: f64 },

    #[error("risk thresholds must be monotone: {0}")]
    RiskOrder(String),

    #[error("unknown risk preset '{0}'. Must be enhanced, github_wide, or simple.")]
    UnknownPreset(String),

    #[error("{0} must be > 0")]
    Zero(&'static str),

    #[error("invalid exclude glob '{pattern}': {source}")]
    Glob {
        pattern: String,
        #[source]
        source: globset::Error,
    },
}

/// Run-level failure of [`crate::detect::run_detection`].
#[derive(Error, Debug)]
pub enum DetectError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to fetch target corpus {corpus}: {source}")]
    TargetFetch {
        corpus: String,
        #[source]
        source: FetchError,
    },

    /// The run was interrupted; no partial report is produced.
    #[error("detection run incomplete: cancelled during {phase}")]
    Cancelled { phase: &'static str },

    #[error("scoring worker failed: {0}")]
    Worker(String),
}
