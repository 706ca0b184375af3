//! Corpus sources: where snapshots come from.
//!
//! Every corpus, target or comparison, is produced by a [`CorpusSource`].
//! The engine never sees HTTP or the filesystem directly; it asks a source
//! for a [`CorpusSnapshot`] and handles the [`FetchError`] if one comes back.
//!
//! ```text
//! "owner/repo" ─┐                 ┌─ GithubSource ─┐
//! "https://…"  ─┼─ CorpusRef::parse ┤                ├─ fetch() → CorpusSnapshot
//! "./checkout" ─┘                 └─ LocalSource  ─┘
//! ```
//!
//! Custom sources (an in-memory fixture, a different forge) implement the
//! trait and are handed to [`crate::detect::run_detection_with_sources`].

use async_trait::async_trait;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::cancel::CancelToken;
use crate::config::Config;
use crate::connector_fs::LocalSource;
use crate::connector_github::{GithubClient, GithubSource};
use crate::error::FetchError;
use crate::models::{CorpusSnapshot, Origin};

// ═══════════════════════════════════════════════════════════════════════
// Source Trait
// ═══════════════════════════════════════════════════════════════════════

/// Produces one corpus snapshot per call.
///
/// Implementations must be safe to call concurrently with other sources and
/// should return [`FetchError::Cancelled`] promptly once `cancel` fires.
#[async_trait]
pub trait CorpusSource: Send + Sync {
    /// Stable identifier used in reports and for self-comparison checks.
    fn identifier(&self) -> &str;

    fn origin(&self) -> Origin;

    /// Whether this source and `other` name the same corpus.
    ///
    /// Remote identifiers compare case-insensitively since forge owner and
    /// repository names do.
    fn same_corpus(&self, other: &dyn CorpusSource) -> bool {
        if self.origin() != other.origin() {
            return false;
        }
        match self.origin() {
            Origin::Local => self.identifier() == other.identifier(),
            Origin::Remote => self.identifier().eq_ignore_ascii_case(other.identifier()),
        }
    }

    async fn fetch(&self, cancel: &CancelToken) -> Result<CorpusSnapshot, FetchError>;
}

// ═══════════════════════════════════════════════════════════════════════
// References
// ═══════════════════════════════════════════════════════════════════════

/// `owner/repo` on a hosted forge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoId {
    pub owner: String,
    pub repo: String,
}

impl RepoId {
    /// Accepts `owner/repo` or a forge URL such as
    /// `https://github.com/owner/repo.git` or `.../owner/repo/tree/main`.
    pub fn parse(reference: &str) -> Result<Self, FetchError> {
        let trimmed = reference.trim();
        let path = match trimmed.split_once("://") {
            Some((_, rest)) => match rest.split_once('/') {
                Some((_host, path)) => path,
                None => return Err(FetchError::InvalidReference(reference.to_string())),
            },
            None => trimmed.strip_prefix("github.com/").unwrap_or(trimmed),
        };

        let mut segments = path.split('/').filter(|s| !s.is_empty());
        let (Some(owner), Some(repo)) = (segments.next(), segments.next()) else {
            return Err(FetchError::InvalidReference(reference.to_string()));
        };
        let repo = repo.strip_suffix(".git").unwrap_or(repo);
        // Bare `owner/repo` must be exactly two segments; URLs may carry
        // trailing `/tree/<branch>` or `/commits/...` noise.
        if !trimmed.contains("://") && segments.next().is_some() {
            return Err(FetchError::InvalidReference(reference.to_string()));
        }
        if !is_name(owner) || !is_name(repo) {
            return Err(FetchError::InvalidReference(reference.to_string()));
        }
        Ok(Self {
            owner: owner.to_string(),
            repo: repo.to_string(),
        })
    }

    pub fn web_url(&self) -> String {
        format!("https://github.com/{}/{}", self.owner, self.repo)
    }
}

impl fmt::Display for RepoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.repo)
    }
}

fn is_name(segment: &str) -> bool {
    !segment.is_empty()
        && segment != "."
        && segment != ".."
        && segment
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

/// A parsed corpus reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CorpusRef {
    Local(PathBuf),
    Remote(RepoId),
}

impl CorpusRef {
    /// Classify a user-supplied reference.
    ///
    /// URLs are always remote. Existing paths, and anything that looks like
    /// a path (`/`, `.`, `~/`), are local; a leading `~` is expanded from
    /// `HOME`. A bare `owner/repo` that is not an
    /// existing path is remote. Everything else is treated as a local path
    /// and fails at fetch time if missing.
    pub fn parse(reference: &str) -> Result<Self, FetchError> {
        let trimmed = reference.trim();
        if trimmed.is_empty() {
            return Err(FetchError::InvalidReference(reference.to_string()));
        }
        if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            return RepoId::parse(trimmed).map(CorpusRef::Remote);
        }
        if trimmed == "~" || trimmed.starts_with("~/") {
            let home = std::env::var("HOME").ok();
            return Ok(CorpusRef::Local(expand_home(trimmed, home.as_deref())));
        }
        let path = Path::new(trimmed);
        if path.exists() || trimmed.starts_with(['/', '.', '\\']) {
            return Ok(CorpusRef::Local(path.to_path_buf()));
        }
        match RepoId::parse(trimmed) {
            Ok(id) => Ok(CorpusRef::Remote(id)),
            Err(_) => Ok(CorpusRef::Local(path.to_path_buf())),
        }
    }

    pub fn origin(&self) -> Origin {
        match self {
            CorpusRef::Local(_) => Origin::Local,
            CorpusRef::Remote(_) => Origin::Remote,
        }
    }
}

/// Replace a leading `~` with `home`. Without a home directory the path is
/// kept as written and fails at fetch time.
fn expand_home(reference: &str, home: Option<&str>) -> PathBuf {
    match (reference.strip_prefix('~'), home) {
        (Some(rest), Some(home)) => PathBuf::from(home).join(rest.trim_start_matches('/')),
        _ => PathBuf::from(reference),
    }
}

impl fmt::Display for CorpusRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CorpusRef::Local(path) => write!(f, "{}", path.display()),
            CorpusRef::Remote(id) => write!(f, "{}", id),
        }
    }
}

/// Child directories of `base` that are treated as comparison corpora, in
/// name order. Hidden directories and one named `delete` are left out.
pub fn local_base_corpora(base: &Path) -> Result<Vec<PathBuf>, FetchError> {
    let entries = std::fs::read_dir(base).map_err(|e| FetchError::from_io(base, e))?;
    let mut dirs = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| FetchError::from_io(base, e))?;
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name.starts_with('.') || name == LOCAL_BASE_TRASH {
            continue;
        }
        if entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
            dirs.push(entry.path());
        }
    }
    dirs.sort();
    Ok(dirs)
}

const LOCAL_BASE_TRASH: &str = "delete";

/// Build the adapter for a reference. The HTTP client is shared so every
/// remote corpus in a run draws from one connection pool and one request cap.
pub fn open_source(
    reference: &CorpusRef,
    config: &Config,
    client: &GithubClient,
) -> Arc<dyn CorpusSource> {
    match reference {
        CorpusRef::Local(path) => Arc::new(LocalSource::new(path, config.scan.clone())),
        CorpusRef::Remote(id) => Arc::new(GithubSource::new(
            id.clone(),
            client.clone(),
            config.scan.clone(),
        )),
    }
}
