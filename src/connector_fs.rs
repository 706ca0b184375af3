//! Local directory adapter.
//!
//! Walks a directory tree and catalogues every file whose extension is on the
//! allow-list and whose content clears the minimum size.
//!
//! # Traversal rules
//!
//! - Hidden directories (name starts with `.`) are never entered.
//! - Directories named in `scan.exclude_dirs` are never entered.
//! - Paths matching `scan.exclude_globs` (relative, `/`-separated) are skipped.
//! - Symlinks are not followed.
//! - Entries are visited in file-name order, so the snapshot is stable
//!   across runs on the same tree.
//!
//! A missing or unreadable root fails the whole corpus. An unreadable or
//! non-UTF-8 file below the root is logged and skipped.

use async_trait::async_trait;
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

use crate::cancel::CancelToken;
use crate::catalog::{CatalogBuilder, Rejection};
use crate::config::ScanConfig;
use crate::error::{DecodeError, FetchError};
use crate::models::{CorpusSnapshot, FileRecord, Origin};
use crate::source::CorpusSource;

pub struct LocalSource {
    root: PathBuf,
    identifier: String,
    scan: ScanConfig,
}

impl LocalSource {
    /// The identifier is the canonical path when the root exists, so two
    /// spellings of one directory are recognised as the same corpus.
    pub fn new(root: impl Into<PathBuf>, scan: ScanConfig) -> Self {
        let root = root.into();
        let identifier = std::fs::canonicalize(&root)
            .unwrap_or_else(|_| root.clone())
            .display()
            .to_string();
        Self {
            root,
            identifier,
            scan,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl CorpusSource for LocalSource {
    fn identifier(&self) -> &str {
        &self.identifier
    }

    fn origin(&self) -> Origin {
        Origin::Local
    }

    async fn fetch(&self, cancel: &CancelToken) -> Result<CorpusSnapshot, FetchError> {
        let root = self.root.clone();
        let identifier = self.identifier.clone();
        let scan = self.scan.clone();
        let cancel = cancel.clone();
        tokio::task::spawn_blocking(move || scan_directory(&root, &identifier, &scan, &cancel))
            .await
            .map_err(|e| FetchError::Io {
                path: self.root.clone(),
                source: std::io::Error::other(e),
            })?
    }
}

/// Synchronous walk. Called on the blocking pool by [`LocalSource::fetch`].
pub fn scan_directory(
    root: &Path,
    identifier: &str,
    scan: &ScanConfig,
    cancel: &CancelToken,
) -> Result<CorpusSnapshot, FetchError> {
    let metadata = std::fs::metadata(root).map_err(|e| FetchError::from_io(root, e))?;
    if !metadata.is_dir() {
        return Err(FetchError::NotFound(format!(
            "{} is not a directory",
            root.display()
        )));
    }
    // Surface an unreadable root as a corpus failure rather than an empty corpus.
    std::fs::read_dir(root).map_err(|e| FetchError::from_io(root, e))?;

    let catalog = CatalogBuilder::from_config(scan);
    let excluded = build_globset(&scan.exclude_globs)?;
    let budget = scan.max_files_per_corpus;

    let mut files: Vec<FileRecord> = Vec::new();
    let walker = WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| entry.depth() == 0 || !is_skipped_dir(entry, &scan.exclude_dirs));

    for entry in walker {
        if cancel.is_cancelled() {
            return Err(FetchError::Cancelled);
        }
        if budget.is_some_and(|limit| files.len() >= limit) {
            debug!(corpus = identifier, limit = ?budget, "file budget reached");
            break;
        }

        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(corpus = identifier, error = %e, "skipping unreadable entry");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let relative = relative_path(root, entry.path());
        if excluded.is_match(&relative) || !catalog.accepts_path(&relative) {
            continue;
        }

        let content = match read_text(entry.path(), &relative) {
            Ok(Some(content)) => content,
            Ok(None) => continue,
            Err(e) => {
                warn!(corpus = identifier, path = %relative, error = %e, "skipping unreadable file");
                continue;
            }
        };

        match catalog.build(&relative, content) {
            Ok(record) => files.push(record),
            Err(Rejection::TooSmall) => {
                debug!(corpus = identifier, path = %relative, "below minimum size");
            }
            Err(Rejection::Extension) => {}
        }
    }

    let display_name = Path::new(identifier)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| identifier.to_string());

    Ok(CorpusSnapshot::new(identifier, display_name, Origin::Local, files))
}

fn is_skipped_dir(entry: &DirEntry, exclude_dirs: &[String]) -> bool {
    if !entry.file_type().is_dir() {
        return false;
    }
    let name = entry.file_name().to_string_lossy();
    name.starts_with('.') || exclude_dirs.iter().any(|d| d.as_str() == name)
}

fn relative_path(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}

/// `Ok(None)` when the bytes are not UTF-8; the decode failure is logged here.
fn read_text(path: &Path, relative: &str) -> Result<Option<String>, FetchError> {
    let bytes = std::fs::read(path).map_err(|e| FetchError::from_io(path, e))?;
    match String::from_utf8(bytes) {
        Ok(content) => Ok(Some(content)),
        Err(_) => {
            let err = DecodeError {
                path: relative.to_string(),
            };
            warn!(error = %err, "skipping file");
            Ok(None)
        }
    }
}

pub(crate) fn build_globset(patterns: &[String]) -> Result<GlobSet, FetchError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern)
            .map_err(|_| FetchError::InvalidReference(format!("exclude glob '{}'", pattern)))?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|e| FetchError::InvalidReference(format!("exclude globs: {}", e)))
}
