//! File catalog: decides which discovered files become [`FileRecord`]s.
//!
//! Both predicates are cheap and run before any hashing. The extension check
//! needs only the path, so adapters call [`CatalogBuilder::accepts_path`]
//! before reading or downloading a body at all.

use std::collections::BTreeSet;

use crate::config::ScanConfig;
use crate::models::{path_extension, FileRecord};

/// Why a file was left out of the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    Extension,
    TooSmall,
}

#[derive(Debug, Clone)]
pub struct CatalogBuilder {
    extensions: BTreeSet<String>,
    min_file_size: usize,
}

impl CatalogBuilder {
    pub fn new(extensions: BTreeSet<String>, min_file_size: usize) -> Self {
        Self {
            extensions,
            min_file_size,
        }
    }

    pub fn from_config(scan: &ScanConfig) -> Self {
        Self::new(scan.code_extensions.clone(), scan.min_file_size)
    }

    pub fn accepts_path(&self, path: &str) -> bool {
        path_extension(path)
            .map(|ext| self.extensions.contains(&ext))
            .unwrap_or(false)
    }

    /// Size is measured in characters, not bytes.
    pub fn accepts_content(&self, content: &str) -> bool {
        content.chars().count() >= self.min_file_size
    }

    pub fn build(&self, path: &str, content: String) -> Result<FileRecord, Rejection> {
        if !self.accepts_path(path) {
            return Err(Rejection::Extension);
        }
        if !self.accepts_content(&content) {
            return Err(Rejection::TooSmall);
        }
        Ok(FileRecord::new(path, content))
    }
}
