//! `clonescan sources`: configured corpora and whether they look usable.
//!
//! No network traffic: a remote corpus is reported as OK when its
//! reference parses, a local one when its directory exists.

use std::path::Path;

use crate::config::Config;
use crate::source::{local_base_corpora, CorpusRef};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceStatus {
    pub role: &'static str,
    pub reference: String,
    pub origin: Option<&'static str>,
    pub status: String,
    pub healthy: bool,
}

pub fn source_statuses(config: &Config) -> Vec<SourceStatus> {
    let target = config
        .corpora
        .target
        .iter()
        .map(|reference| status_of("target", reference));
    let comparisons = config
        .corpora
        .comparisons
        .iter()
        .map(|reference| status_of("comparison", reference));
    let mut statuses: Vec<SourceStatus> = target.chain(comparisons).collect();
    if let Some(base) = &config.corpora.local_base {
        match local_base_corpora(Path::new(base)) {
            Ok(dirs) => statuses.extend(
                dirs.iter()
                    .map(|dir| status_of("local-base", &dir.display().to_string())),
            ),
            Err(e) => statuses.push(SourceStatus {
                role: "local-base",
                reference: base.clone(),
                origin: Some("local"),
                status: e.to_string(),
                healthy: false,
            }),
        }
    }
    statuses
}

fn status_of(role: &'static str, reference: &str) -> SourceStatus {
    let (origin, status, healthy) = match CorpusRef::parse(reference) {
        Ok(CorpusRef::Local(path)) if path.is_dir() => (Some("local"), "OK".to_string(), true),
        Ok(CorpusRef::Local(_)) => (
            Some("local"),
            "NOT FOUND (directory does not exist)".to_string(),
            false,
        ),
        Ok(CorpusRef::Remote(id)) => (Some("remote"), format!("OK ({})", id), true),
        Err(e) => (None, e.to_string(), false),
    };
    SourceStatus {
        role,
        reference: reference.to_string(),
        origin,
        status,
        healthy,
    }
}

pub fn list_sources(config: &Config) {
    let statuses = source_statuses(config);
    if statuses.is_empty() {
        println!("No corpora configured. Add [corpora] to the config file or pass them to `scan`.");
        return;
    }

    println!(
        "{:<12} {:<8} {:<40} {:<8} {}",
        "ROLE", "ORIGIN", "REFERENCE", "HEALTHY", "STATUS"
    );
    for s in &statuses {
        println!(
            "{:<12} {:<8} {:<40} {:<8} {}",
            s.role,
            s.origin.unwrap_or("-"),
            s.reference,
            s.healthy,
            s.status
        );
    }
}
