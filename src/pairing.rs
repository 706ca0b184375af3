//! Candidate pairing.
//!
//! Two files are worth scoring when they share an extension or an exact base
//! filename. Content is never consulted, and the relation is symmetric.
//! Renamed copies that keep their extension are still found, as are
//! identically named files moved to another directory.

use std::collections::HashMap;

use crate::models::{base_name, path_extension, FileRecord};

pub fn is_candidate(target_path: &str, comparison_path: &str) -> bool {
    let same_extension = match (path_extension(target_path), path_extension(comparison_path)) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    };
    same_extension || base_name(target_path) == base_name(comparison_path)
}

/// Index pairs `(target, comparison)` in target-major order.
///
/// Builds extension and base-name buckets over the comparison side so the
/// cost is proportional to the number of candidates rather than N×M.
pub fn candidate_pairs(targets: &[FileRecord], comparisons: &[FileRecord]) -> Vec<(usize, usize)> {
    let mut by_extension: HashMap<String, Vec<usize>> = HashMap::new();
    let mut by_name: HashMap<&str, Vec<usize>> = HashMap::new();
    for (idx, file) in comparisons.iter().enumerate() {
        if let Some(ext) = file.extension() {
            by_extension.entry(ext).or_default().push(idx);
        }
        by_name.entry(file.base_name()).or_default().push(idx);
    }

    let mut pairs = Vec::new();
    for (t_idx, target) in targets.iter().enumerate() {
        let mut hits: Vec<usize> = Vec::new();
        if let Some(ext) = target.extension() {
            if let Some(list) = by_extension.get(&ext) {
                hits.extend_from_slice(list);
            }
        }
        if let Some(list) = by_name.get(target.base_name()) {
            hits.extend_from_slice(list);
        }
        hits.sort_unstable();
        hits.dedup();
        pairs.extend(hits.into_iter().map(|c_idx| (t_idx, c_idx)));
    }
    pairs
}
