//! Report rendering: JSON for machines, a text summary for people.

use std::collections::BTreeMap;
use std::fmt::Write;

use crate::models::{DetectionReport, MatchRecord};
use crate::progress::format_number;

/// Pretty-printed JSON with the camelCase field names of the report types.
pub fn render_json(report: &DetectionReport) -> serde_json::Result<String> {
    serde_json::to_string_pretty(report)
}

/// Multi-section text summary, in the layout of `clonescan scan` output.
pub fn render_summary(report: &DetectionReport) -> String {
    let mut out = String::new();
    // Writing to a String cannot fail.
    let _ = write_summary(&mut out, report);
    out
}

fn write_summary(out: &mut String, report: &DetectionReport) -> std::fmt::Result {
    let target = report.target();
    let summary = report.summary();
    let thresholds = report.thresholds();

    writeln!(out, "Repository Similarity Report")?;
    writeln!(out, "============================")?;
    writeln!(out)?;
    writeln!(out, "  Target:      {} ({})", target.display_name, target.identifier)?;
    writeln!(
        out,
        "  Files:       {}  ({} lines)",
        format_number(target.total_files as u64),
        format_number(target.total_lines as u64)
    )?;
    writeln!(
        out,
        "  Language:    {}",
        report.primary_language().unwrap_or("unknown")
    )?;
    writeln!(
        out,
        "  Thresholds:  similar >= {:.0}%, high confidence >= {:.0}%",
        thresholds.similarity * 100.0,
        thresholds.high_confidence * 100.0
    )?;
    writeln!(
        out,
        "  Generated:   {}",
        report.generated_at().format("%Y-%m-%d %H:%M:%S UTC")
    )?;
    writeln!(out)?;
    writeln!(out, "  Risk level:  {}", report.risk_level())?;
    writeln!(
        out,
        "  Compared:    {} corpora ({} skipped)",
        summary.corpora_compared, summary.corpora_skipped
    )?;
    writeln!(out, "  Identical:   {}", summary.identical_count)?;
    writeln!(
        out,
        "  Similar:     {} ({} high confidence)",
        summary.match_count, summary.high_confidence_match_count
    )?;

    if !report.identical().is_empty() {
        writeln!(out)?;
        writeln!(out, "  Identical files:")?;
        for record in report.identical() {
            writeln!(
                out,
                "    {}  ==  {}:{}",
                record.target_path, record.comparison_corpus_id, record.comparison_path
            )?;
        }
    }

    let mut by_corpus: BTreeMap<&str, Vec<&MatchRecord>> = BTreeMap::new();
    for record in report.high_confidence_matches() {
        by_corpus
            .entry(record.comparison_corpus_id.as_str())
            .or_default()
            .push(record);
    }
    if !by_corpus.is_empty() {
        writeln!(out)?;
        writeln!(out, "  High-confidence matches:")?;
        for (corpus, records) in &by_corpus {
            writeln!(out, "    {}", corpus)?;
            for record in records {
                writeln!(
                    out,
                    "      {:>5.1}%  {}  ~  {}",
                    record.similarity * 100.0,
                    record.target_path,
                    record.comparison_path
                )?;
            }
        }
    }

    if !report.comparisons().is_empty() {
        let mut rows: Vec<_> = report.comparisons().iter().collect();
        rows.sort_by(|a, b| {
            (b.identical.len(), b.matches.len()).cmp(&(a.identical.len(), a.matches.len()))
        });

        writeln!(out)?;
        writeln!(out, "  By corpus:")?;
        writeln!(
            out,
            "  {:<40} {:>7} {:>9} {:>8} {:>8}",
            "CORPUS", "FILES", "IDENTICAL", "SIMILAR", "AVG"
        )?;
        writeln!(out, "  {}", "-".repeat(76))?;
        for result in rows {
            writeln!(
                out,
                "  {:<40} {:>7} {:>9} {:>8} {:>7.1}%",
                result.corpus.display_name,
                result.corpus.total_files,
                result.identical.len(),
                result.matches.len(),
                result.average_similarity * 100.0
            )?;
        }
    }

    if !report.skipped().is_empty() {
        writeln!(out)?;
        writeln!(out, "  Skipped:")?;
        for skipped in report.skipped() {
            writeln!(out, "    {}: {}", skipped.identifier, skipped.reason)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::{assemble_report, summarize_corpus};
    use crate::models::{CorpusSnapshot, FileRecord, IdenticalRecord, Origin, SkippedCorpus};
    use crate::risk::RiskThresholds;
    use crate::similarity::{PairOutcome, Scorer};

    fn sample() -> DetectionReport {
        let target = CorpusSnapshot::new(
            "/work/app",
            "app",
            Origin::Local,
            vec![FileRecord::new("main.py", "print('hi')\n".into())],
        );
        let other = CorpusSnapshot::new("octo/copy", "octo/copy", Origin::Remote, vec![]);
        let result = summarize_corpus(
            other.stats(),
            vec![
                PairOutcome::Identical(IdenticalRecord {
                    target_path: "main.py".into(),
                    comparison_path: "src/main.py".into(),
                    comparison_corpus_id: "octo/copy".into(),
                    target_lines: 1,
                    comparison_lines: 1,
                }),
                PairOutcome::Match(MatchRecord {
                    target_path: "util.py".into(),
                    comparison_path: "lib/util.py".into(),
                    comparison_corpus_id: "octo/copy".into(),
                    similarity: 0.95,
                    target_lines: 10,
                    comparison_lines: 11,
                }),
            ],
        );
        assemble_report(
            &target,
            vec![result],
            vec![SkippedCorpus {
                identifier: "octo/missing".into(),
                reason: "corpus not found".into(),
            }],
            &Scorer::default(),
            RiskThresholds::default(),
        )
    }

    #[test]
    fn summary_lists_every_section() {
        let text = render_summary(&sample());
        assert!(text.contains("Risk level:  HIGH"));
        assert!(text.contains("main.py  ==  octo/copy:src/main.py"));
        assert!(text.contains("95.0%  util.py  ~  lib/util.py"));
        assert!(text.contains("octo/missing: corpus not found"));
        assert!(text.contains("Language:    Python"));
    }

    #[test]
    fn json_uses_camel_case_fields() {
        let json = render_json(&sample()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["riskLevel"], "HIGH");
        assert_eq!(value["summary"]["identicalCount"], 1);
        assert_eq!(value["summary"]["highConfidenceMatchCount"], 1);
        assert_eq!(value["primaryLanguage"], "Python");
        assert_eq!(value["target"]["totalFiles"], 1);
        let average = value["comparisons"][0]["averageSimilarity"].as_f64().unwrap();
        assert!((average - 0.975).abs() < 1e-12);
        assert_eq!(value["thresholds"]["risk"]["criticalIdentical"], 3);
        assert!(value["generatedAt"].is_string());
    }
}
