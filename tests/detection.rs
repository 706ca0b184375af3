//! Library-level detection runs over in-memory and local sources.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use clonescan::cancel::CancelToken;
use clonescan::connector_fs::LocalSource;
use clonescan::detect::{run_detection_with_sources, DetectSettings};
use clonescan::error::{DetectError, FetchError};
use clonescan::models::{CorpusSnapshot, FileRecord, Origin};
use clonescan::progress::{DetectProgressEvent, DetectProgressReporter, NoProgress};
use clonescan::risk::{RiskLevel, RiskPreset};
use clonescan::source::CorpusSource;

/// A source that serves a fixed snapshot.
struct FixedSource {
    id: String,
    files: Vec<(&'static str, String)>,
    fetches: AtomicUsize,
}

impl FixedSource {
    fn new(id: &str, files: Vec<(&'static str, String)>) -> Self {
        Self {
            id: id.to_string(),
            files,
            fetches: AtomicUsize::new(0),
        }
    }
}

fn fixed(id: &str, files: Vec<(&'static str, String)>) -> Arc<dyn CorpusSource> {
    Arc::new(FixedSource::new(id, files))
}

#[async_trait]
impl CorpusSource for FixedSource {
    fn identifier(&self) -> &str {
        &self.id
    }

    fn origin(&self) -> Origin {
        Origin::Remote
    }

    async fn fetch(&self, _cancel: &CancelToken) -> Result<CorpusSnapshot, FetchError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let files = self
            .files
            .iter()
            .map(|(path, content)| FileRecord::new(*path, content.clone()))
            .collect();
        Ok(CorpusSnapshot::new(&self.id, &self.id, Origin::Remote, files))
    }
}

/// A source whose fetch always fails.
struct FailingSource(String);

#[async_trait]
impl CorpusSource for FailingSource {
    fn identifier(&self) -> &str {
        &self.0
    }

    fn origin(&self) -> Origin {
        Origin::Remote
    }

    async fn fetch(&self, _cancel: &CancelToken) -> Result<CorpusSnapshot, FetchError> {
        Err(FetchError::NotFound(self.0.clone()))
    }
}

/// A source that never finishes until cancelled.
struct HangingSource;

#[async_trait]
impl CorpusSource for HangingSource {
    fn identifier(&self) -> &str {
        "hanging/source"
    }

    fn origin(&self) -> Origin {
        Origin::Remote
    }

    async fn fetch(&self, cancel: &CancelToken) -> Result<CorpusSnapshot, FetchError> {
        cancel.cancelled().await;
        Err(FetchError::Cancelled)
    }
}

#[derive(Default)]
struct RecordingProgress(Mutex<Vec<DetectProgressEvent>>);

impl DetectProgressReporter for RecordingProgress {
    fn report(&self, event: DetectProgressEvent) {
        self.0.lock().unwrap().push(event);
    }
}

fn handler_source() -> String {
    "def handler(event, context):\n    body = event.get('body')\n    return {'status': 200, 'body': body}\n"
        .to_string()
}

async fn run(
    target: Arc<dyn CorpusSource>,
    comparisons: Vec<Arc<dyn CorpusSource>>,
) -> Result<clonescan::models::DetectionReport, DetectError> {
    run_detection_with_sources(
        &DetectSettings::default(),
        target,
        comparisons,
        &CancelToken::new(),
        Arc::new(NoProgress),
    )
    .await
}

#[tokio::test]
async fn identical_file_yields_identical_record_only() {
    let target = fixed("me/app", vec![("app.py", handler_source())]);
    let other = fixed("them/copy", vec![("copied.py", handler_source())]);

    let report = run(target, vec![other]).await.unwrap();
    assert_eq!(report.identical().len(), 1);
    assert!(report.matches().is_empty());
    assert_eq!(report.identical()[0].target_path, "app.py");
    assert_eq!(report.identical()[0].comparison_corpus_id, "them/copy");
    assert_eq!(report.risk_level(), RiskLevel::High);
}

#[tokio::test]
async fn comment_only_change_is_high_confidence_match() {
    let target = fixed(
        "me/app",
        vec![("x.py", "def f():\n    return 1  # comment".to_string())],
    );
    let other = fixed(
        "them/copy",
        vec![("x.py", "def f():\n    return 1  # different comment".to_string())],
    );

    let report = run(target, vec![other]).await.unwrap();
    assert!(report.identical().is_empty());
    assert_eq!(report.matches().len(), 1);
    assert!(report.matches()[0].similarity >= 0.9);
    assert_eq!(report.summary().high_confidence_match_count, 1);
}

#[tokio::test]
async fn disjoint_extensions_score_nothing() {
    let target = fixed("me/app", vec![("main.py", handler_source())]);
    let other = fixed(
        "them/web",
        vec![("index.js", "console.log('hello from a js file');".to_string())],
    );

    let report = run(target, vec![other]).await.unwrap();
    let result = &report.comparisons()[0];
    assert_eq!(result.pairs_scored, 0);
    assert_eq!(result.average_similarity, 0.0);
    assert_eq!(report.risk_level(), RiskLevel::Low);
}

#[tokio::test]
async fn failed_comparison_is_skipped_and_run_completes() {
    let target = fixed("me/app", vec![("app.py", handler_source())]);
    let good = fixed("them/copy", vec![("app.py", handler_source())]);
    let bad: Arc<dyn CorpusSource> = Arc::new(FailingSource("them/gone".into()));

    let report = run(target, vec![bad, good]).await.unwrap();
    assert_eq!(report.comparisons().len(), 1);
    assert_eq!(report.comparisons()[0].corpus.identifier, "them/copy");
    assert_eq!(report.skipped().len(), 1);
    assert_eq!(report.skipped()[0].identifier, "them/gone");
    assert!(report.skipped()[0].reason.contains("not found"));
    assert_eq!(report.identical().len(), 1);
}

#[tokio::test]
async fn failed_target_fails_the_run() {
    let target: Arc<dyn CorpusSource> = Arc::new(FailingSource("me/gone".into()));
    let other = fixed("them/copy", vec![("app.py", handler_source())]);

    let err = run(target, vec![other]).await.unwrap_err();
    assert!(matches!(err, DetectError::TargetFetch { ref corpus, .. } if corpus == "me/gone"));
}

#[tokio::test]
async fn self_comparison_is_skipped_without_fetching() {
    let target = fixed("Me/App", vec![("app.py", handler_source())]);
    let same = Arc::new(FixedSource::new("me/app", vec![("app.py", handler_source())]));
    let same_dyn: Arc<dyn CorpusSource> = same.clone();

    let report = run(target, vec![same_dyn]).await.unwrap();
    assert_eq!(same.fetches.load(Ordering::SeqCst), 0);
    assert_eq!(report.skipped()[0].reason, "self-comparison");
    assert!(report.comparisons().is_empty());
}

#[tokio::test]
async fn risk_preset_changes_classification() {
    let target = fixed("me/app", vec![("app.py", handler_source())]);
    let other = fixed("them/copy", vec![("app.py", handler_source())]);
    let settings = DetectSettings {
        risk: RiskPreset::Simple.thresholds(),
        ..DetectSettings::default()
    };

    let report = run_detection_with_sources(
        &settings,
        target,
        vec![other],
        &CancelToken::new(),
        Arc::new(NoProgress),
    )
    .await
    .unwrap();
    assert_eq!(report.risk_level(), RiskLevel::Critical);
}

#[tokio::test]
async fn cancellation_reports_incomplete_run() {
    let target = fixed("me/app", vec![("app.py", handler_source())]);
    let cancel = CancelToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let err = tokio::time::timeout(
        Duration::from_secs(5),
        run_detection_with_sources(
            &DetectSettings::default(),
            target,
            vec![Arc::new(HangingSource) as Arc<dyn CorpusSource>],
            &cancel,
            Arc::new(NoProgress),
        ),
    )
    .await
    .expect("run should stop once cancelled")
    .unwrap_err();
    assert!(matches!(err, DetectError::Cancelled { phase: "fetch" }));
    assert!(err.to_string().contains("incomplete"));
}

#[tokio::test]
async fn progress_events_cover_each_corpus() {
    let target = fixed("me/app", vec![("app.py", handler_source())]);
    let other = fixed("them/copy", vec![("app.py", handler_source())]);
    let bad: Arc<dyn CorpusSource> = Arc::new(FailingSource("them/gone".into()));
    let progress = Arc::new(RecordingProgress::default());

    run_detection_with_sources(
        &DetectSettings::default(),
        target,
        vec![other, bad],
        &CancelToken::new(),
        progress.clone(),
    )
    .await
    .unwrap();

    let events = progress.0.lock().unwrap();
    assert!(events.contains(&DetectProgressEvent::Fetched {
        corpus: "me/app".into(),
        files: 1,
        lines: 3,
    }));
    assert!(events
        .iter()
        .any(|e| matches!(e, DetectProgressEvent::Skipped { corpus, .. } if corpus == "them/gone")));
    assert!(events.contains(&DetectProgressEvent::Scoring {
        corpus: "them/copy".into(),
        n: 1,
        total: 1,
    }));
}

#[tokio::test]
async fn local_directories_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let app = dir.path().join("app");
    let copy = dir.path().join("copy");
    std::fs::create_dir_all(app.join("src")).unwrap();
    std::fs::create_dir_all(&copy).unwrap();
    std::fs::write(app.join("src/handler.py"), handler_source()).unwrap();
    std::fs::write(
        copy.join("handler.py"),
        handler_source().replace("200", "201"),
    )
    .unwrap();

    let scan = clonescan::config::ScanConfig::default();
    let comparison: Arc<dyn CorpusSource> = Arc::new(LocalSource::new(&copy, scan.clone()));
    let report = run(Arc::new(LocalSource::new(&app, scan)), vec![comparison])
        .await
        .unwrap();

    assert!(report.identical().is_empty());
    assert_eq!(report.matches().len(), 1);
    assert_eq!(report.matches()[0].target_path, "src/handler.py");
    assert_eq!(report.matches()[0].comparison_path, "handler.py");
    assert!(report.matches()[0].similarity > 0.95);
}
