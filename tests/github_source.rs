//! Remote adapter against a mocked contents API.

use httpmock::prelude::*;
use serde_json::json;
use std::sync::Arc;
use std::time::{Duration, Instant};

use clonescan::cancel::CancelToken;
use clonescan::config::{Config, FetchConfig, ScanConfig};
use clonescan::connector_github::{GithubClient, GithubSource};
use clonescan::detect::run_detection;
use clonescan::error::FetchError;
use clonescan::progress::NoProgress;
use clonescan::source::{CorpusSource, RepoId};

const HANDLER: &str = "def handler(event, context):\n    body = event.get('body')\n    return {'status': 200, 'body': body}\n";
const UTIL: &str = "def clamp(value, low, high):\n    return max(low, min(value, high))\n";

fn fetch_config(server: &MockServer) -> FetchConfig {
    FetchConfig {
        api_base_url: server.base_url(),
        rate_limit_backoff_secs: 0,
        max_concurrent_fetches: 4,
        ..FetchConfig::default()
    }
}

fn source(server: &MockServer, scan: ScanConfig) -> GithubSource {
    source_with(fetch_config(server), scan)
}

fn source_with(fetch: FetchConfig, scan: ScanConfig) -> GithubSource {
    let client = GithubClient::with_token(&fetch, Some("secret".into())).unwrap();
    GithubSource::new(RepoId::parse("octo/hello").unwrap(), client, scan)
}

fn file_item(server: &MockServer, path: &str) -> serde_json::Value {
    json!({
        "type": "file",
        "name": path.rsplit('/').next().unwrap(),
        "path": path,
        "url": server.url(format!("/repos/octo/hello/contents/{}", path)),
        "download_url": server.url(format!("/raw/{}", path)),
    })
}

fn dir_item(server: &MockServer, path: &str) -> serde_json::Value {
    json!({
        "type": "dir",
        "name": path.rsplit('/').next().unwrap(),
        "path": path,
        "url": server.url(format!("/repos/octo/hello/contents/{}", path)),
        "download_url": null,
    })
}

async fn mock_raw<'a>(server: &'a MockServer, path: &str, body: &str) -> httpmock::Mock<'a> {
    let raw = format!("/raw/{}", path);
    let body = body.to_string();
    server
        .mock_async(move |when, then| {
            when.method(GET).path(raw);
            then.status(200).body(body);
        })
        .await
}

#[tokio::test]
async fn lists_recursively_and_downloads_in_listing_order() {
    let server = MockServer::start_async().await;
    let root = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/repos/octo/hello/contents")
                .header("Authorization", "token secret");
            then.status(200).json_body(json!([
                file_item(&server, "README.md"),
                dir_item(&server, "src"),
                dir_item(&server, ".github"),
                file_item(&server, "setup.py"),
            ]));
        })
        .await;
    let src = server
        .mock_async(|when, then| {
            when.method(GET).path("/repos/octo/hello/contents/src");
            then.status(200).json_body(json!([
                file_item(&server, "src/util.py"),
                file_item(&server, "src/tiny.py"),
            ]));
        })
        .await;
    let hidden = server
        .mock_async(|when, then| {
            when.method(GET).path("/repos/octo/hello/contents/.github");
            then.status(200).json_body(json!([]));
        })
        .await;
    mock_raw(&server, "setup.py", HANDLER).await;
    mock_raw(&server, "src/util.py", UTIL).await;
    mock_raw(&server, "src/tiny.py", "x = 1").await;

    let snapshot = source(&server, ScanConfig::default())
        .fetch(&CancelToken::new())
        .await
        .unwrap();

    let paths: Vec<&str> = snapshot.files().iter().map(|f| f.path()).collect();
    assert_eq!(paths, vec!["setup.py", "src/util.py"]);
    assert_eq!(snapshot.identifier(), "https://github.com/octo/hello");
    assert_eq!(snapshot.display_name(), "octo/hello");
    root.assert_async().await;
    src.assert_async().await;
    assert_eq!(hidden.hits_async().await, 0);
}

#[tokio::test]
async fn follows_link_header_pagination() {
    let server = MockServer::start_async().await;
    let next = server.url("/repos/octo/hello/contents-page-2");
    server
        .mock_async(|when, then| {
            when.method(GET).path("/repos/octo/hello/contents");
            then.status(200)
                .header("link", format!("<{}>; rel=\"next\"", next))
                .json_body(json!([file_item(&server, "a.py")]));
        })
        .await;
    let page_two = server
        .mock_async(|when, then| {
            when.method(GET).path("/repos/octo/hello/contents-page-2");
            then.status(200).json_body(json!([file_item(&server, "b.py")]));
        })
        .await;
    mock_raw(&server, "a.py", HANDLER).await;
    mock_raw(&server, "b.py", UTIL).await;

    let snapshot = source(&server, ScanConfig::default())
        .fetch(&CancelToken::new())
        .await
        .unwrap();

    assert_eq!(snapshot.total_files(), 2);
    page_two.assert_async().await;
}

#[tokio::test]
async fn budget_stops_listing_early() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/repos/octo/hello/contents");
            then.status(200).json_body(json!([
                file_item(&server, "a.py"),
                file_item(&server, "b.py"),
                dir_item(&server, "deep"),
            ]));
        })
        .await;
    let deep = server
        .mock_async(|when, then| {
            when.method(GET).path("/repos/octo/hello/contents/deep");
            then.status(200).json_body(json!([file_item(&server, "deep/c.py")]));
        })
        .await;
    mock_raw(&server, "a.py", HANDLER).await;
    let b = mock_raw(&server, "b.py", UTIL).await;

    let scan = ScanConfig {
        max_files_per_corpus: Some(1),
        ..ScanConfig::default()
    };
    let snapshot = source(&server, scan)
        .fetch(&CancelToken::new())
        .await
        .unwrap();

    assert_eq!(snapshot.total_files(), 1);
    assert_eq!(snapshot.files()[0].path(), "a.py");
    assert_eq!(deep.hits_async().await, 0);
    assert_eq!(b.hits_async().await, 0);
}

#[tokio::test]
async fn budget_counts_only_files_that_pass_the_size_check() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/repos/octo/hello/contents");
            then.status(200).json_body(json!([
                file_item(&server, "__init__.py"),
                dir_item(&server, "pkg"),
                file_item(&server, "real.py"),
            ]));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/repos/octo/hello/contents/pkg");
            then.status(200)
                .json_body(json!([file_item(&server, "pkg/__init__.py")]));
        })
        .await;
    mock_raw(&server, "__init__.py", "").await;
    mock_raw(&server, "pkg/__init__.py", "").await;
    mock_raw(&server, "real.py", HANDLER).await;

    let scan = ScanConfig {
        max_files_per_corpus: Some(2),
        ..ScanConfig::default()
    };
    let snapshot = source(&server, scan)
        .fetch(&CancelToken::new())
        .await
        .unwrap();

    let paths: Vec<&str> = snapshot.files().iter().map(|f| f.path()).collect();
    assert_eq!(paths, vec!["real.py"]);
}

#[tokio::test]
async fn missing_repository_is_not_found() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/repos/octo/hello/contents");
            then.status(404).json_body(json!({"message": "Not Found"}));
        })
        .await;

    let err = source(&server, ScanConfig::default())
        .fetch(&CancelToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::NotFound(_)));
}

#[tokio::test]
async fn rate_limit_is_retried_once_then_surfaced() {
    let server = MockServer::start_async().await;
    let limited = server
        .mock_async(|when, then| {
            when.method(GET).path("/repos/octo/hello/contents");
            then.status(403)
                .json_body(json!({"message": "API rate limit exceeded"}));
        })
        .await;

    let err = source(&server, ScanConfig::default())
        .fetch(&CancelToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::RateLimited { .. }));
    limited.assert_hits_async(2).await;
}

#[tokio::test]
async fn too_many_requests_is_retried_and_recovers() {
    let server = MockServer::start_async().await;
    let mut limited = server
        .mock_async(|when, then| {
            when.method(GET).path("/repos/octo/hello/contents");
            then.status(429);
        })
        .await;
    mock_raw(&server, "a.py", HANDLER).await;

    let fetch = FetchConfig {
        rate_limit_backoff_secs: 1,
        ..fetch_config(&server)
    };
    let task = tokio::spawn(async move {
        source_with(fetch, ScanConfig::default())
            .fetch(&CancelToken::new())
            .await
    });

    // Swap the 429 for a real listing while the client is backing off.
    tokio::time::timeout(Duration::from_secs(5), async {
        while limited.hits_async().await == 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();
    limited.delete_async().await;
    let listing = server
        .mock_async(|when, then| {
            when.method(GET).path("/repos/octo/hello/contents");
            then.status(200).json_body(json!([file_item(&server, "a.py")]));
        })
        .await;

    let snapshot = task.await.unwrap().unwrap();
    assert_eq!(snapshot.total_files(), 1);
    listing.assert_async().await;
}

#[tokio::test]
async fn downloads_respect_the_concurrency_cap() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/repos/octo/hello/contents");
            then.status(200).json_body(json!([
                file_item(&server, "a.py"),
                file_item(&server, "b.py"),
                file_item(&server, "c.py"),
            ]));
        })
        .await;
    for path in ["a.py", "b.py", "c.py"] {
        let raw = format!("/raw/{}", path);
        server
            .mock_async(move |when, then| {
                when.method(GET).path(raw);
                then.status(200)
                    .body(HANDLER)
                    .delay(Duration::from_millis(300));
            })
            .await;
    }

    let fetch = FetchConfig {
        max_concurrent_fetches: 1,
        ..fetch_config(&server)
    };
    let started = Instant::now();
    let snapshot = source_with(fetch, ScanConfig::default())
        .fetch(&CancelToken::new())
        .await
        .unwrap();

    assert_eq!(snapshot.total_files(), 3);
    // one request at a time: three delayed downloads run back to back
    assert!(
        started.elapsed() >= Duration::from_millis(850),
        "elapsed {:?}",
        started.elapsed()
    );
}

#[tokio::test]
async fn failed_download_drops_only_that_file() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/repos/octo/hello/contents");
            then.status(200).json_body(json!([
                file_item(&server, "a.py"),
                file_item(&server, "b.py"),
            ]));
        })
        .await;
    mock_raw(&server, "a.py", HANDLER).await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/raw/b.py");
            then.status(500);
        })
        .await;

    let snapshot = source(&server, ScanConfig::default())
        .fetch(&CancelToken::new())
        .await
        .unwrap();
    assert_eq!(snapshot.total_files(), 1);
    assert_eq!(snapshot.files()[0].path(), "a.py");
}

#[tokio::test]
async fn local_target_against_remote_comparison() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/repos/octo/hello/contents");
            then.status(200)
                .json_body(json!([file_item(&server, "lambda/handler.py")]));
        })
        .await;
    mock_raw(&server, "lambda/handler.py", HANDLER).await;

    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("handler.py"), HANDLER).unwrap();

    let mut config = Config::default();
    config.fetch = fetch_config(&server);
    config.fetch.token_env = "CLONESCAN_TEST_TOKEN_UNSET".to_string();

    let report = run_detection(
        &config,
        &dir.path().display().to_string(),
        &["octo/hello".to_string(), "not a reference!".to_string()],
        &CancelToken::new(),
        Arc::new(NoProgress),
    )
    .await
    .unwrap();

    assert_eq!(report.identical().len(), 1);
    assert_eq!(report.identical()[0].comparison_path, "lambda/handler.py");
    assert_eq!(
        report.identical()[0].comparison_corpus_id,
        "https://github.com/octo/hello"
    );
    assert_eq!(report.summary().corpora_compared, 1);
    assert_eq!(report.summary().corpora_skipped, 1);
}
