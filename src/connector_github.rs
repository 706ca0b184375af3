//! GitHub repository adapter.
//!
//! Lists a repository through the contents API and downloads each accepted
//! file from its raw `download_url`.
//!
//! # Configuration
//!
//! ```toml
//! [fetch]
//! max_concurrent_fetches = 8
//! per_request_timeout_secs = 30
//! rate_limit_backoff_secs = 60
//! api_base_url = "https://api.github.com"   # GitHub Enterprise: https://ghe.example.com/api/v3
//! token_env = "GITHUB_TOKEN"
//! ```
//!
//! # Requests
//!
//! One [`GithubClient`] is built per run and shared by every remote corpus.
//! It owns the connection pool and a semaphore that caps in-flight requests
//! across the whole run at `max_concurrent_fetches`.
//!
//! - HTTP 403 and 429 are treated as rate limiting: the client sleeps for
//!   `rate_limit_backoff_secs` and retries once, then gives up with
//!   [`FetchError::RateLimited`].
//! - HTTP 404 becomes [`FetchError::NotFound`], 401 [`FetchError::PermissionDenied`].
//! - Listing pages are followed through the `Link: <...>; rel="next"` header.
//!
//! # Listing
//!
//! Directories are walked breadth-first from an explicit worklist, one batch
//! at a time. The file budget (`scan.max_files_per_corpus`) counts catalogued
//! records, after the size check. Each batch asks for only as many files as
//! the budget has left, and listing stops once it is filled.
//!
//! # Downloads
//!
//! Each accepted file is downloaded by its own task. Tasks return their
//! record and the results are merged back into listing order, so the
//! snapshot does not depend on completion order. A failed or undecodable
//! download drops that one file; a rate limit that survives the retry fails
//! the corpus.

use async_trait::async_trait;
use globset::GlobSet;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, LINK, USER_AGENT};
use serde::Deserialize;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::cancel::CancelToken;
use crate::catalog::{CatalogBuilder, Rejection};
use crate::config::{FetchConfig, ScanConfig};
use crate::connector_fs::build_globset;
use crate::error::{DecodeError, FetchError};
use crate::models::{base_name, CorpusSnapshot, FileRecord, Origin};
use crate::source::{CorpusSource, RepoId};

/// Shared HTTP client for all remote corpora in a run.
#[derive(Clone)]
pub struct GithubClient {
    http: reqwest::Client,
    api_base: String,
    backoff: Duration,
    limiter: Arc<Semaphore>,
}

impl GithubClient {
    /// Build a client, reading the token from the variable named by
    /// `fetch.token_env`. A missing or empty variable means anonymous access.
    pub fn from_config(fetch: &FetchConfig) -> Result<Self, FetchError> {
        let token = std::env::var(&fetch.token_env)
            .ok()
            .filter(|t| !t.trim().is_empty());
        Self::with_token(fetch, token)
    }

    pub fn with_token(fetch: &FetchConfig, token: Option<String>) -> Result<Self, FetchError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(concat!("clonescan/", env!("CARGO_PKG_VERSION"))),
        );
        headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));
        if let Some(token) = token {
            match HeaderValue::from_str(&format!("token {}", token.trim())) {
                Ok(mut value) => {
                    value.set_sensitive(true);
                    headers.insert(AUTHORIZATION, value);
                }
                Err(_) => warn!(
                    env = %fetch.token_env,
                    "token contains characters not allowed in a header; continuing unauthenticated"
                ),
            }
        }

        let api_base = fetch.api_base_url.trim_end_matches('/').to_string();
        let http = reqwest::Client::builder()
            .timeout(fetch.per_request_timeout())
            .default_headers(headers)
            .build()
            .map_err(|source| FetchError::Network {
                url: api_base.clone(),
                source,
            })?;

        Ok(Self {
            http,
            api_base,
            backoff: fetch.rate_limit_backoff(),
            limiter: Arc::new(Semaphore::new(fetch.max_concurrent_fetches)),
        })
    }

    pub fn contents_url(&self, repo: &RepoId) -> String {
        format!(
            "{}/repos/{}/{}/contents",
            self.api_base, repo.owner, repo.repo
        )
    }

    /// GET with the shared request cap, one rate-limit retry, and status mapping.
    async fn get(&self, url: &str, cancel: &CancelToken) -> Result<reqwest::Response, FetchError> {
        for attempt in 0..2 {
            if attempt > 0 {
                warn!(
                    url,
                    backoff_secs = self.backoff.as_secs_f64(),
                    "rate limited, backing off before retry"
                );
                tokio::select! {
                    _ = cancel.cancelled() => return Err(FetchError::Cancelled),
                    _ = tokio::time::sleep(self.backoff) => {}
                }
            }

            let response = {
                let _permit = self
                    .limiter
                    .acquire()
                    .await
                    .map_err(|_| FetchError::Cancelled)?;
                tokio::select! {
                    _ = cancel.cancelled() => return Err(FetchError::Cancelled),
                    sent = self.http.get(url).send() => sent,
                }
            }
            .map_err(|source| FetchError::Network {
                url: url.to_string(),
                source,
            })?;

            let status = response.status();
            if status.is_success() {
                return Ok(response);
            }
            match status.as_u16() {
                403 | 429 => continue,
                401 => return Err(FetchError::PermissionDenied(url.to_string())),
                404 => return Err(FetchError::NotFound(url.to_string())),
                code => {
                    return Err(FetchError::Http {
                        status: code,
                        url: url.to_string(),
                    })
                }
            }
        }

        Err(FetchError::RateLimited {
            url: url.to_string(),
            backoff: self.backoff,
        })
    }

    async fn get_text(&self, url: &str, cancel: &CancelToken) -> Result<(String, Option<String>), FetchError> {
        let response = self.get(url, cancel).await?;
        let next = next_link(response.headers());
        let body = response.text().await.map_err(|source| FetchError::Network {
            url: url.to_string(),
            source,
        })?;
        Ok((body, next))
    }

    /// Raw bytes of one file, decoded as UTF-8. `Ok(None)` on decode failure.
    async fn download(&self, file: &RemoteFile, cancel: &CancelToken) -> Result<Option<String>, FetchError> {
        let response = self.get(&file.download_url, cancel).await?;
        let bytes = response.bytes().await.map_err(|source| FetchError::Network {
            url: file.download_url.clone(),
            source,
        })?;
        match String::from_utf8(bytes.to_vec()) {
            Ok(text) => Ok(Some(text)),
            Err(_) => {
                let err = DecodeError {
                    path: file.path.clone(),
                };
                warn!(error = %err, "skipping file");
                Ok(None)
            }
        }
    }
}

/// Extract the `rel="next"` target from a `Link` header.
fn next_link(headers: &HeaderMap) -> Option<String> {
    let link = headers.get(LINK)?.to_str().ok()?;
    link.split(',').find_map(|part| {
        let mut pieces = part.split(';');
        let target = pieces.next()?.trim();
        let is_next = pieces.any(|p| p.trim() == "rel=\"next\"");
        if !is_next {
            return None;
        }
        target
            .strip_prefix('<')
            .and_then(|t| t.strip_suffix('>'))
            .map(str::to_string)
    })
}

#[derive(Debug, Deserialize)]
struct ContentItem {
    #[serde(rename = "type")]
    kind: String,
    path: String,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    download_url: Option<String>,
}

/// A listed file that passed the path filters and awaits download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFile {
    pub path: String,
    pub download_url: String,
}

/// Incremental breadth-first walk of a repository tree.
///
/// Pages of one directory are drained before the next queued directory, so
/// files come out in the same order a full walk would produce them.
struct Listing<'a> {
    source: &'a GithubSource,
    catalog: &'a CatalogBuilder,
    excluded: &'a GlobSet,
    dirs: VecDeque<String>,
    next_page: Option<String>,
    pending: VecDeque<RemoteFile>,
}

impl<'a> Listing<'a> {
    fn new(source: &'a GithubSource, catalog: &'a CatalogBuilder, excluded: &'a GlobSet) -> Self {
        Self {
            source,
            catalog,
            excluded,
            dirs: VecDeque::from([source.client.contents_url(&source.repo)]),
            next_page: None,
            pending: VecDeque::new(),
        }
    }

    /// Up to `n` path-accepted files. Empty once the tree is exhausted.
    async fn next_batch(&mut self, n: usize, cancel: &CancelToken) -> Result<Vec<RemoteFile>, FetchError> {
        while self.pending.len() < n {
            let Some(url) = self.next_page.take().or_else(|| self.dirs.pop_front()) else {
                break;
            };
            self.list_page(&url, cancel).await?;
        }
        let take = n.min(self.pending.len());
        Ok(self.pending.drain(..take).collect())
    }

    async fn list_page(&mut self, url: &str, cancel: &CancelToken) -> Result<(), FetchError> {
        let (body, next) = self.source.client.get_text(url, cancel).await?;
        let items: Vec<ContentItem> = serde_json::from_str(&body).map_err(|e| FetchError::Payload {
            url: url.to_string(),
            message: e.to_string(),
        })?;
        debug!(url, items = items.len(), "listed directory page");

        for item in items {
            match item.kind.as_str() {
                "file" => {
                    if !self.catalog.accepts_path(&item.path) || self.excluded.is_match(&item.path) {
                        continue;
                    }
                    if let Some(download_url) = item.download_url {
                        self.pending.push_back(RemoteFile {
                            path: item.path,
                            download_url,
                        });
                    }
                }
                "dir" => {
                    if self.source.skips_dir(&item.path) {
                        continue;
                    }
                    if let Some(url) = item.url {
                        self.dirs.push_back(url);
                    }
                }
                // symlinks and submodules
                _ => {}
            }
        }
        self.next_page = next;
        Ok(())
    }
}

pub struct GithubSource {
    repo: RepoId,
    client: GithubClient,
    scan: ScanConfig,
    identifier: String,
}

impl GithubSource {
    pub fn new(repo: RepoId, client: GithubClient, scan: ScanConfig) -> Self {
        let identifier = repo.web_url();
        Self {
            repo,
            client,
            scan,
            identifier,
        }
    }

    fn skips_dir(&self, path: &str) -> bool {
        let name = base_name(path);
        name.starts_with('.') || self.scan.exclude_dirs.iter().any(|d| d == name)
    }

    async fn download_all(
        &self,
        listed: Vec<RemoteFile>,
        catalog: &CatalogBuilder,
        cancel: &CancelToken,
    ) -> Result<Vec<FileRecord>, FetchError> {
        let mut slots: Vec<Option<FileRecord>> = vec![None; listed.len()];
        let mut tasks = JoinSet::new();
        for (idx, file) in listed.into_iter().enumerate() {
            let client = self.client.clone();
            let catalog = catalog.clone();
            let cancel = cancel.clone();
            tasks.spawn(async move {
                let record = match client.download(&file, &cancel).await {
                    Ok(Some(text)) => match catalog.build(&file.path, text) {
                        Ok(record) => Ok(Some(record)),
                        Err(Rejection::TooSmall) | Err(Rejection::Extension) => Ok(None),
                    },
                    Ok(None) => Ok(None),
                    Err(e) => Err((file.path, e)),
                };
                (idx, record)
            });
        }

        loop {
            let joined = tokio::select! {
                _ = cancel.cancelled() => {
                    tasks.abort_all();
                    return Err(FetchError::Cancelled);
                }
                joined = tasks.join_next() => joined,
            };
            let Some(joined) = joined else {
                break;
            };
            match joined {
                Ok((idx, Ok(record))) => slots[idx] = record,
                Ok((_, Err((_, err @ (FetchError::RateLimited { .. } | FetchError::Cancelled))))) => {
                    tasks.abort_all();
                    return Err(err);
                }
                Ok((_, Err((path, err)))) => {
                    warn!(corpus = %self.identifier, path = %path, error = %err, "skipping file");
                }
                Err(e) => {
                    warn!(corpus = %self.identifier, error = %e, "download task failed");
                }
            }
        }

        Ok(slots.into_iter().flatten().collect())
    }
}

#[async_trait]
impl CorpusSource for GithubSource {
    fn identifier(&self) -> &str {
        &self.identifier
    }

    fn origin(&self) -> Origin {
        Origin::Remote
    }

    async fn fetch(&self, cancel: &CancelToken) -> Result<CorpusSnapshot, FetchError> {
        let catalog = CatalogBuilder::from_config(&self.scan);
        let excluded = build_globset(&self.scan.exclude_globs)?;

        let budget = self.scan.max_files_per_corpus;
        let mut listing = Listing::new(self, &catalog, &excluded);
        let mut files: Vec<FileRecord> = Vec::new();
        loop {
            // Only accepted records count toward the budget.
            let wanted = budget.map_or(usize::MAX, |limit| limit - files.len());
            let listed = listing.next_batch(wanted, cancel).await?;
            if listed.is_empty() {
                break;
            }
            files.extend(self.download_all(listed, &catalog, cancel).await?);
            if budget.is_some_and(|limit| files.len() >= limit) {
                debug!(corpus = %self.identifier, limit = ?budget, "file budget reached");
                break;
            }
        }
        info!(corpus = %self.identifier, files = files.len(), "fetched repository");

        Ok(CorpusSnapshot::new(
            self.identifier.clone(),
            self.repo.to_string(),
            Origin::Remote,
            files,
        ))
    }
}
