use std::path::{Path, PathBuf};

use futures_util::stream::{self, StreamExt};
use reqwest::Client;
use tracing::{debug, info, warn};

use crate::core::downloader::hash;
use crate::core::error::{LauncherError, LauncherResult};

/// A single file to fetch, with an optional SHA-1 for validation.
#[derive(Debug, Clone)]
pub struct DownloadEntry {
    pub url: String,
    pub dest: PathBuf,
    pub sha1: Option<String>,
    pub size: Option<u64>,
    /// Probe the URL first and skip silently when the remote does not have it.
    pub probe_first: bool,
}

impl DownloadEntry {
    pub fn new(url: impl Into<String>, dest: impl Into<PathBuf>, sha1: Option<String>) -> Self {
        Self {
            url: url.into(),
            dest: dest.into(),
            sha1,
            size: None,
            probe_first: false,
        }
    }

    pub fn with_size(mut self, size: Option<u64>) -> Self {
        self.size = size;
        self
    }

    pub fn probed(mut self) -> Self {
        self.probe_first = true;
        self
    }
}

/// What happened to one entry of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntryOutcome {
    Cached,
    Fetched,
    NotOnRemote,
}

/// Summary of a finished batch. Failures are kept, never raised.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub fetched: usize,
    pub cached: usize,
    pub failures: Vec<(DownloadEntry, LauncherError)>,
}

impl BatchReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Concurrent, SHA-1 validated downloader.
#[derive(Clone)]
pub struct Downloader {
    client: Client,
    /// Maximum number of parallel downloads.
    concurrency: usize,
}

impl Downloader {
    pub fn new(client: Client) -> Self {
        let concurrency = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4);

        Self {
            client,
            concurrency,
        }
    }

    pub fn with_concurrency(mut self, n: usize) -> Self {
        self.concurrency = n.max(1);
        self
    }

    // ── Remote documents ────────────────────────────────

    /// GET a URL and return its body, failing on non-2xx statuses.
    pub async fn fetch_bytes(&self, url: &str) -> LauncherResult<Vec<u8>> {
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(LauncherError::DownloadFailed {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        Ok(response.bytes().await?.to_vec())
    }

    /// Whether the remote answers a HEAD request for `url` with success.
    pub async fn probe(&self, url: &str) -> bool {
        match self.client.head(url).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                debug!("Probe failed for {}: {}", url, e);
                false
            }
        }
    }

    // ── Single file download ────────────────────────────

    /// Download a single file to `dest`, optionally validating SHA-1.
    ///
    /// The body is written to a `.part` sibling and renamed into place, so
    /// `dest` never holds a truncated or unvalidated payload.
    pub async fn download_file(
        &self,
        url: &str,
        dest: &Path,
        sha1_expected: Option<&str>,
    ) -> LauncherResult<()> {
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| LauncherError::io(parent, e))?;
        }

        let bytes = self.fetch_bytes(url).await?;

        if let Some(expected) = sha1_expected {
            let actual = hash::sha1_bytes(&bytes);
            if !actual.eq_ignore_ascii_case(expected) {
                return Err(LauncherError::Sha1Mismatch {
                    path: dest.to_path_buf(),
                    expected: expected.to_string(),
                    actual,
                });
            }
        }

        let part = part_path(dest);
        tokio::fs::write(&part, &bytes)
            .await
            .map_err(|e| LauncherError::io(&part, e))?;
        tokio::fs::rename(&part, dest)
            .await
            .map_err(|e| LauncherError::io(dest, e))?;

        debug!("Downloaded: {} -> {:?}", url, dest);
        Ok(())
    }

    /// Fetch `entry` unless a valid copy is already on disk.
    async fn sync_entry(&self, entry: &DownloadEntry) -> LauncherResult<EntryOutcome> {
        if hash::is_cached(&entry.dest, entry.sha1.as_deref()).await {
            return Ok(EntryOutcome::Cached);
        }

        if entry.probe_first && !self.probe(&entry.url).await {
            debug!("Remote does not provide {}, skipping", entry.url);
            return Ok(EntryOutcome::NotOnRemote);
        }

        self.download_file(&entry.url, &entry.dest, entry.sha1.as_deref())
            .await?;
        Ok(EntryOutcome::Fetched)
    }

    // ── Batch concurrent downloads ──────────────────────

    /// Reconcile many files concurrently using `buffer_unordered`.
    ///
    /// Resolves once every entry has finished. A failed entry is logged and
    /// reported; it never cancels its siblings and is not retried.
    pub async fn download_batch(&self, entries: Vec<DownloadEntry>) -> BatchReport {
        info!(
            "Starting batch download: {} files, concurrency={}",
            entries.len(),
            self.concurrency
        );

        let results: Vec<_> = stream::iter(entries)
            .map(|entry| async move {
                let result = self.sync_entry(&entry).await;
                (entry, result)
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let mut report = BatchReport::default();
        for (entry, result) in results {
            match result {
                Ok(EntryOutcome::Fetched) => report.fetched += 1,
                Ok(EntryOutcome::Cached) => report.cached += 1,
                Ok(EntryOutcome::NotOnRemote) => {}
                Err(e) => {
                    warn!("Failed to fetch {} -> {:?}: {}", entry.url, entry.dest, e);
                    report.failures.push((entry, e));
                }
            }
        }

        info!(
            "Batch finished: {} fetched, {} cached, {} failed",
            report.fetched,
            report.cached,
            report.failures.len()
        );
        report
    }
}

fn part_path(dest: &Path) -> PathBuf {
    let mut name = dest
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".part");
    dest.with_file_name(name)
}
