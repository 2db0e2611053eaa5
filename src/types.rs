//! Core data model shared by the resolver, curation, download and rewrite stages.

use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;

use crate::download::{
    CONNECT_TIMEOUT_SECS, DEFAULT_CONCURRENCY, DEFAULT_MAX_RETRIES, READ_TIMEOUT_SECS, RetryPolicy,
};
use crate::index::DEFAULT_MAX_PAGES;
use crate::rewrite::RewriteStats;
use crate::urls::backup_name;

/// Default CDX index endpoint.
pub const DEFAULT_CDX_ENDPOINT: &str = "https://web.archive.org/cdx/search/xd";

/// Default endpoint for raw archived bytes.
pub const DEFAULT_ARCHIVE_ENDPOINT: &str = "https://web.archive.org/web";

/// One archived capture of a URL, as reported by the index.
///
/// `timestamp` is a fixed-width `YYYYMMDDHHMMSS` string, so comparing it as a
/// string orders captures chronologically.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub timestamp: String,
    pub url: String,
}

impl Snapshot {
    #[must_use]
    pub fn new(timestamp: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            timestamp: timestamp.into(),
            url: url.into(),
        }
    }
}

/// A curated download target.
///
/// Serialized with camelCase keys for `--list` output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileToDownload {
    /// Decoded URL path without scheme and host; `""` is the site root.
    pub file_id: String,
    /// Original URL as archived.
    pub file_url: String,
    /// Capture timestamp used to fetch the bytes.
    pub timestamp: String,
}

/// Base URLs of the two archive services a run talks to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEndpoints {
    /// CDX snapshot index query endpoint.
    pub cdx: String,
    /// Raw capture endpoint; files are fetched from `{archive}/{timestamp}id_/{url}`.
    pub archive: String,
}

impl Default for ArchiveEndpoints {
    fn default() -> Self {
        Self {
            cdx: DEFAULT_CDX_ENDPOINT.to_string(),
            archive: DEFAULT_ARCHIVE_ENDPOINT.to_string(),
        }
    }
}

/// Configuration for a single mirror run.
///
/// Build with [`DownloadOptions::new`] and override fields as needed:
///
/// ```
/// use wayback_core::DownloadOptions;
///
/// let options = DownloadOptions {
///     concurrency: 10,
///     rewrite_links: true,
///     ..DownloadOptions::new("https://example.com")
/// };
/// assert_eq!(options.max_retries, 5);
/// ```
#[derive(Debug, Clone)]
pub struct DownloadOptions {
    /// Site URL to mirror.
    pub base_url: String,
    /// Output directory; defaults to `websites/{domain}/`.
    pub directory: Option<PathBuf>,
    /// Only query the exact URL, never the wildcard listing.
    pub exact_url: bool,
    /// Keep every capture instead of only the most recent per path.
    pub all_timestamps: bool,
    /// Lower timestamp bound (numeric prefix, `0` means unbounded).
    pub from_timestamp: Option<u64>,
    /// Upper timestamp bound (numeric prefix, `0` means unbounded).
    pub to_timestamp: Option<u64>,
    /// Include filter: literal substring or `/pattern/flags`.
    pub only_filter: Option<String>,
    /// Exclude filter: literal substring or `/pattern/flags`.
    pub exclude_filter: Option<String>,
    /// Include non-200 captures and persist error bodies.
    pub all: bool,
    /// Ceiling on wildcard index pages.
    pub max_pages: u32,
    /// Download worker count.
    pub concurrency: usize,
    /// Re-download files that already exist locally.
    pub overwrite: bool,
    /// Retries per file after the first attempt.
    pub max_retries: u32,
    /// Rewrite same-site links to relative paths after downloading.
    pub rewrite_links: bool,
    /// Base delay for exponential backoff.
    pub backoff_base_delay: Duration,
    /// Cap for exponential backoff.
    pub backoff_max_delay: Duration,
    /// HTTP connect timeout.
    pub connect_timeout: Duration,
    /// HTTP total request timeout.
    pub read_timeout: Duration,
    /// Archive service endpoints.
    pub endpoints: ArchiveEndpoints,
}

impl DownloadOptions {
    /// Creates options for `base_url` with every other setting at its default.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        let defaults = RetryPolicy::default();
        Self {
            base_url: base_url.into(),
            directory: None,
            exact_url: false,
            all_timestamps: false,
            from_timestamp: None,
            to_timestamp: None,
            only_filter: None,
            exclude_filter: None,
            all: false,
            max_pages: DEFAULT_MAX_PAGES,
            concurrency: DEFAULT_CONCURRENCY,
            overwrite: false,
            max_retries: DEFAULT_MAX_RETRIES,
            rewrite_links: false,
            backoff_base_delay: defaults.base_delay(),
            backoff_max_delay: defaults.max_delay(),
            connect_timeout: Duration::from_secs(CONNECT_TIMEOUT_SECS),
            read_timeout: Duration::from_secs(READ_TIMEOUT_SECS),
            endpoints: ArchiveEndpoints::default(),
        }
    }

    /// Root directory the mirror is written under.
    #[must_use]
    pub fn backup_path(&self) -> PathBuf {
        match &self.directory {
            Some(dir) => dir.clone(),
            None => PathBuf::from("websites").join(backup_name(&self.base_url)),
        }
    }

    /// Retry policy for resource downloads.
    #[must_use]
    pub fn download_retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_retries,
            self.backoff_base_delay,
            self.backoff_max_delay,
        )
    }

    /// Likely explanations for a run that found nothing to download.
    #[must_use]
    pub fn empty_result_reasons(&self) -> Vec<String> {
        let mut reasons = vec!["Site is not in the Wayback Machine archive.".to_string()];
        if self.from_timestamp.is_some_and(|ts| ts != 0) {
            reasons.push("From timestamp too far in the future.".to_string());
        }
        if self.to_timestamp.is_some_and(|ts| ts != 0) {
            reasons.push("To timestamp too far in the past.".to_string());
        }
        if let Some(only) = self.only_filter.as_deref().filter(|f| !f.is_empty()) {
            reasons.push(format!("Only filter too restrictive: {only}"));
        }
        if let Some(exclude) = self.exclude_filter.as_deref().filter(|f| !f.is_empty()) {
            reasons.push(format!("Exclude filter too wide: {exclude}"));
        }
        reasons
    }
}

/// Aggregate counters for the download phase.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressStats {
    pub total: usize,
    pub downloaded: usize,
    pub skipped: usize,
    pub errors: usize,
    pub retries: usize,
    pub duration_ms: u64,
    /// Set when the run stopped scheduling files because of an interrupt.
    pub interrupted: bool,
}

impl ProgressStats {
    /// Files that reached a final state.
    #[must_use]
    pub fn completed(&self) -> usize {
        self.downloaded + self.skipped + self.errors
    }
}

/// Result of a full mirror run.
#[derive(Debug, Clone)]
pub struct DownloadReport {
    /// Curated file list the run worked on.
    pub files: Vec<FileToDownload>,
    /// Final download statistics.
    pub stats: ProgressStats,
    /// Root directory of the mirror.
    pub backup_path: PathBuf,
    /// Whether snapshot pagination stopped on a failed page or the page ceiling.
    pub index_truncated: bool,
    /// Counters of the link rewriting pass, when it ran.
    pub rewrite: Option<RewriteStats>,
}
