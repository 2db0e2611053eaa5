//! Program interface: one call runs resolution, curation, downloading and
//! optional link rewriting for a site.
//!
//! ```no_run
//! use std::sync::Arc;
//! use wayback_core::DownloadOptions;
//! use wayback_core::mirror::{NoopObserver, download};
//!
//! # async fn example() -> Result<(), wayback_core::mirror::MirrorError> {
//! let options = DownloadOptions {
//!     rewrite_links: true,
//!     ..DownloadOptions::new("https://example.com")
//! };
//! let report = download(&options, Arc::new(NoopObserver)).await?;
//! println!(
//!     "{} files, {} downloaded into {}",
//!     report.files.len(),
//!     report.stats.downloaded,
//!     report.backup_path.display()
//! );
//! # Ok(())
//! # }
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::curation::{CurationOptions, curate_file_list};
use crate::download::{
    DownloadEngine, DownloadError, DownloadSettings, EngineError, HttpClient, RetryPolicy,
};
use crate::index::{CdxClient, INDEX_RETRIES, SnapshotListing, resolve_snapshots};
use crate::rewrite::rewrite_links;
use crate::types::{DownloadOptions, DownloadReport, FileToDownload, ProgressStats};

/// Receives progress notifications from a run.
///
/// Every method defaults to doing nothing; implement the ones you need.
/// Methods are called from worker tasks, so implementations must be cheap
/// and thread-safe.
pub trait MirrorObserver: Send + Sync {
    /// An index page was fetched. Page `0` is the exact-URL query; wildcard
    /// pages are reported as `page + 1`.
    fn on_snapshot_page(&self, _page: u32, _count: usize) {}

    /// Curation finished with `count` files to download.
    fn on_file_list_ready(&self, _count: usize) {}

    /// A file reached its final state.
    fn on_progress(&self, _stats: &ProgressStats) {}

    /// A download attempt failed and will be retried after a backoff.
    fn on_retry(&self, _file_url: &str, _error: &DownloadError, _attempt: u32) {}

    /// Link rewriting is about to start.
    fn on_rewrite_links(&self) {}
}

/// Observer that ignores every notification.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl MirrorObserver for NoopObserver {}

/// Fatal errors of a run. Per-file failures are counted, never raised.
#[derive(Debug, Error)]
pub enum MirrorError {
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("failed to build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),

    #[error("cannot create backup directory {path}: {source}")]
    BackupRoot {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Mirrors `options.base_url` into [`DownloadOptions::backup_path`].
///
/// # Errors
///
/// Returns [`MirrorError`] for invalid concurrency, an HTTP client that
/// cannot be built, or a backup root that cannot be created.
pub async fn download(
    options: &DownloadOptions,
    observer: Arc<dyn MirrorObserver>,
) -> Result<DownloadReport, MirrorError> {
    run(options, observer, None).await
}

/// Like [`download`], but stops scheduling new files once `interrupt` is
/// raised. Files already in flight finish and are counted.
///
/// # Errors
///
/// Same as [`download`].
pub async fn download_interruptible(
    options: &DownloadOptions,
    observer: Arc<dyn MirrorObserver>,
    interrupt: Arc<AtomicBool>,
) -> Result<DownloadReport, MirrorError> {
    run(options, observer, Some(interrupt)).await
}

/// Resolves and curates the file list without downloading anything.
///
/// # Errors
///
/// Returns [`MirrorError::ClientBuild`] when the HTTP client cannot be built.
pub async fn list_files(options: &DownloadOptions) -> Result<Vec<FileToDownload>, MirrorError> {
    let client = build_client(options)?;
    let (files, _) = collect_files(options, &client, &NoopObserver).await;
    Ok(files)
}

#[instrument(skip_all, fields(base_url = %options.base_url))]
async fn run(
    options: &DownloadOptions,
    observer: Arc<dyn MirrorObserver>,
    interrupt: Option<Arc<AtomicBool>>,
) -> Result<DownloadReport, MirrorError> {
    let engine = DownloadEngine::new(options.concurrency, options.download_retry_policy())?;
    let client = build_client(options)?;
    let backup_path = options.backup_path();

    let (files, listing) = collect_files(options, &client, observer.as_ref()).await;
    observer.on_file_list_ready(files.len());

    let mut report = DownloadReport {
        stats: ProgressStats::default(),
        backup_path,
        index_truncated: listing.truncated,
        rewrite: None,
        files,
    };
    if report.files.is_empty() {
        warn!("no files to download");
        return Ok(report);
    }

    tokio::fs::create_dir_all(&report.backup_path)
        .await
        .map_err(|source| MirrorError::BackupRoot {
            path: report.backup_path.clone(),
            source,
        })?;

    let settings = DownloadSettings {
        archive_endpoint: options.endpoints.archive.clone(),
        overwrite: options.overwrite,
        keep_error_bodies: options.all,
        ..DownloadSettings::new(report.backup_path.clone())
    };
    report.stats = engine
        .download_all(
            &report.files,
            &client,
            settings,
            Arc::clone(&observer),
            interrupt,
        )
        .await?;

    if options.rewrite_links {
        observer.on_rewrite_links();
        let root = report.backup_path.clone();
        let base_url = options.base_url.clone();
        let files = report.files.clone();
        match tokio::task::spawn_blocking(move || rewrite_links(&root, &base_url, &files)).await {
            Ok(stats) => report.rewrite = Some(stats),
            Err(e) => warn!(error = %e, "link rewriting task failed"),
        }
    }

    info!(
        files = report.files.len(),
        downloaded = report.stats.downloaded,
        errors = report.stats.errors,
        "mirror complete"
    );
    Ok(report)
}

fn build_client(options: &DownloadOptions) -> Result<HttpClient, MirrorError> {
    HttpClient::try_new(options.connect_timeout, options.read_timeout)
        .map_err(MirrorError::ClientBuild)
}

async fn collect_files(
    options: &DownloadOptions,
    client: &HttpClient,
    observer: &dyn MirrorObserver,
) -> (Vec<FileToDownload>, SnapshotListing) {
    let index = CdxClient::new(
        client.clone(),
        options.endpoints.cdx.clone(),
        RetryPolicy::new(
            INDEX_RETRIES,
            options.backoff_base_delay,
            options.backoff_max_delay,
        ),
    );
    let listing = resolve_snapshots(&index, &options.base_url, options, observer).await;
    let files = curate_file_list(
        &listing.snapshots,
        &CurationOptions::from_download_options(options),
    );
    (files, listing)
}
