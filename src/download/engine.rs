//! Download engine for concurrent capture downloads with retry support.
//!
//! The engine drains a curated file list with a fixed-size worker pool.
//! Every file runs in its own Tokio task holding a semaphore permit, goes
//! through the run's [`RetryPolicy`], and records exactly one
//! [`FileOutcome`] into the shared [`ProgressStats`]. A failed file never
//! aborts the batch.
//!
//! # Example
//!
//! ```no_run
//! use std::path::PathBuf;
//! use std::sync::Arc;
//! use wayback_core::download::{DownloadEngine, DownloadSettings, HttpClient, RetryPolicy};
//! use wayback_core::mirror::NoopObserver;
//!
//! # async fn example(files: Vec<wayback_core::FileToDownload>) -> Result<(), Box<dyn std::error::Error>> {
//! let engine = DownloadEngine::new(5, RetryPolicy::default())?;
//! let client = HttpClient::try_default()?;
//! let settings = DownloadSettings::new(PathBuf::from("websites/example.com"));
//! let stats = engine
//!     .download_all(&files, &client, settings, Arc::new(NoopObserver), None)
//!     .await?;
//! println!("downloaded {}, failed {}", stats.downloaded, stats.errors);
//! # Ok(())
//! # }
//! ```

mod task;

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tokio::sync::Semaphore;
use tracing::{debug, info, instrument, warn};

use super::constants::{MAX_CONCURRENCY, MIN_CONCURRENCY};
use super::directories::DirectoryGuard;
use super::retry::RetryPolicy;
use super::HttpClient;
use crate::mirror::MirrorObserver;
use crate::types::{DEFAULT_ARCHIVE_ENDPOINT, FileToDownload, ProgressStats};

/// Error type for download engine operations.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Invalid concurrency value provided.
    #[error(
        "invalid concurrency value {value}: must be between {MIN_CONCURRENCY} and {MAX_CONCURRENCY}"
    )]
    InvalidConcurrency { value: usize },

    /// Semaphore was closed unexpectedly.
    #[error("semaphore closed unexpectedly")]
    SemaphoreClosed,
}

/// Final state of one file in a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOutcome {
    Downloaded,
    /// Already present locally and overwriting is off.
    Skipped,
    Failed,
}

/// Where and how captures are written.
#[derive(Debug, Clone)]
pub struct DownloadSettings {
    /// Mirror root every file id is resolved under.
    pub backup_root: PathBuf,
    /// Raw capture endpoint, see [`crate::urls::wayback_file_url`].
    pub archive_endpoint: String,
    /// Re-download files that already exist.
    pub overwrite: bool,
    /// Persist non-success responses and empty bodies instead of failing.
    pub keep_error_bodies: bool,
}

impl DownloadSettings {
    #[must_use]
    pub fn new(backup_root: PathBuf) -> Self {
        Self {
            backup_root,
            archive_endpoint: DEFAULT_ARCHIVE_ENDPOINT.to_string(),
            overwrite: false,
            keep_error_bodies: false,
        }
    }
}

/// Run-wide counters shared by every download task.
///
/// Updates happen under one lock so observers always see a consistent
/// snapshot.
#[derive(Debug, Default)]
pub(crate) struct StatsTracker {
    inner: Mutex<ProgressStats>,
}

impl StatsTracker {
    fn new(total: usize) -> Self {
        Self {
            inner: Mutex::new(ProgressStats {
                total,
                ..ProgressStats::default()
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ProgressStats> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Records a file's final state and returns the updated totals.
    fn record(&self, outcome: FileOutcome) -> ProgressStats {
        let mut stats = self.lock();
        match outcome {
            FileOutcome::Downloaded => stats.downloaded += 1,
            FileOutcome::Skipped => stats.skipped += 1,
            FileOutcome::Failed => stats.errors += 1,
        }
        stats.clone()
    }

    fn record_retry(&self) {
        self.lock().retries += 1;
    }

    fn mark_interrupted(&self) {
        self.lock().interrupted = true;
    }

    fn finish(&self, elapsed: Duration) -> ProgressStats {
        let mut stats = self.lock();
        stats.duration_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
        stats.clone()
    }
}

/// Download engine for concurrent file downloads with retry support.
///
/// # Concurrency Model
///
/// - Each file runs in its own Tokio task
/// - A semaphore permit is acquired before spawning each task
/// - Permits are released automatically when the task finishes (RAII)
/// - Files are scheduled in list order
#[derive(Debug)]
pub struct DownloadEngine {
    semaphore: Arc<Semaphore>,
    concurrency: usize,
    retry_policy: RetryPolicy,
}

impl DownloadEngine {
    /// Creates a new download engine.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidConcurrency`] if `concurrency` is
    /// outside 1..=100.
    ///
    /// ```
    /// use wayback_core::download::{DownloadEngine, EngineError, RetryPolicy};
    ///
    /// assert!(DownloadEngine::new(5, RetryPolicy::default()).is_ok());
    /// assert!(matches!(
    ///     DownloadEngine::new(0, RetryPolicy::default()),
    ///     Err(EngineError::InvalidConcurrency { value: 0 })
    /// ));
    /// ```
    #[instrument(level = "debug", skip(retry_policy))]
    pub fn new(concurrency: usize, retry_policy: RetryPolicy) -> Result<Self, EngineError> {
        if !(MIN_CONCURRENCY..=MAX_CONCURRENCY).contains(&concurrency) {
            return Err(EngineError::InvalidConcurrency { value: concurrency });
        }

        debug!(
            concurrency,
            max_attempts = retry_policy.max_attempts(),
            "creating download engine"
        );

        Ok(Self {
            semaphore: Arc::new(Semaphore::new(concurrency)),
            concurrency,
            retry_policy,
        })
    }

    #[must_use]
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    #[must_use]
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry_policy
    }

    /// Downloads every file in `files` and returns the final counters.
    ///
    /// `observer` receives a progress snapshot after each file and a retry
    /// notification before each backoff sleep. When `interrupt` is raised no
    /// further files are scheduled; files already running finish and are
    /// counted, and the returned stats have `interrupted` set.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::SemaphoreClosed`] if the semaphore is closed.
    /// Individual download failures do NOT cause this method to error.
    #[instrument(skip_all, fields(files = files.len(), root = %settings.backup_root.display()))]
    pub async fn download_all(
        &self,
        files: &[FileToDownload],
        client: &HttpClient,
        settings: DownloadSettings,
        observer: Arc<dyn MirrorObserver>,
        interrupt: Option<Arc<AtomicBool>>,
    ) -> Result<ProgressStats, EngineError> {
        let started = Instant::now();
        let ctx = Arc::new(task::TaskContext {
            client: client.clone(),
            directories: DirectoryGuard::new(settings.backup_root.clone()),
            settings,
            policy: self.retry_policy.clone(),
            stats: StatsTracker::new(files.len()),
            observer,
        });
        let interrupted = || interrupt.as_ref().is_some_and(|flag| flag.load(Ordering::SeqCst));

        info!(concurrency = self.concurrency, "starting downloads");

        let mut handles = Vec::with_capacity(files.len());
        for file in files {
            if interrupted() {
                break;
            }

            let permit = Arc::clone(&self.semaphore)
                .acquire_owned()
                .await
                .map_err(|_| EngineError::SemaphoreClosed)?;

            // The flag may have been raised while waiting for a free worker.
            if interrupted() {
                break;
            }

            let ctx = Arc::clone(&ctx);
            let file = file.clone();
            handles.push(tokio::spawn(async move {
                let _permit = permit;
                let outcome = task::download_file(&ctx, &file).await;
                let snapshot = ctx.stats.record(outcome);
                ctx.observer.on_progress(&snapshot);
            }));
        }

        if interrupted() {
            warn!(
                scheduled = handles.len(),
                total = files.len(),
                "interrupted, waiting for in-flight downloads"
            );
            ctx.stats.mark_interrupted();
        }

        debug!(task_count = handles.len(), "waiting for downloads to complete");
        for handle in handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "download task panicked");
                let snapshot = ctx.stats.record(FileOutcome::Failed);
                ctx.observer.on_progress(&snapshot);
            }
        }

        let stats = ctx.stats.finish(started.elapsed());
        info!(
            downloaded = stats.downloaded,
            skipped = stats.skipped,
            errors = stats.errors,
            retries = stats.retries,
            duration_ms = stats.duration_ms,
            "downloads complete"
        );
        Ok(stats)
    }
}
