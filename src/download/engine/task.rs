//! Per-file download task.

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, instrument, warn};

use super::{DownloadSettings, FileOutcome, StatsTracker};
use crate::download::directories::DirectoryGuard;
use crate::download::paths::resolve_paths;
use crate::download::retry::RetryPolicy;
use crate::download::{DownloadError, HttpClient};
use crate::mirror::MirrorObserver;
use crate::types::FileToDownload;
use crate::urls::wayback_file_url;

/// State shared by every task of one run.
pub(super) struct TaskContext {
    pub(super) client: HttpClient,
    pub(super) settings: DownloadSettings,
    pub(super) directories: DirectoryGuard,
    pub(super) policy: RetryPolicy,
    pub(super) stats: StatsTracker,
    pub(super) observer: Arc<dyn MirrorObserver>,
}

/// Fetches one capture into the mirror.
#[instrument(skip_all, fields(file_id = %file.file_id, timestamp = %file.timestamp))]
pub(super) async fn download_file(ctx: &TaskContext, file: &FileToDownload) -> FileOutcome {
    let settings = &ctx.settings;
    let paths = resolve_paths(&settings.backup_root, &file.file_id, &file.file_url);

    if let Err(e) = ctx.directories.ensure_directory(&paths.dir).await {
        warn!(dir = %paths.dir.display(), error = %e, "cannot create directory");
        return FileOutcome::Failed;
    }

    let claim = match ctx.directories.claim_file(&paths.file).await {
        Ok(claim) => claim,
        Err(e) => {
            warn!(path = %paths.file.display(), error = %e, "cannot create file");
            return FileOutcome::Failed;
        }
    };
    if claim.existed && !settings.overwrite {
        debug!(path = %claim.path.display(), "already present, skipping");
        return FileOutcome::Skipped;
    }

    let url = wayback_file_url(&settings.archive_endpoint, &file.timestamp, &file.file_url);
    let keep = settings.keep_error_bodies;
    let target = claim.path.as_path();

    let result = ctx
        .policy
        .run(
            || ctx.client.download_to_path(&url, target, keep),
            |err, attempt| {
                debug!(attempt, error = %err, "retrying download");
                ctx.stats.record_retry();
                ctx.observer.on_retry(&file.file_url, err, attempt);
            },
        )
        .await;

    match result {
        Ok(0) if !keep => {
            remove_artifact(target).await;
            let err = DownloadError::empty_download(&file.file_url);
            warn!(error = %err, "download failed");
            FileOutcome::Failed
        }
        Ok(bytes) => {
            debug!(bytes, path = %target.display(), "download complete");
            FileOutcome::Downloaded
        }
        Err(err) => {
            remove_if_empty(target).await;
            warn!(
                url = %file.file_url,
                attempts = ctx.policy.max_attempts(),
                error = %err,
                "download failed after all attempts"
            );
            FileOutcome::Failed
        }
    }
}

async fn remove_if_empty(path: &Path) {
    if let Ok(meta) = tokio::fs::metadata(path).await
        && meta.is_file()
        && meta.len() == 0
    {
        remove_artifact(path).await;
    }
}

async fn remove_artifact(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        debug!(path = %path.display(), error = %e, "could not remove artifact");
    }
}
