//! Directory creation with file/directory conflict repair.
//!
//! Archived sites routinely contain both `/about` (captured as a file) and
//! `/about/team.html`. When a plain file sits where a directory is needed,
//! it is moved to `{path}/index.html` and the directory is created in its
//! place, so both captures survive.
//!
//! The reverse order happens too: once `/about/` is a directory, the `/about`
//! capture is written to `about/index.html` instead.
//!
//! Concurrent workers may hit the same conflict at once. Repairs and file
//! claims are serialised per path with an async mutex held in a `DashMap`;
//! the guard is cloned out of the map before awaiting so no shard lock is
//! held across an await point.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info, instrument};

const DIRECTORY_INDEX: &str = "index.html";

/// Exclusive hold on the file one capture is written to.
///
/// While the claim is alive no worker can move the file aside to make room
/// for a directory.
#[derive(Debug)]
pub struct FileClaim {
    /// Where the capture goes.
    pub path: PathBuf,
    /// The file was already present before the claim.
    pub existed: bool,
    _guard: OwnedMutexGuard<()>,
}

/// Creates directories under a mirror root, repairing file/directory conflicts.
#[derive(Debug)]
pub struct DirectoryGuard {
    root: PathBuf,
    locks: DashMap<PathBuf, Arc<Mutex<()>>>,
}

impl DirectoryGuard {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            locks: DashMap::new(),
        }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Ensures `dir` exists as a directory.
    ///
    /// Plain files found on the way (below the root) are relocated to
    /// `{file}/index.html`. No existing content is ever deleted.
    ///
    /// # Errors
    ///
    /// Returns the underlying IO error when the directory cannot be created
    /// and no repairable conflict explains the failure.
    #[instrument(skip(self), fields(dir = %dir.display()))]
    pub async fn ensure_directory(&self, dir: &Path) -> io::Result<()> {
        let max_repairs = dir.components().count() + 1;
        let mut repairs = 0;

        loop {
            let err = match tokio::fs::create_dir_all(dir).await {
                Ok(()) => return Ok(()),
                Err(err) => err,
            };

            if repairs >= max_repairs {
                return Err(err);
            }
            let Some(conflict) = self.find_file_conflict(dir).await else {
                return Err(err);
            };

            self.relocate_file(&conflict).await?;
            repairs += 1;
        }
    }

    /// Claims `file` for writing.
    ///
    /// When `file` already is a directory the claim points at
    /// `{file}/index.html`. A missing file is created empty so a concurrent
    /// repair sees it and waits for the claim to be released.
    ///
    /// # Errors
    ///
    /// Returns the underlying IO error when the file cannot be created.
    #[instrument(skip(self), fields(file = %file.display()))]
    pub async fn claim_file(&self, file: &Path) -> io::Result<FileClaim> {
        let guard = self.lock_for(file).lock_owned().await;

        let mut path = file.to_path_buf();
        if is_directory(&path).await {
            path.push(DIRECTORY_INDEX);
        }
        let mut created = create_placeholder(&path).await?;
        // A directory may have appeared since the check above.
        if !created && path == file && is_directory(&path).await {
            path.push(DIRECTORY_INDEX);
            created = create_placeholder(&path).await?;
        }
        if path != file {
            debug!(path = %path.display(), "writing into existing directory");
        }

        Ok(FileClaim {
            path,
            existed: !created,
            _guard: guard,
        })
    }

    fn lock_for(&self, path: &Path) -> Arc<Mutex<()>> {
        self.locks
            .entry(path.to_path_buf())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// First ancestor of `dir` (strictly below the root, `dir` included) that
    /// is a plain file or is missing.
    ///
    /// A missing ancestor usually means another worker is mid-repair; taking
    /// its lock in [`Self::relocate_file`] waits for that repair to finish.
    async fn find_file_conflict(&self, dir: &Path) -> Option<PathBuf> {
        let relative = dir.strip_prefix(&self.root).ok()?;
        let mut current = self.root.clone();
        for component in relative.components() {
            current.push(component);
            match tokio::fs::metadata(&current).await {
                Ok(meta) if meta.is_file() => return Some(current),
                Ok(_) => {}
                Err(_) => return Some(current),
            }
        }
        None
    }

    /// Moves the file at `path` to `path/index.html`.
    async fn relocate_file(&self, path: &Path) -> io::Result<()> {
        let lock = self.lock_for(path);
        let _guard = lock.lock().await;

        // Another worker may have repaired it while we waited.
        let still_file = tokio::fs::metadata(path)
            .await
            .map(|meta| meta.is_file())
            .unwrap_or(false);
        if !still_file {
            debug!(path = %path.display(), "conflict already repaired");
            return Ok(());
        }

        let mut temp = path.as_os_str().to_os_string();
        temp.push(".temp");
        let temp = PathBuf::from(temp);

        tokio::fs::rename(path, &temp).await?;
        tokio::fs::create_dir_all(path).await?;
        tokio::fs::rename(&temp, path.join(DIRECTORY_INDEX)).await?;

        info!(path = %path.display(), "moved file aside to make room for directory");
        Ok(())
    }
}

async fn is_directory(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .is_ok_and(|meta| meta.is_dir())
}

/// Creates an empty file at `path`; `false` when something already exists there.
async fn create_placeholder(path: &Path) -> io::Result<bool> {
    match tokio::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await
    {
        Ok(_) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Ok(false),
        Err(e) => Err(e),
    }
}
