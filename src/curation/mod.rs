//! Curation engine: reduces a raw snapshot stream to a download list.
//!
//! For every snapshot, in stream order:
//!
//! 1. Derive the file id from the URL; URLs without a `/` are dropped.
//! 2. Drop it if the exclude filter matches the URL, or if an only filter
//!    is set and does not match.
//! 3. Key it by file id, or by `{timestamp}/{file id}` when every capture
//!    is kept.
//! 4. On a repeated key, keep the strictly newer capture (by timestamp
//!    string comparison) at the original key's position.
//!
//! The default result is sorted newest-first; with all timestamps the
//! insertion order is kept.

mod filter;

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use tracing::{debug, instrument};

pub use filter::UrlFilter;

use crate::types::{DownloadOptions, FileToDownload, Snapshot};
use crate::urls::extract_file_id;

/// The subset of run options curation looks at.
#[derive(Debug, Clone, Default)]
pub struct CurationOptions {
    pub only_filter: Option<UrlFilter>,
    pub exclude_filter: Option<UrlFilter>,
    pub all_timestamps: bool,
}

impl CurationOptions {
    /// Parses the filters carried by `options`.
    #[must_use]
    pub fn from_download_options(options: &DownloadOptions) -> Self {
        Self {
            only_filter: options.only_filter.as_deref().and_then(UrlFilter::parse),
            exclude_filter: options.exclude_filter.as_deref().and_then(UrlFilter::parse),
            all_timestamps: options.all_timestamps,
        }
    }

    fn accepts(&self, url: &str) -> bool {
        if self.exclude_filter.as_ref().is_some_and(|f| f.matches(url)) {
            return false;
        }
        self.only_filter.as_ref().is_none_or(|f| f.matches(url))
    }
}

/// Turns `snapshots` into the list of files to download.
///
/// ```
/// use wayback_core::curation::{CurationOptions, curate_file_list};
/// use wayback_core::Snapshot;
///
/// let snapshots = vec![
///     Snapshot::new("20060101000000", "https://example.com/a.css"),
///     Snapshot::new("20080101000000", "https://example.com/a.css"),
///     Snapshot::new("20070101000000", "https://example.com/b.css"),
/// ];
/// let files = curate_file_list(&snapshots, &CurationOptions::default());
///
/// assert_eq!(files.len(), 2);
/// assert_eq!(files[0].file_id, "a.css");
/// assert_eq!(files[0].timestamp, "20080101000000");
/// ```
#[must_use]
#[instrument(skip_all, fields(snapshots = snapshots.len(), all_timestamps = options.all_timestamps))]
pub fn curate_file_list(snapshots: &[Snapshot], options: &CurationOptions) -> Vec<FileToDownload> {
    let mut files: Vec<FileToDownload> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();
    let mut filtered = 0usize;

    for snapshot in snapshots {
        let Some(file_id) = extract_file_id(&snapshot.url) else {
            continue;
        };
        if !options.accepts(&snapshot.url) {
            filtered += 1;
            continue;
        }

        let key = if options.all_timestamps {
            format!("{}/{file_id}", snapshot.timestamp)
        } else {
            file_id
        };

        match positions.entry(key) {
            Entry::Occupied(slot) => {
                let existing = &mut files[*slot.get()];
                if !options.all_timestamps && existing.timestamp < snapshot.timestamp {
                    existing.file_url.clone_from(&snapshot.url);
                    existing.timestamp.clone_from(&snapshot.timestamp);
                }
            }
            Entry::Vacant(slot) => {
                let file = FileToDownload {
                    file_id: slot.key().clone(),
                    file_url: snapshot.url.clone(),
                    timestamp: snapshot.timestamp.clone(),
                };
                slot.insert(files.len());
                files.push(file);
            }
        }
    }

    if !options.all_timestamps {
        files.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    }

    debug!(files = files.len(), filtered, "file list curated");
    files
}
