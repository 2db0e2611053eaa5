//! Wayback Machine Mirror Core Library
//!
//! Reconstructs a browsable offline copy of a website from the captures the
//! Internet Archive holds for it.
//!
//! # Architecture
//!
//! A run is a four-stage pipeline:
//! - [`index`] - pages through the CDX snapshot index
//! - [`curation`] - filters and deduplicates captures into a download list
//! - [`download`] - concurrent, retrying, streaming download engine
//! - [`rewrite`] - localizes same-site links in downloaded HTML/CSS
//!
//! [`mirror`] wires the stages together behind [`mirror::download`] and
//! [`mirror::list_files`].

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod curation;
pub mod download;
pub mod index;
pub mod mirror;
pub mod rewrite;
pub mod types;
pub mod urls;

#[cfg(test)]
pub mod test_support;
pub(crate) mod user_agent;

// Re-export commonly used types
pub use curation::{CurationOptions, UrlFilter, curate_file_list};
pub use download::{
    DEFAULT_CONCURRENCY, DEFAULT_MAX_RETRIES, DownloadEngine, DownloadError, EngineError,
    HttpClient, RetryDecision, RetryPolicy,
};
pub use index::{CdxClient, CdxQuery, DEFAULT_MAX_PAGES, SnapshotSource, resolve_snapshots};
pub use mirror::{
    MirrorError, MirrorObserver, NoopObserver, download, download_interruptible, list_files,
};
pub use rewrite::{RewriteStats, rewrite_links};
pub use types::{
    ArchiveEndpoints, DownloadOptions, DownloadReport, FileToDownload, ProgressStats, Snapshot,
};
