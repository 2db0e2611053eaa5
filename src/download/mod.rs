//! Download orchestrator: fetches curated captures into the mirror.
//!
//! # Features
//!
//! - Bounded worker pool (default 5 concurrent files)
//! - Exponential backoff with jitter on every failure
//! - Streaming writes (memory-efficient for large captures)
//! - File/directory conflict repair (`/about` next to `/about/team.html`)
//! - Skip-if-present unless overwriting
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use wayback_core::download::{HttpClient, resolve_paths};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = HttpClient::try_default()?;
//! let paths = resolve_paths(Path::new("mirror"), "css/site.css", "https://example.com/css/site.css");
//! std::fs::create_dir_all(&paths.dir)?;
//! client
//!     .download_to_path(
//!         "https://web.archive.org/web/20060101000000id_/https://example.com/css/site.css",
//!         &paths.file,
//!         false,
//!     )
//!     .await?;
//! # Ok(())
//! # }
//! ```

mod client;
mod constants;
pub mod directories;
mod engine;
mod error;
pub mod paths;
mod retry;

pub use client::HttpClient;
pub use constants::{
    CONNECT_TIMEOUT_SECS, DEFAULT_CONCURRENCY, MAX_CONCURRENCY, MIN_CONCURRENCY,
    READ_TIMEOUT_SECS,
};
pub use directories::{DirectoryGuard, FileClaim};
pub use engine::{DownloadEngine, DownloadSettings, EngineError, FileOutcome};
pub use error::DownloadError;
pub use paths::{ResolvedPaths, resolve_paths, sanitize_path};
pub use retry::{DEFAULT_MAX_RETRIES, RetryDecision, RetryPolicy};
