//! Constants for the download module (timeouts, concurrency bounds).

/// Default HTTP connect timeout (30 seconds).
pub const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default HTTP read timeout (5 minutes for large captures).
pub const READ_TIMEOUT_SECS: u64 = 300;

/// Default number of concurrent file downloads.
pub const DEFAULT_CONCURRENCY: usize = 5;

/// Smallest accepted worker count.
pub const MIN_CONCURRENCY: usize = 1;

/// Largest accepted worker count.
pub const MAX_CONCURRENCY: usize = 100;
