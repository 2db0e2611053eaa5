//! Shared helpers for integration tests.
#![allow(dead_code)]

#[path = "../../src/test_support/socket_guard.rs"]
pub mod socket_guard;

use std::path::Path;
use std::time::Duration;

use wayback_core::{ArchiveEndpoints, DownloadOptions};
use wiremock::MockServer;

pub const SITE: &str = "https://example.com";

/// Options pointing both archive endpoints at `server`, writing under `dir`,
/// with millisecond backoff.
pub fn mock_options(server: &MockServer, dir: &Path) -> DownloadOptions {
    DownloadOptions {
        directory: Some(dir.join("mirror")),
        backoff_base_delay: Duration::from_millis(1),
        backoff_max_delay: Duration::from_millis(4),
        endpoints: ArchiveEndpoints {
            cdx: format!("{}/cdx", server.uri()),
            archive: server.uri(),
        },
        ..DownloadOptions::new(SITE)
    }
}

/// CDX JSON body with a header row followed by `(timestamp, url)` rows.
pub fn cdx_body(rows: &[(&str, &str)]) -> String {
    let mut all = vec![serde_json::json!(["timestamp", "original"])];
    all.extend(rows.iter().map(|(ts, url)| serde_json::json!([ts, url])));
    serde_json::Value::Array(all).to_string()
}

/// Archive path a capture is fetched from.
pub fn capture_path(timestamp: &str, url: &str) -> String {
    format!("/{timestamp}id_/{url}")
}
