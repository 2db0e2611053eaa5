//! Error types for snapshot index queries.

use thiserror::Error;

/// Errors from a single CDX page request.
///
/// These never escape [`crate::index::resolve_snapshots`]: a page that keeps
/// failing after its retries is reported as [`crate::index::PageOutcome::Failed`].
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("network error querying {url}: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("timeout querying {url}")]
    Timeout { url: String },

    #[error("CDX API error: HTTP {status} for {url}")]
    HttpStatus { url: String, status: u16 },

    /// The response body is not JSON.
    #[error("unparsable CDX response from {url}: {source}")]
    Parse {
        url: String,
        #[source]
        source: serde_json::Error,
    },
}

impl IndexError {
    /// Creates a network error, mapping reqwest timeouts to [`IndexError::Timeout`].
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            return Self::Timeout { url: url.into() };
        }
        Self::Network {
            url: url.into(),
            source,
        }
    }

    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
        }
    }

    pub fn parse(url: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Parse {
            url: url.into(),
            source,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_index_error_http_status_display() {
        let msg = IndexError::http_status("https://web.archive.org/cdx/search/xd", 503).to_string();
        assert!(msg.contains("503"), "Expected status in: {msg}");
        assert!(msg.contains("CDX API error"));
    }

    #[test]
    fn test_index_error_parse_display() {
        let source = serde_json::from_str::<serde_json::Value>("<html>").unwrap_err();
        let msg = IndexError::parse("https://cdx.test", source).to_string();
        assert!(msg.starts_with("unparsable CDX response from https://cdx.test"));
    }
}
