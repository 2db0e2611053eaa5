//! HTTP access to the Wayback CDX snapshot index.

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, instrument, warn};
use url::Url;

use super::error::IndexError;
use super::{PageOutcome, SnapshotSource};
use crate::download::{HttpClient, RetryPolicy};
use crate::types::{DEFAULT_CDX_ENDPOINT, Snapshot};

/// Retries per index page after the first attempt.
pub const INDEX_RETRIES: u32 = 5;

/// One CDX page request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CdxQuery {
    /// URL or wildcard pattern (`https://example.com/*`).
    pub url: String,
    /// Lower timestamp bound; `None` or `0` means unbounded.
    pub from: Option<u64>,
    /// Upper timestamp bound; `None` or `0` means unbounded.
    pub to: Option<u64>,
    /// Keep non-200 captures.
    pub all: bool,
    /// Page index; `None` asks for the unpaginated listing.
    pub page: Option<u32>,
}

impl CdxQuery {
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            from: None,
            to: None,
            all: false,
            page: None,
        }
    }

    /// Query parameters in the order the index expects them.
    #[must_use]
    pub fn params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("output", "json".to_string()),
            ("url", self.url.clone()),
            ("fl", "timestamp,original".to_string()),
            ("collapse", "digest".to_string()),
            ("gzip", "false".to_string()),
        ];
        if !self.all {
            params.push(("filter", "statuscode:200".to_string()));
        }
        if let Some(from) = self.from.filter(|&ts| ts != 0) {
            params.push(("from", from.to_string()));
        }
        if let Some(to) = self.to.filter(|&ts| ts != 0) {
            params.push(("to", to.to_string()));
        }
        if let Some(page) = self.page {
            params.push(("page", page.to_string()));
        }
        params
    }

    /// Full request URL against `endpoint`.
    ///
    /// # Errors
    ///
    /// Returns the parse error when `endpoint` is not a valid URL.
    pub fn to_url(&self, endpoint: &str) -> Result<Url, url::ParseError> {
        Url::parse_with_params(endpoint, self.params())
    }
}

/// Parses a CDX JSON body into snapshots.
///
/// A leading `["timestamp","original"]` header row is dropped, as are rows
/// with fewer than two columns. Non-string cells are stringified. A body
/// that is valid JSON but not a non-empty array yields no snapshots.
///
/// # Errors
///
/// Returns the JSON error when the body is not JSON at all.
pub fn parse_cdx_rows(body: &str) -> Result<Vec<Snapshot>, serde_json::Error> {
    let Value::Array(rows) = serde_json::from_str::<Value>(body)? else {
        return Ok(Vec::new());
    };

    let skip_header = rows.first().is_some_and(|row| {
        row.get(0).and_then(Value::as_str) == Some("timestamp")
            && row.get(1).and_then(Value::as_str) == Some("original")
    });

    Ok(rows
        .iter()
        .skip(usize::from(skip_header))
        .filter_map(|row| {
            let cells = row.as_array().filter(|cells| cells.len() >= 2)?;
            Some(Snapshot::new(cell_text(&cells[0]), cell_text(&cells[1])))
        })
        .collect())
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// [`SnapshotSource`] backed by the CDX HTTP API.
#[derive(Debug, Clone)]
pub struct CdxClient {
    client: HttpClient,
    endpoint: String,
    policy: RetryPolicy,
}

impl CdxClient {
    #[must_use]
    pub fn new(client: HttpClient, endpoint: impl Into<String>, policy: RetryPolicy) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            policy,
        }
    }

    /// Client for the public index with the default index retry budget.
    #[must_use]
    pub fn with_defaults(client: HttpClient) -> Self {
        Self::new(
            client,
            DEFAULT_CDX_ENDPOINT,
            RetryPolicy::with_retries(INDEX_RETRIES),
        )
    }

    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Fetches one page body; `None` means the index does not know the URL.
    async fn fetch_body(&self, url: &Url) -> Result<Option<String>, IndexError> {
        let response = self
            .client
            .inner()
            .get(url.clone())
            .send()
            .await
            .map_err(|e| IndexError::network(url.as_str(), e))?;

        let status = response.status().as_u16();
        if matches!(status, 400 | 404) {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(IndexError::http_status(url.as_str(), status));
        }

        response
            .text()
            .await
            .map(Some)
            .map_err(|e| IndexError::network(url.as_str(), e))
    }
}

#[async_trait]
impl SnapshotSource for CdxClient {
    #[instrument(skip(self), fields(url = %query.url, page = ?query.page))]
    async fn fetch_page(&self, query: &CdxQuery) -> PageOutcome {
        let url = match query.to_url(&self.endpoint) {
            Ok(url) => url,
            Err(e) => {
                warn!(endpoint = %self.endpoint, error = %e, "invalid CDX endpoint");
                return PageOutcome::Failed;
            }
        };

        let body = self
            .policy
            .run(
                || self.fetch_body(&url),
                |err, attempt| debug!(attempt, error = %err, "retrying CDX page"),
            )
            .await;

        let body = match body {
            Ok(Some(body)) => body,
            Ok(None) => return PageOutcome::NotArchived,
            Err(e) => {
                warn!(error = %e, "CDX page failed after retries");
                return PageOutcome::Failed;
            }
        };

        if body.is_empty() {
            return PageOutcome::Snapshots(Vec::new());
        }

        match parse_cdx_rows(&body) {
            Ok(snapshots) => {
                debug!(count = snapshots.len(), "CDX page parsed");
                PageOutcome::Snapshots(snapshots)
            }
            Err(source) => {
                warn!(error = %IndexError::parse(url.as_str(), source), "discarding CDX page");
                PageOutcome::Failed
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::test_support::socket_guard::start_mock_server_or_skip;
    use wiremock::matchers::{method, path, query_param, query_param_is_missing};
    use wiremock::{Mock, ResponseTemplate};

    fn client_for(uri: &str) -> CdxClient {
        CdxClient::new(
            HttpClient::try_default().unwrap(),
            format!("{uri}/cdx"),
            RetryPolicy::new(2, Duration::from_millis(1), Duration::from_millis(2)),
        )
    }

    #[test]
    fn test_params_order_and_defaults() {
        let query = CdxQuery::new("https://example.com");
        let keys: Vec<&str> = query.params().iter().map(|(k, _)| *k).collect();
        assert_eq!(keys, ["output", "url", "fl", "collapse", "gzip", "filter"]);
    }

    #[test]
    fn test_params_optional_fields() {
        let query = CdxQuery {
            from: Some(2006),
            to: Some(0),
            all: true,
            page: Some(3),
            ..CdxQuery::new("https://example.com/*")
        };
        let params = query.params();
        assert!(params.contains(&("from", "2006".to_string())));
        assert!(!params.iter().any(|(k, _)| *k == "to"));
        assert!(!params.iter().any(|(k, _)| *k == "filter"));
        assert_eq!(params.last(), Some(&("page", "3".to_string())));
    }

    #[test]
    fn test_to_url_encodes_wildcard() {
        let url = CdxQuery::new("https://example.com/*")
            .to_url(DEFAULT_CDX_ENDPOINT)
            .unwrap();
        assert!(url.as_str().starts_with("https://web.archive.org/cdx/search/xd?output=json&url=https%3A%2F%2Fexample.com%2F*"));
    }

    #[test]
    fn test_parse_cdx_rows_drops_header() {
        let body = r#"[["timestamp","original"],["20060101120000","https://example.com/"],["20070101120000","https://example.com/a.css"]]"#;
        let rows = parse_cdx_rows(body).unwrap();
        assert_eq!(
            rows,
            vec![
                Snapshot::new("20060101120000", "https://example.com/"),
                Snapshot::new("20070101120000", "https://example.com/a.css"),
            ]
        );
    }

    #[test]
    fn test_parse_cdx_rows_without_header_keeps_first_row() {
        let rows = parse_cdx_rows(r#"[["20060101120000","https://example.com/"]]"#).unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn test_parse_cdx_rows_skips_short_rows_and_coerces_cells() {
        let body = r#"[["timestamp","original"],["only-one"],"scalar",[20060101120000,"https://example.com/x"]]"#;
        let rows = parse_cdx_rows(body).unwrap();
        assert_eq!(rows, vec![Snapshot::new("20060101120000", "https://example.com/x")]);
    }

    #[test]
    fn test_parse_cdx_rows_non_array_is_empty() {
        assert!(parse_cdx_rows("{}").unwrap().is_empty());
        assert!(parse_cdx_rows("[]").unwrap().is_empty());
    }

    #[test]
    fn test_parse_cdx_rows_invalid_json_errors() {
        assert!(parse_cdx_rows("<html>").is_err());
    }

    #[tokio::test]
    async fn test_fetch_page_sends_expected_query() {
        let Some(mock_server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("GET"))
            .and(path("/cdx"))
            .and(query_param("output", "json"))
            .and(query_param("url", "https://example.com"))
            .and(query_param("fl", "timestamp,original"))
            .and(query_param("collapse", "digest"))
            .and(query_param("filter", "statuscode:200"))
            .and(query_param_is_missing("page"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"[["timestamp","original"],["20060101120000","https://example.com/"]]"#,
            ))
            .expect(1)
            .mount(&mock_server)
            .await;

        let outcome = client_for(&mock_server.uri())
            .fetch_page(&CdxQuery::new("https://example.com"))
            .await;

        assert_eq!(
            outcome,
            PageOutcome::Snapshots(vec![Snapshot::new("20060101120000", "https://example.com/")])
        );
    }

    #[tokio::test]
    async fn test_fetch_page_404_is_not_archived() {
        let Some(mock_server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("GET"))
            .and(path("/cdx"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&mock_server)
            .await;

        let outcome = client_for(&mock_server.uri())
            .fetch_page(&CdxQuery::new("https://nowhere.example"))
            .await;

        assert_eq!(outcome, PageOutcome::NotArchived);
    }

    #[tokio::test]
    async fn test_fetch_page_retries_server_errors_then_fails() {
        let Some(mock_server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("GET"))
            .and(path("/cdx"))
            .respond_with(ResponseTemplate::new(503))
            .expect(3)
            .mount(&mock_server)
            .await;

        let outcome = client_for(&mock_server.uri())
            .fetch_page(&CdxQuery::new("https://example.com"))
            .await;

        assert_eq!(outcome, PageOutcome::Failed);
    }

    #[tokio::test]
    async fn test_fetch_page_garbage_body_fails() {
        let Some(mock_server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("GET"))
            .and(path("/cdx"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>busy</html>"))
            .mount(&mock_server)
            .await;

        let outcome = client_for(&mock_server.uri())
            .fetch_page(&CdxQuery::new("https://example.com"))
            .await;

        assert_eq!(outcome, PageOutcome::Failed);
    }

    #[tokio::test]
    async fn test_fetch_page_empty_body_is_empty_page() {
        let Some(mock_server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("GET"))
            .and(path("/cdx"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&mock_server)
            .await;

        let outcome = client_for(&mock_server.uri())
            .fetch_page(&CdxQuery::new("https://example.com"))
            .await;

        assert_eq!(outcome, PageOutcome::Snapshots(Vec::new()));
    }
}
