//! HTTP client wrapper for index queries and streaming capture downloads.

use std::path::Path;
use std::time::Duration;

use futures_util::StreamExt;
use reqwest::Client;
use reqwest::header::ACCEPT_ENCODING;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, instrument};
use url::Url;

use super::constants::{CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS};
use super::error::DownloadError;
use crate::user_agent;

/// HTTP client shared by every request of a mirror run.
///
/// Create once and clone freely; clones share the connection pool.
///
/// ```no_run
/// use std::path::Path;
/// use wayback_core::download::HttpClient;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = HttpClient::try_default()?;
/// let bytes = client
///     .download_to_path(
///         "https://web.archive.org/web/20060101000000id_/https://example.com/",
///         Path::new("./index.html"),
///         false,
///     )
///     .await?;
/// println!("wrote {bytes} bytes");
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    /// Creates a client with the default 30s connect and 5min total timeouts.
    ///
    /// # Errors
    ///
    /// Returns the reqwest builder error if the TLS backend cannot be initialised.
    pub fn try_default() -> Result<Self, reqwest::Error> {
        Self::try_new(
            Duration::from_secs(CONNECT_TIMEOUT_SECS),
            Duration::from_secs(READ_TIMEOUT_SECS),
        )
    }

    /// Creates a client with explicit timeouts.
    ///
    /// # Errors
    ///
    /// Returns the reqwest builder error if the TLS backend cannot be initialised.
    #[instrument(level = "debug")]
    pub fn try_new(connect_timeout: Duration, read_timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(read_timeout)
            .user_agent(user_agent::default_user_agent())
            .build()?;
        Ok(Self { client })
    }

    /// The underlying reqwest client.
    #[must_use]
    pub fn inner(&self) -> &Client {
        &self.client
    }

    /// Streams the body at `url` into `path`, returning the bytes written.
    ///
    /// The request asks for an identity encoding so captures are stored
    /// byte-for-byte. A non-success status is an error unless
    /// `keep_error_bodies` is set, in which case the error page is written
    /// like any other response. A partially written file is removed when the
    /// stream fails.
    ///
    /// # Errors
    ///
    /// Returns `DownloadError` if the URL is invalid, the request fails,
    /// the status is rejected, or writing to disk fails.
    #[instrument(skip(self, path), fields(path = %path.display()))]
    pub async fn download_to_path(
        &self,
        url: &str,
        path: &Path,
        keep_error_bodies: bool,
    ) -> Result<u64, DownloadError> {
        let parsed = Url::parse(url).map_err(|_| DownloadError::invalid_url(url))?;

        let response = self
            .client
            .get(parsed)
            .header(ACCEPT_ENCODING, "identity")
            .send()
            .await
            .map_err(|e| DownloadError::network(url, e))?;

        let status = response.status();
        if !status.is_success() && !keep_error_bodies {
            return Err(DownloadError::http_status(url, status.as_u16()));
        }

        let mut file = File::create(path)
            .await
            .map_err(|e| DownloadError::io(path, e))?;

        match stream_to_file(&mut file, response, url, path).await {
            Ok(bytes) => {
                debug!(bytes, status = status.as_u16(), "capture written");
                Ok(bytes)
            }
            Err(err) => {
                debug!("cleaning up partial file after error");
                drop(file);
                let _ = tokio::fs::remove_file(path).await;
                Err(err)
            }
        }
    }
}

/// Streams response body to file, returning bytes written.
async fn stream_to_file(
    file: &mut File,
    response: reqwest::Response,
    url: &str,
    file_path: &Path,
) -> Result<u64, DownloadError> {
    let mut writer = BufWriter::new(file);
    let mut stream = response.bytes_stream();
    let mut bytes_written: u64 = 0;

    while let Some(chunk_result) = stream.next().await {
        let chunk = chunk_result.map_err(|e| DownloadError::network(url, e))?;

        writer
            .write_all(&chunk)
            .await
            .map_err(|e| DownloadError::io(file_path, e))?;

        bytes_written += chunk.len() as u64;
    }

    writer
        .flush()
        .await
        .map_err(|e| DownloadError::io(file_path, e))?;

    Ok(bytes_written)
}
