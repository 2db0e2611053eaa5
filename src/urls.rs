//! Helpers for turning archived URLs into mirror-relative identifiers.

use tracing::trace;

/// Extracts the host part of `url` for use as the default mirror directory name.
///
/// URLs without a `//` separator are returned unchanged.
///
/// ```
/// use wayback_core::urls::backup_name;
///
/// assert_eq!(backup_name("https://example.com/path"), "example.com");
/// assert_eq!(backup_name("example.com"), "example.com");
/// ```
#[must_use]
pub fn backup_name(url: &str) -> String {
    if url.contains("//") {
        url.split('/').nth(2).unwrap_or(url).to_string()
    } else {
        url.to_string()
    }
}

/// Derives the file identifier of an archived URL.
///
/// The identifier is everything after the host, percent-decoded. Byte
/// sequences that do not decode to UTF-8 are repaired with [`tidy_bytes`].
/// Returns `None` when the value contains no `/` at all.
///
/// ```
/// use wayback_core::urls::extract_file_id;
///
/// assert_eq!(extract_file_id("https://example.com/foo/bar.html").as_deref(), Some("foo/bar.html"));
/// assert_eq!(extract_file_id("https://example.com/").as_deref(), Some(""));
/// assert_eq!(extract_file_id("no-slash"), None);
/// ```
#[must_use]
pub fn extract_file_id(url: &str) -> Option<String> {
    if !url.contains('/') {
        return None;
    }
    let Some(path) = url.splitn(4, '/').nth(3) else {
        return Some(String::new());
    };
    if path.is_empty() {
        return Some(String::new());
    }

    let decoded = urlencoding::decode_binary(path.as_bytes()).into_owned();
    Some(String::from_utf8(decoded).unwrap_or_else(|err| {
        trace!(path, "percent-decoded path is not UTF-8, repairing");
        tidy_bytes(err.as_bytes())
    }))
}

/// Repairs a byte string that is not valid UTF-8.
///
/// Valid UTF-8 runs are kept as-is; every invalid byte is reinterpreted as
/// the Latin-1 character with the same code point.
#[must_use]
pub fn tidy_bytes(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    for chunk in bytes.utf8_chunks() {
        out.push_str(chunk.valid());
        out.extend(chunk.invalid().iter().map(|&b| char::from(b)));
    }
    out
}

/// Builds the raw-bytes retrieval URL for a capture.
///
/// The `id_` modifier asks the archive for the resource exactly as captured,
/// without its replay toolbar or rewritten links.
#[must_use]
pub fn wayback_file_url(archive_endpoint: &str, timestamp: &str, original_url: &str) -> String {
    format!(
        "{}/{timestamp}id_/{original_url}",
        archive_endpoint.trim_end_matches('/')
    )
}
