//! Mapping from archived file identifiers to paths inside the mirror.
//!
//! A file identifier is the decoded URL path of a capture (`""` for the site
//! root). Identifiers that look like directories are stored as
//! `{id}/index.html` so the mirror can be browsed straight from disk.

use std::path::{Path, PathBuf};

/// Directory to create and file to write for one identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPaths {
    pub dir: PathBuf,
    pub file: PathBuf,
}

/// Resolves where the capture for `file_id` is stored under `root`.
///
/// The identifier is treated as a directory when `file_url` ends with `/` or
/// the last identifier segment has no `.` in it.
///
/// ```
/// use std::path::Path;
/// use wayback_core::download::resolve_paths;
///
/// let root = Path::new("mirror");
/// assert_eq!(resolve_paths(root, "", "https://a.com/").file, root.join("index.html"));
/// assert_eq!(resolve_paths(root, "about", "https://a.com/about").file, root.join("about/index.html"));
/// assert_eq!(resolve_paths(root, "css/a.css", "https://a.com/css/a.css").dir, root.join("css"));
/// ```
#[must_use]
pub fn resolve_paths(root: &Path, file_id: &str, file_url: &str) -> ResolvedPaths {
    if file_id.is_empty() {
        return ResolvedPaths {
            dir: root.to_path_buf(),
            file: root.join("index.html"),
        };
    }

    let segments: Vec<&str> = file_id.split('/').collect();
    let last = segments.last().copied().unwrap_or_default();
    let is_dir = file_url.ends_with('/') || !last.contains('.');

    if is_dir {
        let dir = join_segments(root, &segments);
        let file = dir.join("index.html");
        ResolvedPaths { dir, file }
    } else {
        let parents = &segments[..segments.len() - 1];
        let dir = join_segments(root, parents);
        let file = join_segments(&dir, &[last]);
        ResolvedPaths { dir, file }
    }
}

/// Appends identifier segments to `base`.
///
/// Empty, `.` and `..` segments are dropped so an identifier can never escape
/// the mirror root.
fn join_segments(base: &Path, segments: &[&str]) -> PathBuf {
    let mut path = base.to_path_buf();
    for segment in segments {
        if segment.is_empty() || *segment == "." || *segment == ".." {
            continue;
        }
        if cfg!(windows) {
            path.push(sanitize_path(segment));
        } else {
            path.push(segment);
        }
    }
    path
}

/// Percent-encodes characters Windows forbids in path components.
///
/// `: * ? & = < > \ |` become `%` followed by their lowercase hex code.
#[must_use]
pub fn sanitize_path(segment: &str) -> String {
    let mut out = String::with_capacity(segment.len());
    for ch in segment.chars() {
        if matches!(ch, ':' | '*' | '?' | '&' | '=' | '<' | '>' | '\\' | '|') {
            out.push_str(&format!("%{:x}", u32::from(ch)));
        } else {
            out.push(ch);
        }
    }
    out
}
