//! Link rewriter: localizes same-site references in a finished mirror.
//!
//! Runs after all downloads, sequentially over the curated file list. Only
//! `.html`/`.htm` and `.css` files are touched. A reference is rewritten to
//! a relative path only when it points at the same site and the target file
//! actually exists in the mirror; anything else is left byte-for-byte
//! unchanged.

mod css;
mod html;

use std::ops::Range;
use std::path::{Component, Path, PathBuf};

use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::download::resolve_paths;
use crate::types::FileToDownload;
use crate::urls::extract_file_id;

/// Counters from one rewrite pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RewriteStats {
    /// HTML/CSS files read.
    pub scanned: usize,
    /// Files whose content changed and was written back.
    pub rewritten: usize,
    /// References replaced across all files.
    pub links: usize,
}

/// Rewrites links in every downloaded HTML/CSS file of `files`.
///
/// `base_url` is the site being mirrored; it decides which references are
/// same-site. Each reference is resolved against the path of the page it
/// appears in, on the site's scheme and host.
#[instrument(skip(files), fields(root = %root.display(), files = files.len()))]
pub fn rewrite_links(root: &Path, base_url: &str, files: &[FileToDownload]) -> RewriteStats {
    let mut stats = RewriteStats::default();
    let Some(site) = parse_site_url(base_url) else {
        warn!(base_url, "cannot parse site URL, skipping link rewriting");
        return stats;
    };
    let resolver = LinkResolver { root, site };

    for file in files {
        let page = resolve_paths(root, &file.file_id, &file.file_url).file;
        let Some(kind) = PageKind::of(&page) else {
            continue;
        };

        let content = match std::fs::read_to_string(&page) {
            Ok(content) => content,
            Err(e) => {
                debug!(path = %page.display(), error = %e, "skipping unreadable file");
                continue;
            }
        };
        stats.scanned += 1;

        let page_base = resolver.page_base(&file.file_url);
        let page_ref = PageRef {
            file: &page,
            base: &page_base,
        };
        let replacements = match kind {
            PageKind::Html => html::find_replacements(&content, &page_ref, &resolver),
            PageKind::Css => css::find_replacements(&content, &page_ref, &resolver),
        };
        if replacements.is_empty() {
            continue;
        }

        let count = replacements.len();
        let rewritten = apply_replacements(&content, replacements);
        if rewritten == content {
            continue;
        }
        match std::fs::write(&page, rewritten) {
            Ok(()) => {
                debug!(path = %page.display(), links = count, "links rewritten");
                stats.rewritten += 1;
                stats.links += count;
            }
            Err(e) => warn!(path = %page.display(), error = %e, "cannot write rewritten file"),
        }
    }

    info!(
        scanned = stats.scanned,
        rewritten = stats.rewritten,
        links = stats.links,
        "link rewriting complete"
    );
    stats
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PageKind {
    Html,
    Css,
}

impl PageKind {
    fn of(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "html" | "htm" => Some(Self::Html),
            "css" => Some(Self::Css),
            _ => None,
        }
    }
}

/// The page whose references are being rewritten.
pub(crate) struct PageRef<'a> {
    /// Local file of the page.
    pub(crate) file: &'a Path,
    /// URL references are resolved against.
    pub(crate) base: &'a Url,
}

/// Maps references to files in the mirror.
pub(crate) struct LinkResolver<'a> {
    root: &'a Path,
    site: Url,
}

impl LinkResolver<'_> {
    /// The capture URL moved onto the site's scheme, host and port; the
    /// site root when the capture URL does not parse.
    fn page_base(&self, file_url: &str) -> Url {
        let Ok(mut url) = Url::parse(file_url) else {
            return self.site.clone();
        };
        let moved = url.set_scheme(self.site.scheme()).is_ok()
            && url.set_host(self.site.host_str()).is_ok()
            && url.set_port(self.site.port()).is_ok();
        if moved { url } else { self.site.clone() }
    }

    /// Relative link from `page` to the local copy of `reference`, if any.
    pub(crate) fn relative_link(&self, page: &PageRef<'_>, reference: &str) -> Option<String> {
        let target = self.local_target(page.base, reference)?;
        let from_dir = page.file.parent().unwrap_or(self.root);
        Some(relative_path(from_dir, &target))
    }

    fn local_target(&self, base: &Url, reference: &str) -> Option<PathBuf> {
        let mut resolved = base.join(reference).ok()?;
        if !same_site(&resolved, &self.site) {
            return None;
        }
        resolved.set_fragment(None);
        resolved.set_query(None);

        let file_id = extract_file_id(resolved.as_str())?;
        let target = resolve_paths(self.root, &file_id, resolved.as_str()).file;
        target.is_file().then_some(target)
    }
}

fn parse_site_url(base_url: &str) -> Option<Url> {
    Url::parse(base_url)
        .ok()
        .filter(Url::has_host)
        .or_else(|| Url::parse(&format!("http://{base_url}")).ok())
}

/// Same origin, or same scheme and same host ignoring a leading `www.`.
#[must_use]
pub fn same_site(url: &Url, site: &Url) -> bool {
    if url.origin() == site.origin() {
        return true;
    }
    let normalize = |host: &str| {
        let host = host.to_ascii_lowercase();
        host.strip_prefix("www.").map(str::to_string).unwrap_or(host)
    };
    match (url.host_str(), site.host_str()) {
        (Some(a), Some(b)) => url.scheme() == site.scheme() && normalize(a) == normalize(b),
        _ => false,
    }
}

/// Relative path from directory `from_dir` to file `to`, `/`-separated.
#[must_use]
pub fn relative_path(from_dir: &Path, to: &Path) -> String {
    let from: Vec<Component<'_>> = from_dir.components().collect();
    let to_parts: Vec<Component<'_>> = to.components().collect();
    let common = from
        .iter()
        .zip(&to_parts)
        .take_while(|(a, b)| a == b)
        .count();

    let mut parts: Vec<String> = Vec::new();
    parts.extend(std::iter::repeat_n("..".to_string(), from.len() - common));
    parts.extend(
        to_parts[common..]
            .iter()
            .map(|c| c.as_os_str().to_string_lossy().into_owned()),
    );
    parts.join("/")
}

/// A substitution of `text` for the bytes in `range`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Replacement {
    pub(crate) range: Range<usize>,
    pub(crate) text: String,
}

/// Applies non-overlapping replacements from the last to the first so
/// earlier offsets stay valid.
pub(crate) fn apply_replacements(content: &str, mut replacements: Vec<Replacement>) -> String {
    replacements.sort_by_key(|r| std::cmp::Reverse(r.range.start));
    let mut out = content.to_string();
    for replacement in replacements {
        out.replace_range(replacement.range, &replacement.text);
    }
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    use tempfile::TempDir;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    fn file(file_id: &str) -> FileToDownload {
        FileToDownload {
            file_id: file_id.to_string(),
            file_url: format!("https://example.com/{file_id}"),
            timestamp: "20060101000000".to_string(),
        }
    }

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    #[test]
    fn test_same_site_rules() {
        let site = url("https://example.com/");
        assert!(same_site(&url("https://example.com/a"), &site));
        assert!(same_site(&url("https://WWW.example.com/a"), &site));
        assert!(!same_site(&url("http://example.com/a"), &site));
        assert!(!same_site(&url("https://cdn.example.com/a"), &site));
        assert!(!same_site(&url("mailto:someone@example.com"), &site));
    }

    #[test]
    fn test_relative_path() {
        let root = Path::new("/m");
        assert_eq!(relative_path(root, &root.join("css/a.css")), "css/a.css");
        assert_eq!(
            relative_path(&root.join("blog"), &root.join("css/a.css")),
            "../css/a.css"
        );
        assert_eq!(
            relative_path(&root.join("css"), &root.join("css/bg.png")),
            "bg.png"
        );
        assert_eq!(
            relative_path(&root.join("a/b"), &root.join("index.html")),
            "../../index.html"
        );
    }

    #[test]
    fn test_apply_replacements_back_to_front() {
        let content = "aa XX bb YY cc";
        let replacements = vec![
            Replacement {
                range: 3..5,
                text: "longer".to_string(),
            },
            Replacement {
                range: 9..11,
                text: "z".to_string(),
            },
        ];
        assert_eq!(apply_replacements(content, replacements), "aa longer bb z cc");
    }

    #[test]
    fn test_parse_site_url_without_scheme() {
        assert_eq!(
            parse_site_url("example.com").unwrap().as_str(),
            "http://example.com/"
        );
    }

    #[test]
    fn test_rewrite_links_end_to_end() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        write(
            root,
            "index.html",
            r#"<link href="https://example.com/css/style.css"><a href="https://example.com/about/">About</a><img src="https://example.com/missing.png"><a href="https://other.org/x.html">x</a>"#,
        );
        write(root, "css/style.css", r#"body { background: url("https://example.com/css/bg.png") }"#);
        write(root, "css/bg.png", "png");
        write(root, "about/index.html", r#"<a href="/">home</a>"#);
        write(root, "app.js", r#"var u = "https://example.com/css/style.css";"#);

        let files = vec![
            FileToDownload {
                file_id: String::new(),
                file_url: "https://example.com/".to_string(),
                timestamp: "20060101000000".to_string(),
            },
            file("css/style.css"),
            file("css/bg.png"),
            FileToDownload {
                file_id: "about/".to_string(),
                file_url: "https://example.com/about/".to_string(),
                timestamp: "20060101000000".to_string(),
            },
            file("app.js"),
        ];

        let stats = rewrite_links(root, "https://example.com", &files);

        assert_eq!(
            std::fs::read_to_string(root.join("index.html")).unwrap(),
            r#"<link href="css/style.css"><a href="about/index.html">About</a><img src="https://example.com/missing.png"><a href="https://other.org/x.html">x</a>"#
        );
        assert_eq!(
            std::fs::read_to_string(root.join("css/style.css")).unwrap(),
            r#"body { background: url("bg.png") }"#
        );
        assert_eq!(
            std::fs::read_to_string(root.join("about/index.html")).unwrap(),
            r#"<a href="../index.html">home</a>"#
        );
        assert_eq!(
            std::fs::read_to_string(root.join("app.js")).unwrap(),
            r#"var u = "https://example.com/css/style.css";"#
        );
        assert_eq!(
            stats,
            RewriteStats {
                scanned: 3,
                rewritten: 3,
                links: 4,
            }
        );
    }

    #[test]
    fn test_rewrite_links_http_capture_under_https_site() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        write(
            root,
            "blog/post.html",
            r#"<link href="/css/style.css"><img src="../img/a.png">"#,
        );
        write(root, "css/style.css", "body{}");
        write(root, "img/a.png", "png");
        let post = FileToDownload {
            file_id: "blog/post.html".to_string(),
            file_url: "http://www.example.com:80/blog/post.html".to_string(),
            timestamp: "20060101000000".to_string(),
        };

        let stats = rewrite_links(root, "https://example.com", &[post]);

        assert_eq!(
            std::fs::read_to_string(root.join("blog/post.html")).unwrap(),
            r#"<link href="../css/style.css"><img src="../img/a.png">"#
        );
        assert_eq!(stats.links, 2);
    }

    #[test]
    fn test_page_base_falls_back_to_site() {
        let resolver = LinkResolver {
            root: Path::new("/m"),
            site: url("https://example.com/"),
        };
        assert_eq!(
            resolver.page_base("http://example.com/a/b.html").as_str(),
            "https://example.com/a/b.html"
        );
        assert_eq!(resolver.page_base("not a url").as_str(), "https://example.com/");
    }

    #[test]
    fn test_rewrite_links_skips_non_utf8_files() {
        let temp = TempDir::new().unwrap();
        let bytes = b"<a href=\"https://example.com/\">\xff</a>";
        std::fs::write(temp.path().join("latin.html"), bytes).unwrap();
        write(temp.path(), "index.html", "home");

        let stats = rewrite_links(temp.path(), "https://example.com", &[file("latin.html")]);

        assert_eq!(stats.scanned, 0);
        assert_eq!(std::fs::read(temp.path().join("latin.html")).unwrap(), bytes);
    }

    #[test]
    fn test_rewrite_links_unchanged_file_not_counted() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "page.html", r##"<a href="#top">top</a>"##);

        let stats = rewrite_links(temp.path(), "https://example.com", &[file("page.html")]);

        assert_eq!(stats.scanned, 1);
        assert_eq!(stats.rewritten, 0);
    }
}
