//! Snapshot index resolver.
//!
//! Discovers every archived capture for a site by paging through the CDX
//! index:
//!
//! 1. Query the exact URL once (no `page` parameter).
//! 2. Stop there in exact-URL mode or when nothing was found.
//! 3. Otherwise page through the wildcard listing (`url/*`) from page 0
//!    until a page comes back empty, a page fails, or the page ceiling is
//!    reached.
//!
//! Results are concatenated in fetch order; deduplication is the curation
//! stage's job.

mod cdx;
mod error;

use async_trait::async_trait;
use tracing::{debug, info, instrument, warn};

pub use cdx::{CdxClient, CdxQuery, INDEX_RETRIES, parse_cdx_rows};
pub use error::IndexError;

use crate::mirror::MirrorObserver;
use crate::types::{DownloadOptions, Snapshot};

/// Default ceiling on wildcard index pages.
pub const DEFAULT_MAX_PAGES: u32 = 100;

/// Result of fetching one index page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageOutcome {
    /// The page was fetched and parsed; it may be empty.
    Snapshots(Vec<Snapshot>),
    /// The index answered 400/404: nothing archived for this query.
    NotArchived,
    /// Retries exhausted or the body was unusable.
    Failed,
}

impl PageOutcome {
    /// Snapshots on the page; `NotArchived` and `Failed` pages have none.
    #[must_use]
    pub fn into_snapshots(self) -> Vec<Snapshot> {
        match self {
            Self::Snapshots(snapshots) => snapshots,
            Self::NotArchived | Self::Failed => Vec::new(),
        }
    }
}

/// A source of index pages.
///
/// Uses `async_trait` so resolvers can take `&dyn SnapshotSource`; Rust 2024
/// native async traits are not object-safe.
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    /// Fetches one page. Never fails outright; failures become
    /// [`PageOutcome::Failed`].
    async fn fetch_page(&self, query: &CdxQuery) -> PageOutcome;
}

/// Everything the resolver found for a site.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnapshotListing {
    /// Captures in fetch order, duplicates included.
    pub snapshots: Vec<Snapshot>,
    /// Pages requested, the initial exact-URL page included.
    pub pages: u32,
    /// Pagination stopped on a failed page or at the page ceiling, so the
    /// listing may be incomplete.
    pub truncated: bool,
}

/// Wildcard form of `base_url` used for paginated listing.
#[must_use]
pub fn wildcard_url(base_url: &str) -> String {
    if base_url.ends_with('/') {
        format!("{base_url}*")
    } else {
        format!("{base_url}/*")
    }
}

/// Collects every snapshot for `base_url`.
///
/// `observer.on_snapshot_page` is called with `(0, n)` for the exact-URL
/// page and `(page + 1, n)` for each non-empty wildcard page.
#[instrument(skip(source, options, observer), fields(exact = options.exact_url, max_pages = options.max_pages))]
pub async fn resolve_snapshots(
    source: &dyn SnapshotSource,
    base_url: &str,
    options: &DownloadOptions,
    observer: &dyn MirrorObserver,
) -> SnapshotListing {
    let base_query = CdxQuery {
        url: base_url.to_string(),
        from: options.from_timestamp,
        to: options.to_timestamp,
        all: options.all,
        page: None,
    };

    let first = source.fetch_page(&base_query).await;
    let mut listing = SnapshotListing {
        truncated: first == PageOutcome::Failed,
        pages: 1,
        ..SnapshotListing::default()
    };
    listing.snapshots = first.into_snapshots();
    observer.on_snapshot_page(0, listing.snapshots.len());

    if options.exact_url || listing.snapshots.is_empty() {
        finish(&listing);
        return listing;
    }

    let wildcard = wildcard_url(base_url);
    let mut reached_ceiling = true;
    for page in 0..options.max_pages {
        let query = CdxQuery {
            url: wildcard.clone(),
            page: Some(page),
            ..base_query.clone()
        };
        let outcome = source.fetch_page(&query).await;
        listing.pages += 1;

        if outcome == PageOutcome::Failed {
            listing.truncated = true;
            reached_ceiling = false;
            break;
        }
        let snapshots = outcome.into_snapshots();
        if snapshots.is_empty() {
            debug!(page, "empty page, listing complete");
            reached_ceiling = false;
            break;
        }
        observer.on_snapshot_page(page + 1, snapshots.len());
        listing.snapshots.extend(snapshots);
    }
    if reached_ceiling {
        listing.truncated = true;
    }

    finish(&listing);
    listing
}

fn finish(listing: &SnapshotListing) {
    if listing.truncated {
        warn!(
            pages = listing.pages,
            snapshots = listing.snapshots.len(),
            "snapshot listing may be incomplete"
        );
    } else {
        info!(
            pages = listing.pages,
            snapshots = listing.snapshots.len(),
            "snapshot listing complete"
        );
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::mirror::NoopObserver;

    /// Serves scripted outcomes keyed by `(url, page)` and records queries.
    struct ScriptedSource {
        pages: Vec<((String, Option<u32>), PageOutcome)>,
        seen: Mutex<Vec<CdxQuery>>,
    }

    impl ScriptedSource {
        fn new(pages: Vec<((&str, Option<u32>), PageOutcome)>) -> Self {
            Self {
                pages: pages
                    .into_iter()
                    .map(|((url, page), outcome)| ((url.to_string(), page), outcome))
                    .collect(),
                seen: Mutex::new(Vec::new()),
            }
        }

        fn seen(&self) -> Vec<CdxQuery> {
            self.seen.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl SnapshotSource for ScriptedSource {
        async fn fetch_page(&self, query: &CdxQuery) -> PageOutcome {
            self.seen.lock().unwrap().push(query.clone());
            self.pages
                .iter()
                .find(|((url, page), _)| *url == query.url && *page == query.page)
                .map_or(PageOutcome::Snapshots(Vec::new()), |(_, outcome)| {
                    outcome.clone()
                })
        }
    }

    #[derive(Default)]
    struct PageRecorder {
        pages: Mutex<Vec<(u32, usize)>>,
    }

    impl MirrorObserver for PageRecorder {
        fn on_snapshot_page(&self, page: u32, count: usize) {
            self.pages.lock().unwrap().push((page, count));
        }
    }

    fn snaps(n: usize, prefix: &str) -> PageOutcome {
        PageOutcome::Snapshots(
            (0..n)
                .map(|i| Snapshot::new("20060101120000", format!("{prefix}{i}")))
                .collect(),
        )
    }

    const BASE: &str = "https://example.com";
    const WILD: &str = "https://example.com/*";

    #[test]
    fn test_wildcard_url() {
        assert_eq!(wildcard_url("https://example.com"), "https://example.com/*");
        assert_eq!(wildcard_url("https://example.com/"), "https://example.com/*");
    }

    #[tokio::test]
    async fn test_resolve_paginates_until_empty_page() {
        let source = ScriptedSource::new(vec![
            ((BASE, None), snaps(1, "root")),
            ((WILD, Some(0)), snaps(3, "a")),
            ((WILD, Some(1)), snaps(2, "b")),
        ]);
        let recorder = PageRecorder::default();
        let options = DownloadOptions::new(BASE);

        let listing = resolve_snapshots(&source, BASE, &options, &recorder).await;

        assert_eq!(listing.snapshots.len(), 6);
        assert_eq!(listing.snapshots[0].url, "root0");
        assert_eq!(listing.snapshots[5].url, "b1");
        assert_eq!(listing.pages, 4);
        assert!(!listing.truncated);
        assert_eq!(
            *recorder.pages.lock().unwrap(),
            vec![(0, 1), (1, 3), (2, 2)]
        );
        let pages: Vec<Option<u32>> = source.seen().iter().map(|q| q.page).collect();
        assert_eq!(pages, vec![None, Some(0), Some(1), Some(2)]);
    }

    #[tokio::test]
    async fn test_resolve_exact_url_stops_after_first_page() {
        let source = ScriptedSource::new(vec![
            ((BASE, None), snaps(2, "root")),
            ((WILD, Some(0)), snaps(3, "a")),
        ]);
        let options = DownloadOptions {
            exact_url: true,
            ..DownloadOptions::new(BASE)
        };

        let listing = resolve_snapshots(&source, BASE, &options, &NoopObserver).await;

        assert_eq!(listing.snapshots.len(), 2);
        assert_eq!(source.seen().len(), 1);
    }

    #[tokio::test]
    async fn test_resolve_empty_first_page_skips_wildcard() {
        let source = ScriptedSource::new(vec![((BASE, None), PageOutcome::NotArchived)]);
        let options = DownloadOptions::new(BASE);

        let listing = resolve_snapshots(&source, BASE, &options, &NoopObserver).await;

        assert!(listing.snapshots.is_empty());
        assert!(!listing.truncated);
        assert_eq!(source.seen().len(), 1);
    }

    #[tokio::test]
    async fn test_resolve_failed_page_marks_truncated() {
        let source = ScriptedSource::new(vec![
            ((BASE, None), snaps(1, "root")),
            ((WILD, Some(0)), snaps(2, "a")),
            ((WILD, Some(1)), PageOutcome::Failed),
            ((WILD, Some(2)), snaps(2, "never")),
        ]);
        let options = DownloadOptions::new(BASE);

        let listing = resolve_snapshots(&source, BASE, &options, &NoopObserver).await;

        assert_eq!(listing.snapshots.len(), 3);
        assert!(listing.truncated);
        assert_eq!(source.seen().len(), 3);
    }

    #[tokio::test]
    async fn test_resolve_page_ceiling_marks_truncated() {
        let source = ScriptedSource::new(vec![
            ((BASE, None), snaps(1, "root")),
            ((WILD, Some(0)), snaps(1, "a")),
            ((WILD, Some(1)), snaps(1, "b")),
            ((WILD, Some(2)), snaps(1, "c")),
        ]);
        let options = DownloadOptions {
            max_pages: 2,
            ..DownloadOptions::new(BASE)
        };

        let listing = resolve_snapshots(&source, BASE, &options, &NoopObserver).await;

        assert_eq!(listing.snapshots.len(), 3);
        assert!(listing.truncated);
        assert_eq!(listing.pages, 3);
    }

    #[tokio::test]
    async fn test_resolve_forwards_timestamp_bounds() {
        let source = ScriptedSource::new(vec![((BASE, None), snaps(1, "root"))]);
        let options = DownloadOptions {
            from_timestamp: Some(2005),
            to_timestamp: Some(2010),
            all: true,
            ..DownloadOptions::new(BASE)
        };

        resolve_snapshots(&source, BASE, &options, &NoopObserver).await;

        for query in source.seen() {
            assert_eq!(query.from, Some(2005));
            assert_eq!(query.to, Some(2010));
            assert!(query.all);
        }
    }
}
