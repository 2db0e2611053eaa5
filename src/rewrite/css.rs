use std::sync::LazyLock;

use regex::Regex;

use super::{LinkResolver, PageRef, Replacement};

#[allow(clippy::expect_used)]
static CSS_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"url\s*\(\s*["']?([^"')]+)["']?\s*\)"#).expect("css url pattern is valid")
});

/// Finds `url(...)` references in `content` that point at mirrored files.
///
/// The whole `url(...)` token is replaced with a double-quoted form.
pub(super) fn find_replacements(
    content: &str,
    page: &PageRef<'_>,
    resolver: &LinkResolver<'_>,
) -> Vec<Replacement> {
    CSS_URL
        .captures_iter(content)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let value = caps.get(1)?.as_str().trim();
            if value.is_empty() || value.starts_with('#') || value.starts_with("data:") {
                return None;
            }
            let local = resolver.relative_link(page, value)?;
            Some(Replacement {
                range: whole.range(),
                text: format!("url(\"{local}\")"),
            })
        })
        .collect()
}
