use std::sync::LazyLock;

use regex::Regex;

use super::{LinkResolver, PageRef, Replacement};

#[allow(clippy::expect_used)]
static LINK_ATTRIBUTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\s(href|src|srcset|action|data|poster)\s*=\s*["']([^"']+)["']"#)
        .expect("link attribute pattern is valid")
});

/// Finds attribute values in `content` that point at mirrored files.
pub(super) fn find_replacements(
    content: &str,
    page: &PageRef<'_>,
    resolver: &LinkResolver<'_>,
) -> Vec<Replacement> {
    let mut replacements = Vec::new();
    for caps in LINK_ATTRIBUTE.captures_iter(content) {
        let (Some(attribute), Some(value)) = (caps.get(1), caps.get(2)) else {
            continue;
        };
        let trimmed = value.as_str().trim();
        if is_skipped(trimmed) {
            continue;
        }

        let text = if attribute.as_str().eq_ignore_ascii_case("srcset") {
            rewrite_srcset(trimmed, page, resolver)
        } else {
            resolver.relative_link(page, trimmed)
        };
        if let Some(text) = text {
            replacements.push(Replacement {
                range: value.range(),
                text,
            });
        }
    }
    replacements
}

fn is_skipped(value: &str) -> bool {
    let lower = value.to_ascii_lowercase();
    value.is_empty()
        || value.starts_with('#')
        || lower.starts_with("mailto:")
        || lower.starts_with("javascript:")
}

/// Rewrites each `url [descriptor]` entry; `None` when no entry changed.
fn rewrite_srcset(value: &str, page: &PageRef<'_>, resolver: &LinkResolver<'_>) -> Option<String> {
    let mut changed = false;
    let entries: Vec<String> = value
        .split(',')
        .map(str::trim)
        .map(|entry| {
            let (url, descriptor) = entry
                .split_once(char::is_whitespace)
                .map_or((entry, ""), |(url, rest)| (url, rest.trim_start()));
            if url.is_empty() {
                return entry.to_string();
            }
            match resolver.relative_link(page, url) {
                Some(local) => {
                    changed = true;
                    if descriptor.is_empty() {
                        local
                    } else {
                        format!("{local} {descriptor}")
                    }
                }
                None => entry.to_string(),
            }
        })
        .collect();

    changed.then(|| entries.join(", "))
}
