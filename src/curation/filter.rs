//! Include/exclude filters over archived URLs.
//!
//! A filter is either `/pattern/flags`, compiled as a regular expression, or
//! any other text, matched as a case-insensitive substring.

use regex::{Regex, RegexBuilder};
use tracing::debug;

/// A parsed `--only` / `--exclude` filter.
#[derive(Debug, Clone)]
pub enum UrlFilter {
    /// `/pattern/flags` form.
    Pattern(Regex),
    /// Lowercased literal, matched as a substring of the lowercased URL.
    Literal(String),
}

impl UrlFilter {
    /// Parses a filter; an empty string means "no filter".
    ///
    /// Supported flags are `i`, `m` and `s`; `g`, `u`, `y` and `d` are
    /// accepted and have no effect. A pattern that uses any other flag,
    /// repeats a flag, or fails to compile is matched literally instead.
    ///
    /// ```
    /// use wayback_core::curation::UrlFilter;
    ///
    /// let filter = UrlFilter::parse(r"/\.(css|js)$/i").unwrap();
    /// assert!(filter.matches("https://example.com/SITE.CSS"));
    ///
    /// let literal = UrlFilter::parse("Blog").unwrap();
    /// assert!(literal.matches("https://example.com/blog/post.html"));
    ///
    /// assert!(UrlFilter::parse("").is_none());
    /// ```
    #[must_use]
    pub fn parse(filter: &str) -> Option<Self> {
        if filter.is_empty() {
            return None;
        }
        Some(Self::compile_pattern(filter).unwrap_or_else(|| Self::Literal(filter.to_lowercase())))
    }

    fn compile_pattern(filter: &str) -> Option<Self> {
        if filter.len() < 2 || !filter.starts_with('/') {
            return None;
        }
        let last_slash = filter.rfind('/')?;
        let pattern = if last_slash == 0 {
            ""
        } else {
            &filter[1..last_slash]
        };
        let flags = &filter[last_slash + 1..];

        let mut builder = RegexBuilder::new(&pattern.replace(r"\/", "/"));
        let mut seen = String::new();
        for flag in flags.chars() {
            if seen.contains(flag) {
                return None;
            }
            seen.push(flag);
            match flag {
                'i' => {
                    builder.case_insensitive(true);
                }
                'm' => {
                    builder.multi_line(true);
                }
                's' => {
                    builder.dot_matches_new_line(true);
                }
                'g' | 'u' | 'y' | 'd' => {}
                _ => return None,
            }
        }

        match builder.build() {
            Ok(regex) => Some(Self::Pattern(regex)),
            Err(e) => {
                debug!(filter, error = %e, "filter is not a valid pattern, matching literally");
                None
            }
        }
    }

    #[must_use]
    pub fn matches(&self, url: &str) -> bool {
        match self {
            Self::Pattern(regex) => regex.is_match(url),
            Self::Literal(needle) => url.to_lowercase().contains(needle.as_str()),
        }
    }
}
