//! User-Agent string shared by index queries and capture downloads.

/// Identifies the tool to the archive on every request.
#[must_use]
pub(crate) fn default_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("wayback-dl/{version} (website-mirror-tool)")
}
