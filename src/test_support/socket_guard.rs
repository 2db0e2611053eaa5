//! Skips mock-server tests on hosts that cannot bind a localhost socket.
//!
//! Shared with the integration tests through a `#[path]` include.

use std::net::TcpListener;

use wiremock::MockServer;

/// Set to `1`/`true`/`yes` to fail instead of skipping.
const REQUIRE_VAR: &str = "WAYBACK_REQUIRE_SOCKET_TESTS";

/// Starts a mock server, or returns `None` (after a note on stderr) when
/// localhost is unavailable and socket tests are not required.
///
/// # Panics
///
/// Panics when no socket can be bound and `WAYBACK_REQUIRE_SOCKET_TESTS` is set.
#[track_caller]
pub fn start_mock_server_or_skip() -> impl Future<Output = Option<MockServer>> {
    let caller = std::panic::Location::caller();
    let bindable = TcpListener::bind("127.0.0.1:0").is_ok();
    async move {
        if bindable {
            return Some(MockServer::start().await);
        }
        let required = std::env::var(REQUIRE_VAR).is_ok_and(|value| {
            matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "yes")
        });
        assert!(
            !required,
            "cannot bind a localhost socket for the test at {caller}"
        );
        eprintln!(
            "skipping socket-bound test at {caller}: localhost unavailable ({REQUIRE_VAR}=1 to fail)"
        );
        None
    }
}
