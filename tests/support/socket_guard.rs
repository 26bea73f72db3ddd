//! Skips mock-server tests in sandboxes that forbid binding localhost.

use std::net::TcpListener;
use std::panic::Location;

use wiremock::MockServer;

const REQUIRE_ENV: &str = "YOYO_EXPORT_REQUIRE_SOCKET_TESTS";

/// True when `YOYO_EXPORT_REQUIRE_SOCKET_TESTS` asks for a hard failure instead of a skip.
#[must_use]
pub fn socket_tests_required() -> bool {
    std::env::var(REQUIRE_ENV).is_ok_and(|value| {
        let value = value.trim().to_ascii_lowercase();
        value == "1" || value == "true" || value == "yes"
    })
}

fn localhost_bindable() -> bool {
    TcpListener::bind(("127.0.0.1", 0)).is_ok()
}

#[track_caller]
#[must_use]
pub fn should_skip_socket_bound_test() -> bool {
    if localhost_bindable() {
        return false;
    }

    let caller = Location::caller();
    assert!(
        !socket_tests_required(),
        "{}:{} needs a localhost socket but binding failed ({REQUIRE_ENV} is set)",
        caller.file(),
        caller.line()
    );
    eprintln!(
        "skipping {}:{}: localhost sockets unavailable (set {REQUIRE_ENV}=1 to fail instead)",
        caller.file(),
        caller.line()
    );
    true
}

/// Starts a wiremock server, or returns `None` when the test should be skipped.
#[track_caller]
pub fn start_mock_server_or_skip() -> impl std::future::Future<Output = Option<MockServer>> {
    let skip = should_skip_socket_bound_test();
    async move {
        if skip {
            return None;
        }
        Some(MockServer::start().await)
    }
}
