//! Integration tests for the paginated fetcher against a mock card API.

mod support;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use serde_json::{Value, json};
use support::{page_json, untotaled_page_json};
use support::socket_guard::start_mock_server_or_skip;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};
use yoyo_export::{
    ApiClient, ApiError, FailureType, FilterSet, RetryPolicy, SessionConfig, fetch_all,
    fetch_levels,
};

/// Serves a listing of `total` cards, paging by the request body.
///
/// Pages listed in `failing_pages` answer with `fail_status` every time.
/// The first `flaky_requests` requests answer 500 regardless of page.
/// With `report_total` off, pages omit `totalFlashcards`.
struct Listing {
    total: usize,
    report_total: bool,
    failing_pages: Vec<u64>,
    fail_status: u16,
    flaky_requests: usize,
    requests: Arc<AtomicUsize>,
}

impl Listing {
    fn new(total: usize) -> Self {
        Self {
            total,
            report_total: true,
            failing_pages: Vec::new(),
            fail_status: 503,
            flaky_requests: 0,
            requests: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl Respond for Listing {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let n = self.requests.fetch_add(1, Ordering::SeqCst);
        if n < self.flaky_requests {
            return ResponseTemplate::new(500);
        }
        let body: Value = request.body_json().expect("request body is JSON");
        let page = body["page"].as_u64().expect("page number");
        let per_page = body["cardsPerPage"].as_u64().expect("page size") as usize;
        if self.failing_pages.contains(&page) {
            return ResponseTemplate::new(self.fail_status);
        }
        let start = ((page as usize) - 1) * per_page;
        let end = (start + per_page).min(self.total);
        let body = if self.report_total {
            page_json(start.min(end), end, self.total)
        } else {
            untotaled_page_json(start.min(end), end)
        };
        ResponseTemplate::new(200).set_body_json(body)
    }
}

async fn mount(server: &MockServer, listing: Listing) -> Arc<AtomicUsize> {
    let requests = Arc::clone(&listing.requests);
    Mock::given(method("POST"))
        .and(path("/cards"))
        .respond_with(listing)
        .mount(server)
        .await;
    requests
}

fn client(server: &MockServer) -> ApiClient {
    let session = SessionConfig::new("Cookie: sid=abc123")
        .with_api_url(format!("{}/cards", server.uri()))
        .with_request_timeout(Duration::from_secs(5));
    ApiClient::new(session).expect("client builds")
}

fn filters(page_size: u32, max_records: Option<usize>) -> FilterSet {
    FilterSet {
        page_size,
        max_records,
        page_delay: Duration::ZERO,
        ..FilterSet::default()
    }
}

fn fast_policy(max_attempts: u32) -> RetryPolicy {
    RetryPolicy::new(max_attempts, Duration::from_millis(5)).without_jitter()
}

fn ids(records: &[yoyo_export::RawCard]) -> Vec<String> {
    records
        .iter()
        .map(|record| record.get("id").and_then(Value::as_str).unwrap_or("").to_string())
        .collect()
}

fn expected_ids(count: usize) -> Vec<String> {
    (0..count).map(|index| format!("card-{index}")).collect()
}

#[tokio::test]
async fn test_fetch_all_count_and_order_for_page_sizes_and_caps() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    let requests = mount(&server, Listing::new(247)).await;
    let client = client(&server);
    let policy = fast_policy(3);

    let cases: &[(u32, Option<usize>, usize, usize)] = &[
        // (page size, cap, expected records, expected requests)
        (50, None, 247, 5),
        (100, None, 247, 3),
        (247, None, 247, 1),
        (1000, None, 247, 1),
        (100, Some(120), 120, 2),
        (100, Some(100), 100, 1),
        (50, Some(500), 247, 5),
        (50, Some(0), 0, 0),
    ];

    for &(page_size, cap, expected_records, expected_requests) in cases {
        requests.store(0, Ordering::SeqCst);
        let result = fetch_all(&client, &filters(page_size, cap), &policy)
            .await
            .expect("fetch succeeds");
        assert!(!result.is_partial());
        assert_eq!(
            ids(&result.records),
            expected_ids(expected_records),
            "page size {page_size}, cap {cap:?}"
        );
        assert_eq!(
            requests.load(Ordering::SeqCst),
            expected_requests,
            "requests for page size {page_size}, cap {cap:?}"
        );
    }
}

#[tokio::test]
async fn test_exact_multiple_stops_on_reported_total() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    let requests = mount(&server, Listing::new(200)).await;

    let result = fetch_all(&client(&server), &filters(100, None), &fast_policy(3))
        .await
        .unwrap();
    assert_eq!(result.records.len(), 200);
    assert_eq!(requests.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_short_page_ends_fetch_without_reported_total() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    // (listing size, expected requests): a full last page needs one empty follow-up.
    for (total, expected_requests) in [(247, 3), (200, 3), (99, 1)] {
        let mut listing = Listing::new(total);
        listing.report_total = false;
        server.reset().await;
        let requests = mount(&server, listing).await;

        let result = fetch_all(&client(&server), &filters(100, None), &fast_policy(3))
            .await
            .unwrap();
        assert!(!result.is_partial());
        assert_eq!(ids(&result.records), expected_ids(total), "listing of {total}");
        assert_eq!(
            requests.load(Ordering::SeqCst),
            expected_requests,
            "requests for listing of {total}"
        );
    }
}

#[tokio::test]
async fn test_request_carries_session_headers_and_filters() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("POST"))
        .and(path("/cards"))
        .and(header("cookie", "sid=abc123"))
        .and(header("accept", "*/*"))
        .and(header("content-type", "application/json"))
        .and(header("is-native", "false"))
        .and(body_partial_json(json!({
            "filters": {
                "masteryType": {"value": "learning", "label": "Learning"},
                "courseId": "course-1",
                "levelId": "",
                "unitId": "unit-9",
                "lessonId": ""
            },
            "page": 1,
            "cardsPerPage": 25
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_json(0, 3, 3)))
        .expect(1)
        .mount(&server)
        .await;

    let filters = FilterSet {
        mastery_type: "learning".to_string(),
        course_id: "course-1".to_string(),
        unit_id: "unit-9".to_string(),
        ..filters(25, None)
    };
    let result = fetch_all(&client(&server), &filters, &fast_policy(1))
        .await
        .unwrap();
    assert_eq!(ids(&result.records), expected_ids(3));
}

#[tokio::test]
async fn test_auth_failure_aborts_after_one_attempt() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("POST"))
        .and(path("/cards"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let failure = fetch_all(&client(&server), &filters(50, None), &fast_policy(4))
        .await
        .expect_err("auth must abort");
    assert_eq!(failure.page, 1);
    assert_eq!(failure.attempts, 1);
    assert_eq!(failure.failure_type(), FailureType::Auth);
    assert!(matches!(failure.error, ApiError::Auth { status: 401, .. }));
    assert!(failure.error.to_string().contains("Suggestion"));
}

#[tokio::test]
async fn test_permanent_client_error_aborts_without_retry() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    let mut listing = Listing::new(247);
    listing.failing_pages = vec![2];
    listing.fail_status = 404;
    let requests = mount(&server, listing).await;

    let failure = fetch_all(&client(&server), &filters(100, None), &fast_policy(4))
        .await
        .expect_err("404 must abort");
    assert_eq!(failure.page, 2);
    assert_eq!(failure.attempts, 1);
    assert!(failure.is_fatal());
    assert_eq!(requests.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_transient_exhaustion_returns_earlier_pages() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    let mut listing = Listing::new(247);
    listing.failing_pages = vec![3];
    let requests = mount(&server, listing).await;

    let result = fetch_all(&client(&server), &filters(100, None), &fast_policy(3))
        .await
        .expect("transient failure keeps earlier pages");
    assert!(result.is_partial());
    assert_eq!(ids(&result.records), expected_ids(200));

    let failure = result.failure.expect("failure attached");
    assert_eq!(failure.page, 3);
    assert_eq!(failure.attempts, 3);
    assert_eq!(failure.failure_type(), FailureType::Transient);
    // Two good pages plus three attempts at page 3.
    assert_eq!(requests.load(Ordering::SeqCst), 5);
}

#[tokio::test]
async fn test_retry_recovers_and_waits_between_attempts() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    let mut listing = Listing::new(30);
    listing.flaky_requests = 2;
    let requests = mount(&server, listing).await;
    let policy = RetryPolicy::new(4, Duration::from_millis(40)).without_jitter();

    let started = Instant::now();
    let result = fetch_all(&client(&server), &filters(50, None), &policy)
        .await
        .unwrap();
    let elapsed = started.elapsed();

    assert!(!result.is_partial());
    assert_eq!(result.records.len(), 30);
    assert_eq!(requests.load(Ordering::SeqCst), 3);
    // 40ms then 80ms of backoff before the third attempt.
    assert!(elapsed >= Duration::from_millis(120), "elapsed {elapsed:?}");
}

#[tokio::test]
async fn test_malformed_body_is_retried_as_transient() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("POST"))
        .and(path("/cards"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>login</html>"))
        .expect(2)
        .mount(&server)
        .await;

    let result = fetch_all(&client(&server), &filters(50, None), &fast_policy(2))
        .await
        .unwrap();
    assert!(result.records.is_empty());
    let failure = result.failure.unwrap();
    assert!(matches!(failure.error, ApiError::Malformed { .. }));
    assert_eq!(failure.attempts, 2);
}

#[tokio::test]
async fn test_body_without_flashcards_is_retried_then_reported() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("POST"))
        .and(path("/cards"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"message": "session expired"})),
        )
        .expect(3)
        .mount(&server)
        .await;

    let result = fetch_all(&client(&server), &filters(50, None), &fast_policy(3))
        .await
        .unwrap();
    assert!(result.records.is_empty());
    assert!(result.is_partial(), "missing flashcards must not look like end of data");
    let failure = result.failure.unwrap();
    assert_eq!(failure.page, 1);
    assert_eq!(failure.attempts, 3);
    assert_eq!(failure.failure_type(), FailureType::Transient);
    assert!(matches!(failure.error, ApiError::Malformed { .. }));
}

#[tokio::test]
async fn test_explicit_empty_page_is_end_of_data() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("POST"))
        .and(path("/cards"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"flashcards": []})))
        .expect(1)
        .mount(&server)
        .await;

    let result = fetch_all(&client(&server), &filters(50, None), &fast_policy(3))
        .await
        .unwrap();
    assert!(result.records.is_empty());
    assert!(!result.is_partial());
}

#[tokio::test]
async fn test_fetch_levels_groups_in_level_order() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    for (level_id, count) in [("lvl-a", 3), ("lvl-b", 0), ("lvl-c", 2)] {
        Mock::given(method("POST"))
            .and(path("/cards"))
            .and(body_partial_json(json!({
                "filters": {"levelId": level_id, "unitId": "", "lessonId": ""}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(page_json(0, count, count)))
            .mount(&server)
            .await;
    }

    let shared = FilterSet {
        course_id: "course-1".to_string(),
        unit_id: "ignored-unit".to_string(),
        ..filters(50, None)
    };
    let levels = fetch_levels(
        &client(&server),
        &shared,
        &["lvl-a", "lvl-b", "lvl-c"],
        &fast_policy(1),
    )
    .await
    .unwrap();

    let shape: Vec<(usize, &str, usize)> = levels
        .iter()
        .map(|level| (level.level, level.level_id.as_str(), level.result.records.len()))
        .collect();
    assert_eq!(shape, vec![(1, "lvl-a", 3), (2, "lvl-b", 0), (3, "lvl-c", 2)]);
}
