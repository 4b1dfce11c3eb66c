//! HTTP-level tests for `GithubClient`: pagination, retry, and rate limits.

use std::time::Duration;

use serde_json::{Map, Value, json};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use skiff_github::{GithubClient, GithubError, Tuning};

const QUERY: &str = "query Issues($owner: String!) {";

fn fast_tuning() -> Tuning {
    Tuning {
        max_attempts: 3,
        retry_pause: Duration::from_millis(1),
        rate_limit_buffer: Duration::ZERO,
    }
}

fn variables() -> Map<String, Value> {
    let mut vars = Map::new();
    vars.insert("owner".into(), json!("octocat"));
    vars
}

/// A response page wrapped the way the issues query nests its collection.
fn page(nodes: Value, has_next: bool, cursor: &str) -> Value {
    json!({
        "data": {
            "repository": {
                "name": "spoon-knife",
                "issues": {
                    "totalCount": 5,
                    "pageInfo": { "hasNextPage": has_next, "endCursor": cursor },
                    "nodes": nodes,
                }
            }
        }
    })
}

fn graphql_response(body: Value) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .insert_header("x-ratelimit-limit", "5000")
        .insert_header("x-ratelimit-remaining", "4999")
        .insert_header("x-ratelimit-reset", "1700000000")
        .insert_header("x-ratelimit-resource", "graphql")
        .set_body_json(body)
}

async fn mount_once(server: &MockServer, response: ResponseTemplate) {
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .respond_with(response)
        .up_to_n_times(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn accumulates_pages_in_arrival_order() {
    let server = MockServer::start().await;
    mount_once(&server, graphql_response(page(json!([{"n": 1}, {"n": 2}]), true, "c1"))).await;
    mount_once(&server, graphql_response(page(json!([{"n": 3}, {"n": 4}]), true, "c2"))).await;
    mount_once(&server, graphql_response(page(json!([{"n": 5}]), false, "c3"))).await;

    let client = GithubClient::with_tuning(format!("{}/graphql", server.uri()), "tok", fast_tuning());
    let (data, nodes) = client.nodes(QUERY, &variables(), None).await.unwrap();

    let order: Vec<u64> = nodes.iter().map(|n| n["n"].as_u64().unwrap()).collect();
    assert_eq!(order, vec![1, 2, 3, 4, 5]);
    // Last raw response keeps container metadata but has its nodes cleared.
    assert_eq!(data["data"]["repository"]["issues"]["totalCount"], json!(5));
    assert_eq!(data["data"]["repository"]["issues"]["nodes"], json!([]));
    assert_eq!(server.received_requests().await.unwrap().len(), 3);
}

#[tokio::test]
async fn cursor_is_threaded_through_variables() {
    let server = MockServer::start().await;
    mount_once(&server, graphql_response(page(json!([{"n": 1}]), true, "CURSOR-A"))).await;
    mount_once(&server, graphql_response(page(json!([{"n": 2}]), false, "CURSOR-B"))).await;

    let client = GithubClient::with_tuning(format!("{}/graphql", server.uri()), "tok", fast_tuning());
    client.nodes(QUERY, &variables(), None).await.unwrap();

    let requests = server.received_requests().await.unwrap();
    let first: Value = serde_json::from_slice(&requests[0].body).unwrap();
    let second: Value = serde_json::from_slice(&requests[1].body).unwrap();
    assert!(first["variables"].get("after").is_none());
    assert_eq!(second["variables"]["after"], json!("CURSOR-A"));
}

#[tokio::test]
async fn stop_predicate_halts_after_current_page() {
    let server = MockServer::start().await;
    // Newest-first updatedAt values; the second page dips below the window.
    mount_once(
        &server,
        graphql_response(page(json!([{"updatedAt": "2026-08-20"}, {"updatedAt": "2026-08-19"}]), true, "c1")),
    )
    .await;
    mount_once(
        &server,
        graphql_response(page(json!([{"updatedAt": "2026-08-10"}, {"updatedAt": "2026-08-01"}]), true, "c2")),
    )
    .await;
    mount_once(&server, graphql_response(page(json!([{"updatedAt": "2026-07-01"}]), true, "c3"))).await;

    let client = GithubClient::with_tuning(format!("{}/graphql", server.uri()), "tok", fast_tuning());
    let stop: &(dyn Fn(&[Value]) -> bool + Sync) = &|nodes| {
        nodes
            .last()
            .and_then(|n| n["updatedAt"].as_str())
            .is_some_and(|updated| updated < "2026-08-05")
    };
    let (_, nodes) = client.nodes(QUERY, &variables(), Some(stop)).await.unwrap();

    // The page that fired the predicate is still included, the next is not.
    assert_eq!(nodes.len(), 4);
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}

#[tokio::test]
async fn missing_page_info_is_distinguishable() {
    let server = MockServer::start().await;
    mount_once(&server, graphql_response(json!({"data": {"repository": null}}))).await;

    let client = GithubClient::with_tuning(format!("{}/graphql", server.uri()), "tok", fast_tuning());
    let err = client.nodes(QUERY, &variables(), None).await.unwrap_err();
    assert!(matches!(err, GithubError::NoPagination { .. }));
    assert!(err.to_string().contains("permissions"));
}

#[tokio::test]
async fn unauthorized_fails_immediately() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let client = GithubClient::with_tuning(format!("{}/graphql", server.uri()), "", fast_tuning());
    let err = client.execute(QUERY, &variables()).await.unwrap_err();
    assert!(matches!(err, GithubError::Unauthorized));
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn retryable_status_is_waited_out() {
    let server = MockServer::start().await;
    mount_once(&server, ResponseTemplate::new(403)).await;
    mount_once(&server, ResponseTemplate::new(502)).await;
    mount_once(&server, graphql_response(json!({"data": {"ok": true}}))).await;

    let client = GithubClient::with_tuning(format!("{}/graphql", server.uri()), "tok", fast_tuning());
    let data = client.execute(QUERY, &variables()).await.unwrap();
    assert_eq!(data["data"]["ok"], json!(true));
    assert_eq!(server.received_requests().await.unwrap().len(), 3);
}

#[tokio::test]
async fn retry_budget_is_bounded() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;

    let client = GithubClient::with_tuning(format!("{}/graphql", server.uri()), "tok", fast_tuning());
    let err = client.execute(QUERY, &variables()).await.unwrap_err();
    assert!(matches!(
        err,
        GithubError::RetriesExhausted { status: 502, attempts: 3 }
    ));
    assert_eq!(server.received_requests().await.unwrap().len(), 3);
}

#[tokio::test]
async fn zero_attempt_budget_still_makes_one_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let mut tuning = fast_tuning();
    tuning.max_attempts = 0;
    let client = GithubClient::with_tuning(format!("{}/graphql", server.uri()), "tok", tuning);
    let err = client.execute(QUERY, &variables()).await.unwrap_err();
    assert!(matches!(
        err,
        GithubError::RetriesExhausted { status: 403, attempts: 1 }
    ));
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn body_level_rate_limit_retries_unconditionally() {
    let server = MockServer::start().await;
    // Reset is in the past, so with a zero buffer the retry is immediate.
    mount_once(
        &server,
        graphql_response(json!({"errors": [{"type": "RATE_LIMITED", "message": "API rate limit exceeded"}]})),
    )
    .await;
    mount_once(&server, graphql_response(json!({"data": {"ok": true}}))).await;

    let client = GithubClient::with_tuning(format!("{}/graphql", server.uri()), "tok", fast_tuning());
    let data = client.execute(QUERY, &variables()).await.unwrap();
    assert_eq!(data["data"]["ok"], json!(true));
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}

#[tokio::test]
async fn rate_limit_snapshot_recorded_on_success() {
    let server = MockServer::start().await;
    mount_once(&server, graphql_response(json!({"data": {"ok": true}}))).await;

    let client = GithubClient::with_tuning(format!("{}/graphql", server.uri()), "tok", fast_tuning());
    assert!(client.last_rate_limit().is_none());
    client.execute(QUERY, &variables()).await.unwrap();

    let snapshot = client.last_rate_limit().unwrap();
    assert_eq!(snapshot.limit, 5000);
    assert_eq!(snapshot.remaining, 4999);
    assert_eq!(snapshot.resource, "graphql");
}

#[tokio::test]
async fn upstream_query_error_surfaces() {
    let server = MockServer::start().await;
    mount_once(
        &server,
        graphql_response(json!({"errors": [{
            "message": "Field 'bogus' doesn't exist",
            "path": ["query", "repository"],
        }]})),
    )
    .await;

    let client = GithubClient::with_tuning(format!("{}/graphql", server.uri()), "tok", fast_tuning());
    let err = client.execute(QUERY, &variables()).await.unwrap_err();
    assert!(matches!(err, GithubError::Query(_)));
    assert!(err.to_string().contains("@query.repository"));
}
