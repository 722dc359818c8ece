//! End-to-end handler tests against a mocked document store.
//!
//! Each test stands up a fresh mock store, runs a handler the way the daemon
//! would, and asserts on the writes the store actually received.

use std::sync::Arc;

use chrono::Utc;
use serde_json::{Value, json};
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

use warden::handlers::{HandlerError, block_watch, daily_reset};
use warden::registry::HandlerRegistry;
use warden_store::{
    DocumentWritten, InvocationEvent, ScheduledFiring, StoreClient, StoreError,
};

/// One page of the `users` collection listing.
fn users_page(users: &[(&str, u64)], cursor: Option<&str>) -> Value {
    let documents: Vec<Value> = users
        .iter()
        .map(|(id, today_views)| {
            json!({ "id": id, "fields": { "todayViews": today_views } })
        })
        .collect();

    match cursor {
        Some(cursor) => json!({ "documents": documents, "cursor": cursor }),
        None => json!({ "documents": documents }),
    }
}

fn commit_ok() -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({ "commitTime": "2024-06-01T15:00:00Z" }))
}

/// Writes from every commit request the mock store received, in order.
async fn received_commits(mock_server: &MockServer) -> Vec<Vec<Value>> {
    mock_server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|request: &&Request| request.url.path() == "/v1/commit")
        .map(|request| {
            let body: Value = serde_json::from_slice(&request.body).unwrap();
            body["writes"].as_array().unwrap().clone()
        })
        .collect()
}

fn user_write_event(id: &str, after: Value) -> DocumentWritten {
    DocumentWritten {
        collection: "users".to_string(),
        id: id.to_string(),
        before: None,
        after: Some(after),
    }
}

#[tokio::test]
async fn daily_reset_zeroes_every_user() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/collections/users/documents"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(users_page(&[("u1", 5), ("u2", 0), ("u3", 12)], None)),
        )
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/v1/commit"))
        .respond_with(commit_ok())
        .expect(1)
        .mount(&mock_server)
        .await;

    let store = StoreClient::new(mock_server.uri(), "test-key");
    daily_reset::run(&store).await.unwrap();

    let commits = received_commits(&mock_server).await;
    assert_eq!(commits.len(), 1);
    assert_eq!(commits[0].len(), 3);

    let mut ids: Vec<&str> = commits[0]
        .iter()
        .map(|write| write["id"].as_str().unwrap())
        .collect();
    ids.sort_unstable();
    assert_eq!(ids, vec!["u1", "u2", "u3"]);

    for write in &commits[0] {
        assert_eq!(write["op"], "patch");
        assert_eq!(write["collection"], "users");
        assert_eq!(
            write["fields"],
            json!({
                "todayViews": 0,
                "lastResetAt": { "$serverTimestamp": true }
            })
        );
    }
}

#[tokio::test]
async fn daily_reset_empty_collection_commits_nothing() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/collections/users/documents"))
        .respond_with(ResponseTemplate::new(200).set_body_json(users_page(&[], None)))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/v1/commit"))
        .respond_with(commit_ok())
        .expect(0)
        .mount(&mock_server)
        .await;

    let store = StoreClient::new(mock_server.uri(), "test-key");
    daily_reset::run(&store).await.unwrap();
}

#[tokio::test]
async fn daily_reset_is_idempotent() {
    let mock_server = MockServer::start().await;

    // Second run sees the collection as the first run left it.
    Mock::given(method("GET"))
        .and(path("/v1/collections/users/documents"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(users_page(&[("u1", 7), ("u2", 3)], None)),
        )
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v1/collections/users/documents"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(users_page(&[("u1", 0), ("u2", 0)], None)),
        )
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/v1/commit"))
        .respond_with(commit_ok())
        .expect(2)
        .mount(&mock_server)
        .await;

    let store = StoreClient::new(mock_server.uri(), "test-key");
    daily_reset::run(&store).await.unwrap();
    daily_reset::run(&store).await.unwrap();

    let commits = received_commits(&mock_server).await;
    assert_eq!(commits.len(), 2);
    // Both runs stage the exact same writes.
    assert_eq!(commits[0], commits[1]);
}

#[tokio::test]
async fn daily_reset_splits_commits_at_write_cap() {
    let mock_server = MockServer::start().await;

    // 501 users across six list pages of at most 100.
    let ids: Vec<String> = (0..501).map(|i| format!("u{:03}", i)).collect();
    let pages: Vec<Vec<(&str, u64)>> = ids
        .chunks(100)
        .map(|chunk| chunk.iter().map(|id| (id.as_str(), 1u64)).collect())
        .collect();

    // Cursor-specific pages are mounted first: mocks match in mount order,
    // and the cursor-less first-page mock would otherwise shadow them.
    for (page_index, page) in pages.iter().enumerate().skip(1) {
        let next_cursor =
            (page_index + 1 < pages.len()).then(|| format!("p{}", page_index + 1));

        Mock::given(method("GET"))
            .and(path("/v1/collections/users/documents"))
            .and(query_param("cursor", format!("p{}", page_index)))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(users_page(page, next_cursor.as_deref())),
            )
            .mount(&mock_server)
            .await;
    }

    Mock::given(method("GET"))
        .and(path("/v1/collections/users/documents"))
        .respond_with(ResponseTemplate::new(200).set_body_json(users_page(&pages[0], Some("p1"))))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/v1/commit"))
        .respond_with(commit_ok())
        .expect(2)
        .mount(&mock_server)
        .await;

    let store = StoreClient::new(mock_server.uri(), "test-key");
    daily_reset::run(&store).await.unwrap();

    let commits = received_commits(&mock_server).await;
    let write_counts: Vec<usize> = commits.iter().map(|writes| writes.len()).collect();
    assert_eq!(write_counts, vec![500, 1]);
}

#[tokio::test]
async fn block_watch_below_threshold_writes_nothing() {
    let mock_server = MockServer::start().await;

    Mock::given(method("PATCH"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let store = StoreClient::new(mock_server.uri(), "test-key");
    let event = user_write_event("u1", json!({ "blockedByCount": 9 }));

    block_watch::run(&store, &event).await.unwrap();
}

#[tokio::test]
async fn block_watch_at_threshold_deactivates_exactly_once() {
    let mock_server = MockServer::start().await;

    Mock::given(method("PATCH"))
        .and(path("/v1/collections/users/documents/u1"))
        .and(body_partial_json(json!({
            "fields": { "isActive": false }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "u1",
            "fields": { "isActive": false }
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let store = StoreClient::new(mock_server.uri(), "test-key");
    let event = user_write_event("u1", json!({ "blockedByCount": 10 }));

    block_watch::run(&store, &event).await.unwrap();
}

#[tokio::test]
async fn block_watch_already_inactive_is_a_no_op() {
    let mock_server = MockServer::start().await;

    Mock::given(method("PATCH"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let store = StoreClient::new(mock_server.uri(), "test-key");
    let event = user_write_event(
        "u1",
        json!({ "blockedByCount": 15, "isActive": false }),
    );

    block_watch::run(&store, &event).await.unwrap();
}

#[tokio::test]
async fn block_watch_ignores_deletes() {
    let mock_server = MockServer::start().await;

    Mock::given(method("PATCH"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let store = StoreClient::new(mock_server.uri(), "test-key");
    let event = DocumentWritten {
        collection: "users".to_string(),
        id: "u1".to_string(),
        before: Some(json!({ "blockedByCount": 12 })),
        after: None,
    };

    block_watch::run(&store, &event).await.unwrap();
}

#[tokio::test]
async fn block_watch_write_failure_fails_the_invocation() {
    let mock_server = MockServer::start().await;

    Mock::given(method("PATCH"))
        .and(path("/v1/collections/users/documents/u1"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({
            "error": "failedPrecondition",
            "message": "document is locked"
        })))
        .mount(&mock_server)
        .await;

    let store = StoreClient::new(mock_server.uri(), "test-key");
    let event = user_write_event("u1", json!({ "blockedByCount": 10 }));

    let result = block_watch::run(&store, &event).await;

    assert!(matches!(
        result.unwrap_err(),
        HandlerError::Store(StoreError::Api { code, .. }) if code == "failedPrecondition"
    ));
}

#[tokio::test]
async fn registry_routes_schedule_firing_to_daily_reset() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/collections/users/documents"))
        .respond_with(ResponseTemplate::new(200).set_body_json(users_page(&[("u1", 4)], None)))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/v1/commit"))
        .respond_with(commit_ok())
        .expect(1)
        .mount(&mock_server)
        .await;

    let store = Arc::new(StoreClient::new(mock_server.uri(), "test-key"));
    let registry = HandlerRegistry::standard();

    registry
        .dispatch(
            store,
            InvocationEvent::Scheduled(ScheduledFiring {
                target: "daily-views-reset".to_string(),
                fired_at: Utc::now(),
            }),
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn registry_routes_threshold_crossing_to_block_watch() {
    let mock_server = MockServer::start().await;

    // A 9 -> 10 transition deactivates that user and touches nothing else.
    Mock::given(method("PATCH"))
        .and(path("/v1/collections/users/documents/u7"))
        .and(body_partial_json(json!({
            "fields": { "isActive": false }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "u7",
            "fields": { "isActive": false }
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let store = Arc::new(StoreClient::new(mock_server.uri(), "test-key"));
    let registry = HandlerRegistry::standard();

    registry
        .dispatch(
            store,
            InvocationEvent::DocumentWritten(DocumentWritten {
                collection: "users".to_string(),
                id: "u7".to_string(),
                before: Some(json!({ "blockedByCount": 9 })),
                after: Some(json!({ "blockedByCount": 10 })),
            }),
        )
        .await
        .unwrap();

    // The only write the store saw is the single deactivation patch.
    let requests = mock_server.received_requests().await.unwrap();
    let writes: Vec<&Request> = requests
        .iter()
        .filter(|request| request.method.to_string() != "GET")
        .collect();
    assert_eq!(writes.len(), 1);
}
