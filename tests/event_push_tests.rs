// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Push endpoint tests: authentication, dispatch and acknowledgement.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use fitness_coach::db::RecommendationStore;
use serde_json::json;
use tower::ServiceExt; // for oneshot

mod common;
use common::{create_test_app, push_request};

const TOKEN: &str = "test_push_token";

fn activity_json(id: &str) -> serde_json::Value {
    json!({
        "id": id,
        "userId": "user-1",
        "type": "SWIMMING",
        "duration": 30,
        "caloriesBurned": 250,
        "additionalMetrics": {}
    })
}

#[tokio::test]
async fn test_push_requires_token() {
    let app = create_test_app();

    let missing = Request::builder()
        .method("POST")
        .uri("/events/push")
        .header("Content-Type", "application/json")
        .body(Body::from("{}"))
        .unwrap();
    let response = app.router.clone().oneshot(missing).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let wrong = push_request("activity-upserted", &activity_json("a1"), "nope");
    let response = app.router.clone().oneshot(wrong).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    assert!(app.store.is_empty().await);
    assert_eq!(app.ai.calls(), 0);
}

#[tokio::test]
async fn test_upsert_push_stores_recommendation() {
    let app = create_test_app();

    let request = push_request("activity-upserted", &activity_json("a1"), TOKEN);
    let response = app.router.clone().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let stored = app.store.find_by_activity_id("a1").await.unwrap().unwrap();
    assert_eq!(stored.recommendation_type, "SWIMMING");
    assert_eq!(stored.user_id, "user-1");
}

#[tokio::test]
async fn test_upsert_push_accepts_nulls_and_local_timestamps() {
    let app = create_test_app();
    let payload = json!({
        "id": "a1",
        "userId": "user-1",
        "type": null,
        "duration": 30,
        "caloriesBurned": null,
        "startTime": "2025-11-20T09:45:00",
        "additionalMetrics": null,
        "createdAt": "2025-11-20T10:15:30.123456",
        "updatedAt": "2025-11-20T10:15:30.123456"
    });

    let request = push_request("activity-upserted", &payload, TOKEN);
    let response = app.router.clone().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(app.ai.calls(), 1);
    let stored = app.store.find_by_activity_id("a1").await.unwrap().unwrap();
    assert_eq!(stored.recommendation_type, "OTHER");
    assert_eq!(
        stored.source_updated_at.unwrap().to_rfc3339(),
        "2025-11-20T10:15:30.123456+00:00"
    );
}

#[tokio::test]
async fn test_delete_push_removes_recommendation() {
    let app = create_test_app();

    let upsert = push_request("activity-upserted", &activity_json("a1"), TOKEN);
    app.router.clone().oneshot(upsert).await.unwrap();
    assert_eq!(app.store.len().await, 1);

    for _ in 0..2 {
        let delete = push_request("activity-deleted", &activity_json("a1"), TOKEN);
        let response = app.router.clone().oneshot(delete).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
    assert!(app.store.is_empty().await);
}

#[tokio::test]
async fn test_poison_messages_are_acknowledged() {
    let app = create_test_app();

    // Unknown subscription
    let request = push_request("somebody-elses-topic", &activity_json("a1"), TOKEN);
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Activity without an id
    let request = push_request("activity-upserted", &json!({"userId": "user-1"}), TOKEN);
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Not a push envelope at all
    let request = Request::builder()
        .method("POST")
        .uri(format!("/events/push?token={}", TOKEN))
        .header("Content-Type", "application/json")
        .body(Body::from(r#"{"hello": "world"}"#))
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Undecodable data
    let request = Request::builder()
        .method("POST")
        .uri(format!("/events/push?token={}", TOKEN))
        .header("Content-Type", "application/json")
        .body(Body::from(
            json!({
                "message": {"data": "%%%", "messageId": "9"},
                "subscription": "projects/test-project/subscriptions/activity-upserted"
            })
            .to_string(),
        ))
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    assert!(app.store.is_empty().await);
    assert_eq!(app.ai.calls(), 0);
}

#[tokio::test]
async fn test_push_response_has_security_headers() {
    let app = create_test_app();

    let request = push_request("activity-upserted", &activity_json("a1"), TOKEN);
    let response = app.router.clone().oneshot(request).await.unwrap();

    assert_eq!(response.headers().get("Cache-Control").unwrap(), "no-store");
    assert_eq!(
        response.headers().get("X-Content-Type-Options").unwrap(),
        "nosniff"
    );
}
