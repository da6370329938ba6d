// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use axum::body::Body;
use axum::http::Request;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use fitness_coach::config::Config;
use fitness_coach::db::{FirestoreDb, MemoryStore};
use fitness_coach::models::Activity;
use fitness_coach::routes::create_router;
use fitness_coach::services::MockAiClient;
use fitness_coach::AppState;
use std::sync::Arc;

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test database connection.
#[allow(dead_code)]
pub async fn test_db() -> FirestoreDb {
    FirestoreDb::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

/// Test app with handles on its in-memory dependencies.
#[allow(dead_code)]
pub struct TestApp {
    pub router: axum::Router,
    pub state: Arc<AppState>,
    pub store: Arc<MemoryStore>,
    pub ai: Arc<MockAiClient>,
}

/// A well-formed AI response whose overall analysis is `overall`.
#[allow(dead_code)]
pub fn ai_response(overall: &str) -> String {
    let payload = serde_json::json!({
        "analysis": {"overall": overall, "pace": "Even splits"},
        "improvements": [{"area": "Recovery", "recommendation": "Sleep 8 hours"}],
        "suggestions": [{"workout": "Easy run", "description": "30 minutes in zone 2"}],
        "safety": ["Hydrate"]
    });
    MockAiClient::envelope(&format!("```json\n{}\n```", payload))
}

/// Create a test app that always answers with `ai_response("Great run")`.
#[allow(dead_code)]
pub fn create_test_app() -> TestApp {
    create_test_app_with_ai(MockAiClient::always(ai_response("Great run")))
}

/// Create a test app around a specific mock AI client.
#[allow(dead_code)]
pub fn create_test_app_with_ai(ai: MockAiClient) -> TestApp {
    let store = Arc::new(MemoryStore::new());
    let ai = Arc::new(ai);
    let state = Arc::new(AppState::new(
        Config::test_default(),
        store.clone(),
        ai.clone(),
    ));

    TestApp {
        router: create_router(state.clone()),
        state,
        store,
        ai,
    }
}

/// Build an activity for tests.
#[allow(dead_code)]
pub fn activity(id: &str, user_id: &str, updated_at: Option<&str>) -> Activity {
    let mut json = serde_json::json!({
        "id": id,
        "userId": user_id,
        "type": "RUNNING",
        "duration": 42,
        "caloriesBurned": 410,
        "additionalMetrics": {"timeOfDay": "MORNING"}
    });
    if let Some(ts) = updated_at {
        json["updatedAt"] = serde_json::Value::from(ts);
    }
    serde_json::from_value(json).expect("valid test activity")
}

/// Build a push delivery request for `subscription` carrying `activity`.
#[allow(dead_code)]
pub fn push_request(
    subscription: &str,
    activity: &serde_json::Value,
    token: &str,
) -> Request<Body> {
    let envelope = serde_json::json!({
        "message": {
            "data": STANDARD.encode(activity.to_string()),
            "messageId": "1234567890",
            "attributes": {},
            "publishTime": "2026-06-01T12:00:00Z"
        },
        "subscription": format!("projects/test-project/subscriptions/{}", subscription)
    });

    Request::builder()
        .method("POST")
        .uri(format!("/events/push?token={}", token))
        .header("Content-Type", "application/json")
        .body(Body::from(envelope.to_string()))
        .unwrap()
}

/// Read a response body as JSON.
#[allow(dead_code)]
pub async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
