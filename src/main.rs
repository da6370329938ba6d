// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Fitness-Coach API Server
//!
//! Consumes activity events, asks Gemini for coaching feedback, and serves
//! per-activity recommendations and per-user summaries.

use fitness_coach::{
    config::{Config, StoreBackend},
    db::{FirestoreDb, MemoryStore, RecommendationStore},
    services::{AiClient, GeminiClient, ResilientAiClient},
    AppState,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging for GCP
    init_logging();

    // Load configuration from environment
    let config = Config::from_env().expect("Failed to load configuration");
    tracing::info!(port = config.port, "Starting Fitness-Coach API");

    // Initialize recommendation store
    let store: Arc<dyn RecommendationStore> = match config.store_backend {
        StoreBackend::Firestore => Arc::new(
            FirestoreDb::new(&config.gcp_project_id)
                .await
                .expect("Failed to connect to Firestore"),
        ),
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory store; recommendations are lost on restart");
            Arc::new(MemoryStore::new())
        }
    };

    // Initialize the AI client behind the timeout/retry policy
    let gemini = GeminiClient::new(
        config.gemini_api_url.clone(),
        config.gemini_model.clone(),
        config.gemini_api_key.clone(),
    );
    let ai: Arc<dyn AiClient> = Arc::new(ResilientAiClient::new(
        Arc::new(gemini),
        config.ai_policy,
    ));
    tracing::info!(
        model = %config.gemini_model,
        timeout_secs = config.ai_policy.timeout.as_secs(),
        max_attempts = config.ai_policy.max_attempts,
        "AI client initialized"
    );
    tracing::info!(
        upserted = %config.event_streams.activity_upserted,
        deleted = %config.event_streams.activity_deleted,
        "Event streams configured"
    );

    // Build shared state
    let state = Arc::new(AppState::new(config.clone(), store, ai));

    // Build router
    let app = fitness_coach::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging (GCP-compliant).
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("fitness_coach=debug".parse().unwrap())
                .add_directive("info".parse().unwrap()),
        )
        .with(format)
        .init();
}
