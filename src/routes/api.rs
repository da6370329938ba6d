// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Recommendation query API.

use crate::error::Result;
use crate::models::Recommendation;
use crate::AppState;
use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use std::sync::Arc;

/// Recommendation API routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/api/recommendations/activity/{activity_id}",
            get(get_activity_recommendation),
        )
        .route(
            "/api/recommendations/user/{user_id}",
            get(get_user_recommendation),
        )
        .route(
            "/api/recommendations/user/{user_id}/activities",
            get(list_user_recommendations),
        )
        .route(
            "/api/recommendations/user/{user_id}/summary",
            get(get_latest_user_summary),
        )
}

// ─── Per-Activity ────────────────────────────────────────────

/// Get the stored recommendation for one activity.
async fn get_activity_recommendation(
    State(state): State<Arc<AppState>>,
    Path(activity_id): Path<String>,
) -> Result<Json<Recommendation>> {
    let recommendation = state
        .recommendations
        .get_activity_recommendation(&activity_id)
        .await?;
    Ok(Json(recommendation))
}

// ─── Per-User ────────────────────────────────────────────────

/// Combine the user's recommendations into a fresh summary.
async fn get_user_recommendation(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<Json<Recommendation>> {
    let synthesis = state
        .recommendations
        .get_user_recommendation(&user_id)
        .await?;
    Ok(Json(synthesis.into_recommendation()))
}

/// List the user's per-activity recommendations.
async fn list_user_recommendations(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<Recommendation>>> {
    let recommendations = state
        .recommendations
        .list_user_recommendations(&user_id)
        .await?;
    Ok(Json(recommendations))
}

/// Get the most recently generated summary without calling the AI.
async fn get_latest_user_summary(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<Json<Recommendation>> {
    let summary = state
        .recommendations
        .get_latest_user_summary(&user_id)
        .await?;
    Ok(Json(summary))
}
