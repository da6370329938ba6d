// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Push delivery authentication middleware.

use crate::AppState;
use axum::{
    extract::{Query, Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use serde::Deserialize;
use std::sync::Arc;
use subtle::ConstantTimeEq;

/// Query parameters the push subscription is configured with.
#[derive(Deserialize)]
pub struct PushAuthParams {
    #[serde(default)]
    token: Option<String>,
}

/// Require the shared push verification token for `/events/*` routes.
pub async fn require_push_token(
    State(state): State<Arc<AppState>>,
    Query(params): Query<PushAuthParams>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let Some(token) = params.token else {
        tracing::warn!("Blocked push request without token");
        return Err(StatusCode::UNAUTHORIZED);
    };

    if !token_matches(&token, &state.config.push_verify_token) {
        tracing::warn!("Blocked push request with invalid token");
        return Err(StatusCode::FORBIDDEN);
    }

    Ok(next.run(request).await)
}

fn token_matches(presented: &str, expected: &str) -> bool {
    !expected.is_empty() && bool::from(presented.as_bytes().ct_eq(expected.as_bytes()))
}
