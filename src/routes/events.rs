// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Push delivery endpoint for activity lifecycle events.
//!
//! Called by the event transport, not directly by users. Protected by the
//! push token middleware. The returned status drives redelivery:
//! - 2xx acknowledges the message
//! - 5xx asks the transport to redeliver it
//!
//! Messages that can never succeed (undecodable, invalid, unknown stream) are
//! logged and acknowledged.

use crate::config::EventStreams;
use crate::error::AppError;
use crate::models::Activity;
use crate::services::{DeleteOutcome, UpsertOutcome};
use crate::AppState;
use axum::{
    extract::{Json, State},
    http::StatusCode,
    routing::post,
    Router,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;

/// Event push routes (called by the transport).
pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/events/push", post(push_event))
}

/// Push delivery envelope.
#[derive(Deserialize, Debug)]
pub struct PushEnvelope {
    pub message: PushMessage,
    /// Full subscription name, e.g. `projects/p/subscriptions/activity-upserted`
    pub subscription: String,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct PushMessage {
    /// Base64-encoded JSON activity
    #[serde(default)]
    pub data: String,
    #[serde(default)]
    pub message_id: String,
    #[serde(default)]
    pub attributes: HashMap<String, String>,
    #[serde(default)]
    pub publish_time: Option<String>,
    /// Activity ID when the publisher orders by key
    #[serde(default)]
    pub ordering_key: Option<String>,
}

/// Which inbound stream a message came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Upserted,
    Deleted,
}

impl EventKind {
    /// Match a subscription name (full path or short name) against the
    /// configured streams.
    pub fn from_subscription(subscription: &str, streams: &EventStreams) -> Option<Self> {
        let name = subscription.rsplit('/').next().unwrap_or(subscription);
        if name == streams.activity_upserted {
            Some(EventKind::Upserted)
        } else if name == streams.activity_deleted {
            Some(EventKind::Deleted)
        } else {
            None
        }
    }
}

/// Decode the activity carried by a push message.
pub fn decode_activity(message: &PushMessage) -> Result<Activity, String> {
    let bytes = STANDARD
        .decode(message.data.trim())
        .map_err(|e| format!("invalid base64 data: {}", e))?;
    serde_json::from_slice(&bytes).map_err(|e| format!("invalid activity JSON: {}", e))
}

/// Handle one pushed event.
async fn push_event(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<serde_json::Value>,
) -> StatusCode {
    let envelope: PushEnvelope = match serde_json::from_value(payload) {
        Ok(e) => e,
        Err(e) => {
            tracing::error!(error = %e, "Failed to parse push envelope");
            return StatusCode::OK; // Acknowledge; redelivery cannot fix it
        }
    };
    let message_id = envelope.message.message_id.as_str();

    let Some(kind) =
        EventKind::from_subscription(&envelope.subscription, &state.config.event_streams)
    else {
        tracing::warn!(
            message_id,
            subscription = %envelope.subscription,
            "Push from unknown subscription, acknowledging"
        );
        return StatusCode::OK;
    };

    let activity = match decode_activity(&envelope.message) {
        Ok(a) => a,
        Err(e) => {
            tracing::error!(message_id, stream = ?kind, error = %e, "Undecodable activity event");
            return StatusCode::OK;
        }
    };

    tracing::info!(
        message_id,
        stream = ?kind,
        activity_id = activity.id.as_deref().unwrap_or_default(),
        ordering_key = envelope.message.ordering_key.as_deref().unwrap_or_default(),
        publish_time = envelope.message.publish_time.as_deref().unwrap_or_default(),
        "Activity event received"
    );

    let result = match kind {
        EventKind::Upserted => state
            .consumer
            .handle_upserted(&activity)
            .await
            .map(|outcome| log_upsert(message_id, &outcome)),
        EventKind::Deleted => state
            .consumer
            .handle_deleted(&activity)
            .await
            .map(|outcome| log_delete(message_id, outcome)),
    };

    match result {
        Ok(()) => StatusCode::OK,
        Err(AppError::BadRequest(reason)) => {
            tracing::warn!(message_id, reason = %reason, "Rejected activity event");
            StatusCode::OK
        }
        Err(e) => {
            tracing::error!(message_id, error = %e, "Failed to handle activity event");
            StatusCode::INTERNAL_SERVER_ERROR // Redeliver
        }
    }
}

fn log_upsert(message_id: &str, outcome: &UpsertOutcome) {
    match outcome {
        UpsertOutcome::Inserted { used_fallback, .. }
        | UpsertOutcome::Updated { used_fallback, .. } => {
            tracing::debug!(message_id, used_fallback, "Upsert event applied");
        }
        UpsertOutcome::Stale { stored, incoming } => {
            tracing::debug!(
                message_id,
                stored = %stored,
                incoming = %incoming,
                "Upsert event stale"
            );
        }
    }
}

fn log_delete(message_id: &str, outcome: DeleteOutcome) {
    tracing::debug!(message_id, outcome = ?outcome, "Delete event applied");
}
