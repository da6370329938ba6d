// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Recommendation model for storage and API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// `type` marker for a combined per-user summary.
pub const USER_SUMMARY_TYPE: &str = "USER_SUMMARY";

/// Coaching feedback derived from one activity, or combined across a user's
/// activities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct Recommendation {
    /// Assigned by the store on first save
    #[serde(default)]
    pub id: Option<String>,
    /// Source activity (None for user summaries)
    #[serde(default)]
    pub activity_id: Option<String>,
    pub user_id: String,
    /// Source activity type, or `USER_SUMMARY`
    #[serde(rename = "type")]
    pub recommendation_type: String,
    /// Labeled analysis sections joined by blank lines
    pub recommendation: String,
    pub improvements: Vec<String>,
    pub suggestions: Vec<String>,
    pub safety: Vec<String>,
    pub created_at: DateTime<Utc>,
    /// Version of the activity this was synthesized from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_updated_at: Option<DateTime<Utc>>,
}

impl Recommendation {
    /// Whether this is a combined user summary.
    pub fn is_user_summary(&self) -> bool {
        self.recommendation_type == USER_SUMMARY_TYPE
    }

    /// Overwrite the mutable fields with a freshly synthesized record,
    /// keeping identity (`id`, `activity_id`, `user_id`, `type`).
    pub fn apply_update(&mut self, fresh: Recommendation) {
        self.recommendation = fresh.recommendation;
        self.improvements = fresh.improvements;
        self.suggestions = fresh.suggestions;
        self.safety = fresh.safety;
        self.created_at = fresh.created_at;
        self.source_updated_at = fresh.source_updated_at;
    }
}
