// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! On-demand recommendation queries.

use crate::db::RecommendationStore;
use crate::error::{AppError, Result};
use crate::models::Recommendation;
use crate::services::synthesizer::{RecommendationSynthesizer, Synthesis};
use std::sync::Arc;

/// Read side of the pipeline, plus on-demand user summaries.
#[derive(Clone)]
pub struct RecommendationService {
    store: Arc<dyn RecommendationStore>,
    synthesizer: RecommendationSynthesizer,
}

impl RecommendationService {
    pub fn new(
        store: Arc<dyn RecommendationStore>,
        synthesizer: RecommendationSynthesizer,
    ) -> Self {
        Self { store, synthesizer }
    }

    /// Get the recommendation for an activity.
    pub async fn get_activity_recommendation(&self, activity_id: &str) -> Result<Recommendation> {
        self.store
            .find_by_activity_id(activity_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("Recommendation for activity {}", activity_id))
            })
    }

    /// Combine the user's recommendations into a fresh summary and keep it
    /// as the user's latest summary.
    ///
    /// The summary is returned even if storing it fails.
    pub async fn get_user_recommendation(&self, user_id: &str) -> Result<Synthesis> {
        let existing = self.store.find_by_user_id(user_id).await?;
        let synthesis = self.synthesizer.combine(user_id, &existing).await?;

        if let Err(e) = self
            .store
            .save_user_summary(synthesis.recommendation())
            .await
        {
            tracing::warn!(user_id, error = %e, "Failed to store user summary");
        }

        tracing::info!(
            user_id,
            count = existing.len(),
            used_fallback = synthesis.is_fallback(),
            "Generated user summary"
        );
        Ok(synthesis)
    }

    /// All per-activity recommendations for a user, oldest first.
    pub async fn list_user_recommendations(&self, user_id: &str) -> Result<Vec<Recommendation>> {
        self.store.find_by_user_id(user_id).await
    }

    /// The most recently generated summary for a user.
    pub async fn get_latest_user_summary(&self, user_id: &str) -> Result<Recommendation> {
        self.store
            .find_user_summary(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Summary for user {}", user_id)))
    }
}
