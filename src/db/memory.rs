// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-process recommendation store.
//!
//! Keeps records in insertion order, at most one per activity. Used with
//! `STORE_BACKEND=memory` and by the test suite.

use crate::db::{
    new_recommendation_id, require_activity_id, stale_versions, ActivityWrite, RecommendationStore,
};
use crate::error::AppError;
use crate::models::Recommendation;
use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::RwLock;

/// In-memory recommendation store.
#[derive(Default)]
pub struct MemoryStore {
    recommendations: RwLock<Vec<Recommendation>>,
    summaries: DashMap<String, Recommendation>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored per-activity recommendations.
    pub async fn len(&self) -> usize {
        self.recommendations.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl RecommendationStore for MemoryStore {
    async fn find_by_activity_id(
        &self,
        activity_id: &str,
    ) -> Result<Option<Recommendation>, AppError> {
        Ok(self
            .recommendations
            .read()
            .await
            .iter()
            .find(|r| r.activity_id.as_deref() == Some(activity_id))
            .cloned())
    }

    async fn find_by_user_id(&self, user_id: &str) -> Result<Vec<Recommendation>, AppError> {
        Ok(self
            .recommendations
            .read()
            .await
            .iter()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn delete_by_activity_id(&self, activity_id: &str) -> Result<usize, AppError> {
        let mut recommendations = self.recommendations.write().await;
        let before = recommendations.len();
        recommendations.retain(|r| r.activity_id.as_deref() != Some(activity_id));
        Ok(before - recommendations.len())
    }

    async fn save(&self, mut recommendation: Recommendation) -> Result<Recommendation, AppError> {
        if recommendation.id.is_none() {
            recommendation.id = Some(new_recommendation_id());
        }

        let mut recommendations = self.recommendations.write().await;
        let slot = recommendations.iter_mut().find(|r| match &recommendation.activity_id {
            Some(activity_id) => r.activity_id.as_ref() == Some(activity_id),
            None => r.id == recommendation.id,
        });

        match slot {
            Some(slot) => *slot = recommendation.clone(),
            None => recommendations.push(recommendation.clone()),
        }
        Ok(recommendation)
    }

    async fn upsert_for_activity(
        &self,
        mut recommendation: Recommendation,
    ) -> Result<ActivityWrite, AppError> {
        let activity_id = require_activity_id(&recommendation)?.to_string();

        let mut recommendations = self.recommendations.write().await;
        let slot = recommendations
            .iter_mut()
            .find(|r| r.activity_id.as_deref() == Some(activity_id.as_str()));

        match slot {
            Some(stored) => {
                if let Some((stored, incoming)) = stale_versions(stored, &recommendation) {
                    return Ok(ActivityWrite::Stale { stored, incoming });
                }
                stored.apply_update(recommendation);
                Ok(ActivityWrite::Updated(stored.clone()))
            }
            None => {
                recommendation.id = Some(new_recommendation_id());
                recommendations.push(recommendation.clone());
                Ok(ActivityWrite::Inserted(recommendation))
            }
        }
    }

    async fn save_user_summary(&self, summary: &Recommendation) -> Result<(), AppError> {
        self.summaries
            .insert(summary.user_id.clone(), summary.clone());
        Ok(())
    }

    async fn find_user_summary(&self, user_id: &str) -> Result<Option<Recommendation>, AppError> {
        Ok(self.summaries.get(user_id).map(|s| s.value().clone()))
    }
}
