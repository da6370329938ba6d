// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Recommendation synthesis: prompt the AI, normalize, fall back on failure.
//!
//! Synthesis never fails the caller. An AI or parsing failure becomes a fixed
//! fallback recommendation, and `Synthesis` records which path was taken and
//! why.

use crate::error::{AppError, Result, SynthesisError};
use crate::models::{Activity, Recommendation, USER_SUMMARY_TYPE};
use crate::services::ai::AiClient;
use crate::services::{normalizer, prompts};
use chrono::Utc;
use std::sync::Arc;

/// Result of a synthesis: the AI-derived record, or the fallback and the
/// reason it was used.
#[derive(Debug)]
pub enum Synthesis {
    Generated(Recommendation),
    Fallback {
        recommendation: Recommendation,
        reason: SynthesisError,
    },
}

impl Synthesis {
    pub fn recommendation(&self) -> &Recommendation {
        match self {
            Synthesis::Generated(rec) => rec,
            Synthesis::Fallback { recommendation, .. } => recommendation,
        }
    }

    pub fn into_recommendation(self) -> Recommendation {
        match self {
            Synthesis::Generated(rec) => rec,
            Synthesis::Fallback { recommendation, .. } => recommendation,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Synthesis::Fallback { .. })
    }
}

/// Builds recommendations from activities, and summaries from recommendations.
#[derive(Clone)]
pub struct RecommendationSynthesizer {
    ai: Arc<dyn AiClient>,
}

impl RecommendationSynthesizer {
    pub fn new(ai: Arc<dyn AiClient>) -> Self {
        Self { ai }
    }

    /// Synthesize the recommendation for a single activity.
    pub async fn synthesize(&self, activity: &Activity) -> Synthesis {
        let prompt = prompts::activity_prompt(activity);

        match self.generate_and_normalize(&prompt, activity).await {
            Ok(rec) => Synthesis::Generated(rec),
            Err((reason, raw)) => {
                tracing::warn!(
                    activity_id = activity.id.as_deref().unwrap_or_default(),
                    user_id = %activity.user_id,
                    error = %reason,
                    raw_response = raw.as_deref().unwrap_or_default(),
                    "Falling back to default activity recommendation"
                );
                Synthesis::Fallback {
                    recommendation: activity_fallback(activity),
                    reason,
                }
            }
        }
    }

    /// Combine a user's existing recommendations into one summary.
    ///
    /// Fails with `NoData` (without calling the AI) when there is nothing to
    /// combine.
    pub async fn combine(
        &self,
        user_id: &str,
        recommendations: &[Recommendation],
    ) -> Result<Synthesis> {
        if recommendations.is_empty() {
            return Err(AppError::NoData(format!(
                "No recommendations found for user {}",
                user_id
            )));
        }

        let records = serde_json::to_string(recommendations)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("serialize recommendations: {}", e)))?;
        let prompt = prompts::combined_prompt(user_id, &records);
        let placeholder = Activity::summary_placeholder(user_id, recommendations.len());

        let synthesis = match self.generate_and_normalize(&prompt, &placeholder).await {
            Ok(mut rec) => {
                rec.recommendation_type = USER_SUMMARY_TYPE.to_string();
                Synthesis::Generated(rec)
            }
            Err((reason, raw)) => {
                tracing::warn!(
                    user_id,
                    count = recommendations.len(),
                    error = %reason,
                    raw_response = raw.as_deref().unwrap_or_default(),
                    "Falling back to default combined recommendation"
                );
                Synthesis::Fallback {
                    recommendation: combined_fallback(user_id),
                    reason,
                }
            }
        };

        Ok(synthesis)
    }

    /// Call the AI and normalize its answer. On failure, also return the raw
    /// response when one was received.
    async fn generate_and_normalize(
        &self,
        prompt: &str,
        activity: &Activity,
    ) -> std::result::Result<Recommendation, (SynthesisError, Option<String>)> {
        let raw = self
            .ai
            .generate(prompt)
            .await
            .map_err(|e| (SynthesisError::from(e), None))?;

        normalizer::normalize(activity, &raw).map_err(|e| (SynthesisError::from(e), Some(raw)))
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Fixed recommendation used when an activity cannot be analyzed.
pub fn activity_fallback(activity: &Activity) -> Recommendation {
    Recommendation {
        id: None,
        activity_id: activity.id.clone(),
        user_id: activity.user_id.clone(),
        recommendation_type: activity.activity_type.to_string(),
        recommendation: "Unable to generate detailed analysis".to_string(),
        improvements: strings(&["Continue with your current routine"]),
        suggestions: strings(&["Consider consulting a fitness consultant"]),
        safety: strings(&[
            "Always warm up before exercise",
            "Stay hydrated",
            "Listen to your body",
        ]),
        created_at: Utc::now(),
        source_updated_at: activity.version(),
    }
}

/// Fixed summary used when a user's recommendations cannot be combined.
pub fn combined_fallback(user_id: &str) -> Recommendation {
    Recommendation {
        id: None,
        activity_id: None,
        user_id: user_id.to_string(),
        recommendation_type: USER_SUMMARY_TYPE.to_string(),
        recommendation: "Unable to generate combined recommendation from existing records."
            .to_string(),
        improvements: strings(&["Review individual activity recommendations."]),
        suggestions: strings(&["Continue tracking workouts and recommendations."]),
        safety: strings(&["Warm up properly", "Stay hydrated", "Listen to your body"]),
        created_at: Utc::now(),
        source_updated_at: None,
    }
}
