//! Recommendation storage (Firestore, or in-memory for local runs and tests).

pub mod firestore;
pub mod memory;

pub use firestore::FirestoreDb;
pub use memory::MemoryStore;

use crate::error::AppError;
use crate::models::Recommendation;
use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{DateTime, Utc};

/// Collection names as constants.
pub mod collections {
    /// Per-activity recommendations (document ID derived from the activity ID)
    pub const RECOMMENDATIONS: &str = "recommendations";
    /// Latest combined summary per user (document ID = user ID)
    pub const USER_SUMMARIES: &str = "user_summaries";
}

/// Result of a conditional per-activity write.
#[derive(Debug)]
pub enum ActivityWrite {
    /// No record existed for the activity.
    Inserted(Recommendation),
    /// The existing record was overwritten, keeping its ID.
    Updated(Recommendation),
    /// The stored record was built from a newer activity version; nothing
    /// was written.
    Stale {
        stored: DateTime<Utc>,
        incoming: DateTime<Utc>,
    },
}

/// Operations the recommendation pipeline needs from durable storage.
///
/// Each operation is atomic for a single record; nothing spans records.
#[async_trait]
pub trait RecommendationStore: Send + Sync {
    /// Get the recommendation derived from an activity.
    async fn find_by_activity_id(
        &self,
        activity_id: &str,
    ) -> Result<Option<Recommendation>, AppError>;

    /// Get all per-activity recommendations for a user, oldest insert first.
    async fn find_by_user_id(&self, user_id: &str) -> Result<Vec<Recommendation>, AppError>;

    /// Delete recommendations for an activity. Returns how many were removed;
    /// zero is not an error.
    async fn delete_by_activity_id(&self, activity_id: &str) -> Result<usize, AppError>;

    /// Insert or replace a record, assigning an ID when `id` is None.
    ///
    /// Records with an activity ID are keyed by it, so there is at most one
    /// per activity.
    async fn save(&self, recommendation: Recommendation) -> Result<Recommendation, AppError>;

    /// Write the record for `recommendation.activity_id`, unless the stored
    /// record was built from a newer activity version.
    ///
    /// The version check and the write are one atomic step.
    async fn upsert_for_activity(
        &self,
        recommendation: Recommendation,
    ) -> Result<ActivityWrite, AppError>;

    /// Store the latest combined summary for a user, replacing any previous one.
    async fn save_user_summary(&self, summary: &Recommendation) -> Result<(), AppError>;

    /// Get the latest stored combined summary for a user.
    async fn find_user_summary(&self, user_id: &str) -> Result<Option<Recommendation>, AppError>;
}

/// New store-assigned identifier. UUIDv7 sorts by creation time, which gives
/// insertion order for `find_by_user_id`.
pub fn new_recommendation_id() -> String {
    uuid::Uuid::now_v7().to_string()
}

/// Document ID for an activity's recommendation.
///
/// Activity IDs are opaque, so they are encoded to stay clear of `/` and
/// the reserved `__*__` names.
pub fn activity_doc_id(activity_id: &str) -> String {
    format!("act_{}", URL_SAFE_NO_PAD.encode(activity_id))
}

/// Versions of `stored` and `incoming` when `incoming` is older.
///
/// Records without a version never count as stale.
pub fn stale_versions(
    stored: &Recommendation,
    incoming: &Recommendation,
) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    match (stored.source_updated_at, incoming.source_updated_at) {
        (Some(stored), Some(incoming)) if incoming < stored => Some((stored, incoming)),
        _ => None,
    }
}

/// Activity ID of a per-activity record.
fn require_activity_id(recommendation: &Recommendation) -> Result<&str, AppError> {
    recommendation.activity_id.as_deref().ok_or_else(|| {
        AppError::Internal(anyhow::anyhow!(
            "per-activity write for a record without activity ID"
        ))
    })
}
