// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore client wrapper with typed operations.
//!
//! Provides the recommendation store operations:
//! - Recommendations (one document per activity, queried by user)
//! - User summaries (latest combined summary, keyed by user ID)

use crate::db::{
    activity_doc_id, collections, new_recommendation_id, require_activity_id, stale_versions,
    ActivityWrite, RecommendationStore,
};
use crate::error::AppError;
use crate::models::Recommendation;
use async_trait::async_trait;
use firestore::errors::FirestoreError;
use firestore::FirestoreResult;
use firestore::FirestoreConsistencySelector;

// Transactions that lose a commit race are retried this many times in total.
const UPSERT_ATTEMPTS: usize = 5;

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: Option<firestore::FirestoreDb>,
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        // If the emulator environment variable is set, use unauthenticated connection
        // to avoid local credential warnings and leakage.
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a mock Firestore client for testing (offline mode).
    ///
    /// All database operations will return an error if called.
    pub fn new_mock() -> Self {
        Self { client: None }
    }

    /// Helper to get the client or return an error if offline.
    fn get_client(&self) -> Result<&firestore::FirestoreDb, AppError> {
        self.client
            .as_ref()
            .ok_or_else(|| AppError::Database("Database not connected (offline mode)".to_string()))
    }

    /// Client that reads through `transaction`, so the documents it reads
    /// are checked for conflicts at commit.
    fn in_transaction(
        client: &firestore::FirestoreDb,
        transaction: &firestore::FirestoreTransaction<'_>,
    ) -> firestore::FirestoreDb {
        client.clone_with_consistency_selector(FirestoreConsistencySelector::Transaction(
            transaction.transaction_id().clone(),
        ))
    }

    /// One read-compare-write of an activity's record in a transaction.
    async fn upsert_attempt(
        client: &firestore::FirestoreDb,
        doc_id: &str,
        mut recommendation: Recommendation,
    ) -> FirestoreResult<ActivityWrite> {
        let mut transaction = client.begin_transaction().await?;

        // 1. Read the stored record within the transaction
        let stored: Option<Recommendation> = Self::in_transaction(client, &transaction)
            .fluent()
            .select()
            .by_id_in(collections::RECOMMENDATIONS)
            .obj()
            .one(doc_id)
            .await?;

        // 2. Compare versions; keep the stored identity on overwrite
        let (record, inserted) = match stored {
            Some(mut stored) => {
                if let Some((stored, incoming)) = stale_versions(&stored, &recommendation) {
                    // Nothing to write
                    let _ = transaction.rollback().await;
                    return Ok(ActivityWrite::Stale { stored, incoming });
                }
                stored.apply_update(recommendation);
                (stored, false)
            }
            None => {
                recommendation.id = Some(new_recommendation_id());
                (recommendation, true)
            }
        };

        // 3. Write and commit atomically
        client
            .fluent()
            .update()
            .in_col(collections::RECOMMENDATIONS)
            .document_id(doc_id)
            .object(&record)
            .add_to_transaction(&mut transaction)?;

        transaction.commit().await?;

        Ok(if inserted {
            ActivityWrite::Inserted(record)
        } else {
            ActivityWrite::Updated(record)
        })
    }

    /// Delete an activity's record in a transaction, reporting whether it
    /// existed.
    async fn delete_attempt(
        client: &firestore::FirestoreDb,
        doc_id: &str,
    ) -> FirestoreResult<bool> {
        let mut transaction = client.begin_transaction().await?;

        let stored: Option<Recommendation> = Self::in_transaction(client, &transaction)
            .fluent()
            .select()
            .by_id_in(collections::RECOMMENDATIONS)
            .obj()
            .one(doc_id)
            .await?;

        if stored.is_none() {
            let _ = transaction.rollback().await;
            return Ok(false);
        }

        client
            .fluent()
            .delete()
            .from(collections::RECOMMENDATIONS)
            .document_id(doc_id)
            .add_to_transaction(&mut transaction)?;

        transaction.commit().await?;
        Ok(true)
    }
}

#[async_trait]
impl RecommendationStore for FirestoreDb {
    async fn find_by_activity_id(
        &self,
        activity_id: &str,
    ) -> Result<Option<Recommendation>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::RECOMMENDATIONS)
            .obj()
            .one(&activity_doc_id(activity_id))
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn find_by_user_id(&self, user_id: &str) -> Result<Vec<Recommendation>, AppError> {
        // IDs are UUIDv7, so ordering by ID is insertion order.
        self.get_client()?
            .fluent()
            .select()
            .from(collections::RECOMMENDATIONS)
            .filter(|q| q.for_all([q.field("userId").eq(user_id)]))
            .order_by([("id", firestore::FirestoreQueryDirection::Ascending)])
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn delete_by_activity_id(&self, activity_id: &str) -> Result<usize, AppError> {
        let deleted = Self::delete_attempt(self.get_client()?, &activity_doc_id(activity_id))
            .await
            .map_err(|e| AppError::Database(format!("Failed to delete recommendation: {}", e)))?;

        tracing::debug!(activity_id, deleted, "Deleted recommendation");
        Ok(usize::from(deleted))
    }

    async fn save(&self, mut recommendation: Recommendation) -> Result<Recommendation, AppError> {
        let id = recommendation
            .id
            .get_or_insert_with(new_recommendation_id)
            .clone();
        let doc_id = recommendation
            .activity_id
            .as_deref()
            .map_or(id, activity_doc_id);

        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::RECOMMENDATIONS)
            .document_id(&doc_id)
            .object(&recommendation)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(recommendation)
    }

    async fn upsert_for_activity(
        &self,
        recommendation: Recommendation,
    ) -> Result<ActivityWrite, AppError> {
        let client = self.get_client()?;
        let doc_id = activity_doc_id(require_activity_id(&recommendation)?);

        let mut attempt = 1;
        loop {
            match Self::upsert_attempt(client, &doc_id, recommendation.clone()).await {
                Ok(write) => return Ok(write),
                Err(FirestoreError::DatabaseError(e))
                    if e.retry_possible && attempt < UPSERT_ATTEMPTS =>
                {
                    tracing::warn!(
                        doc_id = %doc_id,
                        attempt,
                        error = %e,
                        "Recommendation write contended, retrying"
                    );
                    attempt += 1;
                }
                Err(e) => {
                    return Err(AppError::Database(format!(
                        "Failed to write recommendation: {}",
                        e
                    )))
                }
            }
        }
    }

    async fn save_user_summary(&self, summary: &Recommendation) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::USER_SUMMARIES)
            .document_id(&summary.user_id)
            .object(summary)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    async fn find_user_summary(&self, user_id: &str) -> Result<Option<Recommendation>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::USER_SUMMARIES)
            .obj()
            .one(user_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}
