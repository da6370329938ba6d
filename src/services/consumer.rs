// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Activity event consumer.
//!
//! Reconciles stored recommendations with activity lifecycle events:
//! - "upserted": synthesize, then overwrite the existing record or insert one
//! - "deleted": remove the activity's record (absent is a no-op)
//!
//! Delivery is at-least-once with no ordering guarantee, so:
//! - Events for the same activity are serialized per activity ID within this
//!   process
//! - Across processes, an upsert whose activity version is older than the one
//!   the stored record was built from is skipped as stale. It is checked
//!   before the AI is called, and again atomically with the write

use crate::db::{ActivityWrite, RecommendationStore};
use crate::error::{AppError, Result};
use crate::models::{Activity, Recommendation};
use crate::services::synthesizer::RecommendationSynthesizer;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use validator::Validate;

/// Per-activity locks, shared by every handler in the process.
pub type ActivityLocks = Arc<DashMap<String, Arc<Mutex<()>>>>;

/// What an "activity upserted" event did to the store.
#[derive(Debug)]
pub enum UpsertOutcome {
    /// No record existed; a new one was stored.
    Inserted {
        recommendation: Recommendation,
        used_fallback: bool,
    },
    /// The existing record was overwritten in place.
    Updated {
        recommendation: Recommendation,
        used_fallback: bool,
    },
    /// The stored record was built from a newer activity version.
    Stale {
        stored: DateTime<Utc>,
        incoming: DateTime<Utc>,
    },
}

/// What an "activity deleted" event did to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted(usize),
    NotPresent,
}

/// Handles activity lifecycle events.
#[derive(Clone)]
pub struct EventConsumer {
    store: Arc<dyn RecommendationStore>,
    synthesizer: RecommendationSynthesizer,
    locks: ActivityLocks,
}

impl EventConsumer {
    pub fn new(
        store: Arc<dyn RecommendationStore>,
        synthesizer: RecommendationSynthesizer,
    ) -> Self {
        Self {
            store,
            synthesizer,
            locks: Arc::new(DashMap::new()),
        }
    }

    /// Number of activities with a handler in flight (or waiting).
    pub fn active_locks(&self) -> usize {
        self.locks.len()
    }

    /// Handle an "activity created/updated" event.
    ///
    /// AI failures never fail the handler; store failures do, so the
    /// transport can redeliver.
    pub async fn handle_upserted(&self, activity: &Activity) -> Result<UpsertOutcome> {
        let activity_id = require_activity_id(activity)?;

        let lease = self.lease(activity_id);
        let _guard = lease.lock.lock().await;
        self.upsert_locked(activity_id, activity).await
    }

    /// Handle an "activity deleted" event.
    pub async fn handle_deleted(&self, activity: &Activity) -> Result<DeleteOutcome> {
        let activity_id = require_activity_id(activity)?;

        let lease = self.lease(activity_id);
        let _guard = lease.lock.lock().await;

        let outcome = match self.store.delete_by_activity_id(activity_id).await? {
            0 => DeleteOutcome::NotPresent,
            n => DeleteOutcome::Deleted(n),
        };
        tracing::info!(activity_id, outcome = ?outcome, "Handled activity deletion");
        Ok(outcome)
    }

    async fn upsert_locked(&self, activity_id: &str, activity: &Activity) -> Result<UpsertOutcome> {
        // ─────────────────────────────────────────────────────────────
        // STEP 1: Reject stale versions before spending an AI call
        // ─────────────────────────────────────────────────────────────
        let existing = self.store.find_by_activity_id(activity_id).await?;

        if let Some(stored) = existing.as_ref().and_then(|r| r.source_updated_at) {
            if let Some(incoming) = activity.version() {
                if incoming < stored {
                    return Ok(stale(activity_id, stored, incoming));
                }
            }
        }

        // ─────────────────────────────────────────────────────────────
        // STEP 2: Synthesize (never fails; may fall back)
        // ─────────────────────────────────────────────────────────────
        let synthesis = self.synthesizer.synthesize(activity).await;
        let used_fallback = synthesis.is_fallback();
        let fresh = synthesis.into_recommendation();

        // ─────────────────────────────────────────────────────────────
        // STEP 3: Overwrite in place, or insert. Another instance may have
        //         written a newer version while the AI was running.
        // ─────────────────────────────────────────────────────────────
        let outcome = match self.store.upsert_for_activity(fresh).await? {
            ActivityWrite::Inserted(recommendation) => UpsertOutcome::Inserted {
                recommendation,
                used_fallback,
            },
            ActivityWrite::Updated(recommendation) => UpsertOutcome::Updated {
                recommendation,
                used_fallback,
            },
            ActivityWrite::Stale { stored, incoming } => {
                return Ok(stale(activity_id, stored, incoming));
            }
        };

        tracing::info!(
            activity_id,
            user_id = %activity.user_id,
            inserted = matches!(outcome, UpsertOutcome::Inserted { .. }),
            used_fallback,
            "Reconciled activity recommendation"
        );
        Ok(outcome)
    }

    fn lease(&self, activity_id: &str) -> ActivityLease {
        let lock = self
            .locks
            .entry(activity_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        ActivityLease {
            locks: self.locks.clone(),
            activity_id: activity_id.to_string(),
            lock,
        }
    }
}

/// A handler's claim on an activity's lock.
///
/// Dropping it removes the map entry once no other handler holds the lock,
/// including when the handler future is cancelled mid-await.
struct ActivityLease {
    locks: ActivityLocks,
    activity_id: String,
    lock: Arc<Mutex<()>>,
}

impl Drop for ActivityLease {
    fn drop(&mut self) {
        // Two strong references: the map entry and ours.
        self.locks.remove_if(&self.activity_id, |_, lock| {
            Arc::ptr_eq(lock, &self.lock) && Arc::strong_count(lock) == 2
        });
    }
}

fn stale(activity_id: &str, stored: DateTime<Utc>, incoming: DateTime<Utc>) -> UpsertOutcome {
    tracing::info!(
        activity_id,
        stored = %stored,
        incoming = %incoming,
        "Skipping stale activity update"
    );
    UpsertOutcome::Stale { stored, incoming }
}

/// Validate the event payload and return its activity ID.
fn require_activity_id(activity: &Activity) -> Result<&str> {
    activity
        .validate()
        .map_err(|e| AppError::BadRequest(format!("Invalid activity payload: {}", e)))?;

    activity
        .id
        .as_deref()
        .ok_or_else(|| AppError::BadRequest("Activity event has no id".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use crate::services::ai::MockAiClient;

    fn consumer() -> EventConsumer {
        let ai = Arc::new(MockAiClient::always(MockAiClient::envelope(
            r#"{"analysis":{"overall":"ok"}}"#,
        )));
        EventConsumer::new(
            Arc::new(MemoryStore::new()),
            RecommendationSynthesizer::new(ai),
        )
    }

    #[tokio::test]
    async fn test_missing_id_is_bad_request() {
        let activity = Activity::summary_placeholder("user-1", 0);
        let consumer = consumer();

        assert!(matches!(
            consumer.handle_upserted(&activity).await,
            Err(AppError::BadRequest(_))
        ));
        assert!(matches!(
            consumer.handle_deleted(&activity).await,
            Err(AppError::BadRequest(_))
        ));
    }

    #[tokio::test]
    async fn test_empty_user_is_bad_request() {
        let mut activity = Activity::summary_placeholder("", 0);
        activity.id = Some("act-1".to_string());

        assert!(matches!(
            consumer().handle_upserted(&activity).await,
            Err(AppError::BadRequest(_))
        ));
    }

    #[tokio::test]
    async fn test_locks_are_reclaimed() {
        let consumer = consumer();
        let mut activity = Activity::summary_placeholder("user-1", 0);
        activity.id = Some("act-1".to_string());

        consumer.handle_upserted(&activity).await.unwrap();
        consumer.handle_deleted(&activity).await.unwrap();

        assert_eq!(consumer.active_locks(), 0);
    }

    #[tokio::test]
    async fn test_cancelled_handler_releases_lock() {
        let ai = MockAiClient::always(MockAiClient::envelope(r#"{"analysis":{"overall":"ok"}}"#))
            .with_delay(std::time::Duration::from_millis(500));
        let store = Arc::new(MemoryStore::new());
        let consumer =
            EventConsumer::new(store.clone(), RecommendationSynthesizer::new(Arc::new(ai)));
        let mut activity = Activity::summary_placeholder("user-1", 0);
        activity.id = Some("act-1".to_string());

        let cancelled = tokio::time::timeout(
            std::time::Duration::from_millis(10),
            consumer.handle_upserted(&activity),
        )
        .await;

        assert!(cancelled.is_err());
        assert_eq!(consumer.active_locks(), 0);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_waiting_handler_keeps_lock_entry() {
        let consumer = consumer();
        let first = consumer.lease("act-1");
        let second = consumer.lease("act-1");

        drop(first);
        assert_eq!(consumer.active_locks(), 1);
        drop(second);
        assert_eq!(consumer.active_locks(), 0);
    }
}
