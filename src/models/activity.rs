// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Activity model as published by the activity-tracking service.
//!
//! This service never writes activities; it only reads the payload carried
//! by lifecycle events.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use validator::{Validate, ValidationError};

/// Kind of exercise session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActivityType {
    Running,
    Walking,
    Cycling,
    Swimming,
    WeightTraining,
    Yoga,
    Hiit,
    Cardio,
    Stretching,
    /// Also used for values this service does not know about.
    #[default]
    #[serde(other)]
    Other,
}

impl ActivityType {
    /// Wire name, e.g. `WEIGHT_TRAINING`.
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityType::Running => "RUNNING",
            ActivityType::Walking => "WALKING",
            ActivityType::Cycling => "CYCLING",
            ActivityType::Swimming => "SWIMMING",
            ActivityType::WeightTraining => "WEIGHT_TRAINING",
            ActivityType::Yoga => "YOGA",
            ActivityType::Hiit => "HIIT",
            ActivityType::Cardio => "CARDIO",
            ActivityType::Stretching => "STRETCHING",
            ActivityType::Other => "OTHER",
        }
    }
}

impl fmt::Display for ActivityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A tracked exercise session, as carried by activity events.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    /// Activity ID (absent only for the synthetic summary placeholder)
    #[serde(default)]
    #[validate(custom(function = "validate_activity_id"))]
    pub id: Option<String>,
    /// Owning user ID
    #[validate(length(min = 1, message = "userId must not be empty"))]
    pub user_id: String,
    #[serde(rename = "type", default, deserialize_with = "null_as_default")]
    pub activity_type: ActivityType,
    /// Duration in minutes
    #[serde(default)]
    pub duration: Option<u32>,
    #[serde(default)]
    pub calories_burned: Option<u32>,
    #[serde(default, deserialize_with = "flexible_timestamp")]
    pub start_time: Option<DateTime<Utc>>,
    /// Free-form metrics (time of day, heart rate, meal timing...)
    #[serde(default, deserialize_with = "null_as_default")]
    pub additional_metrics: BTreeMap<String, Value>,
    #[serde(default, deserialize_with = "flexible_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
    /// Last modification time; used as the event version.
    #[serde(default, deserialize_with = "flexible_timestamp")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Treat an explicit `null` like a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Accept RFC 3339 timestamps and offset-less local date-times (read as UTC),
/// as published by the activity service.
fn flexible_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(raw) = Option::<String>::deserialize(deserializer)? else {
        return Ok(None);
    };

    parse_timestamp(&raw)
        .map(Some)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {:?}", raw)))
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

fn validate_activity_id(id: &str) -> Result<(), ValidationError> {
    if id.trim().is_empty() {
        return Err(ValidationError::new("empty_activity_id"));
    }
    Ok(())
}

impl Activity {
    /// Synthetic activity used to run a user-level summary through the
    /// per-activity normalizer.
    pub fn summary_placeholder(user_id: &str, recommendations_count: usize) -> Self {
        let mut additional_metrics = BTreeMap::new();
        additional_metrics.insert(
            "recommendationsCount".to_string(),
            Value::from(recommendations_count),
        );

        Self {
            id: None,
            user_id: user_id.to_string(),
            activity_type: ActivityType::Other,
            duration: None,
            calories_burned: None,
            start_time: None,
            additional_metrics,
            created_at: None,
            updated_at: None,
        }
    }

    /// The version used to order updates for the same activity.
    pub fn version(&self) -> Option<DateTime<Utc>> {
        self.updated_at.or(self.created_at)
    }
}
