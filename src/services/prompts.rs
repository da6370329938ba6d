// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Prompt templates for the AI capability.

use crate::models::Activity;

/// The JSON shape every prompt asks the model to return.
const RESPONSE_FORMAT: &str = r#"{
  "analysis": {
    "overall": "Overall analysis here",
    "pace": "Pace analysis here",
    "heartRate": "Heart rate analysis here",
    "caloriesBurned": "Calories analysis here"
  },
  "improvements": [
    {
      "area": "Area name",
      "recommendation": "Detailed recommendation"
    }
  ],
  "suggestions": [
    {
      "workout": "Workout name",
      "description": "Detailed workout description"
    }
  ],
  "safety": [
    "Safety point 1",
    "Safety point 2"
  ]
}"#;

/// Build the analysis prompt for a single activity.
pub fn activity_prompt(activity: &Activity) -> String {
    let metrics = serde_json::to_string(&activity.additional_metrics)
        .unwrap_or_else(|_| "{}".to_string());

    format!(
        "Analyze this fitness activity and provide detailed recommendations in the following EXACT JSON format:\n\
         {RESPONSE_FORMAT}\n\
         \n\
         Analyze this activity:\n\
         Activity Type: {}\n\
         Duration: {} minutes\n\
         Calories Burned: {}\n\
         Additional Metrics: {}\n\
         \n\
         Provide detailed analysis focusing on performance, improvements, next workout suggestions, and safety guidelines.\n\
         Ensure the response follows the EXACT JSON format shown above.\n",
        activity.activity_type,
        display_or_null(activity.duration),
        display_or_null(activity.calories_burned),
        metrics,
    )
}

/// Build the prompt that merges a user's existing recommendations.
///
/// `recommendations_json` is the JSON array of the stored records.
pub fn combined_prompt(user_id: &str, recommendations_json: &str) -> String {
    format!(
        "You are an expert fitness coach.\n\
         \n\
         Below is the FULL list of activity-level recommendations for a user.\n\
         Each item already contains:\n\
         - activity type\n\
         - detailed recommendation text\n\
         - improvements\n\
         - suggestions\n\
         - safety tips\n\
         \n\
         USER ID: {user_id}\n\
         \n\
         ACTIVITY-LEVEL RECOMMENDATIONS (JSON ARRAY):\n\
         {recommendations_json}\n\
         \n\
         Using ALL of the information above, create ONE combined recommendation for this user.\n\
         \n\
         Return the result in the EXACT JSON format below (NO extra text, NO markdown):\n\
         \n\
         {RESPONSE_FORMAT}\n\
         \n\
         Focus on patterns across ALL activities (e.g., low intensity, poor tracking, consistency).\n"
    )
}

fn display_or_null(value: Option<u32>) -> String {
    value.map_or_else(|| "null".to_string(), |v| v.to_string())
}
