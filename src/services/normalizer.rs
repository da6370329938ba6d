// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Turns raw AI responses into recommendations.
//!
//! The response is untrusted, loosely structured text:
//! 1. Parse the envelope and take `candidates[0].content.parts[0].text`
//! 2. Strip a markdown code fence, then parse the inner JSON payload
//! 3. Build the labeled analysis text and the three item lists
//!
//! Only steps 1 and 2 can fail. Missing or empty fields in the payload are
//! replaced by defaults, never reported as errors.

use crate::error::NormalizeError;
use crate::models::{Activity, Recommendation};
use chrono::{DateTime, Utc};
use serde_json::Value;

pub const DEFAULT_IMPROVEMENT: &str = "No specific improvements provided";
pub const DEFAULT_SUGGESTION: &str = "No specific suggestions provided";
pub const DEFAULT_SAFETY: &str = "Follow general safety guidelines";

/// Analysis keys and their labels, in output order.
const ANALYSIS_SECTIONS: [(&str, &str); 4] = [
    ("overall", "Overall:"),
    ("pace", "Pace:"),
    ("heartRate", "Heart Rate:"),
    ("caloriesBurned", "Calories:"),
];

/// Normalize a raw AI response for `activity`, stamped with the current time.
pub fn normalize(activity: &Activity, raw: &str) -> Result<Recommendation, NormalizeError> {
    normalize_at(activity, raw, Utc::now())
}

/// Normalize a raw AI response with an explicit creation time.
pub fn normalize_at(
    activity: &Activity,
    raw: &str,
    created_at: DateTime<Utc>,
) -> Result<Recommendation, NormalizeError> {
    let text = extract_candidate_text(raw)?;
    let payload: Value =
        serde_json::from_str(strip_code_fence(&text)).map_err(NormalizeError::InvalidPayload)?;

    Ok(Recommendation {
        id: None,
        activity_id: activity.id.clone(),
        user_id: activity.user_id.clone(),
        recommendation_type: activity.activity_type.to_string(),
        recommendation: build_analysis(payload.get("analysis")),
        improvements: pair_items(
            payload.get("improvements"),
            "area",
            "recommendation",
            DEFAULT_IMPROVEMENT,
        ),
        suggestions: pair_items(
            payload.get("suggestions"),
            "workout",
            "description",
            DEFAULT_SUGGESTION,
        ),
        safety: text_items(payload.get("safety"), DEFAULT_SAFETY),
        created_at,
        source_updated_at: activity.version(),
    })
}

/// Pull the first candidate's first text part out of the response envelope.
pub fn extract_candidate_text(raw: &str) -> Result<String, NormalizeError> {
    let envelope: Value = serde_json::from_str(raw).map_err(NormalizeError::InvalidEnvelope)?;

    envelope
        .get("candidates")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("content"))
        .and_then(|c| c.get("parts"))
        .and_then(|p| p.get(0))
        .and_then(|p| p.get("text"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or(NormalizeError::MissingCandidateText)
}

/// Remove a surrounding markdown code fence (```` ```json ```` or bare ```` ``` ````).
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();

    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string ("json") on the opening fence line.
    let body = match rest.find('\n') {
        Some(newline) if !rest[..newline].contains('{') => &rest[newline + 1..],
        _ => rest.trim_start_matches("json"),
    };

    body.trim_end()
        .strip_suffix("```")
        .unwrap_or(body)
        .trim()
}

/// Render a JSON node the way free-text fields expect it.
///
/// Strings are taken verbatim; other scalars are stringified; containers
/// have no text form.
fn node_text(node: &Value) -> String {
    match node {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
        Value::Array(_) | Value::Object(_) => String::new(),
    }
}

fn field_text(node: &Value, key: &str) -> String {
    node.get(key).map(node_text).unwrap_or_default()
}

/// Join the present analysis sections, each as "<label><text>", separated by
/// blank lines. Absent keys are skipped, label included.
fn build_analysis(analysis: Option<&Value>) -> String {
    let Some(analysis) = analysis else {
        return String::new();
    };

    ANALYSIS_SECTIONS
        .iter()
        .filter_map(|(key, label)| {
            analysis
                .get(*key)
                .map(|node| format!("{}{}", label, node_text(node)))
        })
        .collect::<Vec<_>>()
        .join("\n\n")
        .trim()
        .to_string()
}

/// Render `[{a, b}, ...]` as `"<a>: <b>"` entries, or the default when the
/// array is absent, not an array, or empty.
fn pair_items(node: Option<&Value>, first: &str, second: &str, default: &str) -> Vec<String> {
    let items: Vec<String> = node
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .map(|item| format!("{}: {}", field_text(item, first), field_text(item, second)))
                .collect()
        })
        .unwrap_or_default();

    or_default(items, default)
}

/// Copy a string array verbatim, or the default when absent/empty.
fn text_items(node: Option<&Value>, default: &str) -> Vec<String> {
    let items: Vec<String> = node
        .and_then(Value::as_array)
        .map(|items| items.iter().map(node_text).collect())
        .unwrap_or_default();

    or_default(items, default)
}

fn or_default(items: Vec<String>, default: &str) -> Vec<String> {
    if items.is_empty() {
        vec![default.to_string()]
    } else {
        items
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ActivityType;
    use crate::services::ai::MockAiClient;
    use serde_json::json;

    fn running_activity() -> Activity {
        let mut activity = Activity::summary_placeholder("user-1", 0);
        activity.id = Some("act-1".to_string());
        activity.activity_type = ActivityType::Running;
        activity.additional_metrics.clear();
        activity
    }

    fn full_payload() -> Value {
        json!({
            "analysis": {
                "overall": "Great run",
                "pace": "Steady 5:30/km",
                "heartRate": "Mostly zone 2",
                "caloriesBurned": "In line with effort"
            },
            "improvements": [
                {"area": "Cadence", "recommendation": "Aim for 170 spm"},
                {"area": "Warmup", "recommendation": "Add strides"}
            ],
            "suggestions": [
                {"workout": "Tempo run", "description": "20 minutes at threshold"}
            ],
            "safety": ["Hydrate", "Stretch afterwards"]
        })
    }

    #[test]
    fn test_full_payload() {
        let raw = MockAiClient::envelope(&full_payload().to_string());
        let rec = normalize(&running_activity(), &raw).unwrap();

        assert_eq!(
            rec.recommendation,
            "Overall:Great run\n\nPace:Steady 5:30/km\n\nHeart Rate:Mostly zone 2\n\nCalories:In line with effort"
        );
        assert_eq!(
            rec.improvements,
            vec!["Cadence: Aim for 170 spm", "Warmup: Add strides"]
        );
        assert_eq!(rec.suggestions, vec!["Tempo run: 20 minutes at threshold"]);
        assert_eq!(rec.safety, vec!["Hydrate", "Stretch afterwards"]);
        assert_eq!(rec.activity_id.as_deref(), Some("act-1"));
        assert_eq!(rec.user_id, "user-1");
        assert_eq!(rec.recommendation_type, "RUNNING");
        assert!(rec.id.is_none());
    }

    #[test]
    fn test_absent_pace_skips_label() {
        let payload = json!({"analysis": {"overall": "Solid", "heartRate": "High"}});
        let raw = MockAiClient::envelope(&payload.to_string());
        let rec = normalize(&running_activity(), &raw).unwrap();

        assert!(rec.recommendation.contains("Overall:"));
        assert!(!rec.recommendation.contains("Pace:"));
        assert_eq!(rec.recommendation, "Overall:Solid\n\nHeart Rate:High");
    }

    #[test]
    fn test_empty_and_missing_arrays_use_defaults() {
        let payload = json!({"analysis": {"overall": "ok"}, "improvements": []});
        let raw = MockAiClient::envelope(&payload.to_string());
        let rec = normalize(&running_activity(), &raw).unwrap();

        assert_eq!(rec.improvements, vec![DEFAULT_IMPROVEMENT]);
        assert_eq!(rec.suggestions, vec![DEFAULT_SUGGESTION]);
        assert_eq!(rec.safety, vec![DEFAULT_SAFETY]);
    }

    #[test]
    fn test_non_array_sections_use_defaults() {
        let payload = json!({"improvements": "do better", "safety": {"tip": "x"}});
        let raw = MockAiClient::envelope(&payload.to_string());
        let rec = normalize(&running_activity(), &raw).unwrap();

        assert_eq!(rec.recommendation, "");
        assert_eq!(rec.improvements, vec![DEFAULT_IMPROVEMENT]);
        assert_eq!(rec.safety, vec![DEFAULT_SAFETY]);
    }

    #[test]
    fn test_fenced_payload() {
        let inner = r#"{"analysis":{"overall":"Great run"},"safety":["Hydrate"]}"#;
        let raw = MockAiClient::envelope(&format!("```json\n{}\n```", inner));
        let rec = normalize(&running_activity(), &raw).unwrap();

        assert_eq!(rec.recommendation, "Overall:Great run");
        assert_eq!(rec.safety, vec!["Hydrate"]);
    }

    #[test]
    fn test_strip_code_fence_variants() {
        assert_eq!(strip_code_fence("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fence("  ```\n{\"a\":1}\n```  "), "{\"a\":1}");
        assert_eq!(strip_code_fence("```json{\"a\":1}```"), "{\"a\":1}");
        assert_eq!(strip_code_fence("{\"a\":1}"), "{\"a\":1}");
        assert_eq!(strip_code_fence("\n{\"a\":1}\n"), "{\"a\":1}");
    }

    #[test]
    fn test_item_fields_missing_render_empty() {
        let payload = json!({
            "improvements": [{"area": "Pacing"}],
            "suggestions": [{"description": "Easy spin"}],
            "safety": ["Hydrate", 42]
        });
        let raw = MockAiClient::envelope(&payload.to_string());
        let rec = normalize(&running_activity(), &raw).unwrap();

        assert_eq!(rec.improvements, vec!["Pacing: "]);
        assert_eq!(rec.suggestions, vec![": Easy spin"]);
        assert_eq!(rec.safety, vec!["Hydrate", "42"]);
    }

    #[test]
    fn test_present_null_section_is_rendered() {
        let payload = json!({"analysis": {"overall": "Fine", "pace": null}});
        let raw = MockAiClient::envelope(&payload.to_string());
        let rec = normalize(&running_activity(), &raw).unwrap();
        assert_eq!(rec.recommendation, "Overall:Fine\n\nPace:null");
    }

    #[test]
    fn test_envelope_errors() {
        let activity = running_activity();

        assert!(matches!(
            normalize(&activity, "not json"),
            Err(NormalizeError::InvalidEnvelope(_))
        ));
        assert!(matches!(
            normalize(&activity, r#"{"candidates": []}"#),
            Err(NormalizeError::MissingCandidateText)
        ));
        assert!(matches!(
            normalize(&activity, r#"{"candidates": [{"content": {"parts": [{}]}}]}"#),
            Err(NormalizeError::MissingCandidateText)
        ));
    }

    #[test]
    fn test_invalid_inner_payload() {
        let raw = MockAiClient::envelope("```json\n{\"analysis\": {\n```");
        assert!(matches!(
            normalize(&running_activity(), &raw),
            Err(NormalizeError::InvalidPayload(_))
        ));
    }

    #[test]
    fn test_version_and_timestamp_are_carried() {
        let mut activity = running_activity();
        let version = "2026-04-01T08:00:00Z".parse::<DateTime<Utc>>().unwrap();
        activity.updated_at = Some(version);
        let now = "2026-04-01T08:00:05Z".parse::<DateTime<Utc>>().unwrap();

        let raw = MockAiClient::envelope("{}");
        let rec = normalize_at(&activity, &raw, now).unwrap();

        assert_eq!(rec.created_at, now);
        assert_eq!(rec.source_updated_at, Some(version));
    }
}
