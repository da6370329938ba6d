//! Application configuration loaded from environment variables.
//!
//! Secrets (the Gemini API key and the push verification token) are injected
//! as environment variables by the deployment, never read from files.

use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Default Gemini API base URL.
pub const DEFAULT_GEMINI_API_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
/// Default Gemini model.
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";

/// Names of the two inbound activity event streams.
///
/// Passed to the event routes at construction; the push endpoint dispatches
/// on these rather than on hard-coded names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventStreams {
    /// Subscription delivering "activity created/updated" events
    pub activity_upserted: String,
    /// Subscription delivering "activity deleted" events
    pub activity_deleted: String,
}

/// Which recommendation store backs the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Firestore,
    /// In-process store (local development; data is lost on restart)
    Memory,
}

impl FromStr for StoreBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "firestore" => Ok(StoreBackend::Firestore),
            "memory" => Ok(StoreBackend::Memory),
            _ => Err(ConfigError::Invalid {
                name: "STORE_BACKEND",
                value: s.to_string(),
            }),
        }
    }
}

/// Retry and timeout policy around the AI call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AiPolicy {
    /// Upper bound for a single attempt
    pub timeout: Duration,
    /// Total attempts before falling back (at least 1)
    pub max_attempts: u32,
    /// Delay before the first retry; doubled for each further retry
    pub retry_backoff: Duration,
}

impl Default for AiPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_attempts: 3,
            retry_backoff: Duration::from_millis(500),
        }
    }
}

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // --- Environment Variables (non-sensitive) ---
    /// Frontend URL allowed by CORS
    pub frontend_url: String,
    /// GCP project ID (Firestore)
    pub gcp_project_id: String,
    /// Server port
    pub port: u16,
    /// Recommendation store backend
    pub store_backend: StoreBackend,
    /// Gemini API base URL
    pub gemini_api_url: String,
    /// Gemini model name
    pub gemini_model: String,
    /// Timeout/retry policy for AI calls
    pub ai_policy: AiPolicy,
    /// Inbound event stream names
    pub event_streams: EventStreams,

    // --- Secrets ---
    /// Gemini API key
    pub gemini_api_key: String,
    /// Token the push transport presents on every delivery
    pub push_verify_token: String,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let defaults = AiPolicy::default();
        let max_attempts: u32 = parse_var("AI_MAX_ATTEMPTS", defaults.max_attempts)?;

        Ok(Self {
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            gcp_project_id: env::var("GCP_PROJECT_ID").unwrap_or_else(|_| "local-dev".to_string()),
            port: parse_var("PORT", 8080)?,
            store_backend: env::var("STORE_BACKEND")
                .map(|v| v.parse())
                .unwrap_or(Ok(StoreBackend::Firestore))?,
            gemini_api_url: env::var("GEMINI_API_URL")
                .map(|v| v.trim_end_matches('/').to_string())
                .unwrap_or_else(|_| DEFAULT_GEMINI_API_URL.to_string()),
            gemini_model: env::var("GEMINI_MODEL")
                .unwrap_or_else(|_| DEFAULT_GEMINI_MODEL.to_string()),
            ai_policy: AiPolicy {
                timeout: Duration::from_secs(parse_var(
                    "AI_TIMEOUT_SECS",
                    defaults.timeout.as_secs(),
                )?),
                max_attempts: max_attempts.max(1),
                retry_backoff: Duration::from_millis(parse_var(
                    "AI_RETRY_BACKOFF_MS",
                    defaults.retry_backoff.as_millis() as u64,
                )?),
            },
            event_streams: EventStreams {
                activity_upserted: env::var("ACTIVITY_UPSERTED_SUBSCRIPTION")
                    .unwrap_or_else(|_| "activity-upserted".to_string()),
                activity_deleted: env::var("ACTIVITY_DELETED_SUBSCRIPTION")
                    .unwrap_or_else(|_| "activity-deleted".to_string()),
            },

            gemini_api_key: env::var("GEMINI_API_KEY")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("GEMINI_API_KEY"))?,
            push_verify_token: env::var("PUSH_VERIFY_TOKEN")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("PUSH_VERIFY_TOKEN"))?,
        })
    }

    /// Deterministic configuration for tests.
    pub fn test_default() -> Self {
        Self {
            frontend_url: "http://localhost:5173".to_string(),
            gcp_project_id: "test-project".to_string(),
            port: 8080,
            store_backend: StoreBackend::Memory,
            gemini_api_url: DEFAULT_GEMINI_API_URL.to_string(),
            gemini_model: DEFAULT_GEMINI_MODEL.to_string(),
            ai_policy: AiPolicy {
                timeout: Duration::from_secs(5),
                max_attempts: 1,
                retry_backoff: Duration::from_millis(1),
            },
            event_streams: EventStreams {
                activity_upserted: "activity-upserted".to_string(),
                activity_deleted: "activity-deleted".to_string(),
            },
            gemini_api_key: "test_gemini_key".to_string(),
            push_verify_token: "test_push_token".to_string(),
        }
    }
}

/// Parse an optional numeric variable, falling back to `default` when unset.
fn parse_var<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(value) => value.trim().parse().map_err(|_| ConfigError::Invalid {
            name,
            value,
        }),
        Err(_) => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {name}: {value:?}")]
    Invalid { name: &'static str, value: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    // Env vars are process-global, so everything touching them lives in one test.
    #[test]
    fn test_config_from_env() {
        env::set_var("GEMINI_API_KEY", " test_key ");
        env::set_var("PUSH_VERIFY_TOKEN", "push_token");
        env::set_var("STORE_BACKEND", "memory");
        env::set_var("AI_MAX_ATTEMPTS", "0");
        env::set_var("ACTIVITY_DELETED_SUBSCRIPTION", "activity-delete-sub");

        let config = Config::from_env().expect("Config should load");

        assert_eq!(config.gemini_api_key, "test_key");
        assert_eq!(config.push_verify_token, "push_token");
        assert_eq!(config.store_backend, StoreBackend::Memory);
        assert_eq!(config.ai_policy.max_attempts, 1);
        assert_eq!(config.event_streams.activity_deleted, "activity-delete-sub");
        assert_eq!(config.event_streams.activity_upserted, "activity-upserted");
        assert_eq!(config.port, 8080);

        env::set_var("AI_TIMEOUT_SECS", "soon");
        let err = Config::from_env().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                name: "AI_TIMEOUT_SECS",
                ..
            }
        ));
        env::remove_var("AI_TIMEOUT_SECS");
    }

    #[test]
    fn test_store_backend_parse() {
        assert_eq!(
            "Firestore".parse::<StoreBackend>().unwrap(),
            StoreBackend::Firestore
        );
        assert!("postgres".parse::<StoreBackend>().is_err());
    }
}
