// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! AI capability clients.
//!
//! The pipeline only needs "send a prompt, get the raw response envelope
//! back". `AiClient` is that seam:
//! - `GeminiClient` calls the Gemini `generateContent` API
//! - `ResilientAiClient` adds a per-attempt timeout and bounded retries
//! - `MockAiClient` replays scripted responses (tests, offline runs)

use crate::config::AiPolicy;
use crate::error::AiError;
use async_trait::async_trait;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// A remote text-generation capability.
#[async_trait]
pub trait AiClient: Send + Sync {
    /// Send a prompt and return the raw response envelope text.
    async fn generate(&self, prompt: &str) -> Result<String, AiError>;
}

// ─────────────────────────────────────────────────────────────────────────────
// GeminiClient
// ─────────────────────────────────────────────────────────────────────────────

/// Request body for `generateContent`.
#[derive(Debug, Serialize)]
struct GenerateContentRequest<'a> {
    contents: [Content<'a>; 1],
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: [Part<'a>; 1],
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

/// Gemini API client.
#[derive(Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl GeminiClient {
    pub fn new(base_url: String, model: String, api_key: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url,
            model,
            api_key,
        }
    }

    fn generate_url(&self) -> String {
        format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        )
    }

    /// Check response status and map failures to `AiError`.
    async fn check_response(response: reqwest::Response) -> Result<String, AiError> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AiError::Transport(format!("Failed to read response: {}", e)))?;

        if status.is_success() {
            return Ok(body);
        }

        if status.as_u16() == 429 {
            tracing::warn!("Gemini rate limit hit (429)");
            return Err(AiError::RateLimited);
        }

        Err(AiError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl AiClient for GeminiClient {
    async fn generate(&self, prompt: &str) -> Result<String, AiError> {
        let request = GenerateContentRequest {
            contents: [Content {
                parts: [Part { text: prompt }],
            }],
        };

        let response = self
            .http
            .post(self.generate_url())
            .json(&request)
            .send()
            .await
            .map_err(|e| AiError::Transport(e.without_url().to_string()))?;

        Self::check_response(response).await
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ResilientAiClient
// ─────────────────────────────────────────────────────────────────────────────

/// Wraps an `AiClient` with a per-attempt timeout and bounded retries.
///
/// Retryable failures (transport, timeout, 429, 5xx) are retried with
/// exponential backoff until `max_attempts` is used up; anything else is
/// returned immediately.
pub struct ResilientAiClient {
    inner: Arc<dyn AiClient>,
    policy: AiPolicy,
}

impl ResilientAiClient {
    pub fn new(inner: Arc<dyn AiClient>, policy: AiPolicy) -> Self {
        Self { inner, policy }
    }

    fn backoff_for(&self, retry: u32) -> Duration {
        self.policy
            .retry_backoff
            .saturating_mul(2u32.saturating_pow(retry.saturating_sub(1)))
    }
}

#[async_trait]
impl AiClient for ResilientAiClient {
    async fn generate(&self, prompt: &str) -> Result<String, AiError> {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            let result = match tokio::time::timeout(
                self.policy.timeout,
                self.inner.generate(prompt),
            )
            .await
            {
                Ok(result) => result,
                Err(_) => Err(AiError::Timeout(self.policy.timeout)),
            };

            match result {
                Ok(text) => return Ok(text),
                Err(e) if e.is_retryable() && attempt < max_attempts => {
                    let delay = self.backoff_for(attempt);
                    tracing::warn!(
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "AI call failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    tracing::error!(attempt, error = %e, "AI call failed");
                    return Err(e);
                }
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// MockAiClient
// ─────────────────────────────────────────────────────────────────────────────

/// Scripted AI client.
///
/// Replies are consumed in order; once the script is exhausted the fallback
/// reply (if any) is repeated, otherwise a transport error is returned.
#[derive(Default)]
pub struct MockAiClient {
    script: Mutex<VecDeque<Result<String, AiError>>>,
    fallback: Option<String>,
    delay: Option<Duration>,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl MockAiClient {
    /// A client that always answers with `response`.
    pub fn always(response: impl Into<String>) -> Self {
        Self {
            fallback: Some(response.into()),
            ..Self::default()
        }
    }

    /// A client that answers from `script`, then fails.
    pub fn scripted(script: impl IntoIterator<Item = Result<String, AiError>>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            ..Self::default()
        }
    }

    /// Sleep before every reply.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of `generate` calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Prompts received so far.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts
            .lock()
            .map(|p| p.clone())
            .unwrap_or_default()
    }

    /// Wrap a model payload in a Gemini-style response envelope.
    pub fn envelope(text: &str) -> String {
        serde_json::json!({
            "candidates": [{
                "content": {
                    "parts": [{"text": text}],
                    "role": "model"
                },
                "finishReason": "STOP"
            }]
        })
        .to_string()
    }
}

#[async_trait]
impl AiClient for MockAiClient {
    async fn generate(&self, prompt: &str) -> Result<String, AiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let next = self.script.lock().ok().and_then(|mut s| s.pop_front());
        match (next, &self.fallback) {
            (Some(reply), _) => reply,
            (None, Some(text)) => Ok(text.clone()),
            (None, None) => Err(AiError::Transport("mock script exhausted".to_string())),
        }
    }
}
