// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod ai;
pub mod consumer;
pub mod normalizer;
pub mod prompts;
pub mod recommendation;
pub mod synthesizer;

pub use ai::{AiClient, GeminiClient, MockAiClient, ResilientAiClient};
pub use consumer::{DeleteOutcome, EventConsumer, UpsertOutcome};
pub use recommendation::RecommendationService;
pub use synthesizer::{RecommendationSynthesizer, Synthesis};
