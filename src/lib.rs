// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Fitness-Coach: AI coaching recommendations for tracked activities
//!
//! This crate consumes activity lifecycle events, asks a generative model
//! for coaching feedback, and keeps one recommendation per activity plus
//! on-demand per-user summaries.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;

use config::Config;
use db::RecommendationStore;
use services::{AiClient, EventConsumer, RecommendationService, RecommendationSynthesizer};
use std::sync::Arc;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn RecommendationStore>,
    pub consumer: EventConsumer,
    pub recommendations: RecommendationService,
}

impl AppState {
    /// Wire the pipeline around a store and an AI client.
    pub fn new(config: Config, store: Arc<dyn RecommendationStore>, ai: Arc<dyn AiClient>) -> Self {
        let synthesizer = RecommendationSynthesizer::new(ai);

        Self {
            consumer: EventConsumer::new(store.clone(), synthesizer.clone()),
            recommendations: RecommendationService::new(store.clone(), synthesizer),
            config,
            store,
        }
    }
}
