// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod activity;
pub mod recommendation;

pub use activity::{Activity, ActivityType};
pub use recommendation::{Recommendation, USER_SUMMARY_TYPE};
