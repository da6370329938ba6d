// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Middleware modules (push authentication, security headers).

pub mod push_auth;
pub mod security;

pub use push_auth::require_push_token;
