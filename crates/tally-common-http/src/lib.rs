// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Shared HTTP utilities for Tally.
//!
//! This crate provides a pre-configured HTTP client with a consistent
//! User-Agent header. Delivery is best-effort, so there is no retry layer.

mod client;

pub use client::{builder, builder_with_user_agent, new_client_with_timeout, platform, user_agent};
