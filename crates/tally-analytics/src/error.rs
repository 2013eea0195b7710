// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for the analytics SDK.
//!
//! Only [`AnalyticsClientBuilder::build`](crate::AnalyticsClientBuilder::build)
//! returns these to callers. Everywhere else they are logged and dropped.

use thiserror::Error;

/// Analytics SDK errors.
#[derive(Debug, Error)]
pub enum AnalyticsError {
	/// Project token is missing or empty.
	#[error("invalid project token: must be a non-empty string")]
	InvalidToken,

	/// Base URL is missing or cannot be parsed.
	#[error("invalid base URL: {0}")]
	InvalidBaseUrl(String),

	/// No tokio runtime was supplied or running.
	#[error("no tokio runtime available to drive the client")]
	NoRuntime,

	/// HTTP request failed.
	#[error("HTTP request failed: {0}")]
	RequestFailed(#[from] reqwest::Error),

	/// Collector returned a non-success status.
	#[error("server error ({status}): {message}")]
	ServerError { status: u16, message: String },
}

/// Errors from a [`KeyValueStore`](crate::KeyValueStore) backend.
#[derive(Debug, Error)]
pub enum StoreError {
	#[error("IO error: {0}")]
	Io(String),

	#[error("serialization error: {0}")]
	Serialization(String),
}

impl From<std::io::Error> for StoreError {
	fn from(err: std::io::Error) -> Self {
		StoreError::Io(err.to_string())
	}
}

impl From<serde_json::Error> for StoreError {
	fn from(err: serde_json::Error) -> Self {
		StoreError::Serialization(err.to_string())
	}
}

/// Result type alias for analytics operations.
pub type Result<T> = std::result::Result<T, AnalyticsError>;
