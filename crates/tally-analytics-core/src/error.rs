// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for payload construction and encoding.

use thiserror::Error;

/// Errors raised while encoding or decoding collector payloads.
#[derive(Debug, Error)]
pub enum CoreError {
	/// JSON serialization or parsing failed.
	#[error("serialization error: {0}")]
	Serialization(#[from] serde_json::Error),

	/// The `data` parameter was not valid base64.
	#[error("base64 decode error: {0}")]
	Base64(#[from] base64::DecodeError),

	/// A decoded payload did not have the expected shape.
	#[error("invalid payload: {0}")]
	InvalidPayload(String),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_serialization_error_message() {
		let err: CoreError = serde_json::from_str::<serde_json::Value>("{")
			.unwrap_err()
			.into();
		assert!(err.to_string().starts_with("serialization error"));
	}

	#[test]
	fn test_invalid_payload_message() {
		let err = CoreError::InvalidPayload("missing event".to_string());
		assert_eq!(err.to_string(), "invalid payload: missing event");
	}
}
