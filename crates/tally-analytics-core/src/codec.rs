// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Encoding of the `data=` query parameter.
//!
//! Payloads are serialized to JSON and then base64-encoded with the standard
//! alphabet and padding. URL-escaping the result is the transport's job.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::Result;

/// Serializes `payload` to JSON and base64-encodes it.
pub fn encode_data<T: Serialize>(payload: &T) -> Result<String> {
	let json = serde_json::to_vec(payload)?;
	Ok(STANDARD.encode(json))
}

/// Reverses [`encode_data`].
pub fn decode_data<T: DeserializeOwned>(data: &str) -> Result<T> {
	let bytes = STANDARD.decode(data)?;
	Ok(serde_json::from_slice(&bytes)?)
}
