// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Event payloads for the collector's track endpoint.

use serde::{Deserialize, Serialize};

use crate::properties::Properties;

/// Property injected by a consumed event timer.
pub const DURATION_PROPERTY: &str = "$duration";

/// Reserved property names written after all property layers are merged.
pub mod reserved {
	pub const DISTINCT_ID: &str = "distinct_id";
	pub const TOKEN: &str = "token";
	pub const CLIENT_ID: &str = "client_id";
	pub const PLATFORM: &str = "platform";
	pub const MODEL: &str = "model";
}

/// Identity fields stamped onto every event after the property layers.
#[derive(Debug, Clone, Default)]
pub struct EventIdentity<'a> {
	pub distinct_id: Option<&'a str>,
	pub token: &'a str,
	pub client_id: Option<&'a str>,
	pub platform: Option<&'a str>,
	pub model: Option<&'a str>,
}

/// Body of a track request: `{"event": ..., "properties": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventPayload {
	pub event: String,
	#[serde(default)]
	pub properties: Properties,
}

impl EventPayload {
	/// Assembles a payload from its property layers.
	///
	/// Layers resolve in order `constants`, `event_props`, `super_props`, later wins.
	/// Identity fields are written last and override any layer.
	pub fn assemble(
		name: impl Into<String>,
		constants: &Properties,
		event_props: &Properties,
		super_props: &Properties,
		identity: &EventIdentity<'_>,
	) -> Self {
		let mut properties = constants.clone();
		properties.overlay(event_props);
		properties.overlay(super_props);

		properties.set_opt(reserved::DISTINCT_ID, identity.distinct_id);
		properties.set(reserved::TOKEN, identity.token);
		properties.set_opt(reserved::CLIENT_ID, identity.client_id);
		properties.set_opt(reserved::PLATFORM, identity.platform);
		properties.set_opt(reserved::MODEL, identity.model);

		Self {
			event: name.into(),
			properties,
		}
	}
}

/// Converts a timer span in milliseconds into seconds rounded to three decimals.
pub fn elapsed_seconds(start_ms: i64, now_ms: i64) -> f64 {
	let secs = (now_ms - start_ms) as f64 / 1000.0;
	(secs * 1000.0).round() / 1000.0
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;
	use serde_json::{json, Value};

	fn identity<'a>() -> EventIdentity<'a> {
		EventIdentity {
			distinct_id: Some("u1"),
			token: "tok_123",
			client_id: Some("device-abc"),
			platform: Some("iPhone14,2"),
			model: Some("iPhone 13 Pro"),
		}
	}

	#[test]
	fn test_super_props_beat_event_props() {
		let constants = Properties::new().insert("os_version", "17.1");
		let event = Properties::new().insert("b", 2).insert("a", 0);
		let supers = Properties::new().insert("a", 1);

		let payload = EventPayload::assemble("Signed Up", &constants, &event, &supers, &identity());

		assert_eq!(payload.properties.get("a"), Some(&json!(1)));
		assert_eq!(payload.properties.get("b"), Some(&json!(2)));
		assert_eq!(payload.properties.get("os_version"), Some(&json!("17.1")));
	}

	#[test]
	fn test_event_props_beat_constants() {
		let constants = Properties::new().insert("app_version_string", "1.0.0");
		let event = Properties::new().insert("app_version_string", "custom");

		let payload = EventPayload::assemble(
			"Opened",
			&constants,
			&event,
			&Properties::new(),
			&identity(),
		);

		assert_eq!(
			payload.properties.get("app_version_string"),
			Some(&json!("custom"))
		);
	}

	#[test]
	fn test_identity_fields_override_layers() {
		let supers = Properties::new().insert("token", "spoofed");

		let payload = EventPayload::assemble(
			"Opened",
			&Properties::new(),
			&Properties::new(),
			&supers,
			&identity(),
		);

		assert_eq!(payload.properties.get("token"), Some(&json!("tok_123")));
		assert_eq!(payload.properties.get("distinct_id"), Some(&json!("u1")));
		assert_eq!(payload.properties.get("client_id"), Some(&json!("device-abc")));
		assert_eq!(payload.properties.get("platform"), Some(&json!("iPhone14,2")));
		assert_eq!(payload.properties.get("model"), Some(&json!("iPhone 13 Pro")));
	}

	#[test]
	fn test_anonymous_event_omits_distinct_id() {
		let identity = EventIdentity {
			token: "tok_123",
			..Default::default()
		};

		let payload = EventPayload::assemble(
			"Opened",
			&Properties::new(),
			&Properties::new(),
			&Properties::new(),
			&identity,
		);

		assert!(!payload.properties.contains_key("distinct_id"));
		assert!(!payload.properties.contains_key("client_id"));
		assert!(!payload.properties.contains_key("platform"));
		assert!(!payload.properties.contains_key("model"));
		assert_eq!(payload.properties.len(), 1);
	}

	#[test]
	fn test_payload_json_shape() {
		let payload = EventPayload::assemble(
			"Opened",
			&Properties::new(),
			&Properties::new().insert("screen", "home"),
			&Properties::new(),
			&EventIdentity {
				token: "tok",
				..Default::default()
			},
		);

		let value: Value = serde_json::to_value(&payload).unwrap();
		assert_eq!(
			value,
			json!({"event": "Opened", "properties": {"screen": "home", "token": "tok"}})
		);
	}

	#[test]
	fn test_elapsed_seconds_rounds_to_millis() {
		assert_eq!(elapsed_seconds(1_000, 2_500), 1.5);
		assert_eq!(elapsed_seconds(0, 1), 0.001);
		assert_eq!(elapsed_seconds(10, 10), 0.0);
		assert_eq!(elapsed_seconds(0, 123_456), 123.456);
	}

	proptest! {
		#[test]
		fn elapsed_seconds_has_at_most_three_decimals(
			start in 0i64..1_000_000_000,
			span in 0i64..10_000_000,
		) {
			let secs = elapsed_seconds(start, start + span);
			let scaled = secs * 1000.0;
			prop_assert!((scaled - scaled.round()).abs() < 1e-6);
			prop_assert!((secs - span as f64 / 1000.0).abs() < 0.0005);
		}

		#[test]
		fn super_props_always_win_collisions(
			key in "[a-z]{1,8}",
			event_val in 0i64..1000,
			super_val in 1000i64..2000,
		) {
			let event = Properties::new().insert(key.clone(), event_val);
			let supers = Properties::new().insert(key.clone(), super_val);
			let identity = EventIdentity { token: "t", ..Default::default() };

			let payload = EventPayload::assemble("e", &Properties::new(), &event, &supers, &identity);

			if key != "token" {
				prop_assert_eq!(payload.properties.get(&key), Some(&json!(super_val)));
			}
		}
	}
}
