// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Typed property bags for events, super properties and profile updates.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A string-keyed bag of JSON values.
///
/// Serializes as a plain JSON object. Layers are combined with [`Properties::merge`]
/// or [`Properties::overlay`]; in both cases keys from the later layer win.
///
/// # Example
///
/// ```
/// use tally_analytics_core::Properties;
///
/// let props = Properties::new()
///     .insert("plan", "pro")
///     .insert("seats", 12)
///     .insert("trial", false);
///
/// assert_eq!(props.len(), 3);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Properties {
	inner: Map<String, Value>,
}

impl Properties {
	pub fn new() -> Self {
		Self { inner: Map::new() }
	}

	/// Inserts a key-value pair, builder style.
	pub fn insert<K, V>(mut self, key: K, value: V) -> Self
	where
		K: Into<String>,
		V: Into<Value>,
	{
		self.inner.insert(key.into(), value.into());
		self
	}

	/// Inserts a key-value pair in place.
	pub fn set<K, V>(&mut self, key: K, value: V)
	where
		K: Into<String>,
		V: Into<Value>,
	{
		self.inner.insert(key.into(), value.into());
	}

	/// Inserts the value only when it is present.
	pub fn set_opt<K, V>(&mut self, key: K, value: Option<V>)
	where
		K: Into<String>,
		V: Into<Value>,
	{
		if let Some(value) = value {
			self.inner.insert(key.into(), value.into());
		}
	}

	/// Merges another bag into this one. Keys from `other` take precedence.
	pub fn merge(mut self, other: Properties) -> Self {
		self.inner.extend(other.inner);
		self
	}

	/// Copies every entry of `other` over this bag. Keys from `other` take precedence.
	pub fn overlay(&mut self, other: &Properties) {
		for (k, v) in &other.inner {
			self.inner.insert(k.clone(), v.clone());
		}
	}

	pub fn remove(&mut self, key: &str) -> Option<Value> {
		self.inner.remove(key)
	}

	pub fn contains_key(&self, key: &str) -> bool {
		self.inner.contains_key(key)
	}

	pub fn is_empty(&self) -> bool {
		self.inner.is_empty()
	}

	pub fn len(&self) -> usize {
		self.inner.len()
	}

	pub fn get(&self, key: &str) -> Option<&Value> {
		self.inner.get(key)
	}

	pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
		self.inner.iter()
	}

	/// Converts the bag into a `serde_json::Value::Object`.
	pub fn into_value(self) -> Value {
		Value::Object(self.inner)
	}

	pub fn into_map(self) -> Map<String, Value> {
		self.inner
	}
}

impl From<Properties> for Value {
	fn from(props: Properties) -> Self {
		props.into_value()
	}
}

/// Non-object values (including `null`) collapse to an empty bag.
impl From<Value> for Properties {
	fn from(value: Value) -> Self {
		match value {
			Value::Object(map) => Self { inner: map },
			_ => Self::new(),
		}
	}
}

impl From<Map<String, Value>> for Properties {
	fn from(map: Map<String, Value>) -> Self {
		Self { inner: map }
	}
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Properties {
	fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
		Self {
			inner: iter
				.into_iter()
				.map(|(k, v)| (k.into(), v.into()))
				.collect(),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;

	#[test]
	fn test_properties_new_is_empty() {
		let props = Properties::new();
		assert!(props.is_empty());
		assert_eq!(props.len(), 0);
	}

	#[test]
	fn test_insert_mixed_scalars() {
		let props = Properties::new()
			.insert("plan", "pro")
			.insert("seats", 12)
			.insert("trial", false);

		assert_eq!(props.get("plan"), Some(&Value::String("pro".to_string())));
		assert_eq!(props.get("seats"), Some(&Value::Number(12.into())));
		assert_eq!(props.get("trial"), Some(&Value::Bool(false)));
	}

	#[test]
	fn test_set_opt_skips_none() {
		let mut props = Properties::new();
		props.set_opt("device_name", Some("Pixel 8"));
		props.set_opt::<_, String>("expo_app_ownership", None);

		assert!(props.contains_key("device_name"));
		assert!(!props.contains_key("expo_app_ownership"));
	}

	#[test]
	fn test_merge_later_layer_wins() {
		let event = Properties::new().insert("screen", "home").insert("a", 1);
		let supers = Properties::new().insert("a", 2).insert("cohort", "beta");

		let merged = event.merge(supers);

		assert_eq!(merged.len(), 3);
		assert_eq!(merged.get("a"), Some(&Value::Number(2.into())));
		assert_eq!(merged.get("screen"), Some(&Value::String("home".to_string())));
	}

	#[test]
	fn test_overlay_by_reference() {
		let mut base = Properties::new().insert("os_version", "17.1");
		let supers = Properties::new().insert("os_version", "override");

		base.overlay(&supers);

		assert_eq!(base.get("os_version"), Some(&Value::String("override".to_string())));
		assert_eq!(supers.len(), 1);
	}

	#[test]
	fn test_serializes_as_plain_object() {
		let props = Properties::new().insert("plan", "pro");
		let json = serde_json::to_string(&props).unwrap();
		assert_eq!(json, r#"{"plan":"pro"}"#);
	}

	#[test]
	fn test_from_null_is_empty() {
		assert!(Properties::from(Value::Null).is_empty());
		assert!(Properties::from(serde_json::json!(5)).is_empty());
	}

	#[test]
	fn test_collect_from_pairs() {
		let props: Properties = vec![("a", 1), ("b", 2)].into_iter().collect();
		assert_eq!(props.len(), 2);
	}

	proptest! {
		#[test]
		fn merge_keeps_union_of_keys(
			left in proptest::collection::btree_map("[a-z]{1,6}", 0i64..100, 0..10),
			right in proptest::collection::btree_map("[a-z]{1,6}", 0i64..100, 0..10),
		) {
			let l: Properties = left.clone().into_iter().collect();
			let r: Properties = right.clone().into_iter().collect();
			let merged = l.merge(r);

			let mut keys: std::collections::BTreeSet<_> = left.keys().cloned().collect();
			keys.extend(right.keys().cloned());
			prop_assert_eq!(merged.len(), keys.len());

			for (k, v) in &right {
				prop_assert_eq!(merged.get(k), Some(&Value::from(*v)));
			}
		}
	}
}
