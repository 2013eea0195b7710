// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Profile ("engage") updates.
//!
//! A profile update is a single operation applied to the person record of the
//! identified user. On the wire the operation code becomes the key of the
//! value: `{"$token": ..., "$distinct_id": ..., "$set": {...}}`.

use std::fmt;
use std::str::FromStr;

use serde::de::{self, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::error::CoreError;

/// Profile operation codes understood by the engage endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProfileOperation {
	/// Overwrite properties.
	Set,
	/// Write properties only if they are not already present.
	SetOnce,
	/// Remove the named properties.
	Unset,
	/// Add numeric deltas.
	Add,
	/// Append values to list properties.
	Append,
	/// Union values into list properties.
	Union,
	/// Delete the whole profile.
	Delete,
}

impl ProfileOperation {
	pub const ALL: [ProfileOperation; 7] = [
		ProfileOperation::Set,
		ProfileOperation::SetOnce,
		ProfileOperation::Unset,
		ProfileOperation::Add,
		ProfileOperation::Append,
		ProfileOperation::Union,
		ProfileOperation::Delete,
	];

	/// The bare operation code, e.g. `set_once`.
	pub fn code(&self) -> &'static str {
		match self {
			ProfileOperation::Set => "set",
			ProfileOperation::SetOnce => "set_once",
			ProfileOperation::Unset => "unset",
			ProfileOperation::Add => "add",
			ProfileOperation::Append => "append",
			ProfileOperation::Union => "union",
			ProfileOperation::Delete => "delete",
		}
	}

	/// The payload key, e.g. `$set_once`.
	pub fn key(&self) -> String {
		format!("${}", self.code())
	}
}

impl fmt::Display for ProfileOperation {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.code())
	}
}

impl FromStr for ProfileOperation {
	type Err = CoreError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let code = s.strip_prefix('$').unwrap_or(s);
		ProfileOperation::ALL
			.into_iter()
			.find(|op| op.code() == code)
			.ok_or_else(|| CoreError::InvalidPayload(format!("unknown profile operation: {s}")))
	}
}

/// Body of an engage request.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfilePayload {
	pub token: String,
	pub distinct_id: String,
	pub operation: ProfileOperation,
	pub value: Value,
}

impl ProfilePayload {
	pub fn new(
		token: impl Into<String>,
		distinct_id: impl Into<String>,
		operation: ProfileOperation,
		value: impl Into<Value>,
	) -> Self {
		Self {
			token: token.into(),
			distinct_id: distinct_id.into(),
			operation,
			value: value.into(),
		}
	}
}

impl Serialize for ProfilePayload {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		let mut map = serializer.serialize_map(Some(3))?;
		map.serialize_entry("$token", &self.token)?;
		map.serialize_entry("$distinct_id", &self.distinct_id)?;
		map.serialize_entry(&self.operation.key(), &self.value)?;
		map.end()
	}
}

impl<'de> Deserialize<'de> for ProfilePayload {
	fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		struct PayloadVisitor;

		impl<'de> Visitor<'de> for PayloadVisitor {
			type Value = ProfilePayload;

			fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
				f.write_str("an engage payload with $token, $distinct_id and one operation")
			}

			fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
				let mut token = None;
				let mut distinct_id = None;
				let mut operation = None;

				while let Some(key) = access.next_key::<String>()? {
					match key.as_str() {
						"$token" => token = Some(access.next_value::<String>()?),
						"$distinct_id" => distinct_id = Some(access.next_value::<String>()?),
						other => {
							let op = other.parse::<ProfileOperation>().map_err(de::Error::custom)?;
							if operation.is_some() {
								return Err(de::Error::custom("more than one profile operation"));
							}
							operation = Some((op, access.next_value::<Value>()?));
						}
					}
				}

				let token = token.ok_or_else(|| de::Error::missing_field("$token"))?;
				let distinct_id = distinct_id.ok_or_else(|| de::Error::missing_field("$distinct_id"))?;
				let (operation, value) =
					operation.ok_or_else(|| de::Error::custom("missing profile operation"))?;

				Ok(ProfilePayload {
					token,
					distinct_id,
					operation,
					value,
				})
			}
		}

		deserializer.deserialize_map(PayloadVisitor)
	}
}
