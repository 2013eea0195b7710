// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Device and platform context.
//!
//! The host supplies device facts through [`DeviceInfoProvider`]. Synchronous facts
//! are read once when the client is built; the user agent and screen size are
//! fetched asynchronously as part of the ready transition.
//!
//! | Property | Source |
//! |----------|--------|
//! | `app_build_number` | [`DeviceInfo::app_build_number`] |
//! | `app_id` | [`DeviceInfo::app_id`] |
//! | `app_name` | [`DeviceInfo::app_name`] |
//! | `app_version_string` | [`DeviceInfo::app_version_string`] |
//! | `device_name` | [`DeviceInfo::device_name`] |
//! | `expo_app_ownership` | [`DeviceInfo::app_ownership`] |
//! | `os_version` | [`DeviceInfo::os_version`] |
//! | `screen_width`, `screen_height`, `screen_size` | [`DeviceInfoProvider::screen_size`] |
//! | `user_agent` | [`DeviceInfoProvider::user_agent`] |

use async_trait::async_trait;
use serde_json::Value;
use tally_analytics_core::Properties;

/// Operating system family of the host device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OsKind {
	Ios,
	Android,
	Other(String),
}

impl OsKind {
	/// Maps an OS name such as `std::env::consts::OS` onto a family.
	pub fn from_name(name: &str) -> Self {
		match name.to_ascii_lowercase().as_str() {
			"ios" => OsKind::Ios,
			"android" => OsKind::Android,
			other => OsKind::Other(other.to_string()),
		}
	}
}

/// Hardware identifiers reported on iOS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IosPlatform {
	/// Machine identifier, e.g. `iPhone14,2`.
	pub platform: String,
	/// Marketing model name, e.g. `iPhone 13 Pro`.
	pub model: String,
}

/// Window dimensions in logical pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScreenSize {
	pub width: f64,
	pub height: f64,
}

/// Synchronously available device facts.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceInfo {
	pub device_id: Option<String>,
	pub installation_id: Option<String>,
	pub app_build_number: Option<String>,
	pub app_id: Option<String>,
	pub app_name: Option<String>,
	pub app_version_string: Option<String>,
	pub app_ownership: Option<String>,
	pub device_name: Option<String>,
	pub os_version: Option<String>,
	pub os: OsKind,
	pub ios: Option<IosPlatform>,
}

impl Default for DeviceInfo {
	fn default() -> Self {
		Self {
			device_id: None,
			installation_id: None,
			app_build_number: None,
			app_id: None,
			app_name: None,
			app_version_string: None,
			app_ownership: None,
			device_name: None,
			os_version: None,
			os: OsKind::Other(String::new()),
			ios: None,
		}
	}
}

impl DeviceInfo {
	/// Stable per-install identifier: the device id, else the installation id.
	pub fn client_id(&self) -> Option<String> {
		non_empty(&self.device_id)
			.or_else(|| non_empty(&self.installation_id))
			.map(str::to_string)
	}

	/// Context constants known before the async discovery step.
	pub fn initial_constants(&self) -> Properties {
		let mut constants = Properties::new();
		constants.set_opt("app_build_number", self.app_build_number.clone());
		constants.set_opt("app_id", self.app_id.clone());
		constants.set_opt("app_name", self.app_name.clone());
		constants.set_opt("app_version_string", self.app_version_string.clone());
		constants.set_opt("device_name", self.device_name.clone());
		constants.set_opt("expo_app_ownership", non_empty(&self.app_ownership));
		constants.set_opt("os_version", self.os_version.clone());
		constants
	}

	/// Resolves the `(platform, model)` pair stamped on events.
	///
	/// iOS devices report their hardware identifiers when available, Android
	/// reports `android` with no model, and any other OS reports neither.
	pub fn platform_and_model(&self) -> (Option<String>, Option<String>) {
		match (&self.os, &self.ios) {
			(OsKind::Ios, Some(ios)) => (Some(ios.platform.clone()), Some(ios.model.clone())),
			(OsKind::Android, _) => (Some("android".to_string()), None),
			_ => (None, None),
		}
	}
}

fn non_empty(value: &Option<String>) -> Option<&str> {
	value.as_deref().filter(|s| !s.is_empty())
}

/// Adds the asynchronously discovered facts to the context constants.
pub fn apply_discovered(
	constants: &mut Properties,
	user_agent: Option<String>,
	screen: Option<ScreenSize>,
) {
	if let Some(screen) = screen {
		constants.set("screen_height", pixels(screen.height));
		constants.set("screen_size", format!("{}x{}", screen.width, screen.height));
		constants.set("screen_width", pixels(screen.width));
	}
	constants.set_opt("user_agent", user_agent);
}

/// Whole pixel counts serialize as integers, fractional ones as floats.
fn pixels(value: f64) -> Value {
	if value.is_finite() && value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
		Value::from(value as i64)
	} else {
		Value::from(value)
	}
}

/// Source of device and platform metadata.
#[async_trait]
pub trait DeviceInfoProvider: Send + Sync + 'static {
	/// Facts available without suspending.
	fn device_info(&self) -> DeviceInfo;

	/// User agent of the host's web view or HTTP stack.
	async fn user_agent(&self) -> Option<String>;

	/// Current window size.
	async fn screen_size(&self) -> Option<ScreenSize>;
}

/// A provider backed by fixed values.
///
/// # Example
///
/// ```
/// use tally_analytics::{DeviceInfo, OsKind, StaticDeviceInfo};
///
/// let device = StaticDeviceInfo::new(DeviceInfo {
///     installation_id: Some("install-123".into()),
///     app_name: Some("Acme".into()),
///     os: OsKind::Android,
///     ..Default::default()
/// })
/// .with_screen_size(1080.0, 2400.0);
/// ```
#[derive(Debug, Clone)]
pub struct StaticDeviceInfo {
	info: DeviceInfo,
	user_agent: Option<String>,
	screen: Option<ScreenSize>,
}

impl StaticDeviceInfo {
	pub fn new(info: DeviceInfo) -> Self {
		Self {
			info,
			user_agent: None,
			screen: None,
		}
	}

	/// Describes the current process: OS family from the compile target and the
	/// shared Tally user agent. No device or installation id is known.
	pub fn from_host() -> Self {
		Self::new(DeviceInfo {
			os: OsKind::from_name(std::env::consts::OS),
			..Default::default()
		})
		.with_user_agent(tally_common_http::user_agent())
	}

	pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
		self.user_agent = Some(user_agent.into());
		self
	}

	pub fn with_screen_size(mut self, width: f64, height: f64) -> Self {
		self.screen = Some(ScreenSize { width, height });
		self
	}
}

#[async_trait]
impl DeviceInfoProvider for StaticDeviceInfo {
	fn device_info(&self) -> DeviceInfo {
		self.info.clone()
	}

	async fn user_agent(&self) -> Option<String> {
		self.user_agent.clone()
	}

	async fn screen_size(&self) -> Option<ScreenSize> {
		self.screen
	}
}
