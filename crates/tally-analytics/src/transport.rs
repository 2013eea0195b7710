// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Delivery of encoded payloads to the collector.
//!
//! Every event and profile update becomes one GET request carrying the
//! encoded payload in its `data` query parameter. Deliveries are
//! fire-and-forget: the outcome is published as a [`DeliveryReport`] and
//! otherwise discarded.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tally_analytics_core::ProfileOperation;
use tracing::debug;

use crate::error::{AnalyticsError, Result};

/// Collector endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
	/// Discrete events.
	Track,
	/// Profile updates.
	Engage,
}

impl Endpoint {
	pub fn path(&self) -> &'static str {
		match self {
			Endpoint::Track => "/track/",
			Endpoint::Engage => "/engage/",
		}
	}
}

/// One encoded payload bound for an endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryRequest {
	pub endpoint: Endpoint,
	/// Base64 JSON payload, not yet URL-escaped.
	pub data: String,
}

/// Sends delivery requests to the collector.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
	/// Sends one request, returning the HTTP status on success.
	async fn send(&self, request: DeliveryRequest) -> Result<u16>;
}

/// [`Transport`] over `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpTransport {
	http_client: Client,
	base_url: String,
}

impl HttpTransport {
	/// Creates a transport for `base_url` with a per-request timeout.
	pub fn new(base_url: &str, request_timeout: Duration) -> Result<Self> {
		let base_url = normalize_base_url(base_url)?;
		let http_client = tally_common_http::new_client_with_timeout(request_timeout)?;

		Ok(Self {
			http_client,
			base_url,
		})
	}

	/// Creates a transport around an existing client.
	pub fn with_client(http_client: Client, base_url: &str) -> Result<Self> {
		Ok(Self {
			http_client,
			base_url: normalize_base_url(base_url)?,
		})
	}

	pub fn base_url(&self) -> &str {
		&self.base_url
	}
}

#[async_trait]
impl Transport for HttpTransport {
	async fn send(&self, request: DeliveryRequest) -> Result<u16> {
		let url = format!("{}{}", self.base_url, request.endpoint.path());

		debug!(url = %url, bytes = request.data.len(), "Sending analytics payload");

		let response = self
			.http_client
			.get(&url)
			.query(&[("data", request.data.as_str())])
			.send()
			.await?;

		let status = response.status();
		if !status.is_success() {
			return Err(AnalyticsError::ServerError {
				status: status.as_u16(),
				message: response.text().await.unwrap_or_default(),
			});
		}

		Ok(status.as_u16())
	}
}

/// Validates a base URL and strips any trailing slash.
pub fn normalize_base_url(base_url: &str) -> Result<String> {
	let trimmed = base_url.trim().trim_end_matches('/');
	let parsed = url::Url::parse(trimmed)
		.map_err(|e| AnalyticsError::InvalidBaseUrl(format!("{trimmed}: {e}")))?;

	if !matches!(parsed.scheme(), "http" | "https") {
		return Err(AnalyticsError::InvalidBaseUrl(format!(
			"{trimmed}: unsupported scheme {}",
			parsed.scheme()
		)));
	}

	Ok(trimmed.to_string())
}

/// What a delivery carried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryTarget {
	Event { name: String },
	Profile { operation: ProfileOperation },
}

impl fmt::Display for DeliveryTarget {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			DeliveryTarget::Event { name } => write!(f, "event {name}"),
			DeliveryTarget::Profile { operation } => write!(f, "profile ${operation}"),
		}
	}
}

/// How a delivery ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
	Delivered { status: u16 },
	Failed { error: String },
}

/// Result of a single fire-and-forget delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryReport {
	/// Dispatch order, starting at 1 for each client.
	pub sequence: u64,
	pub target: DeliveryTarget,
	pub outcome: DeliveryOutcome,
}

impl DeliveryReport {
	pub fn is_delivered(&self) -> bool {
		matches!(self.outcome, DeliveryOutcome::Delivered { .. })
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_endpoint_paths() {
		assert_eq!(Endpoint::Track.path(), "/track/");
		assert_eq!(Endpoint::Engage.path(), "/engage/");
	}

	#[test]
	fn test_normalize_strips_trailing_slash() {
		assert_eq!(
			normalize_base_url("https://api.mixpanel.com/").unwrap(),
			"https://api.mixpanel.com"
		);
		assert_eq!(
			normalize_base_url("http://localhost:8080/collect//").unwrap(),
			"http://localhost:8080/collect"
		);
	}

	#[test]
	fn test_normalize_rejects_garbage() {
		assert!(matches!(
			normalize_base_url("not a url"),
			Err(AnalyticsError::InvalidBaseUrl(_))
		));
		assert!(matches!(
			normalize_base_url("ftp://example.com"),
			Err(AnalyticsError::InvalidBaseUrl(_))
		));
	}

	#[test]
	fn test_http_transport_builds() {
		let transport = HttpTransport::new("https://example.com/", Duration::from_secs(1)).unwrap();
		assert_eq!(transport.base_url(), "https://example.com");
	}

	#[test]
	fn test_delivery_target_display() {
		let event = DeliveryTarget::Event {
			name: "Signed Up".into(),
		};
		let profile = DeliveryTarget::Profile {
			operation: ProfileOperation::SetOnce,
		};
		assert_eq!(event.to_string(), "event Signed Up");
		assert_eq!(profile.to_string(), "profile $set_once");
	}

	#[test]
	fn test_report_is_delivered() {
		let report = DeliveryReport {
			sequence: 1,
			target: DeliveryTarget::Event { name: "x".into() },
			outcome: DeliveryOutcome::Delivered { status: 200 },
		};
		assert!(report.is_delivered());

		let failed = DeliveryReport {
			outcome: DeliveryOutcome::Failed {
				error: "timeout".into(),
			},
			..report
		};
		assert!(!failed.is_delivered());
	}
}
