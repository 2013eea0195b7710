// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Example: Track a few events and a profile update with the tally-analytics SDK.
//!
//! Run with:
//!   TALLY_TOKEN=... cargo run --example track -p tally-analytics

use std::sync::Arc;
use std::time::Duration;

use tally_analytics::{
	AnalyticsClient, DeviceInfo, MemoryKeyValueStore, OsKind, Properties, StaticDeviceInfo,
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	tracing_subscriber::fmt()
		.with_env_filter(
			EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")),
		)
		.init();

	let token = std::env::var("TALLY_TOKEN").unwrap_or_else(|_| "demo_token".to_string());
	let base_url =
		std::env::var("TALLY_BASE_URL").unwrap_or_else(|_| "https://api.mixpanel.com".to_string());

	println!("Initializing analytics client...");
	println!("  Base URL: {}", base_url);

	let device = StaticDeviceInfo::new(DeviceInfo {
		installation_id: Some("example-install-1".into()),
		app_name: Some("Tally Example".into()),
		app_version_string: Some(env!("CARGO_PKG_VERSION").into()),
		os: OsKind::Android,
		..Default::default()
	})
	.with_user_agent(tally_common_http::user_agent())
	.with_screen_size(1080.0, 2400.0);

	let client = AnalyticsClient::builder()
		.token(token)
		.base_url(base_url)
		.device_info(Arc::new(device))
		.store(Arc::new(MemoryKeyValueStore::new()))
		.build()?;

	let mut reports = client.subscribe_deliveries();

	// Tracked before the client is ready, so it is buffered
	client.time_event("Session");
	client.track("App Opened", Properties::new().insert("cold_start", true));

	client.wait_until_ready().await;
	println!("Client ready, client_id = {:?}", client.client_id());

	client.register(Properties::new().insert("cohort", "example"));
	client.identify("example_user");
	client.people_set(Properties::new().insert("plan", "free"));

	tokio::time::sleep(Duration::from_millis(250)).await;
	client.track("Session", Properties::new());

	for _ in 0..3 {
		match tokio::time::timeout(Duration::from_secs(10), reports.recv()).await {
			Ok(Ok(report)) => println!("  #{} {} -> {:?}", report.sequence, report.target, report.outcome),
			_ => break,
		}
	}

	client.shutdown().await?;
	println!("Done.");
	Ok(())
}
