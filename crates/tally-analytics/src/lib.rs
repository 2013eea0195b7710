// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Product analytics Rust SDK for Tally.
//!
//! This crate buffers analytics events on the client and forwards them to a
//! Mixpanel-compatible collector. Calls never block and never fail after the
//! client is built: delivery happens on background tasks and problems are
//! logged.
//!
//! # Features
//!
//! - **Startup Buffering**: Events tracked before device discovery completes
//!   are queued and flushed, newest first, once the client is ready
//! - **Super Properties**: Registered properties are attached to every event
//!   and persisted across restarts
//! - **Event Timing**: `time_event` followed by `track` adds `$duration`
//! - **Profile Updates**: `$set`, `$set_once`, `$unset`, `$add`, `$append`,
//!   `$union` and `$delete` for the identified user
//! - **Pluggable Collaborators**: Device metadata, storage and transport are traits
//!
//! # Example
//!
//! ```ignore
//! use tally_analytics::{AnalyticsClient, Properties};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = AnalyticsClient::builder()
//!         .token("project_token")
//!         .base_url("https://api-eu.mixpanel.com")
//!         .build()?;
//!
//!     client.register(Properties::new().insert("cohort", "beta"));
//!     client.identify("user_123");
//!     client.track("App Opened", Properties::new().insert("cold_start", true));
//!     client.people_increment(Properties::new().insert("launches", 1));
//!
//!     client.wait_until_ready().await;
//!     client.shutdown().await?;
//!     Ok(())
//! }
//! ```

mod client;
mod device;
mod error;
mod queue;
mod store;
mod timer;
mod transport;

pub use client::{AnalyticsClient, AnalyticsClientBuilder, ClientConfig, DEFAULT_BASE_URL};
pub use device::{
	apply_discovered, DeviceInfo, DeviceInfoProvider, IosPlatform, OsKind, ScreenSize,
	StaticDeviceInfo,
};
pub use error::{AnalyticsError, Result, StoreError};
pub use queue::{EventQueue, QueuedEvent};
pub use store::{
	default_store, load_super_properties, FileKeyValueStore, KeyValueStore, MemoryKeyValueStore,
	DEFAULT_STORAGE_KEY,
};
pub use timer::EventTimers;
pub use transport::{
	normalize_base_url, DeliveryOutcome, DeliveryReport, DeliveryRequest, DeliveryTarget,
	Endpoint, HttpTransport, Transport,
};

// Re-export core types for convenience
pub use tally_analytics_core::{
	decode_data, encode_data, EventPayload, ProfileOperation, ProfilePayload, Properties,
	DURATION_PROPERTY,
};
