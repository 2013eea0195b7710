// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Event timers backing `time_event` and the `$duration` property.

use std::collections::HashMap;

use tally_analytics_core::elapsed_seconds;

/// Start timestamps (milliseconds since the Unix epoch) keyed by event name.
#[derive(Debug, Default)]
pub struct EventTimers {
	started: HashMap<String, i64>,
}

impl EventTimers {
	pub fn new() -> Self {
		Self::default()
	}

	/// Starts (or restarts) the timer for `name`.
	pub fn start(&mut self, name: impl Into<String>, now_ms: i64) {
		self.started.insert(name.into(), now_ms);
	}

	/// Consumes the timer for `name`, returning the elapsed seconds if one was running.
	pub fn take_elapsed(&mut self, name: &str, now_ms: i64) -> Option<f64> {
		self.started
			.remove(name)
			.map(|start| elapsed_seconds(start, now_ms))
	}

	pub fn is_running(&self, name: &str) -> bool {
		self.started.contains_key(name)
	}

	pub fn len(&self) -> usize {
		self.started.len()
	}

	pub fn is_empty(&self) -> bool {
		self.started.is_empty()
	}
}
