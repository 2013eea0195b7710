// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Pending-event queue.
//!
//! Events tracked before the client is ready wait here. The queue is drained
//! from the tail, so the most recently tracked event is dispatched first.

use tally_analytics_core::Properties;

/// A tracked event waiting to be dispatched.
#[derive(Debug, Clone, PartialEq)]
pub struct QueuedEvent {
	pub name: String,
	pub properties: Properties,
	sent: bool,
}

impl QueuedEvent {
	pub fn new(name: impl Into<String>, properties: Properties) -> Self {
		Self {
			name: name.into(),
			properties,
			sent: false,
		}
	}

	/// Records that the collector accepted this event.
	pub fn mark_sent(&mut self) {
		self.sent = true;
	}

	pub fn is_sent(&self) -> bool {
		self.sent
	}
}

/// Unbounded stack of pending events.
#[derive(Debug, Default)]
pub struct EventQueue {
	events: Vec<QueuedEvent>,
}

impl EventQueue {
	pub fn new() -> Self {
		Self { events: Vec::new() }
	}

	pub fn push(&mut self, event: QueuedEvent) {
		self.events.push(event);
	}

	/// Removes the most recently pushed event.
	pub fn pop(&mut self) -> Option<QueuedEvent> {
		self.events.pop()
	}

	/// Removes every event, newest first.
	pub fn drain_newest_first(&mut self) -> impl Iterator<Item = QueuedEvent> + '_ {
		std::iter::from_fn(move || self.events.pop())
	}

	pub fn len(&self) -> usize {
		self.events.len()
	}

	pub fn is_empty(&self) -> bool {
		self.events.is_empty()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;

	fn event(name: &str) -> QueuedEvent {
		QueuedEvent::new(name, Properties::new())
	}

	#[test]
	fn test_new_event_is_unsent() {
		let mut e = event("App Opened");
		assert!(!e.is_sent());
		e.mark_sent();
		assert!(e.is_sent());
	}

	#[test]
	fn test_pop_is_lifo() {
		let mut queue = EventQueue::new();
		queue.push(event("first"));
		queue.push(event("second"));

		assert_eq!(queue.pop().unwrap().name, "second");
		assert_eq!(queue.pop().unwrap().name, "first");
		assert!(queue.pop().is_none());
	}

	#[test]
	fn test_drain_empties_queue() {
		let mut queue = EventQueue::new();
		for i in 0..5 {
			queue.push(event(&format!("event{i}")));
		}

		let names: Vec<_> = queue.drain_newest_first().map(|e| e.name).collect();

		assert_eq!(names, vec!["event4", "event3", "event2", "event1", "event0"]);
		assert!(queue.is_empty());
	}

	#[test]
	fn test_partial_drain_leaves_remaining() {
		let mut queue = EventQueue::new();
		queue.push(event("a"));
		queue.push(event("b"));
		queue.push(event("c"));

		let first = queue.drain_newest_first().next();

		assert_eq!(first.unwrap().name, "c");
		assert_eq!(queue.len(), 2);
	}

	proptest! {
		#[test]
		fn drain_reverses_push_order(names in proptest::collection::vec("[a-z]{1,12}", 0..50)) {
			let mut queue = EventQueue::new();
			for name in &names {
				queue.push(event(name));
			}

			let drained: Vec<String> = queue.drain_newest_first().map(|e| e.name).collect();
			let mut expected = names.clone();
			expected.reverse();

			prop_assert_eq!(drained, expected);
			prop_assert!(queue.is_empty());
		}
	}
}
