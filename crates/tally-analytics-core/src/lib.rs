// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Core types for Tally product analytics.
//!
//! This crate holds the wire format shared by the client SDK (`tally-analytics`)
//! and anything that needs to inspect what the SDK sends:
//!
//! - [`Properties`]: typed property bags with explicit merge precedence
//! - [`EventPayload`]: body of a `track` request
//! - [`ProfilePayload`] / [`ProfileOperation`]: body of an `engage` request
//! - [`encode_data`] / [`decode_data`]: the base64 JSON `data=` parameter
//!
//! # Example
//!
//! ```
//! use tally_analytics_core::{decode_data, encode_data, EventIdentity, EventPayload, Properties};
//!
//! let payload = EventPayload::assemble(
//!     "Signed Up",
//!     &Properties::new().insert("os_version", "17.1"),
//!     &Properties::new().insert("plan", "pro"),
//!     &Properties::new(),
//!     &EventIdentity { token: "tok", ..Default::default() },
//! );
//!
//! let data = encode_data(&payload).unwrap();
//! let back: EventPayload = decode_data(&data).unwrap();
//! assert_eq!(back, payload);
//! ```

pub mod codec;
pub mod error;
pub mod event;
pub mod profile;
pub mod properties;

pub use codec::{decode_data, encode_data};
pub use error::{CoreError, Result};
pub use event::{elapsed_seconds, reserved, EventIdentity, EventPayload, DURATION_PROPERTY};
pub use profile::{ProfileOperation, ProfilePayload};
pub use properties::Properties;
