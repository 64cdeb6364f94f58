// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Server-side Measurement Protocol tracker.
//!
//! Hits are assembled from friendly field names, tagged with the account,
//! client and optional user identity, and written as a single form-encoded
//! POST over a raw TCP connection. By default nothing is read back: the
//! connection is closed as soon as the request is written.
//!
//! # Example
//!
//! ```no_run
//! use uatrack::{load_config, Tracker};
//!
//! # async fn run() -> uatrack::Result<()> {
//! let mut tracker = Tracker::builder("UA-XXXXXXXX-Y")
//! 	.config(load_config()?)
//! 	.user_agent("my-service/1.0")
//! 	.build()?;
//!
//! tracker.set_user_id("account-990", true);
//! tracker
//! 	.set_value("eventCategory", "billing")
//! 	.set_value("eventAction", "upgrade")
//! 	.set_value("dimension1", "pro")
//! 	.send("event")
//! 	.await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod diagnostics;
pub mod error;
pub mod tracker;
pub mod transport;

pub use config::{
	load_config, load_config_with_file, ConfigError, ConfigSource, DefaultsSource, EnvSource,
	Precedence, TomlSource, TrackerConfig, TrackerConfigLayer,
};
pub use diagnostics::{DiagnosticsSink, MemoryDiagnostics, TracingDiagnostics};
pub use error::{Result, TrackerError, TransportError};
pub use tracker::{SendOptions, Tracker, TrackerBuilder};
pub use transport::{Connection, Connector, DeliveryOutcome, Endpoint, TcpConnector, Transport};

pub use uatrack_core::{
	generate_random_id, hash_to_stable_id, CoreError, HitState, HitType, HitValue, KeyPolicy,
	RequestContext, RequestInfo,
};
