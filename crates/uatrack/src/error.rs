// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for the tracker SDK.

use std::time::Duration;

use thiserror::Error;
use uatrack_core::CoreError;

use crate::config::ConfigError;

/// Delivery failures. None of these are retried by the tracker.
#[derive(Debug, Error)]
pub enum TransportError {
	/// The connection could not be established.
	#[error("connection to {endpoint} failed: {source}")]
	ConnectionFailed {
		endpoint: String,
		#[source]
		source: std::io::Error,
	},

	/// The connection was not established within the connect timeout.
	#[error("connection to {endpoint} timed out after {timeout:?}")]
	ConnectTimeout { endpoint: String, timeout: Duration },

	/// The connection opened but the request was not fully written.
	#[error("failed to write request: {0}")]
	WriteFailed(#[source] std::io::Error),

	/// The request was written but reading the response failed.
	#[error("failed to read response: {0}")]
	ResponseReadFailed(#[source] std::io::Error),

	/// The request was written but the response did not finish in time.
	#[error("response not complete after {0:?}")]
	ResponseTimeout(Duration),
}

impl TransportError {
	/// True when no connection was ever opened.
	pub fn is_connection_failure(&self) -> bool {
		matches!(
			self,
			TransportError::ConnectionFailed { .. } | TransportError::ConnectTimeout { .. }
		)
	}

	/// True when the request reached the wire before the failure.
	pub fn request_was_written(&self) -> bool {
		matches!(
			self,
			TransportError::ResponseReadFailed(_) | TransportError::ResponseTimeout(_)
		)
	}
}

/// Tracker SDK errors.
#[derive(Debug, Error)]
pub enum TrackerError {
	/// Hit validation or parameter assembly failed.
	#[error(transparent)]
	Core(#[from] CoreError),

	/// Delivery failed.
	#[error(transparent)]
	Transport(#[from] TransportError),

	/// The tracking/account ID is missing or empty.
	#[error("account ID is required")]
	MissingAccountId,

	/// The collection endpoint could not be parsed.
	#[error("invalid endpoint: {0}")]
	InvalidEndpoint(String),

	/// Configuration could not be loaded.
	#[error("configuration error: {0}")]
	Config(#[from] ConfigError),
}

/// Result type alias for tracker operations.
pub type Result<T> = std::result::Result<T, TrackerError>;
