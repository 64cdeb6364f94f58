// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for hit validation and parameter assembly.

use thiserror::Error;

/// Errors raised before a hit reaches the network.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
	/// The requested hit type is not one of the recognized types.
	#[error("invalid hit type: {0:?}")]
	InvalidHitType(String),

	/// Strict assembly found a field name with no wire mapping.
	#[error("unresolved parameter: {0:?} has no wire key")]
	UnresolvedParameter(String),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
