// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Diagnostic line sinks for outgoing hits and rejected sends.

use std::sync::{Mutex, PoisonError};

use tracing::debug;

/// Receives free-form diagnostic lines. Never needed for correctness.
pub trait DiagnosticsSink: Send + Sync {
	fn record(&self, line: &str);
}

/// Forwards diagnostic lines to `tracing` at debug level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingDiagnostics;

impl DiagnosticsSink for TracingDiagnostics {
	fn record(&self, line: &str) {
		debug!(target: "uatrack::hit", "{line}");
	}
}

/// Keeps diagnostic lines in memory, e.g. to surface them in a debug page.
#[derive(Debug, Default)]
pub struct MemoryDiagnostics {
	lines: Mutex<Vec<String>>,
}

impl MemoryDiagnostics {
	pub fn new() -> Self {
		Self::default()
	}

	/// Returns a copy of every recorded line.
	pub fn lines(&self) -> Vec<String> {
		self.lines
			.lock()
			.unwrap_or_else(PoisonError::into_inner)
			.clone()
	}
}

impl DiagnosticsSink for MemoryDiagnostics {
	fn record(&self, line: &str) {
		self.lines
			.lock()
			.unwrap_or_else(PoisonError::into_inner)
			.push(line.to_string());
	}
}
