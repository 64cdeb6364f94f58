// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Client and user identifier normalization.
//!
//! Raw identifiers (email addresses, database keys, session tokens) are
//! hashed into a UUID-shaped string so the collection endpoint never sees the
//! raw value. The hash is deterministic: the same input always maps to the
//! same identifier across processes and releases.

use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Hashes `raw` into a stable identifier in 8-4-4-4-12 grouped form.
///
/// Uses the first 32 hex characters of the SHA-256 digest. This is an
/// analytics pseudonym, not a security boundary.
pub fn hash_to_stable_id(raw: &str) -> String {
	let digest = hex::encode(Sha256::digest(raw.as_bytes()));
	format!(
		"{}-{}-{}-{}-{}",
		&digest[0..8],
		&digest[8..12],
		&digest[12..16],
		&digest[16..20],
		&digest[20..32]
	)
}

/// Generates a random version-4 UUID in hyphenated lowercase form.
pub fn generate_random_id() -> String {
	Uuid::new_v4().hyphenated().to_string()
}
