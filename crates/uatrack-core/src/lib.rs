// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Core types for the uatrack measurement tracker.
//!
//! This crate is free of I/O. It provides:
//! - Identifier normalization (stable hashed IDs and random v4 IDs)
//! - The friendly-name to wire-key resolution table
//! - The per-hit value bag ([`HitState`])
//! - The read-only [`RequestContext`] collaborator
//! - Parameter assembly into a [`WireParams`] set

pub mod error;
pub mod hit;
pub mod identifier;
pub mod names;
pub mod params;
pub mod request;

pub use error::{CoreError, Result};
pub use hit::{HitState, HitType, HitValue};
pub use identifier::{generate_random_id, hash_to_stable_id};
pub use names::{is_known, resolve};
pub use params::{assemble, Identity, KeyPolicy, WireParams, PROTOCOL_VERSION};
pub use request::{RequestContext, RequestInfo, CLIENT_ID_COOKIE};
