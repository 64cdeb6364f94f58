// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Assembly of the wire parameter set sent for one hit.

use tracing::{debug, trace};

use crate::error::{CoreError, Result};
use crate::hit::{HitState, HitType, HitValue};
use crate::names::resolve;
use crate::request::RequestContext;

/// Measurement Protocol version sent as `v`.
pub const PROTOCOL_VERSION: u32 = 1;

const LOCATION_KEY: &str = "dl";
const REFERRER_KEY: &str = "dr";
const CACHE_BUSTER_KEY: &str = "z";
const IDENTITY_KEYS: [&str; 4] = ["t", "v", "tid", "cid"];
const USER_ID_KEY: &str = "uid";

/// How assembly treats field names with no wire mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyPolicy {
	/// Drop unknown names silently.
	#[default]
	Ignore,
	/// Fail with [`CoreError::UnresolvedParameter`].
	Strict,
}

impl KeyPolicy {
	pub fn from_ignore_invalid(ignore: bool) -> Self {
		if ignore {
			KeyPolicy::Ignore
		} else {
			KeyPolicy::Strict
		}
	}
}

/// Identity fields merged into every hit. These win over hit state values.
#[derive(Debug, Clone, Copy)]
pub struct Identity<'a> {
	pub hit_type: HitType,
	pub tracking_id: &'a str,
	pub client_id: &'a str,
	pub user_id: Option<&'a str>,
}

/// Ordered wire key to value pairs for one request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WireParams {
	entries: Vec<(String, HitValue)>,
}

impl WireParams {
	pub fn new() -> Self {
		Self::default()
	}

	/// Sets `key`, replacing an existing value in place.
	pub fn set(&mut self, key: impl Into<String>, value: impl Into<HitValue>) {
		let key = key.into();
		let value = value.into();
		match self.entries.iter_mut().find(|(k, _)| *k == key) {
			Some((_, existing)) => *existing = value,
			None => self.entries.push((key, value)),
		}
	}

	pub fn get(&self, key: &str) -> Option<&HitValue> {
		self
			.entries
			.iter()
			.find(|(k, _)| k == key)
			.map(|(_, v)| v)
	}

	pub fn contains_key(&self, key: &str) -> bool {
		self.get(key).is_some()
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	pub fn iter(&self) -> impl Iterator<Item = (&str, &HitValue)> {
		self.entries.iter().map(|(k, v)| (k.as_str(), v))
	}
}

/// Translates `state` into the wire parameters for one hit.
///
/// Identity is written first and is never overridden by the hit state. A
/// `uid` from the hit state is only sent when the identity carries none.
/// Location and referrer default from `request`, and a fresh cache buster
/// is always set.
pub fn assemble(
	state: &HitState,
	identity: Identity<'_>,
	request: &dyn RequestContext,
	policy: KeyPolicy,
) -> Result<WireParams> {
	let mut params = WireParams::new();
	params.set("t", identity.hit_type.as_str());
	params.set("v", PROTOCOL_VERSION);
	params.set("tid", identity.tracking_id);
	params.set("cid", identity.client_id);
	if let Some(user_id) = identity.user_id {
		params.set(USER_ID_KEY, user_id);
	}

	for (name, value) in state.iter() {
		let Some(key) = resolve(name) else {
			match policy {
				KeyPolicy::Ignore => {
					trace!(field = %name, "dropping unknown hit field");
					continue;
				}
				KeyPolicy::Strict => return Err(CoreError::UnresolvedParameter(name.to_string())),
			}
		};
		if IDENTITY_KEYS.contains(&&*key) || (key == USER_ID_KEY && identity.user_id.is_some()) {
			trace!(field = %name, key = %key, "identity already set, skipping hit field");
			continue;
		}
		params.set(key, value.clone());
	}

	if !params.contains_key(LOCATION_KEY) {
		params.set(LOCATION_KEY, request.current_url());
	}
	if !params.contains_key(REFERRER_KEY) {
		let referrer = request
			.referrer()
			.map(str::to_string)
			.unwrap_or_else(|| request.current_url());
		params.set(REFERRER_KEY, referrer);
	}

	params.set(CACHE_BUSTER_KEY, fastrand::u32(..));

	debug!(
		hit_type = %identity.hit_type,
		param_count = params.len(),
		"assembled hit parameters"
	);
	Ok(params)
}
