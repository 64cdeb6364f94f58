// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Hit types and the per-hit value bag.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// The kinds of hit the collection endpoint accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HitType {
	Pageview,
	Appview,
	Event,
	Transaction,
	Item,
	Social,
	Exception,
	Timing,
}

impl HitType {
	pub const ALL: [HitType; 8] = [
		HitType::Pageview,
		HitType::Appview,
		HitType::Event,
		HitType::Transaction,
		HitType::Item,
		HitType::Social,
		HitType::Exception,
		HitType::Timing,
	];

	/// The value sent as the `t` parameter.
	pub fn as_str(&self) -> &'static str {
		match self {
			HitType::Pageview => "pageview",
			HitType::Appview => "appview",
			HitType::Event => "event",
			HitType::Transaction => "transaction",
			HitType::Item => "item",
			HitType::Social => "social",
			HitType::Exception => "exception",
			HitType::Timing => "timing",
		}
	}
}

impl fmt::Display for HitType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for HitType {
	type Err = CoreError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		HitType::ALL
			.into_iter()
			.find(|t| t.as_str() == s)
			.ok_or_else(|| CoreError::InvalidHitType(s.to_string()))
	}
}

/// A single hit value. Converted to text only when the request is serialized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HitValue {
	Text(String),
	Number(f64),
}

impl HitValue {
	/// Returns true if the value serializes to an empty string.
	pub fn is_empty(&self) -> bool {
		matches!(self, HitValue::Text(s) if s.is_empty())
	}
}

impl fmt::Display for HitValue {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			HitValue::Text(s) => f.write_str(s),
			// `f64` Display drops a zero fraction: 107.0 prints as "107".
			HitValue::Number(n) => write!(f, "{n}"),
		}
	}
}

impl From<String> for HitValue {
	fn from(value: String) -> Self {
		HitValue::Text(value)
	}
}

impl From<&str> for HitValue {
	fn from(value: &str) -> Self {
		HitValue::Text(value.to_string())
	}
}

impl From<&String> for HitValue {
	fn from(value: &String) -> Self {
		HitValue::Text(value.clone())
	}
}

macro_rules! hit_value_from_number {
	($($ty:ty),*) => {
		$(
			impl From<$ty> for HitValue {
				fn from(value: $ty) -> Self {
					HitValue::Number(f64::from(value))
				}
			}
		)*
	};
}

hit_value_from_number!(f64, f32, i32, u32, i16, u16, i8, u8);

impl From<i64> for HitValue {
	fn from(value: i64) -> Self {
		// Beyond 2^53 an f64 loses precision; keep the exact digits as text.
		if value.unsigned_abs() <= (1u64 << 53) {
			HitValue::Number(value as f64)
		} else {
			HitValue::Text(value.to_string())
		}
	}
}

impl From<u64> for HitValue {
	fn from(value: u64) -> Self {
		if value <= (1u64 << 53) {
			HitValue::Number(value as f64)
		} else {
			HitValue::Text(value.to_string())
		}
	}
}

/// Friendly-named values accumulated for one pending hit.
///
/// Insertion order is kept; setting an existing name replaces its value in
/// place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HitState {
	entries: Vec<(String, HitValue)>,
}

impl HitState {
	/// Creates a new empty hit state.
	pub fn new() -> Self {
		Self::default()
	}

	/// Sets a value, replacing any existing value for `name`.
	pub fn set<K, V>(&mut self, name: K, value: V)
	where
		K: Into<String>,
		V: Into<HitValue>,
	{
		let name = name.into();
		let value = value.into();
		match self.entries.iter_mut().find(|(k, _)| *k == name) {
			Some((_, existing)) => *existing = value,
			None => self.entries.push((name, value)),
		}
	}

	/// Gets a value by friendly name.
	pub fn get(&self, name: &str) -> Option<&HitValue> {
		self
			.entries
			.iter()
			.find(|(k, _)| k == name)
			.map(|(_, v)| v)
	}

	/// Removes all values.
	pub fn clear(&mut self) {
		self.entries.clear();
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	/// Iterates entries in insertion order.
	pub fn iter(&self) -> impl Iterator<Item = (&str, &HitValue)> {
		self.entries.iter().map(|(k, v)| (k.as_str(), v))
	}
}

impl<K, V> FromIterator<(K, V)> for HitState
where
	K: Into<String>,
	V: Into<HitValue>,
{
	fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
		let mut state = HitState::new();
		state.extend(iter);
		state
	}
}

impl<K, V> Extend<(K, V)> for HitState
where
	K: Into<String>,
	V: Into<HitValue>,
{
	fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
		for (k, v) in iter {
			self.set(k, v);
		}
	}
}
