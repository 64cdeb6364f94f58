// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Layered tracker configuration.
//!
//! Precedence (highest to lowest):
//! 1. Environment variables (`UATRACK_*`)
//! 2. Config file (TOML)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, trace};

/// Default Measurement Protocol collection endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://www.google-analytics.com/collect";
/// Default bound on connection establishment.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
/// Default bound on reading a response when one is requested.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum ConfigError {
	#[error("failed to read config file {path}: {source}")]
	FileRead {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("failed to parse config file {path}: {source}")]
	TomlParse {
		path: PathBuf,
		#[source]
		source: toml::de::Error,
	},

	#[error("invalid value for {key}: {message}")]
	InvalidValue { key: String, message: String },
}

/// Fully resolved tracker configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerConfig {
	pub endpoint: String,
	pub connect_timeout: Duration,
	pub read_timeout: Duration,
	/// Drop unknown field names instead of failing the send.
	pub ignore_invalid_params: bool,
	/// Record every outgoing request on the diagnostics sink.
	pub log_hits: bool,
	pub wait_for_response: bool,
}

impl Default for TrackerConfig {
	fn default() -> Self {
		TrackerConfigLayer::default().finalize()
	}
}

/// A partial configuration from one source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackerConfigLayer {
	#[serde(default)]
	pub endpoint: Option<String>,
	#[serde(default)]
	pub connect_timeout_secs: Option<u64>,
	#[serde(default)]
	pub read_timeout_secs: Option<u64>,
	#[serde(default)]
	pub ignore_invalid_params: Option<bool>,
	#[serde(default)]
	pub log_hits: Option<bool>,
	#[serde(default)]
	pub wait_for_response: Option<bool>,
}

impl TrackerConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.endpoint.is_some() {
			self.endpoint = other.endpoint;
		}
		if other.connect_timeout_secs.is_some() {
			self.connect_timeout_secs = other.connect_timeout_secs;
		}
		if other.read_timeout_secs.is_some() {
			self.read_timeout_secs = other.read_timeout_secs;
		}
		if other.ignore_invalid_params.is_some() {
			self.ignore_invalid_params = other.ignore_invalid_params;
		}
		if other.log_hits.is_some() {
			self.log_hits = other.log_hits;
		}
		if other.wait_for_response.is_some() {
			self.wait_for_response = other.wait_for_response;
		}
	}

	pub fn finalize(self) -> TrackerConfig {
		TrackerConfig {
			endpoint: self.endpoint.unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()),
			connect_timeout: self
				.connect_timeout_secs
				.map(Duration::from_secs)
				.unwrap_or(DEFAULT_CONNECT_TIMEOUT),
			read_timeout: self
				.read_timeout_secs
				.map(Duration::from_secs)
				.unwrap_or(DEFAULT_READ_TIMEOUT),
			ignore_invalid_params: self.ignore_invalid_params.unwrap_or(true),
			log_hits: self.log_hits.unwrap_or(false),
			wait_for_response: self.wait_for_response.unwrap_or(false),
		}
	}
}

/// Source precedence levels (higher = overrides lower).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
	Defaults = 10,
	ConfigFile = 20,
	Environment = 50,
}

/// Trait for configuration sources.
pub trait ConfigSource: Send + Sync {
	fn name(&self) -> &'static str;
	fn precedence(&self) -> Precedence;
	fn load(&self) -> Result<TrackerConfigLayer, ConfigError>;
}

/// Built-in defaults source.
pub struct DefaultsSource;

impl ConfigSource for DefaultsSource {
	fn name(&self) -> &'static str {
		"defaults"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Defaults
	}

	fn load(&self) -> Result<TrackerConfigLayer, ConfigError> {
		Ok(TrackerConfigLayer::default())
	}
}

/// TOML file configuration source. A missing file contributes nothing.
pub struct TomlSource {
	path: PathBuf,
}

impl TomlSource {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}
}

impl ConfigSource for TomlSource {
	fn name(&self) -> &'static str {
		"toml-config"
	}

	fn precedence(&self) -> Precedence {
		Precedence::ConfigFile
	}

	fn load(&self) -> Result<TrackerConfigLayer, ConfigError> {
		if !self.path.exists() {
			debug!(path = %self.path.display(), "config file not found, skipping");
			return Ok(TrackerConfigLayer::default());
		}

		debug!(path = %self.path.display(), "loading config file");
		let content = std::fs::read_to_string(&self.path).map_err(|e| ConfigError::FileRead {
			path: self.path.clone(),
			source: e,
		})?;

		let layer: TrackerConfigLayer =
			toml::from_str(&content).map_err(|e| ConfigError::TomlParse {
				path: self.path.clone(),
				source: e,
			})?;

		trace!("parsed config layer from TOML");
		Ok(layer)
	}
}

type Lookup = Box<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Environment variable source.
///
/// Convention: `UATRACK_<FIELD>`.
pub struct EnvSource {
	lookup: Lookup,
}

impl Default for EnvSource {
	fn default() -> Self {
		Self::new()
	}
}

impl EnvSource {
	/// Reads from the process environment.
	pub fn new() -> Self {
		Self::with_lookup(|name| std::env::var(name).ok())
	}

	/// Reads through `lookup` instead of the process environment.
	pub fn with_lookup<F>(lookup: F) -> Self
	where
		F: Fn(&str) -> Option<String> + Send + Sync + 'static,
	{
		Self {
			lookup: Box::new(lookup),
		}
	}

	fn var(&self, name: &str) -> Option<String> {
		(self.lookup)(name).filter(|s| !s.is_empty())
	}

	fn bool(&self, name: &str) -> Option<bool> {
		self
			.var(name)
			.map(|v| v.eq_ignore_ascii_case("true") || v == "1")
	}

	fn u64(&self, name: &str) -> Result<Option<u64>, ConfigError> {
		match self.var(name) {
			Some(v) => v.parse().map(Some).map_err(|_| ConfigError::InvalidValue {
				key: name.to_string(),
				message: format!("invalid u64 value '{v}'"),
			}),
			None => Ok(None),
		}
	}
}

impl ConfigSource for EnvSource {
	fn name(&self) -> &'static str {
		"environment"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Environment
	}

	fn load(&self) -> Result<TrackerConfigLayer, ConfigError> {
		debug!("loading environment variables");
		Ok(TrackerConfigLayer {
			endpoint: self.var("UATRACK_ENDPOINT"),
			connect_timeout_secs: self.u64("UATRACK_CONNECT_TIMEOUT_SECS")?,
			read_timeout_secs: self.u64("UATRACK_READ_TIMEOUT_SECS")?,
			ignore_invalid_params: self.bool("UATRACK_IGNORE_INVALID_PARAMS"),
			log_hits: self.bool("UATRACK_LOG_HITS"),
			wait_for_response: self.bool("UATRACK_WAIT_FOR_RESPONSE"),
		})
	}
}

/// Merges `sources` in precedence order.
pub fn load_from_sources(
	mut sources: Vec<Box<dyn ConfigSource>>,
) -> Result<TrackerConfig, ConfigError> {
	sources.sort_by_key(|s| s.precedence());

	let mut merged = TrackerConfigLayer::default();
	for source in sources {
		debug!(source = source.name(), "loading configuration source");
		merged.merge(source.load()?);
	}

	Ok(merged.finalize())
}

/// Loads configuration from defaults and the environment.
pub fn load_config() -> Result<TrackerConfig, ConfigError> {
	load_from_sources(vec![Box::new(DefaultsSource), Box::new(EnvSource::new())])
}

/// Loads configuration from defaults, a TOML file and the environment.
pub fn load_config_with_file(
	config_path: impl Into<PathBuf>,
) -> Result<TrackerConfig, ConfigError> {
	load_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::new(config_path)),
		Box::new(EnvSource::new()),
	])
}
