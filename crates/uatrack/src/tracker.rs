// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The tracker: identity, per-hit state and sending.

use std::fmt;
use std::sync::Arc;

use tracing::{info, warn};
use uatrack_core::{
	assemble, generate_random_id, hash_to_stable_id, CoreError, HitState, HitType, HitValue,
	Identity, KeyPolicy, RequestContext, RequestInfo,
};

use crate::config::TrackerConfig;
use crate::diagnostics::{DiagnosticsSink, TracingDiagnostics};
use crate::error::{Result, TrackerError};
use crate::transport::{Connector, DeliveryOutcome, Endpoint, TcpConnector, Transport};

/// Per-send switches. Defaults come from [`TrackerConfig`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SendOptions {
	/// Record the outgoing request (and response, if read) on the diagnostics sink.
	pub log: bool,
	/// Read the response until the endpoint closes the connection.
	pub wait_for_response: bool,
}

impl From<&TrackerConfig> for SendOptions {
	fn from(config: &TrackerConfig) -> Self {
		Self {
			log: config.log_hits,
			wait_for_response: config.wait_for_response,
		}
	}
}

/// Builder for constructing a [`Tracker`].
pub struct TrackerBuilder {
	account_id: String,
	client_id: Option<String>,
	user_agent: Option<String>,
	config: TrackerConfig,
	request: Option<Arc<dyn RequestContext>>,
	connector: Option<Arc<dyn Connector>>,
	diagnostics: Option<Arc<dyn DiagnosticsSink>>,
}

impl TrackerBuilder {
	fn new(account_id: String) -> Self {
		Self {
			account_id,
			client_id: None,
			user_agent: None,
			config: TrackerConfig::default(),
			request: None,
			connector: None,
			diagnostics: None,
		}
	}

	/// Sets the client ID verbatim.
	pub fn client_id(mut self, client_id: impl Into<String>) -> Self {
		self.client_id = Some(client_id.into());
		self
	}

	pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
		self.user_agent = Some(user_agent.into());
		self
	}

	pub fn config(mut self, config: TrackerConfig) -> Self {
		self.config = config;
		self
	}

	/// Sets the inbound request used for location, referrer and cookie lookups.
	pub fn request_context(mut self, request: Arc<dyn RequestContext>) -> Self {
		self.request = Some(request);
		self
	}

	/// Replaces the TCP connector, e.g. to route through a proxy.
	pub fn connector(mut self, connector: Arc<dyn Connector>) -> Self {
		self.connector = Some(connector);
		self
	}

	pub fn diagnostics(mut self, diagnostics: Arc<dyn DiagnosticsSink>) -> Self {
		self.diagnostics = Some(diagnostics);
		self
	}

	pub fn build(self) -> Result<Tracker> {
		if self.account_id.trim().is_empty() {
			return Err(TrackerError::MissingAccountId);
		}
		let endpoint = Endpoint::parse(&self.config.endpoint)?;
		let transport = Transport::new(
			self.connector.unwrap_or_else(|| Arc::new(TcpConnector)),
			endpoint,
			self.config.connect_timeout,
			self.config.read_timeout,
		);

		info!(
			account_id = %self.account_id,
			endpoint = %transport.endpoint(),
			"tracker initialized"
		);

		Ok(Tracker {
			account_id: self.account_id,
			client_id: self.client_id,
			user_id: None,
			user_agent: self.user_agent,
			state: HitState::new(),
			policy: KeyPolicy::from_ignore_invalid(self.config.ignore_invalid_params),
			options: SendOptions::from(&self.config),
			request: self
				.request
				.unwrap_or_else(|| Arc::new(RequestInfo::default())),
			transport,
			diagnostics: self
				.diagnostics
				.unwrap_or_else(|| Arc::new(TracingDiagnostics)),
		})
	}
}

/// Builds and sends Measurement Protocol hits.
///
/// Identity (account, client, user, user agent) survives [`Tracker::initialize`];
/// only the per-hit values are cleared. Sending does not clear them either.
///
/// # Example
///
/// ```no_run
/// # async fn run() -> uatrack::Result<()> {
/// use uatrack::Tracker;
///
/// let mut tracker = Tracker::builder("UA-XXXXXXXX-Y").build()?;
/// tracker
/// 	.set_value("eventCategory", "signup")
/// 	.set_value("eventAction", "submit")
/// 	.send("event")
/// 	.await?;
/// # Ok(())
/// # }
/// ```
pub struct Tracker {
	account_id: String,
	client_id: Option<String>,
	user_id: Option<String>,
	user_agent: Option<String>,
	state: HitState,
	policy: KeyPolicy,
	options: SendOptions,
	request: Arc<dyn RequestContext>,
	transport: Transport,
	diagnostics: Arc<dyn DiagnosticsSink>,
}

impl fmt::Debug for Tracker {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Tracker")
			.field("account_id", &self.account_id)
			.field("client_id", &self.client_id)
			.field("user_id", &self.user_id)
			.field("state", &self.state)
			.field("transport", &self.transport)
			.finish_non_exhaustive()
	}
}

impl Tracker {
	pub fn builder(account_id: impl Into<String>) -> TrackerBuilder {
		TrackerBuilder::new(account_id.into())
	}

	pub fn account_id(&self) -> &str {
		&self.account_id
	}

	/// Sets the client ID, optionally hashing it into a stable pseudonym.
	pub fn set_client_id(&mut self, client_id: impl AsRef<str>, hash: bool) -> &mut Self {
		let client_id = client_id.as_ref();
		self.client_id = Some(if hash {
			hash_to_stable_id(client_id)
		} else {
			client_id.to_string()
		});
		self
	}

	/// The client ID if it has been set or resolved.
	pub fn client_id(&self) -> Option<&str> {
		self.client_id.as_deref()
	}

	/// Returns the client ID, resolving it on first use from the `_ga` cookie
	/// or a fresh random ID.
	pub fn resolve_client_id(&mut self) -> &str {
		let request = &self.request;
		self.client_id.get_or_insert_with(|| {
			request
				.cookie_client_id()
				.unwrap_or_else(generate_random_id)
		})
	}

	/// Sets the user ID, optionally hashing it into a stable pseudonym.
	pub fn set_user_id(&mut self, user_id: impl AsRef<str>, hash: bool) -> &mut Self {
		let user_id = user_id.as_ref();
		self.user_id = Some(if hash {
			hash_to_stable_id(user_id)
		} else {
			user_id.to_string()
		});
		self
	}

	pub fn clear_user_id(&mut self) -> &mut Self {
		self.user_id = None;
		self
	}

	pub fn user_id(&self) -> Option<&str> {
		self.user_id.as_deref()
	}

	pub fn set_user_agent(&mut self, user_agent: impl Into<String>) -> &mut Self {
		self.user_agent = Some(user_agent.into());
		self
	}

	/// The explicit user agent, falling back to the inbound request's.
	pub fn user_agent(&self) -> Option<&str> {
		self.user_agent.as_deref().or_else(|| self.request.user_agent())
	}

	/// Sets one hit value by friendly name.
	pub fn set_value(&mut self, name: impl Into<String>, value: impl Into<HitValue>) -> &mut Self {
		self.state.set(name, value);
		self
	}

	/// Sets several hit values, in order.
	pub fn set_values<I, K, V>(&mut self, values: I) -> &mut Self
	where
		I: IntoIterator<Item = (K, V)>,
		K: Into<String>,
		V: Into<HitValue>,
	{
		self.state.extend(values);
		self
	}

	pub fn value(&self, name: &str) -> Option<&HitValue> {
		self.state.get(name)
	}

	pub fn state(&self) -> &HitState {
		&self.state
	}

	/// Clears the per-hit values. Identity is kept.
	pub fn initialize(&mut self) -> &mut Self {
		self.state.clear();
		self
	}

	/// Sends the current values as a `hit_type` hit using the configured options.
	pub async fn send(&mut self, hit_type: &str) -> Result<DeliveryOutcome> {
		let options = self.options;
		self.send_with(hit_type, options).await
	}

	/// Sends the current values as a `hit_type` hit.
	///
	/// An unrecognized hit type or (in strict mode) an unknown field name
	/// fails before any connection is opened. Delivery failures are reported
	/// in the returned [`DeliveryOutcome`]. Hit values are kept either way.
	pub async fn send_with(&mut self, hit_type: &str, options: SendOptions) -> Result<DeliveryOutcome> {
		let hit_type: HitType = match hit_type.parse() {
			Ok(hit_type) => hit_type,
			Err(e) => return Err(self.reject(e)),
		};

		let client_id = self.resolve_client_id().to_string();
		let identity = Identity {
			hit_type,
			tracking_id: &self.account_id,
			client_id: &client_id,
			user_id: self.user_id.as_deref(),
		};
		let params = match assemble(&self.state, identity, self.request.as_ref(), self.policy) {
			Ok(params) => params,
			Err(e) => return Err(self.reject(e)),
		};

		let outcome = self
			.transport
			.deliver(&params, self.user_agent(), options.wait_for_response)
			.await;

		if let Some(err) = &outcome.error {
			warn!(hit_type = %hit_type, error = %err, written = outcome.written, "hit delivery failed");
		}
		if options.log {
			self.record_delivery(&outcome);
		}
		Ok(outcome)
	}

	fn reject(&self, err: CoreError) -> TrackerError {
		warn!(error = %err, "hit not sent");
		self.diagnostics.record(&format!("hit not sent: {err}"));
		err.into()
	}

	fn record_delivery(&self, outcome: &DeliveryOutcome) {
		let mut line = format!("tracking post:\n{}", outcome.request);
		if let Some(response) = outcome.response.as_deref().filter(|r| !r.is_empty()) {
			line.push_str("\n\nResponse:\n");
			line.push_str(&String::from_utf8_lossy(response));
		}
		if let Some(err) = &outcome.error {
			line.push_str(&format!("\n\nError: {err}"));
		}
		self.diagnostics.record(&line);
	}
}
