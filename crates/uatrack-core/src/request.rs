// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Read-only view of the inbound request that triggered a hit.
//!
//! The tracker never reaches into process-global state. Hosts pass the
//! current request in through [`RequestContext`]; [`RequestInfo`] is a plain
//! owned implementation suitable for most web frameworks and for tests.

/// Name of the first-party cookie carrying the browser client ID.
pub const CLIENT_ID_COOKIE: &str = "_ga";

/// The parts of the current request the tracker reads.
pub trait RequestContext: Send + Sync {
	/// Whether the request arrived over TLS.
	fn is_secure(&self) -> bool;

	/// Server host name.
	fn host(&self) -> &str;

	/// Server port, if known.
	fn port(&self) -> Option<u16>;

	/// Path and query of the request, e.g. `/cart?step=2`.
	fn request_uri(&self) -> &str;

	/// The inbound `Referer` header.
	fn referrer(&self) -> Option<&str>;

	/// Looks up an inbound cookie by name.
	fn cookie(&self, name: &str) -> Option<&str>;

	/// The inbound `User-Agent` header.
	fn user_agent(&self) -> Option<&str> {
		None
	}

	/// Reconstructs the URL of the current page.
	///
	/// The port is included only when it differs from the scheme default.
	fn current_url(&self) -> String {
		let (scheme, default_port) = if self.is_secure() {
			("https", 443)
		} else {
			("http", 80)
		};
		let port = match self.port() {
			Some(port) if port != default_port => format!(":{port}"),
			_ => String::new(),
		};
		format!("{scheme}://{}{port}{}", self.host(), self.request_uri())
	}

	/// Extracts the client ID from the `_ga` cookie.
	///
	/// The cookie has the form `GA1.<depth>.<cid1>.<cid2>`; the client ID is
	/// `<cid1>.<cid2>`. Cookies with fewer than four segments are ignored.
	fn cookie_client_id(&self) -> Option<String> {
		let cookie = self.cookie(CLIENT_ID_COOKIE)?;
		let mut segments = cookie.splitn(4, '.');
		let (_version, _depth) = (segments.next()?, segments.next()?);
		let (cid1, cid2) = (segments.next()?, segments.next()?);
		Some(format!("{cid1}.{cid2}"))
	}
}

/// An owned snapshot of the current request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestInfo {
	pub secure: bool,
	pub host: String,
	pub port: Option<u16>,
	pub request_uri: String,
	pub referrer: Option<String>,
	pub user_agent: Option<String>,
	pub cookies: Vec<(String, String)>,
}

impl Default for RequestInfo {
	fn default() -> Self {
		Self::new("localhost", "/")
	}
}

impl RequestInfo {
	/// Creates a plain-HTTP request for `host` and `request_uri`.
	pub fn new(host: impl Into<String>, request_uri: impl Into<String>) -> Self {
		Self {
			secure: false,
			host: host.into(),
			port: None,
			request_uri: request_uri.into(),
			referrer: None,
			user_agent: None,
			cookies: Vec::new(),
		}
	}

	pub fn with_secure(mut self, secure: bool) -> Self {
		self.secure = secure;
		self
	}

	pub fn with_port(mut self, port: u16) -> Self {
		self.port = Some(port);
		self
	}

	pub fn with_referrer(mut self, referrer: impl Into<String>) -> Self {
		self.referrer = Some(referrer.into());
		self
	}

	pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
		self.user_agent = Some(user_agent.into());
		self
	}

	/// Adds an inbound cookie. Later cookies with the same name shadow earlier ones.
	pub fn with_cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		self.cookies.push((name.into(), value.into()));
		self
	}
}

impl RequestContext for RequestInfo {
	fn is_secure(&self) -> bool {
		self.secure
	}

	fn host(&self) -> &str {
		&self.host
	}

	fn port(&self) -> Option<u16> {
		self.port
	}

	fn request_uri(&self) -> &str {
		&self.request_uri
	}

	fn referrer(&self) -> Option<&str> {
		self.referrer.as_deref()
	}

	fn cookie(&self, name: &str) -> Option<&str> {
		self
			.cookies
			.iter()
			.rev()
			.find(|(k, _)| k == name)
			.map(|(_, v)| v.as_str())
	}

	fn user_agent(&self) -> Option<&str> {
		self.user_agent.as_deref()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_current_url_omits_default_ports() {
		let plain = RequestInfo::new("example.com", "/shop").with_port(80);
		assert_eq!(plain.current_url(), "http://example.com/shop");

		let tls = RequestInfo::new("example.com", "/shop").with_secure(true).with_port(443);
		assert_eq!(tls.current_url(), "https://example.com/shop");
	}

	#[test]
	fn test_current_url_keeps_non_default_port_and_query() {
		let req = RequestInfo::new("example.com", "/cart?step=2").with_port(8080);
		assert_eq!(req.current_url(), "http://example.com:8080/cart?step=2");

		let tls = RequestInfo::new("example.com", "/").with_secure(true).with_port(80);
		assert_eq!(tls.current_url(), "https://example.com:80/");
	}

	#[test]
	fn test_default_request_is_localhost_root() {
		assert_eq!(RequestInfo::default().current_url(), "http://localhost/");
	}

	#[test]
	fn test_cookie_client_id_uses_last_two_segments() {
		let req = RequestInfo::default().with_cookie("_ga", "GA1.2.1234567890.1500000000");
		assert_eq!(
			req.cookie_client_id().as_deref(),
			Some("1234567890.1500000000")
		);
	}

	#[test]
	fn test_cookie_client_id_keeps_trailing_dots_in_last_segment() {
		let req = RequestInfo::default().with_cookie("_ga", "GA1.2.111.222.333");
		assert_eq!(req.cookie_client_id().as_deref(), Some("111.222.333"));
	}

	#[test]
	fn test_malformed_cookie_is_ignored() {
		let req = RequestInfo::default().with_cookie("_ga", "GA1.2.111");
		assert_eq!(req.cookie_client_id(), None);
		assert_eq!(RequestInfo::default().cookie_client_id(), None);
	}

	#[test]
	fn test_later_cookie_shadows_earlier() {
		let req = RequestInfo::default()
			.with_cookie("_ga", "GA1.2.1.1")
			.with_cookie("_ga", "GA1.2.9.9");
		assert_eq!(req.cookie("_ga"), Some("GA1.2.9.9"));
	}
}
