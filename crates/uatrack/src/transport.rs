// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Single-shot HTTP delivery over a raw connection.
//!
//! Each delivery opens one connection, writes one form-encoded POST and,
//! unless a response was requested, closes the connection straight away
//! without reading anything. The connection is closed exactly once on every
//! path that opened it.

use std::fmt;
use std::io;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, trace, warn};
use uatrack_core::WireParams;
use url::form_urlencoded::byte_serialize;
use url::Url;

use crate::error::{TrackerError, TransportError};

/// Port used when the endpoint URL carries none.
pub const DEFAULT_PORT: u16 = 80;

const READ_CHUNK: usize = 4096;

/// An open, bidirectional connection to the collection endpoint.
#[async_trait]
pub trait Connection: Send {
	async fn write_all(&mut self, buf: &[u8]) -> io::Result<()>;

	/// Reads until the peer closes, appending to `buf` as data arrives.
	async fn read_to_end(&mut self, buf: &mut Vec<u8>) -> io::Result<usize>;

	/// Releases the connection.
	async fn close(self: Box<Self>);
}

/// Opens connections.
#[async_trait]
pub trait Connector: Send + Sync {
	async fn connect(&self, host: &str, port: u16) -> io::Result<Box<dyn Connection>>;
}

/// Plain TCP connector backed by tokio.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpConnector;

#[async_trait]
impl Connector for TcpConnector {
	async fn connect(&self, host: &str, port: u16) -> io::Result<Box<dyn Connection>> {
		let stream = TcpStream::connect((host, port)).await?;
		stream.set_nodelay(true)?;
		Ok(Box::new(TcpConnection { stream }))
	}
}

struct TcpConnection {
	stream: TcpStream,
}

#[async_trait]
impl Connection for TcpConnection {
	async fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
		self.stream.write_all(buf).await?;
		self.stream.flush().await
	}

	async fn read_to_end(&mut self, buf: &mut Vec<u8>) -> io::Result<usize> {
		let mut chunk = [0u8; READ_CHUNK];
		let mut total = 0;
		loop {
			let n = self.stream.read(&mut chunk).await?;
			if n == 0 {
				return Ok(total);
			}
			buf.extend_from_slice(&chunk[..n]);
			total += n;
		}
	}

	async fn close(self: Box<Self>) {
		let mut stream = self.stream;
		if let Err(e) = stream.shutdown().await {
			trace!(error = %e, "connection shutdown failed");
		}
	}
}

/// The collection endpoint, resolved into connection parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
	pub host: String,
	pub port: u16,
	pub path: String,
}

impl Endpoint {
	pub fn parse(raw: &str) -> Result<Self, TrackerError> {
		let url = Url::parse(raw).map_err(|e| TrackerError::InvalidEndpoint(format!("{raw}: {e}")))?;
		let host = url
			.host_str()
			.filter(|h| !h.is_empty())
			.ok_or_else(|| TrackerError::InvalidEndpoint(format!("{raw}: missing host")))?
			.to_string();
		let mut path = url.path().to_string();
		if path.is_empty() {
			path.push('/');
		}
		if let Some(query) = url.query() {
			path.push('?');
			path.push_str(query);
		}

		Ok(Self {
			host,
			port: url.port().unwrap_or(DEFAULT_PORT),
			path,
		})
	}

	/// Host to connect to. IPv6 literals lose the brackets kept for `Host`.
	pub fn connect_host(&self) -> &str {
		self.host
			.strip_prefix('[')
			.and_then(|h| h.strip_suffix(']'))
			.unwrap_or(&self.host)
	}
}

impl FromStr for Endpoint {
	type Err = TrackerError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Endpoint::parse(s)
	}
}

impl fmt::Display for Endpoint {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}:{}", self.host, self.port)
	}
}

/// What happened to one delivery attempt.
#[derive(Debug)]
pub struct DeliveryOutcome {
	/// A connection was established.
	pub connected: bool,
	/// The full request was written.
	pub written: bool,
	/// The raw request text, as built for the wire.
	pub request: String,
	/// Response bytes, when a response was requested. May be partial if
	/// `error` is set.
	pub response: Option<Vec<u8>>,
	pub error: Option<TransportError>,
}

impl DeliveryOutcome {
	/// True once the request has been fully written, whatever happened to
	/// the response afterwards.
	pub fn is_delivered(&self) -> bool {
		self.written
	}

	/// Converts to a result that fails only when the hit never reached the
	/// wire. Response read failures are not errors here.
	pub fn into_result(self) -> Result<Option<Vec<u8>>, TransportError> {
		match self.error {
			Some(err) if !self.written => Err(err),
			_ => Ok(self.response),
		}
	}
}

/// Delivers assembled hits to one endpoint.
#[derive(Clone)]
pub struct Transport {
	connector: Arc<dyn Connector>,
	endpoint: Endpoint,
	connect_timeout: Duration,
	read_timeout: Duration,
}

impl fmt::Debug for Transport {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Transport")
			.field("endpoint", &self.endpoint)
			.field("connect_timeout", &self.connect_timeout)
			.field("read_timeout", &self.read_timeout)
			.finish_non_exhaustive()
	}
}

impl Transport {
	pub fn new(
		connector: Arc<dyn Connector>,
		endpoint: Endpoint,
		connect_timeout: Duration,
		read_timeout: Duration,
	) -> Self {
		Self {
			connector,
			endpoint,
			connect_timeout,
			read_timeout,
		}
	}

	pub fn endpoint(&self) -> &Endpoint {
		&self.endpoint
	}

	/// Builds the raw request for `body`.
	pub fn build_request(&self, body: &str, user_agent: Option<&str>) -> String {
		let mut request = format!(
			"POST {} HTTP/1.1\r\nHost: {}\r\n",
			self.endpoint.path, self.endpoint.host
		);
		match user_agent {
			Some(user_agent) if is_header_safe(user_agent) => {
				request.push_str(&format!("User-Agent: {user_agent}\r\n"));
			}
			Some(_) => warn!("user agent contains control characters, header omitted"),
			None => {}
		}
		request.push_str("Content-Type: application/x-www-form-urlencoded\r\n");
		request.push_str(&format!("Content-Length: {}\r\n", body.len()));
		request.push_str("Connection: close\r\n\r\n");
		request.push_str(body);
		request
	}

	/// Sends `params` as one POST.
	///
	/// With `wait_for_response` unset nothing is read from the connection.
	/// Otherwise the response is read until the peer closes or the read
	/// timeout expires.
	pub async fn deliver(
		&self,
		params: &WireParams,
		user_agent: Option<&str>,
		wait_for_response: bool,
	) -> DeliveryOutcome {
		let body = encode_body(params);
		let request = self.build_request(&body, user_agent);
		let mut outcome = DeliveryOutcome {
			connected: false,
			written: false,
			request,
			response: None,
			error: None,
		};

		let connect = self
			.connector
			.connect(self.endpoint.connect_host(), self.endpoint.port);
		let mut conn = match tokio::time::timeout(self.connect_timeout, connect).await {
			Ok(Ok(conn)) => conn,
			Ok(Err(source)) => {
				outcome.error = Some(TransportError::ConnectionFailed {
					endpoint: self.endpoint.to_string(),
					source,
				});
				return outcome;
			}
			Err(_) => {
				outcome.error = Some(TransportError::ConnectTimeout {
					endpoint: self.endpoint.to_string(),
					timeout: self.connect_timeout,
				});
				return outcome;
			}
		};
		outcome.connected = true;
		debug!(endpoint = %self.endpoint, body_len = body.len(), "connected, writing hit");

		let write = conn.write_all(outcome.request.as_bytes()).await;
		match write {
			Ok(()) => {
				outcome.written = true;
				if wait_for_response {
					let mut response = Vec::new();
					match tokio::time::timeout(self.read_timeout, conn.read_to_end(&mut response)).await {
						Ok(Ok(n)) => trace!(bytes = n, "response read"),
						Ok(Err(e)) => outcome.error = Some(TransportError::ResponseReadFailed(e)),
						Err(_) => outcome.error = Some(TransportError::ResponseTimeout(self.read_timeout)),
					}
					outcome.response = Some(response);
				}
			}
			Err(e) => outcome.error = Some(TransportError::WriteFailed(e)),
		}

		conn.close().await;
		outcome
	}
}

/// Header values must not carry CR, LF or other control characters.
fn is_header_safe(value: &str) -> bool {
	!value.chars().any(|c| c.is_control() && c != '\t')
}

/// Serializes `params` as an `application/x-www-form-urlencoded` body.
///
/// Parameters whose value is empty are left out entirely.
pub fn encode_body(params: &WireParams) -> String {
	params
		.iter()
		.filter(|(_, value)| !value.is_empty())
		.map(|(key, value)| {
			let value = value.to_string();
			format!("{key}={}", byte_serialize(value.as_bytes()).collect::<String>())
		})
		.collect::<Vec<_>>()
		.join("&")
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;
	use std::sync::atomic::{AtomicUsize, Ordering};
	use std::sync::Mutex;

	#[derive(Default)]
	struct Script {
		refuse_connect: bool,
		hang_connect: bool,
		fail_write: bool,
		fail_read: bool,
		hang_read: bool,
		response: Vec<u8>,
	}

	#[derive(Default)]
	struct MockConnector {
		script: Script,
		connects: AtomicUsize,
		closes: Arc<AtomicUsize>,
		reads: Arc<AtomicUsize>,
		written: Arc<Mutex<Vec<u8>>>,
		hosts: Mutex<Vec<String>>,
	}

	impl MockConnector {
		fn with(script: Script) -> Arc<Self> {
			Arc::new(Self {
				script,
				..Default::default()
			})
		}

		fn closes(&self) -> usize {
			self.closes.load(Ordering::SeqCst)
		}

		fn written(&self) -> String {
			String::from_utf8(self.written.lock().unwrap().clone()).unwrap()
		}
	}

	struct MockConnection {
		fail_write: bool,
		fail_read: bool,
		hang_read: bool,
		response: Vec<u8>,
		closes: Arc<AtomicUsize>,
		reads: Arc<AtomicUsize>,
		written: Arc<Mutex<Vec<u8>>>,
	}

	#[async_trait]
	impl Connection for MockConnection {
		async fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
			if self.fail_write {
				return Err(io::Error::from(io::ErrorKind::BrokenPipe));
			}
			self.written.lock().unwrap().extend_from_slice(buf);
			Ok(())
		}

		async fn read_to_end(&mut self, buf: &mut Vec<u8>) -> io::Result<usize> {
			self.reads.fetch_add(1, Ordering::SeqCst);
			if self.hang_read {
				buf.extend_from_slice(b"HTTP/1.1 200");
				std::future::pending::<()>().await;
			}
			if self.fail_read {
				buf.extend_from_slice(b"HTTP/1.1");
				return Err(io::Error::from(io::ErrorKind::ConnectionReset));
			}
			buf.extend_from_slice(&self.response);
			Ok(self.response.len())
		}

		async fn close(self: Box<Self>) {
			self.closes.fetch_add(1, Ordering::SeqCst);
		}
	}

	#[async_trait]
	impl Connector for MockConnector {
		async fn connect(&self, host: &str, _port: u16) -> io::Result<Box<dyn Connection>> {
			self.connects.fetch_add(1, Ordering::SeqCst);
			self.hosts.lock().unwrap().push(host.to_string());
			if self.script.hang_connect {
				std::future::pending::<()>().await;
			}
			if self.script.refuse_connect {
				return Err(io::Error::from(io::ErrorKind::ConnectionRefused));
			}
			Ok(Box::new(MockConnection {
				fail_write: self.script.fail_write,
				fail_read: self.script.fail_read,
				hang_read: self.script.hang_read,
				response: self.script.response.clone(),
				closes: self.closes.clone(),
				reads: self.reads.clone(),
				written: self.written.clone(),
			}))
		}
	}

	fn transport(connector: Arc<MockConnector>) -> Transport {
		Transport::new(
			connector,
			Endpoint::parse("http://collect.example.com/collect").unwrap(),
			Duration::from_secs(30),
			Duration::from_secs(30),
		)
	}

	fn sample_params() -> WireParams {
		let mut params = WireParams::new();
		params.set("t", "event");
		params.set("v", 1);
		params.set("ec", "test events");
		params.set("el", "(test)");
		params
	}

	#[test]
	fn test_endpoint_defaults_to_port_80() {
		let endpoint = Endpoint::parse("https://www.google-analytics.com/collect").unwrap();
		assert_eq!(endpoint.host, "www.google-analytics.com");
		assert_eq!(endpoint.port, 80);
		assert_eq!(endpoint.path, "/collect");
	}

	#[test]
	fn test_endpoint_keeps_explicit_port_and_query() {
		let endpoint: Endpoint = "http://127.0.0.1:8080/debug/collect?x=1".parse().unwrap();
		assert_eq!(endpoint.port, 8080);
		assert_eq!(endpoint.path, "/debug/collect?x=1");
		assert_eq!(endpoint.to_string(), "127.0.0.1:8080");
	}

	#[test]
	fn test_endpoint_ipv6_literal_connects_without_brackets() {
		let endpoint = Endpoint::parse("http://[::1]:8080/collect").unwrap();
		assert_eq!(endpoint.host, "[::1]");
		assert_eq!(endpoint.connect_host(), "::1");
		assert_eq!(endpoint.to_string(), "[::1]:8080");

		let named = Endpoint::parse("http://collect.example.com/collect").unwrap();
		assert_eq!(named.connect_host(), "collect.example.com");
	}

	#[test]
	fn test_endpoint_rejects_garbage() {
		assert!(matches!(
			Endpoint::parse("not a url"),
			Err(TrackerError::InvalidEndpoint(_))
		));
		assert!(matches!(
			Endpoint::parse("mailto:someone@example.com"),
			Err(TrackerError::InvalidEndpoint(_))
		));
	}

	#[test]
	fn test_body_is_form_encoded() {
		assert_eq!(
			encode_body(&sample_params()),
			"t=event&v=1&ec=test+events&el=%28test%29"
		);
	}

	#[test]
	fn test_body_omits_empty_values() {
		let mut params = sample_params();
		params.set("uid", "");
		params.set("dr", "https://example.com/?a=b&c=d");
		let body = encode_body(&params);
		assert!(!body.contains("uid"));
		assert!(body.ends_with("&dr=https%3A%2F%2Fexample.com%2F%3Fa%3Db%26c%3Dd"));
	}

	#[test]
	fn test_request_layout_without_user_agent() {
		let t = transport(MockConnector::with(Script::default()));
		let request = t.build_request("t=event", None);
		assert_eq!(
			request,
			"POST /collect HTTP/1.1\r\n\
			 Host: collect.example.com\r\n\
			 Content-Type: application/x-www-form-urlencoded\r\n\
			 Content-Length: 7\r\n\
			 Connection: close\r\n\
			 \r\n\
			 t=event"
		);
	}

	#[test]
	fn test_request_includes_user_agent_when_set() {
		let t = transport(MockConnector::with(Script::default()));
		let request = t.build_request("", Some("Mozilla/5.0"));
		assert!(request.contains("\r\nUser-Agent: Mozilla/5.0\r\n"));
		assert!(request.contains("Content-Length: 0\r\n"));
	}

	#[test]
	fn test_user_agent_with_line_breaks_is_omitted() {
		let t = transport(MockConnector::with(Script::default()));
		let request = t.build_request("t=event", Some("x\r\nX-Injected: 1"));
		assert!(!request.contains("User-Agent"));
		assert!(!request.contains("X-Injected"));
		assert!(request.starts_with("POST /collect HTTP/1.1\r\nHost: collect.example.com\r\nContent-Type: "));

		let request = t.build_request("t=event", Some("bot\n"));
		assert!(!request.contains("User-Agent"));
		let request = t.build_request("t=event", Some("Mozilla/5.0\t(X11)"));
		assert!(request.contains("User-Agent: Mozilla/5.0\t(X11)\r\n"));
	}

	#[tokio::test]
	async fn test_ipv6_endpoint_passes_bare_address_to_connector() {
		let connector = MockConnector::with(Script::default());
		let t = Transport::new(
			connector.clone(),
			Endpoint::parse("http://[::1]:8080/collect").unwrap(),
			Duration::from_secs(30),
			Duration::from_secs(30),
		);
		let outcome = t.deliver(&sample_params(), None, false).await;
		assert!(outcome.is_delivered());
		assert_eq!(connector.hosts.lock().unwrap().as_slice(), ["::1".to_string()]);
		assert!(connector.written().contains("\r\nHost: [::1]\r\n"));
	}

	#[tokio::test]
	async fn test_fire_and_forget_writes_and_closes_without_reading() {
		let connector = MockConnector::with(Script::default());
		let outcome = transport(connector.clone())
			.deliver(&sample_params(), None, false)
			.await;

		assert!(outcome.connected && outcome.written);
		assert!(outcome.error.is_none());
		assert!(outcome.response.is_none());
		assert_eq!(connector.reads.load(Ordering::SeqCst), 0);
		assert_eq!(connector.closes(), 1);
		assert!(connector.written().ends_with("\r\n\r\nt=event&v=1&ec=test+events&el=%28test%29"));
	}

	#[tokio::test]
	async fn test_wait_for_response_returns_bytes() {
		let connector = MockConnector::with(Script {
			response: b"HTTP/1.1 200 OK\r\n\r\n".to_vec(),
			..Default::default()
		});
		let outcome = transport(connector.clone())
			.deliver(&sample_params(), Some("ua"), true)
			.await;

		assert!(outcome.is_delivered());
		assert_eq!(outcome.response.as_deref(), Some(&b"HTTP/1.1 200 OK\r\n\r\n"[..]));
		assert_eq!(connector.closes(), 1);
	}

	#[tokio::test]
	async fn test_refused_connection_opens_nothing_to_close() {
		let connector = MockConnector::with(Script {
			refuse_connect: true,
			..Default::default()
		});
		let outcome = transport(connector.clone())
			.deliver(&sample_params(), None, true)
			.await;

		assert!(!outcome.connected && !outcome.written);
		assert!(matches!(
			outcome.error,
			Some(TransportError::ConnectionFailed { .. })
		));
		assert_eq!(connector.closes(), 0);
		assert!(outcome.into_result().is_err());
	}

	#[tokio::test(start_paused = true)]
	async fn test_connect_timeout_is_bounded() {
		let connector = MockConnector::with(Script {
			hang_connect: true,
			..Default::default()
		});
		let outcome = transport(connector.clone())
			.deliver(&sample_params(), None, false)
			.await;

		assert!(matches!(
			outcome.error,
			Some(TransportError::ConnectTimeout { .. })
		));
		assert_eq!(connector.closes(), 0);
	}

	#[tokio::test]
	async fn test_write_failure_still_closes() {
		let connector = MockConnector::with(Script {
			fail_write: true,
			..Default::default()
		});
		let outcome = transport(connector.clone())
			.deliver(&sample_params(), None, true)
			.await;

		assert!(outcome.connected && !outcome.written);
		assert!(matches!(outcome.error, Some(TransportError::WriteFailed(_))));
		assert_eq!(connector.reads.load(Ordering::SeqCst), 0);
		assert_eq!(connector.closes(), 1);
	}

	#[tokio::test]
	async fn test_read_failure_keeps_partial_response_and_closes() {
		let connector = MockConnector::with(Script {
			fail_read: true,
			..Default::default()
		});
		let outcome = transport(connector.clone())
			.deliver(&sample_params(), None, true)
			.await;

		assert!(outcome.is_delivered());
		assert!(matches!(
			outcome.error,
			Some(TransportError::ResponseReadFailed(_))
		));
		assert_eq!(outcome.response.as_deref(), Some(&b"HTTP/1.1"[..]));
		assert_eq!(connector.closes(), 1);
		assert!(outcome.into_result().is_ok());
	}

	#[tokio::test(start_paused = true)]
	async fn test_read_timeout_closes_connection() {
		let connector = MockConnector::with(Script {
			hang_read: true,
			..Default::default()
		});
		let outcome = transport(connector.clone())
			.deliver(&sample_params(), None, true)
			.await;

		assert!(matches!(
			outcome.error,
			Some(TransportError::ResponseTimeout(_))
		));
		assert_eq!(outcome.response.as_deref(), Some(&b"HTTP/1.1 200"[..]));
		assert_eq!(connector.closes(), 1);
	}

	proptest! {
		#[test]
		fn body_never_contains_empty_pairs(
			values in proptest::collection::vec("[a-z &=%]{0,6}", 1..12),
		) {
			let mut params = WireParams::new();
			for (i, value) in values.iter().enumerate() {
				params.set(format!("cd{i}"), value.as_str());
			}
			let body = encode_body(&params);
			for pair in body.split('&').filter(|p| !p.is_empty()) {
				let (_, value) = pair.split_once('=').unwrap();
				prop_assert!(!value.is_empty(), "empty value in {}", body);
			}
			prop_assert!(!body.starts_with('&') && !body.ends_with('&'));
			prop_assert!(!body.contains("&&"));
		}
	}
}
