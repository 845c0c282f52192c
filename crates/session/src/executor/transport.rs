//! Transport seam between the executor and the HTTP stack.
//!
//! The executor talks to a [`Transport`] trait object so tests can
//! substitute an in-memory fake; [`HttpTransport`] is the production
//! implementation. Transports surface only transport-level failures
//! (timeout, connection errors); status-code classification happens in
//! the executor.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{Error, Result};

/// Request timeout applied by the production transport.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP method subset used by the private API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
	Get,
	Post,
}

/// Fully assembled request handed to a transport.
#[derive(Debug, Clone)]
pub struct TransportRequest {
	pub method: Method,
	/// Absolute URL including query string.
	pub url: String,
	pub headers: Vec<(String, String)>,
	/// Form-encoded body for POST requests (already signed).
	pub body: Option<String>,
}

/// Response surface the executor classifies: status, lowercased
/// headers, raw body text.
#[derive(Debug, Clone)]
pub struct ResponseParts {
	pub status: u16,
	pub headers: HashMap<String, String>,
	pub body: String,
}

impl ResponseParts {
	/// Parses the body as JSON.
	pub fn json(&self) -> Result<serde_json::Value> {
		Ok(serde_json::from_str(&self.body)?)
	}
}

/// Pluggable request transport.
#[async_trait]
pub trait Transport: Send + Sync {
	async fn send(&self, request: TransportRequest) -> Result<ResponseParts>;
}

/// Production transport over `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpTransport {
	client: reqwest::Client,
}

impl HttpTransport {
	/// Builds a transport with the default request timeout.
	pub fn new() -> Result<Self> {
		let client = reqwest::Client::builder()
			.timeout(DEFAULT_REQUEST_TIMEOUT)
			.build()
			.map_err(|e| Error::Network(format!("failed to create HTTP client: {e}")))?;
		Ok(Self { client })
	}
}

#[async_trait]
impl Transport for HttpTransport {
	async fn send(&self, request: TransportRequest) -> Result<ResponseParts> {
		let mut builder = match request.method {
			Method::Get => self.client.get(&request.url),
			Method::Post => self.client.post(&request.url),
		};
		for (name, value) in &request.headers {
			builder = builder.header(name, value);
		}
		if let Some(body) = request.body {
			builder = builder
				.header("content-type", "application/x-www-form-urlencoded")
				.body(body);
		}

		let response = builder.send().await.map_err(map_transport_error)?;
		let status = response.status().as_u16();
		let headers = response
			.headers()
			.iter()
			.map(|(name, value)| {
				(
					name.as_str().to_ascii_lowercase(),
					value.to_str().unwrap_or_default().to_string(),
				)
			})
			.collect();
		let body = response.text().await.map_err(map_transport_error)?;

		Ok(ResponseParts { status, headers, body })
	}
}

fn map_transport_error(err: reqwest::Error) -> Error {
	if err.is_timeout() {
		Error::Timeout
	} else {
		Error::Network(err.to_string())
	}
}
