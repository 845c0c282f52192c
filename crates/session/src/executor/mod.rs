//! Retry/backoff-governed request execution with failure
//! classification.
//!
//! [`RequestExecutor`] wraps a [`Transport`] with a bounded retry
//! budget, exponential backoff, the closed failure taxonomy, and
//! fingerprint migration on every response. It never writes to disk:
//! a migrated descriptor is flagged dirty for the caller to persist.

pub mod classify;
pub mod fake;
pub mod transport;

use std::time::Duration;

use rand::Rng;
use tracing::{debug, info};
use url::Url;

use crate::descriptor::SessionDescriptor;
use crate::error::{Error, Result};
use crate::fingerprint;

pub use classify::classify;
pub use fake::FakeTransport;
pub use transport::{HttpTransport, Method, ResponseParts, Transport, TransportRequest};

/// Base endpoint of the impersonated mobile API.
pub const DEFAULT_BASE_URL: &str = "https://i.instagram.com/api/v1/";

/// External collaborator producing opaque wire-level request
/// signatures. This subsystem never inspects the output.
pub trait Signer: Send + Sync {
	fn sign(&self, body: &str) -> String;
}

/// Signer that forwards bodies unsigned. Placeholder until the caller
/// injects the real implementation.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughSigner;

impl Signer for PassthroughSigner {
	fn sign(&self, body: &str) -> String {
		body.to_string()
	}
}

/// Retry policy applied to every executed call.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
	/// Total attempts including the first (not just retries).
	pub max_attempts: u32,
	/// Delay before the first retry; doubles per subsequent retry.
	pub base_delay: Duration,
	/// Adds up to half of the computed delay when enabled.
	pub jitter: bool,
}

impl Default for RetryPolicy {
	fn default() -> Self {
		Self {
			max_attempts: 3,
			base_delay: Duration::from_millis(500),
			jitter: false,
		}
	}
}

impl RetryPolicy {
	/// Backoff before retrying after `attempt` failed attempts.
	fn delay_after(&self, attempt: u32) -> Duration {
		let exponent = attempt.saturating_sub(1).min(16);
		let mut delay = self.base_delay.saturating_mul(1 << exponent);
		if self.jitter {
			let extra = rand::thread_rng().gen_range(0..=delay.as_millis().max(1) as u64 / 2);
			delay += Duration::from_millis(extra);
		}
		delay
	}
}

/// Declarative request: method, relative path, query, optional form
/// body. Signing and header assembly happen at execution time.
#[derive(Debug, Clone)]
pub struct RequestSpec {
	pub method: Method,
	pub path: String,
	pub query: Vec<(String, String)>,
	pub form: Vec<(String, String)>,
}

impl RequestSpec {
	/// Read-only request for `path` (relative to the API base).
	pub fn get(path: impl Into<String>) -> Self {
		Self {
			method: Method::Get,
			path: path.into(),
			query: Vec::new(),
			form: Vec::new(),
		}
	}

	/// Form-posting request for `path`.
	pub fn post(path: impl Into<String>) -> Self {
		Self {
			method: Method::Post,
			path: path.into(),
			query: Vec::new(),
			form: Vec::new(),
		}
	}

	pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		self.query.push((name.into(), value.into()));
		self
	}

	pub fn with_form(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		self.form.push((name.into(), value.into()));
		self
	}
}

/// Transport wrapper owning retry, classification, and migration.
pub struct RequestExecutor {
	transport: Box<dyn Transport>,
	signer: Box<dyn Signer>,
	policy: RetryPolicy,
	base_url: Url,
	descriptor_dirty: bool,
}

impl RequestExecutor {
	/// Creates an executor with the default policy and base URL.
	pub fn new(transport: Box<dyn Transport>, signer: Box<dyn Signer>) -> Self {
		Self {
			transport,
			signer,
			policy: RetryPolicy::default(),
			base_url: Url::parse(DEFAULT_BASE_URL).expect("default base URL is a valid constant"),
			descriptor_dirty: false,
		}
	}

	pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
		self.policy = policy;
		self
	}

	pub fn with_base_url(mut self, base_url: Url) -> Self {
		self.base_url = base_url;
		self
	}

	/// True when a fingerprint migration changed the descriptor since
	/// the last [`clear_dirty`](Self::clear_dirty); the caller should
	/// re-persist.
	pub fn descriptor_dirty(&self) -> bool {
		self.descriptor_dirty
	}

	pub fn clear_dirty(&mut self) {
		self.descriptor_dirty = false;
	}

	/// Executes a request under the retry budget.
	///
	/// Transient kinds (timeout, throttle, generic network) retry with
	/// exponential backoff up to the attempt budget; everything else
	/// surfaces immediately. Every response runs through fingerprint
	/// migration before classification.
	pub async fn execute(
		&mut self,
		spec: &RequestSpec,
		descriptor: &mut SessionDescriptor,
	) -> Result<ResponseParts> {
		let mut attempt = 0u32;

		loop {
			attempt += 1;
			let request = self.build_request(spec, descriptor)?;
			let outcome: Result<ResponseParts> = match self.transport.send(request).await {
				Ok(parts) => {
					self.apply_migration(&parts, descriptor);
					match classify(&parts) {
						None => return Ok(parts),
						Some(err) => Err(err),
					}
				}
				Err(err) => Err(err),
			};

			let err = outcome.unwrap_err();
			if !err.is_retryable() || attempt >= self.policy.max_attempts {
				return Err(err);
			}

			let delay = self.policy.delay_after(attempt);
			debug!(
				target: "ig.http",
				attempt,
				delay_ms = delay.as_millis() as u64,
				error = %err,
				"transient failure; backing off before retry"
			);
			tokio::time::sleep(delay).await;
		}
	}

	fn build_request(
		&self,
		spec: &RequestSpec,
		descriptor: &SessionDescriptor,
	) -> Result<TransportRequest> {
		let mut url = self
			.base_url
			.join(spec.path.trim_start_matches('/'))
			.map_err(|e| Error::BadRequest(format!("invalid request path `{}`: {e}", spec.path)))?;
		for (name, value) in &spec.query {
			url.query_pairs_mut().append_pair(name, value);
		}

		let mut headers = vec![("user-agent".to_string(), descriptor.user_agent().to_string())];
		if !descriptor.cookies.is_empty() {
			headers.push(("cookie".to_string(), descriptor.cookies.serialize()));
		}
		if let Some(mid) = &descriptor.fingerprint.machine_id {
			headers.push(("x-mid".to_string(), mid.clone()));
		}
		if let Some(authorization) = &descriptor.auth_headers.authorization {
			headers.push(("authorization".to_string(), authorization.clone()));
		}
		if let Some(claim) = &descriptor.auth_headers.www_claim {
			headers.push(("x-ig-www-claim".to_string(), claim.clone()));
		}

		let body = if spec.form.is_empty() {
			None
		} else {
			let encoded = serde_urlencoded_form(&spec.form);
			Some(self.signer.sign(&encoded))
		};

		Ok(TransportRequest {
			method: spec.method,
			url: url.to_string(),
			headers,
			body,
		})
	}

	fn apply_migration(&mut self, parts: &ResponseParts, descriptor: &mut SessionDescriptor) {
		if let Some(migrated) = fingerprint::on_response(&parts.headers, descriptor) {
			info!(
				target: "ig.http",
				machine_id = ?migrated.fingerprint.machine_id,
				"server reassigned device fingerprint; descriptor marked dirty"
			);
			*descriptor = migrated;
			self.descriptor_dirty = true;
		}
	}
}

/// Form-encodes name/value pairs with the url crate's serializer.
fn serde_urlencoded_form(pairs: &[(String, String)]) -> String {
	let mut serializer = url::form_urlencoded::Serializer::new(String::new());
	for (name, value) in pairs {
		serializer.append_pair(name, value);
	}
	serializer.finish()
}
