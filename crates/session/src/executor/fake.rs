//! Fake transport for unit testing retry, classification, and
//! fingerprint migration without a network.
//!
//! Scripted: each `send` pops the next queued outcome. The controller
//! half records every request the executor produced so tests can
//! assert on headers, URLs, and attempt counts.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::error::{Error, Result};

use super::transport::{ResponseParts, Transport, TransportRequest};

#[derive(Default)]
struct FakeInner {
	script: Mutex<VecDeque<Result<ResponseParts>>>,
	sent: Mutex<Vec<TransportRequest>>,
}

/// In-memory transport with a scripted response queue.
///
/// Clones share state, so tests keep one handle as a controller while
/// the executor owns another.
#[derive(Clone, Default)]
pub struct FakeTransport {
	inner: Arc<FakeInner>,
}

impl FakeTransport {
	pub fn new() -> Self {
		Self::default()
	}

	/// Queues a successful response.
	pub fn push_response(&self, parts: ResponseParts) {
		self.inner.script.lock().unwrap().push_back(Ok(parts));
	}

	/// Queues a transport-level failure.
	pub fn push_error(&self, error: Error) {
		self.inner.script.lock().unwrap().push_back(Err(error));
	}

	/// Requests observed so far.
	pub fn sent(&self) -> Vec<TransportRequest> {
		self.inner.sent.lock().unwrap().clone()
	}

	/// Number of requests observed so far.
	pub fn sent_count(&self) -> usize {
		self.inner.sent.lock().unwrap().len()
	}
}

#[async_trait]
impl Transport for FakeTransport {
	async fn send(&self, request: TransportRequest) -> Result<ResponseParts> {
		self.inner.sent.lock().unwrap().push(request);
		self.inner
			.script
			.lock()
			.unwrap()
			.pop_front()
			.unwrap_or_else(|| Err(Error::Network("fake transport script exhausted".into())))
	}
}
