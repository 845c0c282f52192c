//! Bounded-retry secondary verification flow.
//!
//! When the server gates a session behind a challenge, the coordinator
//! selects a delivery channel, obtains a verification code from an
//! injected capability, and submits it. Code mismatches re-invoke the
//! capability up to a small fixed bound; after that the attempt fails
//! permanently and the caller must restart the full resolution
//! sequence.

use async_trait::async_trait;
use tracing::{info, warn};

use crate::descriptor::SessionDescriptor;
use crate::error::{Error, Result};
use crate::executor::{RequestExecutor, RequestSpec};

/// Code submissions per challenge attempt before giving up.
pub const MAX_CODE_ATTEMPTS: u32 = 3;

/// Out-of-band channel the verification code is delivered on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryChoice {
	Sms,
	Email,
}

impl DeliveryChoice {
	/// Wire value for the channel-selection form.
	pub fn as_code(self) -> &'static str {
		match self {
			Self::Sms => "0",
			Self::Email => "1",
		}
	}
}

/// Everything needed to drive one challenge flow.
#[derive(Debug, Clone)]
pub struct ChallengeContext {
	/// Account the challenge is gating; passed to the code capability.
	pub username: String,
	/// Relative endpoint issued by the server for this challenge.
	pub api_path: String,
	pub choice: DeliveryChoice,
}

/// Injected capability returning a verification code for an account
/// and delivery channel. Potentially long-running (a human reading a
/// text message); timeouts are the caller's concern.
#[async_trait]
pub trait ChallengeProvider: Send + Sync {
	async fn code(&self, username: &str, choice: DeliveryChoice) -> Result<String>;
}

/// Drives the select-channel / submit-code loop.
pub struct ChallengeCoordinator;

impl ChallengeCoordinator {
	/// Resolves one challenge. `Ok(())` means the server accepted a
	/// code and the caller may resume identity resolution.
	pub async fn resolve(
		executor: &mut RequestExecutor,
		descriptor: &mut SessionDescriptor,
		context: &ChallengeContext,
		provider: &dyn ChallengeProvider,
	) -> Result<()> {
		info!(
			target: "ig.challenge",
			username = %context.username,
			api_path = %context.api_path,
			"starting challenge resolution"
		);

		let select = RequestSpec::post(&context.api_path).with_form("choice", context.choice.as_code());
		executor.execute(&select, descriptor).await?;

		for attempt in 1..=MAX_CODE_ATTEMPTS {
			let code = provider.code(&context.username, context.choice).await?;
			let submit = RequestSpec::post(&context.api_path).with_form("security_code", code);

			match executor.execute(&submit, descriptor).await {
				Ok(_) => {
					info!(target: "ig.challenge", attempt, "challenge code accepted");
					return Ok(());
				}
				Err(err) if is_code_mismatch(&err) => {
					warn!(target: "ig.challenge", attempt, "challenge code rejected");
				}
				Err(err) => return Err(err),
			}
		}

		Err(Error::ChallengeUnresolved {
			attempts: MAX_CODE_ATTEMPTS,
		})
	}
}

/// A rejected code comes back as a plain bad-request envelope; every
/// other kind aborts the flow.
fn is_code_mismatch(err: &Error) -> bool {
	matches!(err, Error::BadRequest(_))
}

#[cfg(test)]
mod tests {
	use std::collections::HashMap;
	use std::sync::Mutex;

	use super::*;
	use crate::executor::{FakeTransport, PassthroughSigner, ResponseParts};

	struct ScriptedProvider {
		codes: Mutex<Vec<&'static str>>,
	}

	impl ScriptedProvider {
		fn new(codes: Vec<&'static str>) -> Self {
			Self {
				codes: Mutex::new(codes),
			}
		}
	}

	#[async_trait]
	impl ChallengeProvider for ScriptedProvider {
		async fn code(&self, _username: &str, _choice: DeliveryChoice) -> Result<String> {
			let mut codes = self.codes.lock().unwrap();
			if codes.is_empty() {
				return Err(Error::Network("provider exhausted".into()));
			}
			Ok(codes.remove(0).to_string())
		}
	}

	fn ok_response() -> ResponseParts {
		ResponseParts {
			status: 200,
			headers: HashMap::new(),
			body: r#"{"status": "ok"}"#.to_string(),
		}
	}

	fn rejected_code_response() -> ResponseParts {
		ResponseParts {
			status: 400,
			headers: HashMap::new(),
			body: r#"{"status": "fail", "message": "Please check the code we sent you and try again."}"#
				.to_string(),
		}
	}

	fn context() -> ChallengeContext {
		ChallengeContext {
			username: "alice".to_string(),
			api_path: "/challenge/312488908/AbCdEf/".to_string(),
			choice: DeliveryChoice::Email,
		}
	}

	#[tokio::test]
	async fn accepted_code_resolves_challenge() {
		let fake = FakeTransport::new();
		fake.push_response(ok_response()); // channel selection
		fake.push_response(ok_response()); // code submission

		let mut executor = RequestExecutor::new(Box::new(fake.clone()), Box::new(PassthroughSigner));
		let mut descriptor = SessionDescriptor::default();
		let provider = ScriptedProvider::new(vec!["123456"]);

		ChallengeCoordinator::resolve(&mut executor, &mut descriptor, &context(), &provider)
			.await
			.unwrap();

		let sent = fake.sent();
		assert_eq!(sent.len(), 2);
		assert_eq!(sent[1].body.as_deref(), Some("security_code=123456"));
	}

	#[tokio::test]
	async fn mismatched_codes_retry_then_succeed() {
		let fake = FakeTransport::new();
		fake.push_response(ok_response());
		fake.push_response(rejected_code_response());
		fake.push_response(rejected_code_response());
		fake.push_response(ok_response());

		let mut executor = RequestExecutor::new(Box::new(fake.clone()), Box::new(PassthroughSigner));
		let mut descriptor = SessionDescriptor::default();
		let provider = ScriptedProvider::new(vec!["000000", "111111", "123456"]);

		ChallengeCoordinator::resolve(&mut executor, &mut descriptor, &context(), &provider)
			.await
			.unwrap();

		assert_eq!(fake.sent_count(), 4);
	}

	#[tokio::test]
	async fn exhausted_code_budget_fails_permanently() {
		let fake = FakeTransport::new();
		fake.push_response(ok_response());
		for _ in 0..MAX_CODE_ATTEMPTS {
			fake.push_response(rejected_code_response());
		}

		let mut executor = RequestExecutor::new(Box::new(fake.clone()), Box::new(PassthroughSigner));
		let mut descriptor = SessionDescriptor::default();
		let provider = ScriptedProvider::new(vec!["000000", "111111", "222222"]);

		let err = ChallengeCoordinator::resolve(&mut executor, &mut descriptor, &context(), &provider)
			.await
			.unwrap_err();

		assert!(matches!(err, Error::ChallengeUnresolved { attempts: 3 }));
	}

	#[tokio::test]
	async fn non_mismatch_failure_aborts_the_flow() {
		let fake = FakeTransport::new();
		fake.push_response(ok_response());
		fake.push_response(ResponseParts {
			status: 400,
			headers: HashMap::new(),
			body: r#"{"status": "fail", "message": "login_required"}"#.to_string(),
		});

		let mut executor = RequestExecutor::new(Box::new(fake.clone()), Box::new(PassthroughSigner));
		let mut descriptor = SessionDescriptor::default();
		let provider = ScriptedProvider::new(vec!["123456", "654321"]);

		let err = ChallengeCoordinator::resolve(&mut executor, &mut descriptor, &context(), &provider)
			.await
			.unwrap_err();

		assert!(matches!(err, Error::LoginRequired));
		assert_eq!(fake.sent_count(), 2);
	}
}
