//! Coordinating client assembled from narrow component interfaces.
//!
//! One [`Client`] owns one in-memory [`SessionDescriptor`] plus the
//! injected transport, signer, extractor, and (optionally) challenge
//! capability. Scheduling is synchronous per instance; callers wanting
//! parallelism run independent instances, each with its own
//! descriptor. The store root may be shared, with the documented
//! last-write-wins caveat.

use std::path::PathBuf;

use tracing::{debug, info};

use crate::challenge::{ChallengeContext, ChallengeCoordinator, ChallengeProvider, DeliveryChoice};
use crate::cookie::{CookieSet, ESSENTIAL_COOKIES};
use crate::descriptor::SessionDescriptor;
use crate::error::{Error, Result};
use crate::executor::{
	HttpTransport, PassthroughSigner, RequestExecutor, RetryPolicy, Signer, Transport,
};
use crate::identity::{
	self, AccountFields, JsonAccountExtractor, ObjectExtractor, SessionIdentity,
};
use crate::store::{IndexRecord, SessionStore};

/// Builder wiring the component interfaces into a [`Client`].
///
/// Every collaborator has a documented default; nothing is read from
/// process-wide state.
pub struct ClientBuilder {
	transport: Option<Box<dyn Transport>>,
	signer: Box<dyn Signer>,
	extractor: Box<dyn ObjectExtractor>,
	challenge_provider: Option<Box<dyn ChallengeProvider>>,
	store_root: Option<PathBuf>,
	policy: RetryPolicy,
	forward_all_cookies: bool,
}

impl Default for ClientBuilder {
	fn default() -> Self {
		Self {
			transport: None,
			signer: Box::new(PassthroughSigner),
			extractor: Box::new(JsonAccountExtractor),
			challenge_provider: None,
			store_root: None,
			policy: RetryPolicy::default(),
			forward_all_cookies: true,
		}
	}
}

impl ClientBuilder {
	pub fn transport(mut self, transport: Box<dyn Transport>) -> Self {
		self.transport = Some(transport);
		self
	}

	pub fn signer(mut self, signer: Box<dyn Signer>) -> Self {
		self.signer = signer;
		self
	}

	pub fn extractor(mut self, extractor: Box<dyn ObjectExtractor>) -> Self {
		self.extractor = extractor;
		self
	}

	pub fn challenge_provider(mut self, provider: Box<dyn ChallengeProvider>) -> Self {
		self.challenge_provider = Some(provider);
		self
	}

	/// Store root for session persistence; defaults to
	/// [`SessionStore::default_root`].
	pub fn store_root(mut self, root: impl Into<PathBuf>) -> Self {
		self.store_root = Some(root.into());
		self
	}

	pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
		self.policy = policy;
		self
	}

	/// When disabled, only [`ESSENTIAL_COOKIES`] from ingested
	/// credential material are forwarded on requests.
	pub fn forward_all_cookies(mut self, forward: bool) -> Self {
		self.forward_all_cookies = forward;
		self
	}

	pub fn build(self) -> Result<Client> {
		let transport = match self.transport {
			Some(transport) => transport,
			None => Box::new(HttpTransport::new()?),
		};
		Ok(Client {
			executor: RequestExecutor::new(transport, self.signer).with_policy(self.policy),
			extractor: self.extractor,
			challenge_provider: self.challenge_provider,
			store: SessionStore::resolve(self.store_root),
			descriptor: None,
			forward_all_cookies: self.forward_all_cookies,
		})
	}
}

/// Session lifecycle client: ingestion, validation, persistence.
pub struct Client {
	executor: RequestExecutor,
	extractor: Box<dyn ObjectExtractor>,
	challenge_provider: Option<Box<dyn ChallengeProvider>>,
	store: SessionStore,
	descriptor: Option<SessionDescriptor>,
	forward_all_cookies: bool,
}

impl Client {
	pub fn builder() -> ClientBuilder {
		ClientBuilder::default()
	}

	/// Establishes a session from raw browser credential material and
	/// validates it with one read-only round trip.
	pub async fn login_by_cookie(&mut self, raw: &str) -> Result<AccountFields> {
		let mut cookies = CookieSet::parse(raw)?;
		if !self.forward_all_cookies {
			cookies = cookies.filter_essential(&ESSENTIAL_COOKIES);
		}
		let identity = SessionIdentity::from_cookie_set(&cookies)?;
		self.install_identity(identity);
		self.validate_session().await
	}

	/// Establishes a session from a bare session token.
	pub async fn login_by_token(&mut self, session_token: &str) -> Result<AccountFields> {
		let identity = SessionIdentity::from_token(session_token)?;
		self.install_identity(identity);
		self.validate_session().await
	}

	/// Authenticated read of the current account. Requires an
	/// established session.
	pub async fn account_info(&mut self) -> Result<AccountFields> {
		self.validate_session().await
	}

	/// Persists the active descriptor. Returns the state file path.
	pub fn save_session(&mut self) -> Result<PathBuf> {
		let descriptor = self.descriptor.as_ref().ok_or(Error::IdentityIncomplete)?;
		let path = self.store.save(descriptor)?;
		self.executor.clear_dirty();
		Ok(path)
	}

	/// Restores a persisted session by username, user id, or raw
	/// credential text. Bypasses re-validation by design; the next
	/// request surfaces a dead session as a classified auth failure.
	pub fn restore_session(&mut self, identifier: &str) -> Result<()> {
		let descriptor = self.store.load(identifier)?;
		info!(
			target: "ig.session",
			username = descriptor.username.as_deref().unwrap_or(""),
			user_id = descriptor.user_id.as_deref().unwrap_or(""),
			"restored persisted session"
		);
		self.descriptor = Some(descriptor);
		self.executor.clear_dirty();
		Ok(())
	}

	/// All persisted sessions, one record per account.
	pub fn list_sessions(&self) -> Vec<IndexRecord> {
		self.store.list()
	}

	/// Active descriptor, when a session is established.
	pub fn descriptor(&self) -> Option<&SessionDescriptor> {
		self.descriptor.as_ref()
	}

	/// True when a fingerprint migration has not been persisted yet.
	pub fn descriptor_dirty(&self) -> bool {
		self.executor.descriptor_dirty()
	}

	pub fn username(&self) -> Option<&str> {
		self.descriptor.as_ref().and_then(|d| d.username.as_deref())
	}

	pub fn user_id(&self) -> Option<&str> {
		self.descriptor.as_ref().and_then(|d| d.user_id.as_deref())
	}

	fn install_identity(&mut self, identity: SessionIdentity) {
		self.descriptor = Some(SessionDescriptor::from_identity(&identity));
		self.executor.clear_dirty();
	}

	/// Runs the validation round trip, escalating one challenge into
	/// the coordinator when a provider is configured, then resuming
	/// the identity-resolution path.
	async fn validate_session(&mut self) -> Result<AccountFields> {
		match self.try_validate().await {
			Ok(fields) => Ok(fields),
			Err(Error::ChallengeRequired { api_path }) => {
				let Some(provider) = self.challenge_provider.as_deref() else {
					return Err(Error::ChallengeRequired { api_path });
				};
				let Some(api_path) = api_path else {
					debug!(target: "ig.challenge", "challenge without api_path; cannot escalate");
					return Err(Error::ChallengeRequired { api_path: None });
				};

				let descriptor = self.descriptor.as_mut().ok_or(Error::IdentityIncomplete)?;
				let context = ChallengeContext {
					username: descriptor
						.username
						.clone()
						.or_else(|| descriptor.user_id.clone())
						.unwrap_or_default(),
					api_path,
					choice: DeliveryChoice::Email,
				};
				ChallengeCoordinator::resolve(
					&mut self.executor,
					descriptor,
					&context,
					provider,
				)
				.await?;

				self.try_validate().await
			}
			Err(err) => Err(err),
		}
	}

	async fn try_validate(&mut self) -> Result<AccountFields> {
		let descriptor = self.descriptor.as_mut().ok_or(Error::IdentityIncomplete)?;
		identity::validate(&mut self.executor, descriptor, self.extractor.as_ref()).await
	}
}

#[cfg(test)]
mod tests {
	use std::collections::HashMap;

	use tempfile::TempDir;

	use super::*;
	use crate::executor::{FakeTransport, ResponseParts};

	const COOKIE_TEXT: &str =
		"csrftoken=a; sessionid=312488908%3Axxx%3A27%3Ayyyyyyyyyyyy; mid=m1; ds_user_id=312488908";

	fn current_user_response() -> ResponseParts {
		ResponseParts {
			status: 200,
			headers: HashMap::new(),
			body: r#"{"status": "ok", "user": {"pk": 312488908, "username": "alice"}}"#.to_string(),
		}
	}

	fn client(fake: &FakeTransport, root: &TempDir) -> Client {
		Client::builder()
			.transport(Box::new(fake.clone()))
			.store_root(root.path())
			.build()
			.unwrap()
	}

	#[tokio::test]
	async fn login_by_cookie_validates_and_learns_username() {
		let fake = FakeTransport::new();
		fake.push_response(current_user_response());
		let root = TempDir::new().unwrap();
		let mut client = client(&fake, &root);

		let account = client.login_by_cookie(COOKIE_TEXT).await.unwrap();

		assert_eq!(account.user_id, "312488908");
		assert_eq!(client.username(), Some("alice"));
		assert_eq!(client.user_id(), Some("312488908"));

		let sent = fake.sent();
		assert_eq!(sent.len(), 1);
		assert!(sent[0].url.contains("accounts/current_user/"));
	}

	#[tokio::test]
	async fn server_reported_user_id_wins_over_cookie_derived() {
		let fake = FakeTransport::new();
		fake.push_response(ResponseParts {
			status: 200,
			headers: HashMap::new(),
			body: r#"{"status": "ok", "user": {"pk": 424242, "username": "alice"}}"#.to_string(),
		});
		let root = TempDir::new().unwrap();
		let mut client = client(&fake, &root);

		let account = client.login_by_cookie(COOKIE_TEXT).await.unwrap();

		assert_eq!(account.user_id, "424242");
		assert_eq!(client.user_id(), Some("424242"));
	}

	#[tokio::test]
	async fn login_failures_propagate_classified_kinds() {
		let fake = FakeTransport::new();
		fake.push_response(ResponseParts {
			status: 400,
			headers: HashMap::new(),
			body: r#"{"status": "fail", "message": "login_required"}"#.to_string(),
		});
		let root = TempDir::new().unwrap();
		let mut client = client(&fake, &root);

		let err = client.login_by_cookie(COOKIE_TEXT).await.unwrap_err();
		assert!(matches!(err, Error::LoginRequired));
	}

	#[tokio::test]
	async fn save_and_restore_round_trip_without_revalidation() {
		let fake = FakeTransport::new();
		fake.push_response(current_user_response());
		let root = TempDir::new().unwrap();
		let mut client = client(&fake, &root);

		client.login_by_cookie(COOKIE_TEXT).await.unwrap();
		client.save_session().unwrap();

		let mut restored = Client::builder()
			.transport(Box::new(FakeTransport::new()))
			.store_root(root.path())
			.build()
			.unwrap();
		restored.restore_session("alice").unwrap();

		// No network call happened on restore.
		assert_eq!(restored.username(), Some("alice"));
		assert_eq!(restored.user_id(), Some("312488908"));
	}

	#[tokio::test]
	async fn challenge_is_escalated_and_resolution_resumes_validation() {
		struct FixedCode;

		#[async_trait::async_trait]
		impl ChallengeProvider for FixedCode {
			async fn code(&self, _username: &str, _choice: DeliveryChoice) -> Result<String> {
				Ok("123456".to_string())
			}
		}

		let fake = FakeTransport::new();
		fake.push_response(ResponseParts {
			status: 400,
			headers: HashMap::new(),
			body: r#"{"status": "fail", "message": "challenge_required", "challenge": {"api_path": "/challenge/312488908/AbCdEf/"}}"#
				.to_string(),
		});
		fake.push_response(ResponseParts {
			status: 200,
			headers: HashMap::new(),
			body: r#"{"status": "ok"}"#.to_string(),
		}); // channel selection
		fake.push_response(ResponseParts {
			status: 200,
			headers: HashMap::new(),
			body: r#"{"status": "ok"}"#.to_string(),
		}); // code submission
		fake.push_response(current_user_response()); // resumed validation

		let root = TempDir::new().unwrap();
		let mut client = Client::builder()
			.transport(Box::new(fake.clone()))
			.challenge_provider(Box::new(FixedCode))
			.store_root(root.path())
			.build()
			.unwrap();

		let account = client.login_by_cookie(COOKIE_TEXT).await.unwrap();
		assert_eq!(account.username.as_deref(), Some("alice"));
		assert_eq!(fake.sent_count(), 4);
	}

	#[tokio::test]
	async fn challenge_without_provider_surfaces_to_caller() {
		let fake = FakeTransport::new();
		fake.push_response(ResponseParts {
			status: 400,
			headers: HashMap::new(),
			body: r#"{"status": "fail", "message": "challenge_required"}"#.to_string(),
		});
		let root = TempDir::new().unwrap();
		let mut client = client(&fake, &root);

		let err = client.login_by_cookie(COOKIE_TEXT).await.unwrap_err();
		assert!(matches!(err, Error::ChallengeRequired { .. }));
		assert_eq!(fake.sent_count(), 1);
	}

	#[tokio::test]
	async fn essential_cookie_filtering_drops_extras() {
		let fake = FakeTransport::new();
		fake.push_response(current_user_response());
		let root = TempDir::new().unwrap();
		let mut client = Client::builder()
			.transport(Box::new(fake.clone()))
			.store_root(root.path())
			.forward_all_cookies(false)
			.build()
			.unwrap();

		let raw = format!("{COOKIE_TEXT}; tracking_junk=1");
		client.login_by_cookie(&raw).await.unwrap();

		let cookie_header = fake.sent()[0]
			.headers
			.iter()
			.find(|(name, _)| name == "cookie")
			.map(|(_, value)| value.clone())
			.unwrap();
		assert!(cookie_header.contains("sessionid="));
		assert!(!cookie_header.contains("tracking_junk"));
	}
}
