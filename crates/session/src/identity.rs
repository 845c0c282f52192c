//! Session identity derivation and validation.
//!
//! A [`SessionIdentity`] is the minimal credential bundle derivable
//! from a cookie set: numeric user id, opaque session token, optional
//! username, and whatever auxiliary cookies came along. Validation is
//! one authenticated read-only round trip that confirms the identity
//! is live and learns the username.

use ig_protocol::CurrentUserPayload;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cookie::CookieSet;
use crate::descriptor::SessionDescriptor;
use crate::error::{Error, Result};
use crate::executor::{RequestExecutor, RequestSpec};

/// Shortest session token the service is known to issue.
pub const MIN_SESSION_TOKEN_LEN: usize = 30;

/// Cookie carrying the session token.
pub const SESSION_ID_COOKIE: &str = "sessionid";

/// Cookie carrying the explicit numeric user id.
pub const USER_ID_COOKIE: &str = "ds_user_id";

/// Minimal validated identity derived from credential material.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionIdentity {
	/// Numeric user id, always derivable (explicit cookie or the
	/// leading digit run of the session token).
	pub user_id: String,
	/// Learned during validation; absent for unvalidated identities.
	pub username: Option<String>,
	/// Opaque session token.
	pub session_token: String,
	/// Remaining cookies from ingestion, forwarded on requests.
	pub auxiliary_cookies: CookieSet,
}

impl SessionIdentity {
	/// Derives an identity from a normalized cookie set.
	pub fn from_cookie_set(cookies: &CookieSet) -> Result<Self> {
		let token = cookies.get(SESSION_ID_COOKIE).ok_or(Error::SessionIdMissing)?;
		if token.len() < MIN_SESSION_TOKEN_LEN {
			return Err(Error::SessionIdTooShort {
				len: token.len(),
				min: MIN_SESSION_TOKEN_LEN,
			});
		}

		let user_id = match cookies.get(USER_ID_COOKIE) {
			Some(explicit) if !explicit.is_empty() && explicit.bytes().all(|b| b.is_ascii_digit()) => {
				explicit.to_string()
			}
			_ => leading_digit_run(token)
				.ok_or(Error::UserIdUnextractable)?
				.to_string(),
		};

		Ok(Self {
			user_id,
			username: None,
			session_token: token.to_string(),
			auxiliary_cookies: cookies.clone(),
		})
	}

	/// Builds an identity from a bare session token.
	pub fn from_token(session_token: &str) -> Result<Self> {
		let mut cookies = CookieSet::new();
		cookies.insert(SESSION_ID_COOKIE, session_token.to_string());
		Self::from_cookie_set(&cookies)
	}
}

/// Confirms a session is live with one authenticated read and learns
/// the username, writing both back into the descriptor.
///
/// The server's reported user id is authoritative: a mismatch with the
/// locally derived id is logged and the server's value adopted.
/// Classified failures propagate unchanged; authentication-shaped
/// kinds are never masked or retried here so the caller can route
/// them into the challenge flow.
pub async fn validate(
	executor: &mut RequestExecutor,
	descriptor: &mut SessionDescriptor,
	extractor: &dyn ObjectExtractor,
) -> Result<AccountFields> {
	let spec = RequestSpec::get("accounts/current_user/").with_query("edit", "true");
	let response = executor.execute(&spec, descriptor).await?;
	let payload = response.json()?;
	let account = extractor.account(&payload)?;

	if let Some(local) = descriptor.user_id.as_deref() {
		if local != account.user_id {
			debug!(
				target: "ig.session",
				cookie_user_id = %local,
				server_user_id = %account.user_id,
				"server reports a different user id; adopting it"
			);
		}
	}
	descriptor.user_id = Some(account.user_id.clone());
	descriptor.username = account.username.clone();

	Ok(account)
}

/// Returns the leading maximal digit run of `token`, if any.
pub fn leading_digit_run(token: &str) -> Option<&str> {
	let end = token
		.as_bytes()
		.iter()
		.position(|b| !b.is_ascii_digit())
		.unwrap_or(token.len());
	if end == 0 { None } else { Some(&token[..end]) }
}

/// Account fields read back from a validation payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountFields {
	pub user_id: String,
	pub username: Option<String>,
}

/// External collaborator converting raw API payloads into the account
/// fields this subsystem consumes. The full domain-object schema is
/// owned elsewhere.
pub trait ObjectExtractor: Send + Sync {
	fn account(&self, payload: &serde_json::Value) -> Result<AccountFields>;
}

/// Default extractor reading the `user` object of account payloads.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonAccountExtractor;

impl ObjectExtractor for JsonAccountExtractor {
	fn account(&self, payload: &serde_json::Value) -> Result<AccountFields> {
		let parsed: CurrentUserPayload = serde_json::from_value(payload.clone())
			.map_err(|err| Error::Network(format!("unrecognized account payload: {err}")))?;
		Ok(AccountFields {
			user_id: parsed.user.pk.to_string(),
			username: Some(parsed.user.username),
		})
	}
}
