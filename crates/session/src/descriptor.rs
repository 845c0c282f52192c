//! Persisted session descriptor schema and helpers.
//!
//! A descriptor is everything needed to replay an authenticated
//! session without re-login: identity, cookies, device fingerprint,
//! and auth header configuration. It is replaced wholesale on every
//! fingerprint migration and every save, never partially patched.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::cookie::CookieSet;
use crate::identity::SessionIdentity;

/// Bumped when the persisted descriptor shape changes.
pub const SESSION_DESCRIPTOR_SCHEMA_VERSION: u32 = 1;

/// User agent presented when impersonating the mobile app.
pub const DEFAULT_USER_AGENT: &str =
	"Instagram 269.0.0.18.75 Android (26/8.0.0; 480dpi; 1080x1920; OnePlus; ONEPLUS A3003; OnePlus3; qcom; en_US; 314665256)";

/// Server-assigned identifiers correlating requests to one simulated
/// device. A mismatch with the expected client signature triggers
/// elevated verification, so these migrate in place when the server
/// reassigns them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceFingerprint {
	/// Machine id (`mid` cookie / `x-mid` header value).
	#[serde(default)]
	pub machine_id: Option<String>,
	#[serde(default)]
	pub android_device_id: Option<String>,
	#[serde(default)]
	pub phone_id: Option<String>,
	#[serde(default)]
	pub client_uuid: Option<String>,
	#[serde(default)]
	pub user_agent: Option<String>,
}

/// Auth header configuration replayed on every request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthHeaders {
	/// Bearer-style authorization header value, when issued.
	#[serde(default)]
	pub authorization: Option<String>,
	#[serde(default)]
	pub www_claim: Option<String>,
}

/// Persisted bundle of identity, fingerprint, and header configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDescriptor {
	pub schema_version: u32,
	#[serde(default)]
	pub user_id: Option<String>,
	#[serde(default)]
	pub username: Option<String>,
	#[serde(default)]
	pub session_token: Option<String>,
	/// Full cookie set forwarded on requests (includes `sessionid`).
	#[serde(default)]
	pub cookies: CookieSet,
	#[serde(default)]
	pub fingerprint: DeviceFingerprint,
	#[serde(default)]
	pub auth_headers: AuthHeaders,
	/// Unix timestamp of the last persist.
	#[serde(default)]
	pub saved_at: u64,
}

impl SessionDescriptor {
	/// Builds a fresh descriptor from a derived identity.
	///
	/// The machine id seeds from the `mid` cookie when present; the
	/// server may reassign it on the first round trip.
	pub fn from_identity(identity: &SessionIdentity) -> Self {
		Self {
			schema_version: SESSION_DESCRIPTOR_SCHEMA_VERSION,
			user_id: Some(identity.user_id.clone()),
			username: identity.username.clone(),
			session_token: Some(identity.session_token.clone()),
			cookies: identity.auxiliary_cookies.clone(),
			fingerprint: DeviceFingerprint {
				machine_id: identity.auxiliary_cookies.get("mid").map(str::to_string),
				user_agent: Some(DEFAULT_USER_AGENT.to_string()),
				..DeviceFingerprint::default()
			},
			auth_headers: AuthHeaders::default(),
			saved_at: 0,
		}
	}

	/// Effective user agent for outgoing requests.
	pub fn user_agent(&self) -> &str {
		self.fingerprint.user_agent.as_deref().unwrap_or(DEFAULT_USER_AGENT)
	}
}

impl Default for SessionDescriptor {
	fn default() -> Self {
		Self {
			schema_version: SESSION_DESCRIPTOR_SCHEMA_VERSION,
			user_id: None,
			username: None,
			session_token: None,
			cookies: CookieSet::new(),
			fingerprint: DeviceFingerprint::default(),
			auth_headers: AuthHeaders::default(),
			saved_at: 0,
		}
	}
}

/// Current unix timestamp in seconds.
pub fn now_ts() -> u64 {
	SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.unwrap_or_default()
		.as_secs()
}
