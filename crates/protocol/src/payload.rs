//! Response envelope and account payload shapes.
//!
//! Every private-API response carries a `status` discriminator plus an
//! endpoint-specific payload. Failure envelopes additionally carry a
//! `message`/`error_type` pair and, for verification gates, a challenge
//! or two-factor block. Only the fields the session layer branches on
//! are modeled; everything else is ignored on deserialization.

use serde::{Deserialize, Serialize};

/// Top-level `status` discriminator present on every response body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiStatus {
	#[default]
	Ok,
	Fail,
}

/// Failure-classification subset of a response body.
///
/// Deserializes from both success and failure envelopes; absent fields
/// default so a bare `{"status": "ok"}` round-trips.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiEnvelope {
	#[serde(default)]
	pub status: ApiStatus,
	#[serde(default)]
	pub message: Option<String>,
	#[serde(default)]
	pub error_type: Option<String>,
	#[serde(default)]
	pub challenge: Option<ChallengePayload>,
	#[serde(default)]
	pub two_factor_info: Option<TwoFactorInfo>,
}

/// Challenge block attached to `challenge_required` failures.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChallengePayload {
	/// Relative endpoint the client must drive the challenge flow against.
	#[serde(default)]
	pub api_path: Option<String>,
	#[serde(default)]
	pub url: Option<String>,
}

/// Two-factor block attached to `two_factor_required` failures.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TwoFactorInfo {
	#[serde(default)]
	pub two_factor_identifier: Option<String>,
}

/// `user` object returned by account read endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct AccountPayload {
	/// Numeric account primary key.
	pub pk: u64,
	pub username: String,
	#[serde(default)]
	pub full_name: Option<String>,
}

/// Envelope for `accounts/current_user/` style responses.
#[derive(Debug, Clone, Deserialize)]
pub struct CurrentUserPayload {
	pub user: AccountPayload,
}
