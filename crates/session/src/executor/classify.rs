//! Response classification into the closed failure taxonomy.
//!
//! The retry decision operates only on the classified kind, never on
//! raw transport codes, so this is the single place status codes and
//! failure envelopes are interpreted.

use ig_protocol::{ApiEnvelope, ApiStatus};

use crate::error::Error;

use super::transport::ResponseParts;

/// Classifies a response. `None` means success.
pub fn classify(parts: &ResponseParts) -> Option<Error> {
	let envelope: ApiEnvelope = serde_json::from_str(&parts.body).unwrap_or_default();

	if let Some(auth) = classify_envelope(&envelope) {
		return Some(auth);
	}

	match parts.status {
		200..=299 => match envelope.status {
			ApiStatus::Ok => None,
			ApiStatus::Fail => Some(Error::BadRequest(
				envelope.message.unwrap_or_else(|| "request failed".into()),
			)),
		},
		400 => Some(Error::BadRequest(
			envelope.message.unwrap_or_else(|| "bad request".into()),
		)),
		401 => Some(Error::SessionInvalid),
		403 => Some(Error::Forbidden),
		404 => Some(Error::NotFound),
		429 => Some(Error::Throttled),
		status => Some(Error::Network(format!("unexpected status {status}"))),
	}
}

/// Message-driven classification shared by all status codes; the
/// service reports auth gates with 200, 400, and 401 alike.
fn classify_envelope(envelope: &ApiEnvelope) -> Option<Error> {
	if envelope.status == ApiStatus::Ok && envelope.message.is_none() {
		return None;
	}

	match envelope.message.as_deref() {
		Some("login_required") => Some(Error::LoginRequired),
		Some("challenge_required") | Some("checkpoint_challenge_required") => {
			Some(Error::ChallengeRequired {
				api_path: envelope
					.challenge
					.as_ref()
					.and_then(|challenge| challenge.api_path.clone()),
			})
		}
		Some("two_factor_required") => Some(Error::TwoFactorRequired),
		_ => match envelope.error_type.as_deref() {
			Some("invalid_session") | Some("unauthorized") => Some(Error::SessionInvalid),
			Some("rate_limit_error") => Some(Error::Throttled),
			_ => None,
		},
	}
}

#[cfg(test)]
mod tests {
	use std::collections::HashMap;

	use super::*;

	fn response(status: u16, body: &str) -> ResponseParts {
		ResponseParts {
			status,
			headers: HashMap::new(),
			body: body.to_string(),
		}
	}

	#[test]
	fn ok_response_classifies_as_success() {
		assert!(classify(&response(200, r#"{"status": "ok"}"#)).is_none());
		assert!(classify(&response(200, "not json at all")).is_none());
	}

	#[test]
	fn login_required_is_detected_regardless_of_status() {
		for status in [200, 400, 403] {
			let err = classify(&response(status, r#"{"status": "fail", "message": "login_required"}"#));
			assert!(matches!(err, Some(Error::LoginRequired)), "status {status}");
		}
	}

	#[test]
	fn challenge_required_carries_api_path() {
		let body = r#"{
			"status": "fail",
			"message": "challenge_required",
			"challenge": {"api_path": "/challenge/312488908/AbCdEf/"}
		}"#;
		match classify(&response(400, body)) {
			Some(Error::ChallengeRequired { api_path }) => {
				assert_eq!(api_path.as_deref(), Some("/challenge/312488908/AbCdEf/"));
			}
			other => panic!("expected ChallengeRequired, got {other:?}"),
		}
	}

	#[test]
	fn status_codes_map_to_permanent_kinds() {
		assert!(matches!(classify(&response(404, "{}")), Some(Error::NotFound)));
		assert!(matches!(classify(&response(403, "{}")), Some(Error::Forbidden)));
		assert!(matches!(classify(&response(401, "{}")), Some(Error::SessionInvalid)));
		assert!(matches!(classify(&response(400, "{}")), Some(Error::BadRequest(_))));
	}

	#[test]
	fn throttle_and_server_errors_classify_as_transient() {
		assert!(matches!(classify(&response(429, "{}")), Some(Error::Throttled)));
		assert!(matches!(classify(&response(500, "oops")), Some(Error::Network(_))));
		assert!(matches!(classify(&response(503, "{}")), Some(Error::Network(_))));
	}

	#[test]
	fn rate_limit_error_type_classifies_as_throttled() {
		let body = r#"{"status": "fail", "message": "slow down", "error_type": "rate_limit_error"}"#;
		assert!(matches!(classify(&response(200, body)), Some(Error::Throttled)));
	}

	#[test]
	fn two_factor_required_is_detected() {
		let body = r#"{"status": "fail", "message": "two_factor_required", "two_factor_info": {"two_factor_identifier": "abc"}}"#;
		assert!(matches!(classify(&response(400, body)), Some(Error::TwoFactorRequired)));
	}
}
