//! Device fingerprint migration from response headers.
//!
//! Credential material exported from a desktop browser paired with a
//! simulated mobile-app signature is a fingerprint mismatch; the
//! server answers by reassigning identifiers through `ig-set-*`
//! response headers. Every subsequent request must carry the new
//! values or risk repeated escalation into challenges.

use std::collections::HashMap;

use crate::descriptor::SessionDescriptor;

/// Response header reassigning the machine id.
pub const MACHINE_ID_HEADER: &str = "ig-set-x-mid";

/// Response header reassigning the authorization header value.
pub const AUTHORIZATION_HEADER: &str = "ig-set-authorization";

/// Applies server-issued fingerprint reassignments to a descriptor.
///
/// Pure and side-effect free. Returns `Some` with a wholesale-replaced
/// descriptor when any signal changed a field, `None` when nothing
/// changed, so callers can cheaply decide whether to re-persist.
/// Header names are expected lowercase (the transport normalizes).
///
/// Idempotent: the `unmigrated -> migrated` transition fires once per
/// distinct signal value; repeating an identical signal is a no-op.
pub fn on_response(
	headers: &HashMap<String, String>,
	descriptor: &SessionDescriptor,
) -> Option<SessionDescriptor> {
	let mut migrated = descriptor.clone();
	let mut changed = false;

	if let Some(mid) = non_empty(headers.get(MACHINE_ID_HEADER)) {
		if migrated.fingerprint.machine_id.as_deref() != Some(mid) {
			migrated.fingerprint.machine_id = Some(mid.to_string());
			migrated.cookies.insert("mid", mid.to_string());
			changed = true;
		}
	}

	if let Some(authorization) = non_empty(headers.get(AUTHORIZATION_HEADER)) {
		if migrated.auth_headers.authorization.as_deref() != Some(authorization) {
			migrated.auth_headers.authorization = Some(authorization.to_string());
			changed = true;
		}
	}

	changed.then_some(migrated)
}

fn non_empty(value: Option<&String>) -> Option<&str> {
	value.map(String::as_str).filter(|v| !v.is_empty())
}
