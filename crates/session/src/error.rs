//! Error taxonomy for the session subsystem.
//!
//! Every failure surfaced to callers is exactly one variant of
//! [`Error`]; callers branch on the variant, never on message text.
//! Retry and challenge-escalation decisions operate on the
//! classification helpers, not on raw transport codes.

use thiserror::Error;

/// Result type alias using the subsystem error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Closed failure taxonomy for session ingestion, persistence, and
/// request execution.
#[derive(Error, Debug)]
pub enum Error {
	// Input failures: bad credential material, never retried.
	/// Cookie input normalized to zero entries.
	#[error("cookie input is empty")]
	EmptyInput,

	/// Cookie input had fragments but none could be parsed.
	#[error("no cookie fragment could be parsed")]
	MalformedEntry,

	/// No `sessionid` cookie in the ingested set.
	#[error("sessionid cookie is missing")]
	SessionIdMissing,

	/// Session token shorter than the minimum plausible length.
	#[error("sessionid is too short ({len} chars, minimum {min})")]
	SessionIdTooShort { len: usize, min: usize },

	/// Requested line does not exist in a batch cookie input.
	#[error("line {line} out of range (input has {total} lines)")]
	LineOutOfRange { line: usize, total: usize },

	/// Neither a `ds_user_id` cookie nor a digit-prefixed token.
	#[error("no numeric user id could be extracted from the session token")]
	UserIdUnextractable,

	/// Descriptor carries neither a username nor a user id.
	#[error("session descriptor has neither username nor user id")]
	IdentityIncomplete,

	// Store failures, never retried.
	/// No usable storage slot name could be created.
	#[error("could not create a storage slot for `{identity}`")]
	SlotCreationFailed { identity: String },

	/// No stored session matched the identifier, or its state file is
	/// missing or unreadable (both collapse here; re-saving heals).
	#[error("no stored session for `{identifier}`")]
	SlotNotFound { identifier: String },

	// Authentication-shaped failures: surfaced immediately so the
	// caller can route into the challenge flow.
	/// Server demands a fresh login.
	#[error("login required")]
	LoginRequired,

	/// Server gates the session behind a verification challenge.
	#[error("challenge required")]
	ChallengeRequired { api_path: Option<String> },

	/// Server demands a two-factor code.
	#[error("two-factor verification required")]
	TwoFactorRequired,

	/// Session token rejected as invalid or expired.
	#[error("session is invalid or expired")]
	SessionInvalid,

	/// Challenge flow exhausted its code-submission budget.
	#[error("challenge unresolved after {attempts} code attempts")]
	ChallengeUnresolved { attempts: u32 },

	// Transient failures, retried under the bounded budget.
	/// Request deadline elapsed.
	#[error("request timed out")]
	Timeout,

	/// Server throttled the request.
	#[error("request throttled by server")]
	Throttled,

	/// Transport-level or otherwise unclassified failure.
	#[error("network error: {0}")]
	Network(String),

	// Permanent client failures, never retried.
	/// Request rejected outright.
	#[error("bad request: {0}")]
	BadRequest(String),

	/// Target resource does not exist.
	#[error("resource not found")]
	NotFound,

	/// Access denied for this account.
	#[error("access forbidden")]
	Forbidden,

	// Ambient passthrough (store-category, never retried).
	/// Filesystem failure outside the slot/index taxonomy.
	#[error("io error: {0}")]
	Io(#[from] std::io::Error),

	/// Descriptor or index (de)serialization failure.
	#[error("json error: {0}")]
	Json(#[from] serde_json::Error),
}

impl Error {
	/// True for kinds the executor may retry under its attempt budget.
	pub fn is_retryable(&self) -> bool {
		matches!(self, Self::Timeout | Self::Throttled | Self::Network(_))
	}

	/// True for authentication-shaped kinds that route into the
	/// challenge flow instead of the retry loop.
	pub fn is_auth_failure(&self) -> bool {
		matches!(
			self,
			Self::LoginRequired
				| Self::ChallengeRequired { .. }
				| Self::TwoFactorRequired
				| Self::SessionInvalid
		)
	}
}
