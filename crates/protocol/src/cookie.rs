//! Browser cookie-export record shape.

use serde::{Deserialize, Serialize};

/// One record from a browser cookie export (DevTools, EditThisCookie).
///
/// Exports carry many more fields (`domain`, `expirationDate`,
/// `hostOnly`, ...); only `name` and `value` matter for session
/// ingestion and the rest are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrowserCookie {
	#[serde(default)]
	pub name: String,
	#[serde(default)]
	pub value: String,
}
