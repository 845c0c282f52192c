//! Durable multi-account session persistence with an identifier index.
//!
//! Layout under the store root: `index.json` plus one slot directory
//! per account holding `session.json`. Slot save/load is whole-file
//! overwrite through a write-new-then-rename so readers never observe
//! a truncated state file. There is no cross-process locking: when the
//! root is shared, concurrent writers can lose an index update (last
//! whole-file write wins) and external serialization is the caller's
//! responsibility.

pub mod index;

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::cookie::CookieSet;
use crate::descriptor::{SessionDescriptor, now_ts};
use crate::error::{Error, Result};
use crate::identity::leading_digit_run;

pub use index::{INDEX_FILE, IndexFile, IndexRecord};

/// State file name inside each slot directory.
pub const STATE_FILE: &str = "session.json";

/// Multi-account session store rooted at one directory.
#[derive(Debug, Clone)]
pub struct SessionStore {
	root: PathBuf,
}

impl SessionStore {
	/// Creates a store over `root`. The directory is created lazily on
	/// first save.
	pub fn new(root: impl Into<PathBuf>) -> Self {
		Self { root: root.into() }
	}

	/// Resolves the store root: the explicit argument when given, else
	/// the documented default.
	pub fn resolve(explicit: Option<PathBuf>) -> Self {
		Self::new(explicit.unwrap_or_else(Self::default_root))
	}

	/// Default store root: `<data dir>/ig-session/sessions`, falling
	/// back to a relative `sessions` directory when the platform
	/// exposes no data directory.
	pub fn default_root() -> PathBuf {
		dirs::data_dir()
			.unwrap_or_else(|| PathBuf::from("."))
			.join("ig-session")
			.join("sessions")
	}

	pub fn root(&self) -> &Path {
		&self.root
	}

	/// Persists a descriptor into its slot and upserts the index under
	/// every known key. Returns the state file path.
	///
	/// Slot name preference is `username`; a path-illegal or otherwise
	/// uncreatable username slot falls back to `user_id`. The state
	/// file is a full overwrite; no merge semantics.
	pub fn save(&self, descriptor: &SessionDescriptor) -> Result<PathBuf> {
		let username = non_empty(descriptor.username.as_deref());
		let user_id = non_empty(descriptor.user_id.as_deref());
		if username.is_none() && user_id.is_none() {
			return Err(Error::IdentityIncomplete);
		}

		let slot = self.create_slot(username, user_id)?;
		let slot_dir = self.root.join(&slot);
		let state_path = slot_dir.join(STATE_FILE);

		let mut persisted = descriptor.clone();
		persisted.saved_at = now_ts();
		write_state_file(&state_path, &persisted)?;

		let record = IndexRecord {
			username: username.map(str::to_string),
			user_id: user_id.map(str::to_string),
			storage_slot: slot.clone(),
			saved_at: persisted.saved_at,
		};

		let index_path = self.root.join(INDEX_FILE);
		let mut index = IndexFile::load(&index_path);
		if let Some(name) = username {
			index.upsert(name, record.clone());
		}
		if let Some(id) = user_id {
			index.upsert(id, record.clone());
		}
		index.save(&index_path)?;

		info!(
			target: "ig.store",
			slot = %slot,
			path = %state_path.display(),
			"saved session descriptor"
		);
		Ok(state_path)
	}

	/// Loads a descriptor by username, numeric user id, or raw
	/// credential text containing `sessionid=`.
	///
	/// A missing index key and a missing or unreadable state file both
	/// collapse to [`Error::SlotNotFound`]; the caller may simply
	/// re-save. Stale index entries are left in place (cleanup is
	/// deferred to the next save).
	pub fn load(&self, identifier: &str) -> Result<SessionDescriptor> {
		let key = resolve_lookup_key(identifier)?;
		let index_path = self.root.join(INDEX_FILE);
		let index = IndexFile::load(&index_path);

		let record = index.get(&key).ok_or_else(|| Error::SlotNotFound {
			identifier: identifier.to_string(),
		})?;

		let state_path = self.root.join(&record.storage_slot).join(STATE_FILE);
		let content = fs::read_to_string(&state_path).map_err(|err| {
			debug!(
				target: "ig.store",
				path = %state_path.display(),
				error = %err,
				"slot state file unreadable; reporting slot as absent"
			);
			Error::SlotNotFound {
				identifier: identifier.to_string(),
			}
		})?;

		let descriptor = serde_json::from_str(&content).map_err(|err| {
			warn!(
				target: "ig.store",
				path = %state_path.display(),
				error = %err,
				"slot state file corrupt; reporting slot as absent"
			);
			Error::SlotNotFound {
				identifier: identifier.to_string(),
			}
		})?;

		debug!(target: "ig.store", slot = %record.storage_slot, "restored session descriptor");
		Ok(descriptor)
	}

	/// All saved sessions, one record per storage slot regardless of
	/// how many keys alias it.
	pub fn list(&self) -> Vec<IndexRecord> {
		IndexFile::load(&self.root.join(INDEX_FILE)).dedup_records()
	}

	/// Creates the preferred slot directory, falling back from
	/// username to user id.
	fn create_slot(&self, username: Option<&str>, user_id: Option<&str>) -> Result<String> {
		for candidate in [username, user_id].into_iter().flatten() {
			if !slot_name_usable(candidate) {
				debug!(target: "ig.store", candidate, "slot name unusable; trying fallback");
				continue;
			}
			match fs::create_dir_all(self.root.join(candidate)) {
				Ok(()) => return Ok(candidate.to_string()),
				Err(err) => {
					warn!(
						target: "ig.store",
						candidate,
						error = %err,
						"slot directory creation failed; trying fallback"
					);
				}
			}
		}

		Err(Error::SlotCreationFailed {
			identity: username.or(user_id).unwrap_or_default().to_string(),
		})
	}
}

/// Maps a load identifier to an index key. Raw credential text goes
/// through the same digit-prefix extraction as ingestion.
fn resolve_lookup_key(identifier: &str) -> Result<String> {
	if !identifier.contains("sessionid=") {
		return Ok(identifier.trim().to_string());
	}

	let cookies = CookieSet::parse(identifier)?;
	let token = cookies.get("sessionid").ok_or(Error::SessionIdMissing)?;
	let user_id = leading_digit_run(token).ok_or(Error::UserIdUnextractable)?;
	Ok(user_id.to_string())
}

/// Whether `name` can serve as a slot directory name on this platform.
fn slot_name_usable(name: &str) -> bool {
	!name.is_empty()
		&& name != "."
		&& name != ".."
		&& !name.contains(['/', '\\', ':', '*', '?', '"', '<', '>', '|', '\0'])
}

fn non_empty(value: Option<&str>) -> Option<&str> {
	value.filter(|v| !v.trim().is_empty())
}

/// Full-file overwrite via a sibling temp file and rename, so a crash
/// mid-write cannot leave a truncated state file.
fn write_state_file(path: &Path, descriptor: &SessionDescriptor) -> Result<()> {
	let json = serde_json::to_string_pretty(descriptor)?;
	let tmp = path.with_extension("json.tmp");
	fs::write(&tmp, json)?;
	fs::rename(&tmp, path)?;
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn lookup_key_passes_plain_identifiers_through() {
		assert_eq!(resolve_lookup_key("alice").unwrap(), "alice");
		assert_eq!(resolve_lookup_key("312488908").unwrap(), "312488908");
	}

	#[test]
	fn lookup_key_extracts_user_id_from_credential_text() {
		let key = resolve_lookup_key("mid=m1; sessionid=312488908%3Axxx").unwrap();
		assert_eq!(key, "312488908");
	}

	#[test]
	fn lookup_key_rejects_digitless_credential_text() {
		assert!(matches!(
			resolve_lookup_key("sessionid=xxx%3A123"),
			Err(Error::UserIdUnextractable)
		));
	}

	#[test]
	fn slot_names_with_path_characters_are_unusable() {
		assert!(slot_name_usable("alice"));
		assert!(slot_name_usable("312488908"));
		assert!(!slot_name_usable("a/b"));
		assert!(!slot_name_usable("..\\up"));
		assert!(!slot_name_usable(""));
		assert!(!slot_name_usable(".."));
	}
}
