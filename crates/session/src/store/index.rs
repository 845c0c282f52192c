//! Derived lookup index over session storage slots.
//!
//! The index is a cache: it maps human-facing identifiers (username,
//! user id) to slot directories. Deleting it never corrupts slot data;
//! it repopulates on the next save. Corrupt content self-heals to an
//! empty index rather than surfacing as a distinct fatal error.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::Result;

/// Bumped when the index file shape changes.
pub const INDEX_SCHEMA_VERSION: u32 = 1;

/// Index file name inside the store root.
pub const INDEX_FILE: &str = "index.json";

/// One index entry. A single logical account may be reachable by two
/// keys (username and user id), both pointing at the same slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexRecord {
	#[serde(default)]
	pub username: Option<String>,
	#[serde(default)]
	pub user_id: Option<String>,
	/// Slot directory name under the store root.
	pub storage_slot: String,
	/// Unix timestamp of the save that wrote this entry.
	pub saved_at: u64,
}

/// On-disk format for the index file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexFile {
	pub schema: u32,
	#[serde(default)]
	pub accounts: HashMap<String, IndexRecord>,
}

impl Default for IndexFile {
	fn default() -> Self {
		Self {
			schema: INDEX_SCHEMA_VERSION,
			accounts: HashMap::new(),
		}
	}
}

impl IndexFile {
	/// Loads the index, treating missing or corrupt content as empty.
	pub fn load(path: &Path) -> Self {
		match fs::read_to_string(path) {
			Ok(content) => serde_json::from_str(&content).unwrap_or_else(|err| {
				warn!(
					target: "ig.store",
					path = %path.display(),
					error = %err,
					"corrupt index; starting from empty"
				);
				Self::default()
			}),
			Err(_) => Self::default(),
		}
	}

	/// Writes the whole index back (read-modify-write discipline; no
	/// cross-process locking, last write wins).
	pub fn save(&self, path: &Path) -> Result<()> {
		if let Some(parent) = path.parent() {
			fs::create_dir_all(parent)?;
		}
		let json = serde_json::to_string_pretty(self)?;
		fs::write(path, json)?;
		Ok(())
	}

	pub fn get(&self, key: &str) -> Option<&IndexRecord> {
		self.accounts.get(key)
	}

	pub fn upsert(&mut self, key: impl Into<String>, record: IndexRecord) {
		self.accounts.insert(key.into(), record);
	}

	/// All records deduplicated by storage slot.
	///
	/// Keys are scanned in sorted order so the dedup decision does not
	/// depend on map iteration order; for aliased accounts the record
	/// under the lexicographically smallest key wins.
	pub fn dedup_records(&self) -> Vec<IndexRecord> {
		let mut keys: Vec<&String> = self.accounts.keys().collect();
		keys.sort();

		let mut seen_slots = Vec::new();
		let mut records = Vec::new();
		for key in keys {
			let record = &self.accounts[key];
			if seen_slots.contains(&record.storage_slot) {
				continue;
			}
			seen_slots.push(record.storage_slot.clone());
			records.push(record.clone());
		}
		records
	}
}
