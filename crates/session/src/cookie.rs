//! Cookie ingestion: normalizing browser-exported credential material.
//!
//! Accepts either free-form `;`-delimited `k=v` text (possibly
//! multi-line, quoted, octal-escaped) or a JSON array of browser
//! export records, and produces a clean name/value set. Batch files
//! holding one export per line parse into one set per account.
//! Individually malformed fragments are skipped best-effort; only
//! total failure is reported.

use std::collections::HashMap;

use ig_protocol::BrowserCookie;

use crate::error::{Error, Result};

/// Cookie names sufficient for authentication when the caller opts out
/// of forwarding every exported cookie.
pub const ESSENTIAL_COOKIES: [&str; 8] = [
	"sessionid", "mid", "csrftoken", "ds_user_id", "ig_did", "datr", "wd", "rur",
];

/// Normalized cookie name/value mapping.
///
/// Keys are unique; on a name collision the later entry wins. Insertion
/// order is irrelevant.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct CookieSet {
	entries: HashMap<String, String>,
}

impl CookieSet {
	/// Creates an empty set.
	pub fn new() -> Self {
		Self::default()
	}

	/// Parses raw credential material into a normalized set.
	///
	/// Input is either `;`/newline-delimited `k=v` text or a JSON array
	/// of `{name, value, ...}` records (extra fields ignored).
	pub fn parse(raw: &str) -> Result<Self> {
		let trimmed = raw.trim();
		if trimmed.is_empty() {
			return Err(Error::EmptyInput);
		}
		if trimmed.starts_with('[') {
			return Self::parse_browser_export(trimmed);
		}
		Self::parse_pairs(trimmed)
	}

	fn parse_pairs(raw: &str) -> Result<Self> {
		let mut entries = HashMap::new();
		let mut fragments = 0usize;

		for fragment in raw.split([';', '\n']) {
			let fragment = fragment.trim();
			if fragment.is_empty() {
				continue;
			}
			fragments += 1;

			let Some((name, value)) = fragment.split_once('=') else {
				tracing::debug!(target: "ig.session", fragment, "skipping cookie fragment without separator");
				continue;
			};
			let name = name.trim();
			if name.is_empty() {
				continue;
			}
			let value = decode_octal_escapes(strip_quotes(value.trim()));
			entries.insert(name.to_string(), value);
		}

		if entries.is_empty() {
			if fragments == 0 {
				return Err(Error::EmptyInput);
			}
			return Err(Error::MalformedEntry);
		}
		Ok(Self { entries })
	}

	/// Parses a batch input holding one cookie export per non-empty
	/// line (typically one browser JSON array per line, one account
	/// each).
	///
	/// Unparseable lines are skipped with a warning; the batch fails
	/// only when no line yields a set.
	pub fn parse_batch(raw: &str) -> Result<Vec<Self>> {
		let lines = batch_lines(raw);
		if lines.is_empty() {
			return Err(Error::EmptyInput);
		}

		let mut sets = Vec::new();
		for (number, line) in lines.iter().enumerate() {
			match Self::parse(line) {
				Ok(set) => sets.push(set),
				Err(err) => {
					tracing::warn!(
						target: "ig.session",
						line = number + 1,
						error = %err,
						"skipping unparseable batch line"
					);
				}
			}
		}

		if sets.is_empty() {
			return Err(Error::MalformedEntry);
		}
		Ok(sets)
	}

	/// Parses one line of a batch input, selected by 1-indexed position
	/// among the non-empty lines.
	pub fn parse_batch_line(raw: &str, line_number: usize) -> Result<Self> {
		let lines = batch_lines(raw);
		if lines.is_empty() {
			return Err(Error::EmptyInput);
		}
		if line_number < 1 || line_number > lines.len() {
			return Err(Error::LineOutOfRange {
				line: line_number,
				total: lines.len(),
			});
		}
		Self::parse(lines[line_number - 1])
	}

	fn parse_browser_export(raw: &str) -> Result<Self> {
		let records: Vec<BrowserCookie> =
			serde_json::from_str(raw).map_err(|_| Error::MalformedEntry)?;
		if records.is_empty() {
			return Err(Error::EmptyInput);
		}

		let mut entries = HashMap::new();
		for record in records {
			let name = record.name.trim();
			let value = record.value.trim();
			if name.is_empty() || value.is_empty() {
				continue;
			}
			entries.insert(name.to_string(), decode_octal_escapes(strip_quotes(value)));
		}

		if entries.is_empty() {
			return Err(Error::MalformedEntry);
		}
		Ok(Self { entries })
	}

	/// Returns a set restricted to `keys`.
	pub fn filter_essential(&self, keys: &[&str]) -> Self {
		let entries = self
			.entries
			.iter()
			.filter(|(name, _)| keys.contains(&name.as_str()))
			.map(|(name, value)| (name.clone(), value.clone()))
			.collect();
		Self { entries }
	}

	/// Serializes back to `k=v; k=v` form with deterministic key order.
	pub fn serialize(&self) -> String {
		let mut names: Vec<&String> = self.entries.keys().collect();
		names.sort();
		names
			.into_iter()
			.map(|name| format!("{}={}", name, self.entries[name]))
			.collect::<Vec<_>>()
			.join("; ")
	}

	pub fn get(&self, name: &str) -> Option<&str> {
		self.entries.get(name).map(String::as_str)
	}

	pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
		self.entries.insert(name.into(), value.into());
	}

	pub fn contains(&self, name: &str) -> bool {
		self.entries.contains_key(name)
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
		self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
	}
}

/// Non-empty trimmed lines of a batch input, in file order.
fn batch_lines(raw: &str) -> Vec<&str> {
	raw.lines().map(str::trim).filter(|line| !line.is_empty()).collect()
}

/// Strips one layer of surrounding double quotes.
fn strip_quotes(value: &str) -> &str {
	if value.len() >= 2 && value.starts_with('"') && value.ends_with('"') {
		&value[1..value.len() - 1]
	} else {
		value
	}
}

/// Decodes `\NNN` octal escape triplets to their literal byte.
///
/// Browser exports of `Set-Cookie` values encode reserved characters
/// this way (`\054` is `,`). Triplets outside valid octal pass through
/// unchanged.
fn decode_octal_escapes(value: &str) -> String {
	let bytes = value.as_bytes();
	let mut out = Vec::with_capacity(bytes.len());
	let mut i = 0;
	while i < bytes.len() {
		if bytes[i] == b'\\' && i + 4 <= bytes.len() {
			let triplet = &bytes[i + 1..i + 4];
			if triplet.iter().all(|b| (b'0'..=b'7').contains(b)) {
				let decoded = (triplet[0] - b'0') as u16 * 64
					+ (triplet[1] - b'0') as u16 * 8
					+ (triplet[2] - b'0') as u16;
				if decoded <= u8::MAX as u16 {
					out.push(decoded as u8);
					i += 4;
					continue;
				}
			}
		}
		out.push(bytes[i]);
		i += 1;
	}
	String::from_utf8_lossy(&out).into_owned()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_semicolon_delimited_pairs() {
		let set = CookieSet::parse("csrftoken=a; sessionid=xyz; mid=m1").unwrap();
		assert_eq!(set.len(), 3);
		assert_eq!(set.get("csrftoken"), Some("a"));
		assert_eq!(set.get("sessionid"), Some("xyz"));
	}

	#[test]
	fn parses_multiline_padded_input() {
		let set = CookieSet::parse("  csrftoken=a \n sessionid=xyz ;\n mid=m1  ").unwrap();
		assert_eq!(set.len(), 3);
		assert_eq!(set.get("mid"), Some("m1"));
	}

	#[test]
	fn later_entry_wins_on_name_collision() {
		let set = CookieSet::parse("mid=first; mid=second").unwrap();
		assert_eq!(set.get("mid"), Some("second"));
		assert_eq!(set.len(), 1);
	}

	#[test]
	fn strips_one_quote_layer_and_keeps_percent_encoding() {
		let set = CookieSet::parse(r#"sessionid="123%3Axxx""#).unwrap();
		assert_eq!(set.get("sessionid"), Some("123%3Axxx"));
	}

	#[test]
	fn decodes_octal_escapes() {
		let set = CookieSet::parse(r#"rur="VLL\054123\0541798178884""#).unwrap();
		assert_eq!(set.get("rur"), Some("VLL,123,1798178884"));
	}

	#[test]
	fn invalid_octal_triplet_passes_through() {
		let set = CookieSet::parse(r"k=a\09z").unwrap();
		assert_eq!(set.get("k"), Some(r"a\09z"));
	}

	#[test]
	fn empty_input_is_rejected() {
		assert!(matches!(CookieSet::parse("   \n "), Err(Error::EmptyInput)));
		assert!(matches!(CookieSet::parse(" ; ;; "), Err(Error::EmptyInput)));
	}

	#[test]
	fn all_malformed_fragments_fail_but_partial_parses_succeed() {
		assert!(matches!(
			CookieSet::parse("no-separator; another"),
			Err(Error::MalformedEntry)
		));

		let set = CookieSet::parse("broken-fragment; sessionid=xyz").unwrap();
		assert_eq!(set.len(), 1);
		assert_eq!(set.get("sessionid"), Some("xyz"));
	}

	#[test]
	fn parses_browser_export_json() {
		let raw = r#"[
			{"domain": ".example.test", "name": "sessionid", "value": "123%3Axxx", "expirationDate": 1798244001670},
			{"name": "mid", "value": "yyy"}
		]"#;
		let set = CookieSet::parse(raw).unwrap();
		assert_eq!(set.len(), 2);
		assert_eq!(set.get("sessionid"), Some("123%3Axxx"));
		assert_eq!(set.get("mid"), Some("yyy"));
	}

	#[test]
	fn browser_export_with_only_blank_records_is_malformed() {
		let raw = r#"[{"name": "", "value": "x"}, {"name": "y", "value": ""}]"#;
		assert!(matches!(CookieSet::parse(raw), Err(Error::MalformedEntry)));
	}

	#[test]
	fn empty_browser_export_is_empty_input() {
		assert!(matches!(CookieSet::parse("[]"), Err(Error::EmptyInput)));
	}

	const BATCH: &str = r#"
		[{"name": "sessionid", "value": "111%3Aaaa"}, {"name": "mid", "value": "m1"}]

		[{"name": "sessionid", "value": "222%3Abbb"}]
		[{"name": "sessionid", "value": "333%3Accc"}]
	"#;

	#[test]
	fn batch_parses_one_set_per_nonempty_line() {
		let sets = CookieSet::parse_batch(BATCH).unwrap();
		assert_eq!(sets.len(), 3);
		assert_eq!(sets[0].get("sessionid"), Some("111%3Aaaa"));
		assert_eq!(sets[0].get("mid"), Some("m1"));
		assert_eq!(sets[2].get("sessionid"), Some("333%3Accc"));
	}

	#[test]
	fn batch_line_selection_is_one_indexed_over_nonempty_lines() {
		let set = CookieSet::parse_batch_line(BATCH, 2).unwrap();
		assert_eq!(set.get("sessionid"), Some("222%3Abbb"));
	}

	#[test]
	fn batch_line_out_of_range_is_rejected() {
		assert!(matches!(
			CookieSet::parse_batch_line(BATCH, 4),
			Err(Error::LineOutOfRange { line: 4, total: 3 })
		));
		assert!(matches!(
			CookieSet::parse_batch_line(BATCH, 0),
			Err(Error::LineOutOfRange { line: 0, total: 3 })
		));
	}

	#[test]
	fn batch_skips_unparseable_lines_best_effort() {
		let raw = "not json and no separator\n[{\"name\": \"sessionid\", \"value\": \"x\"}]";
		let sets = CookieSet::parse_batch(raw).unwrap();
		assert_eq!(sets.len(), 1);
		assert_eq!(sets[0].get("sessionid"), Some("x"));
	}

	#[test]
	fn batch_with_no_parseable_line_fails() {
		assert!(matches!(CookieSet::parse_batch("  \n \n"), Err(Error::EmptyInput)));
		assert!(matches!(
			CookieSet::parse_batch("garbage\n[broken"),
			Err(Error::MalformedEntry)
		));
	}

	#[test]
	fn filter_essential_restricts_to_requested_keys() {
		let set = CookieSet::parse("sessionid=xyz; mid=m1; tracking_junk=1").unwrap();
		let essential = set.filter_essential(&ESSENTIAL_COOKIES);
		assert_eq!(essential.len(), 2);
		assert!(essential.contains("sessionid"));
		assert!(!essential.contains("tracking_junk"));
	}

	#[test]
	fn serialize_parse_round_trip_preserves_mapping() {
		let set = CookieSet::parse("csrftoken=a; sessionid=xyz; mid=m1; wd=850x788").unwrap();
		let reparsed = CookieSet::parse(&set.serialize()).unwrap();
		assert_eq!(set, reparsed);
	}
}
