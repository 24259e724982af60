//! Per-class result caches.
//!
//! One [`ResultCache`] exists per rule class of every document. An entry per
//! flat index is either absent ("not yet checked"), present and empty
//! ("checked, no matches"), or a match vector. The distinction between
//! absent and empty drives the background worker's hole scan: every
//! paragraph of a live document eventually gets an entry in every class.

use galley_primitives::{ChangedRange, CheckMatch};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// Index of the sentence-level cache; served synchronously.
pub const CACHE_SENTENCE: usize = 0;
/// First text-level cache class; classes are ordered by window size.
pub const CACHE_TEXT_FIRST: usize = 1;
/// The AI detection cache.
pub const CACHE_AI: usize = 4;
/// The AI suggestion (rewrite) cache.
pub const CACHE_AI_SUGGESTION: usize = 5;
/// Total number of cache classes per document.
pub const CACHE_COUNT: usize = 6;

/// Match vectors per flat paragraph for one rule class.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultCache {
	entries: FxHashMap<usize, Vec<CheckMatch>>,
}

impl ResultCache {
	pub fn new() -> Self {
		Self::default()
	}

	/// The matches recorded for a paragraph; `None` means unchecked.
	pub fn get(&self, flat_index: usize) -> Option<&[CheckMatch]> {
		self.entries.get(&flat_index).map(Vec::as_slice)
	}

	pub fn has(&self, flat_index: usize) -> bool {
		self.entries.contains_key(&flat_index)
	}

	/// Records the check result for a paragraph. An empty vector marks the
	/// paragraph as checked and clean.
	pub fn put(&mut self, flat_index: usize, matches: Vec<CheckMatch>) {
		self.entries.insert(flat_index, matches);
	}

	/// Drops the entry so the paragraph counts as unchecked again. Returns
	/// true when an entry existed.
	pub fn remove(&mut self, flat_index: usize) -> bool {
		self.entries.remove(&flat_index).is_some()
	}

	/// Removes every match of one rule, returning the affected paragraph
	/// indices. Entries stay present (possibly empty): the paragraphs were
	/// checked, just no longer flagged.
	pub fn remove_rule(&mut self, rule_id: &str) -> Vec<usize> {
		let mut affected = Vec::new();
		for (&index, matches) in &mut self.entries {
			let before = matches.len();
			matches.retain(|m| m.rule_id != rule_id);
			if matches.len() != before {
				affected.push(index);
			}
		}
		affected.sort_unstable();
		affected
	}

	pub fn clear(&mut self) {
		self.entries.clear();
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	/// First index in `0..paragraph_count` without an entry.
	pub fn first_missing(&self, paragraph_count: usize) -> Option<usize> {
		(0..paragraph_count).find(|i| !self.entries.contains_key(i))
	}

	/// Translates entries across a structural edit. Entries below the
	/// change keep their index, entries inside the replaced region are
	/// dropped, entries above move by the size delta.
	pub fn shift(&mut self, range: &ChangedRange) {
		if range.delta() == 0 && range.from >= range.to {
			// Pure in-place replacement: the analyzer invalidates the
			// affected rows itself.
			return;
		}
		let entries = std::mem::take(&mut self.entries);
		self.entries = entries
			.into_iter()
			.filter_map(|(index, matches)| range.translate(index).map(|i| (i, matches)))
			.collect();
	}
}

#[cfg(test)]
mod tests {
	use galley_primitives::MatchFlags;

	use super::*;

	fn single(rule: &str) -> Vec<CheckMatch> {
		vec![CheckMatch::new(3, 2, rule)]
	}

	#[test]
	fn absent_empty_and_filled_are_distinct() {
		let mut cache = ResultCache::new();
		assert!(cache.get(0).is_none());

		cache.put(0, Vec::new());
		assert_eq!(cache.get(0), Some(&[][..]));
		assert!(cache.has(0));

		cache.put(1, single("R1"));
		assert_eq!(cache.get(1).map(<[CheckMatch]>::len), Some(1));
	}

	#[test]
	fn first_missing_skips_checked_paragraphs() {
		let mut cache = ResultCache::new();
		cache.put(0, Vec::new());
		cache.put(2, Vec::new());
		assert_eq!(cache.first_missing(4), Some(1));
		cache.put(1, Vec::new());
		assert_eq!(cache.first_missing(4), Some(3));
		cache.put(3, Vec::new());
		assert_eq!(cache.first_missing(4), None);
	}

	#[test]
	fn remove_rule_reports_affected_rows() {
		let mut cache = ResultCache::new();
		cache.put(0, single("KEEP"));
		cache.put(3, single("DROP"));
		cache.put(7, vec![CheckMatch::new(0, 1, "DROP"), CheckMatch::new(4, 1, "KEEP")]);

		let affected = cache.remove_rule("DROP");
		assert_eq!(affected, vec![3, 7]);
		assert_eq!(cache.get(3), Some(&[][..]));
		assert_eq!(cache.get(7).map(<[CheckMatch]>::len), Some(1));
		assert_eq!(cache.get(0).map(<[CheckMatch]>::len), Some(1));
	}

	#[test]
	fn shift_deletion_moves_suffix_down() {
		// Two paragraphs, the first deleted: the entry for paragraph 1
		// becomes entry 0.
		let mut cache = ResultCache::new();
		cache.put(0, single("A"));
		cache.put(1, single("B"));
		cache.shift(&ChangedRange {
			from: 0,
			to: 0,
			old_size: 2,
			new_size: 1,
		});
		assert_eq!(cache.get(0).map(|m| m[0].rule_id.as_str()), Some("B"));
		assert!(cache.get(1).is_none());
	}

	#[test]
	fn shift_insertion_moves_suffix_up() {
		let mut cache = ResultCache::new();
		cache.put(0, Vec::new());
		cache.put(1, single("X").into_iter().map(|m| m.with_flags(MatchFlags::STYLE)).collect());
		cache.shift(&ChangedRange {
			from: 1,
			to: 2,
			old_size: 2,
			new_size: 3,
		});
		assert!(cache.has(0));
		assert!(!cache.has(1));
		assert!(cache.get(2).is_some_and(|m| m[0].flags == MatchFlags::STYLE));
	}
}

#[cfg(test)]
mod properties {
	use proptest::prelude::*;

	use super::*;

	proptest! {
		// Shifting preserves entries outside the replaced region, content
		// included, translated by the delta above it.
		#[test]
		fn shift_preserves_outside_entries(
			indices in proptest::collection::btree_set(0usize..30, 0..10),
			from in 0usize..10,
			removed in 0usize..5,
			inserted in 0usize..5,
		) {
			let old_size = 30usize;
			let new_size = old_size - removed + inserted;
			let to = from + inserted;
			let range = ChangedRange { from, to, old_size, new_size };

			let mut cache = ResultCache::new();
			for &i in &indices {
				cache.put(i, vec![CheckMatch::new(i, 1, "R")]);
			}
			cache.shift(&range);

			for &i in &indices {
				if i < from {
					prop_assert!(cache.get(i).is_some_and(|m| m[0].start == i));
				} else if i >= range.old_to() {
					let shifted = (i as isize + range.delta()) as usize;
					prop_assert!(cache.get(shifted).is_some_and(|m| m[0].start == i));
				}
			}
		}
	}
}
