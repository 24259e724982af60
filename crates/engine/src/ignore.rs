//! Suppressed matches.
//!
//! When the user ignores a match, the suppression must survive both
//! structural edits (via the same shift the result caches use) and full
//! cache rebuilds — ignores are the only per-document state with that
//! requirement. A second, language-carrying list exists for ignores that
//! also have to restore spell-check marks.

use std::collections::BTreeSet;

use galley_primitives::{ChangedRange, Locale};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// An ignore that carries its language, used to restore spelling marks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpellIgnore {
	pub offset: usize,
	pub length: usize,
	pub locale: Locale,
	pub rule_id: String,
}

/// Suppressed matches keyed by flat paragraph, rule, and character offset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IgnoredMatchStore {
	by_rule: FxHashMap<usize, FxHashMap<String, BTreeSet<usize>>>,
	spell: FxHashMap<usize, Vec<SpellIgnore>>,
}

impl IgnoredMatchStore {
	pub fn new() -> Self {
		Self::default()
	}

	/// Suppresses the match of `rule_id` at `offset` in a paragraph.
	pub fn insert(&mut self, flat_index: usize, rule_id: &str, offset: usize) {
		self.by_rule
			.entry(flat_index)
			.or_default()
			.entry(rule_id.to_string())
			.or_default()
			.insert(offset);
	}

	/// Adds a language-carrying ignore.
	pub fn insert_spell(&mut self, flat_index: usize, ignore: SpellIgnore) {
		self.spell.entry(flat_index).or_default().push(ignore);
	}

	/// Removes the suppression of `rule_id` at `offset`; with `offset`
	/// `None`, every suppression of the rule in the paragraph.
	pub fn remove(&mut self, flat_index: usize, rule_id: &str, offset: Option<usize>) {
		let Some(rules) = self.by_rule.get_mut(&flat_index) else {
			return;
		};
		match offset {
			Some(offset) => {
				if let Some(offsets) = rules.get_mut(rule_id) {
					offsets.remove(&offset);
					if offsets.is_empty() {
						rules.remove(rule_id);
					}
				}
			}
			None => {
				rules.remove(rule_id);
			}
		}
		if rules.is_empty() {
			self.by_rule.remove(&flat_index);
		}
	}

	/// Drops every suppression of a paragraph.
	pub fn remove_paragraph(&mut self, flat_index: usize) {
		self.by_rule.remove(&flat_index);
		self.spell.remove(&flat_index);
	}

	/// True when the rule has a suppressed offset inside
	/// `[start, start + length)` of the paragraph.
	pub fn is_ignored(&self, flat_index: usize, rule_id: &str, start: usize, length: usize) -> bool {
		self.by_rule
			.get(&flat_index)
			.and_then(|rules| rules.get(rule_id))
			.is_some_and(|offsets| offsets.range(start..start + length.max(1)).next().is_some())
	}

	/// Every paragraph with at least one suppression, sorted.
	pub fn all_paragraphs(&self) -> Vec<usize> {
		let mut paragraphs: Vec<usize> = self.by_rule.keys().chain(self.spell.keys()).copied().collect();
		paragraphs.sort_unstable();
		paragraphs.dedup();
		paragraphs
	}

	/// The language-carrying ignores of a paragraph.
	pub fn spell_ignores(&self, flat_index: usize) -> &[SpellIgnore] {
		self.spell.get(&flat_index).map(Vec::as_slice).unwrap_or_default()
	}

	pub fn is_empty(&self) -> bool {
		self.by_rule.is_empty() && self.spell.is_empty()
	}

	pub fn clear(&mut self) {
		self.by_rule.clear();
		self.spell.clear();
	}

	/// Translates suppressions across a structural edit, the same way the
	/// result caches shift.
	pub fn shift(&mut self, range: &ChangedRange) {
		let by_rule = std::mem::take(&mut self.by_rule);
		self.by_rule = by_rule
			.into_iter()
			.filter_map(|(index, rules)| range.translate(index).map(|i| (i, rules)))
			.collect();
		let spell = std::mem::take(&mut self.spell);
		self.spell = spell
			.into_iter()
			.filter_map(|(index, ignores)| range.translate(index).map(|i| (i, ignores)))
			.collect();
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn ignore_within_range() {
		let mut store = IgnoredMatchStore::new();
		store.insert(2, "COMMA", 14);
		assert!(store.is_ignored(2, "COMMA", 10, 8));
		assert!(store.is_ignored(2, "COMMA", 14, 1));
		assert!(!store.is_ignored(2, "COMMA", 15, 4));
		assert!(!store.is_ignored(2, "DASH", 10, 8));
		assert!(!store.is_ignored(3, "COMMA", 10, 8));
	}

	#[test]
	fn remove_by_key() {
		let mut store = IgnoredMatchStore::new();
		store.insert(0, "R", 5);
		store.insert(0, "R", 9);
		store.remove(0, "R", Some(5));
		assert!(!store.is_ignored(0, "R", 5, 1));
		assert!(store.is_ignored(0, "R", 9, 1));
		store.remove(0, "R", None);
		assert!(store.is_empty());
	}

	#[test]
	fn shift_translates_suffix() {
		// Scenario: first of two paragraphs deleted; the ignore keyed at
		// (paragraph 1, offset 3) becomes (paragraph 0, offset 3).
		let mut store = IgnoredMatchStore::new();
		store.insert(1, "R", 3);
		store.shift(&ChangedRange {
			from: 0,
			to: 0,
			old_size: 2,
			new_size: 1,
		});
		assert!(store.is_ignored(0, "R", 3, 1));
		assert!(!store.is_ignored(1, "R", 3, 1));
	}

	#[test]
	fn spell_ignores_survive_shift() {
		let mut store = IgnoredMatchStore::new();
		store.insert_spell(4, SpellIgnore {
			offset: 0,
			length: 5,
			locale: Locale::new("de", "DE"),
			rule_id: "SPELL".into(),
		});
		store.shift(&ChangedRange {
			from: 2,
			to: 3,
			old_size: 6,
			new_size: 7,
		});
		assert!(store.spell_ignores(4).is_empty());
		assert_eq!(store.spell_ignores(5).len(), 1);
		assert_eq!(store.all_paragraphs(), vec![5]);
	}
}
