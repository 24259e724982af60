//! Engine configuration and the persisted-state fingerprint.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// How aggressively matches inside direct speech are dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DirectSpeechFilter {
	/// Drop every non-punctuation match inside an open-quote span.
	Always,
	/// Keep everything.
	#[default]
	Never,
	/// Drop non-punctuation matches unless they come from a style rule.
	StyleOnly,
}

/// Quote glyphs the document uses for direct speech.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotePair {
	pub opening: char,
	pub closing: char,
}

impl Default for QuotePair {
	fn default() -> Self {
		Self {
			opening: '\u{201C}',
			closing: '\u{201D}',
		}
	}
}

/// Engine-wide configuration. One instance is shared by every document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
	/// Background checking on the worker threads; when off, only the
	/// synchronous sentence check runs.
	pub background_check: bool,
	/// Whether the AI queue and adapter are active.
	pub ai_enabled: bool,
	pub direct_speech: DirectSpeechFilter,
	pub quotes: QuotePair,
	/// Number of text-level rule classes (windows ascending); cache classes
	/// `1..=text_level_classes` serve them.
	pub text_level_classes: usize,
	/// Rules disabled everywhere.
	pub disabled_rules: BTreeSet<String>,
	/// Default-off rules the user enabled.
	pub enabled_rules: BTreeSet<String>,
	/// Whole categories disabled.
	pub disabled_categories: BTreeSet<String>,
	/// Per-language disabled rules, keyed by language code.
	pub disabled_rules_per_language: BTreeMap<String, BTreeSet<String>>,
	/// Discard the weaker of two overlapping errors instead of splitting
	/// the covering one around the covered.
	pub drop_overlapping: bool,
	/// Version string of the rule engine the caches were built with.
	pub engine_version: String,
	/// Upper bound for suggestions per match after thesaurus augmentation.
	pub max_suggestions: usize,
}

impl Default for EngineConfig {
	fn default() -> Self {
		Self {
			background_check: true,
			ai_enabled: false,
			direct_speech: DirectSpeechFilter::default(),
			quotes: QuotePair::default(),
			text_level_classes: 3,
			disabled_rules: BTreeSet::new(),
			enabled_rules: BTreeSet::new(),
			disabled_categories: BTreeSet::new(),
			disabled_rules_per_language: BTreeMap::new(),
			drop_overlapping: true,
			engine_version: String::new(),
			max_suggestions: 10,
		}
	}
}

impl EngineConfig {
	/// The fingerprint persisted next to every cache blob. A blob whose
	/// fingerprint disagrees with the running configuration is rejected as
	/// a whole; the caches are rebuilt from scratch.
	pub fn fingerprint(&self) -> ConfigFingerprint {
		ConfigFingerprint {
			disabled_rules: self.disabled_rules.clone(),
			enabled_rules: self.enabled_rules.clone(),
			disabled_categories: self.disabled_categories.clone(),
			disabled_rules_per_language: self.disabled_rules_per_language.clone(),
			engine_version: self.engine_version.clone(),
		}
	}

	/// True when `rule_id` is disabled globally or for the given language.
	pub fn rule_disabled(&self, rule_id: &str, language: &str) -> bool {
		if self.disabled_rules.contains(rule_id) {
			return true;
		}
		self.disabled_rules_per_language
			.get(language)
			.is_some_and(|rules| rules.contains(rule_id))
	}
}

/// The slice of configuration that decides cache-blob validity.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ConfigFingerprint {
	pub disabled_rules: BTreeSet<String>,
	pub enabled_rules: BTreeSet<String>,
	pub disabled_categories: BTreeSet<String>,
	pub disabled_rules_per_language: BTreeMap<String, BTreeSet<String>>,
	pub engine_version: String,
}
