//! Locales as delivered by the host, one per paragraph.

use std::fmt;

use serde::{Deserialize, Serialize};

/// ASCII prefix in the variant field marking a paragraph as multilingual.
///
/// The host cannot name a single language for such paragraphs; the engine
/// checks them with the document locale instead.
pub const MULTILINGUAL_LABEL: &str = "multi-";

/// A paragraph language as reported by the host.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Locale {
	/// ISO 639 language code, lower case ("en", "de").
	pub language: String,
	/// ISO 3166 country code, upper case ("US", "AT"); may be empty.
	pub country: String,
	/// Free-form variant; carries [`MULTILINGUAL_LABEL`] for mixed-language
	/// paragraphs.
	pub variant: String,
}

impl Locale {
	pub fn new(language: &str, country: &str) -> Self {
		Self {
			language: language.to_string(),
			country: country.to_string(),
			variant: String::new(),
		}
	}

	/// Parses a BCP-47-ish tag of the form `lang` or `lang-COUNTRY`.
	pub fn from_tag(tag: &str) -> Self {
		match tag.split_once('-') {
			Some((lang, country)) => Self::new(lang, country),
			None => Self::new(tag, ""),
		}
	}

	/// Marks this locale as covering several languages at once.
	pub fn multilingual(language: &str, country: &str) -> Self {
		Self {
			language: language.to_string(),
			country: country.to_string(),
			variant: format!("{MULTILINGUAL_LABEL}{language}"),
		}
	}

	pub fn is_multilingual(&self) -> bool {
		self.variant.starts_with(MULTILINGUAL_LABEL)
	}

	/// True when both locales name the same language, ignoring country and
	/// variant. Language boundaries for text-level checks use this, so a
	/// switch from en-US to en-GB does not split a chapter.
	pub fn same_language(&self, other: &Locale) -> bool {
		self.language == other.language
	}
}

impl fmt::Display for Locale {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		if self.country.is_empty() {
			write!(f, "{}", self.language)
		} else {
			write!(f, "{}-{}", self.language, self.country)
		}
	}
}
