//! Rule matches as produced by the rule engine and served to the host.

use bitflags::bitflags;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

bitflags! {
	/// Classification bits of a match. A match with none of these set comes
	/// from a default grammar rule.
	#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
	pub struct MatchFlags: u8 {
		/// Style or register rule.
		const STYLE = 1 << 0;
		/// Punctuation or typography rule.
		const PUNCTUATION = 1 << 1;
		/// Produced by the AI detection adapter.
		const AI = 1 << 2;
		/// Dictionary spell rule.
		const SPELL = 1 << 3;
	}
}

impl Serialize for MatchFlags {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		serializer.serialize_u8(self.bits())
	}
}

impl<'de> Deserialize<'de> for MatchFlags {
	fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		// Unknown bits from newer writers are dropped, not rejected.
		Ok(MatchFlags::from_bits_truncate(u8::deserialize(deserializer)?))
	}
}

/// A single finding within one paragraph.
///
/// `start` and `length` are byte offsets into the paragraph the match was
/// produced for. Matches stored in a result cache are always paragraph-local;
/// window-relative offsets are rebased before insertion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckMatch {
	pub start: usize,
	pub length: usize,
	pub rule_id: String,
	pub suggestions: Vec<String>,
	pub short_comment: String,
	pub full_comment: String,
	pub flags: MatchFlags,
}

impl CheckMatch {
	pub fn new(start: usize, length: usize, rule_id: &str) -> Self {
		Self {
			start,
			length,
			rule_id: rule_id.to_string(),
			suggestions: Vec::new(),
			short_comment: String::new(),
			full_comment: String::new(),
			flags: MatchFlags::empty(),
		}
	}

	pub fn with_suggestions(mut self, suggestions: &[&str]) -> Self {
		self.suggestions = suggestions.iter().map(|s| s.to_string()).collect();
		self
	}

	pub fn with_flags(mut self, flags: MatchFlags) -> Self {
		self.flags = flags;
		self
	}

	/// One past the last byte covered by this match.
	pub fn end(&self) -> usize {
		self.start + self.length
	}

	/// True when the byte ranges of the two matches intersect.
	pub fn overlaps(&self, other: &CheckMatch) -> bool {
		self.start < other.end() && other.start < self.end()
	}

	/// True when this match fully contains the other's range.
	pub fn covers(&self, other: &CheckMatch) -> bool {
		self.start <= other.start && other.end() <= self.end()
	}

	/// A default (non-style, non-AI) grammar rule match.
	pub fn is_default_rule(&self) -> bool {
		!self.flags.intersects(MatchFlags::STYLE | MatchFlags::AI)
	}
}
