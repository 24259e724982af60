//! Data crossing the host boundary.

use galley_primitives::{Locale, TextKind};
use serde::{Deserialize, Serialize};

/// One paragraph as produced by the host's flat iterator.
///
/// The text carries footnotes as zero-width-space sentinels at the byte
/// offsets listed in `footnotes`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlatParagraph {
	pub text: String,
	pub locale: Locale,
	pub footnotes: Vec<usize>,
	/// Stable node identifier; only newer hosts supply one.
	pub node_id: Option<u64>,
}

/// The complete flat view of a document, one entry per paragraph the host
/// iterates (body text, tables, footnotes, headers/footers, shapes).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlatSnapshot {
	pub paragraphs: Vec<FlatParagraph>,
	/// Total document element count, present iff node ids are supplied.
	pub element_count: Option<usize>,
}

impl FlatSnapshot {
	pub fn len(&self) -> usize {
		self.paragraphs.len()
	}

	pub fn is_empty(&self) -> bool {
		self.paragraphs.is_empty()
	}

	/// Node ids in flat order, when every paragraph carries one.
	pub fn node_ids(&self) -> Option<Vec<u64>> {
		self.paragraphs.iter().map(|p| p.node_id).collect()
	}
}

/// A heading within one text kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Heading {
	/// Paragraph position within the kind.
	pub position: usize,
	/// Outline level, 1-based.
	pub level: u8,
}

/// The typed view of one text container kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KindSnapshot {
	pub kind: TextKind,
	/// Paragraph strings with rendered footnote labels.
	pub paragraphs: Vec<String>,
	pub headings: Vec<Heading>,
	/// Per paragraph, byte offsets of characters that exist only as tracked
	/// deletions; `None` when the paragraph has none.
	pub deleted: Vec<Option<Vec<usize>>>,
	/// Positions of auto-generated paragraphs that must not be checked.
	pub automatic: Vec<usize>,
	/// Stable node ids per paragraph, when the host supplies them.
	pub node_ids: Option<Vec<u64>>,
}

impl KindSnapshot {
	pub fn empty(kind: TextKind) -> Self {
		Self {
			kind,
			paragraphs: Vec::new(),
			headings: Vec::new(),
			deleted: Vec::new(),
			automatic: Vec::new(),
			node_ids: None,
		}
	}
}

/// Position of the view cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewCursor {
	pub kind: TextKind,
	pub paragraph: usize,
	pub character: usize,
}

/// Why the host issued a proofing callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProofReason {
	/// The host wants the paragraph (re)marked in the view.
	MarkParagraph,
	/// The host is collecting results and is blocked on the answer. The
	/// engine must answer from cache and never start a refresh.
	GetProofResult,
	#[default]
	Unknown,
}

/// One proofing callback from the host.
#[derive(Debug, Clone, Default)]
pub struct CheckRequest {
	/// Paragraph text as the flat iterator would deliver it.
	pub text: String,
	pub locale: Locale,
	/// Byte offsets of footnote sentinels within `text`.
	pub footnotes: Vec<usize>,
	/// Byte offsets of tracked-deletion characters, when any.
	pub deleted: Option<Vec<usize>>,
	/// Byte offset of the sentence the host wants checked first.
	pub sentence_start: usize,
	pub reason: ProofReason,
	/// Stable node id of the paragraph, from newer hosts.
	pub node_id: Option<u64>,
	/// Document element count the node id was valid for.
	pub element_count: Option<usize>,
}

/// How the rule engine should treat paragraph-level rules for one check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParagraphHandling {
	/// Run every active rule.
	#[default]
	Normal,
	/// Run only paragraph-spanning rules.
	OnlyParagraph,
	/// Run only sentence-local rules.
	OnlySentence,
}

/// A completion request for the AI backend.
#[derive(Debug, Clone, PartialEq)]
pub struct AiRequest {
	pub instruction: String,
	pub text: String,
	pub temperature: f32,
	pub top_p: f32,
	pub locale: Locale,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn node_ids_require_every_paragraph() {
		let mut snapshot = FlatSnapshot::default();
		snapshot.paragraphs.push(FlatParagraph {
			text: "a".into(),
			node_id: Some(1),
			..Default::default()
		});
		assert_eq!(snapshot.node_ids(), Some(vec![1]));

		snapshot.paragraphs.push(FlatParagraph {
			text: "b".into(),
			..Default::default()
		});
		assert_eq!(snapshot.node_ids(), None);
	}
}
