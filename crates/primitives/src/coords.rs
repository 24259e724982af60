//! Paragraph coordinates.
//!
//! Two coordinate systems name the same paragraph: a dense `flat` index over
//! every paragraph the host iterates (body text, tables, footnotes, headers,
//! shapes), and a typed [`TextCoord`] addressing a paragraph within one text
//! container kind. The document cache maintains the bijection between them.

use serde::{Deserialize, Serialize};

/// The text container a paragraph lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TextKind {
	Endnote,
	Footnote,
	HeaderFooter,
	Shape,
	Text,
	Table,
	/// A flat paragraph that could not be mapped to any typed container
	/// (automatic headings, graphical-element labels).
	Unknown,
}

impl TextKind {
	/// Every kind a flat paragraph can actually be mapped to.
	pub const MAPPED: [TextKind; 6] = [
		TextKind::Endnote,
		TextKind::Footnote,
		TextKind::HeaderFooter,
		TextKind::Shape,
		TextKind::Text,
		TextKind::Table,
	];

	pub fn is_unknown(self) -> bool {
		self == TextKind::Unknown
	}
}

/// A typed paragraph coordinate: container kind plus position within it.
///
/// `Unknown` coordinates are opaque: their `index` records the flat position
/// they were derived from purely for logging, and no reverse mapping entry
/// ever points at them. Consumers must re-derive positions from the flat
/// side instead of interpreting the index of an `Unknown` coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TextCoord {
	pub kind: TextKind,
	pub index: usize,
}

impl TextCoord {
	pub fn new(kind: TextKind, index: usize) -> Self {
		Self { kind, index }
	}

	/// Coordinate for a flat paragraph that resisted mapping.
	pub fn unknown(flat_index: usize) -> Self {
		Self {
			kind: TextKind::Unknown,
			index: flat_index,
		}
	}

	pub fn is_unknown(self) -> bool {
		self.kind.is_unknown()
	}
}

/// A structural change detected by diffing the old and new flat paragraph
/// lists.
///
/// `from` is the first changed flat index (identical in old and new
/// coordinates); `to` is the first index after the changed region in *new*
/// coordinates. The same boundary in old coordinates is `to - delta`, where
/// `delta = new_size - old_size`. A shift applied with this range preserves
/// entries below `from`, drops entries inside the replaced region, and
/// translates entries at or above the old boundary by `delta`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangedRange {
	pub from: usize,
	pub to: usize,
	pub old_size: usize,
	pub new_size: usize,
}

impl ChangedRange {
	/// Net change in paragraph count.
	pub fn delta(&self) -> isize {
		self.new_size as isize - self.old_size as isize
	}

	/// First unchanged index after the replaced region, in old coordinates.
	pub fn old_to(&self) -> usize {
		(self.to as isize - self.delta()) as usize
	}

	/// Translates an old flat index into the new coordinate space.
	///
	/// Returns `None` for indices inside the replaced region, or for indices
	/// the translation would push below `from`.
	pub fn translate(&self, old_index: usize) -> Option<usize> {
		if old_index < self.from {
			return Some(old_index);
		}
		if old_index < self.old_to() {
			return None;
		}
		let shifted = old_index as isize + self.delta();
		(shifted >= self.from as isize).then_some(shifted as usize)
	}
}
