//! Flat/text paragraph equivalence.
//!
//! The host's linear iterator delivers each footnote as a single zero-width
//! space at a known offset; the typed enumerator renders the same footnote as
//! its visible label (one to [`MAX_NOTE_CHAR`] digits or small Roman
//! numerals). [`is_equal_text`] decides whether a flat and a text paragraph
//! string describe the same paragraph under some assignment of label widths.
//! This is the hot comparator of the heuristic flat/text mapping.

/// Marks a footnote anchor in a flat paragraph string.
pub const ZERO_WIDTH_SPACE: char = '\u{200B}';

/// Maximum number of visible characters a rendered footnote label can have.
pub const MAX_NOTE_CHAR: usize = 7;

/// Decides whether `flat` (zero-width-space footnote sentinels at the byte
/// offsets in `footnotes`) and `text` (rendered footnote labels) agree on
/// every non-sentinel character.
///
/// Impossible inputs (a footnote offset beyond the flat string or not on a
/// character boundary) yield `false` rather than an error. Empty inputs are
/// fine: two empty strings are equal.
pub fn is_equal_text(flat: &str, text: &str, footnotes: &[usize]) -> bool {
	let text_chars = stripped_chars(text);
	if footnotes.is_empty() {
		return stripped_chars(flat) == text_chars;
	}

	let Some(notes) = note_char_indices(flat, footnotes) else {
		return false;
	};
	let flat_chars: Vec<char> = flat.chars().collect();

	// Labels of equal total width collapse to a plain comparison.
	let flat_stripped = stripped_chars(flat);
	if flat_stripped.len() == text_chars.len() {
		return flat_stripped == text_chars;
	}

	// Peel the suffix after the last footnote; it contains no labels and
	// must match exactly.
	let last = notes[notes.len() - 1];
	let suffix = strip_markers(&flat_chars[last + 1..]);
	if suffix.len() > text_chars.len() {
		return false;
	}
	let mut text_end = text_chars.len() - suffix.len();
	if text_chars[text_end..] != suffix[..] {
		return false;
	}

	// Walk the remaining anchors from the end. For each footnote, the flat
	// gap before it must reappear in the text once the label width is
	// guessed.
	for k in (0..notes.len()).rev() {
		let gap_start = if k == 0 { 0 } else { notes[k - 1] + 1 };
		let gap = strip_markers(&flat_chars[gap_start..notes[k]]);
		let mut matched = false;
		for width in 0..=MAX_NOTE_CHAR {
			if width + gap.len() > text_end {
				break;
			}
			let candidate = text_end - width - gap.len();
			if k == 0 && candidate != 0 {
				continue;
			}
			if text_chars[candidate..text_end - width] == gap[..] {
				text_end = candidate;
				matched = true;
				break;
			}
		}
		if !matched {
			return false;
		}
	}
	text_end == 0
}

/// Characters of `s` with all zero-width spaces removed.
fn stripped_chars(s: &str) -> Vec<char> {
	s.chars().filter(|c| *c != ZERO_WIDTH_SPACE).collect()
}

fn strip_markers(chars: &[char]) -> Vec<char> {
	chars.iter().copied().filter(|c| *c != ZERO_WIDTH_SPACE).collect()
}

/// Translates the byte offsets of the footnote sentinels into character
/// indices, sorted ascending. `None` when any offset is impossible.
fn note_char_indices(flat: &str, footnotes: &[usize]) -> Option<Vec<usize>> {
	let mut indices = Vec::with_capacity(footnotes.len());
	for &offset in footnotes {
		if offset >= flat.len() || !flat.is_char_boundary(offset) {
			return None;
		}
		indices.push(flat[..offset].chars().count());
	}
	indices.sort_unstable();
	indices.dedup();
	Some(indices)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn single_footnote_one_digit_label() {
		assert!(is_equal_text("Hello\u{200B}world", "Hello1world", &[5]));
	}

	#[test]
	fn no_footnotes_plain_equality() {
		assert!(is_equal_text("a b c", "a b c", &[]));
		assert!(!is_equal_text("a b c", "a b d", &[]));
	}

	#[test]
	fn empty_inputs() {
		assert!(is_equal_text("", "", &[]));
		assert!(!is_equal_text("", "x", &[]));
		assert!(!is_equal_text("", "", &[0]));
	}

	#[test]
	fn footnote_at_end_of_paragraph() {
		// Sentinel immediately followed by end of paragraph.
		assert!(is_equal_text("Done\u{200B}", "Done12", &[4]));
	}

	#[test]
	fn wide_roman_label() {
		assert!(is_equal_text("See\u{200B} here", "Seexviii here", &[3]));
	}

	#[test]
	fn label_too_wide_rejected() {
		// Eight label characters exceed MAX_NOTE_CHAR.
		assert!(!is_equal_text("See\u{200B} here", "Seexxviiiiii here", &[3]));
	}

	#[test]
	fn two_footnotes() {
		// The zero-width space is three bytes in UTF-8, so the second
		// sentinel sits at byte 5.
		assert!(is_equal_text("a\u{200B}b\u{200B}c", "a12b3c", &[1, 5]));
	}

	#[test]
	fn differing_gap_rejected() {
		assert!(!is_equal_text("a\u{200B}b", "a1c", &[1]));
	}

	#[test]
	fn out_of_range_offset_is_false() {
		assert!(!is_equal_text("ab", "a1b", &[7]));
		assert!(!is_equal_text("ab", "a1b", &[2]));
	}

	#[test]
	fn offset_inside_multibyte_char_is_false() {
		// 'ä' spans two bytes; offset 1 is not a boundary.
		assert!(!is_equal_text("ä\u{200B}", "ä1", &[1]));
	}

	#[test]
	fn stray_marker_not_listed_as_footnote() {
		// Trailing zero-width space that is not in the footnote list is
		// stripped on both sides.
		assert!(is_equal_text("abc\u{200B}", "abc", &[]));
	}

	#[test]
	fn equal_after_strip_is_exact() {
		// Stripped lengths agree, so the comparison is exact and no label
		// width guessing happens.
		assert!(!is_equal_text("a\u{200B}b", "ax", &[1]));
		assert!(is_equal_text("a\u{200B}b", "ab", &[1]));
	}
}

#[cfg(test)]
mod properties {
	use proptest::prelude::*;

	use super::*;

	proptest! {
		// Equality implies the stripped strings agree outside the labels:
		// re-rendering each label with width 1 must also be accepted.
		#[test]
		fn equal_flat_is_equal_to_itself(words in "[a-z ]{0,20}") {
			prop_assert!(is_equal_text(&words, &words, &[]));
		}

		#[test]
		fn rendered_labels_match(prefix in "[a-z]{0,8}", suffix in "[a-z]{0,8}", width in 1usize..=MAX_NOTE_CHAR) {
			let flat = format!("{prefix}\u{200B}{suffix}");
			let text = format!("{prefix}{}{suffix}", "1".repeat(width));
			prop_assert!(is_equal_text(&flat, &text, &[prefix.len()]));
		}
	}
}
