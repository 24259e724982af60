//! Flattening a paragraph window into rule-engine input.

use galley_primitives::{
	MANUAL_LINE_BREAK, PARAGRAPH_SEPARATOR, SOFT_LINE_BREAK, TextCoord, TextKind, ZERO_WIDTH_SPACE,
};

use super::CacheData;

impl CacheData {
	/// The typed window `[start, end)` a check around `coord` covers.
	///
	/// `n_paras` widens the window symmetrically; zero means the whole
	/// kind. With `only_paragraph` the window is the paragraph alone. When
	/// `use_queue` is set the window is clipped to the chapter containing
	/// `coord` — background checks stop at headings and language breaks.
	pub(crate) fn check_window(
		&self,
		coord: TextCoord,
		n_paras: usize,
		only_paragraph: bool,
		use_queue: bool,
	) -> (usize, usize) {
		let len = self.kind_len(coord.kind);
		if coord.index >= len {
			return (0, 0);
		}
		if only_paragraph {
			return (coord.index, coord.index + 1);
		}
		let (mut start, mut end) = if n_paras > 0 {
			(
				coord.index.saturating_sub(n_paras),
				len.min(coord.index + n_paras + 1),
			)
		} else {
			(0, len)
		};
		if use_queue {
			let (chapter_start, chapter_end) = self.chapter_bounds(coord.kind, coord.index);
			start = start.max(chapter_start);
			end = end.min(chapter_end).max(start);
		}
		(start, end)
	}

	/// The window's text joined by the paragraph separator, plus the flat
	/// index and byte offset of every contained paragraph within the
	/// joined string.
	pub(crate) fn window_text(
		&self,
		kind: TextKind,
		start: usize,
		end: usize,
		with_footnotes: bool,
	) -> (String, Vec<(usize, usize)>) {
		let mut joined = String::new();
		let mut offsets = Vec::with_capacity(end.saturating_sub(start));
		for index in start..end {
			let Some(flat_index) = self.flat_of(TextCoord::new(kind, index)) else {
				continue;
			};
			if !joined.is_empty() {
				joined.push_str(PARAGRAPH_SEPARATOR);
			}
			offsets.push((flat_index, joined.len()));
			joined.push_str(&self.extracted_paragraph(flat_index, with_footnotes));
		}
		(joined, offsets)
	}

	/// Concatenation of the requested window.
	pub fn doc_as_string(
		&self,
		coord: TextCoord,
		n_paras: usize,
		only_paragraph: bool,
		use_queue: bool,
		with_footnotes: bool,
	) -> String {
		if coord.is_unknown() {
			return String::new();
		}
		let (start, end) = self.check_window(coord, n_paras, only_paragraph, use_queue);
		self.window_text(coord.kind, start, end, with_footnotes).0
	}

	/// One paragraph's text prepared for the rule engine: footnote
	/// sentinels stripped on request, soft line breaks rewritten to the
	/// manual-break sentinel so they stay distinguishable from paragraph
	/// ends.
	fn extracted_paragraph(&self, flat_index: usize, with_footnotes: bool) -> String {
		let Some(text) = self.paragraph(flat_index) else {
			return String::new();
		};
		text.chars()
			.filter_map(|c| match c {
				ZERO_WIDTH_SPACE if !with_footnotes => None,
				SOFT_LINE_BREAK => Some(MANUAL_LINE_BREAK),
				other => Some(other),
			})
			.collect()
	}
}
