//! Quote spans for direct-speech filtering.
//!
//! Each body-text paragraph gets the byte offsets of its opening and closing
//! quote marks. The scan is a three-state automaton: outside any quote,
//! inside a typographic pair, or inside a straight-quote pair. A paragraph
//! that ends inside an open quote hands its state to the next one, recorded
//! as a leading `-1` in that paragraph's opening list.

use galley_primitives::{CheckMatch, MatchFlags};
use smallvec::SmallVec;

use crate::config::{DirectSpeechFilter, QuotePair};

/// Byte offsets of quote marks in one paragraph; `-1` in `opening` means the
/// paragraph opens inside an unclosed quote.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct QuoteScan {
	pub opening: SmallVec<[isize; 4]>,
	pub closing: SmallVec<[isize; 4]>,
	pub ends_open: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum QuoteState {
	Outside,
	Typographic,
	Straight,
}

/// Scans one paragraph, starting in the carried-over state.
pub(crate) fn scan_paragraph(text: &str, starts_open: bool, quotes: &QuotePair) -> QuoteScan {
	let mut scan = QuoteScan::default();
	let mut state = if starts_open {
		scan.opening.push(-1);
		// The carried-over kind is unknown; accept either closer.
		QuoteState::Typographic
	} else {
		QuoteState::Outside
	};

	let mut chars = text.char_indices().peekable();
	let mut prev: Option<char> = None;
	while let Some((offset, ch)) = chars.next() {
		let next = chars.peek().map(|&(_, c)| c);
		if ch == quotes.opening && state == QuoteState::Outside {
			scan.opening.push(offset as isize);
			state = QuoteState::Typographic;
		} else if ch == quotes.closing && state != QuoteState::Outside {
			scan.closing.push(offset as isize);
			state = QuoteState::Outside;
		} else if ch == '"' {
			if is_inch_mark(prev, next) {
				// Fall through: an inch mark never changes the state.
			} else if state == QuoteState::Outside && opens_at(prev) {
				scan.opening.push(offset as isize);
				state = QuoteState::Straight;
			} else if state != QuoteState::Outside && closes_at(next) {
				scan.closing.push(offset as isize);
				state = QuoteState::Outside;
			}
		}
		prev = Some(ch);
	}
	scan.ends_open = state != QuoteState::Outside;
	scan
}

/// Digits on both sides mark an inch or seconds sign.
fn is_inch_mark(prev: Option<char>, next: Option<char>) -> bool {
	prev.is_some_and(|c| c.is_ascii_digit()) && next.is_some_and(|c| c.is_ascii_digit())
}

/// A straight quote opens at the paragraph start or after whitespace and
/// opening punctuation.
fn opens_at(prev: Option<char>) -> bool {
	match prev {
		None => true,
		Some(c) => c.is_whitespace() || matches!(c, '(' | '[' | '{' | '-' | '\u{2013}' | '\u{2014}'),
	}
}

/// A straight quote closes before the paragraph end, whitespace, or closing
/// punctuation.
fn closes_at(next: Option<char>) -> bool {
	match next {
		None => true,
		Some(c) => {
			c.is_whitespace()
				|| matches!(c, '.' | ',' | ';' | ':' | '!' | '?' | ')' | ']' | '}' | '\u{2026}')
		}
	}
}

/// The half-open byte spans covered by quotes in one paragraph.
///
/// An opening of `-1` spans from the paragraph start; an unclosed opening
/// spans to the paragraph end.
pub(crate) fn quote_spans(opening: &[isize], closing: &[isize]) -> Vec<(usize, usize)> {
	let mut spans = Vec::with_capacity(opening.len());
	let mut closings = closing.iter().copied().peekable();
	for &open in opening {
		let start = open.max(0) as usize;
		// First closing after this opening; earlier closings belong to
		// earlier openings.
		let mut end = usize::MAX;
		while let Some(&close) = closings.peek() {
			closings.next();
			if close >= open {
				end = close as usize + 1;
				break;
			}
		}
		spans.push((start, end));
	}
	spans
}

/// Drops matches inside direct speech, per configuration. Punctuation-rule
/// matches always survive; with [`DirectSpeechFilter::StyleOnly`], style
/// matches survive as well.
pub(crate) fn filter_direct_speech(
	matches: Vec<CheckMatch>,
	opening: &[isize],
	closing: &[isize],
	mode: DirectSpeechFilter,
) -> Vec<CheckMatch> {
	if mode == DirectSpeechFilter::Never || opening.is_empty() {
		return matches;
	}
	let spans = quote_spans(opening, closing);
	matches
		.into_iter()
		.filter(|m| {
			if m.flags.contains(MatchFlags::PUNCTUATION) {
				return true;
			}
			if mode == DirectSpeechFilter::StyleOnly && m.flags.contains(MatchFlags::STYLE) {
				return true;
			}
			!spans.iter().any(|&(start, end)| m.start >= start && m.start < end)
		})
		.collect()
}

#[cfg(test)]
mod tests {
	use super::*;

	fn pair() -> QuotePair {
		QuotePair::default()
	}

	#[test]
	fn straight_pair_in_plain_sentence() {
		let scan = scan_paragraph("He said \"ok\".", false, &pair());
		assert_eq!(scan.opening.as_slice(), &[8]);
		assert_eq!(scan.closing.as_slice(), &[11]);
		assert!(!scan.ends_open);

		let next = scan_paragraph("Yes.", false, &pair());
		assert!(next.opening.is_empty());
		assert!(next.closing.is_empty());
	}

	#[test]
	fn typographic_pair() {
		let text = "Sie sagte \u{201C}ja\u{201D}.";
		let scan = scan_paragraph(text, false, &pair());
		assert_eq!(scan.opening.len(), 1);
		assert_eq!(scan.closing.len(), 1);
		assert!(!scan.ends_open);
	}

	#[test]
	fn unclosed_quote_propagates() {
		let scan = scan_paragraph("He began: \"This goes on", false, &pair());
		assert!(scan.ends_open);

		let next = scan_paragraph("and on.\" Done.", true, &pair());
		assert_eq!(next.opening.as_slice(), &[-1]);
		assert_eq!(next.closing.as_slice(), &[7]);
		assert!(!next.ends_open);
	}

	#[test]
	fn inch_mark_does_not_open() {
		let scan = scan_paragraph("The board is 2\"4 wide.", false, &pair());
		assert!(scan.opening.is_empty());
		assert!(!scan.ends_open);
	}

	#[test]
	fn quote_spans_with_carried_open() {
		let spans = quote_spans(&[-1, 10], &[4, 15]);
		assert_eq!(spans, vec![(0, 5), (10, 16)]);
	}

	#[test]
	fn unclosed_span_reaches_paragraph_end() {
		let spans = quote_spans(&[3], &[]);
		assert_eq!(spans, vec![(3, usize::MAX)]);
	}

	#[test]
	fn filter_respects_mode() {
		let matches = vec![
			CheckMatch::new(9, 2, "GRAMMAR"),
			CheckMatch::new(9, 2, "PUNCT").with_flags(MatchFlags::PUNCTUATION),
			CheckMatch::new(9, 2, "STYLE").with_flags(MatchFlags::STYLE),
			CheckMatch::new(20, 2, "OUTSIDE"),
		];
		let opening = [8isize];
		let closing = [12isize];

		let never = filter_direct_speech(matches.clone(), &opening, &closing, DirectSpeechFilter::Never);
		assert_eq!(never.len(), 4);

		let always =
			filter_direct_speech(matches.clone(), &opening, &closing, DirectSpeechFilter::Always);
		let ids: Vec<&str> = always.iter().map(|m| m.rule_id.as_str()).collect();
		assert_eq!(ids, vec!["PUNCT", "OUTSIDE"]);

		let style_only =
			filter_direct_speech(matches, &opening, &closing, DirectSpeechFilter::StyleOnly);
		let ids: Vec<&str> = style_only.iter().map(|m| m.rule_id.as_str()).collect();
		assert_eq!(ids, vec!["PUNCT", "STYLE", "OUTSIDE"]);
	}
}
