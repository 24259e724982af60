//! Paragraph analysis: sentence splitting and tokenisation.
//!
//! The rule engine consumes paragraphs as a list of analyzed sentences. The
//! split is deliberately simple (terminal punctuation followed by whitespace
//! and an upper-case or digit start); the heavy linguistic lifting lives in
//! the rule engine behind the host boundary. Analyses are cached per
//! paragraph by the document cache and invalidated on any edit.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use unicode_segmentation::UnicodeSegmentation;

/// A word token within a sentence, as byte offsets into the sentence text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSpan {
	pub start: usize,
	pub length: usize,
}

/// One sentence of a paragraph with its word tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalyzedSentence {
	/// Byte offset of the sentence within its paragraph.
	pub start: usize,
	/// The sentence text.
	pub text: String,
	/// Word tokens, byte offsets relative to `text`.
	pub tokens: Vec<TokenSpan>,
}

impl AnalyzedSentence {
	/// One past the last byte of the sentence within its paragraph.
	pub fn end(&self) -> usize {
		self.start + self.text.len()
	}
}

/// Splits a paragraph into analyzed sentences.
///
/// An empty paragraph yields no sentences. Sentence boundaries never split
/// inside a word, so offsets into the paragraph can be rebased onto a
/// sentence and back without loss.
pub fn analyze_paragraph(text: &str) -> Vec<AnalyzedSentence> {
	let mut sentences = Vec::new();
	for (start, sentence) in split_sentences(text) {
		let tokens = sentence
			.unicode_word_indices()
			.map(|(offset, word)| TokenSpan {
				start: offset,
				length: word.len(),
			})
			.collect();
		sentences.push(AnalyzedSentence {
			start,
			text: sentence.to_string(),
			tokens,
		});
	}
	sentences
}

/// Sentence segments of `text` with their byte offsets.
fn split_sentences(text: &str) -> SmallVec<[(usize, &str); 4]> {
	let mut out = SmallVec::new();
	if text.is_empty() {
		return out;
	}

	let mut segment_start = 0;
	let mut terminal_seen = false;
	for (offset, ch) in text.char_indices() {
		if matches!(ch, '.' | '!' | '?' | '…') {
			terminal_seen = true;
			continue;
		}
		if terminal_seen && ch.is_whitespace() {
			let rest = &text[offset + ch.len_utf8()..];
			let next_starts_sentence = rest
				.chars()
				.next()
				.is_some_and(|c| c.is_uppercase() || c.is_ascii_digit());
			if next_starts_sentence {
				out.push((segment_start, &text[segment_start..offset]));
				segment_start = offset + ch.len_utf8();
			}
			terminal_seen = false;
			continue;
		}
		if !ch.is_whitespace() && !matches!(ch, '"' | '\u{201C}' | '\u{201D}' | ')' | ']') {
			terminal_seen = false;
		}
	}
	out.push((segment_start, &text[segment_start..]));
	out
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn empty_paragraph_has_no_sentences() {
		assert!(analyze_paragraph("").is_empty());
	}

	#[test]
	fn single_sentence() {
		let sentences = analyze_paragraph("Hello world.");
		assert_eq!(sentences.len(), 1);
		assert_eq!(sentences[0].start, 0);
		assert_eq!(sentences[0].text, "Hello world.");
		assert_eq!(sentences[0].tokens.len(), 2);
	}

	#[test]
	fn two_sentences_with_offsets() {
		let sentences = analyze_paragraph("First one. Second one!");
		assert_eq!(sentences.len(), 2);
		assert_eq!(sentences[0].text, "First one.");
		assert_eq!(sentences[1].start, 11);
		assert_eq!(sentences[1].text, "Second one!");
		assert_eq!(sentences[1].end(), 22);
	}

	#[test]
	fn abbreviation_followed_by_lowercase_does_not_split() {
		let sentences = analyze_paragraph("The approx. value is right.");
		assert_eq!(sentences.len(), 1);
	}

	#[test]
	fn token_offsets_are_sentence_local() {
		let sentences = analyze_paragraph("Go now. Stay here.");
		let second = &sentences[1];
		assert_eq!(second.text, "Stay here.");
		assert_eq!(second.tokens[0].start, 0);
		assert_eq!(&second.text[second.tokens[1].start..][..second.tokens[1].length], "here");
	}
}
