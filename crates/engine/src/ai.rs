//! AI-backed error detection.
//!
//! The adapter asks the remote backend for a corrected rewrite (grammar) or
//! a reformulation (rewrite) of one paragraph, then derives the minimal
//! word-level edits between the original and the completion. In grammar
//! mode an edit only surfaces when the rewritten span is itself clean under
//! the local rules — the dictionary-spell rule is bypassed for words the
//! host's spell service accepts. Remote failures degrade to "no suggestions
//! this pass"; the next edit notification is the retry trigger.

use std::sync::Arc;

use galley_host::{AiBackend, AiRequest, ParagraphHandling, RuleEngine, SpellService};
use galley_primitives::{CheckMatch, Locale, MatchFlags, analyze_paragraph};
use tracing::debug;

use crate::error::{StepError, StepResult};

/// Rule id reported for grammar-mode AI findings.
pub const AI_GRAMMAR_RULE: &str = "AI_GRAMMAR_CORRECTION";
/// Rule id reported for reformulation suggestions.
pub const AI_REWRITE_RULE: &str = "AI_REFORMULATION";

const GRAMMAR_INSTRUCTION: &str =
	"Correct the grammar, spelling and punctuation of the text. Reply with the corrected text and nothing else.";
const REWRITE_INSTRUCTION: &str =
	"Reformulate the text in the same language and register. Reply with the reformulated text and nothing else.";

const GRAMMAR_TEMPERATURE: f32 = 0.0;
const REWRITE_TEMPERATURE: f32 = 0.7;
const TOP_P: f32 = 0.9;

/// What the backend is asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AiMode {
	Grammar,
	Rewrite,
}

/// One word-level difference between the original and the rewrite.
#[derive(Debug, Clone, PartialEq, Eq)]
struct EditOp {
	orig_start: usize,
	orig_len: usize,
	new_start: usize,
	new_len: usize,
}

/// Turns remote completions into match candidates.
pub(crate) struct AiAdapter {
	backend: Arc<dyn AiBackend>,
}

impl AiAdapter {
	pub fn new(backend: Arc<dyn AiBackend>) -> Self {
		Self { backend }
	}

	/// Produces AI matches for one paragraph.
	pub fn detect(
		&self,
		paragraph: &str,
		locale: &Locale,
		mode: AiMode,
		engine: &mut Option<&mut dyn RuleEngine>,
		spell: Option<&dyn SpellService>,
	) -> StepResult<Vec<CheckMatch>> {
		if paragraph.trim().is_empty() {
			return Ok(Vec::new());
		}
		let (instruction, temperature) = match mode {
			AiMode::Grammar => (GRAMMAR_INSTRUCTION, GRAMMAR_TEMPERATURE),
			AiMode::Rewrite => (REWRITE_INSTRUCTION, REWRITE_TEMPERATURE),
		};
		let request = AiRequest {
			instruction: instruction.to_string(),
			text: paragraph.to_string(),
			temperature,
			top_p: TOP_P,
			locale: locale.clone(),
		};
		let rewrite = self.backend.complete(&request).map_err(StepError::from)?;
		let rewrite = rewrite.trim_end_matches('\n');
		if rewrite.is_empty() || rewrite == paragraph {
			return Ok(Vec::new());
		}

		let mut edits = detect_edits(paragraph, rewrite, locale);
		if mode == AiMode::Grammar {
			if let Some(engine) = engine.as_deref_mut() {
				edits = gate_by_local_rules(edits, rewrite, locale, engine, spell);
			}
		}

		let (rule_id, flags) = match mode {
			AiMode::Grammar => (AI_GRAMMAR_RULE, MatchFlags::AI),
			AiMode::Rewrite => (AI_REWRITE_RULE, MatchFlags::AI | MatchFlags::STYLE),
		};
		Ok(edits
			.into_iter()
			.map(|edit| {
				let suggestion = rewrite[edit.new_start..edit.new_start + edit.new_len].to_string();
				CheckMatch::new(edit.orig_start, edit.orig_len, rule_id)
					.with_suggestions(&[&suggestion])
					.with_flags(flags)
			})
			.collect())
	}
}

/// Drops edits whose rewritten span the local rules still flag. Spell
/// findings are bypassed when the spell service accepts the flagged word.
fn gate_by_local_rules(
	edits: Vec<EditOp>,
	rewrite: &str,
	locale: &Locale,
	engine: &mut dyn RuleEngine,
	spell: Option<&dyn SpellService>,
) -> Vec<EditOp> {
	if !engine.supports(locale) {
		return edits;
	}
	engine.set_language(locale);
	let sentences = analyze_paragraph(rewrite);
	let matches = match engine.check(&sentences, ParagraphHandling::Normal) {
		Ok(matches) => matches,
		Err(error) => {
			debug!(%error, "local re-check of rewrite failed, keeping edits");
			return edits;
		}
	};

	let blocked: Vec<(usize, usize)> = matches
		.iter()
		.filter(|m| {
			if !m.flags.contains(MatchFlags::SPELL) {
				return true;
			}
			let accepted = spell.is_some_and(|spell| {
				rewrite
					.get(m.start..m.start + m.length)
					.is_some_and(|word| spell.accepts(word, locale))
			});
			!accepted
		})
		.map(|m| (m.start, m.start + m.length))
		.collect();

	edits
		.into_iter()
		.filter(|edit| {
			let end = edit.new_start + edit.new_len;
			!blocked
				.iter()
				.any(|&(start, stop)| edit.new_start < stop && start < end)
		})
		.collect()
}

/// Word-level minimal edits, language-specific tokenisation included.
fn detect_edits(original: &str, rewrite: &str, locale: &Locale) -> Vec<EditOp> {
	let splits_inside_word: fn(char) -> bool = match locale.language.as_str() {
		// French glues narrow no-break spaces to punctuation; keep them
		// inside tokens so « guillemets » diff as one unit.
		"fr" => |c| c.is_whitespace() && c != '\u{00A0}' && c != '\u{202F}',
		_ => char::is_whitespace,
	};
	let old_tokens = tokenize(original, splits_inside_word);
	let new_tokens = tokenize(rewrite, splits_inside_word);
	diff_tokens(original, rewrite, &old_tokens, &new_tokens)
}

/// `(byte offset, token)` of every whitespace-separated token.
fn tokenize(text: &str, is_separator: fn(char) -> bool) -> Vec<(usize, &str)> {
	let mut tokens = Vec::new();
	let mut start = None;
	for (offset, ch) in text.char_indices() {
		if is_separator(ch) {
			if let Some(s) = start.take() {
				tokens.push((s, &text[s..offset]));
			}
		} else if start.is_none() {
			start = Some(offset);
		}
	}
	if let Some(s) = start {
		tokens.push((s, &text[s..]));
	}
	tokens
}

/// Longest-common-subsequence alignment; each contiguous mismatched run
/// becomes one edit.
fn diff_tokens(
	original: &str,
	rewrite: &str,
	old: &[(usize, &str)],
	new: &[(usize, &str)],
) -> Vec<EditOp> {
	let n = old.len();
	let m = new.len();
	let mut lcs = vec![vec![0usize; m + 1]; n + 1];
	for i in (0..n).rev() {
		for j in (0..m).rev() {
			lcs[i][j] = if old[i].1 == new[j].1 {
				lcs[i + 1][j + 1] + 1
			} else {
				lcs[i + 1][j].max(lcs[i][j + 1])
			};
		}
	}

	let mut edits = Vec::new();
	let (mut i, mut j) = (0, 0);
	let (mut run_i, mut run_j): (Option<usize>, Option<usize>) = (None, None);
	let mut flush = |edits: &mut Vec<EditOp>, run_i: &mut Option<usize>, run_j: &mut Option<usize>, i: usize, j: usize| {
		if run_i.is_none() && run_j.is_none() {
			return;
		}
		let oi = run_i.take().unwrap_or(i);
		let oj = run_j.take().unwrap_or(j);
		let (orig_start, orig_len) = token_span(original, old, oi, i);
		let (new_start, new_len) = token_span(rewrite, new, oj, j);
		edits.push(EditOp {
			orig_start,
			orig_len,
			new_start,
			new_len,
		});
	};
	while i < n && j < m {
		if old[i].1 == new[j].1 {
			flush(&mut edits, &mut run_i, &mut run_j, i, j);
			i += 1;
			j += 1;
		} else if lcs[i + 1][j] >= lcs[i][j + 1] {
			run_i.get_or_insert(i);
			run_j.get_or_insert(j);
			i += 1;
		} else {
			run_i.get_or_insert(i);
			run_j.get_or_insert(j);
			j += 1;
		}
	}
	if i < n || j < m {
		run_i.get_or_insert(i);
		run_j.get_or_insert(j);
		i = n;
		j = m;
	}
	flush(&mut edits, &mut run_i, &mut run_j, i, j);
	edits
}

/// Byte span covering tokens `[from, to)`; empty (anchored at the next
/// token) when the run is empty.
fn token_span(text: &str, tokens: &[(usize, &str)], from: usize, to: usize) -> (usize, usize) {
	if from >= to {
		let anchor = tokens.get(from).map(|&(o, _)| o).unwrap_or(text.len());
		return (anchor, 0);
	}
	let start = tokens[from].0;
	let (last_offset, last_token) = tokens[to - 1];
	(start, last_offset + last_token.len() - start)
}
