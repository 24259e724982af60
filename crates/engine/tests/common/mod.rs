//! Shared fixtures for the engine integration tests.

use std::sync::{Arc, Once};
use std::time::{Duration, Instant};

use galley_host::{
	AiBackend, AiRequest, DocumentHost, FlatParagraph, FlatSnapshot, Heading, HostError,
	KindSnapshot, ParagraphHandling, RuleEngine, SpellService, Thesaurus, ViewCursor,
};
use galley_primitives::{AnalyzedSentence, CheckMatch, Locale, MatchFlags, TextKind};
use parking_lot::Mutex;

/// An in-memory document the tests edit like a user would.
pub struct MockHost {
	pub flat: Mutex<FlatSnapshot>,
	pub kinds: Mutex<Vec<KindSnapshot>>,
	pub remarks: Mutex<Vec<usize>>,
	pub cursor: Mutex<Option<ViewCursor>>,
	pub heap_ok: Mutex<bool>,
}

impl MockHost {
	/// A body-text document, one flat paragraph per string.
	pub fn body_text(paragraphs: &[&str]) -> Arc<Self> {
		let flat = FlatSnapshot {
			paragraphs: paragraphs
				.iter()
				.map(|text| FlatParagraph {
					text: text.to_string(),
					locale: Locale::new("en", "US"),
					..Default::default()
				})
				.collect(),
			element_count: None,
		};
		let mut kinds: Vec<KindSnapshot> =
			TextKind::MAPPED.iter().map(|&k| KindSnapshot::empty(k)).collect();
		kinds[4] = KindSnapshot {
			paragraphs: paragraphs.iter().map(|s| s.to_string()).collect(),
			deleted: vec![None; paragraphs.len()],
			..KindSnapshot::empty(TextKind::Text)
		};
		Arc::new(Self {
			flat: Mutex::new(flat),
			kinds: Mutex::new(kinds),
			remarks: Mutex::new(Vec::new()),
			cursor: Mutex::new(None),
			heap_ok: Mutex::new(true),
		})
	}

	/// Replaces the whole body text, as a structural edit would.
	pub fn set_body_text(&self, paragraphs: &[&str]) {
		let other = Self::body_text(paragraphs);
		*self.flat.lock() = other.flat.lock().clone();
		*self.kinds.lock() = other.kinds.lock().clone();
	}

	/// Edits one paragraph in place.
	pub fn edit_paragraph(&self, index: usize, text: &str) {
		self.flat.lock().paragraphs[index].text = text.to_string();
		self.kinds.lock()[4].paragraphs[index] = text.to_string();
	}

	/// Adds a footnote paragraph and its sentinel inside a body paragraph.
	pub fn add_footnote(&self, body_index: usize, offset: usize, note_text: &str) {
		{
			let mut flat = self.flat.lock();
			let paragraph = &mut flat.paragraphs[body_index];
			paragraph.text.insert(offset, '\u{200B}');
			paragraph.footnotes.push(offset);
			flat.paragraphs.push(FlatParagraph {
				text: note_text.to_string(),
				locale: Locale::new("en", "US"),
				..Default::default()
			});
		}
		let mut kinds = self.kinds.lock();
		let mut rendered = kinds[4].paragraphs[body_index].clone();
		rendered.insert(offset, '1');
		kinds[4].paragraphs[body_index] = rendered;
		kinds[1].paragraphs.push(note_text.to_string());
		kinds[1].deleted.push(None);
	}

	pub fn add_heading(&self, position: usize) {
		self.kinds.lock()[4].headings.push(Heading { position, level: 1 });
	}
}

impl DocumentHost for MockHost {
	fn flat_snapshot(&self) -> Result<FlatSnapshot, HostError> {
		Ok(self.flat.lock().clone())
	}

	fn kind_snapshot(&self, kind: TextKind) -> Result<KindSnapshot, HostError> {
		self.kinds
			.lock()
			.iter()
			.find(|ks| ks.kind == kind)
			.cloned()
			.ok_or(HostError::Unavailable("kind"))
	}

	fn view_cursor(&self) -> Result<ViewCursor, HostError> {
		(*self.cursor.lock()).ok_or(HostError::Unavailable("cursor"))
	}

	fn replace_text(
		&self,
		_flat_index: usize,
		_start: usize,
		_length: usize,
		_replacement: &str,
	) -> Result<(), HostError> {
		Ok(())
	}

	fn schedule_remark(&self, flat_index: usize) {
		self.remarks.lock().push(flat_index);
	}

	fn heap_ok(&self) -> bool {
		*self.heap_ok.lock()
	}
}

/// English-only engine flagging "teh" (grammar) and "very" (style).
pub struct WordEngine;

impl RuleEngine for WordEngine {
	fn supports(&self, locale: &Locale) -> bool {
		locale.language == "en"
	}

	fn set_language(&mut self, _locale: &Locale) {}

	fn activate_rule_classes(&mut self, _max_class: usize) {}

	fn check(
		&mut self,
		sentences: &[AnalyzedSentence],
		_handling: ParagraphHandling,
	) -> Result<Vec<CheckMatch>, HostError> {
		let mut matches = Vec::new();
		let mut offset = 0;
		for sentence in sentences {
			for token in &sentence.tokens {
				let word = &sentence.text[token.start..token.start + token.length];
				match word {
					"teh" => matches.push(
						CheckMatch::new(offset + token.start, token.length, "TEH")
							.with_suggestions(&["the"]),
					),
					"very" => matches.push(
						CheckMatch::new(offset + token.start, token.length, "VERY")
							.with_flags(MatchFlags::STYLE),
					),
					_ => {}
				}
			}
			offset += sentence.text.len();
		}
		Ok(matches)
	}
}

/// Backend that answers with a fixed replacement table.
pub struct TableBackend {
	pub rewrites: Mutex<Vec<(String, String)>>,
}

impl TableBackend {
	pub fn rewriting(pairs: &[(&str, &str)]) -> Arc<Self> {
		Arc::new(Self {
			rewrites: Mutex::new(
				pairs.iter().map(|(a, b)| (a.to_string(), b.to_string())).collect(),
			),
		})
	}
}

impl AiBackend for TableBackend {
	fn complete(&self, request: &AiRequest) -> Result<String, HostError> {
		let rewrites = self.rewrites.lock();
		let rewritten = rewrites
			.iter()
			.find(|(original, _)| *original == request.text)
			.map(|(_, rewrite)| rewrite.clone())
			.unwrap_or_else(|| request.text.clone());
		Ok(rewritten)
	}
}

pub struct AcceptAllSpell;

impl SpellService for AcceptAllSpell {
	fn accepts(&self, _word: &str, _locale: &Locale) -> bool {
		true
	}
}

pub struct TinyThesaurus;

impl Thesaurus for TinyThesaurus {
	fn synonyms(&self, word: &str, _locale: &Locale) -> Vec<String> {
		match word {
			"big" => vec!["large".to_string(), "huge".to_string()],
			_ => Vec::new(),
		}
	}
}

static TRACING: Once = Once::new();

/// Installs a test subscriber so worker logs show up with `--nocapture`.
pub fn init_tracing() {
	TRACING.call_once(|| {
		let _ = tracing_subscriber::fmt().with_test_writer().try_init();
	});
}

/// Polls until `probe` returns true or the timeout elapses.
pub fn wait_until(timeout: Duration, mut probe: impl FnMut() -> bool) -> bool {
	let deadline = Instant::now() + timeout;
	while Instant::now() < deadline {
		if probe() {
			return true;
		}
		std::thread::sleep(Duration::from_millis(10));
	}
	probe()
}
