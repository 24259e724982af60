//! Per-document orchestration.
//!
//! A [`SingleDocument`] owns everything the engine keeps for one open
//! document: the document cache, the six per-class result caches, the ignore
//! stores and the analyzer state. The host callback enters through
//! [`SingleDocument::get_check_results`]; the queue workers enter through
//! [`SingleDocument::run_entry`]. The callback path answers synchronously
//! from the sentence check plus whatever the background classes have cached
//! — stale is acceptable, blocking is not.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Instant;

use galley_host::{CheckRequest, DocumentHost, ParagraphHandling, RuleEngine, Thesaurus};
use galley_primitives::{
	AnalyzedSentence, ChangedRange, CheckMatch, Locale, MatchFlags, TextCoord,
};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, warn};

use crate::analyzer::{self, AnalyzerState};
use crate::cache::{CacheData, DocumentCache};
use crate::config::EngineConfig;
use crate::ignore::IgnoredMatchStore;
use crate::queue::{COVER_ALL_RADIUS, CheckQueue, QueueEntry};
use crate::results::{
	CACHE_AI, CACHE_AI_SUGGESTION, CACHE_COUNT, CACHE_SENTENCE, CACHE_TEXT_FIRST, ResultCache,
};

/// Counter for document ids.
static NEXT_DOCUMENT_ID: AtomicU64 = AtomicU64::new(1);

/// Stable identity of one open document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DocumentId(pub u64);

impl DocumentId {
	pub fn next() -> Self {
		Self(NEXT_DOCUMENT_ID.fetch_add(1, Ordering::Relaxed))
	}
}

/// Paragraphs quoted at most in any diagnostic log line.
const MAX_PRINTED_PARAS: usize = 3;

/// Slow host callbacks are logged above this many milliseconds.
const TIME_TOLERANCE_MS: u128 = 100;

/// Both queues, as handed to the orchestration entry points.
pub(crate) struct Queues {
	pub text: CheckQueue,
	pub ai: Option<CheckQueue>,
}

/// Window radius of a text-level cache class; `0` means the whole chapter.
pub(crate) fn class_radius(cache_index: usize) -> i32 {
	match cache_index {
		0 => 0,
		1 => 1,
		2 => 3,
		_ => 0,
	}
}

/// All engine state for one open document.
pub struct SingleDocument {
	id: DocumentId,
	host: Arc<dyn DocumentHost>,
	cache: DocumentCache,
	results: [Mutex<ResultCache>; CACHE_COUNT],
	/// Session-scoped suppressions.
	ignored: Mutex<IgnoredMatchStore>,
	/// Suppressions that persist with the cache blob.
	permanent: Mutex<IgnoredMatchStore>,
	analyzer: Mutex<AnalyzerState>,
	config: Arc<RwLock<EngineConfig>>,
	disposed: AtomicBool,
}

impl SingleDocument {
	pub(crate) fn new(
		id: DocumentId,
		host: Arc<dyn DocumentHost>,
		config: Arc<RwLock<EngineConfig>>,
	) -> Self {
		Self {
			id,
			host,
			cache: DocumentCache::new(),
			results: std::array::from_fn(|_| Mutex::new(ResultCache::new())),
			ignored: Mutex::new(IgnoredMatchStore::new()),
			permanent: Mutex::new(IgnoredMatchStore::new()),
			analyzer: Mutex::new(AnalyzerState::default()),
			config,
			disposed: AtomicBool::new(false),
		}
	}

	pub fn id(&self) -> DocumentId {
		self.id
	}

	pub(crate) fn host(&self) -> &dyn DocumentHost {
		self.host.as_ref()
	}

	pub fn cache(&self) -> &DocumentCache {
		&self.cache
	}

	pub fn dispose(&self) {
		self.disposed.store(true, Ordering::Release);
		self.cache.dispose();
	}

	pub fn is_disposed(&self) -> bool {
		self.disposed.load(Ordering::Acquire)
	}

	/// Applies one of a match's suggestions through the host's mutation
	/// service and updates the cached paragraph in place, shifting footnote
	/// offsets behind the replacement.
	pub fn apply_suggestion(&self, flat_index: usize, m: &CheckMatch, suggestion: usize) -> bool {
		let Some(replacement) = m.suggestions.get(suggestion) else {
			return false;
		};
		if let Err(error) = self.host.replace_text(flat_index, m.start, m.length, replacement) {
			warn!(doc_id = ?self.id, flat_index, %error, "suggestion could not be applied");
			return false;
		}
		let config = self.config.read().clone();
		let updated = self.cache.with_mut(|data| {
			let Some(text) = data.paragraph(flat_index) else {
				return false;
			};
			if m.end() > text.len()
				|| !text.is_char_boundary(m.start)
				|| !text.is_char_boundary(m.end())
			{
				return false;
			}
			let mut new_text = text.to_string();
			new_text.replace_range(m.start..m.end(), replacement);
			let delta = replacement.len() as isize - m.length as isize;
			let locale = data.locale(flat_index).cloned().unwrap_or_default();
			let footnotes = data
				.footnotes
				.get(flat_index)
				.map(|offsets| {
					offsets
						.iter()
						.map(|&o| if o >= m.end() { (o as isize + delta) as usize } else { o })
						.collect()
				})
				.unwrap_or_default();
			let deleted = data.deleted.get(flat_index).cloned().flatten();
			data.set_paragraph(flat_index, new_text, locale, footnotes, deleted, &config.quotes);
			true
		});
		let updated = updated == Some(true);
		if updated {
			self.invalidate_paragraph(flat_index);
			self.host.schedule_remark(flat_index);
		}
		updated
	}

	/// Suppresses a match; survives structural edits and cache rebuilds.
	pub fn ignore_match(&self, flat_index: usize, rule_id: &str, offset: usize, permanent: bool) {
		let store = if permanent { &self.permanent } else { &self.ignored };
		store.lock().insert(flat_index, rule_id, offset);
	}

	/// Lifts a suppression again.
	pub fn remove_ignored(&self, flat_index: usize, rule_id: &str, offset: Option<usize>) {
		self.ignored.lock().remove(flat_index, rule_id, offset);
		self.permanent.lock().remove(flat_index, rule_id, offset);
	}

	/// Suppresses a spelling match, keeping its language so the host can
	/// restore the spell marks later.
	pub fn ignore_spelling(&self, flat_index: usize, offset: usize, length: usize, rule_id: &str) {
		let locale = self
			.cache
			.try_with(|data| data.locale(flat_index).cloned())
			.flatten()
			.unwrap_or_default();
		self.permanent.lock().insert_spell(flat_index, crate::ignore::SpellIgnore {
			offset,
			length,
			locale,
			rule_id: rule_id.to_string(),
		});
		self.permanent.lock().insert(flat_index, rule_id, offset);
	}

	pub(crate) fn with_permanent_ignores<R>(&self, f: impl FnOnce(&IgnoredMatchStore) -> R) -> R {
		f(&self.permanent.lock())
	}

	pub(crate) fn restore_permanent_ignores(&self, store: IgnoredMatchStore) {
		*self.permanent.lock() = store;
	}

	pub(crate) fn with_result_cache<R>(
		&self,
		cache_index: usize,
		f: impl FnOnce(&mut ResultCache) -> R,
	) -> R {
		f(&mut self.results[cache_index].lock())
	}

	/// The cached row of one class for one paragraph; `None` means the
	/// paragraph has not been checked against that class yet.
	pub fn cached_matches(&self, cache_index: usize, flat_index: usize) -> Option<Vec<CheckMatch>> {
		self.results
			.get(cache_index)?
			.lock()
			.get(flat_index)
			.map(<[CheckMatch]>::to_vec)
	}

	/// The language the queue should check an entry with.
	pub(crate) fn entry_locale(&self, entry: &QueueEntry) -> Option<Locale> {
		self.cache.with(|data| {
			let flat = data.flat_of(entry.start)?;
			let locale = data.locale(flat)?;
			if locale.is_multilingual() {
				data.doc_locale().cloned()
			} else {
				Some(locale.clone())
			}
		})?
	}

	/// Serves one host callback. This path never fails: errors degrade to
	/// an empty (or stale) answer.
	pub(crate) fn get_check_results(
		&self,
		request: &CheckRequest,
		sentence_engine: &mut dyn RuleEngine,
		queues: &Queues,
		thesaurus: Option<&dyn Thesaurus>,
	) -> Vec<CheckMatch> {
		if self.is_disposed() {
			return Vec::new();
		}
		let started = Instant::now();
		let config = self.config.read().clone();

		let outcome = {
			let mut state = self.analyzer.lock();
			analyzer::analyze(
				&self.cache,
				self.host.as_ref(),
				&mut state,
				request,
				&config.quotes,
				&|locale| sentence_engine.supports(locale),
			)
		};
		let outcome = match outcome {
			Ok(outcome) => outcome,
			Err(error) => {
				warn!(doc_id = ?self.id, %error, "request analysis failed, answering empty");
				return Vec::new();
			}
		};

		if let Some(range) = outcome.shift {
			self.apply_shift(&range, queues, &config);
		}
		let Some(flat_index) = outcome.flat_index else {
			return Vec::new();
		};
		if outcome.content_changed {
			self.invalidate_paragraph(flat_index);
			self.enqueue_paragraph(flat_index, queues, &config, true);
		}

		let skip = self
			.cache
			.try_with(|data| data.is_automatic(flat_index))
			.unwrap_or(false);
		if skip || !config.background_check {
			return Vec::new();
		}

		self.run_sentence_check(flat_index, request, sentence_engine);

		let mut merged = self.merge_cached(flat_index, queues, &config);
		merged.sort_by(|a, b| {
			a.start
				.cmp(&b.start)
				.then(b.length.cmp(&a.length))
				.then(a.rule_id.cmp(&b.rule_id))
				.then(b.suggestions.len().cmp(&a.suggestions.len()))
		});

		merged.retain(|m| !config.rule_disabled(&m.rule_id, &request.locale.language));
		let merged = self.filter_ignored(flat_index, merged);
		let merged = self.filter_quotes(flat_index, merged, &config);
		let mut merged = filter_overlapping_errors(merged, config.drop_overlapping);
		// The host asks from one sentence onward; findings that end before
		// it were delivered with earlier callbacks.
		merged.retain(|m| m.end() >= request.sentence_start);
		if let Some(thesaurus) = thesaurus {
			augment_suggestions(&mut merged, request, thesaurus, config.max_suggestions);
		}

		let elapsed = started.elapsed().as_millis();
		if elapsed > TIME_TOLERANCE_MS {
			debug!(doc_id = ?self.id, flat_index, elapsed_ms = elapsed, "slow check callback");
		}
		merged
	}

	/// Runs the synchronous sentence-level check and records its row.
	fn run_sentence_check(
		&self,
		flat_index: usize,
		request: &CheckRequest,
		engine: &mut dyn RuleEngine,
	) {
		let locale = &request.locale;
		if !engine.supports(locale) {
			self.results[CACHE_SENTENCE].lock().put(flat_index, Vec::new());
			return;
		}
		let sentences = self
			.cache
			.with_mut(|data| data.analyzed(flat_index).to_vec())
			.unwrap_or_default();

		engine.set_language(locale);
		engine.activate_rule_classes(CACHE_SENTENCE);
		match engine.check(&sentences, ParagraphHandling::OnlySentence) {
			Ok(matches) => {
				let rebased = rebase_to_paragraph(matches, &sentences);
				self.results[CACHE_SENTENCE].lock().put(flat_index, rebased);
			}
			Err(error) => {
				// The hole still gets filled; the worker and callback must
				// survive a failing engine.
				warn!(doc_id = ?self.id, flat_index, %error, "sentence check failed");
				self.results[CACHE_SENTENCE].lock().put(flat_index, Vec::new());
			}
		}
	}

	/// Collects every cached class row for the paragraph; missing
	/// text-level rows are enqueued instead of computed here.
	fn merge_cached(
		&self,
		flat_index: usize,
		queues: &Queues,
		config: &EngineConfig,
	) -> Vec<CheckMatch> {
		let mut merged = Vec::new();
		// Fixed cache order; the shifter takes the same order.
		for cache_index in 0..CACHE_COUNT {
			let row = self.results[cache_index].lock().get(flat_index).map(<[CheckMatch]>::to_vec);
			match row {
				Some(matches) => merged.extend(matches),
				None if cache_index >= CACHE_TEXT_FIRST => {
					self.enqueue_class(flat_index, cache_index, queues, config, false);
				}
				None => {}
			}
		}
		merged
	}

	fn filter_ignored(&self, flat_index: usize, matches: Vec<CheckMatch>) -> Vec<CheckMatch> {
		let ignored = self.ignored.lock();
		let permanent = self.permanent.lock();
		matches
			.into_iter()
			.filter(|m| {
				!ignored.is_ignored(flat_index, &m.rule_id, m.start, m.length)
					&& !permanent.is_ignored(flat_index, &m.rule_id, m.start, m.length)
			})
			.collect()
	}

	fn filter_quotes(
		&self,
		flat_index: usize,
		matches: Vec<CheckMatch>,
		config: &EngineConfig,
	) -> Vec<CheckMatch> {
		let lists = self
			.cache
			.try_with(|data| {
				data.quote_lists(flat_index)
					.map(|(opening, closing)| (opening.to_vec(), closing.to_vec()))
			})
			.flatten();
		match lists {
			Some((opening, closing)) => crate::cache::quotes::filter_direct_speech(
				matches,
				&opening,
				&closing,
				config.direct_speech,
			),
			None => matches,
		}
	}

	/// Applies a structural change to every store keyed by flat index and
	/// re-enqueues the changed region.
	pub(crate) fn apply_shift(&self, range: &ChangedRange, queues: &Queues, config: &EngineConfig) {
		// Caches first, in index order, then the ignore stores: the same
		// order the merge path takes.
		for cache in &self.results {
			cache.lock().shift(range);
		}
		self.ignored.lock().shift(range);
		self.permanent.lock().shift(range);

		let shown: Vec<usize> = (range.from..range.to).take(MAX_PRINTED_PARAS).collect();
		debug!(doc_id = ?self.id, ?range, changed = ?shown, "structural shift applied");
		for flat_index in range.from..range.to {
			self.enqueue_paragraph(flat_index, queues, config, false);
		}
	}

	/// Drops every cached result for one paragraph.
	pub(crate) fn invalidate_paragraph(&self, flat_index: usize) {
		for cache in &self.results {
			cache.lock().remove(flat_index);
		}
		self.cache.with_mut(|data| data.invalidate_analysis(flat_index));
	}

	/// Queues every text-level class (and the AI classes when enabled) for
	/// one paragraph.
	pub(crate) fn enqueue_paragraph(
		&self,
		flat_index: usize,
		queues: &Queues,
		config: &EngineConfig,
		override_running: bool,
	) {
		for cache_index in CACHE_TEXT_FIRST..CACHE_TEXT_FIRST + config.text_level_classes {
			self.enqueue_class(flat_index, cache_index, queues, config, override_running);
		}
		if config.ai_enabled {
			self.enqueue_class(flat_index, CACHE_AI, queues, config, override_running);
			self.enqueue_class(flat_index, CACHE_AI_SUGGESTION, queues, config, override_running);
		}
	}

	fn enqueue_class(
		&self,
		flat_index: usize,
		cache_index: usize,
		queues: &Queues,
		config: &EngineConfig,
		override_running: bool,
	) {
		let Some(Some(coord)) = self.cache.try_with(|data| data.text_coord(flat_index)) else {
			return;
		};
		if coord.is_unknown() {
			// No multi-paragraph results by construction; fill the row.
			self.results[cache_index].lock().put(flat_index, Vec::new());
			return;
		}
		let entry = QueueEntry {
			start: coord,
			end: TextCoord::new(coord.kind, coord.index + 1),
			cache_index,
			check_radius: class_radius(cache_index),
			doc_id: self.id,
			override_running,
		};
		let queue = if cache_index >= CACHE_AI {
			match &queues.ai {
				Some(queue) if config.ai_enabled => queue,
				_ => return,
			}
		} else {
			&queues.text
		};
		queue.add_entry(entry);
	}

	/// Runs one queued text-level entry. Called from the worker thread
	/// only; `engine` is `None` for unsupported languages, in which case
	/// empty rows are still recorded.
	pub(crate) fn run_entry(
		&self,
		entry: &QueueEntry,
		mut engine: Option<&mut dyn RuleEngine>,
		interrupt: &AtomicBool,
	) {
		if self.is_disposed() {
			return;
		}
		for index in entry.start.index..entry.end.index {
			if interrupt.load(Ordering::Acquire) {
				debug!(doc_id = ?self.id, "check run interrupted");
				return;
			}
			let coord = TextCoord::new(entry.start.kind, index);
			self.check_one_paragraph(coord, entry, &mut engine);
		}
	}

	/// Checks one paragraph of an entry's range and stores its row.
	fn check_one_paragraph(
		&self,
		coord: TextCoord,
		entry: &QueueEntry,
		engine: &mut Option<&mut dyn RuleEngine>,
	) {
		let prepared = self.cache.with_mut(|data| {
			let flat_index = data.flat_of(coord)?;
			if data.is_automatic(flat_index) {
				return Some((flat_index, Vec::new(), Vec::new()));
			}
			let radius = if entry.check_radius <= COVER_ALL_RADIUS {
				0
			} else {
				entry.check_radius.max(0) as usize
			};
			let clip_to_chapter = entry.check_radius > COVER_ALL_RADIUS;
			let (start, end) = data.check_window(coord, radius, false, clip_to_chapter);
			let (_, offsets) = data.window_text(coord.kind, start, end, false);

			// Analyses are per paragraph; rebase them onto the window.
			let mut sentences = Vec::new();
			for &(flat, offset) in &offsets {
				for sentence in data.analyzed(flat) {
					let mut s = sentence.clone();
					s.start += offset;
					sentences.push(s);
				}
			}
			Some((flat_index, sentences, offsets))
		});
		let Some(Some((flat_index, sentences, offsets))) = prepared else {
			return;
		};

		let row = match engine.as_deref_mut() {
			Some(engine) => match engine.check(&sentences, ParagraphHandling::OnlyParagraph) {
				Ok(matches) => select_paragraph_matches(matches, flat_index, &offsets),
				Err(error) => {
					warn!(doc_id = ?self.id, flat_index, %error, "text-level check failed");
					Vec::new()
				}
			},
			None => Vec::new(),
		};

		let changed = {
			let mut cache = self.results[entry.cache_index].lock();
			let changed = cache.get(flat_index) != Some(row.as_slice());
			cache.put(flat_index, row);
			changed
		};
		if changed {
			self.host.schedule_remark(flat_index);
		}
	}

	/// Runs one queued AI entry: one remote detection per paragraph of the
	/// range, gated by the local rules in grammar mode.
	pub(crate) fn run_ai_entry(
		&self,
		entry: &QueueEntry,
		adapter: &crate::ai::AiAdapter,
		mut engine: Option<&mut dyn RuleEngine>,
		spell: Option<&dyn galley_host::SpellService>,
		interrupt: &AtomicBool,
	) {
		let mode = if entry.cache_index == CACHE_AI {
			crate::ai::AiMode::Grammar
		} else {
			crate::ai::AiMode::Rewrite
		};
		for index in entry.start.index..entry.end.index {
			if interrupt.load(Ordering::Acquire) || self.is_disposed() {
				return;
			}
			let coord = TextCoord::new(entry.start.kind, index);
			let prepared = self.cache.try_with(|data| {
				let flat_index = data.flat_of(coord)?;
				if data.is_automatic(flat_index) {
					return None;
				}
				let text = data.doc_as_string(coord, 0, true, true, false);
				let locale = data.locale(flat_index)?.clone();
				Some((flat_index, text, locale))
			});
			let Some(Some((flat_index, text, locale))) = prepared else {
				continue;
			};
			let row = match adapter.detect(&text, &locale, mode, &mut engine, spell) {
				Ok(matches) => matches,
				Err(error) => {
					// Timeouts and bad responses count as "nothing found
					// this pass"; the next edit retries.
					debug!(doc_id = ?self.id, flat_index, %error, "AI detection failed");
					Vec::new()
				}
			};
			let changed = {
				let mut cache = self.results[entry.cache_index].lock();
				let changed = cache.get(flat_index) != Some(row.as_slice());
				cache.put(flat_index, row);
				changed
			};
			if changed {
				self.host.schedule_remark(flat_index);
			}
		}
	}

	/// The first paragraph missing a row in any of the given classes.
	/// Unknown and automatic paragraphs get their rows filled on the spot
	/// so the scan terminates.
	pub(crate) fn first_hole(&self, cache_indices: &[usize]) -> Option<QueueEntry> {
		let snapshot = self.cache.try_with(|data| {
			(0..data.len())
				.map(|i| (data.text_coord(i), data.is_automatic(i)))
				.collect::<Vec<_>>()
		})?;
		for (flat_index, (coord, automatic)) in snapshot.into_iter().enumerate() {
			for &cache_index in cache_indices {
				if self.results[cache_index].lock().has(flat_index) {
					continue;
				}
				let coord = match coord {
					Some(coord) if !coord.is_unknown() && !automatic => coord,
					_ => {
						self.results[cache_index].lock().put(flat_index, Vec::new());
						continue;
					}
				};
				return Some(QueueEntry {
					start: coord,
					end: TextCoord::new(coord.kind, coord.index + 1),
					cache_index,
					check_radius: class_radius(cache_index),
					doc_id: self.id,
					override_running: false,
				});
			}
		}
		None
	}

	/// Snapshot of the cache contents for persistence.
	pub(crate) fn cache_snapshot(&self) -> Option<CacheData> {
		self.cache.with(|data| data.clone())
	}

	pub(crate) fn restore_cache(&self, data: CacheData) {
		self.cache.restore(data);
	}

	pub(crate) fn result_snapshots(&self) -> Vec<ResultCache> {
		self.results.iter().map(|cache| cache.lock().clone()).collect()
	}

	pub(crate) fn restore_results(&self, caches: Vec<ResultCache>) {
		for (slot, cache) in self.results.iter().zip(caches) {
			*slot.lock() = cache;
		}
	}
}

/// Rebase matches from sentence-local to paragraph-local offsets.
fn rebase_to_paragraph(matches: Vec<CheckMatch>, sentences: &[AnalyzedSentence]) -> Vec<CheckMatch> {
	// The engine reports offsets into the concatenated sentence text; each
	// sentence knows its own paragraph offset.
	let mut boundaries = Vec::with_capacity(sentences.len());
	let mut concat_offset = 0;
	for sentence in sentences {
		boundaries.push((concat_offset, sentence.start));
		concat_offset += sentence.text.len();
	}
	matches
		.into_iter()
		.filter_map(|mut m| {
			let &(concat_start, para_start) = boundaries
				.iter()
				.rev()
				.find(|&&(concat_start, _)| concat_start <= m.start)?;
			m.start = m.start - concat_start + para_start;
			Some(m)
		})
		.collect()
}

/// Keeps the matches belonging to the target paragraph of a window check,
/// rebased to paragraph-local offsets.
fn select_paragraph_matches(
	matches: Vec<CheckMatch>,
	flat_index: usize,
	offsets: &[(usize, usize)],
) -> Vec<CheckMatch> {
	let Some(position) = offsets.iter().position(|&(flat, _)| flat == flat_index) else {
		return Vec::new();
	};
	let start = offsets[position].1;
	let end = offsets.get(position + 1).map(|&(_, o)| o).unwrap_or(usize::MAX);
	matches
		.into_iter()
		.filter(|m| m.start >= start && m.start < end)
		.map(|mut m| {
			m.start -= start;
			m
		})
		.collect()
}

/// True when `new` beats `old` under the discard policy.
fn stronger(new: &CheckMatch, old: &CheckMatch) -> bool {
	// A plain grammar error outranks style and AI findings.
	if new.is_default_rule() != old.is_default_rule() {
		return new.is_default_rule();
	}
	// A single concrete suggestion outranks a pick list.
	let single_new = new.suggestions.len() == 1;
	let single_old = old.suggestions.len() == 1;
	if single_new != single_old {
		return single_new;
	}
	// Any suggestion outranks none.
	let has_new = !new.suggestions.is_empty();
	let has_old = !old.suggestions.is_empty();
	if has_new != has_old {
		return has_new;
	}
	// Stable tie-break: the later candidate wins.
	true
}

/// Resolves overlapping errors.
///
/// With `drop` set, overlapping pairs keep only the stronger error. Without
/// it, a fully contained error splits its coverer into head and tail
/// (possibly zero-length); the contained error itself survives only when it
/// is not the weaker of the two. Partially overlapping, non-nested errors
/// are left alone.
pub(crate) fn filter_overlapping_errors(errors: Vec<CheckMatch>, drop: bool) -> Vec<CheckMatch> {
	if errors.len() < 2 {
		return errors;
	}
	if drop {
		let mut kept: Vec<CheckMatch> = Vec::new();
		for m in errors {
			match kept.last() {
				Some(last) if last.overlaps(&m) => {
					if stronger(&m, last) {
						kept.pop();
						kept.push(m);
					}
				}
				_ => kept.push(m),
			}
		}
		return kept;
	}

	let mut out: Vec<CheckMatch> = Vec::new();
	for m in errors {
		let covering = out
			.iter()
			.rposition(|p| p.covers(&m) && !(p.start == m.start && p.length == m.length));
		let Some(position) = covering else {
			out.push(m);
			continue;
		};
		let coverer = out.remove(position);
		let mut head = coverer.clone();
		head.length = m.start - coverer.start;
		let mut tail = coverer.clone();
		tail.start = m.end();
		tail.length = coverer.end() - m.end();
		let keep_covered = stronger(&m, &coverer);
		out.insert(position, head);
		if keep_covered {
			out.push(m);
		}
		out.push(tail);
	}
	out
}

/// Adds thesaurus synonyms to AI suggestion matches, deduplicated and
/// capped.
fn augment_suggestions(
	matches: &mut [CheckMatch],
	request: &CheckRequest,
	thesaurus: &dyn Thesaurus,
	max_suggestions: usize,
) {
	for m in matches.iter_mut().filter(|m| m.flags.contains(MatchFlags::AI)) {
		let Some(word) = request.text.get(m.start..m.start + m.length) else {
			continue;
		};
		for synonym in thesaurus.synonyms(word, &request.locale) {
			if m.suggestions.len() >= max_suggestions {
				break;
			}
			if !m.suggestions.contains(&synonym) {
				m.suggestions.push(synonym);
			}
		}
		if m.suggestions.len() > max_suggestions {
			m.suggestions.truncate(max_suggestions);
		}
	}
}
