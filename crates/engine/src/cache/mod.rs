//! The document cache.
//!
//! One [`DocumentCache`] mirrors one open document: every flat paragraph
//! with its locale, footnote offsets and tracked deletions, the flat↔typed
//! mapping, chapter boundaries, quote spans, and cached paragraph analyses.
//! All of it lives in a single owned [`CacheData`] behind a reader/writer
//! lock, so a refresh swaps the whole model atomically. The cache state is
//! explicit: readers that observe [`CacheState::Refreshing`] either wait on
//! the notifier or, on the host's blocking result path, bail out with an
//! empty answer instead of stalling the host.

mod extract;
pub(crate) mod mapping;
pub(crate) mod quotes;

use std::sync::atomic::{AtomicBool, Ordering};

use galley_host::{DocumentHost, FlatSnapshot, KindSnapshot};
use galley_primitives::{
	AnalyzedSentence, ChangedRange, Locale, TextCoord, TextKind, analyze_paragraph,
};
use parking_lot::{Condvar, Mutex, RwLock};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use tracing::warn;

use crate::config::QuotePair;
use crate::error::{StepError, StepResult};

/// Lifecycle state of a cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheState {
	/// Contents are current.
	Idle,
	/// A rebuild is in flight; the writer lock will be taken shortly.
	Refreshing,
	/// Contents diverged from the host; the next request must refresh.
	Dirty,
}

/// Everything the engine knows about one document, swapped as a unit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheData {
	pub(crate) paragraphs: Vec<String>,
	pub(crate) locales: Vec<Locale>,
	pub(crate) footnotes: Vec<Vec<usize>>,
	pub(crate) deleted: Vec<Option<Vec<usize>>>,
	pub(crate) to_text: Vec<TextCoord>,
	pub(crate) to_flat: FxHashMap<TextKind, Vec<isize>>,
	pub(crate) chapter_begins: FxHashMap<TextKind, Vec<usize>>,
	/// Auto-generated body-text paragraphs, sorted; never checked.
	pub(crate) automatic: Vec<usize>,
	pub(crate) sorted_text_ids: Option<Vec<u64>>,
	pub(crate) element_count: Option<usize>,
	/// Quote-mark offsets per body-text paragraph; a leading `-1` opening
	/// marks a paragraph that starts inside an unclosed quote.
	pub(crate) opening_quotes: Vec<SmallVec<[isize; 4]>>,
	pub(crate) closing_quotes: Vec<SmallVec<[isize; 4]>>,
	/// Cached tokenisations; an entry never outlives an edit to its
	/// paragraph.
	pub(crate) analyzed: FxHashMap<usize, Vec<AnalyzedSentence>>,
	/// Most frequent supported locale across the document.
	pub(crate) doc_locale: Option<Locale>,
}

impl CacheData {
	/// Number of flat paragraphs.
	pub fn len(&self) -> usize {
		self.paragraphs.len()
	}

	pub fn is_empty(&self) -> bool {
		self.paragraphs.is_empty()
	}

	/// True when the document has no text at all.
	pub fn has_no_content(&self) -> bool {
		self.paragraphs.iter().all(|p| p.is_empty())
	}

	pub fn paragraph(&self, flat_index: usize) -> Option<&str> {
		self.paragraphs.get(flat_index).map(String::as_str)
	}

	pub fn locale(&self, flat_index: usize) -> Option<&Locale> {
		self.locales.get(flat_index)
	}

	pub fn text_coord(&self, flat_index: usize) -> Option<TextCoord> {
		self.to_text.get(flat_index).copied()
	}

	/// Flat index of a typed coordinate; `None` for unknown or unmapped
	/// coordinates.
	pub fn flat_of(&self, coord: TextCoord) -> Option<usize> {
		if coord.is_unknown() {
			return None;
		}
		let slot = *self.to_flat.get(&coord.kind)?.get(coord.index)?;
		(slot >= 0).then_some(slot as usize)
	}

	pub fn kind_len(&self, kind: TextKind) -> usize {
		self.to_flat.get(&kind).map(Vec::len).unwrap_or(0)
	}

	pub fn doc_locale(&self) -> Option<&Locale> {
		self.doc_locale.as_ref()
	}

	/// True for auto-generated paragraphs the engine must not check.
	pub fn is_automatic(&self, flat_index: usize) -> bool {
		match self.text_coord(flat_index) {
			Some(coord) if coord.kind == TextKind::Text => {
				self.automatic.binary_search(&coord.index).is_ok()
			}
			_ => false,
		}
	}

	/// The chapter `[start, end)` containing a typed position: bounded by
	/// the surrounding chapter begins, or by the kind's ends.
	pub fn chapter_bounds(&self, kind: TextKind, index: usize) -> (usize, usize) {
		let len = self.kind_len(kind);
		let Some(begins) = self.chapter_begins.get(&kind) else {
			return (0, len);
		};
		let start = begins.iter().rev().find(|&&b| b <= index).copied().unwrap_or(0);
		let end = begins.iter().find(|&&b| b > index).copied().unwrap_or(len);
		(start, end.max(start))
	}

	/// True when multi-paragraph rules cannot produce results for this
	/// paragraph by construction: it is unmapped, or it is a chapter of
	/// its own.
	pub fn is_single_paragraph(&self, flat_index: usize) -> bool {
		let Some(coord) = self.text_coord(flat_index) else {
			return true;
		};
		if coord.is_unknown() {
			return true;
		}
		let (start, end) = self.chapter_bounds(coord.kind, coord.index);
		coord.index == start && end == start + 1
	}

	/// The cached analysis of a paragraph, tokenising on first use.
	pub fn analyzed(&mut self, flat_index: usize) -> &[AnalyzedSentence] {
		if !self.analyzed.contains_key(&flat_index) {
			let sentences = self
				.paragraph(flat_index)
				.map(analyze_paragraph)
				.unwrap_or_default();
			self.analyzed.insert(flat_index, sentences);
		}
		self.analyzed.get(&flat_index).map(Vec::as_slice).unwrap_or_default()
	}

	pub(crate) fn invalidate_analysis(&mut self, flat_index: usize) {
		self.analyzed.remove(&flat_index);
	}

	/// Replaces one flat paragraph in place and invalidates everything
	/// derived from it.
	pub(crate) fn set_paragraph(
		&mut self,
		flat_index: usize,
		text: String,
		locale: Locale,
		footnotes: Vec<usize>,
		deleted: Option<Vec<usize>>,
		quotes: &QuotePair,
	) {
		if flat_index >= self.len() {
			return;
		}
		self.paragraphs[flat_index] = text;
		self.locales[flat_index] = locale;
		self.footnotes[flat_index] = footnotes;
		self.deleted[flat_index] = deleted;
		self.invalidate_analysis(flat_index);
		if let Some(coord) = self.text_coord(flat_index) {
			if coord.kind == TextKind::Text {
				self.update_quote_info(coord.index, quotes);
			}
		}
	}

	/// Rescans quote marks from one body-text paragraph forward until the
	/// carried open-quote flag stabilises.
	pub(crate) fn update_quote_info(&mut self, text_index: usize, quotes: &QuotePair) {
		let count = self.kind_len(TextKind::Text);
		if text_index >= count || self.opening_quotes.len() != count {
			return;
		}
		for t in text_index..count {
			let starts_open = t > 0 && ends_open(&self.opening_quotes[t - 1], &self.closing_quotes[t - 1]);
			let Some(flat_index) = self.flat_of(TextCoord::new(TextKind::Text, t)) else {
				continue;
			};
			let scan = quotes::scan_paragraph(&self.paragraphs[flat_index], starts_open, quotes);
			let changed =
				scan.opening != self.opening_quotes[t] || scan.closing != self.closing_quotes[t];
			self.opening_quotes[t] = scan.opening;
			self.closing_quotes[t] = scan.closing;
			if t > text_index && !changed {
				break;
			}
		}
	}

	/// Quote-mark offsets of the body-text paragraph containing a flat
	/// index, when it has any.
	pub(crate) fn quote_lists(&self, flat_index: usize) -> Option<(&[isize], &[isize])> {
		let coord = self.text_coord(flat_index)?;
		if coord.kind != TextKind::Text {
			return None;
		}
		Some((
			self.opening_quotes.get(coord.index)?.as_slice(),
			self.closing_quotes.get(coord.index)?.as_slice(),
		))
	}
}

/// One opening more than closings means the paragraph ends inside a quote.
fn ends_open(opening: &[isize], closing: &[isize]) -> bool {
	opening.len() > closing.len()
}

/// The lock- and state-carrying owner of a [`CacheData`].
pub struct DocumentCache {
	data: RwLock<CacheData>,
	state: Mutex<CacheState>,
	state_changed: Condvar,
	disposed: AtomicBool,
}

impl Default for DocumentCache {
	fn default() -> Self {
		Self::new()
	}
}

impl DocumentCache {
	/// Creates an empty cache; the first request refreshes it.
	pub fn new() -> Self {
		Self {
			data: RwLock::new(CacheData::default()),
			state: Mutex::new(CacheState::Dirty),
			state_changed: Condvar::new(),
			disposed: AtomicBool::new(false),
		}
	}

	/// Restores a cache from persisted data.
	pub fn from_data(data: CacheData) -> Self {
		Self {
			data: RwLock::new(data),
			state: Mutex::new(CacheState::Idle),
			state_changed: Condvar::new(),
			disposed: AtomicBool::new(false),
		}
	}

	/// Replaces the contents with persisted data and marks the cache idle.
	pub fn restore(&self, data: CacheData) {
		if self.is_disposed() {
			return;
		}
		*self.data.write() = data;
		let mut state = self.state.lock();
		if *state != CacheState::Refreshing {
			*state = CacheState::Idle;
		}
		self.state_changed.notify_all();
	}

	pub fn state(&self) -> CacheState {
		*self.state.lock()
	}

	/// Forces a refresh on the next request.
	pub fn mark_dirty(&self) {
		let mut state = self.state.lock();
		if *state == CacheState::Idle {
			*state = CacheState::Dirty;
		}
	}

	pub fn dispose(&self) {
		self.disposed.store(true, Ordering::Release);
		self.state_changed.notify_all();
	}

	pub fn is_disposed(&self) -> bool {
		self.disposed.load(Ordering::Acquire)
	}

	/// Runs a reader against the cache, waiting out an in-flight refresh.
	/// `None` once the document is disposed.
	pub fn with<R>(&self, f: impl FnOnce(&CacheData) -> R) -> Option<R> {
		{
			let mut state = self.state.lock();
			while *state == CacheState::Refreshing {
				if self.is_disposed() {
					return None;
				}
				self.state_changed.wait(&mut state);
			}
		}
		if self.is_disposed() {
			return None;
		}
		Some(f(&self.data.read()))
	}

	/// Non-blocking reader for the host's blocked result path: `None` when
	/// a refresh is in flight instead of waiting for it.
	pub fn try_with<R>(&self, f: impl FnOnce(&CacheData) -> R) -> Option<R> {
		if self.is_disposed() || *self.state.lock() == CacheState::Refreshing {
			return None;
		}
		Some(f(&self.data.read()))
	}

	/// Runs a writer against the cache.
	pub fn with_mut<R>(&self, f: impl FnOnce(&mut CacheData) -> R) -> Option<R> {
		{
			let mut state = self.state.lock();
			while *state == CacheState::Refreshing {
				if self.is_disposed() {
					return None;
				}
				self.state_changed.wait(&mut state);
			}
		}
		if self.is_disposed() {
			return None;
		}
		Some(f(&mut self.data.write()))
	}

	/// Rebuilds the cache from the host.
	///
	/// Snapshots are read without holding the data lock; the finished model
	/// is swapped in under the writer lock. Paragraph analyses surviving
	/// the structural change are carried over, translated by the change.
	/// Returns the change against the previous contents, `None` when this
	/// was the first fill or nothing moved.
	pub fn refresh(
		&self,
		host: &dyn DocumentHost,
		quotes: &QuotePair,
		supports: &dyn Fn(&Locale) -> bool,
	) -> StepResult<Option<ChangedRange>> {
		if self.is_disposed() {
			return Err(StepError::Disposed);
		}
		{
			let mut state = self.state.lock();
			while *state == CacheState::Refreshing {
				if self.is_disposed() {
					return Err(StepError::Disposed);
				}
				self.state_changed.wait(&mut state);
			}
			*state = CacheState::Refreshing;
		}

		let result = self.rebuild(host, quotes, supports);

		let mut state = self.state.lock();
		*state = match &result {
			Ok((_, Some(desync))) => {
				// One summary per refresh; requests now force refreshes
				// until a rebuild aligns again.
				warn!(error = %desync, "document cache rebuilt out of sync");
				CacheState::Dirty
			}
			Ok((_, None)) => CacheState::Idle,
			Err(_) => CacheState::Dirty,
		};
		self.state_changed.notify_all();
		result.map(|(range, _)| range)
	}

	fn rebuild(
		&self,
		host: &dyn DocumentHost,
		quotes: &QuotePair,
		supports: &dyn Fn(&Locale) -> bool,
	) -> StepResult<(Option<ChangedRange>, Option<StepError>)> {
		let flat = host.flat_snapshot().map_err(StepError::TransientHostCall)?;
		let mut kinds = Vec::with_capacity(TextKind::MAPPED.len());
		for kind in TextKind::MAPPED {
			kinds.push(host.kind_snapshot(kind).map_err(StepError::TransientHostCall)?);
		}

		let (new_data, desync) = build_data(&flat, &kinds, quotes, supports);
		let mut data = self.data.write();
		let range = structural_diff(&data, &new_data);
		let old = std::mem::replace(&mut *data, new_data);
		carry_over_analyses(&mut data, old, range);
		Ok((range, desync))
	}
}

/// Builds a complete [`CacheData`] from host snapshots, reporting a mapping
/// desync the repair pass could not fix.
fn build_data(
	flat: &FlatSnapshot,
	kinds: &[KindSnapshot],
	quotes: &QuotePair,
	supports: &dyn Fn(&Locale) -> bool,
) -> (CacheData, Option<StepError>) {
	let outcome = mapping::build_mapping(flat, kinds);
	let desync = outcome.dirty.then(|| StepError::CacheDesync {
		unmatched: outcome.unmatched + outcome.unmatched_text,
		total: flat.len(),
	});
	let mut data = CacheData {
		paragraphs: flat.paragraphs.iter().map(|p| p.text.clone()).collect(),
		locales: flat.paragraphs.iter().map(|p| p.locale.clone()).collect(),
		footnotes: flat.paragraphs.iter().map(|p| p.footnotes.clone()).collect(),
		deleted: vec![None; flat.len()],
		to_text: outcome.to_text,
		to_flat: outcome.to_flat,
		chapter_begins: outcome.chapter_begins,
		automatic: Vec::new(),
		sorted_text_ids: flat.node_ids(),
		element_count: flat.element_count,
		opening_quotes: Vec::new(),
		closing_quotes: Vec::new(),
		analyzed: FxHashMap::default(),
		doc_locale: None,
	};

	for ks in kinds {
		if ks.kind == TextKind::Text {
			data.automatic = ks.automatic.clone();
			data.automatic.sort_unstable();
		}
		// Tracked deletions live on the typed side; fold them onto the
		// mapped flat paragraphs.
		if let Some(slots) = data.to_flat.get(&ks.kind) {
			for (index, &slot) in slots.iter().enumerate() {
				if slot < 0 {
					continue;
				}
				if let Some(Some(offsets)) = ks.deleted.get(index) {
					data.deleted[slot as usize] = Some(offsets.clone());
				}
			}
		}
	}

	rebuild_quotes(&mut data, quotes);
	data.doc_locale = majority_locale(&data.locales, supports);
	(data, desync)
}

/// Scans every body-text paragraph, carrying the open-quote flag forward.
fn rebuild_quotes(data: &mut CacheData, quotes: &QuotePair) {
	let count = data.kind_len(TextKind::Text);
	data.opening_quotes = vec![SmallVec::new(); count];
	data.closing_quotes = vec![SmallVec::new(); count];
	let mut starts_open = false;
	for t in 0..count {
		let Some(flat_index) = data.flat_of(TextCoord::new(TextKind::Text, t)) else {
			continue;
		};
		let scan = quotes::scan_paragraph(&data.paragraphs[flat_index], starts_open, quotes);
		starts_open = scan.ends_open;
		data.opening_quotes[t] = scan.opening;
		data.closing_quotes[t] = scan.closing;
	}
}

/// The most frequent supported, non-multilingual locale.
fn majority_locale(locales: &[Locale], supports: &dyn Fn(&Locale) -> bool) -> Option<Locale> {
	let mut counts: FxHashMap<&Locale, usize> = FxHashMap::default();
	for locale in locales {
		if !locale.is_multilingual() && supports(locale) {
			*counts.entry(locale).or_insert(0) += 1;
		}
	}
	counts
		.into_iter()
		.max_by_key(|&(_, count)| count)
		.map(|(locale, _)| locale.clone())
}

/// Maximal unchanged prefix/suffix diff of the old and new flat lists.
///
/// Header/footer paragraphs compare equal regardless of content: a save
/// rewrites headers, and that must not invalidate the body. Returns `None`
/// when nothing changed or the old cache was empty (first fill).
pub(crate) fn structural_diff(old: &CacheData, new: &CacheData) -> Option<ChangedRange> {
	if old.is_empty() {
		return None;
	}
	let old_len = old.len();
	let new_len = new.len();
	let is_hf = |data: &CacheData, i: usize| {
		data.to_text
			.get(i)
			.is_some_and(|c| c.kind == TextKind::HeaderFooter)
	};
	let eq = |i: usize, j: usize| {
		is_hf(old, i) || is_hf(new, j) || old.paragraphs[i] == new.paragraphs[j]
	};

	let mut prefix = 0;
	while prefix < old_len && prefix < new_len && eq(prefix, prefix) {
		prefix += 1;
	}
	if prefix == old_len && old_len == new_len {
		return None;
	}
	let max_suffix = old_len.min(new_len) - prefix;
	let mut suffix = 0;
	while suffix < max_suffix && eq(old_len - 1 - suffix, new_len - 1 - suffix) {
		suffix += 1;
	}

	Some(ChangedRange {
		from: prefix,
		to: new_len - suffix,
		old_size: old_len,
		new_size: new_len,
	})
}

/// Moves still-valid paragraph analyses from the replaced data into the new
/// one, translated across the change.
fn carry_over_analyses(data: &mut CacheData, old: CacheData, range: Option<ChangedRange>) {
	let analyzed = old.analyzed;
	for (index, sentences) in analyzed {
		let target = match range {
			Some(range) => range.translate(index),
			None if data.paragraph(index) == old.paragraphs.get(index).map(String::as_str) => {
				Some(index)
			}
			None => None,
		};
		let Some(target) = target else {
			continue;
		};
		// An analysis only survives when the paragraph really is the same.
		if data.paragraph(target) == old.paragraphs.get(index).map(String::as_str) {
			data.analyzed.insert(target, sentences);
		}
	}
}
