//! Check-request resolution.
//!
//! The host's proofing callback names no paragraph: it delivers text, a
//! locale, footnote positions and (from newer hosts) a stable node id. The
//! analyzer decides which flat paragraph the callback is about, reacting to
//! insertions, deletions, reorderings and stale requests, and reports the
//! structural shift the rest of the engine has to apply when the document
//! diverged.
//!
//! One rule is absolute: while the host is blocked on a
//! [`ProofReason::GetProofResult`] request, the analyzer answers from cache
//! only. Starting a refresh there would deadlock the host.

use galley_host::{CheckRequest, DocumentHost, ProofReason};
use galley_primitives::{ChangedRange, Locale, TextKind};
use tracing::debug;

use crate::cache::{CacheState, DocumentCache};
use crate::config::QuotePair;
use crate::error::StepResult;

/// Mutable resolution memory, owned by the document.
#[derive(Debug, Default)]
pub(crate) struct AnalyzerState {
	/// The flat index resolved by the previous request.
	pub last_flat: Option<usize>,
	/// Flat position of the view cursor, cached from the last host query.
	pub cursor_flat: Option<usize>,
}

/// What a request resolved to.
#[derive(Debug, Default)]
pub(crate) struct AnalyzeOutcome {
	/// The paragraph the request is about; `None` means "answer empty".
	pub flat_index: Option<usize>,
	/// Structural change detected during resolution. The caller must apply
	/// it to every result cache, the ignore stores, and the queues before
	/// serving the request.
	pub shift: Option<ChangedRange>,
	/// The paragraph was found but its cached content was stale and has
	/// been updated in place; its result rows must be invalidated and the
	/// paragraph re-enqueued.
	pub content_changed: bool,
}

impl AnalyzeOutcome {
	fn found(flat_index: usize) -> Self {
		Self {
			flat_index: Some(flat_index),
			..Self::default()
		}
	}
}

/// Resolves one host callback against the cache.
pub(crate) fn analyze(
	cache: &DocumentCache,
	host: &dyn DocumentHost,
	state: &mut AnalyzerState,
	request: &CheckRequest,
	quotes: &QuotePair,
	supports: &dyn Fn(&Locale) -> bool,
) -> StepResult<AnalyzeOutcome> {
	let blocking = request.reason == ProofReason::GetProofResult;

	// A dirty cache forces a refresh; the fast paths would serve a model
	// known to diverge. Blocked requests still answer from it, stale or
	// not, because refreshing is off the table for them.
	let must_refresh = cache.state() == CacheState::Dirty;
	if !must_refresh || blocking {
		if let Some(outcome) = resolve_cached(cache, state, request, blocking, quotes) {
			return Ok(outcome);
		}
	}
	if blocking {
		// Unknown while the host is blocked: empty answer, no refresh.
		debug!("unresolved blocking request answered empty");
		return Ok(AnalyzeOutcome::default());
	}

	// The cache diverged from the document; rebuild and shift.
	let shift = cache.refresh(host, quotes, supports)?;
	if let (Some(range), Some(last)) = (shift, state.last_flat) {
		state.last_flat = range.translate(last);
	}
	if let (Some(range), Some(cursor)) = (shift, state.cursor_flat) {
		state.cursor_flat = range.translate(cursor);
	}

	// The cursor is asked first: with duplicated paragraph texts it is the
	// only way to tell which copy the user is editing.
	let mut outcome = resolve_cached(cache, state, request, false, quotes)
		.or_else(|| adopt_view_cursor(cache, host, state, request))
		.or_else(|| resolve_by_scan(cache, state, request))
		.unwrap_or_default();
	outcome.shift = shift;
	Ok(outcome)
}

/// Node-id and next-position lookups; no host calls, no refresh.
fn resolve_cached(
	cache: &DocumentCache,
	state: &mut AnalyzerState,
	request: &CheckRequest,
	blocking: bool,
	quotes: &QuotePair,
) -> Option<AnalyzeOutcome> {
	let read = |f: &dyn Fn(&crate::cache::CacheData) -> Option<AnalyzeOutcome>| {
		if blocking {
			cache.try_with(|data| f(data)).flatten()
		} else {
			cache.with(|data| f(data)).flatten()
		}
	};

	// Exact lookup through the stable node id.
	if let (Some(node_id), Some(count)) = (request.node_id, request.element_count) {
		let by_id = read(&|data| {
			if data.element_count != Some(count) {
				return None;
			}
			let index = data
				.sorted_text_ids
				.as_ref()?
				.iter()
				.position(|&id| id == node_id)?;
			Some(if request_matches(data, index, request) {
				AnalyzeOutcome::found(index)
			} else if blocking {
				// Stale content, host blocked: serve what the cache has.
				AnalyzeOutcome::found(index)
			} else {
				AnalyzeOutcome {
					flat_index: Some(index),
					shift: None,
					content_changed: true,
				}
			})
		});
		if let Some(outcome) = by_id {
			if outcome.content_changed {
				update_in_place(cache, outcome.flat_index?, request, quotes);
			}
			state.last_flat = outcome.flat_index;
			return Some(outcome);
		}
	}

	// Position heuristic: the paragraph after the last resolved one, the
	// last one itself, and (while blocked) the cached cursor position.
	let mut candidates = Vec::with_capacity(3);
	if let Some(last) = state.last_flat {
		candidates.push(last + 1);
		candidates.push(last);
	}
	if blocking {
		if let Some(cursor) = state.cursor_flat {
			candidates.push(cursor);
		}
	}
	let by_position = read(&|data| {
		candidates
			.iter()
			.find(|&&c| data.paragraph(c) == Some(request.text.as_str()))
			.map(|&c| AnalyzeOutcome::found(c))
	});
	if let Some(outcome) = by_position {
		state.last_flat = outcome.flat_index;
		return Some(outcome);
	}
	None
}

/// Full scan for the request text, preferring the position nearest the last
/// resolved paragraph.
fn resolve_by_scan(
	cache: &DocumentCache,
	state: &mut AnalyzerState,
	request: &CheckRequest,
) -> Option<AnalyzeOutcome> {
	let anchor = state.last_flat.unwrap_or(0);
	let found = cache.with(|data| {
		let mut best: Option<usize> = None;
		for i in 0..data.len() {
			if data.paragraph(i) != Some(request.text.as_str()) {
				continue;
			}
			let better = match best {
				Some(b) => i.abs_diff(anchor) < b.abs_diff(anchor),
				None => true,
			};
			if better {
				best = Some(i);
			}
		}
		best
	})??;
	state.last_flat = Some(found);
	Some(AnalyzeOutcome::found(found))
}

/// Adopts the view cursor's paragraph when its text matches the request.
/// This resolves requests about `Unknown`-kind paragraphs the mapping could
/// not place.
fn adopt_view_cursor(
	cache: &DocumentCache,
	host: &dyn DocumentHost,
	state: &mut AnalyzerState,
	request: &CheckRequest,
) -> Option<AnalyzeOutcome> {
	let cursor = host.view_cursor().ok()?;
	if cursor.kind == TextKind::Unknown {
		return None;
	}
	let coord = galley_primitives::TextCoord::new(cursor.kind, cursor.paragraph);
	let flat = cache.with(|data| {
		let flat = data.flat_of(coord)?;
		(data.paragraph(flat) == Some(request.text.as_str())).then_some(flat)
	})??;
	state.cursor_flat = Some(flat);
	state.last_flat = Some(flat);
	Some(AnalyzeOutcome::found(flat))
}

/// True when the cache row agrees with the request on text, locale and
/// tracked deletions.
fn request_matches(data: &crate::cache::CacheData, index: usize, request: &CheckRequest) -> bool {
	data.paragraph(index) == Some(request.text.as_str())
		&& data.locale(index) == Some(&request.locale)
		&& data.deleted.get(index).map(Option::as_ref) == Some(request.deleted.as_ref())
}

/// Overwrites a stale cache row with the request's content.
fn update_in_place(cache: &DocumentCache, index: usize, request: &CheckRequest, quotes: &QuotePair) {
	cache.with_mut(|data| {
		data.set_paragraph(
			index,
			request.text.clone(),
			request.locale.clone(),
			request.footnotes.clone(),
			request.deleted.clone(),
			quotes,
		);
	});
}

#[cfg(test)]
mod tests;
