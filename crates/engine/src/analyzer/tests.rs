use galley_host::{CheckRequest, ProofReason, ViewCursor};
use galley_primitives::{ChangedRange, Locale, TextKind};
use pretty_assertions::assert_eq;

use super::*;
use crate::cache::DocumentCache;
use crate::cache::tests::StubHost;
use crate::config::QuotePair;

fn supports_all(_locale: &Locale) -> bool {
	true
}

fn quotes() -> QuotePair {
	QuotePair::default()
}

fn refreshed(host: &StubHost) -> DocumentCache {
	let cache = DocumentCache::new();
	cache.refresh(host, &quotes(), &supports_all).expect("refresh succeeds");
	cache
}

fn request(text: &str) -> CheckRequest {
	CheckRequest {
		text: text.into(),
		locale: Locale::new("en", "US"),
		reason: ProofReason::MarkParagraph,
		..Default::default()
	}
}

fn resolve(
	cache: &DocumentCache,
	host: &StubHost,
	state: &mut AnalyzerState,
	req: &CheckRequest,
) -> AnalyzeOutcome {
	analyze(cache, host, state, req, &quotes(), &supports_all).expect("analyze succeeds")
}

#[test]
fn sequential_requests_use_next_position() {
	let host = StubHost::new(&["alpha", "beta", "gamma"]);
	let cache = refreshed(&host);
	let mut state = AnalyzerState::default();

	let first = resolve(&cache, &host, &mut state, &request("alpha"));
	assert_eq!(first.flat_index, Some(0));

	// The follow-up hits the position after the last resolved paragraph
	// without any scan or refresh.
	let second = resolve(&cache, &host, &mut state, &request("beta"));
	assert_eq!(second.flat_index, Some(1));
	assert!(second.shift.is_none());

	// Re-checking the same paragraph also resolves.
	let again = resolve(&cache, &host, &mut state, &request("beta"));
	assert_eq!(again.flat_index, Some(1));
}

#[test]
fn node_id_resolves_exactly() {
	let host = StubHost::new(&["one", "two"]);
	{
		let mut flat = host.flat.lock();
		flat.paragraphs[0].node_id = Some(11);
		flat.paragraphs[1].node_id = Some(22);
		flat.element_count = Some(2);
		let mut kinds = host.kinds.lock();
		for ks in kinds.iter_mut() {
			ks.node_ids = Some(Vec::new());
		}
		kinds[4].node_ids = Some(vec![11, 22]);
	}
	let cache = refreshed(&host);
	let mut state = AnalyzerState::default();

	let mut req = request("two");
	req.node_id = Some(22);
	req.element_count = Some(2);
	let outcome = resolve(&cache, &host, &mut state, &req);
	assert_eq!(outcome.flat_index, Some(1));
	assert!(!outcome.content_changed);
}

#[test]
fn node_id_with_stale_text_updates_in_place() {
	let host = StubHost::new(&["one", "two"]);
	{
		let mut flat = host.flat.lock();
		flat.paragraphs[0].node_id = Some(11);
		flat.paragraphs[1].node_id = Some(22);
		flat.element_count = Some(2);
		let mut kinds = host.kinds.lock();
		for ks in kinds.iter_mut() {
			ks.node_ids = Some(Vec::new());
		}
		kinds[4].node_ids = Some(vec![11, 22]);
	}
	let cache = refreshed(&host);
	let mut state = AnalyzerState::default();

	let mut req = request("two edited");
	req.node_id = Some(22);
	req.element_count = Some(2);
	let outcome = resolve(&cache, &host, &mut state, &req);
	assert_eq!(outcome.flat_index, Some(1));
	assert!(outcome.content_changed);
	cache
		.with(|data| {
			assert_eq!(data.paragraph(1), Some("two edited"));
			assert!(!data.analyzed.contains_key(&1));
		})
		.expect("cache alive");
}

#[test]
fn deletion_refreshes_and_reports_shift() {
	let host = StubHost::new(&["alpha", "beta", "gamma"]);
	let cache = refreshed(&host);
	let mut state = AnalyzerState::default();
	// Park the analyzer at the end so the next request cannot be answered
	// from a stale position.
	state.last_flat = Some(2);

	// The user deletes the first paragraph; the next callback is about a
	// surviving one.
	host.set_text(&["beta", "gamma"]);
	let outcome = resolve(&cache, &host, &mut state, &request("beta"));
	assert_eq!(outcome.flat_index, Some(0));
	assert_eq!(outcome.shift, Some(ChangedRange {
		from: 0,
		to: 0,
		old_size: 3,
		new_size: 2,
	}));
	// The remembered position was translated across the deletion.
	cache
		.with(|data| assert_eq!(data.paragraph(1), Some("gamma")))
		.expect("cache alive");
}

#[test]
fn blocking_request_never_refreshes() {
	let host = StubHost::new(&["old text"]);
	let cache = refreshed(&host);
	let mut state = AnalyzerState::default();

	// The document changed, but the host is blocked on the answer.
	host.set_text(&["entirely new"]);
	let mut req = request("entirely new");
	req.reason = ProofReason::GetProofResult;
	let outcome = resolve(&cache, &host, &mut state, &req);
	assert_eq!(outcome.flat_index, None);
	assert!(outcome.shift.is_none());
	// The cache still holds the old content: no refresh happened.
	cache
		.with(|data| assert_eq!(data.paragraph(0), Some("old text")))
		.expect("cache alive");
}

#[test]
fn duplicate_text_resolved_through_view_cursor() {
	// Two identical paragraphs: only the cursor can tell which copy the
	// request is about.
	let host = StubHost::new(&["same", "filler", "same"]);
	let cache = refreshed(&host);
	let mut state = AnalyzerState::default();
	*host.cursor.lock() = Some(ViewCursor {
		kind: TextKind::Text,
		paragraph: 2,
		character: 0,
	});

	let outcome = resolve(&cache, &host, &mut state, &request("same"));
	assert_eq!(outcome.flat_index, Some(2));
	assert_eq!(state.cursor_flat, Some(2));
}

#[test]
fn scan_is_the_last_resort() {
	let host = StubHost::new(&["alpha", "beta", "gamma"]);
	let cache = refreshed(&host);
	let mut state = AnalyzerState::default();
	state.last_flat = Some(0);

	// No cursor available; the full scan still finds the paragraph.
	let outcome = resolve(&cache, &host, &mut state, &request("gamma"));
	assert_eq!(outcome.flat_index, Some(2));
	assert_eq!(state.cursor_flat, None);
}

#[test]
fn stale_request_text_answers_empty() {
	let host = StubHost::new(&["current"]);
	let cache = refreshed(&host);
	let mut state = AnalyzerState::default();

	let outcome = resolve(&cache, &host, &mut state, &request("long gone"));
	assert_eq!(outcome.flat_index, None);
}
