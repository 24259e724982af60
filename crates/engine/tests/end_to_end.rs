//! End-to-end scenarios against the public engine API.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{AcceptAllSpell, MockHost, TableBackend, TinyThesaurus, WordEngine, wait_until};
use galley_engine::checker::Checker;
use galley_engine::config::EngineConfig;
use galley_engine::results::{CACHE_AI, CACHE_SENTENCE, CACHE_TEXT_FIRST};
use galley_host::{CheckRequest, DocumentHost, ProofReason, RuleEngine};
use galley_primitives::Locale;
use pretty_assertions::assert_eq;

fn request(text: &str) -> CheckRequest {
	CheckRequest {
		text: text.into(),
		locale: Locale::new("en", "US"),
		reason: ProofReason::MarkParagraph,
		..Default::default()
	}
}

fn new_checker() -> Checker {
	common::init_tracing();
	Checker::new(EngineConfig::default(), Arc::new(|| Box::new(WordEngine) as Box<dyn RuleEngine>))
}

#[test]
fn synchronous_check_and_background_fill() {
	let checker = new_checker();
	let host = MockHost::body_text(&["Fix teh typo here.", "A clean paragraph."]);
	let id = checker.open_document(Arc::clone(&host) as Arc<dyn DocumentHost>);

	let results = checker.get_check_results(id, &request("Fix teh typo here."));
	assert_eq!(results.len(), 1);
	assert_eq!(results[0].rule_id, "TEH");
	assert_eq!(results[0].suggestions, vec!["the".to_string()]);

	// The background worker eventually fills every text-level row for
	// both paragraphs, including the never-requested clean one.
	let document = checker.document(id).expect("document open");
	let classes = EngineConfig::default().text_level_classes;
	let filled = wait_until(Duration::from_secs(5), || {
		(0..2).all(|paragraph| {
			(CACHE_TEXT_FIRST..CACHE_TEXT_FIRST + classes)
				.all(|class| document.cached_matches(class, paragraph).is_some())
		})
	});
	assert!(filled, "background classes were not filled in time");
	checker.shutdown();
}

#[test]
fn deleting_a_paragraph_shifts_results_and_ignores() {
	let checker = new_checker();
	let host = MockHost::body_text(&["Opening line.", "Fix teh typo.", "Closing line."]);
	let id = checker.open_document(Arc::clone(&host) as Arc<dyn DocumentHost>);

	// Resolve the flawed paragraph and suppress its finding, then park the
	// analyzer on the last paragraph so the next request cannot be
	// answered positionally.
	let results = checker.get_check_results(id, &request("Fix teh typo."));
	assert_eq!(results.len(), 1);
	let document = checker.document(id).expect("document open");
	document.ignore_match(1, "TEH", results[0].start, false);
	checker.get_check_results(id, &request("Closing line."));

	// Delete the first paragraph: the next request forces a structural
	// refresh, and the ignore must follow its paragraph from flat index 1
	// to flat index 0.
	host.set_body_text(&["Fix teh typo.", "Closing line."]);
	let results = checker.get_check_results(id, &request("Fix teh typo."));
	assert!(results.is_empty(), "ignore did not survive the shift");
	assert_eq!(document.cache().with(|d| d.len()), Some(2));
	checker.shutdown();
}

#[test]
fn footnote_sentinel_maps_against_rendered_label() {
	let checker = new_checker();
	let host = MockHost::body_text(&["Hello world.", "Unrelated."]);
	host.add_footnote(0, 5, "A note body.");
	let id = checker.open_document(Arc::clone(&host) as Arc<dyn DocumentHost>);

	// The flat text carries the sentinel; the request does too.
	let flat_text = host.flat.lock().paragraphs[0].text.clone();
	assert!(flat_text.contains('\u{200B}'));
	let results = checker.get_check_results(id, &request(&flat_text));
	assert!(results.is_empty());

	// The mapping placed the footnote paragraph; its row fills in the
	// background like any other.
	let document = checker.document(id).expect("document open");
	let filled = wait_until(Duration::from_secs(5), || {
		document.cached_matches(CACHE_SENTENCE, 0).is_some()
			|| document.cached_matches(CACHE_TEXT_FIRST, 2).is_some()
	});
	assert!(filled);
	checker.shutdown();
}

#[test]
fn headings_bound_text_level_windows() {
	let checker = new_checker();
	let host = MockHost::body_text(&["Chapter", "Body one.", "Body two."]);
	host.add_heading(0);
	let id = checker.open_document(Arc::clone(&host) as Arc<dyn DocumentHost>);

	checker.get_check_results(id, &request("Body one."));
	let document = checker.document(id).expect("document open");
	let filled = wait_until(Duration::from_secs(5), || {
		document.cached_matches(CACHE_TEXT_FIRST, 1).is_some()
	});
	assert!(filled);
	// The heading itself is a single-paragraph chapter.
	assert!(document.cache().with(|d| d.is_single_paragraph(0)).expect("cache alive"));
	checker.shutdown();
}

#[test]
fn blocking_requests_are_answered_from_cache() {
	let checker = new_checker();
	let host = MockHost::body_text(&["Fix teh typo."]);
	let id = checker.open_document(Arc::clone(&host) as Arc<dyn DocumentHost>);

	// Prime the cache with a mark request.
	checker.get_check_results(id, &request("Fix teh typo."));

	// Change the document behind the engine's back; a blocked request
	// must answer from cache without refreshing.
	host.edit_paragraph(0, "Completely different.");
	let mut blocked = request("Completely different.");
	blocked.reason = ProofReason::GetProofResult;
	let results = checker.get_check_results(id, &blocked);
	assert!(results.is_empty());
	let document = checker.document(id).expect("document open");
	let stale = document
		.cache()
		.with(|d| d.paragraph(0).map(str::to_string))
		.expect("cache alive");
	assert_eq!(stale.as_deref(), Some("Fix teh typo."));
	checker.shutdown();
}

#[test]
fn ai_detection_flows_into_results() {
	let mut config = EngineConfig::default();
	config.ai_enabled = true;
	let checker = Checker::with_collaborators(
		config,
		Arc::new(|| Box::new(WordEngine) as Box<dyn RuleEngine>),
		Some(TableBackend::rewriting(&[("He go home.", "He goes home.")])),
		Some(Arc::new(AcceptAllSpell)),
		Some(Arc::new(TinyThesaurus)),
	);
	let host = MockHost::body_text(&["He go home."]);
	let id = checker.open_document(Arc::clone(&host) as Arc<dyn DocumentHost>);

	// Resolve the paragraph so the AI classes get enqueued.
	checker.get_check_results(id, &request("He go home."));
	let document = checker.document(id).expect("document open");
	let detected = wait_until(Duration::from_secs(5), || {
		document
			.cached_matches(CACHE_AI, 0)
			.is_some_and(|matches| !matches.is_empty())
	});
	assert!(detected, "AI detection row was not produced");

	let results = checker.get_check_results(id, &request("He go home."));
	let ai_match = results
		.iter()
		.find(|m| m.rule_id == "AI_GRAMMAR_CORRECTION")
		.expect("AI match served");
	assert_eq!(ai_match.suggestions[0], "goes");
	checker.shutdown();
}
