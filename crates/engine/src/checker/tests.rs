use std::sync::Arc;

use galley_host::{CheckRequest, HostError, ParagraphHandling, ProofReason, RuleEngine};
use galley_primitives::{AnalyzedSentence, CheckMatch, Locale};
use pretty_assertions::assert_eq;

use super::*;
use crate::cache::tests::StubHost;
use crate::results::CACHE_SENTENCE;

struct EchoEngine;

impl RuleEngine for EchoEngine {
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
		// Flag every occurrence of "teh" so tests have a deterministic
		// finding.
		let mut matches = Vec::new();
		let mut offset = 0;
		for sentence in sentences {
			for token in &sentence.tokens {
				let word = &sentence.text[token.start..token.start + token.length];
				if word == "teh" {
					matches.push(CheckMatch::new(offset + token.start, token.length, "TEH"));
				}
			}
			offset += sentence.text.len();
		}
		Ok(matches)
	}
}

fn checker() -> Checker {
	Checker::new(EngineConfig::default(), Arc::new(|| Box::new(EchoEngine) as Box<dyn RuleEngine>))
}

fn request(text: &str) -> CheckRequest {
	CheckRequest {
		text: text.into(),
		locale: Locale::new("en", "US"),
		reason: ProofReason::MarkParagraph,
		..Default::default()
	}
}

#[test]
fn open_check_close_lifecycle() {
	let checker = checker();
	let host = Arc::new(StubHost::new(&["Fix teh typo."]));
	let id = checker.open_document(host);

	let results = checker.get_check_results(id, &request("Fix teh typo."));
	assert_eq!(results.len(), 1);
	assert_eq!(results[0].rule_id, "TEH");
	assert_eq!(&"Fix teh typo."[results[0].start..results[0].start + results[0].length], "teh");

	checker.close_document(id);
	assert!(checker.document(id).is_none());
	assert!(checker.get_check_results(id, &request("Fix teh typo.")).is_empty());
	checker.shutdown();
}

#[test]
fn unknown_document_answers_empty() {
	let checker = checker();
	assert!(checker.get_check_results(DocumentId(999), &request("x")).is_empty());
	checker.shutdown();
}

#[test]
fn config_change_drops_result_caches() {
	let checker = checker();
	let host = Arc::new(StubHost::new(&["Fix teh typo."]));
	let id = checker.open_document(host);
	checker.get_check_results(id, &request("Fix teh typo."));
	let document = checker.document(id).expect("document registered");
	assert!(document.with_result_cache(CACHE_SENTENCE, |c| c.has(0)));

	checker.update_config(|config| {
		config.disabled_rules.insert("TEH".into());
	});
	assert!(!document.with_result_cache(CACHE_SENTENCE, |c| c.has(0)));
	checker.shutdown();
}

#[test]
fn ui_only_config_change_keeps_caches() {
	let checker = checker();
	let host = Arc::new(StubHost::new(&["Fix teh typo."]));
	let id = checker.open_document(host);
	checker.get_check_results(id, &request("Fix teh typo."));
	let document = checker.document(id).expect("document registered");

	checker.update_config(|config| {
		config.direct_speech = crate::config::DirectSpeechFilter::StyleOnly;
	});
	assert!(document.with_result_cache(CACHE_SENTENCE, |c| c.has(0)));
	checker.shutdown();
}

#[test]
fn deactivating_a_rule_drops_its_findings() {
	let checker = checker();
	let host = Arc::new(StubHost::new(&["Fix teh typo."]));
	let id = checker.open_document(Arc::clone(&host) as Arc<dyn DocumentHost>);
	checker.get_check_results(id, &request("Fix teh typo."));
	let document = checker.document(id).expect("document registered");
	assert!(document.with_result_cache(CACHE_SENTENCE, |c| {
		c.get(0).is_some_and(|m| !m.is_empty())
	}));

	checker.deactivate_rule("TEH");
	// The row stays (checked) but carries no findings, and the paragraph
	// was scheduled for a repaint.
	assert!(document.with_result_cache(CACHE_SENTENCE, |c| {
		c.get(0).is_some_and(<[CheckMatch]>::is_empty)
	}));
	assert!(host.remarks.lock().contains(&0));
	checker.shutdown();
}

#[test]
fn state_round_trips_through_disk() {
	let dir = tempfile::tempdir().expect("tempdir");
	let path = dir.path().join("doc.cache");

	let checker = checker();
	let host = Arc::new(StubHost::new(&["Fix teh typo."]));
	let id = checker.open_document(Arc::clone(&host) as Arc<dyn DocumentHost>);
	checker.get_check_results(id, &request("Fix teh typo."));
	let document = checker.document(id).expect("document registered");
	document.ignore_match(0, "TEH", 4, true);
	assert!(checker.save_document_state(id, &path));
	checker.close_document(id);

	// A fresh document restores cache rows and permanent ignores.
	let id = checker.open_document(host);
	assert!(checker.load_document_state(id, &path));
	let document = checker.document(id).expect("document registered");
	assert!(document.with_result_cache(CACHE_SENTENCE, |c| c.has(0)));
	let results = checker.get_check_results(id, &request("Fix teh typo."));
	// The restored permanent ignore suppresses the finding.
	assert!(results.is_empty());
	checker.shutdown();
}
