//! The multi-document checker fronting the host.
//!
//! One [`Checker`] serves every open document: it owns the document
//! registry, the synchronous sentence-check engine, the text-level queue,
//! and (when an AI backend is configured) the parallel AI queue. The host's
//! proofing callback lands in [`Checker::get_check_results`]; everything
//! else runs on the queue workers.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use galley_host::{AiBackend, CheckRequest, DocumentHost, RuleEngine, SpellService, Thesaurus};
use galley_primitives::{CheckMatch, Locale};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, warn};

use crate::ai::AiAdapter;
use crate::config::EngineConfig;
use crate::document::{DocumentId, Queues, SingleDocument};
use crate::persist::{self, PersistedState};
use crate::queue::{CheckProvider, CheckQueue, EngineFactory, QueueEntry};
use crate::results::{CACHE_AI, CACHE_AI_SUGGESTION, CACHE_TEXT_FIRST};

/// The registered documents, shared with the queue providers.
struct Registry {
	documents: RwLock<Vec<Arc<SingleDocument>>>,
}

impl Registry {
	fn get(&self, id: DocumentId) -> Option<Arc<SingleDocument>> {
		self.documents.read().iter().find(|d| d.id() == id).cloned()
	}

	fn all(&self) -> Vec<Arc<SingleDocument>> {
		self.documents.read().clone()
	}
}

/// Queue provider for the text-level classes.
struct TextProvider {
	registry: Arc<Registry>,
	config: Arc<RwLock<EngineConfig>>,
}

impl TextProvider {
	fn classes(&self) -> Vec<usize> {
		let count = self.config.read().text_level_classes;
		(CACHE_TEXT_FIRST..CACHE_TEXT_FIRST + count).collect()
	}
}

impl CheckProvider for TextProvider {
	fn entry_locale(&self, entry: &QueueEntry) -> Option<Locale> {
		self.registry.get(entry.doc_id)?.entry_locale(entry)
	}

	fn run_entry(&self, entry: &QueueEntry, engine: Option<&mut dyn RuleEngine>, interrupt: &AtomicBool) {
		if let Some(document) = self.registry.get(entry.doc_id) {
			document.run_entry(entry, engine, interrupt);
		}
	}

	fn next_hole(&self) -> Option<QueueEntry> {
		let classes = self.classes();
		self.registry.all().into_iter().find_map(|d| d.first_hole(&classes))
	}

	fn heap_ok(&self) -> bool {
		self.registry.all().iter().all(|d| d.host().heap_ok())
	}
}

/// Queue provider for the AI classes; strictly parallel to the text queue,
/// sharing only the documents.
struct AiProvider {
	registry: Arc<Registry>,
	config: Arc<RwLock<EngineConfig>>,
	adapter: AiAdapter,
	spell: Option<Arc<dyn SpellService>>,
}

impl CheckProvider for AiProvider {
	fn entry_locale(&self, entry: &QueueEntry) -> Option<Locale> {
		self.registry.get(entry.doc_id)?.entry_locale(entry)
	}

	fn run_entry(&self, entry: &QueueEntry, engine: Option<&mut dyn RuleEngine>, interrupt: &AtomicBool) {
		if let Some(document) = self.registry.get(entry.doc_id) {
			document.run_ai_entry(entry, &self.adapter, engine, self.spell.as_deref(), interrupt);
		}
	}

	fn next_hole(&self) -> Option<QueueEntry> {
		if !self.config.read().ai_enabled {
			return None;
		}
		let classes = [CACHE_AI, CACHE_AI_SUGGESTION];
		self.registry.all().into_iter().find_map(|d| d.first_hole(&classes))
	}

	fn heap_ok(&self) -> bool {
		self.registry.all().iter().all(|d| d.host().heap_ok())
	}
}

/// The engine's host-facing front.
pub struct Checker {
	config: Arc<RwLock<EngineConfig>>,
	registry: Arc<Registry>,
	queues: Queues,
	sentence_engine: Mutex<Box<dyn RuleEngine>>,
	thesaurus: Option<Arc<dyn Thesaurus>>,
}

impl Checker {
	/// Builds a checker with text-level checking only. The factory is
	/// called once per worker thread; each worker owns its engine.
	pub fn new(config: EngineConfig, engine_factory: EngineFactory) -> Self {
		Self::with_collaborators(config, engine_factory, None, None, None)
	}

	/// Builds a checker with the optional collaborators wired up. The AI
	/// queue exists iff a backend is supplied.
	pub fn with_collaborators(
		config: EngineConfig,
		engine_factory: EngineFactory,
		ai_backend: Option<Arc<dyn AiBackend>>,
		spell: Option<Arc<dyn SpellService>>,
		thesaurus: Option<Arc<dyn Thesaurus>>,
	) -> Self {
		let config = Arc::new(RwLock::new(config));
		let registry = Arc::new(Registry {
			documents: RwLock::new(Vec::new()),
		});
		let text_provider = Arc::new(TextProvider {
			registry: Arc::clone(&registry),
			config: Arc::clone(&config),
		});
		let text = CheckQueue::new("text", text_provider, Arc::clone(&engine_factory));
		let ai = ai_backend.map(|backend| {
			let provider = Arc::new(AiProvider {
				registry: Arc::clone(&registry),
				config: Arc::clone(&config),
				adapter: AiAdapter::new(backend),
				spell,
			});
			CheckQueue::new("ai", provider, Arc::clone(&engine_factory))
		});
		Self {
			config,
			registry,
			queues: Queues { text, ai },
			sentence_engine: Mutex::new(engine_factory()),
			thesaurus,
		}
	}

	/// Registers an open document and returns its id.
	pub fn open_document(&self, host: Arc<dyn DocumentHost>) -> DocumentId {
		let id = DocumentId::next();
		let document = Arc::new(SingleDocument::new(id, host, Arc::clone(&self.config)));
		self.registry.documents.write().push(document);
		debug!(doc_id = ?id, "document opened");
		id
	}

	pub fn document(&self, id: DocumentId) -> Option<Arc<SingleDocument>> {
		self.registry.get(id)
	}

	/// Serves one proofing callback. Never fails; unknown documents get an
	/// empty answer.
	pub fn get_check_results(&self, id: DocumentId, request: &CheckRequest) -> Vec<CheckMatch> {
		let Some(document) = self.registry.get(id) else {
			warn!(doc_id = ?id, "check request for unknown document");
			return Vec::new();
		};
		let mut engine = self.sentence_engine.lock();
		document.get_check_results(
			request,
			engine.as_mut(),
			&self.queues,
			self.thesaurus.as_deref(),
		)
	}

	/// Removes queued work of one document; with `wait`, a run in flight
	/// is abandoned too.
	pub fn interrupt_check(&self, id: DocumentId, wait: bool) {
		self.queues.text.interrupt_check(id, wait);
		if let Some(ai) = &self.queues.ai {
			ai.interrupt_check(id, wait);
		}
	}

	/// Unregisters a document and drops its state.
	pub fn close_document(&self, id: DocumentId) {
		self.interrupt_check(id, true);
		if let Some(document) = self.registry.get(id) {
			document.dispose();
		}
		let removed = {
			let mut documents = self.registry.documents.write();
			let before = documents.len();
			documents.retain(|d| d.id() != id);
			before != documents.len()
		};
		if removed {
			debug!(doc_id = ?id, "document closed");
		}
		self.queues.text.clear_interrupt();
		if let Some(ai) = &self.queues.ai {
			ai.clear_interrupt();
		}
	}

	/// Reconfigures the engine. Rule-set changes invalidate every result
	/// cache, so all rows are dropped and the caches marked dirty.
	pub fn update_config(&self, f: impl FnOnce(&mut EngineConfig)) {
		let fingerprint_before = self.config.read().fingerprint();
		let changed = {
			let mut config = self.config.write();
			f(&mut config);
			config.fingerprint() != fingerprint_before
		};
		if changed {
			for document in self.registry.all() {
				for cache_index in 0..crate::results::CACHE_COUNT {
					document.with_result_cache(cache_index, |cache| cache.clear());
				}
				document.cache().mark_dirty();
			}
			self.wake_workers();
		}
	}

	/// Drops one rule's findings from every cache and repaints the affected
	/// paragraphs; used when the user disables a rule for the session.
	pub fn deactivate_rule(&self, rule_id: &str) {
		for document in self.registry.all() {
			for cache_index in 0..crate::results::CACHE_COUNT {
				let affected =
					document.with_result_cache(cache_index, |cache| cache.remove_rule(rule_id));
				for flat_index in affected {
					document.host().schedule_remark(flat_index);
				}
			}
		}
	}

	/// Makes both workers drop their engine state (language, activated rule
	/// classes) and continue; used after rule data changes on disk.
	pub fn reset_workers(&self) {
		self.queues.text.set_reset();
		if let Some(ai) = &self.queues.ai {
			ai.set_reset();
		}
	}

	/// Asks both workers to wind down until the next wake, e.g. when the
	/// host reports memory pressure.
	pub fn stop_workers(&self) {
		self.queues.text.set_stop();
		if let Some(ai) = &self.queues.ai {
			ai.set_stop();
		}
	}

	/// Prods the workers, e.g. after reopening documents.
	pub fn wake_workers(&self) {
		self.queues.text.wake();
		if let Some(ai) = &self.queues.ai {
			ai.wake();
		}
	}

	/// Writes one document's caches next to the document. Must not be
	/// called while holding any engine lock.
	pub fn save_document_state(&self, id: DocumentId, path: &Path) -> bool {
		let Some(document) = self.registry.get(id) else {
			return false;
		};
		let Some(cache) = document.cache_snapshot() else {
			return false;
		};
		let state = PersistedState {
			fingerprint: self.config.read().fingerprint(),
			cache,
			results: document.result_snapshots(),
			permanent_ignores: document.with_permanent_ignores(Clone::clone),
		};
		match persist::save_state(path, &state) {
			Ok(()) => true,
			Err(error) => {
				warn!(doc_id = ?id, %error, "saving cache blob failed");
				false
			}
		}
	}

	/// Restores a document's caches from disk when the blob matches the
	/// running configuration; otherwise the caches stay empty.
	pub fn load_document_state(&self, id: DocumentId, path: &Path) -> bool {
		let Some(document) = self.registry.get(id) else {
			return false;
		};
		let fingerprint = self.config.read().fingerprint();
		let Some(state) = persist::try_load_state(path, &fingerprint) else {
			return false;
		};
		document.restore_cache(state.cache);
		document.restore_results(state.results);
		document.restore_permanent_ignores(state.permanent_ignores);
		true
	}

	/// Final shutdown: both workers exit and never respawn.
	pub fn shutdown(&self) {
		self.queues.text.dispose();
		if let Some(ai) = &self.queues.ai {
			ai.dispose();
		}
		for document in self.registry.all() {
			document.dispose();
		}
	}
}

#[cfg(test)]
mod tests;
