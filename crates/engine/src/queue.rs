//! The background check queue.
//!
//! One worker thread per queue drains a prioritized, de-duplicating list of
//! check ranges. The text-level queue and the AI queue are two instances of
//! the same machinery running strictly in parallel; they share nothing but
//! the documents they are pointed at. The worker owns its rule engine — no
//! other thread ever touches it — and restarts itself after a bounded
//! number of entries to cap engine-internal growth.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use galley_host::RuleEngine;
use galley_primitives::{Locale, TextCoord};
use parking_lot::{Condvar, Mutex};
use tracing::{debug, warn};

use crate::document::DocumentId;

/// Entries a worker processes before letting its thread die and be
/// respawned.
pub const MAX_CHECK_PER_THREAD: usize = 50;

/// Every this many runs the worker probes the host for heap pressure.
pub const HEAP_CHECK_INTERVAL: usize = 50;

/// How long an idle worker lingers before scanning for holes and exiting.
pub const WAIT_TIME: Duration = Duration::from_millis(20);

/// A check radius below this covers the whole document.
pub const COVER_ALL_RADIUS: i32 = -2;

/// One range of typed paragraphs to check against one cache class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueEntry {
	/// First paragraph of the range.
	pub start: TextCoord,
	/// One past the last paragraph of the range; same kind as `start`.
	pub end: TextCoord,
	/// Result cache class this entry fills.
	pub cache_index: usize,
	/// Paragraph window radius; `<= COVER_ALL_RADIUS` covers everything.
	pub check_radius: i32,
	pub doc_id: DocumentId,
	/// Lets this entry jump ahead of queued lower-class entries for the
	/// same range.
	pub override_running: bool,
}

impl QueueEntry {
	fn same_target(&self, other: &QueueEntry) -> bool {
		self.doc_id == other.doc_id
			&& self.start.kind == other.start.kind
			&& self.cache_index == other.cache_index
	}

	fn same_range(&self, other: &QueueEntry) -> bool {
		self.start == other.start && self.end == other.end
	}

	fn contains_range(&self, other: &QueueEntry) -> bool {
		self.start.index <= other.start.index && other.end.index <= self.end.index
	}
}

/// List slots: real work plus the control markers.
#[derive(Debug, Clone, PartialEq, Eq)]
enum QueueItem {
	Check(QueueEntry),
	/// Drop engine state and let the thread exit; restartable.
	Stop,
	/// Drop engine state and keep going.
	Reset,
	/// Final shutdown; the queue never respawns afterwards.
	Dispose,
}

/// What the worker needs from the document registry.
pub(crate) trait CheckProvider: Send + Sync + 'static {
	/// Language at the entry's start; `None` when the document is gone.
	fn entry_locale(&self, entry: &QueueEntry) -> Option<Locale>;

	/// Runs the entry. With no engine (unsupported language) the provider
	/// still records empty result rows so holes get filled. The interrupt
	/// flag is polled between paragraphs.
	fn run_entry(&self, entry: &QueueEntry, engine: Option<&mut dyn RuleEngine>, interrupt: &AtomicBool);

	/// The next unchecked paragraph across every registered document.
	fn next_hole(&self) -> Option<QueueEntry>;

	/// False under host heap pressure; the worker winds down.
	fn heap_ok(&self) -> bool;
}

/// Creates a fresh rule engine for a (re)spawned worker thread.
pub type EngineFactory = Arc<dyn Fn() -> Box<dyn RuleEngine> + Send + Sync>;

struct QueueShared {
	list: Mutex<Vec<QueueItem>>,
	wake: Condvar,
	/// Guarded by `list`'s mutex in spirit; kept separate so `wake()` can
	/// decide about respawning without touching the list.
	worker_alive: Mutex<bool>,
	interrupt: AtomicBool,
	disposed: AtomicBool,
	/// Document the worker is currently processing.
	last_doc: Mutex<Option<DocumentId>>,
}

/// A single-worker check queue.
pub(crate) struct CheckQueue {
	shared: Arc<QueueShared>,
	provider: Arc<dyn CheckProvider>,
	engine_factory: EngineFactory,
	label: &'static str,
}

impl CheckQueue {
	pub fn new(label: &'static str, provider: Arc<dyn CheckProvider>, engine_factory: EngineFactory) -> Self {
		Self {
			shared: Arc::new(QueueShared {
				list: Mutex::new(Vec::new()),
				wake: Condvar::new(),
				worker_alive: Mutex::new(false),
				interrupt: AtomicBool::new(false),
				disposed: AtomicBool::new(false),
				last_doc: Mutex::new(None),
			}),
			provider,
			engine_factory,
			label,
		}
	}

	/// Adds an entry, de-duplicating against the queued work. Returns true
	/// when the entry was queued.
	pub fn add_entry(&self, entry: QueueEntry) -> bool {
		if entry.start.kind != entry.end.kind
			|| entry.end.index <= entry.start.index
			|| self.shared.interrupt.load(Ordering::Acquire)
			|| self.shared.disposed.load(Ordering::Acquire)
		{
			return false;
		}

		{
			let mut list = self.shared.list.lock();

			// Drop queued entries the new one makes obsolete: same target
			// and either the new entry covers everything or the ranges
			// are identical.
			list.retain(|item| {
				let QueueItem::Check(existing) = item else {
					return true;
				};
				!(existing.same_target(&entry)
					&& (entry.check_radius <= COVER_ALL_RADIUS || existing.same_range(&entry)))
			});

			// A non-override entry nested inside queued larger work of the
			// same cache is redundant.
			if !entry.override_running {
				let covered = list.iter().any(|item| {
					matches!(item, QueueItem::Check(existing)
						if existing.same_target(&entry) && existing.contains_range(&entry))
				});
				if covered {
					return false;
				}
			}

			if entry.override_running {
				// Jump ahead of queued lower-class work for the same
				// range; this is the only path that disturbs class order.
				let position = list.iter().position(|item| {
					matches!(item, QueueItem::Check(existing)
						if existing.doc_id == entry.doc_id
							&& existing.same_range(&entry)
							&& existing.cache_index < entry.cache_index)
				});
				match position {
					Some(position) => list.insert(position, QueueItem::Check(entry)),
					None => list.insert(0, QueueItem::Check(entry)),
				}
			} else {
				list.push(QueueItem::Check(entry));
			}
		}
		self.wake();
		true
	}

	/// Removes every queued entry of a document. With `wait`, a run in
	/// flight for that document is abandoned before the next item.
	pub fn interrupt_check(&self, doc_id: DocumentId, wait: bool) {
		{
			let mut list = self.shared.list.lock();
			list.retain(|item| !matches!(item, QueueItem::Check(e) if e.doc_id == doc_id));
		}
		if wait {
			let mut last = self.shared.last_doc.lock();
			if *last == Some(doc_id) {
				*last = None;
				self.shared.interrupt.store(true, Ordering::Release);
			}
		}
	}

	/// Clears the interrupt flag once the pending work has been dropped.
	pub fn clear_interrupt(&self) {
		self.shared.interrupt.store(false, Ordering::Release);
	}

	/// Asks the worker to drop its engine state and keep running.
	pub fn set_reset(&self) {
		self.shared.list.lock().insert(0, QueueItem::Reset);
		self.wake();
	}

	/// Asks the worker to wind down; it restarts on the next wake.
	pub fn set_stop(&self) {
		self.shared.list.lock().insert(0, QueueItem::Stop);
		self.wake();
	}

	/// Permanent shutdown.
	pub fn dispose(&self) {
		self.shared.disposed.store(true, Ordering::Release);
		self.shared.list.lock().insert(0, QueueItem::Dispose);
		self.shared.wake.notify_all();
	}

	/// Number of queued check entries, control markers excluded.
	pub fn queued_len(&self) -> usize {
		self.shared
			.list
			.lock()
			.iter()
			.filter(|item| matches!(item, QueueItem::Check(_)))
			.count()
	}

	pub fn is_empty(&self) -> bool {
		self.queued_len() == 0
	}

	/// Marks the worker as alive without spawning it, so tests can inspect
	/// the list without a thread draining it.
	#[cfg(test)]
	pub(crate) fn pause_worker(&self) {
		*self.shared.worker_alive.lock() = true;
	}

	/// Ensures a worker thread is running and prods it.
	pub fn wake(&self) {
		if self.shared.disposed.load(Ordering::Acquire) {
			return;
		}
		{
			let mut alive = self.shared.worker_alive.lock();
			if !*alive {
				*alive = true;
				self.spawn_worker();
			}
		}
		self.shared.wake.notify_all();
	}

	fn spawn_worker(&self) {
		let shared = Arc::clone(&self.shared);
		let provider = Arc::clone(&self.provider);
		let factory = Arc::clone(&self.engine_factory);
		let label = self.label;
		let spawned = std::thread::Builder::new()
			.name(format!("galley-check-{label}"))
			.spawn(move || worker_loop(&shared, provider.as_ref(), &factory, label));
		if let Err(error) = spawned {
			warn!(%error, label, "could not spawn check worker");
			*self.shared.worker_alive.lock() = false;
		}
	}
}

fn worker_loop(
	shared: &QueueShared,
	provider: &dyn CheckProvider,
	factory: &EngineFactory,
	label: &'static str,
) {
	let mut engine: Option<Box<dyn RuleEngine>> = None;
	let mut language: Option<Locale> = None;
	let mut runs = 0usize;

	loop {
		let Some(item) = next_item(shared, provider) else {
			return;
		};

		match item {
			QueueItem::Dispose => {
				debug!(label, "check worker disposed");
				return;
			}
			QueueItem::Stop => {
				engine = None;
				language = None;
				*shared.worker_alive.lock() = false;
				debug!(label, "check worker stopped");
				return;
			}
			QueueItem::Reset => {
				engine = None;
				language = None;
				shared.interrupt.store(false, Ordering::Release);
				continue;
			}
			QueueItem::Check(entry) => {
				*shared.last_doc.lock() = Some(entry.doc_id);
				run_one(shared, provider, factory, &mut engine, &mut language, &entry);
				shared.interrupt.store(false, Ordering::Release);
				*shared.last_doc.lock() = None;
			}
		}

		runs += 1;
		if runs % HEAP_CHECK_INTERVAL == 0 && !provider.heap_ok() {
			debug!(label, "heap pressure, stopping check worker");
			engine = None;
			*shared.worker_alive.lock() = false;
			return;
		}
		if runs >= MAX_CHECK_PER_THREAD {
			// Bounded lifetime per thread; the next wake respawns.
			*shared.worker_alive.lock() = false;
			return;
		}
	}
}

/// Pops the next item, scavenging holes when the list runs dry. `None`
/// when there is nothing left to do and the thread should exit.
fn next_item(shared: &QueueShared, provider: &dyn CheckProvider) -> Option<QueueItem> {
	loop {
		{
			let mut list = shared.list.lock();
			if let Some(item) = (!list.is_empty()).then(|| list.remove(0)) {
				return Some(item);
			}
			// Linger briefly; an edit burst usually queues more work.
			shared.wake.wait_for(&mut list, WAIT_TIME);
			if let Some(item) = (!list.is_empty()).then(|| list.remove(0)) {
				return Some(item);
			}
		}
		if shared.disposed.load(Ordering::Acquire) {
			return None;
		}
		match provider.next_hole() {
			Some(entry) => {
				shared.list.lock().push(QueueItem::Check(entry));
			}
			None => {
				// Announce the exit before the final list check so a
				// concurrent add_entry either sees the dead worker and
				// respawns, or its entry is picked up here.
				let mut alive = shared.worker_alive.lock();
				if !shared.list.lock().is_empty() {
					continue;
				}
				*alive = false;
				return None;
			}
		}
	}
}

fn run_one(
	shared: &QueueShared,
	provider: &dyn CheckProvider,
	factory: &EngineFactory,
	engine: &mut Option<Box<dyn RuleEngine>>,
	language: &mut Option<Locale>,
	entry: &QueueEntry,
) {
	let Some(locale) = provider.entry_locale(entry) else {
		// No language to check with; run engine-less so the rows still
		// fill and the hole scan moves on.
		provider.run_entry(entry, None, &shared.interrupt);
		return;
	};

	if engine.is_none() {
		*language = None;
	}
	let active = engine.get_or_insert_with(|| factory()).as_mut();
	if !active.supports(&locale) {
		// Unsupported language: run with no engine so empty rows still
		// fill the holes.
		provider.run_entry(entry, None, &shared.interrupt);
		return;
	}
	if language.as_ref() != Some(&locale) {
		active.set_language(&locale);
		*language = Some(locale);
	}
	active.activate_rule_classes(entry.cache_index);
	provider.run_entry(entry, Some(active), &shared.interrupt);
}
