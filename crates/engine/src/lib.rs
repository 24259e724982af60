//! The galley checking engine.
//!
//! galley keeps a structured, incremental model of a live word-processor
//! document in lock-step with the user's edits, dispatches grammar, style
//! and AI checks against that model without stalling the host's interactive
//! proofing callback, and caches every result per paragraph so repeated
//! queries return in O(1) while an edit invalidates only the affected
//! slice.
//!
//! The moving parts:
//!
//! - [`cache::DocumentCache`] — the versioned, lock-protected paragraph
//!   model with its flat↔typed mapping, chapter boundaries and quote spans.
//! - the check-request analyzer — resolves "which paragraph is this host
//!   callback about", reacting to insertions, deletions and reorderings.
//! - [`queue`] — one background worker per queue (text-level and AI)
//!   draining a prioritized, de-duplicating task list.
//! - [`document::SingleDocument`] — per-document orchestration: merge the
//!   per-class caches, filter ignored/quoted/overlapping findings.
//! - [`checker::Checker`] — the host-facing front over all open documents.
//!
//! The host, the rule engine, and the AI backend are abstract; see the
//! `galley-host` crate for their contracts.

pub mod ai;
mod analyzer;
pub mod cache;
pub mod checker;
pub mod config;
pub mod document;
pub mod error;
pub mod ignore;
pub mod persist;
pub mod queue;
pub mod results;

pub use checker::Checker;
pub use config::{DirectSpeechFilter, EngineConfig};
pub use document::{DocumentId, SingleDocument};
pub use error::{StepError, StepResult};
