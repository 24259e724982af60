//! The collaborator traits.

use galley_primitives::{AnalyzedSentence, CheckMatch, Locale, TextKind};

use crate::error::HostError;
use crate::types::{AiRequest, FlatSnapshot, KindSnapshot, ParagraphHandling, ViewCursor};

/// The word processor's view of one open document.
///
/// Implementations are called from the engine's worker threads as well as
/// from the host callback thread and must be internally synchronized. Any
/// call may fail transiently (the document may be mid-layout or closing);
/// the engine logs and skips rather than propagating such failures.
pub trait DocumentHost: Send + Sync {
	/// The flat paragraph list, footnotes as zero-width-space sentinels.
	fn flat_snapshot(&self) -> Result<FlatSnapshot, HostError>;

	/// The typed paragraph list of one container kind.
	fn kind_snapshot(&self, kind: TextKind) -> Result<KindSnapshot, HostError>;

	/// Current view cursor position.
	fn view_cursor(&self) -> Result<ViewCursor, HostError>;

	/// Replaces `length` bytes at `start` of the given flat paragraph.
	fn replace_text(&self, flat_index: usize, start: usize, length: usize, replacement: &str)
	-> Result<(), HostError>;

	/// Asks the host to repaint the check marks of a flat paragraph.
	fn schedule_remark(&self, flat_index: usize);

	/// False when the host reports heap pressure; the background worker
	/// winds down when this turns false.
	fn heap_ok(&self) -> bool;
}

/// The grammar rule engine.
///
/// Exactly one worker owns an instance at a time; implementations need not
/// be re-entrant, but moving an instance between restarted worker threads
/// must be possible.
pub trait RuleEngine: Send {
	/// True when the engine has rules for the locale's language.
	fn supports(&self, locale: &Locale) -> bool;

	/// Switches the active language. Clears any per-language rule state.
	fn set_language(&mut self, locale: &Locale);

	/// Activates rule classes `0..=max_class`; higher classes span wider
	/// paragraph windows.
	fn activate_rule_classes(&mut self, max_class: usize);

	/// Checks analyzed sentences and returns matches with byte offsets
	/// relative to the concatenated sentence text.
	fn check(
		&mut self,
		sentences: &[AnalyzedSentence],
		handling: ParagraphHandling,
	) -> Result<Vec<CheckMatch>, HostError>;
}

/// Remote completion backend for the AI detection adapter.
pub trait AiBackend: Send + Sync {
	/// Returns the completion for one request. Implementations enforce the
	/// transport timeout; the engine maps both [`HostError::Timeout`] and
	/// [`HostError::BadResponse`] to "no suggestions this pass".
	fn complete(&self, request: &AiRequest) -> Result<String, HostError>;
}

/// The host's spell checking service.
pub trait SpellService: Send + Sync {
	fn accepts(&self, word: &str, locale: &Locale) -> bool;
}

/// Synonym lookup used to augment AI and style suggestions.
pub trait Thesaurus: Send + Sync {
	fn synonyms(&self, word: &str, locale: &Locale) -> Vec<String>;
}
