//! Basic primitives shared across the galley checking engine.
//!
//! This crate holds the coordinate systems that name paragraphs in a live
//! document, the locale and match types exchanged with the rule engine, and
//! the flat/text paragraph equivalence predicate used by the document cache's
//! mapping heuristics. Everything here is host-agnostic and serializable.

pub mod analysis;
pub mod coords;
pub mod equivalence;
pub mod locale;
pub mod matches;

pub use analysis::{AnalyzedSentence, TokenSpan, analyze_paragraph};
pub use coords::{ChangedRange, TextCoord, TextKind};
pub use equivalence::{MAX_NOTE_CHAR, ZERO_WIDTH_SPACE, is_equal_text};
pub use locale::{Locale, MULTILINGUAL_LABEL};
pub use matches::{CheckMatch, MatchFlags};

/// Separator inserted between paragraphs when a multi-paragraph window is
/// flattened into a single string for the rule engine.
pub const PARAGRAPH_SEPARATOR: &str = "\n\n";

/// Soft line break as delivered by the host inside a paragraph string.
pub const SOFT_LINE_BREAK: char = '\u{000B}';

/// Sentinel a soft line break is rewritten to during text extraction, so the
/// rule engine can tell a manual break from a paragraph end.
pub const MANUAL_LINE_BREAK: char = '\u{2028}';
