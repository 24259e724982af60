//! Contracts between the galley engine and its collaborators.
//!
//! The engine never talks to the word processor, the grammar rule engine, or
//! the AI backend directly; it sees them through the traits in this crate.
//! The host side implements [`DocumentHost`] per open document; the checking
//! side implements [`RuleEngine`], [`AiBackend`], [`SpellService`] and
//! [`Thesaurus`]. All calls are synchronous: the engine's workers block on
//! them and apply their own timeouts and error policy.

mod error;
mod traits;
mod types;

pub use error::HostError;
pub use traits::{AiBackend, DocumentHost, RuleEngine, SpellService, Thesaurus};
pub use types::{
	AiRequest, CheckRequest, FlatParagraph, FlatSnapshot, Heading, KindSnapshot, ParagraphHandling,
	ProofReason, ViewCursor,
};
