//! Errors crossing the host boundary.

use thiserror::Error;

/// Failure of a collaborator call.
#[derive(Debug, Error)]
pub enum HostError {
	/// The host could not serve the call right now (document mid-layout,
	/// service not yet initialized). The engine skips the request without
	/// mutating any cache.
	#[error("host service unavailable: {0}")]
	Unavailable(&'static str),

	/// The document is closing; every subsequent call will fail too.
	#[error("document disposed")]
	Disposed,

	/// A remote call exceeded its transport timeout.
	#[error("remote call timed out")]
	Timeout,

	/// The remote answered with something unusable.
	#[error("unusable remote response: {0}")]
	BadResponse(String),

	/// The rule engine failed internally.
	#[error("rule engine failure: {0}")]
	RuleEngine(String),
}
