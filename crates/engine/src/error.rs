//! Engine-internal error taxonomy.
//!
//! Each internal step reports failure through [`StepError`]; the top-level
//! handlers decide whether to log, fall back to stale data, or mark the
//! document cache dirty. Two properties are load-bearing: the host callback
//! path never surfaces an error, and the background worker never dies to
//! one.

use galley_host::HostError;
use thiserror::Error;

/// Failure of one internal engine step.
#[derive(Debug, Error)]
pub enum StepError {
	/// A host cursor or paragraph call failed; the request is skipped
	/// without touching any cache.
	#[error("transient host call failure: {0}")]
	TransientHostCall(HostError),

	/// The flat/text mapping could not align paragraph counts even after
	/// the repair pass. The cache is marked dirty; the next request forces
	/// a refresh.
	#[error("flat/text mapping desync: {unmatched} unmatched of {total} paragraphs")]
	CacheDesync { unmatched: usize, total: usize },

	/// The AI backend timed out; treated as an empty suggestion set.
	#[error("remote completion timed out")]
	RemoteTimeout,

	/// The AI backend answered with something unusable.
	#[error("unusable remote completion: {0}")]
	RemoteBadResponse(String),

	/// The rule engine failed; an empty result row is recorded so the hole
	/// is filled and the worker continues.
	#[error("rule engine failure: {0}")]
	RuleEngineFailure(String),

	/// A persisted cache blob could not be read.
	#[error("cache blob unreadable: {0}")]
	BlobRead(std::io::Error),

	/// A persisted cache blob could not be written.
	#[error("cache blob unwritable: {0}")]
	BlobWrite(std::io::Error),

	/// A persisted cache blob does not match the running configuration and
	/// was rejected without partial reuse.
	#[error("cache blob fingerprint mismatch")]
	FingerprintMismatch,

	/// The document was disposed; the operation short-circuited.
	#[error("document disposed")]
	Disposed,
}

impl From<HostError> for StepError {
	fn from(error: HostError) -> Self {
		match error {
			HostError::Timeout => StepError::RemoteTimeout,
			HostError::BadResponse(msg) => StepError::RemoteBadResponse(msg),
			HostError::RuleEngine(msg) => StepError::RuleEngineFailure(msg),
			HostError::Disposed => StepError::Disposed,
			other => StepError::TransientHostCall(other),
		}
	}
}

/// Result alias for internal steps.
pub type StepResult<T> = std::result::Result<T, StepError>;
