//! Cache persistence.
//!
//! Per document the engine writes one brotli-compressed postcard blob:
//! document cache, every result cache, the permanent ignores, and the
//! configuration fingerprint the caches were built under. A blob whose
//! fingerprint disagrees with the running configuration is rejected whole —
//! no partial reuse — and any read failure degrades to "start with empty
//! caches".

use std::fs::File;
use std::io::{self, Read, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::cache::CacheData;
use crate::config::ConfigFingerprint;
use crate::error::{StepError, StepResult};
use crate::ignore::IgnoredMatchStore;
use crate::results::ResultCache;

/// Sanity cap for a decompressed blob.
const MAX_BLOB_BYTES: u64 = 64 * 1024 * 1024;

const BROTLI_BUFFER: usize = 4096;
const BROTLI_QUALITY: u32 = 5;
const BROTLI_WINDOW: u32 = 22;

/// Everything persisted for one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedState {
	pub fingerprint: ConfigFingerprint,
	pub cache: CacheData,
	pub results: Vec<ResultCache>,
	pub permanent_ignores: IgnoredMatchStore,
}

/// Writes the blob; the caller must not hold any cache lock across this.
pub fn save_state(path: &Path, state: &PersistedState) -> StepResult<()> {
	let bytes = postcard::to_allocvec(state)
		.map_err(|e| StepError::BlobWrite(io::Error::new(io::ErrorKind::InvalidData, e)))?;
	if bytes.len() as u64 > MAX_BLOB_BYTES {
		return Err(StepError::BlobWrite(io::Error::new(
			io::ErrorKind::InvalidData,
			format!("cache blob too large: {} bytes", bytes.len()),
		)));
	}
	let file = File::create(path).map_err(StepError::BlobWrite)?;
	let mut writer = brotli::CompressorWriter::new(file, BROTLI_BUFFER, BROTLI_QUALITY, BROTLI_WINDOW);
	writer.write_all(&bytes).map_err(StepError::BlobWrite)?;
	writer.flush().map_err(StepError::BlobWrite)?;
	debug!(path = %path.display(), bytes = bytes.len(), "cache blob written");
	Ok(())
}

/// Reads and validates a blob against the running configuration.
pub fn load_state(path: &Path, fingerprint: &ConfigFingerprint) -> StepResult<PersistedState> {
	let file = File::open(path).map_err(StepError::BlobRead)?;
	let mut reader = brotli::Decompressor::new(file, BROTLI_BUFFER);
	let mut bytes = Vec::new();
	reader
		.by_ref()
		.take(MAX_BLOB_BYTES + 1)
		.read_to_end(&mut bytes)
		.map_err(StepError::BlobRead)?;
	if bytes.len() as u64 > MAX_BLOB_BYTES {
		return Err(StepError::BlobRead(io::Error::new(
			io::ErrorKind::InvalidData,
			"cache blob exceeds size cap",
		)));
	}
	let state: PersistedState = postcard::from_bytes(&bytes)
		.map_err(|e| StepError::BlobRead(io::Error::new(io::ErrorKind::InvalidData, e)))?;
	if state.fingerprint != *fingerprint {
		// Rebuilt rules mean stale offsets and ids; rebuild from scratch.
		return Err(StepError::FingerprintMismatch);
	}
	Ok(state)
}

/// `load_state` with the error policy of the read path applied: any
/// failure, fingerprint mismatch included, yields `None` and the engine
/// continues with empty caches.
pub fn try_load_state(path: &Path, fingerprint: &ConfigFingerprint) -> Option<PersistedState> {
	match load_state(path, fingerprint) {
		Ok(state) => Some(state),
		Err(StepError::FingerprintMismatch) => {
			debug!(path = %path.display(), "cache blob rejected: configuration changed");
			None
		}
		Err(error) => {
			warn!(path = %path.display(), %error, "cache blob unreadable, starting empty");
			None
		}
	}
}
