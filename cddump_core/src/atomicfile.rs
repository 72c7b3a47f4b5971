/*!
# CD Dump: Atomic File Writes

A small `CacheWriter`-equivalent: every durable artifact this crate writes
outside the output image itself (the resume record, mainly) needs to
survive a crash or cancellation mid-write without corrupting the
previously-good copy, so writes always land in a sibling temp file first
and are renamed into place only once complete.
*/

use crate::error::DumpError;
use std::{
	io::Write,
	path::Path,
};
use tempfile::NamedTempFile;



/// # Atomic Writer.
///
/// Stateless; exists only to namespace the write-then-rename helpers.
pub struct AtomicWriter;

impl AtomicWriter {
	/// # Write Bytes Atomically.
	///
	/// Writes `bytes` to a temporary file in the same directory as `path`,
	/// then renames it over `path`. A reader can never observe a partially
	/// written file: either the old contents are still there, or the new
	/// ones are, never a mix.
	///
	/// ## Errors
	///
	/// Returns [`DumpError::Write`] if the parent directory is missing, the
	/// temp file couldn't be written, or the final rename failed.
	pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), DumpError> {
		let dir = path.parent().filter(|p| !p.as_os_str().is_empty())
			.unwrap_or_else(|| Path::new("."));

		let mut tmp = NamedTempFile::new_in(dir)
			.map_err(|e| DumpError::Write(e.to_string()))?;
		tmp.write_all(bytes).map_err(|e| DumpError::Write(e.to_string()))?;
		tmp.flush().map_err(|e| DumpError::Write(e.to_string()))?;
		tmp.persist(path).map_err(|e| DumpError::Write(e.error.to_string()))?;
		Ok(())
	}

	/// # Read Bytes.
	///
	/// Plain passthrough to [`std::fs::read`]; exists alongside
	/// [`AtomicWriter::write_atomic`] so callers have one place to go for
	/// both halves of resume-record persistence.
	///
	/// ## Errors
	///
	/// Returns [`DumpError::Io`] if the file can't be read (including
	/// "doesn't exist yet", which callers distinguish via `path.exists()`
	/// beforehand if they need a fresh-start fallback).
	pub fn read(path: &Path) -> Result<Vec<u8>, DumpError> {
		std::fs::read(path).map_err(|e| DumpError::Io(e.to_string()))
	}
}
