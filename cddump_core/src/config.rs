/*!
# CD Dump: Configuration
*/

use std::{
	path::PathBuf,
	time::Duration,
};



/// # Default Command Timeout (Seconds).
const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// # Default Skip Count.
///
/// Placeholder writes must be at least as large as the biggest read
/// command so sector alignment is never lost mid-track (§4.4).
const DEFAULT_SKIP: u32 = 64;



#[derive(Debug, Clone, Copy, Eq, PartialEq)]
/// # Text Encoding.
///
/// Legacy codepages that CD-Text and ISRC payloads show up encoded in.
pub enum TextEncoding {
	/// # Plain ASCII.
	Ascii,

	/// # Latin-1 / ISO-8859-1.
	Latin1,

	/// # Shift-JIS.
	ShiftJis,
}

impl Default for TextEncoding {
	fn default() -> Self { Self::Ascii }
}



#[derive(Debug, Clone)]
/// # Dump Options.
///
/// Typed configuration the core receives from its caller. CLI parsing is
/// explicitly the caller's job (§1); this struct is simply the landing
/// spot.
pub struct DumpOptions {
	/// # Retry-Pass Count.
	retry_passes: u8,

	/// # Stop on First Error?
	stop_on_error: bool,

	/// # Attempt Persistent-Error Recovery?
	persistent: bool,

	/// # Dump Raw (Unprocessed) Sectors?
	dump_raw: bool,

	/// # Attempt Lead-In Capture?
	dump_lead_in: bool,

	/// # Force Past Soft Failures?
	force: bool,

	/// # Skip-On-Error Sector Count.
	skip: u32,

	/// # Skip Sidecar Metadata?
	no_metadata: bool,

	/// # Skip Error-Recovery Entirely?
	no_trim: bool,

	/// # Text Encoding.
	encoding: TextEncoding,

	/// # Output Path Prefix.
	output_prefix: PathBuf,

	/// # Output Image Path.
	output_path: PathBuf,

	/// # Per-Command Timeout.
	command_timeout: Duration,
}

impl Default for DumpOptions {
	fn default() -> Self {
		Self {
			retry_passes: 1,
			stop_on_error: false,
			persistent: false,
			dump_raw: false,
			dump_lead_in: false,
			force: false,
			skip: DEFAULT_SKIP,
			no_metadata: false,
			no_trim: false,
			encoding: TextEncoding::default(),
			output_prefix: PathBuf::new(),
			output_path: PathBuf::new(),
			command_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
		}
	}
}

/// # Setters.
impl DumpOptions {
	#[must_use]
	/// # With Retry Passes.
	pub const fn with_retry_passes(self, v: u8) -> Self { Self { retry_passes: v, ..self } }

	#[must_use]
	/// # With Stop On Error.
	pub const fn with_stop_on_error(self, v: bool) -> Self { Self { stop_on_error: v, ..self } }

	#[must_use]
	/// # With Persistent.
	pub const fn with_persistent(self, v: bool) -> Self { Self { persistent: v, ..self } }

	#[must_use]
	/// # With Raw.
	pub const fn with_raw(self, v: bool) -> Self { Self { dump_raw: v, ..self } }

	#[must_use]
	/// # With Lead-In.
	pub const fn with_lead_in(self, v: bool) -> Self { Self { dump_lead_in: v, ..self } }

	#[must_use]
	/// # With Force.
	pub const fn with_force(self, v: bool) -> Self { Self { force: v, ..self } }

	#[must_use]
	/// # With Skip.
	///
	/// Clamped to a minimum of one; a skip of zero would never let the
	/// dump loop advance past a failing sector.
	pub const fn with_skip(self, v: u32) -> Self {
		Self { skip: if v == 0 { 1 } else { v }, ..self }
	}

	#[must_use]
	/// # With No Metadata.
	pub const fn with_no_metadata(self, v: bool) -> Self { Self { no_metadata: v, ..self } }

	#[must_use]
	/// # With No Trim.
	pub const fn with_no_trim(self, v: bool) -> Self { Self { no_trim: v, ..self } }

	#[must_use]
	/// # With Encoding.
	pub const fn with_encoding(self, v: TextEncoding) -> Self { Self { encoding: v, ..self } }

	#[must_use]
	/// # With Output Prefix.
	pub fn with_output_prefix(self, v: PathBuf) -> Self { Self { output_prefix: v, ..self } }

	#[must_use]
	/// # With Output Path.
	pub fn with_output_path(self, v: PathBuf) -> Self { Self { output_path: v, ..self } }

	#[must_use]
	/// # With Command Timeout.
	pub const fn with_command_timeout(self, v: Duration) -> Self { Self { command_timeout: v, ..self } }
}

/// # Getters.
impl DumpOptions {
	#[must_use]
	/// # Retry Passes.
	pub const fn retry_passes(&self) -> u8 { self.retry_passes }

	#[must_use]
	/// # Stop On Error?
	pub const fn stop_on_error(&self) -> bool { self.stop_on_error }

	#[must_use]
	/// # Persistent?
	pub const fn persistent(&self) -> bool { self.persistent }

	#[must_use]
	/// # Dump Raw?
	pub const fn dump_raw(&self) -> bool { self.dump_raw }

	#[must_use]
	/// # Dump Lead-In?
	pub const fn dump_lead_in(&self) -> bool { self.dump_lead_in }

	#[must_use]
	/// # Force?
	pub const fn force(&self) -> bool { self.force }

	#[must_use]
	/// # Skip.
	pub const fn skip(&self) -> u32 { self.skip }

	#[must_use]
	/// # No Metadata?
	pub const fn no_metadata(&self) -> bool { self.no_metadata }

	#[must_use]
	/// # No Trim?
	pub const fn no_trim(&self) -> bool { self.no_trim }

	#[must_use]
	/// # Encoding.
	pub const fn encoding(&self) -> TextEncoding { self.encoding }

	#[must_use]
	/// # Output Prefix.
	pub fn output_prefix(&self) -> &std::path::Path { &self.output_prefix }

	#[must_use]
	/// # Output Path.
	pub fn output_path(&self) -> &std::path::Path { &self.output_path }

	#[must_use]
	/// # Command Timeout.
	pub const fn command_timeout(&self) -> Duration { self.command_timeout }
}



#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn t_dump_options_retry_passes() {
		let opts = DumpOptions::default();
		assert_eq!(opts.retry_passes(), 1);
		let opts = opts.with_retry_passes(5);
		assert_eq!(opts.retry_passes(), 5);
	}

	#[test]
	fn t_dump_options_skip_clamp() {
		let opts = DumpOptions::default().with_skip(0);
		assert_eq!(opts.skip(), 1, "Zero skip must be clamped to one.");
		let opts = opts.with_skip(128);
		assert_eq!(opts.skip(), 128);
	}

	#[test]
	fn t_dump_options_flags() {
		let opts = DumpOptions::default()
			.with_stop_on_error(true)
			.with_persistent(true)
			.with_force(true)
			.with_no_trim(true);
		assert!(opts.stop_on_error());
		assert!(opts.persistent());
		assert!(opts.force());
		assert!(opts.no_trim());
		assert!(! opts.dump_raw());
	}
}
