/*!
# CD Dump: Errors
*/

use std::fmt;



#[derive(Debug, Clone, Eq, PartialEq)]
/// # Dump Error.
///
/// This covers the fatal and operational error kinds that can terminate a
/// dump outright. Recoverable per-sector failures never reach this type —
/// they're folded into the bad-block set and reported only through
/// [`crate::events::LogEvent`].
pub enum DumpError {
	/// # Drive can't be read at all (no framing worked).
	DriveUnreadable,

	/// # Output sink lacks the negotiated sector-tag support.
	SinkIncapable,

	/// # Output sink could not be created.
	SinkCreateFailed,

	/// # Output sink rejected the track list.
	SinkSetTracksFailed,

	/// # Persisted resume record is corrupt or unreadable.
	ResumeInvalid,

	/// # A media tag was rejected by the sink and "force" was not set.
	UnsupportedTag,

	/// # Lead-in could not be read at all.
	LeadInUnreadable,

	/// # MODE SELECT was rejected by the drive.
	ModeSelectRejected,

	/// # Subchannel capability had to be downgraded without "force".
	SubchannelDowngrade,

	/// # ISRC could not be decoded for a track.
	IsrcUnavailable,

	/// # The dump was cancelled by the caller.
	Aborted,

	/// # A sector failed and "stop on error" is set.
	StoppedOnError,

	/// # No usable TOC, and "force" was not set.
	NoToc,

	/// # A track could not be found.
	NoTrack(u8),

	/// # Integer conversion overflowed (32-bit targets, huge discs).
	Overflow,

	/// # Filesystem read failure.
	Io(String),

	/// # Filesystem write failure.
	Write(String),

	/// # Internal invariant violation.
	///
	/// This should never happen; if it does, it's a bug, not user error.
	Bug(&'static str),
}

impl std::error::Error for DumpError {}

impl fmt::Display for DumpError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::DriveUnreadable => f.write_str("The drive could not be read in any supported framing."),
			Self::SinkIncapable => f.write_str("The output format cannot store the negotiated sector framing."),
			Self::SinkCreateFailed => f.write_str("The output image could not be created."),
			Self::SinkSetTracksFailed => f.write_str("The output image rejected the track list."),
			Self::ResumeInvalid => f.write_str("The resume record is corrupt or unreadable."),
			Self::UnsupportedTag => f.write_str("The output image does not support one or more media tags."),
			Self::LeadInUnreadable => f.write_str("The lead-in could not be read."),
			Self::ModeSelectRejected => f.write_str("The drive rejected a MODE SELECT command."),
			Self::SubchannelDowngrade => f.write_str("Subchannel capability had to be downgraded."),
			Self::IsrcUnavailable => f.write_str("An ISRC could not be decoded."),
			Self::Aborted => f.write_str("The dump was cancelled."),
			Self::StoppedOnError => f.write_str("A sector failed and stop-on-error is set."),
			Self::NoToc => f.write_str("The disc's table of contents could not be read."),
			Self::NoTrack(n) => write!(f, "Track #{n} does not exist on this disc."),
			Self::Overflow => f.write_str("An integer conversion overflowed."),
			Self::Io(s) => write!(f, "I/O error: {s}"),
			Self::Write(s) => write!(f, "Write error: {s}"),
			Self::Bug(s) => write!(f, "BUG: {s}"),
		}
	}
}

impl DumpError {
	#[must_use]
	/// # Is Fatal?
	///
	/// Fatal errors abort the dump outright; everything else is either
	/// soft (logged, only surfaced with "force") or operational.
	pub const fn is_fatal(&self) -> bool {
		matches!(
			self,
			Self::DriveUnreadable
				| Self::SinkIncapable
				| Self::SinkCreateFailed
				| Self::SinkSetTracksFailed
				| Self::ResumeInvalid
				| Self::NoToc
				| Self::Overflow
				| Self::Bug(_)
				| Self::StoppedOnError
		)
	}

	#[must_use]
	/// # Is Soft?
	///
	/// Soft errors are log-only when "force" is set, fatal otherwise.
	pub const fn is_soft(&self) -> bool {
		matches!(
			self,
			Self::UnsupportedTag
				| Self::LeadInUnreadable
				| Self::ModeSelectRejected
				| Self::SubchannelDowngrade
				| Self::IsrcUnavailable
		)
	}
}



#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn t_is_fatal() {
		assert!(DumpError::DriveUnreadable.is_fatal());
		assert!(! DumpError::Aborted.is_fatal());
		assert!(! DumpError::UnsupportedTag.is_fatal());
	}

	#[test]
	fn t_is_soft() {
		assert!(DumpError::IsrcUnavailable.is_soft());
		assert!(! DumpError::DriveUnreadable.is_soft());
		assert!(! DumpError::Aborted.is_soft());
	}
}
