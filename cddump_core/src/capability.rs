/*!
# CD Dump: Capability Prober

Determines, once per mount, the highest-fidelity sector framing the drive
supports, clamps it to what the output sink can actually store, and
probes the largest block count a single `ReadCd` command can carry (§4.1).
Resolved exactly once and stored for the life of the session (§9: "resolve
at mount once", not re-queried on every command).
*/

use crate::{
	drive::DriveHandle,
	error::DumpError,
	framing::SubchannelFormat,
	sink::SectorTagKind,
};
use std::time::Duration;



/// # Starting Probe Size (Blocks).
const PROBE_START: u32 = 64;



#[derive(Debug, Clone, Copy, Eq, PartialEq)]
/// # Drive Capabilities.
///
/// Immutable once probed; every subsequent read in the session goes
/// through the framing and block-count this struct settled on.
pub struct DriveCapabilities {
	/// # Negotiated Subchannel Format.
	subchannel: SubchannelFormat,

	/// # Largest Block Count A Single Command Will Carry.
	max_blocks_per_command: u32,
}

impl DriveCapabilities {
	#[must_use]
	/// # Subchannel Format.
	pub const fn subchannel(self) -> SubchannelFormat { self.subchannel }

	#[must_use]
	/// # Max Blocks Per Command.
	pub const fn max_blocks_per_command(self) -> u32 { self.max_blocks_per_command }

	/// # Probe.
	///
	/// Runs the full §4.1 sequence: framing negotiation (raw P-W, then
	/// packed-Q, then no subchannel), a clamp against the sink's
	/// supported sector tags, then a halving search for the largest
	/// workable block count.
	///
	/// ## Errors
	///
	/// Returns [`DumpError::DriveUnreadable`] if the drive can't be read
	/// at all in any framing, or can't even manage a single block, and
	/// [`DumpError::SinkIncapable`] if the negotiated subchannel can't be
	/// stored by the sink and `force` was not set.
	pub fn probe(
		drive: &dyn DriveHandle,
		sink_tags: &[SectorTagKind],
		force: bool,
		timeout: Duration,
	) -> Result<Self, DumpError> {
		let mut subchannel = Self::probe_framing(drive, timeout)?;

		if let Some(tag) = subchannel.sector_tag() {
			if !sink_tags.contains(&tag) {
				if force { subchannel = SubchannelFormat::None; }
				else { return Err(DumpError::SinkIncapable); }
			}
		}

		let max_blocks_per_command = Self::probe_max_blocks(drive, subchannel, timeout)?;

		Ok(Self { subchannel, max_blocks_per_command })
	}

	/// # Probe Framing.
	///
	/// Tries, in order, raw P-W subchannel, packed-Q subchannel, then no
	/// subchannel at all, accepting the first that reads LBA 0 cleanly.
	fn probe_framing(drive: &dyn DriveHandle, timeout: Duration) -> Result<SubchannelFormat, DumpError> {
		for format in [SubchannelFormat::RawPW96, SubchannelFormat::PackedQ16, SubchannelFormat::None] {
			if drive.read_cd(0, 1, format, false, timeout).is_ok() { return Ok(format); }
		}
		Err(DumpError::DriveUnreadable)
	}

	/// # Probe Max Blocks Per Command.
	///
	/// Starts at [`PROBE_START`] and halves on failure down to a floor of
	/// one; a failure at one block is fatal.
	fn probe_max_blocks(
		drive: &dyn DriveHandle,
		subchannel: SubchannelFormat,
		timeout: Duration,
	) -> Result<u32, DumpError> {
		let mut count = PROBE_START;
		loop {
			if drive.read_cd(0, count, subchannel, false, timeout).is_ok() { return Ok(count); }
			if count == 1 { return Err(DumpError::DriveUnreadable); }
			count = (count / 2).max(1);
		}
	}
}



#[cfg(test)]
mod test {
	use super::*;
	use crate::drive::test_mock::MockDrive;

	#[test]
	fn t_probe_prefers_raw_pw() {
		let drive = MockDrive::new();
		let caps = DriveCapabilities::probe(&drive, &[SectorTagKind::SubchannelRawPW], false, Duration::from_secs(1))
			.expect("probe should succeed");
		assert_eq!(caps.subchannel(), SubchannelFormat::RawPW96);
		assert_eq!(caps.max_blocks_per_command(), PROBE_START);
	}

	#[test]
	fn t_probe_falls_back_on_unsupported_subchannel() {
		let drive = MockDrive::new().with_max_subchannel(SubchannelFormat::PackedQ16);
		let caps = DriveCapabilities::probe(&drive, &[SectorTagKind::SubchannelPackedQ], false, Duration::from_secs(1))
			.expect("probe should succeed");
		assert_eq!(caps.subchannel(), SubchannelFormat::PackedQ16);
	}

	#[test]
	fn t_probe_sink_incapable_without_force() {
		let drive = MockDrive::new();
		let err = DriveCapabilities::probe(&drive, &[], false, Duration::from_secs(1)).unwrap_err();
		assert_eq!(err, DumpError::SinkIncapable);
	}

	#[test]
	fn t_probe_downgrades_with_force() {
		let drive = MockDrive::new();
		let caps = DriveCapabilities::probe(&drive, &[], true, Duration::from_secs(1))
			.expect("probe should succeed");
		assert_eq!(caps.subchannel(), SubchannelFormat::None);
	}

	#[test]
	fn t_probe_halves_block_count() {
		let drive = MockDrive::new().with_max_blocks(10);
		let caps = DriveCapabilities::probe(&drive, &[SectorTagKind::SubchannelRawPW], false, Duration::from_secs(1))
			.expect("probe should succeed");
		// 64 -> 32 -> 16 -> 8, the first power-of-two-halving step <= 10.
		assert_eq!(caps.max_blocks_per_command(), 8);
	}

	#[test]
	fn t_probe_drive_unreadable() {
		let drive = MockDrive::new().unreadable();
		let err = DriveCapabilities::probe(&drive, &[SectorTagKind::SubchannelRawPW], false, Duration::from_secs(1)).unwrap_err();
		assert_eq!(err, DumpError::DriveUnreadable);
	}
}
