/*!
# CD Dump: Rate Logs

Per-block transfer-rate logging in the two legacy formats dumping tools
have historically produced for third-party graphing/analysis tools: an
MHDD-style log (fixed binary header, one record per `(lba, durationMs)`)
and an IBG-style log (fixed binary header, then speed samples), per §6.
Both are optional, append-only, and never consulted for resume/
verification decisions (logging is an ambient concern, not part of dump
correctness).
*/

use crate::serial::DeSerialize;
use std::io::{
	self,
	Write,
};



/// # MHDD Log Magic Header.
const MHDD_MAGIC: [u8; 8] = *b"CDMHDDL1";

/// # IBG Log Magic Header.
const IBG_MAGIC: [u8; 8] = *b"CDIBGLG1";



#[derive(Debug, Clone, Copy, Eq, PartialEq)]
/// # Block Outcome.
///
/// What happened to a given LBA, for logging purposes. Distinct from
/// [`crate::recovery::RecoveryState`]: the rate log only cares about the
/// end result, not the state machine that produced it.
pub enum BlockOutcome {
	/// # Read Cleanly On The First Attempt.
	Good,

	/// # Recovered After One Or More Retries.
	Recovered,

	/// # Never Recovered; Filled With Silence/Padding.
	Unrecovered,
}

impl BlockOutcome {
	const fn as_u8(self) -> u8 {
		match self {
			Self::Good => 0,
			Self::Recovered => 1,
			Self::Unrecovered => 2,
		}
	}
}



/// # MHDD-Style Rate Log.
///
/// Fixed 8-byte magic header, followed by one fixed-width binary record
/// per block: `lba: i32`, `duration_ms: u32`, `outcome: u8` (§6).
pub struct MhddLog<W: Write> {
	out: W,
}

impl<W: Write> MhddLog<W> {
	/// # New.
	///
	/// Writes the magic header immediately.
	///
	/// ## Errors
	///
	/// Returns an I/O error if the header can't be written.
	pub fn new(mut out: W) -> io::Result<Self> {
		out.write_all(&MHDD_MAGIC)?;
		Ok(Self { out })
	}

	/// # Record One Block.
	///
	/// ## Errors
	///
	/// Returns an I/O error if the write fails.
	pub fn record(&mut self, lba: i32, outcome: BlockOutcome, duration_ms: u32) -> io::Result<()> {
		lba.serialize_into(&mut self.out)
			.and_then(|()| duration_ms.serialize_into(&mut self.out))
			.and_then(|()| outcome.as_u8().serialize_into(&mut self.out))
			.ok_or_else(|| io::Error::new(io::ErrorKind::Other, "mhdd log write failed"))
	}

	/// # Finish, Flushing The Underlying Writer.
	///
	/// ## Errors
	///
	/// Returns an I/O error if the flush fails.
	pub fn finish(mut self) -> io::Result<()> { self.out.flush() }
}



/// # IBG-Style Rate Log.
///
/// Fixed 8-byte magic header, followed by one 8-byte `f64` speed sample
/// (MB/s) per measured command (§6). Unlike the MHDD log this isn't
/// per-LBA: it only records instantaneous throughput, the same quantity
/// [`crate::dump::DumpStats`] tracks min/max of.
pub struct IbgLog<W: Write> {
	out: W,
}

impl<W: Write> IbgLog<W> {
	/// # New.
	///
	/// Writes the magic header immediately.
	///
	/// ## Errors
	///
	/// Returns an I/O error if the header can't be written.
	pub fn new(mut out: W) -> io::Result<Self> {
		out.write_all(&IBG_MAGIC)?;
		Ok(Self { out })
	}

	/// # Record One Speed Sample (MB/s).
	///
	/// ## Errors
	///
	/// Returns an I/O error if the write fails.
	pub fn record(&mut self, mbps: f64) -> io::Result<()> {
		mbps.serialize_into(&mut self.out)
			.ok_or_else(|| io::Error::new(io::ErrorKind::Other, "ibg log write failed"))
	}

	/// # Finish, Flushing The Underlying Writer.
	///
	/// ## Errors
	///
	/// Returns an I/O error if the flush fails.
	pub fn finish(mut self) -> io::Result<()> { self.out.flush() }
}



#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn t_mhdd_header_and_records() {
		let mut buf = Vec::new();
		{
			let mut log = MhddLog::new(&mut buf).expect("header write should succeed");
			log.record(0, BlockOutcome::Good, 12).unwrap();
			log.record(64, BlockOutcome::Unrecovered, 0).unwrap();
			log.finish().unwrap();
		}
		assert_eq!(&buf[..8], &MHDD_MAGIC);
		// Two 9-byte records (4 + 4 + 1) after the header.
		assert_eq!(buf.len(), 8 + 9 * 2);
		assert_eq!(&buf[8..12], &0_i32.to_le_bytes());
		assert_eq!(&buf[12..16], &12_u32.to_le_bytes());
		assert_eq!(buf[16], BlockOutcome::Good.as_u8());
	}

	#[test]
	fn t_ibg_header_and_samples() {
		let mut buf = Vec::new();
		{
			let mut log = IbgLog::new(&mut buf).expect("header write should succeed");
			log.record(4.5).unwrap();
			log.record(7.25).unwrap();
			log.finish().unwrap();
		}
		assert_eq!(&buf[..8], &IBG_MAGIC);
		assert_eq!(buf.len(), 8 + 8 * 2);
		assert_eq!(&buf[8..16], &4.5_f64.to_le_bytes());
		assert_eq!(&buf[16..24], &7.25_f64.to_le_bytes());
	}
}
