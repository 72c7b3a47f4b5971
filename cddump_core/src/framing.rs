/*!
# CD Dump: Sector Framing
*/

use crate::{
	error::DumpError,
	sink::SectorTagKind,
};



/// # User-Data Bytes Per Sector.
pub const SECTOR_SIZE: u32 = 2352;



#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
/// # Subchannel Format.
///
/// Selected once per session by the [`crate::capability`] prober (§3);
/// never upgraded afterward (invariant 6, §8).
pub enum SubchannelFormat {
	/// # No Subchannel.
	None,

	/// # Raw P-W (96 bytes).
	RawPW96,

	/// # Packed Q (16 bytes).
	PackedQ16,
}

impl SubchannelFormat {
	#[must_use]
	/// # Subchannel Bytes.
	pub const fn subchannel_size(self) -> u32 {
		match self {
			Self::None => 0,
			Self::PackedQ16 => 16,
			Self::RawPW96 => 96,
		}
	}

	#[must_use]
	/// # Block Size.
	///
	/// Total bytes per sector once the subchannel (if any) is appended.
	pub const fn block_size(self) -> u32 { SECTOR_SIZE + self.subchannel_size() }

	#[must_use]
	/// # Matching Sector Tag Kind.
	///
	/// The [`SectorTagKind`] an [`crate::sink::ImageSink`] write needs for
	/// this subchannel format's auxiliary stream, or `None` when there is
	/// no subchannel to write.
	pub const fn sector_tag(self) -> Option<SectorTagKind> {
		match self {
			Self::None => None,
			Self::RawPW96 => Some(SectorTagKind::SubchannelRawPW),
			Self::PackedQ16 => Some(SectorTagKind::SubchannelPackedQ),
		}
	}
}



#[derive(Debug, Clone, Copy, Eq, PartialEq)]
/// # Framing.
///
/// A small, immutable value computed once from the negotiated
/// [`SubchannelFormat`] that knows how to split a multi-block read buffer
/// into its user-data and subchannel streams (§4.3).
pub struct Framing {
	/// # Subchannel Format.
	format: SubchannelFormat,
}

impl Framing {
	#[must_use]
	/// # New.
	pub const fn new(format: SubchannelFormat) -> Self { Self { format } }

	#[must_use]
	/// # Subchannel Format.
	pub const fn format(&self) -> SubchannelFormat { self.format }

	#[must_use]
	/// # Block Size.
	pub const fn block_size(&self) -> u32 { self.format.block_size() }

	/// # Split.
	///
	/// Given a buffer holding `blocks` contiguous frames (user data +
	/// subchannel, per §4.3's contract), return the flat user-data stream
	/// and the flat subchannel stream.
	///
	/// ## Errors
	///
	/// Returns [`DumpError::Bug`] if the buffer length doesn't match
	/// `blocks * block_size()`.
	pub fn split<'a>(&self, buf: &'a [u8], blocks: u32) -> Result<(&'a [u8], &'a [u8]), DumpError> {
		let bs = self.block_size() as usize;
		let blocks = blocks as usize;
		if buf.len() != bs * blocks {
			return Err(DumpError::Bug("Framing::split buffer length mismatch."));
		}

		let sub_size = self.format.subchannel_size() as usize;
		if sub_size == 0 { return Ok((buf, &[])); }

		// The frames are interleaved (data, sub, data, sub, …), so a flat
		// user-data stream can only be produced without copying when there
		// is exactly one block; otherwise callers that need a flat stream
		// should use `split_owned`. For a single block the subslices are
		// already contiguous.
		if blocks == 1 {
			let (d, s) = buf.split_at(SECTOR_SIZE as usize);
			Ok((d, s))
		}
		else {
			Err(DumpError::Bug("Framing::split requires split_owned for multi-block reads."))
		}
	}

	#[must_use]
	/// # Split (Owned).
	///
	/// Like [`Framing::split`], but de-interleaves an arbitrary number of
	/// blocks into two owned, flat byte vectors. This is the form the
	/// [`crate::dump`] loop actually uses.
	pub fn split_owned(&self, buf: &[u8], blocks: u32) -> (Vec<u8>, Vec<u8>) {
		let bs = self.block_size() as usize;
		let sub_size = self.format.subchannel_size() as usize;
		let mut data = Vec::with_capacity(SECTOR_SIZE as usize * blocks as usize);
		let mut sub = Vec::with_capacity(sub_size * blocks as usize);

		for frame in buf.chunks_exact(bs) {
			let (d, s) = frame.split_at(SECTOR_SIZE as usize);
			data.extend_from_slice(d);
			sub.extend_from_slice(s);
		}

		(data, sub)
	}

	#[must_use]
	/// # Merge.
	///
	/// Re-interleave flat user-data and subchannel streams back into the
	/// per-frame layout a drive command would have produced. Used only by
	/// tooling that needs to reconstruct raw frames from split streams;
	/// the dump loop itself never needs this direction.
	pub fn merge(&self, data: &[u8], sub: &[u8]) -> Vec<u8> {
		let sub_size = self.format.subchannel_size() as usize;
		if sub_size == 0 { return data.to_vec(); }

		let blocks = data.len() / SECTOR_SIZE as usize;
		let mut out = Vec::with_capacity(self.block_size() as usize * blocks);
		for (d, s) in data.chunks_exact(SECTOR_SIZE as usize).zip(sub.chunks_exact(sub_size)) {
			out.extend_from_slice(d);
			out.extend_from_slice(s);
		}
		out
	}
}



#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn t_block_size() {
		assert_eq!(SubchannelFormat::None.block_size(), 2352);
		assert_eq!(SubchannelFormat::PackedQ16.block_size(), 2368);
		assert_eq!(SubchannelFormat::RawPW96.block_size(), 2448);
	}

	#[test]
	fn t_sector_tag() {
		assert_eq!(SubchannelFormat::None.sector_tag(), None);
		assert_eq!(SubchannelFormat::PackedQ16.sector_tag(), Some(SectorTagKind::SubchannelPackedQ));
		assert_eq!(SubchannelFormat::RawPW96.sector_tag(), Some(SectorTagKind::SubchannelRawPW));
	}

	#[test]
	fn t_split_owned_none() {
		let framing = Framing::new(SubchannelFormat::None);
		let buf = vec![7_u8; SECTOR_SIZE as usize * 3];
		let (data, sub) = framing.split_owned(&buf, 3);
		assert_eq!(data.len(), SECTOR_SIZE as usize * 3);
		assert!(sub.is_empty());
	}

	#[test]
	fn t_split_merge_roundtrip_packedq() {
		let framing = Framing::new(SubchannelFormat::PackedQ16);
		let blocks = 4_u32;
		let mut buf = Vec::new();
		for i in 0..blocks {
			buf.extend(std::iter::repeat(i as u8).take(SECTOR_SIZE as usize));
			buf.extend(std::iter::repeat(0xAA_u8.wrapping_add(i as u8)).take(16));
		}

		let (data, sub) = framing.split_owned(&buf, blocks);
		let merged = framing.merge(&data, &sub);
		assert_eq!(merged, buf);
	}

	#[test]
	fn t_split_single_block() {
		let framing = Framing::new(SubchannelFormat::RawPW96);
		let mut buf = vec![1_u8; SECTOR_SIZE as usize];
		buf.extend(vec![2_u8; 96]);
		let (d, s) = framing.split(&buf, 1).expect("single block split should work");
		assert!(d.iter().all(|&b| b == 1));
		assert!(s.iter().all(|&b| b == 2));
	}
}
