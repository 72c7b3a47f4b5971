/*!
# CD Dump: Output Image Sink Interface
*/

use crate::{
	error::DumpError,
	resume::DumpHardware,
	toc::{
		MediaTagKind,
		MediaType,
		Track,
	},
};



#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, PartialOrd, Ord)]
/// # Sector Tag Kind.
///
/// What a sector-level write is carrying, beyond plain 2352-byte user
/// data (§6).
pub enum SectorTagKind {
	/// # Raw P-W Subchannel (96 bytes).
	SubchannelRawPW,

	/// # Packed-Q Subchannel (16 bytes).
	SubchannelPackedQ,

	/// # C2 Error Pointers.
	C2Pointers,
}



/// # Image Sink.
///
/// A capability-set abstraction over the output image format (§9's
/// "resolve at mount once" redesign). No concrete sink ships in this
/// crate — image-format plugins are explicitly out of scope (§1); this
/// trait is what a plugin crate implements and what [`crate::engine`]
/// consumes.
pub trait ImageSink {
	/// # Create.
	///
	/// ## Errors
	///
	/// Returns [`DumpError::SinkCreateFailed`] if the image could not be
	/// created at `path`.
	fn create(
		&mut self,
		path: &std::path::Path,
		media_type: MediaType,
		total_blocks: u64,
		bytes_per_sector: u32,
	) -> Result<(), DumpError>;

	/// # Set Tracks.
	///
	/// ## Errors
	///
	/// Returns [`DumpError::SinkSetTracksFailed`] if the image rejects
	/// the track list (e.g. an unsupported layout).
	fn set_tracks(&mut self, tracks: &[Track]) -> Result<(), DumpError>;

	/// # Write Sectors (Long Form, User Data Only).
	///
	/// ## Errors
	///
	/// Returns [`DumpError::Write`] on an underlying I/O failure.
	fn write_sectors_long(&mut self, bytes: &[u8], start_lba: i32, count: u32) -> Result<(), DumpError>;

	/// # Write A Run Of Sector Tags.
	///
	/// ## Errors
	///
	/// Returns [`DumpError::Write`] on an underlying I/O failure.
	fn write_sectors_tag(
		&mut self,
		bytes: &[u8],
		start_lba: i32,
		count: u32,
		tag: SectorTagKind,
	) -> Result<(), DumpError>;

	/// # Write A Single Sector Tag.
	///
	/// ## Errors
	///
	/// Returns [`DumpError::Write`] on an underlying I/O failure.
	fn write_sector_tag(&mut self, bytes: &[u8], lba: i32, tag: SectorTagKind) -> Result<(), DumpError>;

	/// # Write A Media Tag.
	///
	/// ## Errors
	///
	/// Returns [`DumpError::UnsupportedTag`] if the sink can't hold this
	/// kind, or [`DumpError::Write`] on an underlying I/O failure.
	fn write_media_tag(&mut self, bytes: &[u8], kind: MediaTagKind) -> Result<(), DumpError>;

	/// # Set Dump Hardware Entries.
	fn set_dump_hardware(&mut self, entries: &[DumpHardware]);

	/// # Set CICM (Sidecar) Metadata.
	///
	/// A no-op for sinks that don't support embedded sidecar metadata.
	fn set_cicm_metadata(&mut self, metadata: &[u8]);

	/// # Close.
	///
	/// ## Errors
	///
	/// Returns [`DumpError::Write`] if final flush/close fails.
	fn close(&mut self) -> Result<(), DumpError>;

	/// # Supported Sector Tags.
	fn supported_sector_tags(&self) -> &[SectorTagKind];

	/// # Supported Media Tags.
	fn supported_media_tags(&self) -> &[MediaTagKind];

	#[must_use]
	/// # Supports A Given Sector Tag?
	fn supports_sector_tag(&self, tag: SectorTagKind) -> bool {
		self.supported_sector_tags().contains(&tag)
	}

	#[must_use]
	/// # Supports A Given Media Tag?
	fn supports_media_tag(&self, kind: MediaTagKind) -> bool {
		self.supported_media_tags().contains(&kind)
	}
}



#[cfg(test)]
mod test {
	use super::*;

	/// # Minimal Fake Sink (Tracks Only What Tests Need).
	struct FakeSink {
		sector_tags: Vec<SectorTagKind>,
		media_tags: Vec<MediaTagKind>,
		written: Vec<(i32, u32)>,
	}

	impl ImageSink for FakeSink {
		fn create(&mut self, _: &std::path::Path, _: MediaType, _: u64, _: u32) -> Result<(), DumpError> { Ok(()) }
		fn set_tracks(&mut self, _: &[Track]) -> Result<(), DumpError> { Ok(()) }
		fn write_sectors_long(&mut self, _: &[u8], start_lba: i32, count: u32) -> Result<(), DumpError> {
			self.written.push((start_lba, count));
			Ok(())
		}
		fn write_sectors_tag(&mut self, _: &[u8], _: i32, _: u32, _: SectorTagKind) -> Result<(), DumpError> { Ok(()) }
		fn write_sector_tag(&mut self, _: &[u8], _: i32, _: SectorTagKind) -> Result<(), DumpError> { Ok(()) }
		fn write_media_tag(&mut self, _: &[u8], kind: MediaTagKind) -> Result<(), DumpError> {
			if self.supports_media_tag(kind) { Ok(()) } else { Err(DumpError::UnsupportedTag) }
		}
		fn set_dump_hardware(&mut self, _: &[DumpHardware]) {}
		fn set_cicm_metadata(&mut self, _: &[u8]) {}
		fn close(&mut self) -> Result<(), DumpError> { Ok(()) }
		fn supported_sector_tags(&self) -> &[SectorTagKind] { &self.sector_tags }
		fn supported_media_tags(&self) -> &[MediaTagKind] { &self.media_tags }
	}

	#[test]
	fn t_supports_sector_tag() {
		let sink = FakeSink {
			sector_tags: vec![SectorTagKind::SubchannelPackedQ],
			media_tags: vec![],
			written: Vec::new(),
		};
		assert!(sink.supports_sector_tag(SectorTagKind::SubchannelPackedQ));
		assert!(!sink.supports_sector_tag(SectorTagKind::SubchannelRawPW));
	}

	#[test]
	fn t_write_media_tag_unsupported() {
		let mut sink = FakeSink { sector_tags: vec![], media_tags: vec![], written: Vec::new() };
		assert_eq!(sink.write_media_tag(&[], MediaTagKind::Mcn), Err(DumpError::UnsupportedTag));
	}

	#[test]
	fn t_write_sectors_long_recorded() {
		let mut sink = FakeSink { sector_tags: vec![], media_tags: vec![], written: Vec::new() };
		sink.write_sectors_long(&[0; 2352], 100, 1).unwrap();
		assert_eq!(sink.written, vec![(100, 1)]);
	}
}
