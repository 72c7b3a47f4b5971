/*!
# CD Dump: Raw Image Sink

The one concrete [`ImageSink`] this binary ships with: a flat `.bin` of
user-data sectors, a sibling `.sub` of whatever subchannel framing was
negotiated, and one small sidecar file per media tag. Real disc-image
formats (Aaru/DiscImageChef-style CICM containers, CDRDAO `.toc`, …) are
independent plugins per spec; this is the minimal "null plugin" needed to
actually land bytes on disk end to end.
*/

use cddump_core::{
	DumpError,
	DumpHardware,
	ImageSink,
	MediaTagKind,
	MediaType,
	SectorTagKind,
	Track,
};
use std::{
	fs::File,
	io::{
		Seek,
		SeekFrom,
		Write,
	},
	path::{
		Path,
		PathBuf,
	},
};



/// # Plain CD User-Data Sector Size.
const SECTOR_SIZE: u64 = 2352;

/// # Sector Tags This Sink Can Hold.
///
/// Both subchannel framings are stored as a flat sibling file; C2 error
/// pointers have nowhere to live in this minimal format.
const SECTOR_TAGS: [SectorTagKind; 2] = [
	SectorTagKind::SubchannelRawPW,
	SectorTagKind::SubchannelPackedQ,
];

/// # Media Tags This Sink Can Hold.
const MEDIA_TAGS: [MediaTagKind; 7] = [
	MediaTagKind::FullToc,
	MediaTagKind::Atip,
	MediaTagKind::Pma,
	MediaTagKind::LeadIn,
	MediaTagKind::CdText,
	MediaTagKind::Mcn,
	MediaTagKind::TrackIsrc,
];



/// # File Extension For A Media Tag.
const fn tag_extension(kind: MediaTagKind) -> &'static str {
	match kind {
		MediaTagKind::FullToc => "toc",
		MediaTagKind::Atip => "atip",
		MediaTagKind::Pma => "pma",
		MediaTagKind::LeadIn => "leadin",
		MediaTagKind::CdText => "cdtext",
		MediaTagKind::Mcn => "mcn",
		MediaTagKind::TrackIsrc => "isrc",
	}
}



/// # Raw Sector-Dump Image Sink.
///
/// Owns the output prefix (sans extension) so each piece — `.bin`,
/// `.sub`, `.<tag>`, `.hardware`, `.cicm` — lands beside the others.
pub(super) struct RawSink {
	/// # Output Prefix.
	prefix: PathBuf,

	/// # User-Data File.
	data: Option<File>,

	/// # Subchannel File (absent if the negotiated framing carries none).
	sub: Option<File>,

	/// # Subchannel Bytes Per Sector.
	sub_size: u64,
}

impl RawSink {
	#[must_use]
	/// # New.
	pub(super) fn new(prefix: PathBuf) -> Self {
		Self { prefix, data: None, sub: None, sub_size: 0 }
	}

	/// # Sidecar Path For A Given Extension.
	fn sidecar(&self, ext: &str) -> PathBuf {
		let mut p = self.prefix.clone();
		p.set_extension(ext);
		p
	}

	/// # Open Or Reuse The Data File.
	fn data_mut(&mut self) -> Result<&mut File, DumpError> {
		self.data.as_mut().ok_or(DumpError::Bug("RawSink used before create()"))
	}
}

impl ImageSink for RawSink {
	fn create(&mut self, path: &Path, _media_type: MediaType, total_blocks: u64, bytes_per_sector: u32) -> Result<(), DumpError> {
		let data = File::create(path).map_err(|_| DumpError::SinkCreateFailed)?;
		data.set_len(total_blocks * SECTOR_SIZE).map_err(|_| DumpError::SinkCreateFailed)?;
		self.data = Some(data);

		let sub_size = u64::from(bytes_per_sector) - SECTOR_SIZE.min(u64::from(bytes_per_sector));
		self.sub_size = sub_size;
		if sub_size > 0 {
			let sub_path = self.sidecar("sub");
			let sub = File::create(sub_path).map_err(|_| DumpError::SinkCreateFailed)?;
			sub.set_len(total_blocks * sub_size).map_err(|_| DumpError::SinkCreateFailed)?;
			self.sub = Some(sub);
		}

		Ok(())
	}

	fn set_tracks(&mut self, tracks: &[Track]) -> Result<(), DumpError> {
		let mut out = String::new();
		for t in tracks {
			out.push_str(&format!(
				"{} {:?} session={} start={} end={}\n",
				t.number, t.kind, t.session, t.start, t.end,
			));
		}
		std::fs::write(self.sidecar("tracks"), out).map_err(|e| DumpError::Write(e.to_string()))
	}

	fn write_sectors_long(&mut self, bytes: &[u8], start_lba: i32, count: u32) -> Result<(), DumpError> {
		let offset = u64::try_from(start_lba).map_err(|_| DumpError::Bug("negative LBA in write_sectors_long"))? * SECTOR_SIZE;
		let expect = u64::from(count) * SECTOR_SIZE;
		if bytes.len() as u64 != expect { return Err(DumpError::Bug("write_sectors_long length mismatch")); }

		let f = self.data_mut()?;
		f.seek(SeekFrom::Start(offset)).map_err(|e| DumpError::Write(e.to_string()))?;
		f.write_all(bytes).map_err(|e| DumpError::Write(e.to_string()))
	}

	fn write_sectors_tag(&mut self, bytes: &[u8], start_lba: i32, count: u32, _tag: SectorTagKind) -> Result<(), DumpError> {
		let Some(sub) = self.sub.as_mut() else { return Ok(()); };
		let offset = u64::try_from(start_lba).map_err(|_| DumpError::Bug("negative LBA in write_sectors_tag"))? * self.sub_size;
		let expect = u64::from(count) * self.sub_size;
		if bytes.len() as u64 != expect { return Err(DumpError::Bug("write_sectors_tag length mismatch")); }

		sub.seek(SeekFrom::Start(offset)).map_err(|e| DumpError::Write(e.to_string()))?;
		sub.write_all(bytes).map_err(|e| DumpError::Write(e.to_string()))
	}

	fn write_sector_tag(&mut self, bytes: &[u8], lba: i32, tag: SectorTagKind) -> Result<(), DumpError> {
		self.write_sectors_tag(bytes, lba, 1, tag)
	}

	fn write_media_tag(&mut self, bytes: &[u8], kind: MediaTagKind) -> Result<(), DumpError> {
		if !self.supports_media_tag(kind) { return Err(DumpError::UnsupportedTag); }
		std::fs::write(self.sidecar(tag_extension(kind)), bytes).map_err(|e| DumpError::Write(e.to_string()))
	}

	fn set_dump_hardware(&mut self, entries: &[DumpHardware]) {
		let mut out = String::new();
		for hw in entries {
			let ranges = hw.extents.ranges()
				.map(|r| format!("{}..{}", r.start, r.end))
				.collect::<Vec<_>>()
				.join(",");
			out.push_str(&format!(
				"{} / {} fw={:?} serial={:?} platform={} software={} {} extents=[{}] blocks_read={} last_seen={}\n",
				hw.manufacturer, hw.model, hw.firmware, hw.serial,
				hw.platform, hw.software, hw.software_version, ranges, hw.extents.total(),
				hw.last_seen,
			));
		}
		let _res = std::fs::write(self.sidecar("hardware"), out);
	}

	fn set_cicm_metadata(&mut self, metadata: &[u8]) {
		let _res = std::fs::write(self.sidecar("cicm"), metadata);
	}

	fn close(&mut self) -> Result<(), DumpError> {
		if let Some(f) = self.data.as_mut() { f.flush().map_err(|e| DumpError::Write(e.to_string()))?; }
		if let Some(f) = self.sub.as_mut() { f.flush().map_err(|e| DumpError::Write(e.to_string()))?; }
		Ok(())
	}

	fn supported_sector_tags(&self) -> &[SectorTagKind] { &SECTOR_TAGS }

	fn supported_media_tags(&self) -> &[MediaTagKind] { &MEDIA_TAGS }
}
