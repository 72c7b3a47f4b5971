/*!
# CD Dump: TOC & Track Planner
*/

use crate::error::DumpError;
use std::collections::BTreeMap;



/// # Lead-In Length (Sectors).
pub const LEAD_IN: i32 = 150;

/// # Frames Per Second.
const FRAMES_PER_SECOND: i32 = 75;

/// # Frames Per Minute.
const FRAMES_PER_MINUTE: i32 = FRAMES_PER_SECOND * 60;

/// # Frames Per Hour.
const FRAMES_PER_HOUR: i32 = FRAMES_PER_MINUTE * 60;



#[derive(Debug, Clone, Copy, Eq, PartialEq)]
/// # MSF.
///
/// Hour/Minute/Second/Frame CD addressing. `LBA = PHOUR*270000 +
/// PMIN*4500 + PSEC*75 + PFRAME − 150` (§4.2). `hour` is zero for almost
/// every real disc, but the TOC descriptor carries the field, so the
/// planner honors it rather than assuming it away.
pub struct Msf {
	/// # Hour.
	pub hour: u8,

	/// # Minute.
	pub min: u8,

	/// # Second.
	pub sec: u8,

	/// # Frame.
	pub frame: u8,
}

impl Msf {
	#[must_use]
	/// # New.
	pub const fn new(hour: u8, min: u8, sec: u8, frame: u8) -> Self { Self { hour, min, sec, frame } }

	#[must_use]
	/// # To LBA.
	pub const fn to_lba(self) -> i32 {
		(self.hour as i32) * FRAMES_PER_HOUR
			+ (self.min as i32) * FRAMES_PER_MINUTE
			+ (self.sec as i32) * FRAMES_PER_SECOND
			+ (self.frame as i32)
			- LEAD_IN
	}

	#[must_use]
	/// # From LBA.
	pub const fn from_lba(lba: i32) -> Self {
		let total = lba + LEAD_IN;
		let hour = total / FRAMES_PER_HOUR;
		let rem = total % FRAMES_PER_HOUR;
		let min = rem / FRAMES_PER_MINUTE;
		let rem = rem % FRAMES_PER_MINUTE;
		let sec = rem / FRAMES_PER_SECOND;
		let frame = rem % FRAMES_PER_SECOND;
		Self { hour: hour as u8, min: min as u8, sec: sec as u8, frame: frame as u8 }
	}

	#[must_use]
	/// # Minus One Frame.
	///
	/// Decrements by a single frame, borrowing across sec/min/hour as
	/// needed (§4.2's lead-out-minus-one-frame rule).
	pub const fn minus_one_frame(self) -> Self {
		if self.frame > 0 { return Self { frame: self.frame - 1, ..self }; }
		if self.sec > 0 { return Self { sec: self.sec - 1, frame: FRAMES_PER_SECOND as u8 - 1, ..self }; }
		if self.min > 0 {
			return Self { min: self.min - 1, sec: 59, frame: FRAMES_PER_SECOND as u8 - 1, ..self };
		}
		if self.hour > 0 {
			return Self { hour: self.hour - 1, min: 59, sec: 59, frame: FRAMES_PER_SECOND as u8 - 1 };
		}
		// Already at 00:00:00:00; nothing before it to borrow from.
		self
	}
}



#[derive(Debug, Clone, Copy, Eq, PartialEq)]
/// # Track Flags.
///
/// Captured verbatim from the TOC descriptor's CONTROL byte (§3).
pub struct TrackFlags(u8);

impl TrackFlags {
	#[must_use]
	/// # From Control Byte.
	pub const fn from_control(control: u8) -> Self { Self(control & 0b1111) }

	#[must_use]
	/// # Is Audio?
	pub const fn is_audio(self) -> bool { self.0 & 0b0100 == 0 }

	#[must_use]
	/// # Is Data?
	pub const fn is_data(self) -> bool { !self.is_audio() }

	#[must_use]
	/// # Is Four-Channel Audio (ADR == 4, the CD-V marker per §4.2)?
	pub const fn four_channel(self) -> bool { self.0 == 4 }

	#[must_use]
	/// # Raw Byte.
	pub const fn as_u8(self) -> u8 { self.0 }
}



#[derive(Debug, Clone, Copy, Eq, PartialEq)]
/// # Track Kind.
pub enum TrackKind {
	/// # Audio.
	Audio,

	/// # Generic Data (kind not yet refined).
	Data,

	/// # Mode 1 Data (byte 15 == 1).
	CdMode1,

	/// # Mode 2 Formless Data (byte 15 == 2).
	CdMode2Formless,

	/// # Unrefined / Unknown.
	Unknown,
}



#[derive(Debug, Clone, Copy, Eq, PartialEq)]
/// # Disc Format.
///
/// Decoded from TOC point `0xA0`'s PSEC byte (§4.2).
pub enum DiscFormat {
	/// # CD-I.
	CdI,

	/// # CD-ROM / XA.
	CdRomXa,

	/// # Unspecified / Plain CD-DA-or-CD-ROM.
	Unspecified,
}

impl DiscFormat {
	#[must_use]
	/// # From PSEC Byte.
	pub const fn from_psec(psec: u8) -> Self {
		match psec {
			0x10 => Self::CdI,
			0x20 => Self::CdRomXa,
			_ => Self::Unspecified,
		}
	}
}



#[derive(Debug, Clone, Copy, Eq, PartialEq)]
/// # Media Type.
pub enum MediaType {
	/// # Generic / Unclassified CD.
	Cd,

	/// # Audio CD.
	Cdda,

	/// # Data CD-ROM.
	Cdrom,

	/// # Enhanced CD (audio + data, 2 sessions).
	Cdplus,

	/// # Video CD.
	Cdv,
}



#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, PartialOrd, Ord)]
/// # Media Tag Kind.
pub enum MediaTagKind {
	/// # Full Raw TOC.
	FullToc,

	/// # ATIP.
	Atip,

	/// # PMA.
	Pma,

	/// # Lead-In.
	LeadIn,

	/// # CD-Text.
	CdText,

	/// # Media Catalog Number.
	Mcn,

	/// # Per-Track ISRC.
	TrackIsrc,
}



#[derive(Debug, Clone, Default)]
/// # Media Tags.
///
/// Key/value map from tag kind to raw byte payload (§3).
pub struct MediaTags(BTreeMap<MediaTagKind, Vec<u8>>);

impl MediaTags {
	#[must_use]
	/// # New (Empty).
	pub fn new() -> Self { Self(BTreeMap::new()) }

	/// # Insert.
	pub fn insert(&mut self, kind: MediaTagKind, payload: Vec<u8>) { self.0.insert(kind, payload); }

	#[must_use]
	/// # Get.
	pub fn get(&self, kind: MediaTagKind) -> Option<&[u8]> { self.0.get(&kind).map(Vec::as_slice) }

	#[must_use]
	/// # Iterate.
	pub fn iter(&self) -> impl Iterator<Item = (MediaTagKind, &[u8])> {
		self.0.iter().map(|(&k, v)| (k, v.as_slice()))
	}

	#[must_use]
	/// # Is Empty?
	pub fn is_empty(&self) -> bool { self.0.is_empty() }
}



#[derive(Debug, Clone)]
/// # Track.
pub struct Track {
	/// # Sequence Number (1..99).
	pub number: u8,

	/// # Session Number (>= 1).
	pub session: u8,

	/// # Kind.
	pub kind: TrackKind,

	/// # Start LBA.
	pub start: i32,

	/// # End LBA (inclusive).
	pub end: i32,

	/// # Control/ADR Flags.
	pub flags: TrackFlags,

	/// # ISRC, If Decoded.
	pub isrc: Option<String>,
}

impl Track {
	#[must_use]
	/// # Sector Count.
	pub const fn sectors(&self) -> u32 { (self.end - self.start + 1) as u32 }
}



/// # Raw TOC Descriptor.
///
/// What a drive's `ReadRawToc`/`ReadToc` response decodes into before the
/// planner turns it into [`Track`]s. Point numbers `0x01..=0x63` are real
/// tracks; `0xA0`/`0xA2` are the special first-track/lead-out points the
/// planner treats specially (§4.2).
#[derive(Debug, Clone, Copy)]
pub struct TocDescriptor {
	/// # Session Number.
	pub session: u8,

	/// # Point.
	pub point: u8,

	/// # Control Byte.
	pub control: u8,

	/// # PMSF (what `point` describes — a track start, or lead-out).
	pub pmsf: Msf,

	/// # PSEC For Point 0xA0 (disc-format byte); unused for real tracks.
	pub psec_a0: u8,
}



#[derive(Debug, Clone)]
/// # Plan Result.
pub struct TocPlan {
	/// # Tracks, In Ascending Start-LBA Order.
	pub tracks: Vec<Track>,

	/// # Lead-Out LBA.
	pub lead_out: i32,

	/// # Disc Format, Per Point 0xA0 (if present in the descriptor set).
	pub disc_format: DiscFormat,

	/// # First Track's Flags, Per Point 0xA0's CONTROL Byte (if present).
	pub first_track_flags: Option<TrackFlags>,
}



#[derive(Debug, Default)]
/// # TOC Planner.
///
/// Converts a disc's raw or processed TOC descriptors into an immutable
/// track list plus lead-out boundary and media-type classification (§4.2).
pub struct TocPlanner;

impl TocPlanner {
	/// # Plan.
	///
	/// `force` allows synthesizing a single track spanning the whole disc
	/// when no TOC is available at all.
	///
	/// ## Errors
	///
	/// Returns [`DumpError::NoToc`] if no descriptors were provided and
	/// `force` is false.
	pub fn plan(mut descriptors: Vec<TocDescriptor>, force: bool) -> Result<TocPlan, DumpError> {
		if descriptors.is_empty() {
			return Self::synthesize(force);
		}

		descriptors.sort_unstable_by_key(|d| d.point);

		let mut tracks: Vec<Track> = Vec::new();
		let mut lead_out_lba = None;
		let mut disc_format = DiscFormat::Unspecified;
		let mut first_track_flags = None;

		for d in &descriptors {
			match d.point {
				0x01..=0x63 => {
					tracks.push(Track {
						number: d.point,
						session: d.session,
						kind: if TrackFlags::from_control(d.control).is_audio() { TrackKind::Audio } else { TrackKind::Data },
						start: d.pmsf.to_lba(),
						end: 0, // filled in below, once all starts are known
						flags: TrackFlags::from_control(d.control),
						isrc: None,
					});
				},
				0xA0 => {
					disc_format = DiscFormat::from_psec(d.psec_a0);
					first_track_flags = Some(TrackFlags::from_control(d.control));
				},
				0xA2 => {
					// Lead-out MSF, decremented by one frame to obtain the
					// last readable LBA, then re-incremented to the
					// exclusive boundary the planner works in.
					lead_out_lba = Some(d.pmsf.minus_one_frame().to_lba() + 1);
				},
				_ => {}, // Malformed/unrecognized descriptors are skipped (§4.2).
			}
		}

		if tracks.is_empty() { return Self::synthesize(force); }

		let lead_out = lead_out_lba.unwrap_or_else(|| {
			tracks.iter().map(|t| t.start).max().unwrap_or(0) + 1
		});

		// Fill in `end` for each track: next track's start minus one, or
		// lead-out minus one for the last track.
		let len = tracks.len();
		for i in 0..len {
			tracks[i].end = if i + 1 < len { tracks[i + 1].start - 1 } else { lead_out - 1 };
		}

		Ok(TocPlan { tracks, lead_out, disc_format, first_track_flags })
	}

	/// # Synthesize A Single Track.
	///
	/// Fallback used when no TOC could be read at all and "force" is set.
	fn synthesize(force: bool) -> Result<TocPlan, DumpError> {
		if !force { return Err(DumpError::NoToc); }
		Ok(TocPlan {
			tracks: vec![Track {
				number: 1,
				session: 1,
				kind: TrackKind::Unknown,
				start: 0,
				end: 359_999,
				flags: TrackFlags::from_control(0),
				isrc: None,
			}],
			lead_out: 360_000,
			disc_format: DiscFormat::Unspecified,
			first_track_flags: None,
		})
	}

	#[must_use]
	/// # Classify Media Type.
	///
	/// Applied only to a generic CD (§4.2); does not itself probe byte 15
	/// — that refinement is a separate step driven by the caller issuing
	/// reads through a [`crate::drive::DriveHandle`].
	pub fn classify(tracks: &[Track], sessions: u8) -> MediaType {
		let any_audio = tracks.iter().any(|t| t.flags.is_audio());
		let any_data = tracks.iter().any(|t| t.flags.is_data());
		let any_four_channel = tracks.iter().any(|t| t.flags.four_channel());

		if any_four_channel { return MediaType::Cdv; }

		if any_audio && !any_data && sessions == 1 { return MediaType::Cdda; }
		if any_data && !any_audio && sessions == 1 { return MediaType::Cdrom; }
		if any_data && any_audio && sessions == 2 {
			let session1_all_audio = tracks.iter()
				.filter(|t| t.session == 1)
				.all(|t| t.flags.is_audio());
			if session1_all_audio { return MediaType::Cdplus; }
		}

		MediaType::Cd
	}

	#[must_use]
	/// # Refine Track Kind From Sector Byte 15.
	///
	/// For non-audio tracks, a single read at the track's start lets the
	/// planner distinguish Mode 1 from Mode 2 Formless (§4.2).
	pub fn refine_kind(byte15: u8) -> TrackKind {
		match byte15 {
			1 => TrackKind::CdMode1,
			2 => TrackKind::CdMode2Formless,
			_ => TrackKind::Unknown,
		}
	}
}



#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn t_msf_lba_roundtrip() {
		let msf = Msf::new(0, 2, 0, 0);
		assert_eq!(msf.to_lba(), 2 * 4500 - 150);
		assert_eq!(Msf::from_lba(msf.to_lba()), msf);
	}

	#[test]
	fn t_msf_minus_one_frame_borrow() {
		let msf = Msf::new(0, 1, 0, 0);
		let prev = msf.minus_one_frame();
		assert_eq!(prev, Msf::new(0, 0, 59, 74));
	}

	#[test]
	fn t_msf_minus_one_frame_simple() {
		let msf = Msf::new(0, 0, 0, 5);
		assert_eq!(msf.minus_one_frame(), Msf::new(0, 0, 0, 4));
	}

	#[test]
	fn t_track_flags() {
		let audio = TrackFlags::from_control(0b0000);
		let data = TrackFlags::from_control(0b0100);
		assert!(audio.is_audio());
		assert!(data.is_data());
		assert!(!audio.is_data());
	}

	fn descriptor(session: u8, point: u8, control: u8, msf: Msf) -> TocDescriptor {
		TocDescriptor { session, point, control, pmsf: msf, psec_a0: 0 }
	}

	#[test]
	fn t_plan_single_track_s1() {
		// S1: single data track spanning LBAs 0..331,999.
		let descriptors = vec![
			descriptor(1, 0x01, 0b0100, Msf::from_lba(0)),
			descriptor(1, 0xA2, 0b0100, Msf::from_lba(332_000)),
		];
		let plan = TocPlanner::plan(descriptors, false).expect("plan should succeed");
		assert_eq!(plan.tracks.len(), 1);
		assert_eq!(plan.tracks[0].start, 0);
		assert_eq!(plan.tracks[0].end, 331_999);
		assert_eq!(plan.lead_out, 332_000);
		assert_eq!(TocPlanner::classify(&plan.tracks, 1), MediaType::Cdrom);
	}

	#[test]
	fn t_plan_no_toc_without_force() {
		assert_eq!(TocPlanner::plan(Vec::new(), false).unwrap_err(), DumpError::NoToc);
	}

	#[test]
	fn t_plan_no_toc_with_force() {
		let plan = TocPlanner::plan(Vec::new(), true).expect("forced synth should succeed");
		assert_eq!(plan.tracks.len(), 1);
		assert_eq!(plan.lead_out, 360_000);
	}

	#[test]
	fn t_plan_cdplus_s2() {
		// S2: two audio tracks in session 1, one data track in session 2.
		let descriptors = vec![
			descriptor(1, 0x01, 0b0000, Msf::from_lba(0)),
			descriptor(1, 0x02, 0b0000, Msf::from_lba(24_575)),
			descriptor(2, 0x03, 0b0100, Msf::from_lba(74_850)),
			descriptor(2, 0xA2, 0b0100, Msf::from_lba(225_000)),
		];
		let plan = TocPlanner::plan(descriptors, false).expect("plan should succeed");
		assert_eq!(plan.tracks.len(), 3);
		assert_eq!(plan.tracks[2].end, plan.lead_out - 1);
		assert_eq!(TocPlanner::classify(&plan.tracks, 2), MediaType::Cdplus);
		assert!(plan.tracks[0].flags.is_audio());
	}

	#[test]
	fn t_disc_format_from_psec() {
		assert_eq!(DiscFormat::from_psec(0x10), DiscFormat::CdI);
		assert_eq!(DiscFormat::from_psec(0x20), DiscFormat::CdRomXa);
		assert_eq!(DiscFormat::from_psec(0x00), DiscFormat::Unspecified);
	}
}
