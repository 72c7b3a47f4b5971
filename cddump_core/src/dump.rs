/*!
# CD Dump: Dump Loop

The primary forward pass: sequentially reads every track from
[`ResumeRecord::next_block`] through the last readable LBA, feeding the
extents tracker, the output sink, the optional rate logs, and an optional
hash sink, while tracking throughput (§4.4).
*/

use crate::{
	abort::KillSwitch,
	config::DumpOptions,
	drive::{
		DriveHandle,
		Sense,
	},
	error::DumpError,
	events::{
		EventSink,
		LogEvent,
		ProgressEvent,
	},
	framing::{
		Framing,
		SECTOR_SIZE,
	},
	hash::HashSink,
	ratelog::{
		BlockOutcome,
		IbgLog,
		MhddLog,
	},
	resume::ResumeRecord,
	sink::ImageSink,
	toc::Track,
};
use std::{
	io::Write,
	time::{
		Duration,
		Instant,
	},
};



#[derive(Debug, Clone, Copy, Eq, PartialEq)]
/// # Dump Loop Outcome.
pub enum LoopOutcome {
	/// # Every Track Was Fully Dumped.
	Completed,

	/// # Cancelled Before Completion.
	Cancelled,
}



#[derive(Debug, Clone, Copy, Default)]
/// # Dump Statistics.
///
/// Min/max sustained speed are tracked as `Option<f64>` rather than a
/// `0.0` sentinel (§9: floating point equality against a sentinel is a
/// code smell; "has been measured at least once" should be explicit).
pub struct DumpStats {
	/// # Minimum Sustained Speed (MB/s).
	min_mbps: Option<f64>,

	/// # Maximum Sustained Speed (MB/s).
	max_mbps: Option<f64>,

	/// # Cumulative Command Time.
	command_time: Duration,

	/// # Cumulative Write Time.
	write_time: Duration,
}

impl DumpStats {
	fn observe_speed(&mut self, mbps: f64) {
		if !mbps.is_finite() || mbps <= 0.0 { return; }
		self.min_mbps = Some(self.min_mbps.map_or(mbps, |m| m.min(mbps)));
		self.max_mbps = Some(self.max_mbps.map_or(mbps, |m| m.max(mbps)));
	}

	#[must_use]
	/// # Minimum Sustained Speed (MB/s).
	pub const fn min_mbps(&self) -> Option<f64> { self.min_mbps }

	#[must_use]
	/// # Maximum Sustained Speed (MB/s).
	pub const fn max_mbps(&self) -> Option<f64> { self.max_mbps }

	#[must_use]
	/// # Cumulative Command Time.
	pub const fn command_time(&self) -> Duration { self.command_time }

	#[must_use]
	/// # Cumulative Write Time.
	pub const fn write_time(&self) -> Duration { self.write_time }
}



/// # Dump Loop.
pub struct DumpLoop<'a> {
	/// # Drive.
	drive: &'a dyn DriveHandle,

	/// # Output Sink.
	sink: &'a mut dyn ImageSink,

	/// # Negotiated Framing.
	framing: Framing,

	/// # Largest Block Count Per Command.
	max_blocks: u32,

	/// # Options.
	options: &'a DumpOptions,

	/// # MHDD-Style Rate Log.
	mhdd: Option<MhddLog<Box<dyn Write>>>,

	/// # IBG-Style Rate Log.
	ibg: Option<IbgLog<Box<dyn Write>>>,

	/// # Hash Sink.
	hash: Option<&'a mut dyn HashSink>,
}

impl<'a> DumpLoop<'a> {
	#[must_use]
	/// # New.
	pub fn new(
		drive: &'a dyn DriveHandle,
		sink: &'a mut dyn ImageSink,
		framing: Framing,
		max_blocks: u32,
		options: &'a DumpOptions,
	) -> Self {
		Self { drive, sink, framing, max_blocks: max_blocks.max(1), options, mhdd: None, ibg: None, hash: None }
	}

	#[must_use]
	/// # With An MHDD-Style Rate Log.
	///
	/// Silently does without the log if the header can't be written;
	/// rate logs are ambient (§6), never essential to the dump itself.
	pub fn with_mhdd_log(mut self, out: Box<dyn Write>) -> Self {
		self.mhdd = MhddLog::new(out).ok();
		self
	}

	#[must_use]
	/// # With An IBG-Style Rate Log.
	pub fn with_ibg_log(mut self, out: Box<dyn Write>) -> Self {
		self.ibg = IbgLog::new(out).ok();
		self
	}

	#[must_use]
	/// # With A Hash Sink.
	pub fn with_hash_sink(mut self, hash: &'a mut dyn HashSink) -> Self {
		self.hash = Some(hash);
		self
	}

	/// # Run.
	///
	/// Dumps every track in order, resuming at [`ResumeRecord::next_block`]
	/// (tracks entirely before it are skipped outright). Returns
	/// [`LoopOutcome::Cancelled`] if the kill switch fires mid-track;
	/// the resume record is left exactly where the loop stopped, which is
	/// already a valid resumable snapshot (§4.4, §5).
	///
	/// ## Errors
	///
	/// Returns [`DumpError::StoppedOnError`] if `stopOnError` is set and a
	/// sector fails, and propagates any hard sink-write failure.
	pub fn run(
		&mut self,
		tracks: &[Track],
		resume: &mut ResumeRecord,
		events: &mut EventSink,
		kill: &KillSwitch,
		stats: &mut DumpStats,
	) -> Result<LoopOutcome, DumpError> {
		for track in tracks {
			if track.end < resume.next_block { continue; }

			events.progress(ProgressEvent::TrackStarted { track: track.number });

			let mut lba = track.start.max(resume.next_block);
			while lba <= track.end {
				if kill.killed() { return Ok(LoopOutcome::Cancelled); }

				let remaining = u32::try_from(track.end - lba + 1).map_err(|_| DumpError::Overflow)?;
				let count = self.max_blocks.min(remaining);

				if self.read_one_command(lba, count, resume, events, stats)? {
					lba += i32::try_from(count).map_err(|_| DumpError::Overflow)?;
				}
				else {
					let skip = self.options.skip().max(count).min(remaining);
					self.write_placeholder(lba, skip, resume, events)?;
					lba += i32::try_from(skip).map_err(|_| DumpError::Overflow)?;

					if self.options.stop_on_error() { return Err(DumpError::StoppedOnError); }
				}
			}
		}

		events.progress(ProgressEvent::PrimaryDone);
		Ok(LoopOutcome::Completed)
	}

	/// # Issue And Handle One Read Command.
	///
	/// Returns `Ok(true)` on a clean read (already written and accounted
	/// for), `Ok(false)` if the command failed and the caller should fall
	/// back to a placeholder write.
	fn read_one_command(
		&mut self,
		lba: i32,
		count: u32,
		resume: &mut ResumeRecord,
		events: &mut EventSink,
		stats: &mut DumpStats,
	) -> Result<bool, DumpError> {
		let result = self.drive.read_cd(lba, count, self.framing.format(), self.options.dump_raw(), self.options.command_timeout());

		let Ok((data, sense, cmd_duration)) = result else { return Ok(false); };
		if sense != Sense::NONE { return Ok(false); }

		stats.command_time += cmd_duration;

		let (user, sub) = self.framing.split_owned(&data, count);

		let write_start = Instant::now();
		self.sink.write_sectors_long(&user, lba, count)?;
		if let Some(tag) = self.framing.format().sector_tag() {
			self.sink.write_sectors_tag(&sub, lba, count, tag)?;
		}
		stats.write_time += write_start.elapsed();

		if let Some(hash) = self.hash.as_mut() { hash.update(&user); }

		resume.good.insert_run(lba, count);
		resume.next_block = lba + i32::try_from(count).map_err(|_| DumpError::Overflow)?;

		self.record_mhdd(lba, BlockOutcome::Good, cmd_duration);
		if let Some(mbps) = self.instantaneous_speed(count, cmd_duration) {
			stats.observe_speed(mbps);
			self.record_ibg_speed(mbps);
			events.progress(ProgressEvent::Speed { mbps });
		}

		events.progress(ProgressEvent::Advanced {
			next_block: resume.next_block,
			bad_blocks: u32::try_from(resume.bad.len()).unwrap_or(u32::MAX),
		});

		Ok(true)
	}

	/// # Write A Zero-Filled Placeholder And Record The Failure.
	fn write_placeholder(
		&mut self,
		lba: i32,
		count: u32,
		resume: &mut ResumeRecord,
		events: &mut EventSink,
	) -> Result<(), DumpError> {
		let zeros_user = vec![0_u8; SECTOR_SIZE as usize * count as usize];
		self.sink.write_sectors_long(&zeros_user, lba, count)?;

		if let Some(tag) = self.framing.format().sector_tag() {
			let sub_size = self.framing.format().subchannel_size() as usize;
			let zeros_sub = vec![0_u8; sub_size * count as usize];
			self.sink.write_sectors_tag(&zeros_sub, lba, count, tag)?;
		}

		if let Some(hash) = self.hash.as_mut() { hash.update(&zeros_user); }

		resume.bad.insert_run(lba, count);
		resume.next_block = lba + i32::try_from(count).map_err(|_| DumpError::Overflow)?;

		for i in 0..count {
			let l = lba + i32::try_from(i).map_err(|_| DumpError::Overflow)?;
			events.log(LogEvent::SectorFailed { lba: l });
			self.record_mhdd(l, BlockOutcome::Unrecovered, Duration::ZERO);
		}

		events.progress(ProgressEvent::Advanced {
			next_block: resume.next_block,
			bad_blocks: u32::try_from(resume.bad.len()).unwrap_or(u32::MAX),
		});

		Ok(())
	}

	/// # Record A Per-Block Outcome To The MHDD-Style Log.
	fn record_mhdd(&mut self, lba: i32, outcome: BlockOutcome, elapsed: Duration) {
		let elapsed_ms = u32::try_from(elapsed.as_millis()).unwrap_or(u32::MAX);
		if let Some(mhdd) = self.mhdd.as_mut() { let _ = mhdd.record(lba, outcome, elapsed_ms); }
	}

	/// # Record A Speed Sample To The IBG-Style Log.
	fn record_ibg_speed(&mut self, mbps: f64) {
		if let Some(ibg) = self.ibg.as_mut() { let _ = ibg.record(mbps); }
	}

	/// # Instantaneous Speed (MB/s) For This Command.
	///
	/// `None` when the duration was too short to measure meaningfully,
	/// rather than dividing by (near) zero.
	fn instantaneous_speed(&self, count: u32, duration: Duration) -> Option<f64> {
		let secs = duration.as_secs_f64();
		if secs <= 0.0 { return None; }
		let bytes = f64::from(self.framing.block_size()) * f64::from(count);
		Some(bytes / 1_048_576.0 / secs)
	}

	/// # Dump The Lead-In Region.
	///
	/// Reads LBAs `[-150, -1]` individually; unlike the main loop, a
	/// failure here never touches [`ResumeRecord::next_block`] or the
	/// bad-block set (§8, scenario S6 — lead-in is padding, not tracked
	/// progress).
	///
	/// ## Errors
	///
	/// Returns [`DumpError::LeadInUnreadable`] only if not a single sector
	/// could be read.
	pub fn dump_lead_in(&mut self, events: &mut EventSink) -> Result<Vec<u8>, DumpError> {
		let block_size = self.framing.block_size() as usize;
		let mut tag = vec![0_u8; crate::toc::LEAD_IN as usize * block_size];
		let mut any_ok = false;

		for i in 0..crate::toc::LEAD_IN {
			let lba = -crate::toc::LEAD_IN + i;
			match self.drive.read_cd(lba, 1, self.framing.format(), self.options.dump_raw(), self.options.command_timeout()) {
				Ok((data, sense, _)) if sense == Sense::NONE => {
					let offset = i as usize * block_size;
					tag[offset..offset + block_size].copy_from_slice(&data);
					any_ok = true;
				},
				_ => events.log(LogEvent::SoftError { what: "lead-in sector unreadable" }),
			}
		}

		if any_ok { Ok(tag) } else { Err(DumpError::LeadInUnreadable) }
	}
}



#[cfg(test)]
mod test {
	use super::*;
	use crate::{
		drive::test_mock::MockDrive,
		events::channel,
		framing::SubchannelFormat,
		toc::{
			TrackFlags,
			TrackKind,
		},
	};

	#[derive(Default)]
	struct RecordingSink {
		writes: Vec<(i32, u32)>,
		total_bytes: usize,
	}

	impl ImageSink for RecordingSink {
		fn create(&mut self, _: &std::path::Path, _: crate::toc::MediaType, _: u64, _: u32) -> Result<(), DumpError> { Ok(()) }
		fn set_tracks(&mut self, _: &[Track]) -> Result<(), DumpError> { Ok(()) }
		fn write_sectors_long(&mut self, bytes: &[u8], start_lba: i32, count: u32) -> Result<(), DumpError> {
			self.writes.push((start_lba, count));
			self.total_bytes += bytes.len();
			Ok(())
		}
		fn write_sectors_tag(&mut self, _: &[u8], _: i32, _: u32, _: crate::sink::SectorTagKind) -> Result<(), DumpError> { Ok(()) }
		fn write_sector_tag(&mut self, _: &[u8], _: i32, _: crate::sink::SectorTagKind) -> Result<(), DumpError> { Ok(()) }
		fn write_media_tag(&mut self, _: &[u8], _: crate::toc::MediaTagKind) -> Result<(), DumpError> { Ok(()) }
		fn set_dump_hardware(&mut self, _: &[crate::resume::DumpHardware]) {}
		fn set_cicm_metadata(&mut self, _: &[u8]) {}
		fn close(&mut self) -> Result<(), DumpError> { Ok(()) }
		fn supported_sector_tags(&self) -> &[crate::sink::SectorTagKind] { &[] }
		fn supported_media_tags(&self) -> &[crate::toc::MediaTagKind] { &[] }
	}

	fn track(number: u8, start: i32, end: i32) -> Track {
		Track { number, session: 1, kind: TrackKind::CdMode1, start, end, flags: TrackFlags::from_control(0b0100), isrc: None }
	}

	#[test]
	fn t_dump_loop_clean_read() {
		// S1: single data track, 0..331999, no failures.
		let drive = MockDrive::new().with_max_blocks(128);
		let mut sink = RecordingSink::default();
		let framing = Framing::new(SubchannelFormat::None);
		let options = DumpOptions::default();
		let mut resume = ResumeRecord::new("disc".to_owned(), 332_000, 0);
		let tracks = vec![track(1, 0, 331_999)];

		let (mut evt_sink, _evt_source) = channel();
		let kill = KillSwitch::default();
		let mut stats = DumpStats::default();

		let mut loop_ = DumpLoop::new(&drive, &mut sink, framing, 128, &options);
		let outcome = loop_.run(&tracks, &mut resume, &mut evt_sink, &kill, &mut stats).expect("run should succeed");

		assert_eq!(outcome, LoopOutcome::Completed);
		assert!(resume.bad.is_empty());
		assert_eq!(resume.next_block, 332_000);
		assert!(resume.good.contains(0));
		assert!(resume.good.contains(331_999));
	}

	#[test]
	fn t_dump_loop_failure_writes_placeholder_and_advances() {
		let drive = MockDrive::new().with_max_blocks(64).unreadable();
		let mut sink = RecordingSink::default();
		let framing = Framing::new(SubchannelFormat::None);
		let options = DumpOptions::default().with_skip(64);
		let mut resume = ResumeRecord::new("disc".to_owned(), 1000, 0);
		let tracks = vec![track(1, 0, 999)];

		let (mut evt_sink, _evt_source) = channel();
		let kill = KillSwitch::default();
		let mut stats = DumpStats::default();

		let mut loop_ = DumpLoop::new(&drive, &mut sink, framing, 64, &options);
		let outcome = loop_.run(&tracks, &mut resume, &mut evt_sink, &kill, &mut stats).expect("run should succeed");

		assert_eq!(outcome, LoopOutcome::Completed);
		assert!(!resume.bad.is_empty());
		assert_eq!(resume.next_block, 1000);
		// Every LBA ends up in exactly one of good/bad (invariant 1).
		assert!(resume.good.is_empty());
	}

	#[test]
	fn t_dump_loop_stop_on_error() {
		let drive = MockDrive::new().unreadable();
		let mut sink = RecordingSink::default();
		let framing = Framing::new(SubchannelFormat::None);
		let options = DumpOptions::default().with_stop_on_error(true);
		let mut resume = ResumeRecord::new("disc".to_owned(), 1000, 0);
		let tracks = vec![track(1, 0, 999)];

		let (mut evt_sink, _evt_source) = channel();
		let kill = KillSwitch::default();
		let mut stats = DumpStats::default();

		let mut loop_ = DumpLoop::new(&drive, &mut sink, framing, 64, &options);
		let err = loop_.run(&tracks, &mut resume, &mut evt_sink, &kill, &mut stats).unwrap_err();
		assert_eq!(err, DumpError::StoppedOnError);
	}

	#[test]
	fn t_dump_loop_cancellation_preserves_resume_point() {
		let drive = MockDrive::new();
		let mut sink = RecordingSink::default();
		let framing = Framing::new(SubchannelFormat::None);
		let options = DumpOptions::default();
		let mut resume = ResumeRecord::new("disc".to_owned(), 1000, 0);
		let tracks = vec![track(1, 0, 999)];

		let (mut evt_sink, _evt_source) = channel();
		let kill = KillSwitch::default();
		kill.inner().store(true, std::sync::atomic::Ordering::Release);
		let mut stats = DumpStats::default();

		let mut loop_ = DumpLoop::new(&drive, &mut sink, framing, 64, &options);
		let outcome = loop_.run(&tracks, &mut resume, &mut evt_sink, &kill, &mut stats).expect("run should succeed");

		assert_eq!(outcome, LoopOutcome::Cancelled);
		assert_eq!(resume.next_block, 0);
	}

	#[test]
	fn t_dump_lead_in_partial_success() {
		// S6: 37 of 150 lead-in sectors succeed (the other 113 fail).
		let fail: Vec<i32> = (-150..=-38).collect();
		let drive = MockDrive::new().with_unrecovered(fail);
		let mut sink = RecordingSink::default();
		let framing = Framing::new(SubchannelFormat::None);
		let options = DumpOptions::default();

		let (mut evt_sink, _evt_source) = channel();
		let mut loop_ = DumpLoop::new(&drive, &mut sink, framing, 64, &options);
		let tag = loop_.dump_lead_in(&mut evt_sink).expect("partial lead-in should still succeed");

		assert_eq!(tag.len(), 150 * framing.block_size() as usize);
	}

	#[test]
	fn t_dump_lead_in_total_failure() {
		let drive = MockDrive::new().unreadable();
		let mut sink = RecordingSink::default();
		let framing = Framing::new(SubchannelFormat::None);
		let options = DumpOptions::default();

		let (mut evt_sink, _evt_source) = channel();
		let mut loop_ = DumpLoop::new(&drive, &mut sink, framing, 64, &options);
		let err = loop_.dump_lead_in(&mut evt_sink).unwrap_err();
		assert_eq!(err, DumpError::LeadInUnreadable);
	}
}
