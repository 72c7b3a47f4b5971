/*!
# CD Dump: Error-Recovery State Machine

Runs once the primary dump loop has finished, walking bad blocks back
through trim, retry, and (optionally) persistent-mode recovery passes
before restoring the drive to its original configuration (§4.5).
*/

use crate::{
	drive::{
		DriveHandle,
		ModePageParameter,
	},
	error::DumpError,
	events::{
		EventSink,
		LogEvent,
		ProgressEvent,
	},
	extents::{
		BadBlockSet,
		ScanDirection,
	},
	abort::KillSwitch,
	config::DumpOptions,
	framing::Framing,
	resume::ResumeRecord,
	sink::ImageSink,
};



#[derive(Debug, Clone, Copy, Eq, PartialEq)]
/// # Recovery State.
///
/// The exact eight-state machine from §4.5, walked in order; most discs
/// exit at `Trim` or `Retry` with an empty bad-block set.
pub enum RecoveryState {
	/// # Re-Read Every Bad LBA Once.
	Trim,

	/// # Re-Read With Alternating Scan Direction, `retryPasses` Times.
	Retry,

	/// # MODE SELECT, Parameter=0x20 (Return Damaged Data).
	PersistentSetup,

	/// # Re-Read; ASC=0x11 Blocks Join The Partial Set.
	PersistentRetry,

	/// # MODE SELECT, Parameter=0x01 (Ignore ECC).
	PartialSetup,

	/// # Re-Read The Partial Set Once, Accepting Whatever Comes Back.
	PartialRead,

	/// # Restore The Drive's Original Mode Page.
	Restore,

	/// # Exit Recovery.
	Finalize,
}

impl RecoveryState {
	const fn label(self) -> &'static str {
		match self {
			Self::Trim => "Trim",
			Self::Retry => "Retry",
			Self::PersistentSetup => "PersistentSetup",
			Self::PersistentRetry => "PersistentRetry",
			Self::PartialSetup => "PartialSetup",
			Self::PartialRead => "PartialRead",
			Self::Restore => "Restore",
			Self::Finalize => "Finalize",
		}
	}
}



/// # Error Recovery.
///
/// Borrows the drive and sink for the duration of a recovery run; owns
/// nothing that outlives it (§9: no global state, capability sets
/// resolved once at mount and simply threaded through here).
pub struct Recovery<'a> {
	/// # Drive.
	drive: &'a dyn DriveHandle,

	/// # Output Sink.
	sink: &'a mut dyn ImageSink,

	/// # Negotiated Framing.
	framing: Framing,

	/// # Options.
	options: &'a DumpOptions,
}

impl<'a> Recovery<'a> {
	#[must_use]
	/// # New.
	pub fn new(
		drive: &'a dyn DriveHandle,
		sink: &'a mut dyn ImageSink,
		framing: Framing,
		options: &'a DumpOptions,
	) -> Self {
		Self { drive, sink, framing, options }
	}

	/// # Run.
	///
	/// Walks the state machine to completion (or to [`RecoveryState::Finalize`]
	/// early, on cancellation). Cancellation is polled at the start of every
	/// phase (§5); a phase already in progress always finishes its current
	/// LBA before checking.
	///
	/// ## Errors
	///
	/// This can only fail if the drive becomes entirely unreadable mid-run;
	/// per-LBA failures are folded back into [`ResumeRecord::bad`], not
	/// propagated.
	pub fn run(
		&mut self,
		resume: &mut ResumeRecord,
		events: &mut EventSink,
		kill: &KillSwitch,
	) -> Result<(), DumpError> {
		let mut state = RecoveryState::Trim;
		let mut dir = ScanDirection::Forward;
		let mut partial_set = BadBlockSet::new();
		let mut saved_mode_page: Option<Vec<u8>> = None;

		loop {
			if kill.killed() { break; }
			events.progress(ProgressEvent::Recovering { state: state.label() });

			state = match state {
				RecoveryState::Trim => self.run_trim(resume, events, kill),
				RecoveryState::Retry => self.run_retry(resume, events, kill, &mut dir),
				RecoveryState::PersistentSetup =>
					self.run_persistent_setup(resume, events, &mut saved_mode_page),
				RecoveryState::PersistentRetry =>
					self.run_persistent_retry(resume, events, kill, dir, &mut partial_set),
				RecoveryState::PartialSetup => self.run_partial_setup(events),
				RecoveryState::PartialRead =>
					self.run_partial_read(resume, events, kill, &mut partial_set),
				RecoveryState::Restore => self.run_restore(saved_mode_page.take()),
				RecoveryState::Finalize => break,
			};
		}

		Ok(())
	}

	/// # Trim: Re-Read Every Bad LBA Once.
	fn run_trim(&mut self, resume: &mut ResumeRecord, events: &mut EventSink, kill: &KillSwitch) -> RecoveryState {
		let lbas: Vec<i32> = resume.bad.scan(ScanDirection::Forward).collect();
		for lba in lbas {
			if kill.killed() { break; }
			self.recover_one(resume, lba, events);
		}

		if resume.bad.is_empty() { RecoveryState::Finalize } else { RecoveryState::Retry }
	}

	/// # Retry: Re-Read With Alternating Scan Direction, `retryPasses` Times.
	fn run_retry(
		&mut self,
		resume: &mut ResumeRecord,
		events: &mut EventSink,
		kill: &KillSwitch,
		dir: &mut ScanDirection,
	) -> RecoveryState {
		for _ in 0..self.options.retry_passes() {
			if kill.killed() || resume.bad.is_empty() { break; }
			*dir = dir.flipped();
			let lbas: Vec<i32> = resume.bad.scan(*dir).collect();
			for lba in lbas {
				if kill.killed() { break; }
				self.recover_one(resume, lba, events);
			}
		}

		if resume.bad.is_empty() { RecoveryState::Finalize }
		else if self.options.persistent() { RecoveryState::PersistentSetup }
		else { RecoveryState::Finalize }
	}

	/// # Persistent Setup: Save The Current Mode Page, Then MODE SELECT 0x20.
	fn run_persistent_setup(
		&mut self,
		_resume: &ResumeRecord,
		events: &mut EventSink,
		saved_mode_page: &mut Option<Vec<u8>>,
	) -> RecoveryState {
		let base = self.current_mode_page();
		*saved_mode_page = Some(base.clone());

		let page = ModePageParameter::ReturnDamagedData.page_bytes(&base);
		match self.select_mode_page(&page) {
			Ok(()) => RecoveryState::PersistentRetry,
			Err(_) => {
				events.log(LogEvent::ModeSelectRejected);
				RecoveryState::Finalize
			},
		}
	}

	/// # Persistent Retry: Re-Read; ASC=0x11 Blocks Join The Partial Set.
	fn run_persistent_retry(
		&mut self,
		resume: &mut ResumeRecord,
		events: &mut EventSink,
		kill: &KillSwitch,
		dir: ScanDirection,
		partial_set: &mut BadBlockSet,
	) -> RecoveryState {
		let lbas: Vec<i32> = resume.bad.scan(dir).collect();
		for lba in lbas {
			if kill.killed() { break; }

			match self.drive.read_cd(lba, 1, self.framing.format(), self.options.dump_raw(), self.options.command_timeout()) {
				Ok((data, sense, _)) if sense.is_unrecovered_read_error() => {
					partial_set.insert(lba);
					let _ = data;
				},
				Ok((data, _sense, _)) => self.commit_recovered(resume, lba, &data, events),
				Err(_) => {},
			}
		}

		if partial_set.is_empty() { RecoveryState::Restore } else { RecoveryState::PartialSetup }
	}

	/// # Partial Setup: MODE SELECT 0x01 (Ignore ECC).
	fn run_partial_setup(&mut self, events: &mut EventSink) -> RecoveryState {
		let base = self.current_mode_page();
		let page = ModePageParameter::IgnoreEcc.page_bytes(&base);
		match self.select_mode_page(&page) {
			Ok(()) => RecoveryState::PartialRead,
			Err(_) => {
				events.log(LogEvent::ModeSelectRejected);
				RecoveryState::Restore
			},
		}
	}

	/// # Partial Read: Re-Read The Partial Set Once, Accepting Whatever Comes Back.
	fn run_partial_read(
		&mut self,
		resume: &mut ResumeRecord,
		events: &mut EventSink,
		kill: &KillSwitch,
		partial_set: &mut BadBlockSet,
	) -> RecoveryState {
		let lbas: Vec<i32> = partial_set.scan(ScanDirection::Forward).collect();
		for lba in lbas {
			if kill.killed() { break; }
			partial_set.remove(lba);

			let data = match self.drive.read_cd(lba, 1, self.framing.format(), self.options.dump_raw(), self.options.command_timeout()) {
				Ok((data, _sense, _)) => data,
				Err(_) => vec![0_u8; self.framing.block_size() as usize],
			};
			self.commit_recovered(resume, lba, &data, events);
		}

		RecoveryState::Restore
	}

	/// # Restore: Put The Drive's Original Mode Page Back.
	fn run_restore(&mut self, saved_mode_page: Option<Vec<u8>>) -> RecoveryState {
		if let Some(saved) = saved_mode_page {
			let page = ModePageParameter::Restore(saved).page_bytes(&[]);
			let _ = self.select_mode_page(&page);
		}
		RecoveryState::Finalize
	}

	/// # Read The Current Page 0x01 (6, Falling Back To 10), Or Synthesize.
	fn current_mode_page(&self) -> Vec<u8> {
		self.drive.mode_sense6(0x01)
			.or_else(|_| self.drive.mode_sense10(0x01))
			.unwrap_or_else(|_| vec![0_u8; 12])
	}

	/// # MODE SELECT (6, Falling Back To 10).
	fn select_mode_page(&self, page: &[u8]) -> Result<(), DumpError> {
		self.drive.mode_select6(page).or_else(|_| self.drive.mode_select10(page))
	}

	/// # Attempt To Recover A Single LBA (Plain Read, No Mode-Page Games).
	///
	/// On a clean read, moves the LBA from [`ResumeRecord::bad`] into
	/// [`ResumeRecord::good`] and writes it to the sink; on any failure
	/// (sense-reported or command-level), the LBA is left exactly where
	/// it was.
	fn recover_one(&mut self, resume: &mut ResumeRecord, lba: i32, events: &mut EventSink) {
		match self.drive.read_cd(lba, 1, self.framing.format(), self.options.dump_raw(), self.options.command_timeout()) {
			Ok((data, sense, _)) if sense == crate::drive::Sense::NONE =>
				self.commit_recovered(resume, lba, &data, events),
			_ => {},
		}
	}

	/// # Commit A Recovered Sector: Write It, Then Update Extents/Bad Set.
	fn commit_recovered(&mut self, resume: &mut ResumeRecord, lba: i32, data: &[u8], events: &mut EventSink) {
		let (user, sub) = self.framing.split_owned(data, 1);
		if self.sink.write_sectors_long(&user, lba, 1).is_err() { return; }
		if let Some(tag) = self.framing.format().sector_tag() {
			let _ = self.sink.write_sector_tag(&sub, lba, tag);
		}

		resume.bad.remove(lba);
		resume.good.insert(lba);
		events.log(LogEvent::SectorRecovered { lba });
	}
}



#[cfg(test)]
mod test {
	use super::*;
	use crate::{
		drive::test_mock::MockDrive,
		events::channel,
		framing::SubchannelFormat,
	};

	struct NullSink;
	impl ImageSink for NullSink {
		fn create(&mut self, _: &std::path::Path, _: crate::toc::MediaType, _: u64, _: u32) -> Result<(), DumpError> { Ok(()) }
		fn set_tracks(&mut self, _: &[crate::toc::Track]) -> Result<(), DumpError> { Ok(()) }
		fn write_sectors_long(&mut self, _: &[u8], _: i32, _: u32) -> Result<(), DumpError> { Ok(()) }
		fn write_sectors_tag(&mut self, _: &[u8], _: i32, _: u32, _: crate::sink::SectorTagKind) -> Result<(), DumpError> { Ok(()) }
		fn write_sector_tag(&mut self, _: &[u8], _: i32, _: crate::sink::SectorTagKind) -> Result<(), DumpError> { Ok(()) }
		fn write_media_tag(&mut self, _: &[u8], _: crate::toc::MediaTagKind) -> Result<(), DumpError> { Ok(()) }
		fn set_dump_hardware(&mut self, _: &[crate::resume::DumpHardware]) {}
		fn set_cicm_metadata(&mut self, _: &[u8]) {}
		fn close(&mut self) -> Result<(), DumpError> { Ok(()) }
		fn supported_sector_tags(&self) -> &[crate::sink::SectorTagKind] { &[] }
		fn supported_media_tags(&self) -> &[crate::toc::MediaTagKind] { &[] }
	}

	#[test]
	fn t_recovery_trim_succeeds() {
		// S3: LBAs fail once, then succeed on the Trim pass.
		let drive = MockDrive::new().with_fail_once(100_000..100_064);
		let mut sink = NullSink;
		let framing = Framing::new(SubchannelFormat::None);
		let options = DumpOptions::default().with_retry_passes(1);
		let mut resume = ResumeRecord::new("disc".to_owned(), 360_000, 0);
		resume.bad.insert_run(100_000, 64);

		let (mut evt_sink, _evt_source) = channel();
		let kill = crate::abort::KillSwitch::default();

		let mut recovery = Recovery::new(&drive, &mut sink, framing, &options);
		recovery.run(&mut resume, &mut evt_sink, &kill).expect("recovery should not hard-fail");

		assert!(resume.bad.is_empty());
		assert!(resume.good.contains(100_000));
		assert!(resume.good.contains(100_063));
	}

	#[test]
	fn t_recovery_persistent_mode() {
		// S4: LBA 50,000 always reports ASC=0x11 until ignore-ECC is set.
		let drive = MockDrive::new().with_unrecovered([50_000]);
		let mut sink = NullSink;
		let framing = Framing::new(SubchannelFormat::None);
		let options = DumpOptions::default().with_retry_passes(2).with_persistent(true);
		let mut resume = ResumeRecord::new("disc".to_owned(), 360_000, 0);
		resume.bad.insert(50_000);

		let (mut evt_sink, _evt_source) = channel();
		let kill = crate::abort::KillSwitch::default();

		let mut recovery = Recovery::new(&drive, &mut sink, framing, &options);
		recovery.run(&mut resume, &mut evt_sink, &kill).expect("recovery should not hard-fail");

		// Ignore-ECC should have been toggled (Partial phases ran), and the
		// LBA should have ended up recovered (accepted "whatever came back").
		assert!(drive.ignore_ecc_active());
		assert!(resume.good.contains(50_000));
		assert!(resume.bad.is_empty());
	}

	#[test]
	fn t_recovery_mode_select_rejected_skips_persistent_branch() {
		let drive = MockDrive::new().with_unrecovered([50_000]).reject_mode_select();
		let mut sink = NullSink;
		let framing = Framing::new(SubchannelFormat::None);
		let options = DumpOptions::default().with_retry_passes(1).with_persistent(true);
		let mut resume = ResumeRecord::new("disc".to_owned(), 360_000, 0);
		resume.bad.insert(50_000);

		let (mut evt_sink, _evt_source) = channel();
		let kill = crate::abort::KillSwitch::default();

		let mut recovery = Recovery::new(&drive, &mut sink, framing, &options);
		recovery.run(&mut resume, &mut evt_sink, &kill).expect("recovery should not hard-fail");

		// MODE SELECT was rejected, so recovery should finalize without
		// ever entering the partial-set path, leaving the LBA bad.
		assert!(resume.bad.contains(50_000));
		assert!(!resume.good.contains(50_000));
	}

	#[test]
	fn t_recovery_cancellation_stops_early() {
		let drive = MockDrive::new().with_fail_once([100]);
		let mut sink = NullSink;
		let framing = Framing::new(SubchannelFormat::None);
		let options = DumpOptions::default().with_retry_passes(1);
		let mut resume = ResumeRecord::new("disc".to_owned(), 360_000, 0);
		resume.bad.insert(100);

		let (mut evt_sink, _evt_source) = channel();
		let kill = crate::abort::KillSwitch::default();
		kill.inner().store(true, std::sync::atomic::Ordering::Release);

		let mut recovery = Recovery::new(&drive, &mut sink, framing, &options);
		recovery.run(&mut resume, &mut evt_sink, &kill).expect("recovery should not hard-fail");

		// Cancelled before the first phase even ran its body.
		assert!(resume.bad.contains(100));
	}
}
