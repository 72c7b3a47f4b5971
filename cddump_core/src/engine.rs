/*!
# CD Dump: Session Orchestrator

Ties the other five components together into the sequence laid out in
§2: probe capabilities, plan the TOC, run the primary dump loop, run
error recovery if anything is left bad, then finalize the resume record
and output image (§4.6).
*/

use crate::{
	abort::KillSwitch,
	atomicfile::AtomicWriter,
	capability::DriveCapabilities,
	config::DumpOptions,
	drive::{
		DriveHandle,
		Inquiry,
		Sense,
	},
	dump::{
		DumpLoop,
		DumpStats,
		LoopOutcome,
	},
	error::DumpError,
	events::{
		EventSink,
		LogEvent,
		ProgressEvent,
	},
	extents::Extents,
	framing::Framing,
	hash::HashSink,
	recovery::Recovery,
	resume::{
		DumpHardware,
		ResumeRecord,
	},
	sink::ImageSink,
	toc::{
		MediaTagKind,
		MediaTags,
		MediaType,
		Track,
		TocPlanner,
	},
};
use std::{
	path::PathBuf,
	time::{
		Duration,
		Instant,
	},
};



/// # Sidecar Metadata Builder.
///
/// Out of scope for this crate (§1: "Submission/sidecar serialization:
/// invoked once at end of dump with the produced artifacts"); this trait
/// is the seam a plugin implements and [`DumpSession`] calls into, once,
/// on a clean (non-cancelled) finish.
pub trait SidecarBuilder {
	/// # Build.
	///
	/// Given the final track list and classified media type, produce
	/// whatever sidecar document the caller wants (CICM XML, a simple
	/// JSON summary, …) and hand it back as raw bytes for
	/// [`crate::sink::ImageSink::set_cicm_metadata`].
	fn build(&mut self, tracks: &[Track], media_type: MediaType) -> Vec<u8>;
}



#[derive(Debug, Clone, Default)]
/// # Dump Summary.
///
/// What gets reported back to the caller once a session finishes, either
/// normally or via cancellation (§7: "Final summary reports total time,
/// command time, write time, close time, fastest/slowest bursts, and
/// bad-block count").
pub struct DumpSummary {
	/// # Cancelled?
	pub cancelled: bool,

	/// # Bad Blocks Remaining At The End.
	pub bad_blocks: u32,

	/// # Loop/Recovery Throughput Statistics.
	pub stats: DumpStats,

	/// # Total Wall-Clock Time.
	pub total_time: Duration,

	/// # Time Spent Closing The Output Image.
	pub close_time: Duration,

	/// # Whole-Dump Digests, If A Hash Sink Was Wired Up.
	///
	/// `(algorithm name, digest bytes)` pairs straight out of
	/// [`crate::hash::HashSink::finalize`]; what the caller does with them
	/// (print, write a sidecar field, submit) is outside this crate's
	/// scope (§1).
	pub digests: Vec<(String, Vec<u8>)>,
}



/// # Dump Session.
///
/// The top-level orchestrator; owns nothing beyond borrowed collaborators
/// for the duration of one dump (§9: capability sets resolved once at
/// mount, no global state).
pub struct DumpSession<'a> {
	/// # Drive.
	drive: &'a dyn DriveHandle,

	/// # Output Sink.
	sink: &'a mut dyn ImageSink,

	/// # Options.
	options: DumpOptions,

	/// # Hash Sink.
	hash: Option<&'a mut dyn HashSink>,

	/// # Sidecar Builder.
	sidecar: Option<&'a mut dyn SidecarBuilder>,
}

impl<'a> DumpSession<'a> {
	#[must_use]
	/// # New.
	pub fn new(drive: &'a dyn DriveHandle, sink: &'a mut dyn ImageSink, options: DumpOptions) -> Self {
		Self { drive, sink, options, hash: None, sidecar: None }
	}

	#[must_use]
	/// # With A Hash Sink.
	pub fn with_hash_sink(mut self, hash: &'a mut dyn HashSink) -> Self {
		self.hash = Some(hash);
		self
	}

	#[must_use]
	/// # With A Sidecar Builder.
	pub fn with_sidecar_builder(mut self, sidecar: &'a mut dyn SidecarBuilder) -> Self {
		self.sidecar = Some(sidecar);
		self
	}

	/// # Resume File Path.
	///
	/// Derived from the output prefix by swapping in a `.resume`
	/// extension; kept alongside the image the way a dump tool's
	/// side-log files are (§6: "Persisted state ... is an external
	/// document").
	fn resume_path(&self) -> PathBuf {
		let mut path = self.options.output_prefix().to_path_buf();
		path.set_extension("resume");
		path
	}

	/// # Open A Rate-Log Sibling File.
	///
	/// MHDD/IBG logs are ambient (§6: never consulted for resume or
	/// verification decisions), so a failure to open one is silently
	/// swallowed rather than aborting the dump.
	fn open_rate_log(&self, ext: &str) -> Option<Box<dyn std::io::Write>> {
		let mut path = self.options.output_prefix().to_path_buf();
		path.set_extension(ext);
		std::fs::File::create(path).ok()
			.map(|f| Box::new(std::io::BufWriter::new(f)) as Box<dyn std::io::Write>)
	}

	/// # Run.
	///
	/// Executes an entire dump session end to end: mount-time probing
	/// and planning, the primary dump loop, error recovery (if needed),
	/// and the resume/output finalize sequence (§4.6).
	///
	/// ## Errors
	///
	/// Returns a [`DumpError`] for any fatal condition (§7): no usable
	/// TOC without "force", an incapable sink, a sink that rejects
	/// creation or the track list, a corrupt resume record, or a hard
	/// sink-write failure.
	pub fn run(&mut self, events: &mut EventSink, kill: &KillSwitch) -> Result<DumpSummary, DumpError> {
		let started = Instant::now();

		let inquiry = self.drive.inquiry().ok();

		let descriptors = self.drive.read_raw_toc()
			.or_else(|_| self.drive.read_toc_processed())
			.unwrap_or_default();
		let plan = TocPlanner::plan(descriptors, self.options.force())?;
		let mut tracks = plan.tracks;

		self.refine_track_kinds(&mut tracks);
		self.read_isrcs(&mut tracks);

		let sessions = tracks.iter().map(|t| t.session).max().unwrap_or(1);
		let media_type = TocPlanner::classify(&tracks, sessions);

		let caps = DriveCapabilities::probe(
			self.drive,
			self.sink.supported_sector_tags(),
			self.options.force(),
			self.options.command_timeout(),
		)?;
		let framing = Framing::new(caps.subchannel());

		let disc_id = Self::disc_fingerprint(&tracks, plan.lead_out);
		let mut resume = self.load_or_create_resume(&disc_id, plan.lead_out, &tracks)?;

		self.sink.create(
			self.options.output_path(),
			media_type,
			u64::try_from(plan.lead_out).map_err(|_| DumpError::Overflow)?,
			framing.block_size(),
		)?;
		self.sink.set_tracks(&tracks)?;

		let mut tags = self.collect_media_tags();

		let mut stats = DumpStats::default();
		let mut dump_loop = {
			let mut builder = DumpLoop::new(self.drive, self.sink, framing, caps.max_blocks_per_command(), &self.options);
			if let Some(hash) = self.hash.as_deref_mut() { builder = builder.with_hash_sink(hash); }
			if let Some(out) = self.open_rate_log("mhdd") { builder = builder.with_mhdd_log(out); }
			if let Some(out) = self.open_rate_log("ibg") { builder = builder.with_ibg_log(out); }
			builder
		};

		if self.options.dump_lead_in() {
			match dump_loop.dump_lead_in(events) {
				Ok(bytes) => tags.insert(MediaTagKind::LeadIn, bytes),
				Err(_) if self.options.force() => events.log(LogEvent::SoftError { what: "lead-in capture failed" }),
				Err(e) => return Err(e),
			}
		}

		let outcome = dump_loop.run(&tracks, &mut resume, events, kill, &mut stats)?;
		drop(dump_loop);

		let mut cancelled = matches!(outcome, LoopOutcome::Cancelled) || kill.killed();

		// §4.5: recovery runs only if the primary loop left gaps, the
		// caller didn't opt out with "no trim", and cancellation wasn't
		// already observed.
		let new_trim = !resume.bad.is_empty();
		if !cancelled && new_trim && !self.options.no_trim() {
			let mut recovery = Recovery::new(self.drive, self.sink, framing, &self.options);
			recovery.run(&mut resume, events, kill)?;
			cancelled = kill.killed();
		}

		self.persist_resume(&resume)?;

		let close_time = self.finalize(&mut resume, &tracks, &tags, media_type, inquiry.as_ref(), cancelled, events)?;

		let digests = self.hash.as_deref_mut().map_or_else(Vec::new, HashSink::finalize);

		events.progress(ProgressEvent::Finished { cancelled });

		Ok(DumpSummary {
			cancelled,
			bad_blocks: u32::try_from(resume.bad.len()).unwrap_or(u32::MAX),
			stats,
			total_time: started.elapsed(),
			close_time,
			digests,
		})
	}

	/// # Refine Non-Audio Track Kinds From Sector Byte 15 (§4.2).
	fn refine_track_kinds(&self, tracks: &mut [Track]) {
		for t in tracks.iter_mut().filter(|t| t.flags.is_data()) {
			if let Ok((data, sense, _)) = self.drive.read_cd(t.start, 1, crate::framing::SubchannelFormat::None, self.options.dump_raw(), self.options.command_timeout()) {
				if sense == Sense::NONE {
					if let Some(&byte15) = data.get(15) { t.kind = TocPlanner::refine_kind(byte15); }
				}
			}
		}
	}

	/// # Read Per-Track ISRCs.
	fn read_isrcs(&self, tracks: &mut [Track]) {
		for t in tracks.iter_mut() {
			if let Some(isrc) = self.drive.read_isrc(t.number) {
				if !isrc.is_empty() { t.isrc = Some(isrc); }
			}
		}
	}

	/// # Collect The Media Tags Available Up Front.
	///
	/// Lead-in is added separately, after the dump loop's lead-in capture
	/// (if requested); MCN and full TOC are gathered here.
	fn collect_media_tags(&self) -> MediaTags {
		let mut tags = MediaTags::new();
		if let Ok(raw) = self.drive.read_atip() { tags.insert(MediaTagKind::Atip, raw); }
		if let Ok(raw) = self.drive.read_pma() { tags.insert(MediaTagKind::Pma, raw); }
		if let Ok(raw) = self.drive.read_cdtext() { tags.insert(MediaTagKind::CdText, raw); }
		if let Some(mcn) = self.drive.read_mcn() {
			if !mcn.is_empty() { tags.insert(MediaTagKind::Mcn, mcn.into_bytes()); }
		}
		tags
	}

	/// # A Compact, Stable Disc Fingerprint.
	///
	/// Built from each track's start LBA plus the lead-out boundary,
	/// hashed with the same CRC32 the resume record's own trailer uses —
	/// cheap, and stable across re-reads of an identical disc without
	/// depending on the exact byte layout a particular TOC command
	/// returned it in.
	fn disc_fingerprint(tracks: &[Track], lead_out: i32) -> String {
		let mut buf = Vec::with_capacity(tracks.len() * 4 + 4);
		for t in tracks { buf.extend_from_slice(&t.start.to_le_bytes()); }
		buf.extend_from_slice(&lead_out.to_le_bytes());
		format!("{:08x}", crc32fast::hash(&buf))
	}

	/// # Load An Existing Resume Record, Or Start A Fresh One.
	fn load_or_create_resume(&self, disc_id: &str, lead_out: i32, tracks: &[Track]) -> Result<ResumeRecord, DumpError> {
		let path = self.resume_path();
		if path.exists() {
			let bytes = AtomicWriter::read(&path)?;
			let record = ResumeRecord::decode(&bytes)?;
			record.verify(disc_id, lead_out)?;
			Ok(record)
		}
		else {
			let start = tracks.first().map_or(0, |t| t.start);
			Ok(ResumeRecord::new(disc_id.to_owned(), lead_out, start))
		}
	}

	/// # Persist The Resume Record To Durable Storage.
	fn persist_resume(&self, resume: &ResumeRecord) -> Result<(), DumpError> {
		let bytes = resume.encode()?;
		AtomicWriter::write_atomic(&self.resume_path(), &bytes)
	}

	/// # Resume & Output Binding (§4.6).
	///
	/// Writes media tags, attaches hardware history, closes the sink, and
	/// — unless cancelled or "no metadata" is set — invokes the sidecar
	/// builder. Returns how long the close step took.
	fn finalize(
		&mut self,
		resume: &mut ResumeRecord,
		tracks: &[Track],
		tags: &MediaTags,
		media_type: MediaType,
		inquiry: Option<&Inquiry>,
		cancelled: bool,
		events: &mut EventSink,
	) -> Result<Duration, DumpError> {
		for (kind, bytes) in tags.iter() {
			if self.sink.supports_media_tag(kind) {
				self.sink.write_media_tag(bytes, kind)?;
			}
			else if self.options.force() {
				events.log(LogEvent::SoftError { what: "unsupported media tag skipped" });
			}
			else {
				return Err(DumpError::UnsupportedTag);
			}
		}

		for t in tracks {
			if let Some(isrc) = &t.isrc {
				if self.sink.write_media_tag(isrc.as_bytes(), MediaTagKind::TrackIsrc).is_err() && !self.options.force() {
					return Err(DumpError::IsrcUnavailable);
				}
			}
		}

		let mut hw = DumpHardware {
			manufacturer: inquiry.map(|i| i.vendor.clone()).unwrap_or_default(),
			model: inquiry.map(|i| i.model.clone()).unwrap_or_default(),
			firmware: String::new(),
			serial: inquiry.map(|i| i.serial.clone()).filter(|s| !s.is_empty()),
			platform: inquiry.map(|i| i.platform.clone()).unwrap_or_default(),
			software: env!("CARGO_PKG_NAME").to_owned(),
			software_version: env!("CARGO_PKG_VERSION").to_owned(),
			extents: Extents::new(),
			last_seen: utc2k::unixtime(),
		};

		// §6: "each run reconciles its own entry by manufacturer+model+
		// serial+platform" — update in place rather than appending a
		// duplicate when the same drive resumes the same dump. The extents
		// recorded are only what *this* run added, found by diffing the
		// dump's current good set against whatever this same hardware had
		// already claimed from a prior run.
		if let Some(existing) = resume.hardware.iter_mut().find(|h| h.same_identity(&hw)) {
			hw.extents = resume.good.difference(&existing.extents);
			*existing = hw;
		}
		else {
			hw.extents = resume.good.clone();
			resume.hardware.push(hw);
		}
		self.sink.set_dump_hardware(&resume.hardware);

		if !cancelled && !self.options.no_metadata() {
			if let Some(sidecar) = self.sidecar.as_mut() {
				let metadata = sidecar.build(tracks, media_type);
				self.sink.set_cicm_metadata(&metadata);
			}
		}

		let close_start = Instant::now();
		self.sink.close()?;
		Ok(close_start.elapsed())
	}
}
