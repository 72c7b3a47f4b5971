/*!
# CD Dump: Drive Interface

Somewhat useful documentation:
<https://www.t10.org/ftp/t10/document.97/97-117r0.pdf>
*/

use crate::{
	error::DumpError,
	framing::SubchannelFormat,
	toc::TocDescriptor,
};
use std::{
	cell::RefCell,
	ffi::CString,
	os::unix::ffi::OsStrExt,
	path::Path,
	sync::Once,
	time::Duration,
};



/// # Initialization Counter.
static LIBCDIO_INIT: Once = Once::new();



#[derive(Debug, Clone, Copy, Eq, PartialEq)]
/// # SCSI Sense Data.
///
/// The cause a failed MMC command reports back, distilled to the three
/// bytes a caller actually needs to act on (§6).
pub struct Sense {
	/// # Sense Key.
	pub key: u8,

	/// # Additional Sense Code.
	pub asc: u8,

	/// # Additional Sense Code Qualifier.
	pub ascq: u8,
}

impl Sense {
	/// # No Sense (Command Succeeded).
	pub const NONE: Self = Self { key: 0, asc: 0, ascq: 0 };

	#[must_use]
	/// # New.
	pub const fn new(key: u8, asc: u8, ascq: u8) -> Self { Self { key, asc, ascq } }

	#[must_use]
	/// # Is "Unrecovered Read Error" (ASC 0x11)?
	///
	/// The signal the persistent-recovery state machine watches for to
	/// move an LBA into the partial set (§4.5).
	pub const fn is_unrecovered_read_error(self) -> bool { self.asc == 0x11 }
}



#[derive(Debug, Clone, Eq, PartialEq)]
/// # Inquiry Data.
///
/// Identification pulled once at mount and carried for the lifetime of
/// the session; feeds [`crate::resume::DumpHardware`].
pub struct Inquiry {
	/// # Vendor.
	pub vendor: String,

	/// # Model.
	pub model: String,

	/// # Serial.
	pub serial: String,

	/// # Platform (host OS identifier).
	pub platform: String,

	/// # SCSI Peripheral Device Type.
	pub device_type: u8,
}



#[derive(Debug, Clone, Eq, PartialEq)]
/// # Mode Page Parameter.
///
/// The two parameter bytes the error-recovery state machine toggles on
/// MODE PAGE 0x01 (§4.5).
pub enum ModePageParameter {
	/// # Return Damaged Data, ReadRetryCount=255 (0x20).
	ReturnDamagedData,

	/// # Ignore ECC Errors (0x01).
	IgnoreEcc,

	/// # Restore The Drive's Saved Page Verbatim.
	Restore(Vec<u8>),
}

impl ModePageParameter {
	#[must_use]
	/// # Build MODE PAGE 0x01 Bytes.
	///
	/// Returns a full mode page (header + page data) ready for a MODE
	/// SELECT command, or the saved bytes verbatim for [`Self::Restore`].
	pub fn page_bytes(&self, base: &[u8]) -> Vec<u8> {
		match self {
			Self::Restore(saved) => saved.clone(),
			Self::ReturnDamagedData | Self::IgnoreEcc => {
				let mut page = base.to_vec();
				if page.len() < 12 { page.resize(12, 0); }
				// Byte 2: error recovery parameter bitmask.
				page[2] = match self {
					Self::ReturnDamagedData => 0x20,
					Self::IgnoreEcc => 0x01,
					Self::Restore(_) => unreachable!(),
				};
				// Byte 3: read retry count.
				if matches!(self, Self::ReturnDamagedData) { page[3] = 255; }
				page
			},
		}
	}
}



/// # Drive Handle.
///
/// A capability-set style abstraction over the physical optical drive
/// (§9's "resolve at mount once" redesign): callers issue commands
/// through this trait rather than re-querying drive capabilities on
/// every call. One concrete implementation, [`LibcdioHandle`], backs it
/// via `libcdio`/MMC; tests use an in-memory fake.
pub trait DriveHandle {
	/// # Read CD.
	///
	/// Issue a `ReadCd` command for `count` contiguous blocks starting at
	/// `lba`, requesting the given subchannel framing. When `raw` is set,
	/// the command also requests sync, full header, and EDC/ECC bytes
	/// (§6 `dump-raw`); otherwise only user data is requested. Returns the
	/// raw interleaved buffer (caller splits via [`crate::framing::Framing`]),
	/// the sense data (zeroed on success), and how long the command took.
	///
	/// ## Errors
	///
	/// Returns [`DumpError`] if the command could not be issued at all
	/// (distinct from a sense-reported failure, which is recoverable).
	fn read_cd(
		&self,
		lba: i32,
		count: u32,
		subchannel: SubchannelFormat,
		raw: bool,
		timeout: Duration,
	) -> Result<(Vec<u8>, Sense, Duration), DumpError>;

	/// # Read Raw TOC.
	///
	/// ## Errors
	///
	/// Returns [`DumpError`] if the command is unsupported or fails.
	fn read_raw_toc(&self) -> Result<Vec<TocDescriptor>, DumpError>;

	/// # Read Processed TOC.
	///
	/// Fallback used when [`DriveHandle::read_raw_toc`] is unavailable.
	///
	/// ## Errors
	///
	/// Returns [`DumpError`] if the command is unsupported or fails.
	fn read_toc_processed(&self) -> Result<Vec<TocDescriptor>, DumpError>;

	/// # Read ATIP.
	///
	/// ## Errors
	///
	/// Returns [`DumpError`] if the command is unsupported or fails.
	fn read_atip(&self) -> Result<Vec<u8>, DumpError>;

	/// # Read PMA.
	///
	/// ## Errors
	///
	/// Returns [`DumpError`] if the command is unsupported or fails.
	fn read_pma(&self) -> Result<Vec<u8>, DumpError>;

	/// # Read CD-Text.
	///
	/// ## Errors
	///
	/// Returns [`DumpError`] if the command is unsupported or fails.
	fn read_cdtext(&self) -> Result<Vec<u8>, DumpError>;

	/// # Read Disc Information.
	///
	/// ## Errors
	///
	/// Returns [`DumpError`] if the command is unsupported or fails.
	fn read_disc_information(&self) -> Result<Vec<u8>, DumpError>;

	/// # Read Session Info.
	///
	/// ## Errors
	///
	/// Returns [`DumpError`] if the command is unsupported or fails.
	fn read_session_info(&self) -> Result<Vec<u8>, DumpError>;

	/// # Read MCN.
	///
	/// Returns `None` if the drive has no MCN to report, rather than an
	/// error; an absent MCN is a normal, common outcome.
	fn read_mcn(&self) -> Option<String>;

	/// # Read Track ISRC.
	///
	/// Returns `None` if the track has no ISRC to report.
	fn read_isrc(&self, track_no: u8) -> Option<String>;

	/// # Mode Sense (6).
	///
	/// ## Errors
	///
	/// Returns [`DumpError`] if the command is unsupported or fails.
	fn mode_sense6(&self, page: u8) -> Result<Vec<u8>, DumpError>;

	/// # Mode Sense (10).
	///
	/// ## Errors
	///
	/// Returns [`DumpError`] if the command is unsupported or fails.
	fn mode_sense10(&self, page: u8) -> Result<Vec<u8>, DumpError>;

	/// # Mode Select (6).
	///
	/// ## Errors
	///
	/// Returns [`DumpError::ModeSelectRejected`] if the drive rejects the
	/// page.
	fn mode_select6(&self, page: &[u8]) -> Result<(), DumpError>;

	/// # Mode Select (10).
	///
	/// ## Errors
	///
	/// Returns [`DumpError::ModeSelectRejected`] if the drive rejects the
	/// page.
	fn mode_select10(&self, page: &[u8]) -> Result<(), DumpError>;

	/// # Inquiry.
	///
	/// ## Errors
	///
	/// Returns [`DumpError`] if the command is unsupported or fails.
	fn inquiry(&self) -> Result<Inquiry, DumpError>;
}



#[allow(unsafe_code, reason = "Raw MMC commands require it.")]
/// # Libcdio Drive Handle.
///
/// The production [`DriveHandle`]. Mirrors the teacher's `LibcdioInstance`
/// shape: a single `libcdio` connection, `Once`-guarded global init, and
/// `Drop`-based teardown; extended here with the raw MMC command set the
/// dump engine needs beyond plain CD-DA reads.
pub struct LibcdioHandle {
	/// # Device Path (kept for error messages).
	dev: Option<CString>,

	/// # Connection.
	ptr: *mut libcdio_sys::CdIo_t,

	/// # Sectors That Have Already Hard-Failed.
	///
	/// Avoids re-issuing commands the drive is known to choke on within
	/// a single recovery pass.
	shitlist: RefCell<std::collections::HashSet<i32>>,
}

#[allow(unsafe_code, reason = "The raw connection pointer is exclusively owned and moved, never shared, across the one worker thread a session runs on (§5).")]
// Safety: `ptr` is never accessed concurrently from two threads at once —
// a session takes ownership of the handle for its single dedicated worker
// (§5: "the drive is exclusively held for the duration of the dump") and
// `RefCell`'s lack of `Sync` already prevents any attempt to share `&Self`
// across threads.
unsafe impl Send for LibcdioHandle {}

#[allow(unsafe_code, reason = "Tearing down the libcdio connection requires it.")]
impl Drop for LibcdioHandle {
	fn drop(&mut self) {
		if !self.ptr.is_null() {
			unsafe { libcdio_sys::cdio_destroy(self.ptr); }
			self.dev.take();
		}
	}
}

impl LibcdioHandle {
	#[allow(unsafe_code, reason = "Opening the libcdio connection requires it.")]
	/// # New.
	///
	/// Connect to a specific device, or let `libcdio` pick the best
	/// available one if `dev` is `None`.
	///
	/// ## Errors
	///
	/// Returns [`DumpError::DriveUnreadable`] if the device can't be
	/// opened.
	pub fn new<P: AsRef<Path>>(dev: Option<P>) -> Result<Self, DumpError> {
		LIBCDIO_INIT.call_once(|| unsafe { libcdio_sys::cdio_init(); });

		let dev_cstr = match dev {
			Some(p) => {
				let p = p.as_ref();
				if !p.exists() { return Err(DumpError::DriveUnreadable); }
				Some(
					CString::new(p.as_os_str().as_bytes())
						.map_err(|_| DumpError::DriveUnreadable)?
				)
			},
			None => None,
		};

		let ptr = unsafe {
			libcdio_sys::cdio_open(
				dev_cstr.as_ref().map_or_else(std::ptr::null, |v| v.as_ptr()),
				libcdio_sys::driver_id_t_DRIVER_DEVICE,
			)
		};

		if ptr.is_null() { return Err(DumpError::DriveUnreadable); }

		Ok(Self { dev: dev_cstr, ptr, shitlist: RefCell::new(std::collections::HashSet::new()) })
	}

	#[allow(unsafe_code, reason = "Issuing the MMC command via libcdio requires it.")]
	/// # Run A Raw MMC Command, Returning The Driver's Own Return Code.
	///
	/// The building block both [`LibcdioHandle::mmc`] and
	/// [`LibcdioHandle::request_sense`] sit on top of. Kept separate from
	/// `mmc` because `read_cd` needs the raw code to decide whether a
	/// REQUEST SENSE follow-up is warranted, not a pre-collapsed `Result`.
	fn run_cdb(
		&self,
		cdb: &[u8],
		data: &mut [u8],
		write: bool,
		timeout: Duration,
	) -> libcdio_sys::driver_return_code_t {
		let mut full_cdb = [0_u8; 16];
		full_cdb[..cdb.len().min(16)].copy_from_slice(&cdb[..cdb.len().min(16)]);

		let direction = if write {
			libcdio_sys::cdio_mmc_direction_t_CDIO_MMC_DATA_WRITE
		}
		else {
			libcdio_sys::cdio_mmc_direction_t_CDIO_MMC_DATA_READ
		};

		let mut mmc_cdb = libcdio_sys::mmc_cdb_t { field: full_cdb };

		unsafe {
			libcdio_sys::mmc_run_cmd(
				self.ptr,
				u32::try_from(timeout.as_millis()).unwrap_or(u32::MAX),
				&mut mmc_cdb,
				direction,
				data.len() as i32,
				data.as_mut_ptr().cast(),
			)
		}
	}

	/// # Run A Raw MMC Command.
	///
	/// Builds and issues an arbitrary CDB. Every higher-level command
	/// method (`mode_sense6`, `inquiry`, the TOC readers, …) funnels
	/// through here; none of them need real sense data on failure, so a
	/// generic [`DumpError::Io`] is good enough.
	fn mmc(
		&self,
		cdb: &[u8],
		data: &mut [u8],
		write: bool,
		timeout: Duration,
	) -> Result<Sense, DumpError> {
		let res = self.run_cdb(cdb, data, write, timeout);
		if res == libcdio_sys::driver_return_code_t_DRIVER_OP_SUCCESS {
			Ok(Sense::NONE)
		}
		else {
			Err(DumpError::Io(format!("MMC command failed with code {res}")))
		}
	}

	/// # Issue REQUEST SENSE (0x03).
	///
	/// Follows up a failed command to recover the real sense key/ASC/ASCQ
	/// (§4.5, §6) instead of reporting a bare failure. Returns `None` if
	/// even the follow-up command fails.
	fn request_sense(&self) -> Option<Sense> {
		let mut buf = [0_u8; 18];
		let len = buf.len();
		let cdb = [0x03, 0, 0, 0, len as u8, 0];
		if self.run_cdb(&cdb, &mut buf, false, Duration::from_secs(1)) == libcdio_sys::driver_return_code_t_DRIVER_OP_SUCCESS {
			Some(parse_sense(&buf))
		}
		else {
			None
		}
	}
}

/// # Parse Fixed-Format Sense Data.
///
/// Sense key lives in the low nibble of byte 2; ASC and ASCQ are bytes
/// 12 and 13 (SPC fixed sense format).
fn parse_sense(buf: &[u8]) -> Sense {
	if buf.len() < 14 { return Sense::NONE; }
	Sense::new(buf[2] & 0x0F, buf[12], buf[13])
}

impl DriveHandle for LibcdioHandle {
	fn read_cd(
		&self,
		lba: i32,
		count: u32,
		subchannel: SubchannelFormat,
		raw: bool,
		timeout: Duration,
	) -> Result<(Vec<u8>, Sense, Duration), DumpError> {
		let block_size = subchannel.block_size();
		let mut buf = vec![0_u8; block_size as usize * count as usize];

		let sub_code: u8 = match subchannel {
			SubchannelFormat::None => 0,
			SubchannelFormat::PackedQ16 => 2,
			SubchannelFormat::RawPW96 => 1,
		};

		// Flags byte: sync + header codes + user data + EDC/ECC when
		// `raw` is set (§6 `dump-raw`), user data only otherwise.
		let flags: u8 = if raw { 0b1111_1000 } else { 0b0001_0000 };

		// READ CD (0xBE): opcode, sector-type/dap, LBA (4 bytes), transfer
		// length (3 bytes), flags, subchannel selection, control.
		let cdb = [
			0xBE,
			0b0000_0000, // all sector types
			(lba >> 24) as u8, (lba >> 16) as u8, (lba >> 8) as u8, lba as u8,
			(count >> 16) as u8, (count >> 8) as u8, count as u8,
			flags,
			sub_code,
			0,
		];

		if self.shitlist.borrow().contains(&lba) {
			return Err(DumpError::Io("LBA previously failed; skipping.".to_owned()));
		}

		let started = std::time::Instant::now();
		let res = self.run_cdb(&cdb, &mut buf, false, timeout);
		if res == libcdio_sys::driver_return_code_t_DRIVER_OP_SUCCESS {
			Ok((buf, Sense::NONE, started.elapsed()))
		}
		else {
			match self.request_sense() {
				// A real sense code means the drive answered; let the
				// caller's recovery state machine see it rather than
				// treating this as a hard I/O error.
				Some(sense) => Ok((buf, sense, started.elapsed())),
				None => {
					self.shitlist.borrow_mut().insert(lba);
					Err(DumpError::Io(format!("MMC command failed with code {res}")))
				},
			}
		}
	}

	fn read_raw_toc(&self) -> Result<Vec<TocDescriptor>, DumpError> {
		// READ TOC/PMA/ATIP (0x43), format 2 ("raw TOC").
		let mut buf = vec![0_u8; 2048];
		let len = buf.len();
		let cdb = [0x43, 0x02, 0, 0, 0, 0, 0, (len >> 8) as u8, len as u8, 0, 0, 0];
		self.mmc(&cdb, &mut buf, false, Duration::from_secs(10))?;
		parse_raw_toc(&buf)
	}

	fn read_toc_processed(&self) -> Result<Vec<TocDescriptor>, DumpError> {
		// READ TOC/PMA/ATIP (0x43), format 0 ("processed TOC").
		let mut buf = vec![0_u8; 1024];
		let len = buf.len();
		let cdb = [0x43, 0x00, 0, 0, 0, 0, 0, (len >> 8) as u8, len as u8, 0, 0, 0];
		self.mmc(&cdb, &mut buf, false, Duration::from_secs(10))?;
		parse_raw_toc(&buf)
	}

	fn read_atip(&self) -> Result<Vec<u8>, DumpError> {
		let mut buf = vec![0_u8; 32];
		let len = buf.len();
		let cdb = [0x43, 0x04, 0, 0, 0, 0, 0, (len >> 8) as u8, len as u8, 0, 0, 0];
		self.mmc(&cdb, &mut buf, false, Duration::from_secs(5))?;
		Ok(buf)
	}

	fn read_pma(&self) -> Result<Vec<u8>, DumpError> {
		let mut buf = vec![0_u8; 2048];
		let len = buf.len();
		let cdb = [0x43, 0x03, 0, 0, 0, 0, 0, (len >> 8) as u8, len as u8, 0, 0, 0];
		self.mmc(&cdb, &mut buf, false, Duration::from_secs(10))?;
		Ok(buf)
	}

	fn read_cdtext(&self) -> Result<Vec<u8>, DumpError> {
		let mut buf = vec![0_u8; 2048];
		let len = buf.len();
		let cdb = [0x43, 0x05, 0, 0, 0, 0, 0, (len >> 8) as u8, len as u8, 0, 0, 0];
		self.mmc(&cdb, &mut buf, false, Duration::from_secs(10))?;
		Ok(buf)
	}

	fn read_disc_information(&self) -> Result<Vec<u8>, DumpError> {
		// READ DISC INFORMATION (0x51).
		let mut buf = vec![0_u8; 34];
		let len = buf.len();
		let cdb = [0x51, 0, 0, 0, 0, 0, 0, (len >> 8) as u8, len as u8, 0, 0, 0];
		self.mmc(&cdb, &mut buf, false, Duration::from_secs(5))?;
		Ok(buf)
	}

	fn read_session_info(&self) -> Result<Vec<u8>, DumpError> {
		// READ TOC/PMA/ATIP (0x43), format 1 ("multi-session").
		let mut buf = vec![0_u8; 12];
		let len = buf.len();
		let cdb = [0x43, 0x01, 0, 0, 0, 0, 0, (len >> 8) as u8, len as u8, 0, 0, 0];
		self.mmc(&cdb, &mut buf, false, Duration::from_secs(5))?;
		Ok(buf)
	}

	fn read_mcn(&self) -> Option<String> {
		// READ SUB-CHANNEL (0x42), format 2 (Media Catalog Number).
		let mut buf = vec![0_u8; 24];
		let len = buf.len();
		let cdb = [0x42, 0, 0x02, 0, 0, 0, 0, (len >> 8) as u8, len as u8, 0, 0, 0];
		self.mmc(&cdb, &mut buf, false, Duration::from_secs(5)).ok()?;
		if buf.get(8) == Some(&1) { decode_ascii(&buf[9..22]) } else { None }
	}

	fn read_isrc(&self, track_no: u8) -> Option<String> {
		// READ SUB-CHANNEL (0x42), format 3 (ISRC).
		let mut buf = vec![0_u8; 24];
		let len = buf.len();
		let cdb = [0x42, 0, 0x03, 0, 0, 0, track_no, (len >> 8) as u8, len as u8, 0, 0, 0];
		self.mmc(&cdb, &mut buf, false, Duration::from_secs(5)).ok()?;
		if buf.get(8) == Some(&1) { decode_ascii(&buf[9..21]) } else { None }
	}

	fn mode_sense6(&self, page: u8) -> Result<Vec<u8>, DumpError> {
		let mut buf = vec![0_u8; 64];
		let len = buf.len();
		let cdb = [0x1A, 0, page, 0, len as u8, 0];
		self.mmc(&cdb, &mut buf, false, Duration::from_secs(5))?;
		Ok(buf)
	}

	fn mode_sense10(&self, page: u8) -> Result<Vec<u8>, DumpError> {
		let mut buf = vec![0_u8; 64];
		let len = buf.len();
		let cdb = [0x5A, 0, page, 0, 0, 0, 0, (len >> 8) as u8, len as u8, 0];
		self.mmc(&cdb, &mut buf, false, Duration::from_secs(5))?;
		Ok(buf)
	}

	fn mode_select6(&self, page: &[u8]) -> Result<(), DumpError> {
		let mut data = page.to_vec();
		let len = data.len();
		let cdb = [0x15, 0x10, 0, 0, len as u8, 0];
		self.mmc(&cdb, &mut data, true, Duration::from_secs(5))
			.map(|_| ())
			.map_err(|_| DumpError::ModeSelectRejected)
	}

	fn mode_select10(&self, page: &[u8]) -> Result<(), DumpError> {
		let mut data = page.to_vec();
		let len = data.len();
		let cdb = [0x55, 0x10, 0, 0, 0, 0, 0, (len >> 8) as u8, len as u8, 0];
		self.mmc(&cdb, &mut data, true, Duration::from_secs(5))
			.map(|_| ())
			.map_err(|_| DumpError::ModeSelectRejected)
	}

	fn inquiry(&self) -> Result<Inquiry, DumpError> {
		let mut buf = vec![0_u8; 96];
		let len = buf.len();
		let cdb = [0x12, 0, 0, 0, len as u8, 0];
		self.mmc(&cdb, &mut buf, false, Duration::from_secs(5))?;

		let device_type = buf.first().copied().unwrap_or(0) & 0b0001_1111;
		let vendor = decode_ascii(&buf[8..16]).unwrap_or_default();
		let model = decode_ascii(&buf[16..32]).unwrap_or_default();
		let serial = String::new(); // Not all drives expose this via plain INQUIRY.
		let platform = std::env::consts::OS.to_owned();

		Ok(Inquiry { vendor, model, serial, platform, device_type })
	}
}



/// # Decode A Padded ASCII Field.
///
/// SCSI text fields are space-padded and fixed-width, and some drives
/// tuck stray control bytes in among the padding; collapses both rather
/// than just trimming the ends, and returns `None` for an all-blank
/// field.
fn decode_ascii(raw: &[u8]) -> Option<String> {
	use trimothy::NormalizeWhitespace;
	let s: String = std::str::from_utf8(raw).ok()?
		.chars()
		.normalized_control_and_whitespace()
		.collect();
	let s = s.trim();
	if s.is_empty() { None } else { Some(s.to_owned()) }
}

/// # Parse A Raw TOC Buffer Into Descriptors.
///
/// MMC "raw TOC" format: a 4-byte header (data length, first/last
/// session) followed by 11-byte descriptors: session, ADR/CONTROL, TNO,
/// POINT, MIN, SEC, FRAME, ZERO, PMIN, PSEC, PFRAME.
fn parse_raw_toc(buf: &[u8]) -> Result<Vec<TocDescriptor>, DumpError> {
	if buf.len() < 4 { return Err(DumpError::NoToc); }
	let data_len = usize::from(u16::from_be_bytes([buf[0], buf[1]]));
	let end = (data_len + 2).min(buf.len());
	let body = &buf[4..end];

	let mut out = Vec::new();
	for chunk in body.chunks_exact(11) {
		let session = chunk[0];
		let control = chunk[1] & 0b1111;
		let point = chunk[3];
		let pmsf = crate::toc::Msf::new(0, chunk[8], chunk[9], chunk[10]);
		out.push(TocDescriptor { session, point, control, pmsf, psec_a0: chunk[9] });
	}

	if out.is_empty() { Err(DumpError::NoToc) } else { Ok(out) }
}



#[cfg(test)]
/// # Shared Test Fake.
///
/// A single configurable [`DriveHandle`] fake used across this crate's
/// unit tests (`capability`, `recovery`, `dump`, `engine`) so each module
/// doesn't have to hand-roll its own.
pub(crate) mod test_mock {
	use super::{
		DriveHandle,
		Inquiry,
		Sense,
	};
	use crate::{
		error::DumpError,
		framing::SubchannelFormat,
		toc::TocDescriptor,
	};
	use std::{
		cell::{
			Cell,
			RefCell,
		},
		collections::HashSet,
		time::Duration,
	};

	/// # Subchannel Rank (None < PackedQ16 < RawPW96).
	const fn rank(f: SubchannelFormat) -> u8 {
		match f {
			SubchannelFormat::None => 0,
			SubchannelFormat::PackedQ16 => 1,
			SubchannelFormat::RawPW96 => 2,
		}
	}

	/// # Mock Drive.
	pub(crate) struct MockDrive {
		/// # Can Be Read At All?
		readable: Cell<bool>,

		/// # Best Subchannel Format The "Hardware" Supports.
		max_subchannel: SubchannelFormat,

		/// # Largest Block Count A Single Command Accepts.
		max_blocks: u32,

		/// # LBAs That Fail Once, Then Succeed On Any Later Attempt.
		fail_once: RefCell<HashSet<i32>>,

		/// # LBAs That Report "Unrecovered Read Error" (ASC 0x11).
		///
		/// Once `ignore_ecc` is toggled on, these instead succeed (the
		/// drive now "returns whatever it has" instead of erroring).
		unrecovered: RefCell<HashSet<i32>>,

		/// # Ignore-ECC Mode Page Active?
		ignore_ecc: Cell<bool>,

		/// # Does MODE SELECT Succeed?
		mode_select_ok: bool,

		/// # Raw TOC To Hand Back.
		toc: Vec<TocDescriptor>,
	}

	impl MockDrive {
		/// # New, With Generous Defaults.
		pub(crate) fn new() -> Self {
			Self {
				readable: Cell::new(true),
				max_subchannel: SubchannelFormat::RawPW96,
				max_blocks: 64,
				fail_once: RefCell::new(HashSet::new()),
				unrecovered: RefCell::new(HashSet::new()),
				ignore_ecc: Cell::new(false),
				mode_select_ok: true,
				toc: Vec::new(),
			}
		}

		/// # With A Capped Subchannel Format.
		pub(crate) fn with_max_subchannel(mut self, f: SubchannelFormat) -> Self {
			self.max_subchannel = f;
			self
		}

		/// # With A Capped Max Block Count.
		pub(crate) fn with_max_blocks(mut self, n: u32) -> Self {
			self.max_blocks = n;
			self
		}

		/// # Make The Drive Entirely Unreadable.
		pub(crate) fn unreadable(mut self) -> Self {
			self.readable = Cell::new(false);
			self
		}

		/// # With LBAs That Fail Their First Attempt, Then Succeed.
		pub(crate) fn with_fail_once<I: IntoIterator<Item = i32>>(mut self, lbas: I) -> Self {
			self.fail_once = RefCell::new(lbas.into_iter().collect());
			self
		}

		/// # With LBAs That Always Report ASC 0x11 Until Ignore-ECC Is Set.
		pub(crate) fn with_unrecovered<I: IntoIterator<Item = i32>>(mut self, lbas: I) -> Self {
			self.unrecovered = RefCell::new(lbas.into_iter().collect());
			self
		}

		/// # With MODE SELECT Always Rejected.
		pub(crate) fn reject_mode_select(mut self) -> Self {
			self.mode_select_ok = false;
			self
		}

		/// # With A Raw TOC.
		pub(crate) fn with_toc(mut self, toc: Vec<TocDescriptor>) -> Self {
			self.toc = toc;
			self
		}

		#[must_use]
		/// # Is Ignore-ECC Mode Currently Active?
		pub(crate) fn ignore_ecc_active(&self) -> bool { self.ignore_ecc.get() }
	}

	impl DriveHandle for MockDrive {
		fn read_cd(
			&self,
			lba: i32,
			count: u32,
			subchannel: SubchannelFormat,
			_raw: bool,
			_timeout: Duration,
		) -> Result<(Vec<u8>, Sense, Duration), DumpError> {
			if !self.readable.get() { return Err(DumpError::DriveUnreadable); }
			if rank(subchannel) > rank(self.max_subchannel) {
				return Err(DumpError::Io("subchannel not supported".to_owned()));
			}
			if count > self.max_blocks || count == 0 {
				return Err(DumpError::Io("block count not supported".to_owned()));
			}

			let buf = vec![0_u8; subchannel.block_size() as usize * count as usize];
			let duration = Duration::from_millis(1);

			for i in 0..count {
				let l = lba + i as i32;

				if self.fail_once.borrow().contains(&l) {
					self.fail_once.borrow_mut().remove(&l);
					return Ok((buf, Sense::new(0x03, 0x11, 0x00), duration));
				}

				if self.unrecovered.borrow().contains(&l) && !self.ignore_ecc.get() {
					return Ok((buf, Sense::new(0x03, 0x11, 0x00), duration));
				}
			}

			Ok((buf, Sense::NONE, duration))
		}

		fn read_raw_toc(&self) -> Result<Vec<TocDescriptor>, DumpError> {
			if self.toc.is_empty() { Err(DumpError::NoToc) } else { Ok(self.toc.clone()) }
		}

		fn read_toc_processed(&self) -> Result<Vec<TocDescriptor>, DumpError> { self.read_raw_toc() }

		fn read_atip(&self) -> Result<Vec<u8>, DumpError> { Ok(Vec::new()) }

		fn read_pma(&self) -> Result<Vec<u8>, DumpError> { Ok(Vec::new()) }

		fn read_cdtext(&self) -> Result<Vec<u8>, DumpError> { Ok(Vec::new()) }

		fn read_disc_information(&self) -> Result<Vec<u8>, DumpError> { Ok(Vec::new()) }

		fn read_session_info(&self) -> Result<Vec<u8>, DumpError> { Ok(Vec::new()) }

		fn read_mcn(&self) -> Option<String> { None }

		fn read_isrc(&self, _track_no: u8) -> Option<String> { None }

		fn mode_sense6(&self, _page: u8) -> Result<Vec<u8>, DumpError> { Ok(vec![0_u8; 12]) }

		fn mode_sense10(&self, _page: u8) -> Result<Vec<u8>, DumpError> { Ok(vec![0_u8; 12]) }

		fn mode_select6(&self, page: &[u8]) -> Result<(), DumpError> {
			if !self.mode_select_ok { return Err(DumpError::ModeSelectRejected); }
			if page.get(2) == Some(&0x01) { self.ignore_ecc.set(true); }
			Ok(())
		}

		fn mode_select10(&self, page: &[u8]) -> Result<(), DumpError> { self.mode_select6(page) }

		fn inquiry(&self) -> Result<Inquiry, DumpError> {
			Ok(Inquiry {
				vendor: "Mock".to_owned(),
				model: "Drive".to_owned(),
				serial: "1".to_owned(),
				platform: "test".to_owned(),
				device_type: 5,
			})
		}
	}
}



#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn t_sense_unrecovered_read_error() {
		let s = Sense::new(0x03, 0x11, 0x00);
		assert!(s.is_unrecovered_read_error());
		assert!(!Sense::NONE.is_unrecovered_read_error());
	}

	#[test]
	fn t_parse_sense() {
		let mut buf = [0_u8; 18];
		buf[2] = 0xF3; // high nibble (valid bit etc.) should be masked off
		buf[12] = 0x11;
		buf[13] = 0x00;
		let sense = parse_sense(&buf);
		assert_eq!(sense, Sense::new(0x03, 0x11, 0x00));
		assert!(sense.is_unrecovered_read_error());

		assert_eq!(parse_sense(&[0_u8; 4]), Sense::NONE);
	}

	#[test]
	fn t_mode_page_bytes() {
		let base = vec![0_u8; 12];
		let damaged = ModePageParameter::ReturnDamagedData.page_bytes(&base);
		assert_eq!(damaged[2], 0x20);
		assert_eq!(damaged[3], 255);

		let ignore = ModePageParameter::IgnoreEcc.page_bytes(&base);
		assert_eq!(ignore[2], 0x01);

		let saved = vec![1, 2, 3];
		let restored = ModePageParameter::Restore(saved.clone()).page_bytes(&base);
		assert_eq!(restored, saved);
	}

	#[test]
	fn t_parse_raw_toc() {
		let mut buf = vec![0_u8; 4];
		buf[0..2].copy_from_slice(&11_u16.to_be_bytes());
		// One descriptor: session 1, control 0x04 (data), point 0x01, MSF 0:02:00:00.
		buf.extend_from_slice(&[1, 0x04, 0, 0x01, 0, 2, 0, 0, 0, 0, 0]);
		let descriptors = parse_raw_toc(&buf).expect("parse should succeed");
		assert_eq!(descriptors.len(), 1);
		assert_eq!(descriptors[0].point, 0x01);
		assert_eq!(descriptors[0].session, 1);
	}

	#[test]
	fn t_decode_ascii_blank() {
		assert_eq!(decode_ascii(b"        "), None);
		assert_eq!(decode_ascii(b"FOO     "), Some("FOO".to_owned()));
	}
}
