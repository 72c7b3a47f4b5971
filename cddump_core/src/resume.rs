/*!
# CD Dump: Resume Record

A crash-safe, on-disk snapshot of dump progress: which LBAs are already
good, which are still pending recovery, and enough drive/media identity to
refuse a resume against the wrong disc or the wrong drive (§4.3, §7
invariant 4).

Laid out the same way as the rate logs in [`crate::ratelog`]: an 8-byte
magic, a version byte, a CRC32 trailer, and `DeSerialize` fields in
between. Written atomically via [`crate::atomicfile`].
*/

use crate::{
	error::DumpError,
	extents::{
		BadBlockSet,
		Extents,
	},
	serial::{
		DeSerialize,
		SIZE_I32,
		SIZE_U32,
	},
};
use std::{
	io::{
		Cursor,
		Read,
		Write,
	},
};



/// # Magic Header.
const MAGIC: [u8; 8] = *b"CDRS0001";

/// # Format Version.
const VERSION: u8 = 1;



#[derive(Debug, Clone, Default, Eq, PartialEq)]
/// # Dump Hardware Entry.
///
/// One entry per drive used across the life of a resumed dump (a dump can
/// legitimately be resumed on different hardware; the sink records the
/// full history rather than overwriting it, mirroring how a checksummed
/// image format tracks its own provenance).
pub struct DumpHardware {
	/// # Manufacturer.
	pub manufacturer: String,

	/// # Model.
	pub model: String,

	/// # Firmware Revision.
	pub firmware: String,

	/// # Serial Number.
	pub serial: Option<String>,

	/// # Platform (Host OS Identifier).
	///
	/// Part of the `(manufacturer, model, serial, platform)` identity
	/// tuple a run reconciles its entry against (§3, §6).
	pub platform: String,

	/// # Software Name.
	pub software: String,

	/// # Software Version.
	pub software_version: String,

	/// # Extents Written By This Hardware (This Run).
	///
	/// Which LBAs this specific hardware entry actually contributed,
	/// not merely how many — so a resume record can answer "which
	/// extents did this drive write," the same question
	/// [`ResumeRecord::good`] answers for the dump as a whole.
	pub extents: Extents,

	/// # Last-Seen Timestamp (Unix Seconds).
	///
	/// Refreshed every time this entry is reconciled, so a resume record
	/// left untouched for months can be told apart from one still in
	/// active use.
	pub last_seen: u32,
}

impl DumpHardware {
	#[must_use]
	/// # Same Hardware Identity?
	///
	/// Runs reconcile onto an existing entry by manufacturer+model+
	/// serial+platform rather than appending a duplicate every time the
	/// same drive resumes the same dump (§3, §6).
	pub fn same_identity(&self, other: &Self) -> bool {
		self.manufacturer == other.manufacturer
			&& self.model == other.model
			&& self.serial == other.serial
			&& self.platform == other.platform
	}
}

impl DeSerialize for DumpHardware {
	fn deserialize_from<R: Read>(r: &mut R) -> Option<Self> {
		Some(Self {
			manufacturer: String::deserialize_from(r)?,
			model: String::deserialize_from(r)?,
			firmware: String::deserialize_from(r)?,
			serial: Option::<String>::deserialize_from(r)?,
			platform: String::deserialize_from(r)?,
			software: String::deserialize_from(r)?,
			software_version: String::deserialize_from(r)?,
			extents: decode_extents(r)?,
			last_seen: u32::deserialize_from(r)?,
		})
	}

	fn serialized_len(&self) -> usize {
		self.manufacturer.serialized_len()
			+ self.model.serialized_len()
			+ self.firmware.serialized_len()
			+ self.serial.serialized_len()
			+ self.platform.serialized_len()
			+ self.software.serialized_len()
			+ self.software_version.serialized_len()
			+ extents_serialized_len(&self.extents)
			+ self.last_seen.serialized_len()
	}

	fn serialize_into<W: Write>(&self, w: &mut W) -> Option<()> {
		self.manufacturer.serialize_into(w)?;
		self.model.serialize_into(w)?;
		self.firmware.serialize_into(w)?;
		self.serial.serialize_into(w)?;
		self.platform.serialize_into(w)?;
		self.software.serialize_into(w)?;
		self.software_version.serialize_into(w)?;
		encode_extents(&self.extents, w)?;
		self.last_seen.serialize_into(w)
	}
}



#[derive(Debug, Clone, Default, Eq, PartialEq)]
/// # Resume Record.
pub struct ResumeRecord {
	/// # Disc Identity (E.g. TOC-Derived Fingerprint).
	pub disc_id: String,

	/// # Lead-Out LBA (Sanity Check Against Re-Inserted Disc).
	pub lead_out: i32,

	/// # Next Block To Read.
	///
	/// Advanced only by the Dump Loop's forward phase (§4.4, §4.6); trim,
	/// retry, and partial recovery phases fill in [`ResumeRecord::good`]
	/// and drain [`ResumeRecord::bad`] without ever moving this backward
	/// or forward (invariant 3, §8).
	pub next_block: i32,

	/// # Good (Completed) Extents.
	pub good: Extents,

	/// # Bad Blocks Still Pending Recovery.
	pub bad: BadBlockSet,

	/// # Retry Passes Completed So Far.
	pub passes_done: u32,

	/// # Hardware History.
	pub hardware: Vec<DumpHardware>,
}

impl ResumeRecord {
	#[must_use]
	/// # New.
	///
	/// `start_block` is the first track's start LBA; a fresh dump has
	/// nothing read yet, so `next_block` begins there rather than at a
	/// hardcoded zero (a disc's first track need not start at LBA 0).
	pub fn new(disc_id: String, lead_out: i32, start_block: i32) -> Self {
		Self {
			disc_id,
			lead_out,
			next_block: start_block,
			good: Extents::new(),
			bad: BadBlockSet::new(),
			passes_done: 0,
			hardware: Vec::new(),
		}
	}

	/// # Verify Against A Currently-Mounted Disc.
	///
	/// ## Errors
	///
	/// Returns [`DumpError::ResumeInvalid`] if the disc identity or
	/// lead-out LBA doesn't match what this record was built against
	/// (invariant 4: a resume record must never be silently replayed
	/// against the wrong disc).
	pub fn verify(&self, disc_id: &str, lead_out: i32) -> Result<(), DumpError> {
		if self.disc_id == disc_id && self.lead_out == lead_out { Ok(()) }
		else { Err(DumpError::ResumeInvalid) }
	}

	/// # Encode To Bytes.
	///
	/// ## Errors
	///
	/// Returns [`DumpError::Bug`] if an internal write unexpectedly fails
	/// (writing into an in-memory `Vec` cannot fail any other way).
	pub fn encode(&self) -> Result<Vec<u8>, DumpError> {
		let mut body = Vec::new();
		self.disc_id.serialize_into(&mut body)
			.and_then(|()| self.lead_out.serialize_into(&mut body))
			.and_then(|()| encode_extents(&self.good, &mut body))
			.and_then(|()| encode_bad(&self.bad, &mut body))
			.and_then(|()| self.passes_done.serialize_into(&mut body))
			.and_then(|()| encode_hardware(&self.hardware, &mut body))
			.ok_or(DumpError::Bug("resume record encode failed"))?;

		let mut out = Vec::with_capacity(MAGIC.len() + 1 + body.len() + 4);
		out.extend_from_slice(&MAGIC);
		out.push(VERSION);
		out.extend_from_slice(&body);
		out.extend_from_slice(&crc32(&body).to_le_bytes());
		Ok(out)
	}

	/// # Decode From Bytes.
	///
	/// ## Errors
	///
	/// Returns [`DumpError::ResumeInvalid`] if the magic header, version,
	/// CRC32 trailer, or field layout don't check out.
	pub fn decode(raw: &[u8]) -> Result<Self, DumpError> {
		if raw.len() < MAGIC.len() + 1 + 4 || raw[..MAGIC.len()] != MAGIC {
			return Err(DumpError::ResumeInvalid);
		}
		let version = raw[MAGIC.len()];
		if version != VERSION { return Err(DumpError::ResumeInvalid); }

		let body_end = raw.len() - 4;
		let body = &raw[MAGIC.len() + 1..body_end];
		let stored_crc = u32::from_le_bytes(raw[body_end..].try_into().unwrap());
		if crc32(body) != stored_crc { return Err(DumpError::ResumeInvalid); }

		let mut cur = Cursor::new(body);
		let disc_id = String::deserialize_from(&mut cur).ok_or(DumpError::ResumeInvalid)?;
		let lead_out = i32::deserialize_from(&mut cur).ok_or(DumpError::ResumeInvalid)?;
		let next_block = i32::deserialize_from(&mut cur).ok_or(DumpError::ResumeInvalid)?;
		let good = decode_extents(&mut cur).ok_or(DumpError::ResumeInvalid)?;
		let bad = decode_bad(&mut cur).ok_or(DumpError::ResumeInvalid)?;
		let passes_done = u32::deserialize_from(&mut cur).ok_or(DumpError::ResumeInvalid)?;
		let hardware = decode_hardware(&mut cur).ok_or(DumpError::ResumeInvalid)?;

		Ok(Self { disc_id, lead_out, next_block, good, bad, passes_done, hardware })
	}
}



/// # CRC32 (IEEE).
fn crc32(data: &[u8]) -> u32 { crc32fast::hash(data) }

/// # Byte Length Of An Encoded [`Extents`].
fn extents_serialized_len(e: &Extents) -> usize {
	SIZE_U32 + e.ranges().count() * (SIZE_I32 * 2)
}

fn encode_extents<W: Write>(e: &Extents, w: &mut W) -> Option<()> {
	let ranges: Vec<(i32, i32)> = e.ranges().map(|r| (r.start, r.end)).collect();
	u32::try_from(ranges.len()).ok()?.serialize_into(w)?;
	for (start, end) in ranges {
		start.serialize_into(w)?;
		end.serialize_into(w)?;
	}
	Some(())
}

fn decode_extents<R: Read>(r: &mut R) -> Option<Extents> {
	let len = u32::deserialize_from(r)?;
	let mut out = Extents::new();
	for _ in 0..len {
		let start = i32::deserialize_from(r)?;
		let end = i32::deserialize_from(r)?;
		let span = end.checked_sub(start)?;
		out.insert_run(start, u32::try_from(span).ok()?);
	}
	Some(out)
}

fn encode_bad<W: Write>(b: &BadBlockSet, w: &mut W) -> Option<()> {
	use crate::extents::ScanDirection;
	let members: Vec<i32> = b.scan(ScanDirection::Forward).collect();
	u32::try_from(members.len()).ok()?.serialize_into(w)?;
	for lba in members { lba.serialize_into(w)?; }
	Some(())
}

fn decode_bad<R: Read>(r: &mut R) -> Option<BadBlockSet> {
	let len = u32::deserialize_from(r)?;
	let mut out = BadBlockSet::new();
	for _ in 0..len { out.insert(i32::deserialize_from(r)?); }
	Some(out)
}

fn encode_hardware<W: Write>(hw: &[DumpHardware], w: &mut W) -> Option<()> {
	u32::try_from(hw.len()).ok()?.serialize_into(w)?;
	for h in hw { h.serialize_into(w)?; }
	Some(())
}

fn decode_hardware<R: Read>(r: &mut R) -> Option<Vec<DumpHardware>> {
	let len = u32::deserialize_from(r)?;
	let mut out = Vec::with_capacity(len as usize);
	for _ in 0..len { out.push(DumpHardware::deserialize_from(r)?); }
	Some(out)
}



#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn t_roundtrip_empty() {
		let rec = ResumeRecord::new("disc-1".to_owned(), 360000, 0);
		let bytes = rec.encode().unwrap();
		let back = ResumeRecord::decode(&bytes).unwrap();
		assert_eq!(rec, back);
	}

	#[test]
	fn t_roundtrip_populated() {
		let mut rec = ResumeRecord::new("disc-2".to_owned(), 450000, 0);
		rec.good.insert_run(0, 1000);
		rec.bad.insert_run(1000, 5);
		rec.passes_done = 2;
		let mut extents = Extents::new();
		extents.insert_run(0, 1000);
		rec.hardware.push(DumpHardware {
			manufacturer: "Acme".to_owned(),
			model: "CD-9000".to_owned(),
			firmware: "1.0".to_owned(),
			serial: Some("XYZ".to_owned()),
			platform: "linux".to_owned(),
			software: "cddump".to_owned(),
			software_version: "0.1.0".to_owned(),
			extents,
			last_seen: 1_700_000_000,
		});
		let bytes = rec.encode().unwrap();
		let back = ResumeRecord::decode(&bytes).unwrap();
		assert_eq!(rec, back);
	}

	#[test]
	fn t_verify_mismatch() {
		let rec = ResumeRecord::new("disc-3".to_owned(), 100, 0);
		assert!(rec.verify("disc-3", 100).is_ok());
		assert_eq!(rec.verify("disc-3", 101), Err(DumpError::ResumeInvalid));
		assert_eq!(rec.verify("disc-4", 100), Err(DumpError::ResumeInvalid));
	}

	#[test]
	fn t_decode_rejects_bad_magic() {
		let bytes = vec![0_u8; 20];
		assert_eq!(ResumeRecord::decode(&bytes), Err(DumpError::ResumeInvalid));
	}

	#[test]
	fn t_hardware_same_identity() {
		let mut extents = Extents::new();
		extents.insert_run(0, 1000);
		let a = DumpHardware {
			manufacturer: "Acme".to_owned(),
			model: "CD-9000".to_owned(),
			firmware: "1.0".to_owned(),
			serial: Some("XYZ".to_owned()),
			platform: "linux".to_owned(),
			software: "cddump".to_owned(),
			software_version: "0.1.0".to_owned(),
			extents,
			last_seen: 1_700_000_000,
		};
		let mut b = a.clone();
		b.firmware = "2.0".to_owned();
		b.extents.insert_run(1000, 1000);
		assert!(a.same_identity(&b));

		let mut c = a.clone();
		c.platform = "windows".to_owned();
		assert!(!a.same_identity(&c));
	}

	#[test]
	fn t_decode_rejects_corrupt_crc() {
		let rec = ResumeRecord::new("disc-5".to_owned(), 200, 0);
		let mut bytes = rec.encode().unwrap();
		let last = bytes.len() - 1;
		bytes[last] ^= 0xFF;
		assert_eq!(ResumeRecord::decode(&bytes), Err(DumpError::ResumeInvalid));
	}
}
