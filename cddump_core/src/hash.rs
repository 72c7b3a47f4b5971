/*!
# CD Dump: Hash/Checksum Sink

The hash/checksum engine lives outside this crate (§1: "consumed through
an interface"); this module defines the boundary the dump loop calls
into — `update(bytes)` as data streams by, `finalize()` once a track (or
the whole dump) closes out. No specific algorithm is implemented here
beyond a CRC32 reference sink used by this crate's own tests, the same
role `crc32fast` plays for checksums elsewhere in the teacher's code
(`chk.rs`'s AccurateRip verification).
*/

use crc32fast::Hasher as Crc32;



/// # Hash Sink.
///
/// A capability-set style interface (§9) over whatever checksum engine the
/// caller wires up — CRC32, MD5, SHA-family, xxHash, multiple at once.
/// The dump loop only ever calls [`HashSink::update`] and
/// [`HashSink::finalize`]; it has no idea which algorithms are running
/// underneath.
pub trait HashSink {
	/// # Update With A Chunk Of Bytes.
	///
	/// Called once per successfully read (or zero-filled placeholder)
	/// sector, in ascending LBA order, mirroring the order bytes land in
	/// the output image.
	fn update(&mut self, bytes: &[u8]);

	/// # Finalize.
	///
	/// Returns every algorithm's digest as an `(algorithm name, digest
	/// bytes)` pair. Takes `&mut self` rather than consuming the sink —
	/// the dump loop only ever holds a borrowed `&mut dyn HashSink` (the
	/// caller owns it, per §1's "external collaborator" framing), so a
	/// by-value `Box<Self>` signature would make this uncallable from
	/// [`crate::engine::DumpSession::run`]. Implementations that wrap a
	/// by-value-only hasher (like `crc32fast::Hasher`) take it with
	/// `std::mem::take` instead.
	fn finalize(&mut self) -> Vec<(String, Vec<u8>)>;
}



/// # No-Op Hash Sink.
///
/// Used when no checksum engine was wired up (e.g. the caller only wants
/// a fast raw dump); every call is free.
#[derive(Debug, Default)]
pub struct NullHashSink;

impl HashSink for NullHashSink {
	fn update(&mut self, _bytes: &[u8]) {}
	fn finalize(&mut self) -> Vec<(String, Vec<u8>)> { Vec::new() }
}



#[derive(Debug, Default)]
/// # CRC32 Hash Sink.
///
/// A minimal, always-available [`HashSink`] implementation; mainly useful
/// for tests and as a worked example of the trait's contract.
pub struct Crc32HashSink {
	/// # Running Hasher.
	hasher: Crc32,
}

impl Crc32HashSink {
	#[must_use]
	/// # New.
	pub fn new() -> Self { Self { hasher: Crc32::new() } }
}

impl HashSink for Crc32HashSink {
	fn update(&mut self, bytes: &[u8]) { self.hasher.update(bytes); }

	fn finalize(&mut self) -> Vec<(String, Vec<u8>)> {
		let taken = std::mem::take(&mut self.hasher);
		vec![("crc32".to_owned(), taken.finalize().to_be_bytes().to_vec())]
	}
}



#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn t_null_hash_sink() {
		let mut sink: Box<dyn HashSink> = Box::new(NullHashSink);
		sink.update(b"whatever");
		assert!(sink.finalize().is_empty());
	}

	#[test]
	fn t_crc32_hash_sink() {
		let mut sink: Box<dyn HashSink> = Box::new(Crc32HashSink::new());
		sink.update(b"hello");
		sink.update(b" world");
		let digests = sink.finalize();
		assert_eq!(digests.len(), 1);
		assert_eq!(digests[0].0, "crc32");

		let mut expected = Crc32::new();
		expected.update(b"hello world");
		assert_eq!(digests[0].1, expected.finalize().to_be_bytes().to_vec());
	}
}
