/*!
# CD Dump: De/Serialization

Hand-rolled binary (de)serialization for the on-disk records
([`crate::resume::ResumeRecord`], the MHDD/IBG rate logs). Used instead of
`serde`/`bincode` for the same reason a disc-dump engine cares about any
other on-disk format: explicit control over byte layout and forward
compatibility via a magic header + version byte, rather than whatever a
derive macro happens to produce this week.
*/

use std::io::{
	Read,
	Write,
};



/// # Size Of u8.
pub(crate) const SIZE_U8: usize = std::mem::size_of::<u8>();

/// # Size Of u16.
pub(crate) const SIZE_U16: usize = std::mem::size_of::<u16>();

/// # Size Of u32.
pub(crate) const SIZE_U32: usize = std::mem::size_of::<u32>();

/// # Size Of u64.
pub(crate) const SIZE_U64: usize = std::mem::size_of::<u64>();

/// # Size Of i32.
pub(crate) const SIZE_I32: usize = std::mem::size_of::<i32>();



/// # Read/Write Binary Serialization.
///
/// All operations are `Read`/`Write`-based to allow flexible chaining
/// across the handful of record types that need this (resume record,
/// rate-log entries).
pub(crate) trait DeSerialize: Sized {
	/// # Deserialize From Reader.
	fn deserialize_from<R: Read>(r: &mut R) -> Option<Self>;

	/// # Serialized Length.
	fn serialized_len(&self) -> usize { std::mem::size_of::<Self>() }

	/// # Serialize Into Writer.
	fn serialize_into<W: Write>(&self, w: &mut W) -> Option<()>;
}



/// # De/Serialize Primitive Integer Types.
macro_rules! int {
	($ty:ty) => (
		impl DeSerialize for $ty {
			fn deserialize_from<R: Read>(r: &mut R) -> Option<Self> {
				let mut buf = [0_u8; std::mem::size_of::<Self>()];
				r.read_exact(&mut buf).ok()?;
				Some(Self::from_le_bytes(buf))
			}

			fn serialize_into<W: Write>(&self, w: &mut W) -> Option<()> {
				w.write_all(self.to_le_bytes().as_slice()).ok()
			}
		}
	);
}

int!(u8);
int!(u16);
int!(u32);
int!(u64);
int!(i32);

impl DeSerialize for bool {
	fn deserialize_from<R: Read>(r: &mut R) -> Option<Self> {
		u8::deserialize_from(r).map(|v| v == 1)
	}

	fn serialized_len(&self) -> usize { SIZE_U8 }

	fn serialize_into<W: Write>(&self, w: &mut W) -> Option<()> {
		u8::from(*self).serialize_into(w)
	}
}

impl DeSerialize for f64 {
	fn deserialize_from<R: Read>(r: &mut R) -> Option<Self> {
		let mut buf = [0_u8; 8];
		r.read_exact(&mut buf).ok()?;
		Some(Self::from_le_bytes(buf))
	}

	fn serialize_into<W: Write>(&self, w: &mut W) -> Option<()> {
		w.write_all(self.to_le_bytes().as_slice()).ok()
	}
}

impl<T: DeSerialize> DeSerialize for Option<T> {
	fn deserialize_from<R: Read>(r: &mut R) -> Option<Self> {
		let any = bool::deserialize_from(r)?;
		if any { T::deserialize_from(r).map(Some) } else { Some(None) }
	}

	fn serialized_len(&self) -> usize {
		self.as_ref().map_or(SIZE_U8, |t| SIZE_U8 + t.serialized_len())
	}

	fn serialize_into<W: Write>(&self, w: &mut W) -> Option<()> {
		match self {
			None => false.serialize_into(w),
			Some(t) => {
				true.serialize_into(w)?;
				t.serialize_into(w)
			},
		}
	}
}

/// # Length-Prefixed Byte Vector.
impl DeSerialize for Vec<u8> {
	fn deserialize_from<R: Read>(r: &mut R) -> Option<Self> {
		let len = u32::deserialize_from(r)? as usize;
		let mut buf = vec![0_u8; len];
		r.read_exact(&mut buf).ok()?;
		Some(buf)
	}

	fn serialized_len(&self) -> usize { SIZE_U32 + self.len() }

	fn serialize_into<W: Write>(&self, w: &mut W) -> Option<()> {
		u32::try_from(self.len()).ok()?.serialize_into(w)?;
		w.write_all(self).ok()
	}
}

/// # Length-Prefixed UTF-8 String.
impl DeSerialize for String {
	fn deserialize_from<R: Read>(r: &mut R) -> Option<Self> {
		let raw = Vec::<u8>::deserialize_from(r)?;
		Self::from_utf8(raw).ok()
	}

	fn serialized_len(&self) -> usize { SIZE_U32 + self.len() }

	fn serialize_into<W: Write>(&self, w: &mut W) -> Option<()> {
		self.as_bytes().to_vec().serialize_into(w)
	}
}



#[cfg(test)]
mod test {
	use super::*;
	use std::io::Cursor;

	fn roundtrip<T: DeSerialize + PartialEq + std::fmt::Debug>(v: T) {
		let mut buf = Vec::new();
		v.serialize_into(&mut buf).expect("serialize should succeed");
		assert_eq!(buf.len(), v.serialized_len());
		let mut r = Cursor::new(buf.as_slice());
		let de = T::deserialize_from(&mut r).expect("deserialize should succeed");
		assert_eq!(v, de);
	}

	#[test]
	fn t_roundtrip_primitives() {
		roundtrip(7_u8);
		roundtrip(1234_u16);
		roundtrip(u32::MAX);
		roundtrip(u64::MAX);
		roundtrip(-42_i32);
		roundtrip(true);
		roundtrip(false);
		roundtrip(3.5_f64);
	}

	#[test]
	fn t_roundtrip_option() {
		roundtrip(Some(5_u32));
		roundtrip(None::<u32>);
	}

	#[test]
	fn t_roundtrip_bytes_and_string() {
		roundtrip(vec![1_u8, 2, 3, 4]);
		roundtrip(Vec::<u8>::new());
		roundtrip("hello world".to_owned());
		roundtrip(String::new());
	}
}
