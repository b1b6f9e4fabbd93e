use std::cmp::Ordering;
use std::fmt::{Debug, Formatter};

use crate::error::{RoostError, RoostResult};
use crate::storage::codec::{CommonCodec, DecodedData};

/// Key type of an index, fixed at creation and recorded in the metadata
/// page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyType {
    Int32,
    Float64,
    Char10,
}

impl KeyType {
    pub fn to_u8(self) -> u8 {
        match self {
            KeyType::Int32 => 1,
            KeyType::Float64 => 2,
            KeyType::Char10 => 3,
        }
    }

    pub fn from_u8(tag: u8) -> RoostResult<Self> {
        match tag {
            1 => Ok(KeyType::Int32),
            2 => Ok(KeyType::Float64),
            3 => Ok(KeyType::Char10),
            _ => Err(RoostError::Storage(format!("invalid key type tag {}", tag))),
        }
    }

    /// Width of this key inside records and node pages.
    pub fn size(self) -> usize {
        match self {
            KeyType::Int32 => 4,
            KeyType::Float64 => 8,
            KeyType::Char10 => 10,
        }
    }
}

/// Fixed-width scalar key with a total order and a stable byte encoding.
pub trait IndexKey: Copy + Debug + 'static {
    const SIZE: usize;
    const KIND: KeyType;

    fn encode_into(&self, buf: &mut Vec<u8>);

    fn decode(bytes: &[u8]) -> RoostResult<DecodedData<Self>>;

    fn key_cmp(&self, other: &Self) -> Ordering;

    fn from_scalar(value: &ScalarKey) -> RoostResult<Self>;

    /// Extracts the key embedded in a relation record.
    fn from_record(record: &[u8], attr_byte_offset: u32) -> RoostResult<Self> {
        let offset = attr_byte_offset as usize;
        if record.len() < offset + Self::SIZE {
            return Err(RoostError::Storage(format!(
                "record of {} bytes has no {:?} key at offset {}",
                record.len(),
                Self::KIND,
                offset
            )));
        }
        Ok(Self::decode(&record[offset..])?.0)
    }
}

impl IndexKey for i32 {
    const SIZE: usize = 4;
    const KIND: KeyType = KeyType::Int32;

    fn encode_into(&self, buf: &mut Vec<u8>) {
        buf.extend(CommonCodec::encode_i32(*self));
    }

    fn decode(bytes: &[u8]) -> RoostResult<DecodedData<Self>> {
        CommonCodec::decode_i32(bytes)
    }

    fn key_cmp(&self, other: &Self) -> Ordering {
        self.cmp(other)
    }

    fn from_scalar(value: &ScalarKey) -> RoostResult<Self> {
        match value {
            ScalarKey::Int32(v) => Ok(*v),
            other => Err(key_type_mismatch(KeyType::Int32, other)),
        }
    }
}

impl IndexKey for f64 {
    const SIZE: usize = 8;
    const KIND: KeyType = KeyType::Float64;

    fn encode_into(&self, buf: &mut Vec<u8>) {
        buf.extend(CommonCodec::encode_f64(*self));
    }

    fn decode(bytes: &[u8]) -> RoostResult<DecodedData<Self>> {
        CommonCodec::decode_f64(bytes)
    }

    // IEEE total order so NaN keys cannot poison node ordering
    fn key_cmp(&self, other: &Self) -> Ordering {
        self.total_cmp(other)
    }

    fn from_scalar(value: &ScalarKey) -> RoostResult<Self> {
        match value {
            ScalarKey::Float64(v) => Ok(*v),
            other => Err(key_type_mismatch(KeyType::Float64, other)),
        }
    }
}

/// Fixed 10-byte string key, null-padded, ordered bytewise.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Char10(pub [u8; 10]);

impl Char10 {
    pub fn as_bytes(&self) -> &[u8; 10] {
        &self.0
    }
}

impl From<&str> for Char10 {
    fn from(s: &str) -> Self {
        let mut bytes = [0u8; 10];
        let len = s.len().min(10);
        bytes[..len].copy_from_slice(&s.as_bytes()[..len]);
        Char10(bytes)
    }
}

impl Debug for Char10 {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let end = self.0.iter().position(|b| *b == 0).unwrap_or(10);
        write!(f, "Char10({:?})", String::from_utf8_lossy(&self.0[..end]))
    }
}

impl IndexKey for Char10 {
    const SIZE: usize = 10;
    const KIND: KeyType = KeyType::Char10;

    fn encode_into(&self, buf: &mut Vec<u8>) {
        buf.extend(CommonCodec::encode_fixed_bytes(&self.0));
    }

    fn decode(bytes: &[u8]) -> RoostResult<DecodedData<Self>> {
        let (raw, consumed) = CommonCodec::decode_fixed_bytes(bytes, 10)?;
        let mut data = [0u8; 10];
        data.copy_from_slice(&raw);
        Ok((Char10(data), consumed))
    }

    fn key_cmp(&self, other: &Self) -> Ordering {
        self.cmp(other)
    }

    fn from_scalar(value: &ScalarKey) -> RoostResult<Self> {
        match value {
            ScalarKey::Char10(v) => Ok(*v),
            other => Err(key_type_mismatch(KeyType::Char10, other)),
        }
    }
}

/// Tagged key value crossing the public index surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScalarKey {
    Int32(i32),
    Float64(f64),
    Char10(Char10),
}

impl ScalarKey {
    pub fn key_type(&self) -> KeyType {
        match self {
            ScalarKey::Int32(_) => KeyType::Int32,
            ScalarKey::Float64(_) => KeyType::Float64,
            ScalarKey::Char10(_) => KeyType::Char10,
        }
    }
}

impl From<i32> for ScalarKey {
    fn from(v: i32) -> Self {
        ScalarKey::Int32(v)
    }
}

impl From<f64> for ScalarKey {
    fn from(v: f64) -> Self {
        ScalarKey::Float64(v)
    }
}

impl From<Char10> for ScalarKey {
    fn from(v: Char10) -> Self {
        ScalarKey::Char10(v)
    }
}

impl From<&str> for ScalarKey {
    fn from(v: &str) -> Self {
        ScalarKey::Char10(Char10::from(v))
    }
}

fn key_type_mismatch(expected: KeyType, got: &ScalarKey) -> RoostError {
    RoostError::Internal(format!(
        "index keys are {:?}, got a {:?} value",
        expected,
        got.key_type()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_codec_roundtrip() {
        let mut buf = vec![];
        (-42i32).encode_into(&mut buf);
        assert_eq!(i32::decode(&buf).unwrap(), (-42, 4));

        let mut buf = vec![];
        (1.5f64).encode_into(&mut buf);
        assert_eq!(f64::decode(&buf).unwrap(), (1.5, 8));

        let mut buf = vec![];
        Char10::from("hello").encode_into(&mut buf);
        assert_eq!(Char10::decode(&buf).unwrap().0, Char10::from("hello"));
    }

    #[test]
    fn float_keys_totally_ordered() {
        assert_eq!(1.0f64.key_cmp(&2.0), Ordering::Less);
        assert_eq!(f64::NAN.key_cmp(&f64::NAN), Ordering::Equal);
        assert_eq!(f64::NAN.key_cmp(&f64::INFINITY), Ordering::Greater);
    }

    #[test]
    fn char10_pads_and_truncates() {
        assert_eq!(Char10::from("ab").0, *b"ab\0\0\0\0\0\0\0\0");
        assert_eq!(Char10::from("abcdefghijkl").0, *b"abcdefghij");
        assert!(Char10::from("abc") < Char10::from("abd"));
    }

    #[test]
    fn from_record_reads_at_offset() {
        let mut record = vec![0u8; 4];
        (77i32).encode_into(&mut record);
        record.extend([9u8; 3]);
        assert_eq!(i32::from_record(&record, 4).unwrap(), 77);
        assert!(i32::from_record(&record, 8).is_err());
    }

    #[test]
    fn scalar_mismatch_is_rejected() {
        assert!(i32::from_scalar(&ScalarKey::Float64(1.0)).is_err());
        assert_eq!(i32::from_scalar(&ScalarKey::Int32(3)).unwrap(), 3);
    }
}
