use crate::error::{RoostError, RoostResult};

/// Decoded value plus the number of bytes consumed.
pub type DecodedData<T> = (T, usize);

pub struct CommonCodec;

impl CommonCodec {
    pub fn encode_u8(data: u8) -> Vec<u8> {
        data.to_be_bytes().to_vec()
    }

    pub fn decode_u8(bytes: &[u8]) -> RoostResult<DecodedData<u8>> {
        if bytes.is_empty() {
            return Err(RoostError::Internal(
                "bytes length 0 is less than 1".to_string(),
            ));
        }
        Ok((bytes[0], 1))
    }

    pub fn encode_u16(data: u16) -> Vec<u8> {
        data.to_be_bytes().to_vec()
    }

    pub fn decode_u16(bytes: &[u8]) -> RoostResult<DecodedData<u16>> {
        if bytes.len() < 2 {
            return Err(RoostError::Internal(format!(
                "bytes length {} is less than 2",
                bytes.len()
            )));
        }
        Ok((u16::from_be_bytes([bytes[0], bytes[1]]), 2))
    }

    pub fn encode_u32(data: u32) -> Vec<u8> {
        data.to_be_bytes().to_vec()
    }

    pub fn decode_u32(bytes: &[u8]) -> RoostResult<DecodedData<u32>> {
        if bytes.len() < 4 {
            return Err(RoostError::Internal(format!(
                "bytes length {} is less than 4",
                bytes.len()
            )));
        }
        Ok((
            u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
            4,
        ))
    }

    pub fn encode_i32(data: i32) -> Vec<u8> {
        data.to_be_bytes().to_vec()
    }

    pub fn decode_i32(bytes: &[u8]) -> RoostResult<DecodedData<i32>> {
        if bytes.len() < 4 {
            return Err(RoostError::Internal(format!(
                "bytes length {} is less than 4",
                bytes.len()
            )));
        }
        Ok((
            i32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
            4,
        ))
    }

    pub fn encode_f64(data: f64) -> Vec<u8> {
        data.to_be_bytes().to_vec()
    }

    pub fn decode_f64(bytes: &[u8]) -> RoostResult<DecodedData<f64>> {
        if bytes.len() < 8 {
            return Err(RoostError::Internal(format!(
                "bytes length {} is less than 8",
                bytes.len()
            )));
        }
        let data = [
            bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7],
        ];
        Ok((f64::from_be_bytes(data), 8))
    }

    pub fn encode_fixed_bytes(data: &[u8]) -> Vec<u8> {
        data.to_vec()
    }

    pub fn decode_fixed_bytes(bytes: &[u8], len: usize) -> RoostResult<DecodedData<Vec<u8>>> {
        if bytes.len() < len {
            return Err(RoostError::Internal(format!(
                "bytes length {} is less than {}",
                bytes.len(),
                len
            )));
        }
        Ok((bytes[..len].to_vec(), len))
    }
}
