//! Base58(check), base64, hex and the bounded integer wire codecs.
//!
//! `uLong` mirrors the original JS library's only safe way to carry a
//! 64-bit-wide counter through a double: 53 usable bits, encoded across 8
//! little-endian bytes with the top 11 bits always zero.

use thiserror::Error;

/// 2^53 - 1, the largest integer a JS `number` can represent exactly.
pub const MAX_SAFE_INTEGER: u64 = (1u64 << 53) - 1;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EncodingError {
    #[error("value {0} exceeds the maximum safe integer (2^53 - 1)")]
    NotSafeInteger(u64),
    #[error("invalid base58 string")]
    InvalidBase58,
    #[error("invalid base58check checksum")]
    InvalidChecksum,
    #[error("invalid base64 string")]
    InvalidBase64,
    #[error("invalid hex string")]
    InvalidHex,
    #[error("buffer too short: need {need} bytes, have {have}")]
    ShortBuffer { need: usize, have: usize },
}

pub fn encode_hex(data: &[u8]) -> String {
    hex::encode(data)
}

pub fn decode_hex(s: &str) -> Result<Vec<u8>, EncodingError> {
    hex::decode(s).map_err(|_| EncodingError::InvalidHex)
}

/// Even-length hex, matching the `hex` payload template tag (spec.md §4.4).
pub fn is_valid_hex(s: &str) -> bool {
    s.len() % 2 == 0 && s.bytes().all(|b| b.is_ascii_hexdigit())
}

pub fn encode_base64(data: &[u8]) -> String {
    use base64::Engine;
    base64::engine::general_purpose::STANDARD.encode(data)
}

pub fn decode_base64(s: &str) -> Result<Vec<u8>, EncodingError> {
    use base64::Engine;
    base64::engine::general_purpose::STANDARD
        .decode(s)
        .map_err(|_| EncodingError::InvalidBase64)
}

pub fn is_valid_base64(s: &str) -> bool {
    decode_base64(s).is_ok()
}

/// Bitcoin-alphabet base58, no checksum.
pub fn encode_base58(data: &[u8]) -> String {
    bs58::encode(data).into_string()
}

pub fn decode_base58(s: &str) -> Result<Vec<u8>, EncodingError> {
    bs58::decode(s).into_vec().map_err(|_| EncodingError::InvalidBase58)
}

/// base58check = base58(payload || HASH256(payload)[..4]).
pub fn encode_base58check(payload: &[u8]) -> String {
    bs58::encode(payload).with_check().into_string()
}

pub fn decode_base58check(s: &str) -> Result<Vec<u8>, EncodingError> {
    bs58::decode(s)
        .with_check(None)
        .into_vec()
        .map_err(|_| EncodingError::InvalidChecksum)
}

pub fn encode_u8(value: u8) -> [u8; 1] {
    [value]
}

pub fn encode_u16(value: u16) -> [u8; 2] {
    value.to_le_bytes()
}

pub fn encode_u32(value: u32) -> [u8; 4] {
    value.to_le_bytes()
}

pub fn decode_u32(bytes: &[u8]) -> Result<u32, EncodingError> {
    if bytes.len() < 4 {
        return Err(EncodingError::ShortBuffer { need: 4, have: bytes.len() });
    }
    Ok(u32::from_le_bytes(bytes[..4].try_into().unwrap()))
}

/// Encode a safe (<= 2^53-1) unsigned integer across 8 little-endian bytes.
/// The top 11 bits are always zero because a 53-bit value never needs them.
pub fn encode_safe_u64(value: u64) -> Result<[u8; 8], EncodingError> {
    if value > MAX_SAFE_INTEGER {
        return Err(EncodingError::NotSafeInteger(value));
    }
    Ok(value.to_le_bytes())
}

/// Decode and reject anything outside the safe-integer range, mirroring the
/// `Number.isSafeInteger` guard the wire layer relies on for construction.
pub fn decode_safe_u64(bytes: &[u8]) -> Result<u64, EncodingError> {
    if bytes.len() < 8 {
        return Err(EncodingError::ShortBuffer { need: 8, have: bytes.len() });
    }
    let value = u64::from_le_bytes(bytes[..8].try_into().unwrap());
    if value > MAX_SAFE_INTEGER {
        return Err(EncodingError::NotSafeInteger(value));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn safe_u64_round_trip() {
        let v = 123_456_789_012_345u64;
        let enc = encode_safe_u64(v).unwrap();
        assert_eq!(decode_safe_u64(&enc).unwrap(), v);
    }

    #[test]
    fn safe_u64_rejects_unsafe() {
        let unsafe_value = MAX_SAFE_INTEGER + 1;
        assert!(encode_safe_u64(unsafe_value).is_err());
        let bytes = unsafe_value.to_le_bytes();
        assert!(decode_safe_u64(&bytes).is_err());
    }

    #[test]
    fn base58check_round_trip() {
        let payload = [0x00u8; 21];
        let s = encode_base58check(&payload);
        assert_eq!(decode_base58check(&s).unwrap(), payload.to_vec());
    }

    #[test]
    fn base58check_rejects_flipped_checksum() {
        let payload = [1u8; 21];
        let mut s = encode_base58check(&payload);
        // Flip the last character, which lives inside the checksum tail.
        let last = s.pop().unwrap();
        let replacement = if last == '1' { '2' } else { '1' };
        s.push(replacement);
        assert!(decode_base58check(&s).is_err());
    }

    #[test]
    fn hex_validity() {
        assert!(is_valid_hex("a0b1"));
        assert!(!is_valid_hex("a0b")); // odd length
        assert!(!is_valid_hex("agrt")); // non-hex digit
    }

    #[test]
    fn base64_validity() {
        assert!(is_valid_base64("aGVsbG8="));
        assert!(!is_valid_base64("not base64!!"));
    }
}
