//! `merge`/`split` of concatenated, length-prefixed wire records
//! (spec.md §4.3, testable property 2). Works identically for transaction
//! and block byte buffers since both start with a `u32` `total_length`.

use crate::error::WireError;

/// Concatenate already-encoded records. No-op beyond a single copy.
pub fn merge(records: &[Vec<u8>]) -> Vec<u8> {
    records.concat()
}

/// Split a concatenated stream back into individual records by repeatedly
/// reading the leading `u32` length. Stops exactly at the end of `data`;
/// any trailing partial record is an error.
pub fn split(data: &[u8]) -> Result<Vec<Vec<u8>>, WireError> {
    let mut records = Vec::new();
    let mut offset = 0usize;
    while offset < data.len() {
        if data.len() - offset < 4 {
            return Err(WireError::InvalidStream);
        }
        let total_length = u32::from_le_bytes(data[offset..offset + 4].try_into().unwrap()) as usize;
        let record_len = 4 + total_length;
        if offset + record_len > data.len() {
            return Err(WireError::InvalidStream);
        }
        records.push(data[offset..offset + record_len].to_vec());
        offset += record_len;
    }
    Ok(records)
}
