//! Block wire layout (spec.md §3.2, §4.3).
//!
//! ```text
//!  0..4    total_length:u32
//!  4..5    version:u8           (must equal 1)
//!  5..13   block_id:u64
//! 13..45   previous_block_hash:[u8;32]
//! 45..53   processed_ts:u64
//! 53..M    transactions:bytes   (concatenated framed transaction records)
//!  M..M+64 signature:[u8;64]
//! ```

use chainproc_crypto::encoding::decode_safe_u64;
use chainproc_crypto::hash::hash256;
use chainproc_crypto::{Hash256, PrivateKey, PublicKey, Signature};

use crate::error::WireError;
use crate::stream;
use crate::transaction::Transaction;

pub const VERSION: u8 = 1;
/// version(1) + block_id(8) + previous_block_hash(32) + processed_ts(8).
const HEADER_LEN: usize = 1 + 8 + 32 + 8;
const SIGNATURE_LEN: usize = 64;

#[derive(Debug, Clone)]
pub struct Block {
    bytes: Vec<u8>,
    block_id: u64,
    previous_block_hash: Hash256,
    processed_ts: u64,
    transaction_records: Vec<Vec<u8>>,
    signature: Signature,
}

impl Block {
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, WireError> {
        if bytes.len() < 4 {
            return Err(WireError::ShortBuffer);
        }
        let total_length = u32::from_le_bytes(bytes[0..4].try_into().unwrap()) as usize;
        if bytes.len() != 4 + total_length {
            return Err(WireError::InvalidBlockFraming);
        }
        if total_length < HEADER_LEN + SIGNATURE_LEN {
            return Err(WireError::InvalidBlockFraming);
        }
        let version = bytes[4];
        if version != VERSION {
            return Err(WireError::UnsupportedVersion);
        }

        let block_id = decode_safe_u64(&bytes[5..13]).map_err(|_| WireError::InvalidBlockFraming)?;

        let mut previous_block_hash = [0u8; 32];
        previous_block_hash.copy_from_slice(&bytes[13..45]);

        let processed_ts = decode_safe_u64(&bytes[45..53]).map_err(|_| WireError::InvalidBlockFraming)?;

        let signature_start = bytes.len() - SIGNATURE_LEN;
        let transaction_records = stream::split(&bytes[53..signature_start])
            .map_err(|_| WireError::InvalidBlockFraming)?;

        let mut signature_bytes = [0u8; 64];
        signature_bytes.copy_from_slice(&bytes[signature_start..]);
        let signature = Signature::from_bytes(signature_bytes);

        Ok(Block {
            bytes,
            block_id,
            previous_block_hash,
            processed_ts,
            transaction_records,
            signature,
        })
    }

    pub fn from_fields(
        block_id: u64,
        previous_block_hash: Hash256,
        processed_ts: u64,
        transactions: &[Transaction],
        sign_prefix: &[u8],
        private_key: &PrivateKey,
    ) -> Result<Self, WireError> {
        if block_id > chainproc_crypto::encoding::MAX_SAFE_INTEGER
            || processed_ts > chainproc_crypto::encoding::MAX_SAFE_INTEGER
        {
            return Err(WireError::InvalidBlockFraming);
        }

        let tx_bytes: Vec<Vec<u8>> = transactions.iter().map(|tx| tx.bytes().to_vec()).collect();
        let tx_region = stream::merge(&tx_bytes);
        let total_length = HEADER_LEN + tx_region.len() + SIGNATURE_LEN;

        let mut unsigned = Vec::with_capacity(4 + total_length - SIGNATURE_LEN);
        unsigned.extend_from_slice(&(total_length as u32).to_le_bytes());
        unsigned.push(VERSION);
        unsigned.extend_from_slice(&block_id.to_le_bytes());
        unsigned.extend_from_slice(&previous_block_hash);
        unsigned.extend_from_slice(&processed_ts.to_le_bytes());
        unsigned.extend_from_slice(&tx_region);

        let digest = signable_digest(sign_prefix, &unsigned[4..]);
        let signature = private_key.sign_digest(&digest);

        let mut bytes = unsigned;
        bytes.extend_from_slice(&signature.to_bytes());

        Self::from_bytes(bytes)
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn version(&self) -> u8 {
        VERSION
    }

    pub fn block_id(&self) -> u64 {
        self.block_id
    }

    pub fn previous_block_hash(&self) -> Hash256 {
        self.previous_block_hash
    }

    pub fn processed_ts(&self) -> u64 {
        self.processed_ts
    }

    pub fn signature(&self) -> Signature {
        self.signature
    }

    pub fn transactions_amount(&self) -> usize {
        self.transaction_records.len()
    }

    pub fn transactions(&self) -> Result<Vec<Transaction>, WireError> {
        self.transaction_records
            .iter()
            .map(|record| Transaction::from_bytes(record.clone()))
            .collect()
    }

    /// HASH256(sign_prefix || data[4..-64]).
    pub fn hash(&self, sign_prefix: &[u8]) -> Hash256 {
        let body_end = self.bytes.len() - SIGNATURE_LEN;
        signable_digest(sign_prefix, &self.bytes[4..body_end])
    }

    pub fn verify_signature(&self, sign_prefix: &[u8], public_key: &PublicKey) -> bool {
        let digest = self.hash(sign_prefix);
        public_key.verify_digest(&digest, &self.signature)
    }

    /// Validates chain linkage per spec.md §4.3: genesis must chain to
    /// all-zeros with id 0; otherwise id, hash and monotonic timestamp
    /// must all agree with `prev`. Raises `NotPrevious` on an id mismatch;
    /// returns `Ok(false)` for a hash/timestamp mismatch.
    pub fn verify_with_previous_block(&self, prev: Option<&Block>, sign_prefix: &[u8]) -> Result<bool, WireError> {
        match prev {
            None => Ok(self.block_id == 0 && self.previous_block_hash == [0u8; 32]),
            Some(prev) => {
                if prev.block_id + 1 != self.block_id {
                    return Err(WireError::NotPrevious);
                }
                let expected_hash = prev.hash(sign_prefix);
                Ok(self.previous_block_hash == expected_hash && self.processed_ts > prev.processed_ts)
            }
        }
    }
}

fn signable_digest(sign_prefix: &[u8], body: &[u8]) -> Hash256 {
    let mut preimage = Vec::with_capacity(sign_prefix.len() + body.len());
    preimage.extend_from_slice(sign_prefix);
    preimage.extend_from_slice(body);
    hash256(&preimage)
}
