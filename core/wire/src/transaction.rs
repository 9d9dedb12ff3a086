//! Transaction wire layout (spec.md §3.1, §4.3).
//!
//! ```text
//!  0..4    total_length:u32
//!  4..5    version:u8           (must equal 1)
//!  5..21   transaction_id:[u8;16]
//! 21..53   contract_hash:[u8;32]
//! 53..61   valid_till:u64
//! 61..N    payload: UTF-8 bytes (0 <= N-61 <= 100_000)
//!  N..N+64 signature:[u8;64]
//! N+64..   public_key:[u8;33]
//! ```

use chainproc_crypto::encoding::decode_safe_u64;
use chainproc_crypto::hash::hash256;
use chainproc_crypto::{Address, Hash256, PrivateKey, PublicKey, Signature};

use crate::error::WireError;

pub const VERSION: u8 = 1;
/// version(1) + transaction_id(16) + contract_hash(32) + valid_till(8) +
/// signature(64) + public_key(33).
const FIXED_TAIL_LEN: usize = 1 + 16 + 32 + 8 + 64 + 33;
const MAX_PAYLOAD_LEN: usize = 100_000;

/// All-zeros reserved contract hash: the built-in create-contract handler.
pub const CREATE_CONTRACT_HASH: Hash256 = [0u8; 32];
/// All-ones reserved contract hash: the built-in delete-contract handler.
pub const DELETE_CONTRACT_HASH: Hash256 = [0xffu8; 32];

/// An immutable, byte-exact transaction record. Once constructed (either
/// from raw bytes or from fields) it never changes (spec.md §3.5).
#[derive(Debug, Clone)]
pub struct Transaction {
    bytes: Vec<u8>,
    transaction_id: [u8; 16],
    contract_hash: Hash256,
    valid_till: u64,
    payload: String,
    signature: Signature,
    public_key: PublicKey,
}

impl Transaction {
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, WireError> {
        if bytes.len() < 4 {
            return Err(WireError::ShortBuffer);
        }
        let total_length = u32::from_le_bytes(bytes[0..4].try_into().unwrap()) as usize;
        if bytes.len() != 4 + total_length {
            return Err(WireError::InvalidTxFraming);
        }
        if total_length < FIXED_TAIL_LEN {
            return Err(WireError::InvalidTxFraming);
        }
        let version = bytes[4];
        if version != VERSION {
            return Err(WireError::UnsupportedVersion);
        }

        let mut transaction_id = [0u8; 16];
        transaction_id.copy_from_slice(&bytes[5..21]);

        let mut contract_hash = [0u8; 32];
        contract_hash.copy_from_slice(&bytes[21..53]);

        let valid_till = decode_safe_u64(&bytes[53..61]).map_err(|_| WireError::InvalidValidTill)?;

        let payload_length = total_length - FIXED_TAIL_LEN;
        if payload_length > MAX_PAYLOAD_LEN {
            return Err(WireError::PayloadTooLarge);
        }
        let payload_start = 61;
        let payload_end = payload_start + payload_length;
        let payload = String::from_utf8(bytes[payload_start..payload_end].to_vec())
            .map_err(|_| WireError::InvalidTxFraming)?;

        let sig_start = payload_end;
        let mut sig_bytes = [0u8; 64];
        sig_bytes.copy_from_slice(&bytes[sig_start..sig_start + 64]);
        let signature = Signature::from_bytes(sig_bytes);

        let pk_start = sig_start + 64;
        let mut pk_bytes = [0u8; 33];
        pk_bytes.copy_from_slice(&bytes[pk_start..pk_start + 33]);
        if pk_bytes[0] != 0x02 && pk_bytes[0] != 0x03 {
            return Err(WireError::InvalidPublicKey);
        }
        let public_key = PublicKey::from_bytes(&pk_bytes).map_err(|_| WireError::InvalidPublicKey)?;

        Ok(Transaction {
            bytes,
            transaction_id,
            contract_hash,
            valid_till,
            payload,
            signature,
            public_key,
        })
    }

    /// Build and sign a new transaction from its logical fields.
    pub fn from_fields(
        transaction_id: [u8; 16],
        contract_hash: Hash256,
        valid_till: u64,
        payload: &str,
        sign_prefix: &[u8],
        private_key: &PrivateKey,
    ) -> Result<Self, WireError> {
        if payload.len() > MAX_PAYLOAD_LEN {
            return Err(WireError::PayloadTooLarge);
        }
        if valid_till > chainproc_crypto::encoding::MAX_SAFE_INTEGER {
            return Err(WireError::InvalidValidTill);
        }

        let public_key = private_key.public_key();
        let total_length = FIXED_TAIL_LEN + payload.len();

        let mut unsigned = Vec::with_capacity(4 + total_length - 97);
        unsigned.extend_from_slice(&(total_length as u32).to_le_bytes());
        unsigned.push(VERSION);
        unsigned.extend_from_slice(&transaction_id);
        unsigned.extend_from_slice(&contract_hash);
        unsigned.extend_from_slice(&valid_till.to_le_bytes());
        unsigned.extend_from_slice(payload.as_bytes());

        let digest = signable_digest(sign_prefix, &unsigned[4..]);
        let signature = private_key.sign_digest(&digest);

        let mut bytes = unsigned;
        bytes.extend_from_slice(&signature.to_bytes());
        bytes.extend_from_slice(&public_key.to_bytes());

        Self::from_bytes(bytes)
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn version(&self) -> u8 {
        VERSION
    }

    pub fn transaction_id(&self) -> [u8; 16] {
        self.transaction_id
    }

    pub fn contract_hash(&self) -> Hash256 {
        self.contract_hash
    }

    pub fn valid_till(&self) -> u64 {
        self.valid_till
    }

    pub fn payload(&self) -> &str {
        &self.payload
    }

    pub fn signature(&self) -> Signature {
        self.signature
    }

    pub fn public_key(&self) -> PublicKey {
        self.public_key
    }

    pub fn from_address(&self) -> Address {
        self.public_key.address()
    }

    pub fn is_create_contract(&self) -> bool {
        self.contract_hash == CREATE_CONTRACT_HASH
    }

    pub fn is_delete_contract(&self) -> bool {
        self.contract_hash == DELETE_CONTRACT_HASH
    }

    /// HASH256(sign_prefix || data[4..-97]) — the transaction's identity
    /// hash and the digest the signature covers.
    pub fn hash(&self, sign_prefix: &[u8]) -> Hash256 {
        let body_end = self.bytes.len() - 97;
        signable_digest(sign_prefix, &self.bytes[4..body_end])
    }

    pub fn verify_signature(&self, sign_prefix: &[u8]) -> bool {
        let digest = self.hash(sign_prefix);
        self.public_key.verify_digest(&digest, &self.signature)
    }
}

fn signable_digest(sign_prefix: &[u8], body: &[u8]) -> Hash256 {
    let mut preimage = Vec::with_capacity(sign_prefix.len() + body.len());
    preimage.extend_from_slice(sign_prefix);
    preimage.extend_from_slice(body);
    hash256(&preimage)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(payload: &str) -> (Transaction, PrivateKey) {
        let priv_key = PrivateKey::generate();
        let tx = Transaction::from_fields(
            [7u8; 16],
            [9u8; 32],
            0,
            payload,
            b"test-prefix",
            &priv_key,
        )
        .unwrap();
        (tx, priv_key)
    }

    #[test]
    fn round_trip_bytes() {
        let (tx, _) = sample("{\"a\":1}");
        let decoded = Transaction::from_bytes(tx.bytes().to_vec()).unwrap();
        assert_eq!(decoded.bytes(), tx.bytes());
        assert_eq!(decoded.payload(), tx.payload());
    }

    #[test]
    fn signature_verifies_against_prefix() {
        let (tx, _) = sample("{}");
        assert!(tx.verify_signature(b"test-prefix"));
        assert!(!tx.verify_signature(b"other-prefix"));
    }

    #[test]
    fn flipping_signature_byte_invalidates() {
        let (tx, _) = sample("{}");
        let mut bytes = tx.bytes().to_vec();
        let sig_offset = bytes.len() - 97;
        bytes[sig_offset] ^= 0x01;
        let tampered = Transaction::from_bytes(bytes).unwrap();
        assert!(!tampered.verify_signature(b"test-prefix"));
    }

    #[test]
    fn rejects_wrong_version() {
        let (tx, _) = sample("{}");
        let mut bytes = tx.bytes().to_vec();
        bytes[4] = 2;
        assert_eq!(Transaction::from_bytes(bytes), Err(WireError::UnsupportedVersion));
    }

    #[test]
    fn rejects_oversized_payload() {
        let huge_payload = "a".repeat(MAX_PAYLOAD_LEN + 1);
        let priv_key = PrivateKey::generate();
        let err = Transaction::from_fields([0u8; 16], [0u8; 32], 0, &huge_payload, b"p", &priv_key)
            .unwrap_err();
        assert_eq!(err, WireError::PayloadTooLarge);
    }

    #[test]
    fn rejects_short_buffer() {
        assert_eq!(Transaction::from_bytes(vec![1, 2]), Err(WireError::ShortBuffer));
    }

    #[test]
    fn rejects_truncated_framing() {
        let (tx, _) = sample("{}");
        let mut bytes = tx.bytes().to_vec();
        bytes.truncate(bytes.len() - 1);
        assert_eq!(Transaction::from_bytes(bytes), Err(WireError::InvalidTxFraming));
    }

    #[test]
    fn reserved_hashes_are_recognized() {
        let priv_key = PrivateKey::generate();
        let create = Transaction::from_fields([0u8; 16], CREATE_CONTRACT_HASH, 0, "{}", b"p", &priv_key).unwrap();
        let delete = Transaction::from_fields([0u8; 16], DELETE_CONTRACT_HASH, 0, "{}", b"p", &priv_key).unwrap();
        assert!(create.is_create_contract());
        assert!(delete.is_delete_contract());
    }
}
