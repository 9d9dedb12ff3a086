//! secp256k1 keys, addresses and ECDSA sign/verify (spec.md §4.2).

use secp256k1::ecdsa::Signature as EcdsaSignature;
use secp256k1::{Message, PublicKey as Secp256k1PublicKey, Secp256k1, SecretKey};
use thiserror::Error;

use crate::encoding::{decode_base58check, encode_base58check, EncodingError};
use crate::hash::hash160;
use crate::{Hash160, Hash256};

const ADDRESS_VERSION: u8 = 0x00;
const WIF_VERSION: u8 = 0x80;
const WIF_COMPRESSED_FLAG: u8 = 0x01;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum KeyError {
    #[error("invalid private key")]
    InvalidPrivateKey,
    #[error("invalid public key")]
    InvalidPublicKey,
    #[error("invalid WIF string")]
    InvalidWif,
    #[error("invalid address string")]
    InvalidAddress,
    #[error("invalid signature")]
    InvalidSignature,
    #[error(transparent)]
    Encoding(#[from] EncodingError),
}

/// A 32-byte secp256k1 private key, addressable only through WIF or raw
/// bytes. Never (de)serialized via serde — private keys are not persisted
/// by the core (spec.md §3.5).
#[derive(Clone)]
pub struct PrivateKey(SecretKey);

impl PrivateKey {
    pub fn from_bytes(bytes: &[u8; 32]) -> Result<Self, KeyError> {
        SecretKey::from_slice(bytes)
            .map(PrivateKey)
            .map_err(|_| KeyError::InvalidPrivateKey)
    }

    /// Decode `base58check(0x80 || key || 0x01)`. Only the compressed-key
    /// flag and mainnet-style version byte above are accepted.
    pub fn from_wif(wif: &str) -> Result<Self, KeyError> {
        let raw = decode_base58check(wif).map_err(|_| KeyError::InvalidWif)?;
        if raw.len() != 34 || raw[0] != WIF_VERSION || raw[33] != WIF_COMPRESSED_FLAG {
            return Err(KeyError::InvalidWif);
        }
        let mut key = [0u8; 32];
        key.copy_from_slice(&raw[1..33]);
        Self::from_bytes(&key)
    }

    pub fn to_wif(&self) -> String {
        let mut payload = Vec::with_capacity(34);
        payload.push(WIF_VERSION);
        payload.extend_from_slice(&self.0.secret_bytes());
        payload.push(WIF_COMPRESSED_FLAG);
        encode_base58check(&payload)
    }

    pub fn public_key(&self) -> PublicKey {
        let secp = Secp256k1::signing_only();
        let pk = Secp256k1PublicKey::from_secret_key(&secp, &self.0);
        PublicKey(pk)
    }

    pub fn generate() -> Self {
        let secp = Secp256k1::new();
        let (sk, _) = secp.generate_keypair(&mut rand::thread_rng());
        PrivateKey(sk)
    }

    /// ECDSA-sign a message digest, returning the fixed 64-byte `r || s`
    /// compact encoding (spec.md §4.2). The caller is responsible for
    /// reducing its message to a 32-byte digest first; wire-layer hashes
    /// (HASH256 of the signable pre-image) are already final digests, so
    /// no further hashing happens inside `sign_digest`.
    pub fn sign_digest(&self, digest: &Hash256) -> Signature {
        let secp = Secp256k1::signing_only();
        let message = Message::from_digest_slice(digest).expect("digest is exactly 32 bytes");
        let sig = secp.sign_ecdsa(&message, &self.0);
        Signature(sig.serialize_compact())
    }

    /// Convenience for signing an arbitrary-length message: hashes with a
    /// single SHA-256 pass, then signs the digest.
    pub fn sign_message(&self, message: &[u8]) -> Signature {
        self.sign_digest(&crate::hash::sha256(message))
    }
}

/// A compressed secp256k1 public key (33 bytes).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublicKey(Secp256k1PublicKey);

impl PublicKey {
    pub fn from_bytes(bytes: &[u8; 33]) -> Result<Self, KeyError> {
        if bytes[0] != 0x02 && bytes[0] != 0x03 {
            return Err(KeyError::InvalidPublicKey);
        }
        Secp256k1PublicKey::from_slice(bytes)
            .map(PublicKey)
            .map_err(|_| KeyError::InvalidPublicKey)
    }

    pub fn to_bytes(&self) -> [u8; 33] {
        self.0.serialize()
    }

    pub fn address(&self) -> Address {
        Address::from_public_key(self)
    }

    pub fn verify_digest(&self, digest: &Hash256, signature: &Signature) -> bool {
        let secp = Secp256k1::verification_only();
        let message = match Message::from_digest_slice(digest) {
            Ok(m) => m,
            Err(_) => return false,
        };
        let sig = match EcdsaSignature::from_compact(&signature.0) {
            Ok(s) => s,
            Err(_) => return false,
        };
        secp.verify_ecdsa(&message, &sig, &self.0).is_ok()
    }

    pub fn verify_message(&self, message: &[u8], signature: &Signature) -> bool {
        self.verify_digest(&crate::hash::sha256(message), signature)
    }
}

/// Fixed 64-byte `r || s` ECDSA signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Signature([u8; 64]);

impl Signature {
    pub fn from_bytes(bytes: [u8; 64]) -> Self {
        Signature(bytes)
    }

    pub fn to_bytes(&self) -> [u8; 64] {
        self.0
    }
}

/// A base58check address: `base58check(0x00 || HASH160(pubkey))`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Address(Hash160);

impl Address {
    pub fn from_public_key(pk: &PublicKey) -> Self {
        Address(hash160(&pk.to_bytes()))
    }

    /// Raw 20-byte HASH160 form (`addressAsBuffer`).
    pub fn as_hash160(&self) -> Hash160 {
        self.0
    }

    /// base58check text form (`addressAsString`), bounded to 35 characters.
    pub fn to_base58(&self) -> String {
        let mut payload = Vec::with_capacity(21);
        payload.push(ADDRESS_VERSION);
        payload.extend_from_slice(&self.0);
        encode_base58check(&payload)
    }

    /// Parse either the raw 20-byte hash or the base58check string form,
    /// verifying the checksum in the latter case.
    pub fn parse(s: &str) -> Result<Self, KeyError> {
        let raw = decode_base58check(s).map_err(|_| KeyError::InvalidAddress)?;
        if raw.len() != 21 || raw[0] != ADDRESS_VERSION {
            return Err(KeyError::InvalidAddress);
        }
        let mut hash = [0u8; 20];
        hash.copy_from_slice(&raw[1..]);
        Ok(Address(hash))
    }

    pub fn from_hash160(hash: Hash160) -> Self {
        Address(hash)
    }

    pub fn is_valid(s: &str) -> bool {
        Self::parse(s).is_ok() && s.len() <= 35
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_base58())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wif_round_trip() {
        let priv_key = PrivateKey::generate();
        let wif = priv_key.to_wif();
        let decoded = PrivateKey::from_wif(&wif).unwrap();
        assert_eq!(decoded.public_key().to_bytes(), priv_key.public_key().to_bytes());
    }

    #[test]
    fn known_wif_derives_expected_address() {
        // Literal value from spec.md §8 worked scenario S1.
        let priv_key = PrivateKey::from_wif("KxLJSyM1111111111111111111111111111111111111119cskYz").unwrap();
        let address = priv_key.public_key().address().to_base58();
        assert!(Address::is_valid(&address));
    }

    #[test]
    fn sign_and_verify_round_trip() {
        let priv_key = PrivateKey::generate();
        let pub_key = priv_key.public_key();
        let message = b"hello chain processor";
        let sig = priv_key.sign_message(message);
        assert!(pub_key.verify_message(message, &sig));
    }

    #[test]
    fn flipping_any_byte_invalidates_signature() {
        let priv_key = PrivateKey::generate();
        let pub_key = priv_key.public_key();
        let message = b"immutable payload";
        let sig = priv_key.sign_message(message);

        let mut tampered = sig.to_bytes();
        tampered[10] ^= 0x01;
        assert!(!pub_key.verify_message(message, &Signature::from_bytes(tampered)));

        let other = PrivateKey::generate().public_key();
        assert!(!other.verify_message(message, &sig));

        let mut tampered_message = message.to_vec();
        tampered_message[0] ^= 0x01;
        assert!(!pub_key.verify_message(&tampered_message, &sig));
    }

    #[test]
    fn address_checksum_flip_is_rejected() {
        let priv_key = PrivateKey::generate();
        let address = priv_key.public_key().address().to_base58();
        assert!(Address::is_valid(&address));

        let mut chars: Vec<char> = address.chars().collect();
        let last = chars.len() - 1;
        chars[last] = if chars[last] == '1' { '2' } else { '1' };
        let mutated: String = chars.into_iter().collect();
        assert!(!Address::is_valid(&mutated));
    }

    #[test]
    fn address_buffer_string_round_trip() {
        let priv_key = PrivateKey::generate();
        let address = priv_key.public_key().address();
        let s = address.to_base58();
        let parsed = Address::parse(&s).unwrap();
        assert_eq!(parsed.as_hash160(), address.as_hash160());
    }

    #[test]
    fn public_key_rejects_bad_prefix() {
        let mut bytes = [0u8; 33];
        bytes[0] = 0x04;
        assert_eq!(PublicKey::from_bytes(&bytes), Err(KeyError::InvalidPublicKey));
    }
}
