//! Cryptographic primitives for the chain processor core (spec.md §4.1-4.2).
//!
//! Pure hashing/encoding functions live in [`hash`] and [`encoding`]; keys,
//! addresses and ECDSA sign/verify live in [`keys`].

pub mod encoding;
pub mod hash;
pub mod keys;

/// 256-bit hash type used throughout the wire codec.
pub type Hash256 = [u8; 32];

/// 160-bit hash type (address payload, script hashes).
pub type Hash160 = [u8; 20];

pub use encoding::EncodingError;
pub use keys::{Address, KeyError, PrivateKey, PublicKey, Signature};
