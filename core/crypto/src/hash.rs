//! Pure hash functions. No state, no allocation beyond the fixed-size output.

use md_5::Md5;
use ripemd::Ripemd160;
use sha1::Sha1;
use sha2::{Digest, Sha256, Sha512};

use crate::{Hash160, Hash256};

pub fn sha1(data: &[u8]) -> [u8; 20] {
    Sha1::digest(data).into()
}

pub fn sha256(data: &[u8]) -> Hash256 {
    Sha256::digest(data).into()
}

pub fn sha512(data: &[u8]) -> [u8; 64] {
    Sha512::digest(data).into()
}

pub fn md5(data: &[u8]) -> [u8; 16] {
    Md5::digest(data).into()
}

pub fn ripemd160(data: &[u8]) -> Hash160 {
    Ripemd160::digest(data).into()
}

/// HASH160 = RIPEMD160(SHA256(x)), the same construction Bitcoin-style
/// chains use for script/address hashes.
pub fn hash160(data: &[u8]) -> Hash160 {
    ripemd160(&sha256(data))
}

/// HASH256 = SHA256(SHA256(x)).
pub fn hash256(data: &[u8]) -> Hash256 {
    sha256(&sha256(data))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_known_vector() {
        let out = sha256(b"abc");
        assert_eq!(
            hex::encode(out),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn hash256_is_double_sha256() {
        let data = b"test data";
        assert_eq!(hash256(data), sha256(&sha256(data)));
    }

    #[test]
    fn hash160_is_ripemd_of_sha256() {
        let data = b"test data";
        assert_eq!(hash160(data), ripemd160(&sha256(data)));
    }

    #[test]
    fn md5_known_vector() {
        assert_eq!(hex::encode(md5(b"")), "d41d8cd98f00b204e9800998ecf8427e");
    }

    #[test]
    fn sha1_known_vector() {
        assert_eq!(
            hex::encode(sha1(b"")),
            "da39a3ee5e6b4b0d3255bfef95601890afd80709"
        );
    }
}
