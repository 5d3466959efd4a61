//! Bitcoin-compatible hashing functions
//!
//! Implements the double SHA256 hashing used for block identity. The
//! download core only hashes block headers; all other cryptography lives
//! outside this crate.

use sha2::{Digest, Sha256};

/// Calculate Bitcoin double SHA256 hash
///
/// This is the standard Bitcoin hashing algorithm used for block hashes
/// and transaction hashes.
pub fn double_sha256(data: &[u8]) -> [u8; 32] {
    let first_hash = Sha256::digest(data);
    let second_hash = Sha256::digest(first_hash);
    let mut result = [0u8; 32];
    result.copy_from_slice(&second_hash);
    result
}

/// Calculate single SHA256 hash (for internal use)
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let hash = Sha256::digest(data);
    let mut result = [0u8; 32];
    result.copy_from_slice(&hash);
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_double_sha256_empty() {
        // Double SHA256 of empty input is a fixed, well-known digest.
        let hash = double_sha256(&[]);
        assert_eq!(
            hex::encode(hash),
            "5df6e0e2761359d30a8275058e299fcc0381534545f55cf43e41983f5d4c9456"
        );
    }

    #[test]
    fn test_double_sha256_differs_from_single() {
        let data = b"block header bytes";
        assert_ne!(double_sha256(data), sha256(data));
    }
}
