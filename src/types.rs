//! In-flight chain types
//!
//! Minimal block representation carried between a peer channel and the
//! chain organizer. The wire codec decodes into these; the download core
//! only needs block identity (header hash), transaction count, and size.

use serde::{Deserialize, Serialize};

use crate::hashing::double_sha256;

/// 32-byte hash (block hash, transaction hash)
pub type Hash = [u8; 32];

/// Block header (80 bytes on the wire)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    pub version: i32,
    pub prev_block_hash: Hash,
    pub merkle_root: Hash,
    pub timestamp: u32,
    pub bits: u32,
    pub nonce: u32,
}

impl BlockHeader {
    /// Serialize to the canonical 80-byte wire form used for hashing
    pub fn serialize(&self) -> Vec<u8> {
        let mut header_data = Vec::with_capacity(80);
        header_data.extend_from_slice(&self.version.to_le_bytes());
        header_data.extend_from_slice(&self.prev_block_hash);
        header_data.extend_from_slice(&self.merkle_root);
        header_data.extend_from_slice(&self.timestamp.to_le_bytes());
        header_data.extend_from_slice(&self.bits.to_le_bytes());
        header_data.extend_from_slice(&self.nonce.to_le_bytes());
        header_data
    }

    /// Block hash: double SHA256 of the serialized header
    pub fn hash(&self) -> Hash {
        double_sha256(&self.serialize())
    }
}

/// Transaction in decoded-but-opaque form
///
/// The download core never inspects transaction contents; validation is the
/// organizer's job. Only the raw size is needed for throughput accounting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Wire-format transaction bytes, without witness data
    pub raw: Vec<u8>,
}

impl Transaction {
    pub fn size(&self) -> usize {
        self.raw.len()
    }
}

/// Full block as received from a peer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub header: BlockHeader,
    pub transactions: Vec<Transaction>,
}

impl Block {
    /// Block hash (identity of the header)
    pub fn hash(&self) -> Hash {
        self.header.hash()
    }

    /// Approximate serialized size in bytes (header plus transaction bytes)
    pub fn serialized_size(&self) -> usize {
        80 + self
            .transactions
            .iter()
            .map(Transaction::size)
            .sum::<usize>()
    }
}
