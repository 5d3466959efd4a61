//! Bitcoin protocol message types
//!
//! The typed forms of the wire messages the download core sends and
//! receives. Byte-level serialization is the transport's concern; these
//! structs are what the rest of the crate speaks.

use serde::{Deserialize, Serialize};

use crate::network::inventory::{is_block_type, to_witness};
use crate::types::{Block, Hash};

/// Witness service bit (BIP144) in `VersionMessage::services`
pub const NODE_WITNESS: u64 = 1 << 3;

/// Protocol cap on inventory entries per `getdata` message
pub const MAX_INVENTORY: usize = 50_000;

/// Protocol messages exchanged on a block download channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProtocolMessage {
    Version(VersionMessage),
    GetData(GetDataMessage),
    Inv(InvMessage),
    Block(BlockMessage),
}

/// Version message (the handshake subset the download core consults)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionMessage {
    pub version: i32,
    pub services: u64,
    pub user_agent: String,
    pub start_height: i32,
}

impl VersionMessage {
    /// Check if peer serves witness data (BIP144)
    pub fn supports_witness(&self) -> bool {
        (self.services & NODE_WITNESS) != 0
    }
}

/// Inventory item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryItem {
    pub inv_type: u32,
    pub hash: Hash,
}

/// Get data message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetDataMessage {
    pub inventory: Vec<InventoryItem>,
}

impl GetDataMessage {
    pub fn new(inventory: Vec<InventoryItem>) -> Self {
        Self { inventory }
    }

    pub fn is_empty(&self) -> bool {
        self.inventory.is_empty()
    }

    pub fn len(&self) -> usize {
        self.inventory.len()
    }

    /// Upgrade block inventory types to their witness variants
    pub fn to_witness(&mut self) {
        for item in &mut self.inventory {
            if is_block_type(item.inv_type) {
                item.inv_type = to_witness(item.inv_type);
            }
        }
    }
}

/// Inventory announcement message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvMessage {
    pub inventory: Vec<InventoryItem>,
}

/// Block message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockMessage {
    pub block: Block,
    /// Witness data for each transaction in the block, when the block was
    /// requested with a witness inventory type
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub witnesses: Vec<Vec<Vec<u8>>>,
}
