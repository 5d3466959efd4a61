//! Network layer interfaces for the download core
//!
//! Typed protocol messages, inventory identifiers, and the `Channel` trait
//! through which the embedding node's connection manager hands peers to the
//! block download protocols.

pub mod channel;
pub mod inventory;
pub mod protocol;

pub use channel::Channel;
pub use protocol::{
    BlockMessage, GetDataMessage, InvMessage, InventoryItem, ProtocolMessage, VersionMessage,
};
