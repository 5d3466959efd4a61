//! Peer channel interface
//!
//! One `Channel` is one established outbound peer connection, owned by the
//! network layer. The download core sends typed messages on it and consumes
//! inbound `block` messages through a subscription; connection management,
//! handshake, and the byte codec all live behind this trait.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::DownloadError;
use crate::network::protocol::{BlockMessage, ProtocolMessage, VersionMessage};

/// An established peer connection, as seen by the download core
#[async_trait]
pub trait Channel: Send + Sync {
    /// Enqueue a typed wire message for sending.
    ///
    /// Fails with `ChannelStopped` once the connection has torn down.
    async fn send(&self, message: ProtocolMessage) -> Result<(), DownloadError>;

    /// Subscribe to inbound `block` messages.
    ///
    /// Deliveries are serialized: no two blocks from one channel interleave.
    /// The sender side closing is the teardown signal.
    fn subscribe_blocks(&self) -> mpsc::UnboundedReceiver<BlockMessage>;

    /// The peer's version handshake, for capability detection
    fn peer_version(&self) -> VersionMessage;
}
