//! Download error taxonomy
//!
//! Errors are kinds, not carriers of context: a channel-local error stops
//! only the channel that raised it, while a corrupted store is fatal to the
//! node and must reach the supervisor.

use thiserror::Error;

/// Errors raised by the block download core
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DownloadError {
    /// Peer tore down, was partitioned away, or misbehaved; the channel
    /// stops and its reservation is released for reassignment.
    #[error("channel stopped")]
    ChannelStopped,

    /// Benign monitor-timer expiry; ignored unless the reservation itself
    /// has expired.
    #[error("channel timeout")]
    ChannelTimeout,

    /// The organizer failed to store a block. The store is considered
    /// corrupted and the error is surfaced to the node supervisor.
    #[error("store corrupted organizing block at height {height}")]
    StoreCorrupted { height: u64 },

    /// Peer sent a block whose hash is not reserved on its slot.
    #[error("unrequested block")]
    UnrequestedBlock,

    /// Local services require witness data but the peer does not serve it.
    #[error("witness service unavailable on peer")]
    WitnessUnavailable,

    /// The unassigned hash queue is drained. Normal at the end of initial
    /// block download.
    #[error("hash queue empty")]
    QueueEmpty,
}

impl DownloadError {
    /// True for the routine teardown and drain signals that carry no blame
    pub fn is_benign(&self) -> bool {
        matches!(
            self,
            DownloadError::ChannelStopped
                | DownloadError::ChannelTimeout
                | DownloadError::QueueEmpty
        )
    }

    /// True for errors that implicate the node rather than one channel.
    ///
    /// Everything else ends one channel and frees its slot; a fatal error
    /// must reach the node supervisor.
    pub fn is_fatal(&self) -> bool {
        matches!(self, DownloadError::StoreCorrupted { .. })
    }
}
