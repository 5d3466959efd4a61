//! Blockchain collaborator interface
//!
//! The download core never touches storage directly; it hands each received
//! block to the chain's organizer and reacts to header reindex events. The
//! embedding node implements this trait over its blockchain store.

use tokio::sync::broadcast;

use crate::error::DownloadError;
use crate::types::{Block, BlockHeader};

/// A header reindex event: the candidate header index was extended or
/// reorganized at `fork_height`.
#[derive(Debug, Clone)]
pub struct HeaderReindex {
    pub fork_height: u64,
    pub incoming: Vec<BlockHeader>,
    pub outgoing: Vec<BlockHeader>,
}

/// Blockchain access as consumed by the download core
pub trait Chain: Send + Sync {
    /// Validate and persist one block at the given height.
    ///
    /// Synchronous; a failure means the store is corrupted and is fatal to
    /// the node. Block validation failure alone does not error here.
    fn organize(&self, block: Block, height: u64) -> Result<(), DownloadError>;

    /// Bulk-load path bypassing validation
    fn import(&self, block: Block, height: u64) -> bool;

    /// True while header sync lags the network tip; block requests are
    /// withheld until the candidate chain is current
    fn is_candidates_stale(&self) -> bool;

    /// True while block sync lags the network tip
    fn is_blocks_stale(&self) -> bool;

    /// Subscribe to header reindex events.
    ///
    /// Dropping the receiver is the unsubscribe.
    fn subscribe_headers(&self) -> broadcast::Receiver<HeaderReindex>;
}
