//! blocksync - Parallel block download core for a Bitcoin full node
//!
//! Once header sync has assembled a candidate chain, this crate drives the
//! parallel fetch of full blocks across many peer connections and feeds
//! them to the blockchain organizer. It owns the reservation table (a
//! sharded queue of outstanding block hashes with work-stealing between
//! slots), the per-slot rate estimator that scores peers, and the
//! per-channel block-in protocol that turns one peer connection into one
//! download lane.
//!
//! ## Design principles
//!
//! 1. **Pure download core**: peer discovery, header sync, validation, and
//!    persistence are the embedding node's job, consumed through the
//!    [`chain::Chain`] and [`network::Channel`] traits
//! 2. **Per-peer accountability**: each slot scores its own peer; slow or
//!    stalled slots lose half their work to an empty slot and the channel
//!    is torn down
//! 3. **Order without coordination**: slots interleave heights round-robin
//!    and the organizer reorders; the core imposes no global height gate

pub mod chain;
pub mod config;
pub mod download;
pub mod error;
pub mod hashing;
pub mod network;
pub mod types;

pub use chain::{Chain, HeaderReindex};
pub use config::DownloadConfig;
pub use download::{
    BlockInProtocol, DownloadSession, HashQueue, RateStatistics, Reservation, Reservations,
    MAX_REQUEST, MONITOR_INTERVAL, RATE_WINDOW,
};
pub use error::DownloadError;
pub use network::{Channel, ProtocolMessage};
pub use types::{Block, BlockHeader, Hash, Transaction};
