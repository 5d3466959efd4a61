//! Block download core
//!
//! Once header sync has produced a chain of candidate block hashes, this
//! module drives the parallel per-peer fetch of full blocks and feeds them
//! to the chain organizer. Outstanding hashes live in a [`HashQueue`], are
//! partitioned across a fixed set of download slots ([`Reservations`]), and
//! each outbound peer channel runs a [`BlockInProtocol`] task bound to one
//! slot. Slow or stalled slots lose half their work to an empty slot
//! (partitioning) and their channel is torn down, freeing the slot for a
//! better peer.

pub mod block_in;
pub mod hash_queue;
pub mod rate;
pub mod reservation;
pub mod reservations;
pub mod session;

pub use block_in::BlockInProtocol;
pub use hash_queue::HashQueue;
pub use rate::Rate;
pub use reservation::Reservation;
pub use reservations::{RateStatistics, Reservations};
pub use session::DownloadSession;

use std::time::Duration;

/// Protocol maximum size of `getdata` block requests
pub const MAX_REQUEST: usize = crate::network::protocol::MAX_INVENTORY;

/// Interval of the per-channel monitor timer and the session watchdog
pub const MONITOR_INTERVAL: Duration = Duration::from_secs(5);

/// Moving window over which per-slot block import rate is measured
pub const RATE_WINDOW: Duration = Duration::from_secs(5);
