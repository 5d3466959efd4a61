//! Per-channel block-in protocol
//!
//! Binds one outbound peer channel to one download slot. The task requests
//! the slot's reserved hashes with `getdata`, hands each received block to
//! the chain organizer, and refills or steals work when the slot drains.
//! The channel tears itself down when the slot is partitioned away, when
//! the peer sends an unreserved block, or when no block arrives within the
//! reservation timeout.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::broadcast;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

use crate::chain::{Chain, HeaderReindex};
use crate::download::reservation::Reservation;
use crate::download::reservations::Reservations;
use crate::download::MONITOR_INTERVAL;
use crate::error::DownloadError;
use crate::network::channel::Channel;
use crate::network::protocol::{BlockMessage, ProtocolMessage};
use crate::types::Hash;

/// Block download state machine for one outbound channel
pub struct BlockInProtocol {
    chain: Arc<dyn Chain>,
    channel: Arc<dyn Channel>,
    reservations: Arc<Reservations>,
    reservation: Arc<Reservation>,
    require_witness: bool,
    peer_witness: bool,
}

impl BlockInProtocol {
    /// Bind a checked-out reservation to a peer channel.
    ///
    /// `require_witness` comes from the local services configuration; the
    /// peer's capability is read from its version handshake.
    pub fn new(
        chain: Arc<dyn Chain>,
        channel: Arc<dyn Channel>,
        reservations: Arc<Reservations>,
        reservation: Arc<Reservation>,
        require_witness: bool,
    ) -> Self {
        let peer_witness = channel.peer_version().supports_witness();
        Self {
            chain,
            channel,
            reservations,
            reservation,
            require_witness,
            peer_witness,
        }
    }

    /// Run the download loop until the channel stops.
    ///
    /// The reservation is released on exit regardless of the stop cause;
    /// dropping the subscriptions is the unsubscribe. Benign teardown
    /// surfaces as `ChannelStopped`/`ChannelTimeout`; `StoreCorrupted` must
    /// reach the node supervisor.
    pub async fn run(self) -> Result<(), DownloadError> {
        let mut blocks = self.channel.subscribe_blocks();
        let mut reindexes = self.chain.subscribe_headers();
        let mut monitor = tokio::time::interval_at(
            tokio::time::Instant::now() + MONITOR_INTERVAL,
            MONITOR_INTERVAL,
        );
        monitor.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let result = self.download_loop(&mut blocks, &mut reindexes, &mut monitor).await;

        // No longer receiving blocks, so free up the reservation.
        self.reservation.stop();
        result
    }

    async fn download_loop(
        &self,
        blocks: &mut tokio::sync::mpsc::UnboundedReceiver<BlockMessage>,
        reindexes: &mut broadcast::Receiver<HeaderReindex>,
        monitor: &mut tokio::time::Interval,
    ) -> Result<(), DownloadError> {
        self.send_get_blocks().await?;

        loop {
            tokio::select! {
                message = blocks.recv() => match message {
                    Some(message) => self.handle_receive_block(message).await?,
                    // Peer connection torn down by the network layer.
                    None => return Err(DownloadError::ChannelStopped),
                },
                event = reindexes.recv() => self.handle_reindexed(event).await?,
                _ = monitor.tick() => self.handle_monitor_tick().await?,
            }
        }
    }

    /// Request every reserved-but-unrequested hash on this slot.
    ///
    /// No-op while the candidate header chain is stale (requests resume on
    /// reindex) and when there is nothing new to request.
    async fn send_get_blocks(&self) -> Result<(), DownloadError> {
        // Don't start downloading blocks until the header chain is current.
        // This protects against disk fill and allows hashes to be distributed.
        if self.chain.is_candidates_stale() {
            return Ok(());
        }

        // Repopulate if empty and new work has arrived.
        if self.reservation.is_empty() {
            self.reservations.populate(&self.reservation);
        }

        let mut request = self.reservation.request();

        // Or we may be the same channel and with hashes already requested.
        if request.is_empty() {
            return Ok(());
        }

        if self.require_witness {
            request.to_witness();
        }

        debug!(
            hashes = request.len(),
            slot = self.reservation.slot(),
            "sending block request"
        );
        self.channel.send(ProtocolMessage::GetData(request)).await
    }

    async fn handle_receive_block(&self, message: BlockMessage) -> Result<(), DownloadError> {
        // Stop if required witness is unavailable.
        if self.require_witness && !self.peer_witness {
            return Err(DownloadError::WitnessUnavailable);
        }

        // This channel was slowest, so half of its reservation has been taken.
        if self.reservation.stopped() {
            debug!(
                slot = self.reservation.slot(),
                remaining = self.reservation.size(),
                "restarting partitioned slot"
            );
            return Err(DownloadError::ChannelStopped);
        }

        let hash = message.block.hash();
        let transactions = message.block.transactions.len();
        let size = message.block.serialized_size();

        // The reservation may have become stopped between the stop test and
        // this call, so the block may either be unrequested or moved to
        // another slot. Either way the hash is not reserved here.
        let Some(height) = self.reservation.find_height_and_erase(&hash) else {
            debug!(
                slot = self.reservation.slot(),
                "unrequested or partitioned block"
            );
            return Err(DownloadError::UnrequestedBlock);
        };

        // Add the block to the store. Validation failure alone does not
        // error here; an error means the store is corrupted.
        let start = Instant::now();
        if let Err(code) = self.chain.organize(message.block, height) {
            error!(
                slot = self.reservation.slot(),
                height,
                %code,
                "failure organizing block, store is now corrupted"
            );
            return Err(code);
        }
        let database = start.elapsed();

        // Recompute rate performance, excluding store cost.
        self.reservation.update_history(size, database);

        // Only log every 100th block until the chain is current.
        let period = if self.chain.is_blocks_stale() { 100 } else { 1 };
        if height % period == 0 {
            self.report(height, &hash, transactions, size);
        }

        self.send_get_blocks().await
    }

    /// Use header indexation as a block request trigger: reindex reawakens
    /// channels whose reservations drained during initial block download.
    async fn handle_reindexed(
        &self,
        event: Result<HeaderReindex, broadcast::error::RecvError>,
    ) -> Result<(), DownloadError> {
        match event {
            Ok(_) => self.send_get_blocks().await,
            // Missed events still mean new work arrived.
            Err(broadcast::error::RecvError::Lagged(_)) => self.send_get_blocks().await,
            Err(broadcast::error::RecvError::Closed) => Err(DownloadError::ChannelStopped),
        }
    }

    /// Periodic watchdog tick: stop a stalled slot, otherwise pick up any
    /// work partitioned onto this slot since the last receipt.
    async fn handle_monitor_tick(&self) -> Result<(), DownloadError> {
        if self.reservation.stopped() {
            return Err(DownloadError::ChannelStopped);
        }

        // This ensures that a stall does not persist.
        if self.reservation.expired() {
            debug!(
                slot = self.reservation.slot(),
                remaining = self.reservation.size(),
                "restarting slow slot"
            );
            return Err(DownloadError::ChannelTimeout);
        }

        self.send_get_blocks().await
    }

    fn report(&self, height: u64, hash: &Hash, transactions: usize, size: usize) {
        info!(
            height,
            hash = %hex::encode(hash),
            txs = transactions,
            bytes = size,
            rate = self.reservation.normal(),
            database = self.reservation.ratio(),
            slot = self.reservation.slot(),
            remaining = self.reservations.unreserved(),
            "block organized"
        );
    }
}
