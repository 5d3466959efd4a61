//! Outbound download session
//!
//! Glue between the embedding node and the download core: hands each new
//! outbound channel a slot and a [`BlockInProtocol`] task, and runs the
//! rate watchdog that steals work from slots falling statistically behind
//! the rest of the table.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;

use crate::chain::Chain;
use crate::config::DownloadConfig;
use crate::download::block_in::BlockInProtocol;
use crate::download::hash_queue::HashQueue;
use crate::download::reservations::Reservations;
use crate::download::MONITOR_INTERVAL;
use crate::error::DownloadError;
use crate::network::channel::Channel;

/// Attachment point for outbound block download channels
pub struct DownloadSession {
    chain: Arc<dyn Chain>,
    reservations: Arc<Reservations>,
    require_witness: bool,
}

impl DownloadSession {
    /// Build the session and its reservation table from the queued hashes
    pub fn new(chain: Arc<dyn Chain>, hashes: Arc<HashQueue>, config: &DownloadConfig) -> Self {
        let reservations = Arc::new(Reservations::new(hashes, Arc::clone(&chain), config));
        Self {
            chain,
            reservations,
            require_witness: config.require_witness(),
        }
    }

    pub fn reservations(&self) -> Arc<Reservations> {
        Arc::clone(&self.reservations)
    }

    /// Bind a new outbound channel to a free slot and spawn its protocol.
    ///
    /// `None` when every slot is taken; the channel is of no use for block
    /// download until one frees up. The join handle carries the protocol's
    /// stop cause; anything fatal ([`DownloadError::is_fatal`]) must be
    /// surfaced to the node supervisor.
    pub fn attach(
        &self,
        channel: Arc<dyn Channel>,
    ) -> Option<JoinHandle<Result<(), DownloadError>>> {
        let reservation = self.reservations.checkout()?;
        debug!(slot = reservation.slot(), "attaching block-in protocol");
        let protocol = BlockInProtocol::new(
            Arc::clone(&self.chain),
            channel,
            Arc::clone(&self.reservations),
            reservation,
            self.require_witness,
        );
        Some(tokio::spawn(protocol.run()))
    }

    /// Periodically steal work from statistical laggards.
    ///
    /// Runs until the task is dropped. Each tick, any active slot whose
    /// import rate falls more than one standard deviation below the table
    /// mean loses half its pending set to an empty slot, and its channel
    /// tears down on the next receipt.
    pub async fn run_watchdog(&self) {
        let mut monitor = tokio::time::interval(MONITOR_INTERVAL);
        monitor.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            monitor.tick().await;
            self.partition_laggards();
        }
    }

    /// One watchdog pass; returns how many slots were partitioned
    pub fn partition_laggards(&self) -> usize {
        let statistics = self.reservations.rates();
        // Deviation is meaningless below three active rows: with two, the
        // slower is exactly one deviation from the mean, never beyond it.
        if statistics.active_rows < 3 || statistics.standard_deviation == 0.0 {
            return 0;
        }
        let threshold = statistics.mean - statistics.standard_deviation;

        let mut partitioned = 0;
        for row in self.reservations.table() {
            if row.stopped() || row.idle() || row.size() <= 1 {
                continue;
            }
            if row.normal() < threshold && self.reservations.partition_from(&row) {
                debug!(
                    slot = row.slot(),
                    rate = row.normal(),
                    mean = statistics.mean,
                    "partitioned laggard slot"
                );
                partitioned += 1;
            }
        }
        partitioned
    }
}
