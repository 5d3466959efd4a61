//! The reservation table
//!
//! Owns every download slot, drains the hash queue into them, and steals
//! work from the largest slot when another runs dry. One readers-writer
//! lock protects the slot vector; iteration happens on snapshots so rate
//! statistics never hold the table lock. Lock hierarchy: table lock before
//! any row lock, never the reverse.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use tracing::debug;

use crate::chain::Chain;
use crate::config::DownloadConfig;
use crate::download::hash_queue::HashQueue;
use crate::download::reservation::Reservation;
use crate::download::MAX_REQUEST;
use crate::types::Block;

/// Statistical summary of block import rates across active slots
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateStatistics {
    /// Number of slots that were not idle at sampling time
    pub active_rows: usize,
    pub mean: f64,
    pub standard_deviation: f64,
}

/// The table of download slot reservations. Thread safe.
pub struct Reservations {
    hashes: Arc<HashQueue>,
    chain: Arc<dyn Chain>,
    table: RwLock<Vec<Arc<Reservation>>>,
    max_request: usize,
    timeout: Duration,
}

impl Reservations {
    /// Build the table and distribute the queued hashes across slots
    pub fn new(hashes: Arc<HashQueue>, chain: Arc<dyn Chain>, config: &DownloadConfig) -> Self {
        let reservations = Self {
            hashes,
            chain,
            table: RwLock::new(Vec::new()),
            max_request: MAX_REQUEST,
            timeout: config.block_timeout(),
        };
        reservations.initialize(config.download_connections as usize);
        reservations
    }

    /// Bulk-load passthrough to the chain, bypassing validation
    pub fn import(&self, block: Block, height: u64) -> bool {
        self.chain.import(block, height)
    }

    /// Number of hashes still unassigned to any slot
    pub fn unreserved(&self) -> usize {
        self.hashes.size()
    }

    /// Snapshot of the slot handles; iteration is lock free
    pub fn table(&self) -> Vec<Arc<Reservation>> {
        self.table.read().unwrap().clone()
    }

    /// Mean and standard deviation of the import rate over non-idle slots.
    ///
    /// Rates are sampled per row without the table lock; an empty active
    /// set yields zeros.
    pub fn rates(&self) -> RateStatistics {
        let rows = self.table();
        let rates: Vec<f64> = rows
            .iter()
            .filter(|row| !row.idle())
            .map(|row| row.normal())
            .collect();
        let active_rows = rates.len();

        let total: f64 = rates.iter().sum();
        let mean = divide(total, active_rows);
        let squares: f64 = rates
            .iter()
            .map(|rate| {
                let difference = mean - rate;
                difference * difference
            })
            .sum();
        let standard_deviation = divide(squares, active_rows).sqrt();

        RateStatistics {
            active_rows,
            mean,
            standard_deviation,
        }
    }

    /// Remove a slot from the table; not an error if already absent
    pub fn remove(&self, row: &Arc<Reservation>) {
        let mut table = self.table.write().unwrap();
        table.retain(|existing| existing.slot() != row.slot());
    }

    /// Hand an unbound slot to a new channel.
    ///
    /// A previously stopped row is re-armed with its pending hashes intact,
    /// so work abandoned by a dead peer moves to its replacement.
    pub fn checkout(&self) -> Option<Arc<Reservation>> {
        let table = self.table.write().unwrap();
        table.iter().find(|row| row.try_bind()).cloned()
    }

    /// Refill an empty slot, from the queue first, then by stealing half
    /// of the largest slot's pending set. Returns true iff the slot became
    /// non-empty; false is the normal drain signal, not an error.
    pub fn populate(&self, minimal: &Arc<Reservation>) -> bool {
        let populated = {
            let table = self.table.write().unwrap();
            self.reserve(minimal) || Self::partition(&table, minimal)
        };

        if populated {
            debug!(
                slot = minimal.slot(),
                count = minimal.size(),
                "populated slot"
            );
        }
        populated
    }

    /// Compute the row count and deal the queue round-robin across slots.
    ///
    /// Slot `s` receives heights `{s, rows + s, 2 * rows + s, ...}`: block
    /// sizes grow with height, so interleaving balances expected work. The
    /// remainder past a whole number of deals stays queued.
    fn initialize(&self, size: usize) {
        // Guard against overflow by capping size.
        let max_rows = usize::MAX / self.max_request;
        let mut rows = size.min(max_rows);

        let mut table = self.table.write().unwrap();

        // Ensure that there is at least one block per row.
        let blocks = self.hashes.size();
        rows = rows.min(blocks);
        if rows == 0 {
            return;
        }

        // Allocate no more than max_request hashes per row.
        let allocation = blocks.min(rows * self.max_request);

        table.reserve(rows);
        for row in 0..rows {
            table.push(Arc::new(Reservation::new(row as u32, self.timeout)));
        }

        // The remainder is retained by the hash queue for later reservation.
        for _base in 0..(allocation / rows) {
            for row in table.iter() {
                if let Some((height, hash)) = self.hashes.dequeue() {
                    row.insert(hash, height);
                }
            }
        }

        debug!(blocks = allocation, slots = rows, "reserved blocks to slots");
    }

    /// Drain up to a full request's worth of queued hashes into `minimal`
    fn reserve(&self, minimal: &Arc<Reservation>) -> bool {
        let existing = minimal.size();
        let allocation = self
            .hashes
            .size()
            .min(self.max_request.saturating_sub(existing));

        for _ in 0..allocation {
            match self.hashes.dequeue() {
                Some((height, hash)) => minimal.insert(hash, height),
                None => break,
            }
        }

        // This may be empty when the queue drained first, which is okay.
        !minimal.is_empty()
    }

    /// Move half of `laggard`'s pending set onto an empty slot that has a
    /// live channel, flagging the laggard for teardown.
    ///
    /// The caller decides who lags (the session watchdog's rate policy);
    /// this is only the mechanics. False when no suitable target exists.
    pub fn partition_from(&self, laggard: &Arc<Reservation>) -> bool {
        let table = self.table.write().unwrap();
        let target = table.iter().find(|row| {
            row.slot() != laggard.slot() && !row.stopped() && row.is_bound() && row.is_empty()
        });
        match target {
            Some(target) => laggard.partition(target),
            None => false,
        }
    }

    /// Steal half of the largest slot's pending set into `minimal`.
    /// Caller holds the table write lock.
    fn partition(table: &[Arc<Reservation>], minimal: &Arc<Reservation>) -> bool {
        match Self::find_maximal(table) {
            Some(maximal) if maximal.slot() != minimal.slot() => {
                let partitioned = maximal.partition(minimal);
                if partitioned {
                    debug!(
                        from = maximal.slot(),
                        to = minimal.slot(),
                        moved = minimal.size(),
                        "partitioned slot"
                    );
                }
                partitioned
            }
            _ => false,
        }
    }

    /// The unstopped row holding the most reserved hashes; ties go to the
    /// lowest slot id
    fn find_maximal(table: &[Arc<Reservation>]) -> Option<&Arc<Reservation>> {
        table
            .iter()
            .filter(|row| !row.stopped())
            .max_by_key(|row| (row.size(), std::cmp::Reverse(row.slot())))
    }
}

fn divide(dividend: f64, divisor: usize) -> f64 {
    if divisor == 0 {
        0.0
    } else {
        dividend / divisor as f64
    }
}
