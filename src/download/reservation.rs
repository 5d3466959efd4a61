//! One download slot's reservation
//!
//! A reservation is the record bound to one download slot: the hashes in
//! flight on that slot's channel, the slot's rate history, and the flags
//! that coordinate teardown and work-stealing. Slot ids are assigned at
//! construction and never reused.
//!
//! The internal lock is never held while calling into the chain or the
//! channel. `partition` takes the locks of two reservations in sequence;
//! it must only be called under the table's write lock, which serializes
//! all cross-slot moves.

use std::collections::HashSet;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use tracing::warn;

use crate::download::rate::Rate;
use crate::network::inventory::MSG_BLOCK;
use crate::network::protocol::{GetDataMessage, InventoryItem};
use crate::types::Hash;

#[derive(Debug)]
struct Inner {
    /// Requests awaiting response, in insertion order. Ascending height on
    /// initial fill; not re-sorted after partitioning.
    pending: Vec<(u64, Hash)>,
    /// Membership index over `pending`
    members: HashSet<Hash>,
    rate: Rate,
    /// Set when the bound channel tore down or the row was abandoned
    stopped: bool,
    /// Set by `partition` to signal the bound channel to tear down on its
    /// next block receipt
    pending_partition: bool,
    /// Whether a channel is currently bound to this slot
    bound: bool,
    /// Hashes inserted since the last `request()`; cleared by `request()`
    unrequested: bool,
    /// Last insert or block receipt, for the inactivity watchdog
    last_activity: Instant,
}

impl Inner {
    /// One predicate for "this slot is done": torn down or partitioned
    /// away. Every mutation guard and the public accessor use it.
    fn stopped(&self) -> bool {
        self.stopped || self.pending_partition
    }
}

/// The reservation record for one download slot
#[derive(Debug)]
pub struct Reservation {
    slot: u32,
    timeout: Duration,
    inner: Mutex<Inner>,
}

impl Reservation {
    pub(crate) fn new(slot: u32, timeout: Duration) -> Self {
        Self {
            slot,
            timeout,
            inner: Mutex::new(Inner {
                pending: Vec::new(),
                members: HashSet::new(),
                rate: Rate::default(),
                stopped: false,
                pending_partition: false,
                bound: false,
                unrequested: false,
                last_activity: Instant::now(),
            }),
        }
    }

    /// Slot identifier, stable for the lifetime of the node
    pub fn slot(&self) -> u32 {
        self.slot
    }

    /// Reserve a hash on this slot.
    ///
    /// Duplicates are rejected; a stopped reservation accepts nothing.
    pub fn insert(&self, hash: Hash, height: u64) {
        let mut inner = self.inner.lock().unwrap();
        if inner.stopped() {
            warn!(slot = self.slot, height, "insert on stopped slot ignored");
            return;
        }
        if !inner.members.insert(hash) {
            return;
        }
        inner.pending.push((height, hash));
        inner.unrequested = true;
        inner.last_activity = Instant::now();
    }

    /// Build the `getdata` inventory for hashes not yet requested.
    ///
    /// The full pending set is listed the first time after new hashes
    /// arrive; subsequent calls return an empty message until another
    /// insert, so a receive loop does not re-request work already in
    /// flight.
    pub fn request(&self) -> GetDataMessage {
        let mut inner = self.inner.lock().unwrap();
        if inner.stopped() || !inner.unrequested {
            return GetDataMessage::new(Vec::new());
        }
        inner.unrequested = false;
        let inventory = inner
            .pending
            .iter()
            .map(|&(_, hash)| InventoryItem {
                inv_type: MSG_BLOCK,
                hash,
            })
            .collect();
        GetDataMessage::new(inventory)
    }

    /// Remove the entry for `hash` and return its height.
    ///
    /// `None` when the hash is absent or the slot has stopped: the block
    /// was either never requested here or was moved away by partitioning.
    pub fn find_height_and_erase(&self, hash: &Hash) -> Option<u64> {
        let mut inner = self.inner.lock().unwrap();
        if inner.stopped() {
            return None;
        }
        if !inner.members.remove(hash) {
            return None;
        }
        let position = inner
            .pending
            .iter()
            .position(|(_, pending_hash)| pending_hash == hash)?;
        let (height, _) = inner.pending.remove(position);
        Some(height)
    }

    /// Move the upper half of this slot's pending set into `other` and
    /// flag this slot for teardown.
    ///
    /// The split is by position: the tail half is the part least likely to
    /// have been served yet. The bound channel is not torn down here; it
    /// observes `stopped()` on its next receipt or monitor tick, and a
    /// block still in flight is discarded at receipt. Returns false when
    /// there is nothing worth splitting.
    pub fn partition(&self, other: &Reservation) -> bool {
        let moved = {
            let mut inner = self.inner.lock().unwrap();
            if inner.pending.len() <= 1 {
                return false;
            }
            let half = inner.pending.len() / 2;
            let keep = inner.pending.len() - half;
            let moved = inner.pending.split_off(keep);
            for (_, hash) in &moved {
                inner.members.remove(hash);
            }
            inner.pending_partition = true;
            moved
        };
        for (height, hash) in moved {
            other.insert(hash, height);
        }
        true
    }

    /// Record a rate sample for a block organized on this slot.
    ///
    /// Called after the organizer returns; `database` is the measured
    /// organize duration, excluded from the throughput estimate.
    pub fn update_history(&self, block_size: usize, database: Duration) {
        let mut inner = self.inner.lock().unwrap();
        inner.rate.record(block_size, database);
        inner.last_activity = Instant::now();
    }

    /// True iff no block has been received for the configured timeout
    pub fn expired(&self) -> bool {
        let inner = self.inner.lock().unwrap();
        inner.last_activity.elapsed() > self.timeout
    }

    /// True if no block arrived within the rate window
    pub fn idle(&self) -> bool {
        self.inner.lock().unwrap().rate.idle()
    }

    /// Current rate estimate, blocks per second
    pub fn normal(&self) -> f64 {
        self.inner.lock().unwrap().rate.normal()
    }

    /// Fraction of the rate window spent inside the organizer
    pub fn ratio(&self) -> f64 {
        self.inner.lock().unwrap().rate.ratio()
    }

    /// True once the slot stopped or was partitioned away. The bound
    /// channel polls this and tears itself down.
    pub fn stopped(&self) -> bool {
        self.inner.lock().unwrap().stopped()
    }

    pub fn size(&self) -> usize {
        self.inner.lock().unwrap().pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Release the slot: mark it stopped and unbind the channel.
    ///
    /// Pending hashes are kept so the table can hand the slot, intact, to a
    /// replacement channel. Nothing inside the core reverts `stopped`; only
    /// an explicit re-checkout through the table re-arms the row.
    pub fn stop(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.stopped = true;
        inner.pending_partition = false;
        inner.bound = false;
    }

    /// Bind a channel to this slot, re-arming a previously stopped row.
    ///
    /// Returns false when another channel already holds the slot. Pending
    /// hashes survive the rebind and are re-requested by the new channel.
    pub(crate) fn try_bind(&self) -> bool {
        let mut inner = self.inner.lock().unwrap();
        if inner.bound {
            return false;
        }
        inner.bound = true;
        inner.stopped = false;
        inner.pending_partition = false;
        inner.unrequested = !inner.pending.is_empty();
        inner.rate = Rate::default();
        inner.last_activity = Instant::now();
        true
    }

    pub(crate) fn is_bound(&self) -> bool {
        self.inner.lock().unwrap().bound
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TIMEOUT: Duration = Duration::from_secs(5);

    fn hash(height: u64) -> Hash {
        let mut hash = [0u8; 32];
        hash[..8].copy_from_slice(&height.to_le_bytes());
        hash
    }

    fn reservation_with(count: u64) -> Reservation {
        let row = Reservation::new(0, TIMEOUT);
        for height in 0..count {
            row.insert(hash(height), height);
        }
        row
    }

    #[test]
    fn test_insert_rejects_duplicates() {
        let row = Reservation::new(0, TIMEOUT);
        row.insert(hash(1), 1);
        row.insert(hash(1), 1);
        assert_eq!(row.size(), 1);
    }

    #[test]
    fn test_size_empty_coherence() {
        let row = Reservation::new(0, TIMEOUT);
        assert!(row.is_empty());
        row.insert(hash(1), 1);
        assert!(!row.is_empty());
        assert_eq!(row.size(), 1);
    }

    #[test]
    fn test_request_lists_pending_once() {
        let row = reservation_with(3);
        let first = row.request();
        assert_eq!(first.len(), 3);
        // Nothing new since: in-flight work is not re-requested.
        assert!(row.request().is_empty());
        row.insert(hash(9), 9);
        assert_eq!(row.request().len(), 4);
    }

    #[test]
    fn test_find_height_and_erase_idempotence() {
        let row = reservation_with(3);
        assert_eq!(row.find_height_and_erase(&hash(1)), Some(1));
        assert_eq!(row.find_height_and_erase(&hash(1)), None);
        assert_eq!(row.size(), 2);
    }

    #[test]
    fn test_partition_halves_and_is_disjoint() {
        let src = reservation_with(5);
        let dst = Reservation::new(1, TIMEOUT);
        assert!(src.partition(&dst));
        // floor(5 / 2) entries move; the halves partition the original set.
        assert_eq!(dst.size(), 2);
        assert_eq!(src.size(), 3);
        assert!(src.stopped());
        assert!(!dst.stopped());
        for height in 3..5 {
            assert_eq!(dst.find_height_and_erase(&hash(height)), Some(height));
        }
        // The victim keeps the lower half, visible again once the slot is
        // handed to a replacement channel.
        assert!(src.try_bind());
        for height in 0..3 {
            assert_eq!(src.find_height_and_erase(&hash(height)), Some(height));
        }
    }

    #[test]
    fn test_partition_refuses_trivial_source() {
        let src = reservation_with(1);
        let dst = Reservation::new(1, TIMEOUT);
        assert!(!src.partition(&dst));
        assert_eq!(src.size(), 1);
        assert!(!src.stopped());
    }

    #[test]
    fn test_partitioned_row_rejects_mutation() {
        let src = reservation_with(4);
        let dst = Reservation::new(1, TIMEOUT);
        assert!(src.partition(&dst));
        // The partition signal alone closes the row: no inserts, no
        // erasures, no further requests until it is re-armed.
        src.insert(hash(9), 9);
        assert_eq!(src.size(), 2);
        assert_eq!(src.find_height_and_erase(&hash(0)), None);
        assert!(src.request().is_empty());
    }

    #[test]
    fn test_stopped_is_monotone() {
        let row = reservation_with(4);
        row.stop();
        assert!(row.stopped());
        row.insert(hash(9), 9);
        assert_eq!(row.size(), 4);
        assert!(row.stopped());
        assert_eq!(row.find_height_and_erase(&hash(0)), None);
        assert!(row.request().is_empty());
    }

    #[test]
    fn test_stop_keeps_pending_for_reassignment() {
        let row = reservation_with(4);
        assert!(row.try_bind());
        row.stop();
        assert_eq!(row.size(), 4);
        assert!(row.try_bind());
        assert!(!row.stopped());
        // The rebound slot re-requests everything still pending.
        assert_eq!(row.request().len(), 4);
    }

    #[test]
    fn test_try_bind_excludes_second_channel() {
        let row = Reservation::new(0, TIMEOUT);
        assert!(row.try_bind());
        assert!(!row.try_bind());
        row.stop();
        assert!(row.try_bind());
    }

    #[test]
    fn test_expired_after_inactivity() {
        let row = Reservation::new(0, Duration::ZERO);
        row.insert(hash(0), 0);
        std::thread::sleep(Duration::from_millis(5));
        assert!(row.expired());
        let fresh = Reservation::new(1, Duration::from_secs(60));
        assert!(!fresh.expired());
    }

    #[test]
    fn test_update_history_feeds_rate() {
        let row = reservation_with(1);
        assert!(row.idle());
        assert_eq!(row.normal(), 0.0);
        row.update_history(1000, Duration::ZERO);
        assert!(!row.idle());
        assert!(row.normal() > 0.0);
    }
}
