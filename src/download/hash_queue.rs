//! Queue of unassigned block hashes
//!
//! Header sync enqueues `(height, hash)` pairs as the candidate chain
//! extends; the reservation table drains them into download slots. Heights
//! are strictly increasing in enqueue order and dequeue preserves that
//! order.

use std::collections::VecDeque;
use std::sync::Mutex;

use crate::types::Hash;

/// FIFO of `(height, hash)` pairs awaiting reservation. Thread safe.
#[derive(Debug, Default)]
pub struct HashQueue {
    queue: Mutex<VecDeque<(u64, Hash)>>,
}

impl HashQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one hash at the back of the queue
    pub fn enqueue(&self, height: u64, hash: Hash) {
        self.queue.lock().unwrap().push_back((height, hash));
    }

    /// Remove and return the front entry; `None` when the queue is drained
    pub fn dequeue(&self) -> Option<(u64, Hash)> {
        self.queue.lock().unwrap().pop_front()
    }

    pub fn size(&self) -> usize {
        self.queue.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn hash(height: u64) -> Hash {
        let mut hash = [0u8; 32];
        hash[..8].copy_from_slice(&height.to_le_bytes());
        hash
    }

    #[test]
    fn test_dequeue_preserves_fifo_order() {
        let queue = HashQueue::new();
        for height in 0..10 {
            queue.enqueue(height, hash(height));
        }
        assert_eq!(queue.size(), 10);
        for height in 0..10 {
            assert_eq!(queue.dequeue(), Some((height, hash(height))));
        }
        assert!(queue.is_empty());
    }

    #[test]
    fn test_dequeue_empty_returns_none() {
        let queue = HashQueue::new();
        assert_eq!(queue.dequeue(), None);
    }

    #[test]
    fn test_concurrent_enqueue_dequeue() {
        let queue = Arc::new(HashQueue::new());
        let producer = {
            let queue = Arc::clone(&queue);
            std::thread::spawn(move || {
                for height in 0..1000 {
                    queue.enqueue(height, hash(height));
                }
            })
        };
        let consumer = {
            let queue = Arc::clone(&queue);
            std::thread::spawn(move || {
                let mut seen = 0usize;
                while seen < 1000 {
                    if queue.dequeue().is_some() {
                        seen += 1;
                    }
                }
            })
        };
        producer.join().unwrap();
        consumer.join().unwrap();
        assert!(queue.is_empty());
    }
}
