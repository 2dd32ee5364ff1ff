//! Diagnostic counter snapshots.
//!
//! High-water marks live in the shared queue records and only ever grow;
//! they exist for sizing and post-mortem inspection, never for control
//! decisions.

use crate::queue::Direction;

/// Point-in-time view of one direction's counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueStats {
    /// Direction this snapshot describes.
    pub direction: Direction,
    /// Hardware semaphore index the record was bound to at
    /// initialization.
    pub sem_index: u32,
    /// Complete frames waiting to be read.
    pub pending_messages: u32,
    /// Largest number of frames ever pending at once.
    pub max_pending_messages: u32,
    /// Bytes currently stored.
    pub bytes_in_queue: u32,
    /// Largest number of bytes ever stored at once.
    pub max_bytes_in_queue: u32,
    /// Ring capacity in bytes.
    pub capacity: u32,
}

impl QueueStats {
    /// Bytes currently free in the ring.
    #[inline]
    pub fn free_bytes(&self) -> u32 {
        self.capacity - self.bytes_in_queue
    }
}

impl std::fmt::Display for QueueStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} (sem {}): {} pending (peak {}), {}/{} bytes (peak {})",
            self.direction,
            self.sem_index,
            self.pending_messages,
            self.max_pending_messages,
            self.bytes_in_queue,
            self.capacity,
            self.max_bytes_in_queue,
        )
    }
}
