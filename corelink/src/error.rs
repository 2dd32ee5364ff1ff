//! Error types for cross-core channel operations

use thiserror::Error;

/// Errors that can occur during channel operations
#[derive(Error, Debug)]
pub enum ChannelError {
    /// Semaphore index outside the 32-entry hardware bank
    #[error("invalid semaphore index: {index} (bank holds 0-31)")]
    InvalidSemaphoreIndex {
        /// Requested semaphore index
        index: u8,
    },

    /// Raw core identifier does not match either defined core
    #[error("invalid core id: {value:#x}")]
    InvalidCoreId {
        /// Raw register field value
        value: u8,
    },

    /// Outgoing frame exceeds the configured maximum frame size
    #[error("frame size {size} exceeds maximum {max}")]
    FrameTooLarge {
        /// Total frame size (header + payload) in bytes
        size: usize,
        /// Configured maximum frame size in bytes
        max: usize,
    },

    /// Stored frame claims more bytes than the queue holds
    #[error("queue underflow: frame needs {needed} bytes, queue holds {stored}")]
    Underflow {
        /// Bytes the frame header claims
        needed: u32,
        /// Bytes actually stored in the queue
        stored: u32,
    },

    /// Stored frame length exceeds the receive buffer capacity
    #[error("corrupt frame: payload length {len} exceeds buffer capacity {max}")]
    CorruptFrame {
        /// Payload length read from the ring
        len: u16,
        /// Receive buffer capacity in bytes
        max: usize,
    },

    /// Bounded lock retry exhausted without acquiring the semaphore
    #[error("semaphore {index} still contended after {attempts} attempts")]
    LockContended {
        /// Semaphore index that stayed locked
        index: u8,
        /// Number of take attempts made
        attempts: u32,
    },

    /// Region does not start with the expected magic bytes
    #[error("shared region magic mismatch - region not initialized or foreign")]
    BadMagic,

    /// Region was laid out by an incompatible build
    #[error("shared region layout mismatch: expected {expected:#010x}, found {found:#010x}")]
    LayoutMismatch {
        /// Layout hash this build computes
        expected: u32,
        /// Layout hash stored in the region header
        found: u32,
    },

    /// Region geometry differs from this core's configuration
    #[error("region geometry mismatch: {field} is {found}, expected {expected}")]
    GeometryMismatch {
        /// Name of the mismatched field
        field: &'static str,
        /// Value this core's configuration expects
        expected: u32,
        /// Value stored in the region header
        found: u32,
    },

    /// Backing memory is too small for the configured layout
    #[error("region too small: layout needs {needed} bytes, backing holds {len}")]
    RegionTooSmall {
        /// Bytes the layout requires
        needed: usize,
        /// Bytes the backing provides
        len: usize,
    },

    /// IO error while creating or mapping a file-backed region
    #[error("IO error: {source}")]
    Io {
        /// Source IO error
        #[from]
        source: std::io::Error,
    },
}

/// Result type for channel operations
pub type ChannelResult<T> = Result<T, ChannelError>;
