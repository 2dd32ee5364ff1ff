//! Cross-core FIFO message queues.
//!
//! Two independent unidirectional byte rings, one per direction, each
//! guarded by its own hardware semaphore. A send or read is a single
//! transaction: take the semaphore, move whole frames, update counters,
//! release. The only lock-free access is the `has_messages` peek, whose
//! staleness costs at most one poll cycle.
//!
//! Backpressure is drop-not-block: a producer facing a full ring (a
//! stalled or debugger-halted consumer) discards the outgoing message
//! and reports it, rather than overwriting stored frames or spinning
//! forever on space that may never appear.

use std::sync::Arc;
use tracing::{error, warn};

use crate::config::ChannelConfig;
use crate::error::{ChannelError, ChannelResult};
use crate::frame::{FrameBuffer, MessageKind, FRAME_HEADER_SIZE};
use crate::hsem::{CoreId, HsemBank, SEM_M4_TO_M7, SEM_M7_TO_M4};
use crate::region::{ChannelRegion, QueueView};
use crate::stats::QueueStats;

/// One of the two unidirectional channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum Direction {
    /// Cortex-M4 produces, Cortex-M7 consumes.
    M4ToM7 = 0,
    /// Cortex-M7 produces, Cortex-M4 consumes.
    M7ToM4 = 1,
}

impl Direction {
    /// Both directions, in record order.
    pub const ALL: [Direction; 2] = [Direction::M4ToM7, Direction::M7ToM4];

    /// Index of this direction's record in the shared region.
    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Hardware semaphore dedicated to this direction.
    #[inline]
    pub const fn sem_index(self) -> u8 {
        match self {
            Direction::M4ToM7 => SEM_M4_TO_M7,
            Direction::M7ToM4 => SEM_M7_TO_M4,
        }
    }

    /// Core that sends on this direction.
    #[inline]
    pub const fn producer(self) -> CoreId {
        match self {
            Direction::M4ToM7 => CoreId::Cm4,
            Direction::M7ToM4 => CoreId::Cm7,
        }
    }

    /// Core that polls and reads this direction.
    #[inline]
    pub const fn consumer(self) -> CoreId {
        self.producer().peer()
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::M4ToM7 => write!(f, "M4->M7"),
            Direction::M7ToM4 => write!(f, "M7->M4"),
        }
    }
}

/// Result of a send transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// Frame appended to the ring.
    Enqueued,
    /// Ring had less free space than the frame needed; message
    /// discarded, queue state untouched.
    Dropped,
}

/// Result of a read transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    /// Oldest frame copied into the caller's buffer.
    Frame,
    /// No message was pending; buffer untouched.
    Empty,
}

/// One core's handle to both directions of the channel.
///
/// Each core constructs its own handle with its own [`CoreId`]; the
/// handle claims semaphores on behalf of that core only.
pub struct CrossCoreQueue<B: HsemBank> {
    core: CoreId,
    region: Arc<ChannelRegion>,
    bank: Arc<B>,
    config: ChannelConfig,
}

impl<B: HsemBank> CrossCoreQueue<B> {
    /// Create a handle for `core` over an already-mapped region.
    ///
    /// The bank must have been initialized (`HsemBank::init`) during
    /// bring-up, before either direction is initialized.
    pub fn new(
        core: CoreId,
        region: Arc<ChannelRegion>,
        bank: Arc<B>,
        config: &ChannelConfig,
    ) -> Self {
        Self {
            core,
            region,
            bank,
            config: config.clone(),
        }
    }

    /// Core this handle claims semaphores as.
    #[inline]
    pub fn core(&self) -> CoreId {
        self.core
    }

    /// Zero one direction's queue state and bind its semaphore index.
    ///
    /// Once per direction, by whichever core runs first - there is no
    /// "already initialized" guard, so the boot handshake must order
    /// this before the peer starts using the channel.
    pub fn initialize(&self, direction: Direction) {
        let view = self.region.queue_view(direction);
        view.zero();
        view.set_sem_index(direction.sem_index() as u32);
    }

    /// Lock-free peek: is at least one frame pending?
    ///
    /// Best-effort and momentarily stale; a false negative only delays
    /// processing by one poll cycle.
    #[inline]
    pub fn has_messages(&self, direction: Direction) -> bool {
        self.region.queue_view(direction).pending() > 0
    }

    /// Serialize one frame into `direction`'s ring.
    ///
    /// # Errors
    ///
    /// - [`ChannelError::FrameTooLarge`] if header + payload exceeds the
    ///   configured maximum frame size
    /// - [`ChannelError::LockContended`] if a bounded retry policy runs
    ///   out of take attempts
    pub fn send_message(
        &self,
        direction: Direction,
        kind: MessageKind,
        payload: &[u8],
    ) -> ChannelResult<SendOutcome> {
        let frame_size = FRAME_HEADER_SIZE + payload.len();
        let max = self.config.max_frame_size as usize;
        // The second bound guards the 16-bit length prefix against a
        // config that skipped validate(); the prefix must never disagree
        // with the bytes written.
        if frame_size > max || payload.len() > u16::MAX as usize {
            return Err(ChannelError::FrameTooLarge {
                size: frame_size,
                max,
            });
        }

        let view = self.region.queue_view(direction);

        // Space check before any byte is written. Checking ahead of the
        // lock is sound: only the consumer changes free space, and it
        // can only grow it.
        let free = view.capacity - view.bytes_in_queue();
        if (free as usize) < frame_size {
            error!(
                %direction,
                frame_size,
                free,
                "message queue overflow, message dropped"
            );
            return Ok(SendOutcome::Dropped);
        }

        let sem = direction.sem_index();
        self.take_spin(sem)?;

        let mut head = view.head();
        head = ring_write(&view, head, &kind.0.to_le_bytes());
        head = ring_write(&view, head, &(payload.len() as u16).to_le_bytes());
        head = ring_write(&view, head, payload);
        view.set_head(head);

        let bytes = view.bytes_in_queue() + frame_size as u32;
        view.set_bytes_in_queue(bytes);
        if bytes > view.max_bytes_in_queue() {
            view.set_max_bytes_in_queue(bytes);
        }

        let pending = view.pending() + 1;
        view.set_pending(pending);
        if pending > view.max_pending() {
            view.set_max_pending(pending);
        }

        self.bank.release(sem, self.core)?;
        Ok(SendOutcome::Enqueued)
    }

    /// Deserialize the oldest frame from `direction` into `buffer`.
    ///
    /// Returns [`ReadOutcome::Empty`] (with a logged warning) when no
    /// message is pending; the buffer is left untouched.
    ///
    /// # Errors
    ///
    /// - [`ChannelError::Underflow`] if the stored frame claims more
    ///   bytes than the queue holds (corruption)
    /// - [`ChannelError::CorruptFrame`] if the stored length exceeds the
    ///   buffer's capacity
    /// - [`ChannelError::LockContended`] if a bounded retry policy runs
    ///   out of take attempts
    pub fn read_message(
        &self,
        direction: Direction,
        buffer: &mut FrameBuffer,
    ) -> ChannelResult<ReadOutcome> {
        let view = self.region.queue_view(direction);

        if view.pending() == 0 {
            warn!(%direction, "attempted to read empty message queue");
            return Ok(ReadOutcome::Empty);
        }

        let sem = direction.sem_index();
        self.take_spin(sem)?;

        let result = self.read_frame(&view, buffer);
        self.bank.release(sem, self.core)?;
        result
    }

    fn read_frame(
        &self,
        view: &QueueView,
        buffer: &mut FrameBuffer,
    ) -> ChannelResult<ReadOutcome> {
        let mut tail = view.tail();

        let mut kind = [0u8; 2];
        tail = ring_read(view, tail, &mut kind);
        let mut len = [0u8; 2];
        tail = ring_read(view, tail, &mut len);
        let len = u16::from_le_bytes(len);

        let frame_size = FRAME_HEADER_SIZE as u32 + len as u32;
        let stored = view.bytes_in_queue();
        if frame_size > stored {
            return Err(ChannelError::Underflow {
                needed: frame_size,
                stored,
            });
        }
        if len as usize > buffer.capacity() {
            return Err(ChannelError::CorruptFrame {
                len,
                max: buffer.capacity(),
            });
        }

        tail = ring_read(view, tail, &mut buffer.data[..len as usize]);
        view.set_tail(tail);

        view.set_bytes_in_queue(stored - frame_size);
        view.set_pending(view.pending() - 1);

        buffer.kind = MessageKind(u16::from_le_bytes(kind));
        buffer.len = len;
        Ok(ReadOutcome::Frame)
    }

    /// Diagnostic snapshot of one direction's counters. Lock-free.
    pub fn stats(&self, direction: Direction) -> QueueStats {
        self.region.stats(direction)
    }

    /// Spin on `take` until acquired, or until a bounded retry policy
    /// is exhausted.
    fn take_spin(&self, sem: u8) -> ChannelResult<()> {
        match self.config.max_lock_attempts {
            None => {
                // Reference behavior: wait forever. A debugger-halted
                // peer holding the semaphore blocks this core here.
                while !self.bank.take(sem, self.core)? {
                    std::hint::spin_loop();
                }
                Ok(())
            }
            Some(bound) => {
                for _ in 0..bound.get() {
                    if self.bank.take(sem, self.core)? {
                        return Ok(());
                    }
                    std::hint::spin_loop();
                }
                error!(sem, attempts = bound.get(), "semaphore take retry exhausted");
                Err(ChannelError::LockContended {
                    index: sem,
                    attempts: bound.get(),
                })
            }
        }
    }
}

/// Append `data` at ring index `at`, returning the next write index.
fn ring_write(view: &QueueView, at: u32, data: &[u8]) -> u32 {
    let mut at = at;
    for &byte in data {
        view.write_byte(at, byte);
        at = (at + 1) % view.capacity;
    }
    at
}

/// Copy `dest.len()` bytes out of the ring starting at `at`, returning
/// the next read index.
fn ring_read(view: &QueueView, at: u32, dest: &mut [u8]) -> u32 {
    let mut at = at;
    for byte in dest {
        *byte = view.read_byte(at);
        at = (at + 1) % view.capacity;
    }
    at
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hsem::SoftHsemBank;

    fn setup(config: &ChannelConfig) -> (CrossCoreQueue<SoftHsemBank>, CrossCoreQueue<SoftHsemBank>) {
        let region = Arc::new(ChannelRegion::anonymous(config).unwrap());
        let bank = Arc::new(SoftHsemBank::new());
        bank.init();

        let m4 = CrossCoreQueue::new(CoreId::Cm4, Arc::clone(&region), Arc::clone(&bank), config);
        let m7 = CrossCoreQueue::new(CoreId::Cm7, region, bank, config);
        m4.initialize(Direction::M4ToM7);
        m4.initialize(Direction::M7ToM4);
        (m4, m7)
    }

    #[test]
    fn direction_wiring() {
        assert_eq!(Direction::M4ToM7.producer(), CoreId::Cm4);
        assert_eq!(Direction::M4ToM7.consumer(), CoreId::Cm7);
        assert_eq!(Direction::M7ToM4.producer(), CoreId::Cm7);
        assert_eq!(Direction::M4ToM7.sem_index(), 0);
        assert_eq!(Direction::M7ToM4.sem_index(), 1);
    }

    #[test]
    fn initialize_binds_sem_index() {
        let config = ChannelConfig::default();
        let (m4, _m7) = setup(&config);
        for direction in Direction::ALL {
            let stats = m4.stats(direction);
            assert_eq!(stats.pending_messages, 0);
            assert_eq!(stats.bytes_in_queue, 0);
            // The snapshot reads the semaphore binding back out of the
            // shared record, not out of the direction enum.
            assert_eq!(stats.sem_index, direction.sem_index() as u32);
        }
    }

    #[test]
    fn oversize_frame_is_fatal() {
        let config = ChannelConfig {
            capacity: 64,
            max_frame_size: 16,
            max_lock_attempts: None,
        };
        let (m4, _m7) = setup(&config);

        let payload = [0u8; 13]; // 4 + 13 > 16
        assert!(matches!(
            m4.send_message(Direction::M4ToM7, MessageKind(1), &payload),
            Err(ChannelError::FrameTooLarge { size: 17, max: 16 })
        ));
        // Exactly max is fine.
        let payload = [0u8; 12];
        assert_eq!(
            m4.send_message(Direction::M4ToM7, MessageKind(1), &payload)
                .unwrap(),
            SendOutcome::Enqueued
        );
    }

    #[test]
    fn send_leaves_semaphore_free() {
        let config = ChannelConfig::default();
        let (m4, m7) = setup(&config);

        m4.send_message(Direction::M4ToM7, MessageKind(2), b"hi")
            .unwrap();

        // Consumer can immediately take the same semaphore.
        let mut buf = FrameBuffer::for_config(&config);
        assert_eq!(
            m7.read_message(Direction::M4ToM7, &mut buf).unwrap(),
            ReadOutcome::Frame
        );
        assert_eq!(buf.payload(), b"hi");
    }

    #[test]
    fn directions_are_independent() {
        let config = ChannelConfig::default();
        let (m4, m7) = setup(&config);

        m4.send_message(Direction::M4ToM7, MessageKind(1), b"to m7")
            .unwrap();
        m7.send_message(Direction::M7ToM4, MessageKind(2), b"to m4")
            .unwrap();

        assert!(m7.has_messages(Direction::M4ToM7));
        assert!(m4.has_messages(Direction::M7ToM4));

        let mut buf = FrameBuffer::for_config(&config);
        m7.read_message(Direction::M4ToM7, &mut buf).unwrap();
        assert_eq!(buf.payload(), b"to m7");
        assert!(m4.has_messages(Direction::M7ToM4));

        m4.read_message(Direction::M7ToM4, &mut buf).unwrap();
        assert_eq!(buf.payload(), b"to m4");
        assert!(!m4.has_messages(Direction::M7ToM4));
    }

    #[test]
    fn bounded_retry_reports_contention() {
        let config = ChannelConfig {
            max_lock_attempts: std::num::NonZeroU32::new(8),
            ..ChannelConfig::default()
        };
        let region = Arc::new(ChannelRegion::anonymous(&config).unwrap());
        let bank = Arc::new(SoftHsemBank::new());
        bank.init();
        let m4 = CrossCoreQueue::new(
            CoreId::Cm4,
            Arc::clone(&region),
            Arc::clone(&bank),
            &config,
        );
        m4.initialize(Direction::M4ToM7);

        // Peer wedged holding the semaphore (debugger-halt model).
        assert!(bank.take(Direction::M4ToM7.sem_index(), CoreId::Cm7).unwrap());

        assert!(matches!(
            m4.send_message(Direction::M4ToM7, MessageKind(0), b"x"),
            Err(ChannelError::LockContended { index: 0, attempts: 8 })
        ));

        // Queue state untouched by the failed transaction.
        assert_eq!(m4.stats(Direction::M4ToM7).bytes_in_queue, 0);
    }

    #[test]
    fn length_prefix_never_truncates() {
        // A config that skipped validate() can permit frames whose
        // payload would not fit the 16-bit length prefix; those must be
        // rejected, not written with a wrapped length.
        let config = ChannelConfig {
            capacity: 1 << 18,
            max_frame_size: 70_000,
            max_lock_attempts: None,
        };
        assert!(config.validate().is_err());
        let (m4, _m7) = setup(&config);

        let payload = vec![0u8; u16::MAX as usize + 1];
        assert!(matches!(
            m4.send_message(Direction::M4ToM7, MessageKind(0), &payload),
            Err(ChannelError::FrameTooLarge { .. })
        ));
        assert_eq!(m4.stats(Direction::M4ToM7).bytes_in_queue, 0);

        // The largest representable payload still goes through.
        let payload = vec![0u8; u16::MAX as usize];
        assert_eq!(
            m4.send_message(Direction::M4ToM7, MessageKind(0), &payload)
                .unwrap(),
            SendOutcome::Enqueued
        );
    }

    #[test]
    fn zero_length_payload_roundtrip() {
        let config = ChannelConfig::default();
        let (m4, m7) = setup(&config);

        m4.send_message(Direction::M4ToM7, MessageKind(9), &[])
            .unwrap();

        let mut buf = FrameBuffer::for_config(&config);
        assert_eq!(
            m7.read_message(Direction::M4ToM7, &mut buf).unwrap(),
            ReadOutcome::Frame
        );
        assert_eq!(buf.kind(), MessageKind(9));
        assert_eq!(buf.payload().len(), 0);
        assert_eq!(m4.stats(Direction::M4ToM7).bytes_in_queue, 0);
    }

    #[test]
    fn high_water_marks_are_monotonic() {
        let config = ChannelConfig::default();
        let (m4, m7) = setup(&config);
        let mut buf = FrameBuffer::for_config(&config);

        m4.send_message(Direction::M4ToM7, MessageKind(0), &[0; 10])
            .unwrap();
        m4.send_message(Direction::M4ToM7, MessageKind(0), &[0; 10])
            .unwrap();
        let peak = m4.stats(Direction::M4ToM7);
        assert_eq!(peak.max_pending_messages, 2);
        assert_eq!(peak.max_bytes_in_queue, 28);

        m7.read_message(Direction::M4ToM7, &mut buf).unwrap();
        m7.read_message(Direction::M4ToM7, &mut buf).unwrap();

        // Marks survive the drain.
        let drained = m4.stats(Direction::M4ToM7);
        assert_eq!(drained.pending_messages, 0);
        assert_eq!(drained.bytes_in_queue, 0);
        assert_eq!(drained.max_pending_messages, 2);
        assert_eq!(drained.max_bytes_in_queue, 28);
    }
}
