//! Wire format for queued messages.
//!
//! Each message occupies one length-prefixed frame in its direction's
//! byte stream:
//!
//! ```text
//! [kind: u16 LE][len: u16 LE][payload: len bytes]
//! ```
//!
//! There is no delimiter and no checksum; frames are written and read
//! strictly whole under the direction's semaphore, so a partial frame is
//! never visible. The queue itself is agnostic to `kind` values - the
//! dispatch layer on each core owns their meaning.

use crate::config::ChannelConfig;

/// Bytes of frame header preceding the payload: kind (2) + length (2).
pub const FRAME_HEADER_SIZE: usize = 4;

/// Message-kind identifier carried in the frame header.
///
/// Opaque to the queue; 16 bits on the wire, little-endian.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageKind(
    /// Raw kind code as it appears on the wire.
    pub u16,
);

/// Caller-owned receive buffer for [`read_message`].
///
/// Allocated once, sized to the configured maximum payload; the queue
/// never writes past the received frame's length.
///
/// [`read_message`]: crate::queue::CrossCoreQueue::read_message
#[derive(Debug)]
pub struct FrameBuffer {
    pub(crate) kind: MessageKind,
    pub(crate) len: u16,
    pub(crate) data: Vec<u8>,
}

impl FrameBuffer {
    /// Allocate a buffer large enough for any frame `config` permits.
    pub fn for_config(config: &ChannelConfig) -> Self {
        Self {
            kind: MessageKind(0),
            len: 0,
            data: vec![0; config.max_payload()],
        }
    }

    /// Kind of the most recently received frame.
    #[inline]
    pub fn kind(&self) -> MessageKind {
        self.kind
    }

    /// Payload of the most recently received frame.
    #[inline]
    pub fn payload(&self) -> &[u8] {
        &self.data[..self.len as usize]
    }

    /// Payload bytes this buffer can hold.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.data.len()
    }
}
