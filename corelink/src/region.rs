//! Shared region placement and layout.
//!
//! Both cores address one fixed memory range that holds a region header
//! followed by the two directions' queue records. The records are plain
//! `#[repr(C)]` structs with explicit reserved fields and static layout
//! assertions, because the two cores compile independently and interpret
//! the same physical bytes - any padding disagreement corrupts the
//! channel silently.
//!
//! On target the range is linker-placed shared SRAM wrapped with
//! [`ChannelRegion::from_raw`]. On a host the same layout goes into an
//! anonymous or file-backed mapping, which lets a test or demo pair of
//! processes exercise the real byte protocol.

use memmap2::MmapMut;
use static_assertions::const_assert_eq;
use std::fs::OpenOptions;
use std::path::Path;
use std::ptr::{self, addr_of, addr_of_mut};

use crate::config::ChannelConfig;
use crate::error::{ChannelError, ChannelResult};
use crate::queue::Direction;
use crate::stats::QueueStats;

/// Magic bytes identifying an initialized channel region.
pub const REGION_MAGIC: [u8; 8] = *b"CORELNK\0";

/// Region header - 32 bytes at the start of the shared range.
///
/// Stamped by whichever core initializes the region first; the attaching
/// peer validates magic, layout hash, and geometry before touching the
/// queues.
#[derive(Debug, Clone, Copy)]
#[repr(C)]
pub struct RegionHeader {
    /// Magic bytes: must be [`REGION_MAGIC`].
    pub magic: [u8; 8],
    /// Compile-time hash of the record layout; both cores' builds must
    /// agree.
    pub layout_version: u32,
    /// Per-direction ring capacity the region was laid out with.
    pub capacity: u32,
    /// Maximum frame size the region was laid out with.
    pub max_frame_size: u32,
    /// Reserved, zero.
    pub _reserved: [u8; 12],
}

/// Per-direction queue record - 32 bytes, followed by `capacity` buffer
/// bytes.
///
/// Mutated by both cores under the direction's semaphore; every field
/// access goes through volatile reads/writes.
#[derive(Debug, Clone, Copy)]
#[repr(C)]
pub struct QueueHeader {
    /// Complete frames currently stored.
    pub pending_messages: u32,
    /// High-water mark of `pending_messages`. Diagnostic only.
    pub max_pending_messages: u32,
    /// Bytes currently stored.
    pub bytes_in_queue: u32,
    /// High-water mark of `bytes_in_queue`. Diagnostic only.
    pub max_bytes_in_queue: u32,
    /// Buffer index where the next byte will be written.
    pub head: u32,
    /// Buffer index where the next byte will be read.
    pub tail: u32,
    /// Hardware semaphore guarding this queue.
    pub sem_index: u32,
    /// Reserved, zero.
    pub _reserved: u32,
}

const_assert_eq!(std::mem::size_of::<RegionHeader>(), 32);
const_assert_eq!(std::mem::size_of::<QueueHeader>(), 32);
const_assert_eq!(std::mem::align_of::<RegionHeader>(), 4);
const_assert_eq!(std::mem::align_of::<QueueHeader>(), 4);

/// Compile-time hash of the shared record layout.
///
/// Derived from the record sizes and alignments; if either struct
/// changes shape, attach fails with a layout mismatch instead of the
/// two cores silently disagreeing on offsets.
pub const fn layout_version() -> u32 {
    let rh = std::mem::size_of::<RegionHeader>() as u32;
    let qh = std::mem::size_of::<QueueHeader>() as u32;
    let align = std::mem::align_of::<QueueHeader>() as u32;
    (rh.wrapping_mul(0x9E37_79B9) ^ qh.wrapping_mul(0x517C_C1B7)) ^ align
}

/// Bytes a region with this configuration occupies.
pub const fn required_len(config: &ChannelConfig) -> usize {
    std::mem::size_of::<RegionHeader>()
        + 2 * (std::mem::size_of::<QueueHeader>() + config.capacity as usize)
}

enum Backing {
    Mmap(MmapMut),
    Raw { ptr: *mut u8, len: usize },
}

/// One channel region: header plus both directions' queue records.
pub struct ChannelRegion {
    backing: Backing,
    capacity: u32,
    max_frame_size: u32,
}

// The region is raw shared memory; all mutation is serialized by the
// hardware semaphore layer above, and the deliberately lock-free reads
// are single u32 loads.
unsafe impl Send for ChannelRegion {}
unsafe impl Sync for ChannelRegion {}

impl ChannelRegion {
    /// Anonymous in-process region, for tests and single-process demos.
    pub fn anonymous(config: &ChannelConfig) -> ChannelResult<Self> {
        let mmap = MmapMut::map_anon(required_len(config))?;
        let region = Self {
            backing: Backing::Mmap(mmap),
            capacity: config.capacity,
            max_frame_size: config.max_frame_size,
        };
        region.init_header();
        Ok(region)
    }

    /// Create a file-backed region, failing if the file already exists.
    ///
    /// A second process attaches with [`ChannelRegion::open_file`]; the
    /// pair then shares the mapping the way the two cores share SRAM.
    pub fn create_file(path: &Path, config: &ChannelConfig) -> ChannelResult<Self> {
        let len = required_len(config);
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path)?;
        file.set_len(len as u64)?;
        // Safety: freshly created file of exactly `len` bytes.
        let mmap = unsafe { MmapMut::map_mut(&file)? };
        let region = Self {
            backing: Backing::Mmap(mmap),
            capacity: config.capacity,
            max_frame_size: config.max_frame_size,
        };
        region.init_header();
        Ok(region)
    }

    /// Attach to an existing file-backed region.
    ///
    /// Geometry is recovered from the region header after magic and
    /// layout validation.
    pub fn open_file(path: &Path) -> ChannelResult<Self> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        let len = file.metadata()?.len() as usize;
        if len < std::mem::size_of::<RegionHeader>() {
            return Err(ChannelError::RegionTooSmall {
                needed: std::mem::size_of::<RegionHeader>(),
                len,
            });
        }
        // Safety: mapping an existing file we hold open read/write.
        let mmap = unsafe { MmapMut::map_mut(&file)? };
        let header = unsafe { ptr::read_volatile(mmap.as_ptr() as *const RegionHeader) };
        validate_header_fields(&header)?;

        let config = ChannelConfig {
            capacity: header.capacity,
            max_frame_size: header.max_frame_size,
            max_lock_attempts: None,
        };
        let needed = required_len(&config);
        if len < needed {
            return Err(ChannelError::RegionTooSmall { needed, len });
        }
        Ok(Self {
            backing: Backing::Mmap(mmap),
            capacity: header.capacity,
            max_frame_size: header.max_frame_size,
        })
    }

    /// Wrap a fixed shared address range (target use: linker-placed
    /// shared SRAM).
    ///
    /// Does not touch the header - the platform's boot handshake decides
    /// which core calls [`init_header`](Self::init_header) and which
    /// calls [`validate_header`](Self::validate_header).
    ///
    /// # Safety
    ///
    /// `ptr` must point to at least `len` bytes of memory that both
    /// cores address identically, valid for the life of the program, and
    /// not aliased by anything outside this channel.
    pub unsafe fn from_raw(
        ptr: *mut u8,
        len: usize,
        config: &ChannelConfig,
    ) -> ChannelResult<Self> {
        let needed = required_len(config);
        if len < needed {
            return Err(ChannelError::RegionTooSmall { needed, len });
        }
        Ok(Self {
            backing: Backing::Raw { ptr, len },
            capacity: config.capacity,
            max_frame_size: config.max_frame_size,
        })
    }

    /// Stamp the region header. First-writer-wins: runs on whichever
    /// core initializes the channel, before the peer attaches.
    pub fn init_header(&self) {
        let header = RegionHeader {
            magic: REGION_MAGIC,
            layout_version: layout_version(),
            capacity: self.capacity,
            max_frame_size: self.max_frame_size,
            _reserved: [0; 12],
        };
        // Pre-concurrency by design; a volatile store still keeps the
        // compiler from eliding the write to shared memory.
        unsafe { ptr::write_volatile(self.base() as *mut RegionHeader, header) };
    }

    /// Validate magic, layout hash, and geometry against this core's
    /// view of the region.
    pub fn validate_header(&self) -> ChannelResult<()> {
        let header = self.header();
        validate_header_fields(&header)?;
        if header.capacity != self.capacity {
            return Err(ChannelError::GeometryMismatch {
                field: "capacity",
                expected: self.capacity,
                found: header.capacity,
            });
        }
        if header.max_frame_size != self.max_frame_size {
            return Err(ChannelError::GeometryMismatch {
                field: "max_frame_size",
                expected: self.max_frame_size,
                found: header.max_frame_size,
            });
        }
        Ok(())
    }

    /// Volatile snapshot of the region header.
    pub fn header(&self) -> RegionHeader {
        unsafe { ptr::read_volatile(self.base() as *const RegionHeader) }
    }

    /// Per-direction ring capacity in bytes.
    #[inline]
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Maximum frame size in bytes.
    #[inline]
    pub fn max_frame_size(&self) -> u32 {
        self.max_frame_size
    }

    /// Total bytes in the backing range.
    pub fn len(&self) -> usize {
        match &self.backing {
            Backing::Mmap(mmap) => mmap.len(),
            Backing::Raw { len, .. } => *len,
        }
    }

    /// A mapped region is never empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Lock-free diagnostic snapshot of one direction's counters.
    ///
    /// Momentarily stale by design; never used for control decisions.
    pub fn stats(&self, direction: Direction) -> QueueStats {
        let view = self.queue_view(direction);
        QueueStats {
            direction,
            sem_index: view.sem_index(),
            pending_messages: view.pending(),
            max_pending_messages: view.max_pending(),
            bytes_in_queue: view.bytes_in_queue(),
            max_bytes_in_queue: view.max_bytes_in_queue(),
            capacity: self.capacity,
        }
    }

    #[inline]
    fn base(&self) -> *mut u8 {
        match &self.backing {
            Backing::Mmap(mmap) => mmap.as_ptr() as *mut u8,
            Backing::Raw { ptr, .. } => *ptr,
        }
    }

    fn queue_offset(&self, direction: Direction) -> usize {
        std::mem::size_of::<RegionHeader>()
            + direction.index()
                * (std::mem::size_of::<QueueHeader>() + self.capacity as usize)
    }

    pub(crate) fn queue_view(&self, direction: Direction) -> QueueView {
        let offset = self.queue_offset(direction);
        // Safety: from_raw/mapping constructors guarantee the backing
        // covers required_len, which contains both queue blocks.
        unsafe {
            let hdr = self.base().add(offset) as *mut QueueHeader;
            let buf = self
                .base()
                .add(offset + std::mem::size_of::<QueueHeader>());
            QueueView {
                hdr,
                buf,
                capacity: self.capacity,
            }
        }
    }
}

fn validate_header_fields(header: &RegionHeader) -> ChannelResult<()> {
    if header.magic != REGION_MAGIC {
        return Err(ChannelError::BadMagic);
    }
    if header.layout_version != layout_version() {
        return Err(ChannelError::LayoutMismatch {
            expected: layout_version(),
            found: header.layout_version,
        });
    }
    Ok(())
}

/// Raw volatile accessors for one direction's queue record.
///
/// Every multi-byte field is read and written only while holding the
/// direction's semaphore, except the deliberately lock-free
/// `pending_messages` peek and the diagnostic snapshot.
#[derive(Clone, Copy)]
pub(crate) struct QueueView {
    hdr: *mut QueueHeader,
    buf: *mut u8,
    pub(crate) capacity: u32,
}

macro_rules! field_accessors {
    ($get:ident, $set:ident, $field:ident) => {
        #[inline]
        pub(crate) fn $get(&self) -> u32 {
            unsafe { addr_of!((*self.hdr).$field).read_volatile() }
        }

        #[inline]
        pub(crate) fn $set(&self, value: u32) {
            unsafe { addr_of_mut!((*self.hdr).$field).write_volatile(value) }
        }
    };
}

impl QueueView {
    field_accessors!(pending, set_pending, pending_messages);
    field_accessors!(max_pending, set_max_pending, max_pending_messages);
    field_accessors!(bytes_in_queue, set_bytes_in_queue, bytes_in_queue);
    field_accessors!(max_bytes_in_queue, set_max_bytes_in_queue, max_bytes_in_queue);
    field_accessors!(head, set_head, head);
    field_accessors!(tail, set_tail, tail);
    field_accessors!(sem_index, set_sem_index, sem_index);

    #[inline]
    fn set_reserved(&self, value: u32) {
        unsafe { addr_of_mut!((*self.hdr)._reserved).write_volatile(value) }
    }

    #[inline]
    pub(crate) fn write_byte(&self, index: u32, byte: u8) {
        debug_assert!(index < self.capacity);
        unsafe { self.buf.add(index as usize).write_volatile(byte) }
    }

    #[inline]
    pub(crate) fn read_byte(&self, index: u32) -> u8 {
        debug_assert!(index < self.capacity);
        unsafe { self.buf.add(index as usize).read_volatile() }
    }

    /// Zero the whole record, buffer included. Initialization only -
    /// runs before the peer depends on the channel.
    pub(crate) fn zero(&self) {
        self.set_pending(0);
        self.set_max_pending(0);
        self.set_bytes_in_queue(0);
        self.set_max_bytes_in_queue(0);
        self.set_head(0);
        self.set_tail(0);
        self.set_sem_index(0);
        self.set_reserved(0);
        unsafe { ptr::write_bytes(self.buf, 0, self.capacity as usize) };
    }
}
