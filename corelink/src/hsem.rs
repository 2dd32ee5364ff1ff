//! Hardware semaphore arbiter.
//!
//! A bank of 32 single-cycle-atomic lock registers shared by the two
//! cores. Each register holds a lock bit, the owning core's id field,
//! and a process sub-field that is always zero in this design. Taking a
//! semaphore is a one-step read of its lock register: the read itself
//! attempts the claim, and the returned value tells the caller whether
//! it now owns the lock.
//!
//! The bank sits behind the [`HsemBank`] trait so the queue layer can
//! run against [`MmioHsemBank`] on target and [`SoftHsemBank`] (plain
//! atomics) in host tests.

use std::sync::atomic::{AtomicU32, Ordering};

use crate::error::{ChannelError, ChannelResult};

/// Number of semaphores in the hardware bank.
pub const HSEM_COUNT: u8 = 32;

/// Semaphore guarding the M4 -> M7 queue.
pub const SEM_M4_TO_M7: u8 = 0;

/// Semaphore guarding the M7 -> M4 queue.
pub const SEM_M7_TO_M4: u8 = 1;

/// Lock bit of a semaphore register.
const LOCK_BIT: u32 = 1 << 31;

/// Bit position of the core-id field.
const CORE_ID_POS: u32 = 8;

/// Mask of the core-id field.
const CORE_ID_MASK: u32 = 0xF << CORE_ID_POS;

/// Identifies which physical core issued a semaphore operation.
///
/// The discriminants are the reference silicon's bus-master ids as they
/// appear in the semaphore register core-id field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CoreId {
    /// Cortex-M4 core.
    Cm4 = 1,
    /// Cortex-M7 core.
    Cm7 = 3,
}

impl CoreId {
    /// Decode a raw register field value. `None` for anything that is
    /// not one of the two defined cores.
    #[inline]
    pub const fn from_raw(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::Cm4),
            3 => Some(Self::Cm7),
            _ => None,
        }
    }

    /// The opposite core.
    #[inline]
    pub const fn peer(self) -> Self {
        match self {
            Self::Cm4 => Self::Cm7,
            Self::Cm7 => Self::Cm4,
        }
    }
}

/// Register value representing "locked, owned by `core`, proc id 0".
#[inline]
const fn locked_pattern(core: CoreId) -> u32 {
    LOCK_BIT | ((core as u32) << CORE_ID_POS)
}

/// Decode the owner field of a raw semaphore register value.
///
/// Returns `Ok(None)` when the semaphore is free. A locked register
/// whose owner field is neither defined core is corrupt and surfaces as
/// [`ChannelError::InvalidCoreId`].
#[inline]
pub fn owner_of(raw: u32) -> ChannelResult<Option<CoreId>> {
    if raw & LOCK_BIT == 0 {
        return Ok(None);
    }
    let field = ((raw & CORE_ID_MASK) >> CORE_ID_POS) as u8;
    match CoreId::from_raw(field) {
        Some(core) => Ok(Some(core)),
        None => Err(ChannelError::InvalidCoreId { value: field }),
    }
}

#[inline]
fn check_index(index: u8) -> ChannelResult<usize> {
    if index >= HSEM_COUNT {
        return Err(ChannelError::InvalidSemaphoreIndex { index });
    }
    Ok(index as usize)
}

/// A bank of 32 hardware semaphores.
///
/// `take` is a single claim attempt, never a wait; callers that need to
/// block spin on it externally (see the queue's retry policy).
pub trait HsemBank {
    /// Clear all 32 semaphores to free.
    ///
    /// Must run exactly once during early bring-up, before any
    /// `take`/`release` on either core.
    fn init(&self);

    /// One-shot atomic claim of semaphore `index` on behalf of `core`.
    ///
    /// `Ok(true)` iff the register now reads exactly "locked, owned by
    /// `core`, proc id 0" - a lost simultaneous-claim race or a
    /// semaphore held by the peer yields `Ok(false)`.
    fn take(&self, index: u8, core: CoreId) -> ChannelResult<bool>;

    /// Release semaphore `index`.
    ///
    /// Must only be called by the core currently holding it; releasing
    /// a semaphore you do not own is a programming error the hardware
    /// does not guard against.
    fn release(&self, index: u8, core: CoreId) -> ChannelResult<()>;

    /// Non-claiming read of the lock bit, usable by either core.
    fn is_locked(&self, index: u8) -> ChannelResult<bool>;
}

/// Software semaphore bank for host builds and tests.
///
/// Emulates the one-step hardware claim with a compare-exchange per
/// register: a free register is claimed atomically, the
/// simultaneous-claim race has exactly one winner, and a re-read by the
/// current owner reports success the way the hardware read-lock does.
pub struct SoftHsemBank {
    regs: [AtomicU32; HSEM_COUNT as usize],
}

impl SoftHsemBank {
    /// Create a bank with all semaphores free.
    pub fn new() -> Self {
        Self {
            regs: std::array::from_fn(|_| AtomicU32::new(0)),
        }
    }

    /// Raw register value, for diagnostics and test instrumentation.
    pub fn raw(&self, index: u8) -> ChannelResult<u32> {
        let i = check_index(index)?;
        Ok(self.regs[i].load(Ordering::Acquire))
    }
}

impl Default for SoftHsemBank {
    fn default() -> Self {
        Self::new()
    }
}

impl HsemBank for SoftHsemBank {
    fn init(&self) {
        for reg in &self.regs {
            reg.store(0, Ordering::Release);
        }
    }

    fn take(&self, index: u8, core: CoreId) -> ChannelResult<bool> {
        let i = check_index(index)?;
        let want = locked_pattern(core);
        // Matches the hardware read-lock: a lost claim reads back the
        // other owner's pattern, while a re-read by the current owner
        // reads back its own pattern and still reports success.
        let claimed = match self.regs[i].compare_exchange(
            0,
            want,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(_) => true,
            Err(current) => current == want,
        };
        Ok(claimed)
    }

    fn release(&self, index: u8, _core: CoreId) -> ChannelResult<()> {
        let i = check_index(index)?;
        self.regs[i].store(0, Ordering::Release);
        Ok(())
    }

    fn is_locked(&self, index: u8) -> ChannelResult<bool> {
        let i = check_index(index)?;
        Ok(self.regs[i].load(Ordering::Acquire) & LOCK_BIT != 0)
    }
}

/// Memory-mapped hardware semaphore bank.
///
/// Register block layout follows the reference silicon: 32 read/write
/// lock registers at offset 0, mirrored by 32 read-lock registers at
/// offset `0x80` whose read performs the one-step claim.
///
/// Note: these registers change state on *any* read of the read-lock
/// mirror - inspecting them through a hardware debugger's memory view
/// counts as a read and will silently claim semaphores.
pub struct MmioHsemBank {
    base: *mut u32,
}

/// Word offset of the read-lock register mirror.
const RLR_OFFSET_WORDS: usize = 0x80 / 4;

// Register access is mediated by the hardware itself; the pointer is to
// device memory valid for the life of the program.
unsafe impl Send for MmioHsemBank {}
unsafe impl Sync for MmioHsemBank {}

impl MmioHsemBank {
    /// Wrap the semaphore block at `base`.
    ///
    /// # Safety
    ///
    /// `base` must be the physical base address of the semaphore
    /// peripheral, mapped device memory, with its bus clock already
    /// enabled by platform bring-up.
    pub const unsafe fn from_base(base: *mut u32) -> Self {
        Self { base }
    }

    #[inline]
    fn lock_reg(&self, i: usize) -> *mut u32 {
        // Safety: i < 32, within the peripheral block.
        unsafe { self.base.add(i) }
    }

    #[inline]
    fn read_lock_reg(&self, i: usize) -> *mut u32 {
        unsafe { self.base.add(RLR_OFFSET_WORDS + i) }
    }
}

impl HsemBank for MmioHsemBank {
    fn init(&self) {
        for i in 0..HSEM_COUNT as usize {
            // Safety: register within the block; write of 0 is the
            // unconditional clear pattern.
            unsafe { self.lock_reg(i).write_volatile(0) };
        }
    }

    fn take(&self, index: u8, core: CoreId) -> ChannelResult<bool> {
        let i = check_index(index)?;
        // The read itself is the claim attempt (1-step lock procedure).
        let raw = unsafe { self.read_lock_reg(i).read_volatile() };
        Ok(raw == locked_pattern(core))
    }

    fn release(&self, index: u8, core: CoreId) -> ChannelResult<()> {
        let i = check_index(index)?;
        // Writing "lock clear, our core id, proc id 0" frees the
        // semaphore; the hardware ignores the write if the owner field
        // does not match.
        unsafe {
            self.lock_reg(i)
                .write_volatile((core as u32) << CORE_ID_POS)
        };
        Ok(())
    }

    fn is_locked(&self, index: u8) -> ChannelResult<bool> {
        let i = check_index(index)?;
        // Plain lock register read does not claim.
        let raw = unsafe { self.lock_reg(i).read_volatile() };
        Ok(raw & LOCK_BIT != 0)
    }
}
