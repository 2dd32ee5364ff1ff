//! # corelink
//!
//! Cross-core message channel for dual-core microcontrollers whose two
//! cores share no cache coherency and run independent bare control
//! loops. Either core hands discrete, variable-length messages to the
//! other through a pair of byte ring buffers in shared SRAM, with a
//! hardware semaphore bank arbitrating every access.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   sem 0   ┌─────────────────┐   poll    ┌──────────────┐
//! │  Cortex-M4   ├──────────►│  ring M4 -> M7  ├──────────►│  Cortex-M7   │
//! │ control loop │           │  (shared SRAM)  │           │ control loop │
//! │              │◄──────────┤  ring M7 -> M4  │◄──────────┤              │
//! └──────────────┘   poll    └─────────────────┘   sem 1   └──────────────┘
//! ```
//!
//! - [`hsem`] - the semaphore arbiter: 32 single-cycle-atomic hardware
//!   locks behind the [`HsemBank`] trait, with an MMIO implementation
//!   for target silicon and an atomics-based one for host tests.
//! - [`region`] - the shared range: explicit `#[repr(C)]` records,
//!   magic + layout-hash validation, and anonymous / file / raw-address
//!   backings.
//! - [`queue`] - the channel itself: length-prefixed frames, strict
//!   per-direction FIFO, drop-not-block backpressure.
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use corelink::{
//!     ChannelConfig, ChannelRegion, CoreId, CrossCoreQueue, Direction,
//!     FrameBuffer, MessageKind, ReadOutcome, SoftHsemBank,
//! };
//! use corelink::hsem::HsemBank;
//!
//! # fn main() -> Result<(), corelink::ChannelError> {
//! let config = ChannelConfig::default();
//! let region = Arc::new(ChannelRegion::anonymous(&config)?);
//! let bank = Arc::new(SoftHsemBank::new());
//! bank.init();
//!
//! let m4 = CrossCoreQueue::new(CoreId::Cm4, Arc::clone(&region), Arc::clone(&bank), &config);
//! let m7 = CrossCoreQueue::new(CoreId::Cm7, region, bank, &config);
//! m4.initialize(Direction::M4ToM7);
//! m4.initialize(Direction::M7ToM4);
//!
//! m4.send_message(Direction::M4ToM7, MessageKind(5), &[0x01, 0x02, 0x03])?;
//!
//! if m7.has_messages(Direction::M4ToM7) {
//!     let mut buf = FrameBuffer::for_config(&config);
//!     assert_eq!(m7.read_message(Direction::M4ToM7, &mut buf)?, ReadOutcome::Frame);
//!     assert_eq!(buf.kind(), MessageKind(5));
//!     assert_eq!(buf.payload(), &[0x01, 0x02, 0x03]);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Failure semantics
//!
//! - A full ring drops the outgoing message ([`SendOutcome::Dropped`],
//!   logged at error level) instead of blocking or overwriting - a
//!   halted consumer must not corrupt the channel.
//! - Reading an empty direction warns and returns
//!   [`ReadOutcome::Empty`].
//! - Corruption-class conditions (underflow, oversize stored length)
//!   and invalid arguments surface as [`ChannelError`]; the embedded
//!   caller maps those to a reset or hard stop.
//! - Lock waits spin without bound by default, matching the hardware's
//!   two-party design; configure `max_lock_attempts` to surface
//!   contention as an error instead.

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod frame;
pub mod hsem;
pub mod queue;
pub mod region;
pub mod stats;

pub use config::{ChannelConfig, ConfigError, ConfigLoader};
pub use error::{ChannelError, ChannelResult};
pub use frame::{FrameBuffer, MessageKind, FRAME_HEADER_SIZE};
pub use hsem::{CoreId, HsemBank, MmioHsemBank, SoftHsemBank};
pub use queue::{CrossCoreQueue, Direction, ReadOutcome, SendOutcome};
pub use region::{ChannelRegion, QueueHeader, RegionHeader};
pub use stats::QueueStats;

/// Initialize tracing for host-side tools and examples.
pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .finish();

    let _ = tracing::subscriber::set_global_default(subscriber);
}
