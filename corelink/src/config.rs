//! Channel configuration loading and validation.
//!
//! The reference silicon bakes the queue geometry in as compile-time
//! literals. Here it is an explicit [`ChannelConfig`] so the channel can
//! run with small buffers in host tests, and so both cores' builds can be
//! checked against the geometry actually stamped into the shared region
//! header (see [`crate::region`]).
//!
//! # Usage
//!
//! ```rust,no_run
//! use corelink::config::{ChannelConfig, ConfigLoader};
//! use std::path::Path;
//!
//! let config = ChannelConfig::load(Path::new("channel.toml")).unwrap();
//! config.validate().unwrap();
//! ```

use serde::Deserialize;
use std::num::NonZeroU32;
use std::path::Path;
use thiserror::Error;

use crate::frame::FRAME_HEADER_SIZE;

/// Default per-direction ring capacity: 8 KiB each way.
pub const DEFAULT_QUEUE_CAPACITY: u32 = 8192;

/// Default maximum total frame size (header + payload).
///
/// 1.5 KiB, the reference system's choice - also the maximum Ethernet
/// payload, so a forwarded network packet always fits in one frame.
pub const DEFAULT_MAX_FRAME_SIZE: u32 = 1536;

/// Error type for configuration loading operations.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// Configuration file not found at specified path.
    #[error("configuration file not found")]
    FileNotFound,

    /// TOML parsing failed.
    #[error("failed to parse configuration: {0}")]
    ParseError(String),

    /// Semantic validation failed.
    #[error("configuration validation failed: {0}")]
    ValidationError(String),
}

/// Geometry and lock policy for one channel region (both directions).
///
/// # TOML Example
///
/// ```toml
/// capacity = 8192
/// max_frame_size = 1536
/// max_lock_attempts = 100000
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChannelConfig {
    /// Per-direction ring buffer capacity in bytes.
    #[serde(default = "default_capacity")]
    pub capacity: u32,

    /// Maximum total frame size (header + payload) in bytes.
    #[serde(default = "default_max_frame_size")]
    pub max_frame_size: u32,

    /// Bound on semaphore take attempts per transaction.
    ///
    /// `None` reproduces the reference behavior: spin forever, accepting
    /// that a debugger-halted peer blocks this core indefinitely. Hosts
    /// and tests set a bound to surface
    /// [`ChannelError::LockContended`](crate::ChannelError::LockContended)
    /// deterministically instead.
    #[serde(default)]
    pub max_lock_attempts: Option<NonZeroU32>,
}

fn default_capacity() -> u32 {
    DEFAULT_QUEUE_CAPACITY
}

fn default_max_frame_size() -> u32 {
    DEFAULT_MAX_FRAME_SIZE
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_QUEUE_CAPACITY,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            max_lock_attempts: None,
        }
    }
}

impl ChannelConfig {
    /// Maximum payload bytes a single frame can carry.
    pub const fn max_payload(&self) -> usize {
        self.max_frame_size as usize - FRAME_HEADER_SIZE
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` if:
    /// - `max_frame_size` leaves no room for a frame header
    /// - `max_frame_size` payload would not fit a 16-bit length field
    /// - a maximum-size frame would not fit in the ring
    /// - `capacity` is not 4-byte aligned (queue records must stay
    ///   identically aligned in both cores' builds)
    pub fn validate(&self) -> Result<(), ConfigError> {
        if (self.max_frame_size as usize) <= FRAME_HEADER_SIZE {
            return Err(ConfigError::ValidationError(format!(
                "max_frame_size {} leaves no payload room (header is {} bytes)",
                self.max_frame_size, FRAME_HEADER_SIZE
            )));
        }
        if self.max_payload() > u16::MAX as usize {
            return Err(ConfigError::ValidationError(format!(
                "max_frame_size {} exceeds the 16-bit length prefix",
                self.max_frame_size
            )));
        }
        if self.max_frame_size > self.capacity {
            return Err(ConfigError::ValidationError(format!(
                "max_frame_size {} exceeds ring capacity {}",
                self.max_frame_size, self.capacity
            )));
        }
        if self.capacity % 4 != 0 {
            return Err(ConfigError::ValidationError(format!(
                "capacity {} must be a multiple of 4",
                self.capacity
            )));
        }
        Ok(())
    }
}

/// Trait for loading configuration from TOML files.
///
/// # Contract
///
/// - Returns `ConfigError::FileNotFound` if the file does not exist
/// - Returns `ConfigError::ParseError` if TOML syntax is invalid
pub trait ConfigLoader: Sized {
    /// Load and parse a TOML configuration file.
    fn load(path: &Path) -> Result<Self, ConfigError>;
}

impl<T> ConfigLoader for T
where
    T: serde::de::DeserializeOwned,
{
    fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::FileNotFound);
        }
        let raw = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ParseError(e.to_string()))?;
        toml::from_str(&raw).map_err(|e| ConfigError::ParseError(e.to_string()))
    }
}
