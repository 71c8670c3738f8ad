use crate::error::{FrameError, Result};

/// Largest `bytes_total` the 24-bit length field can carry.
pub const MAX_WIRE_FRAME_LEN: u32 = 0x00FF_FFFF;

/// Default checksum preload. Both peers must agree on this out-of-band.
pub const DEFAULT_PRELOAD: u8 = 0x55;

/// Default number of preallocated message records per pool.
pub const DEFAULT_POOL_CAPACITY: usize = 8;

/// Default ceiling for retry requests per message.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Protocol parameters shared by the framer, pool and session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default, deny_unknown_fields))]
pub struct ProtocolConfig {
    /// Checksum seed, also the last byte of the sync pattern.
    pub preload: u8,
    /// Number of preallocated pool slots.
    pub pool_capacity: usize,
    /// Largest frame (header included) this side accepts or emits.
    pub max_frame_len: u32,
    /// Retry requests allowed per unique id before giving up.
    pub max_retries: u32,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            preload: DEFAULT_PRELOAD,
            pool_capacity: DEFAULT_POOL_CAPACITY,
            max_frame_len: MAX_WIRE_FRAME_LEN,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

impl ProtocolConfig {
    /// Config with a non-default preload and everything else defaulted.
    pub fn with_preload(preload: u8) -> Self {
        Self {
            preload,
            ..Self::default()
        }
    }

    /// Reject parameter combinations the framer cannot honor.
    pub fn validate(&self) -> Result<()> {
        if self.pool_capacity == 0 {
            return Err(FrameError::InvalidConfig(
                "pool_capacity must be at least 1".to_string(),
            ));
        }
        if self.max_frame_len < crate::HEADER_SIZE as u32 {
            return Err(FrameError::InvalidConfig(format!(
                "max_frame_len {} is smaller than the {}-byte header",
                self.max_frame_len,
                crate::HEADER_SIZE
            )));
        }
        if self.max_frame_len > MAX_WIRE_FRAME_LEN {
            return Err(FrameError::InvalidConfig(format!(
                "max_frame_len {} exceeds the 24-bit wire limit {MAX_WIRE_FRAME_LEN}",
                self.max_frame_len
            )));
        }
        Ok(())
    }
}
