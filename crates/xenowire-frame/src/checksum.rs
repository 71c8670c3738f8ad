//! Mod-256 running checksum shared by sender and receiver.
//!
//! The sum is seeded with the protocol preload, then folds in the unique id
//! and message code (low byte first) followed by every payload byte. The
//! length field and the checksum byte itself are never covered.

/// Running mod-256 sum seeded with a preload constant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChecksumAccumulator {
    value: u8,
}

impl ChecksumAccumulator {
    /// Start a new sum at `preload`.
    #[inline]
    pub const fn new(preload: u8) -> Self {
        Self { value: preload }
    }

    /// Fold a run of bytes into the sum.
    #[inline]
    pub fn update(&mut self, bytes: &[u8]) {
        self.value = bytes.iter().fold(self.value, |acc, b| acc.wrapping_add(*b));
    }

    /// Fold a 16-bit value in wire order (low byte, then high byte).
    #[inline]
    pub fn update_u16(&mut self, value: u16) {
        self.update(&value.to_le_bytes());
    }

    /// Current sum.
    #[inline]
    pub const fn value(&self) -> u8 {
        self.value
    }
}

/// Checksum of one frame's covered fields.
pub fn frame_checksum(preload: u8, unique_id: u16, message_code: u16, payload: &[u8]) -> u8 {
    let mut acc = ChecksumAccumulator::new(preload);
    acc.update_u16(unique_id);
    acc.update_u16(message_code);
    acc.update(payload);
    acc.value()
}
