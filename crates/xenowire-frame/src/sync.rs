//! Idle-pattern detection.
//!
//! The sync pattern is `{0x04, 0x00, 0x00, PRELOAD}`: read as a header it
//! announces a 4-byte frame whose checksum is the bare preload, which no real
//! message can be. Peers pad idle links with repeats of it and the receiver
//! culls those repeats before parsing real headers.

/// Length of one sync pattern.
pub const SYNC_LEN: usize = 4;

/// Scanner for one preload's sync pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncScanner {
    pattern: [u8; SYNC_LEN],
}

impl SyncScanner {
    pub const fn new(preload: u8) -> Self {
        Self {
            pattern: sync_pattern(preload),
        }
    }

    /// The four pattern bytes.
    pub const fn pattern(&self) -> [u8; SYNC_LEN] {
        self.pattern
    }

    /// True if `buf` begins with one full pattern.
    pub fn starts_with_sync(&self, buf: &[u8]) -> bool {
        buf.len() >= SYNC_LEN && buf[..SYNC_LEN] == self.pattern
    }

    /// Offset of the first full occurrence of the pattern in `buf`.
    pub fn find_sync(&self, buf: &[u8]) -> Option<usize> {
        buf.windows(SYNC_LEN).position(|w| w == self.pattern)
    }

    /// Offset of the first byte that breaks the repeating pattern.
    ///
    /// Steps four bytes at a time from the start of `buf`. A trailing run of
    /// fewer than four bytes is never judged, so the returned offset stops
    /// in front of it and those bytes stay with the caller.
    pub fn find_sync_break(&self, buf: &[u8]) -> usize {
        let mut offset = 0;
        while buf.len() - offset >= SYNC_LEN {
            if buf[offset..offset + SYNC_LEN] != self.pattern {
                return offset;
            }
            offset += SYNC_LEN;
        }
        offset
    }

    /// `count` back-to-back repeats of the pattern.
    pub fn fill(&self, count: usize) -> Vec<u8> {
        self.pattern.repeat(count)
    }
}

/// Sync pattern for the given preload.
pub const fn sync_pattern(preload: u8) -> [u8; SYNC_LEN] {
    [0x04, 0x00, 0x00, preload]
}

#[cfg(test)]
mod tests {
    use super::*;

    const PRELOAD: u8 = 0x55;

    #[test]
    fn pattern_ends_with_preload() {
        assert_eq!(SyncScanner::new(0xAF).pattern(), [0x04, 0x00, 0x00, 0xAF]);
    }

    #[test]
    fn find_sync_locates_first_occurrence() {
        let scanner = SyncScanner::new(PRELOAD);
        let mut buf = vec![0x11, 0x22, 0x33];
        buf.extend_from_slice(&scanner.pattern());
        buf.extend_from_slice(&scanner.pattern());
        assert_eq!(scanner.find_sync(&buf), Some(3));
    }

    #[test]
    fn find_sync_reports_absence() {
        let scanner = SyncScanner::new(PRELOAD);
        assert_eq!(scanner.find_sync(&[0x04, 0x00, 0x00]), None);
        assert_eq!(scanner.find_sync(&[0x04, 0x00, 0x00, 0x56]), None);
        assert_eq!(scanner.find_sync(&[]), None);
    }

    #[test]
    fn break_after_k_repeats() {
        let scanner = SyncScanner::new(PRELOAD);
        for k in 0..5 {
            let mut buf = scanner.fill(k);
            buf.extend_from_slice(&[0x09, 0x00, 0x00, 0x00, 0x01, 0x00]);
            assert_eq!(scanner.find_sync_break(&buf), 4 * k);
        }
    }

    #[test]
    fn break_stops_before_partial_tail() {
        let scanner = SyncScanner::new(PRELOAD);
        let mut buf = scanner.fill(2);
        buf.extend_from_slice(&[0x04, 0x00]);
        assert_eq!(scanner.find_sync_break(&buf), 8);
    }

    #[test]
    fn break_inside_a_near_miss() {
        let scanner = SyncScanner::new(PRELOAD);
        let mut buf = scanner.fill(1);
        buf.extend_from_slice(&[0x04, 0x00, 0x00, 0x00]);
        assert_eq!(scanner.find_sync_break(&buf), 4);
    }
}
