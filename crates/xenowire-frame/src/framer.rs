use bytes::{BufMut, BytesMut};
use tracing::{debug, trace, warn};

use crate::checksum::{frame_checksum, ChecksumAccumulator};
use crate::config::{ProtocolConfig, MAX_WIRE_FRAME_LEN};
use crate::error::{FrameError, RecordError, Result};
use crate::event::{Dispatcher, Event};
use crate::record::{MessageRecord, ProcState};
use crate::sync::{SyncScanner, SYNC_LEN};

/// Frame header: length (3) + checksum (1) + unique id (2) + code (2) = 8 bytes.
pub const HEADER_SIZE: usize = 8;

/// Decoded frame header.
///
/// Wire format:
/// ```text
/// ┌──────────────┬──────────┬────────────┬──────────┬──────────────────────┐
/// │ bytes_total  │ checksum │ unique_id  │ code     │ payload              │
/// │ (3B LE)      │ (1B)     │ (2B LE)    │ (2B LE)  │ (bytes_total - 8)    │
/// └──────────────┴──────────┴────────────┴──────────┴──────────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub bytes_total: u32,
    pub checksum: u8,
    pub unique_id: u16,
    pub message_code: u16,
}

impl FrameHeader {
    /// Decode the first eight bytes of `src`, if present.
    pub fn decode(src: &[u8]) -> Option<Self> {
        let header: &[u8; HEADER_SIZE] = src.get(..HEADER_SIZE)?.try_into().ok()?;
        let word = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
        Some(Self {
            bytes_total: word & 0x00FF_FFFF,
            checksum: (word >> 24) as u8,
            unique_id: u16::from_le_bytes([header[4], header[5]]),
            message_code: u16::from_le_bytes([header[6], header[7]]),
        })
    }

    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let len = self.bytes_total.to_le_bytes();
        let id = self.unique_id.to_le_bytes();
        let code = self.message_code.to_le_bytes();
        [len[0], len[1], len[2], self.checksum, id[0], id[1], code[0], code[1]]
    }
}

/// Incremental parser and serializer for the message protocol.
///
/// The framer holds no per-message state; all parse progress lives in the
/// [`MessageRecord`] passed to [`accumulate`](Self::accumulate).
#[derive(Debug, Clone)]
pub struct MessageFramer {
    preload: u8,
    max_frame_len: u32,
    sync: SyncScanner,
}

impl MessageFramer {
    /// Build a framer from `config`. A `max_frame_len` beyond the 24-bit
    /// length field is clamped to [`MAX_WIRE_FRAME_LEN`].
    pub fn new(config: &ProtocolConfig) -> Self {
        Self {
            preload: config.preload,
            max_frame_len: config.max_frame_len.min(MAX_WIRE_FRAME_LEN),
            sync: SyncScanner::new(config.preload),
        }
    }

    pub fn preload(&self) -> u8 {
        self.preload
    }

    pub fn max_frame_len(&self) -> u32 {
        self.max_frame_len
    }

    pub fn sync_scanner(&self) -> &SyncScanner {
        &self.sync
    }

    /// `count` repeats of the idle pattern.
    pub fn sync_packet(&self, count: usize) -> Vec<u8> {
        self.sync.fill(count)
    }

    /// Feed bytes to a receiving record.
    ///
    /// Returns how many bytes of `buf` were consumed. Unconsumed bytes must be
    /// presented again, followed by newer data, on the next call. A return of
    /// 0 means more data is needed before anything can be decided. Bytes past
    /// the end of the current message are never taken.
    pub fn accumulate<D>(&self, record: &mut MessageRecord, buf: &[u8], dispatcher: &D) -> usize
    where
        D: Dispatcher + ?Sized,
    {
        if record.state != ProcState::Receiving {
            return 0;
        }

        let mut consumed = 0usize;
        let mut rest = buf;

        if record.bytes_received == 0 {
            if rest.len() < SYNC_LEN {
                return 0;
            }

            if self.sync.starts_with_sync(rest) {
                let cull = SYNC_LEN + self.sync.find_sync_break(&rest[SYNC_LEN..]);
                debug!(cull, "culling sync stream");
                record.state = ProcState::SyncPacket;
                record.bytes_total = SYNC_LEN as u32;
                record.bytes_received = SYNC_LEN as u32;
                return cull;
            }

            let word = u32::from_le_bytes([rest[0], rest[1], rest[2], rest[3]]);
            record.bytes_total = word & 0x00FF_FFFF;
            record.checksum_expected = (word >> 24) as u8;
            record.bytes_received = SYNC_LEN as u32;
            consumed += SYNC_LEN;
            rest = &rest[SYNC_LEN..];

            if record.bytes_total < HEADER_SIZE as u32 {
                warn!(bytes_total = record.bytes_total, "malformed header");
                record.bytes_received = record.bytes_total.min(SYNC_LEN as u32);
                record.state = ProcState::AwaitingReap {
                    error: Some(RecordError::MalformedHeader {
                        bytes_total: record.bytes_total,
                    }),
                };
                return consumed;
            }
            if record.bytes_total > self.max_frame_len {
                warn!(
                    bytes_total = record.bytes_total,
                    max = self.max_frame_len,
                    "frame exceeds maximum length"
                );
                record.state = ProcState::AwaitingReap {
                    error: Some(RecordError::Oversize {
                        bytes_total: record.bytes_total,
                        max: self.max_frame_len,
                    }),
                };
                return consumed;
            }
            trace!(
                bytes_total = record.bytes_total,
                checksum = record.checksum_expected,
                "length word parsed"
            );
        }

        if record.bytes_received == SYNC_LEN as u32 {
            if rest.len() < 4 {
                return consumed;
            }
            record.unique_id = u16::from_le_bytes([rest[0], rest[1]]);
            record.message_code = u16::from_le_bytes([rest[2], rest[3]]);
            record.bytes_received = HEADER_SIZE as u32;
            consumed += 4;
            rest = &rest[4..];
            trace!(
                unique_id = record.unique_id,
                message_code = record.message_code,
                "header complete"
            );
        }

        let remaining = record.bytes_remaining() as usize;
        if record.bytes_received >= HEADER_SIZE as u32 && rest.len() >= remaining {
            let payload = &rest[..remaining];
            record.bytes_received += remaining as u32;
            consumed += remaining;
            self.complete(record, payload, dispatcher);
        }

        consumed
    }

    /// Verify the checksum and inflate the event once every byte is in.
    fn complete<D>(&self, record: &mut MessageRecord, payload: &[u8], dispatcher: &D)
    where
        D: Dispatcher + ?Sized,
    {
        let mut acc = ChecksumAccumulator::new(self.preload);
        acc.update_u16(record.unique_id);
        acc.update_u16(record.message_code);
        acc.update(payload);
        record.checksum_computed = acc.value();

        if record.checksum_computed != record.checksum_expected {
            warn!(
                unique_id = record.unique_id,
                expected = record.checksum_expected,
                computed = record.checksum_computed,
                "message failed checksum"
            );
            record.state = ProcState::AwaitingReap {
                error: Some(RecordError::ChecksumMismatch {
                    expected: record.checksum_expected,
                    computed: record.checksum_computed,
                }),
            };
            return;
        }

        let Some(mut event) = dispatcher.resolve(record.message_code) else {
            warn!(
                message_code = record.message_code,
                "no definition for message code"
            );
            record.state = ProcState::AwaitingReap {
                error: Some(RecordError::UnknownCode(record.message_code)),
            };
            return;
        };

        if !payload.is_empty() {
            if let Err(err) = event.deserialize(payload) {
                warn!(message_code = record.message_code, %err, "payload rejected");
                record.state = ProcState::AwaitingReap {
                    error: Some(RecordError::PayloadRejected(record.message_code)),
                };
                return;
            }
        }

        record.event = Some(event);
        record.state = ProcState::AwaitingProc;
    }

    /// Append the full wire form of `event` to `dst`.
    ///
    /// The payload is serialized first, then the header is filled in front of
    /// it. Returns the frame length. On error `dst` is left as it was.
    pub fn serialize(&self, event: &dyn Event, unique_id: u16, dst: &mut BytesMut) -> Result<usize> {
        let start = dst.len();
        dst.put_bytes(0, HEADER_SIZE);
        if let Err(err) = event.serialize(dst) {
            dst.truncate(start);
            return Err(err.into());
        }

        let total = dst.len() - start;
        if total > self.max_frame_len as usize {
            dst.truncate(start);
            return Err(FrameError::FrameTooLarge {
                size: total,
                max: self.max_frame_len as usize,
            });
        }

        let message_code = event.message_code();
        let header = FrameHeader {
            bytes_total: total as u32,
            checksum: frame_checksum(
                self.preload,
                unique_id,
                message_code,
                &dst[start + HEADER_SIZE..],
            ),
            unique_id,
            message_code,
        };
        dst[start..start + HEADER_SIZE].copy_from_slice(&header.encode());
        Ok(total)
    }

    /// Serialize the event a record carries and mark the record ready to send.
    pub fn serialize_record(&self, record: &mut MessageRecord, dst: &mut BytesMut) -> Result<usize> {
        let start = dst.len();
        let event = record.event.as_deref().ok_or(FrameError::MissingEvent)?;
        let total = self.serialize(event, record.unique_id, dst)?;
        record.bytes_total = total as u32;
        record.checksum_computed = dst[start + 3];
        record.state = ProcState::AwaitingSend;
        Ok(total)
    }
}

impl Default for MessageFramer {
    fn default() -> Self {
        Self::new(&ProtocolConfig::default())
    }
}
