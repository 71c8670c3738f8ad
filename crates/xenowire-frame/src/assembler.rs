use bytes::{Buf, BytesMut};
use tracing::debug;

use crate::config::ProtocolConfig;
use crate::error::{RecordError, Result};
use crate::event::{Dispatcher, Event};
use crate::framer::MessageFramer;
use crate::pool::{MessageObjectPool, RecordKey};
use crate::record::{MessageRecord, ProcState, SessionId};

const INITIAL_BUFFER_CAPACITY: usize = 1024;

/// Outcome of one finished inbound record, detached from the pool.
#[derive(Debug)]
pub enum Received {
    /// A valid, fully deserialized event.
    Message {
        unique_id: u16,
        message_code: u16,
        event: Box<dyn Event>,
    },
    /// A run of idle filler was culled.
    Sync,
    /// A message that could not be delivered.
    Faulty {
        unique_id: u16,
        message_code: u16,
        error: RecordError,
    },
}

/// Counters kept while assembling a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AssemblerStats {
    pub messages: u64,
    pub faults: u64,
    pub sync_packets: u64,
    pub sync_bytes: u64,
}

/// Turns an arbitrarily chunked byte stream into finished message records.
///
/// Bytes the framer has not consumed yet stay buffered here and are presented
/// again with the next chunk. Finished records are left in the pool for the
/// caller to answer and reclaim.
pub struct Assembler {
    framer: MessageFramer,
    pool: MessageObjectPool,
    session: SessionId,
    buf: BytesMut,
    current: Option<RecordKey>,
    stats: AssemblerStats,
}

impl Assembler {
    pub fn new(config: &ProtocolConfig, session: SessionId) -> Self {
        Self {
            framer: MessageFramer::new(config),
            pool: MessageObjectPool::from_config(config),
            session,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            current: None,
            stats: AssemblerStats::default(),
        }
    }

    /// Append newly arrived transport bytes.
    pub fn extend(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Bytes waiting to be consumed.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// True while a record is partially received or input is still buffered.
    pub fn is_mid_record(&self) -> bool {
        self.current.is_some() || !self.buf.is_empty()
    }

    /// Run the framer over buffered bytes until a record finishes.
    ///
    /// Returns the key of the finished record, or `None` once more input is
    /// needed. The caller owns the returned record and must reclaim it.
    ///
    /// A bad header costs only its length word; the bytes after it are parsed
    /// as a fresh header.
    pub fn poll<D>(&mut self, dispatcher: &D) -> Option<RecordKey>
    where
        D: Dispatcher + ?Sized,
    {
        loop {
            let key = match self.current {
                Some(key) => key,
                None if self.buf.is_empty() => return None,
                None => {
                    let key = self.pool.fetch(self.session);
                    self.current = Some(key);
                    key
                }
            };
            let Some(record) = self.pool.get_mut(key) else {
                self.current = None;
                continue;
            };

            let consumed = self.framer.accumulate(record, &self.buf, dispatcher);
            self.buf.advance(consumed);

            let state = record.state();
            if state.is_finished() {
                self.current = None;
                self.note_finished(state, consumed);
                return Some(key);
            }
            if consumed == 0 {
                return None;
            }
        }
    }

    /// [`poll`](Self::poll), then detach the outcome and reclaim the record.
    pub fn next_received<D>(&mut self, dispatcher: &D) -> Option<Received>
    where
        D: Dispatcher + ?Sized,
    {
        let key = self.poll(dispatcher)?;
        let received = self.pool.get_mut(key).map(detach);
        if let Err(err) = self.pool.reclaim(key) {
            debug!(%err, "finished record already reclaimed");
        }
        received
    }

    pub fn record(&self, key: RecordKey) -> Option<&MessageRecord> {
        self.pool.get(key)
    }

    pub fn record_mut(&mut self, key: RecordKey) -> Option<&mut MessageRecord> {
        self.pool.get_mut(key)
    }

    pub fn reclaim(&mut self, key: RecordKey) -> Result<()> {
        self.pool.reclaim(key)
    }

    /// Drop buffered input and every record this session still holds.
    pub fn teardown(&mut self) -> usize {
        self.buf.clear();
        self.current = None;
        self.pool.reclaim_session(self.session)
    }

    pub fn framer(&self) -> &MessageFramer {
        &self.framer
    }

    pub fn pool(&self) -> &MessageObjectPool {
        &self.pool
    }

    pub fn session(&self) -> SessionId {
        self.session
    }

    pub fn stats(&self) -> AssemblerStats {
        self.stats
    }

    fn note_finished(&mut self, state: ProcState, consumed: usize) {
        match state {
            ProcState::SyncPacket => {
                self.stats.sync_packets += 1;
                self.stats.sync_bytes += consumed as u64;
            }
            ProcState::AwaitingProc => self.stats.messages += 1,
            ProcState::AwaitingReap { error: Some(err) } => {
                self.stats.faults += 1;
                debug!(%err, "inbound record faulted");
            }
            _ => {}
        }
    }
}

impl std::fmt::Debug for Assembler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Assembler")
            .field("session", &self.session)
            .field("buffered", &self.buf.len())
            .field("pool", &self.pool)
            .field("stats", &self.stats)
            .finish()
    }
}

fn detach(record: &mut MessageRecord) -> Received {
    match (record.state(), record.take_event()) {
        (ProcState::AwaitingProc, Some(event)) => Received::Message {
            unique_id: record.unique_id(),
            message_code: record.message_code(),
            event,
        },
        (ProcState::AwaitingReap { error: Some(error) }, _) => Received::Faulty {
            unique_id: record.unique_id(),
            message_code: record.message_code(),
            error,
        },
        _ => Received::Sync,
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;
    use crate::event::RawEvent;
    use crate::registry::MessageRegistry;

    const CODE: u16 = 0x0100;

    fn registry() -> MessageRegistry {
        MessageRegistry::new().with(CODE, "data", false)
    }

    fn encode(framer: &MessageFramer, unique_id: u16, payload: &[u8]) -> Vec<u8> {
        let mut buf = BytesMut::new();
        framer
            .serialize(&RawEvent::new(CODE, Bytes::copy_from_slice(payload)), unique_id, &mut buf)
            .unwrap();
        buf.to_vec()
    }

    fn collect(assembler: &mut Assembler) -> Vec<Received> {
        let registry = registry();
        let mut out = Vec::new();
        while let Some(received) = assembler.next_received(&registry) {
            out.push(received);
        }
        out
    }

    #[test]
    fn byte_at_a_time_yields_one_message() {
        let mut assembler = Assembler::new(&ProtocolConfig::default(), SessionId(1));
        let wire = encode(assembler.framer(), 5, b"hi");

        let mut all = Vec::new();
        for byte in &wire {
            assembler.extend(&[*byte]);
            all.extend(collect(&mut assembler));
        }

        assert_eq!(all.len(), 1);
        assert!(matches!(all[0], Received::Message { unique_id: 5, .. }));
        assert_eq!(assembler.buffered(), 0);
        assert_eq!(assembler.pool().in_use(), 0, "no record claimed while idle");
    }

    #[test]
    fn sync_and_messages_interleave() {
        let mut assembler = Assembler::new(&ProtocolConfig::default(), SessionId(1));
        let framer = assembler.framer().clone();
        let mut wire = framer.sync_packet(3);
        wire.extend(encode(&framer, 1, b"a"));
        wire.extend(framer.sync_packet(1));
        wire.extend(encode(&framer, 2, b"b"));

        assembler.extend(&wire);
        let out = collect(&mut assembler);

        assert_eq!(out.len(), 4);
        assert!(matches!(out[0], Received::Sync));
        assert!(matches!(out[1], Received::Message { unique_id: 1, .. }));
        assert!(matches!(out[2], Received::Sync));
        assert!(matches!(out[3], Received::Message { unique_id: 2, .. }));
        let stats = assembler.stats();
        assert_eq!(stats.sync_bytes, 16);
        assert_eq!(stats.messages, 2);
    }

    #[test]
    fn checksum_fault_does_not_stop_the_stream() {
        let mut assembler = Assembler::new(&ProtocolConfig::default(), SessionId(1));
        let framer = assembler.framer().clone();
        let mut bad = encode(&framer, 1, b"bad");
        bad[HEADER_PAYLOAD] ^= 0x01;
        let good = encode(&framer, 2, b"good");

        assembler.extend(&bad);
        assembler.extend(&good);
        let out = collect(&mut assembler);

        assert!(matches!(
            out[0],
            Received::Faulty {
                unique_id: 1,
                error: RecordError::ChecksumMismatch { .. },
                ..
            }
        ));
        assert!(matches!(out[1], Received::Message { unique_id: 2, .. }));
    }

    const HEADER_PAYLOAD: usize = crate::HEADER_SIZE;

    #[test]
    fn malformed_header_does_not_swallow_following_frames() {
        let mut assembler = Assembler::new(&ProtocolConfig::default(), SessionId(1));
        let framer = assembler.framer().clone();
        let mut wire = vec![0x02, 0x00, 0x00, 0x00];
        for unique_id in 1..=3 {
            wire.extend(encode(&framer, unique_id, b"ok"));
        }

        assembler.extend(&wire);
        let out = collect(&mut assembler);

        assert_eq!(out.len(), 4);
        assert!(matches!(
            out[0],
            Received::Faulty {
                error: RecordError::MalformedHeader { bytes_total: 2 },
                ..
            }
        ));
        assert!(matches!(out[1], Received::Message { unique_id: 1, .. }));
        assert!(matches!(out[2], Received::Message { unique_id: 2, .. }));
        assert!(matches!(out[3], Received::Message { unique_id: 3, .. }));
        assert_eq!(assembler.buffered(), 0);
        assert!(!assembler.is_mid_record());
    }

    #[test]
    fn oversize_header_consumes_only_its_length_word() {
        let config = ProtocolConfig {
            max_frame_len: 64,
            ..ProtocolConfig::default()
        };
        let mut assembler = Assembler::new(&config, SessionId(1));
        let framer = assembler.framer().clone();
        let mut wire = vec![0xFF, 0x00, 0x00, 0x00];
        wire.extend(framer.sync_packet(1));
        wire.extend(encode(&framer, 7, b"after"));

        assembler.extend(&wire);
        let out = collect(&mut assembler);

        assert_eq!(out.len(), 3);
        assert!(matches!(
            out[0],
            Received::Faulty {
                error: RecordError::Oversize { bytes_total: 0xFF, max: 64 },
                ..
            }
        ));
        assert!(matches!(out[1], Received::Sync));
        assert!(matches!(out[2], Received::Message { unique_id: 7, .. }));
        assert_eq!(assembler.stats().faults, 1);
    }

    #[test]
    fn mid_record_tracks_partial_input() {
        let mut assembler = Assembler::new(&ProtocolConfig::default(), SessionId(1));
        let wire = encode(assembler.framer(), 3, b"xyz");
        assert!(!assembler.is_mid_record());

        assembler.extend(&wire[..crate::HEADER_SIZE]);
        assert!(collect(&mut assembler).is_empty());
        assert_eq!(assembler.buffered(), 0);
        assert!(assembler.is_mid_record());

        assembler.extend(&wire[crate::HEADER_SIZE..]);
        assert_eq!(collect(&mut assembler).len(), 1);
        assert!(!assembler.is_mid_record());
    }

    #[test]
    fn poll_leaves_record_for_caller() {
        let mut assembler = Assembler::new(&ProtocolConfig::default(), SessionId(4));
        let wire = encode(assembler.framer(), 9, b"keep");
        assembler.extend(&wire);

        let key = assembler.poll(&registry()).unwrap();
        let record = assembler.record(key).unwrap();
        assert_eq!(record.state(), ProcState::AwaitingProc);
        assert_eq!(record.session(), Some(SessionId(4)));
        assembler.reclaim(key).unwrap();
        assert!(assembler.record(key).is_none());
    }

    #[test]
    fn teardown_reclaims_partial_record() {
        let mut assembler = Assembler::new(&ProtocolConfig::default(), SessionId(1));
        let wire = encode(assembler.framer(), 9, b"partial");
        assembler.extend(&wire[..10]);
        assert!(assembler.poll(&registry()).is_none());
        assert_eq!(assembler.pool().in_use(), 1);

        assert_eq!(assembler.teardown(), 1);
        assert_eq!(assembler.pool().in_use(), 0);
        assert_eq!(assembler.buffered(), 0);
    }
}
