use std::collections::{HashMap, VecDeque};

use bytes::{Bytes, BytesMut};
use tracing::{debug, trace, warn};
use xenowire_frame::{
    codes, AssemblerStats, Assembler, Dispatcher, Event, FrameError, MessageFramer, PoolStats,
    ProcState, ProtocolConfig, RecordError, RecordKey, ReliabilityController, ReplyEvent,
    ReplyKind, SessionId,
};

use crate::error::Result;

/// What a session hands to the application after a `receive`.
#[derive(Debug)]
pub enum Delivery {
    /// A valid inbound message.
    Message {
        unique_id: u16,
        message_code: u16,
        event: Box<dyn Event>,
    },
    /// An inbound message that could not be delivered.
    Faulty {
        unique_id: u16,
        message_code: u16,
        error: RecordError,
    },
    /// The peer acknowledged one of our messages.
    Acked { unique_id: u16 },
    /// The peer reported one of our messages as failed.
    Failed { unique_id: u16 },
    /// The peer kept asking for retransmission past the retry ceiling.
    RetryExhausted { unique_id: u16 },
}

/// Counters for one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SessionStats {
    pub delivered: u64,
    pub faults: u64,
    pub acks_sent: u64,
    pub retries_sent: u64,
    pub fails_sent: u64,
    pub acked: u64,
    pub failed: u64,
    pub retransmits: u64,
    pub retry_exhausted: u64,
    pub unsolicited_replies: u64,
    pub pending: usize,
    pub assembler: AssemblerStats,
    pub pool: PoolStats,
}

struct Pending {
    frame: Bytes,
    retries: u32,
}

/// Answers reply codes itself so the application dispatcher never needs to.
struct ReplyAware<'a, D>(&'a D);

impl<D: Dispatcher> Dispatcher for ReplyAware<'_, D> {
    fn resolve(&self, message_code: u16) -> Option<Box<dyn Event>> {
        match ReplyKind::from_code(message_code) {
            Some(kind) => Some(Box::new(ReplyEvent::new(kind))),
            None => self.0.resolve(message_code),
        }
    }
}

/// One end of a point-to-point link.
///
/// The session is transport-agnostic: feed it received bytes with
/// [`receive`](Self::receive) and drain bytes to put on the wire with
/// [`poll_transmit`](Self::poll_transmit).
pub struct Session<D> {
    id: SessionId,
    dispatcher: D,
    assembler: Assembler,
    framer: MessageFramer,
    controller: ReliabilityController,
    outbox: VecDeque<Bytes>,
    pending: HashMap<u16, Pending>,
    inbound_retries: HashMap<u16, u32>,
    next_unique_id: u16,
    stats: SessionStats,
}

impl<D: Dispatcher> Session<D> {
    pub fn new(id: SessionId, dispatcher: D, config: &ProtocolConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            id,
            dispatcher,
            assembler: Assembler::new(config, id),
            framer: MessageFramer::new(config),
            controller: ReliabilityController::from_config(config),
            outbox: VecDeque::new(),
            pending: HashMap::new(),
            inbound_retries: HashMap::new(),
            next_unique_id: 1,
            stats: SessionStats::default(),
        })
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn dispatcher(&self) -> &D {
        &self.dispatcher
    }

    /// Consume received bytes and return everything that finished.
    ///
    /// Incomplete input stays buffered until the next call. Replies owed to
    /// the peer are queued for [`poll_transmit`](Self::poll_transmit).
    pub fn receive(&mut self, bytes: &[u8]) -> Result<Vec<Delivery>> {
        self.assembler.extend(bytes);
        let mut deliveries = Vec::new();
        loop {
            let key = {
                let dispatcher = ReplyAware(&self.dispatcher);
                self.assembler.poll(&dispatcher)
            };
            let Some(key) = key else {
                break;
            };
            let delivery = self.finish(key);
            self.assembler.reclaim(key)?;
            if let Some(delivery) = delivery? {
                deliveries.push(delivery);
            }
        }
        Ok(deliveries)
    }

    /// Serialize `event` under a fresh unique id and queue it for transmit.
    ///
    /// Events that demand acknowledgement stay pending until the peer replies.
    pub fn send(&mut self, event: &dyn Event) -> Result<u16> {
        let unique_id = self.next_unique_id();
        let mut buf = BytesMut::new();
        self.framer.serialize(event, unique_id, &mut buf)?;
        let frame = buf.freeze();
        if event.demands_ack() {
            self.pending.insert(
                unique_id,
                Pending {
                    frame: frame.clone(),
                    retries: 0,
                },
            );
        }
        debug!(session = %self.id, unique_id, code = event.message_code(), "queued message");
        self.outbox.push_back(frame);
        Ok(unique_id)
    }

    /// Queue `count` sync patterns as idle filler.
    pub fn send_sync(&mut self, count: usize) {
        if count > 0 {
            self.outbox
                .push_back(Bytes::from(self.framer.sync_packet(count)));
        }
    }

    /// Next chunk of bytes to put on the wire.
    pub fn poll_transmit(&mut self) -> Option<Bytes> {
        self.outbox.pop_front()
    }

    /// Unique ids of outbound messages still awaiting a reply.
    pub fn pending_ids(&self) -> Vec<u16> {
        let mut ids: Vec<u16> = self.pending.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn stats(&self) -> SessionStats {
        SessionStats {
            pending: self.pending.len(),
            assembler: self.assembler.stats(),
            pool: self.assembler.pool().stats(),
            ..self.stats
        }
    }

    /// Abandon the link, dropping partial input along with all queued output.
    ///
    /// Returns the number of records reclaimed from the pool.
    pub fn teardown(&mut self) -> usize {
        let reclaimed = self.assembler.teardown();
        self.outbox.clear();
        self.pending.clear();
        self.inbound_retries.clear();
        debug!(session = %self.id, reclaimed, "session torn down");
        reclaimed
    }

    fn next_unique_id(&mut self) -> u16 {
        let unique_id = self.next_unique_id;
        self.next_unique_id = match self.next_unique_id.wrapping_add(1) {
            0 => 1,
            next => next,
        };
        unique_id
    }

    /// Turn one finished record into a delivery, queueing any reply it calls for.
    fn finish(&mut self, key: RecordKey) -> Result<Option<Delivery>> {
        let record = self
            .assembler
            .record_mut(key)
            .ok_or(FrameError::StaleRecord)?;
        let unique_id = record.unique_id();
        let message_code = record.message_code();
        let is_reply = codes::is_reply(message_code);

        let delivery = match record.state() {
            ProcState::SyncPacket => return Ok(None),
            ProcState::AwaitingProc if is_reply => {
                return Ok(self.on_reply(unique_id, message_code));
            }
            ProcState::AwaitingProc => {
                self.inbound_retries.remove(&unique_id);
                let reply = self.controller.reply_for(record);
                let event = record.take_event().ok_or(FrameError::MissingEvent)?;
                if let Some(kind) = reply {
                    self.queue_reply(key, kind)?;
                }
                self.stats.delivered += 1;
                Delivery::Message {
                    unique_id,
                    message_code,
                    event,
                }
            }
            ProcState::AwaitingReap { error: Some(error) } => {
                self.stats.faults += 1;
                if !is_reply {
                    if let RecordError::ChecksumMismatch { .. } = error {
                        let retries = self.inbound_retries.get(&unique_id).copied().unwrap_or(0);
                        record.restore_retry_count(retries);
                    }
                    if let Some(kind) = self.controller.reply_for(record) {
                        self.queue_reply(key, kind)?;
                    }
                }
                Delivery::Faulty {
                    unique_id,
                    message_code,
                    error,
                }
            }
            state => {
                warn!(session = %self.id, state = state.name(), "unexpected finished state");
                return Ok(None);
            }
        };
        Ok(Some(delivery))
    }

    fn queue_reply(&mut self, key: RecordKey, kind: ReplyKind) -> Result<()> {
        let record = self
            .assembler
            .record_mut(key)
            .ok_or(FrameError::StaleRecord)?;
        let sent = self.controller.apply(record, kind);
        let unique_id = record.unique_id();
        match sent {
            ReplyKind::Ack => self.stats.acks_sent += 1,
            ReplyKind::Retry => {
                self.stats.retries_sent += 1;
                self.inbound_retries.insert(unique_id, record.retry_count());
            }
            ReplyKind::Fail => {
                self.stats.fails_sent += 1;
                self.inbound_retries.remove(&unique_id);
            }
        }

        let mut buf = BytesMut::new();
        self.framer.serialize_record(record, &mut buf)?;
        trace!(session = %self.id, unique_id, ?sent, "queued reply");
        self.outbox.push_back(buf.freeze());
        Ok(())
    }

    fn on_reply(&mut self, unique_id: u16, message_code: u16) -> Option<Delivery> {
        let kind = ReplyKind::from_code(message_code)?;
        let Some(pending) = self.pending.get_mut(&unique_id) else {
            debug!(session = %self.id, unique_id, ?kind, "reply for unknown message");
            self.stats.unsolicited_replies += 1;
            return None;
        };

        match kind {
            ReplyKind::Ack => {
                self.pending.remove(&unique_id);
                self.stats.acked += 1;
                Some(Delivery::Acked { unique_id })
            }
            ReplyKind::Fail => {
                self.pending.remove(&unique_id);
                self.stats.failed += 1;
                Some(Delivery::Failed { unique_id })
            }
            ReplyKind::Retry if pending.retries < self.controller.max_retries() => {
                pending.retries += 1;
                debug!(session = %self.id, unique_id, retries = pending.retries, "retransmitting");
                self.outbox.push_back(pending.frame.clone());
                self.stats.retransmits += 1;
                None
            }
            ReplyKind::Retry => {
                self.pending.remove(&unique_id);
                self.stats.retry_exhausted += 1;
                Some(Delivery::RetryExhausted { unique_id })
            }
        }
    }
}

impl<D> std::fmt::Debug for Session<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("assembler", &self.assembler)
            .field("outbox", &self.outbox.len())
            .field("pending", &self.pending.len())
            .finish()
    }
}
