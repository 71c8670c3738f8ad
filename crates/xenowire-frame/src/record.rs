use std::fmt;
use std::time::{Duration, Instant};

use crate::codes;
use crate::error::RecordError;
use crate::event::Event;
use crate::HEADER_SIZE;

/// Handle of the session that owns a record.
///
/// Records never own their session; this is only a routing key into
/// whatever registry the embedding code keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(pub u32);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

/// Where a record's storage lives, which decides its reclamation path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Home {
    /// Preallocated pool slot at this index. Wiped and reused on reclaim.
    Pool(usize),
    /// Overflow allocation with this serial. Dropped on reclaim.
    Heap(u64),
}

/// Processing phase of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcState {
    /// Free for claiming.
    Uninitialized,
    /// Claimed and collecting header/payload bytes.
    Receiving,
    /// The bytes turned out to be idle filler. Terminal.
    SyncPacket,
    /// A valid event was assembled and awaits the dispatcher. Terminal success.
    AwaitingProc,
    /// Carries an outbound event ready to be transmitted.
    AwaitingSend,
    /// Done with, waiting for reclamation. `error` is set for faulty messages.
    AwaitingReap { error: Option<RecordError> },
}

impl ProcState {
    pub fn name(&self) -> &'static str {
        match self {
            ProcState::Uninitialized => "UNINITIALIZED",
            ProcState::Receiving => "RECEIVING",
            ProcState::SyncPacket => "SYNC_PACKET",
            ProcState::AwaitingProc => "AWAITING_PROC",
            ProcState::AwaitingSend => "AWAITING_SEND",
            ProcState::AwaitingReap { error: None } => "AWAITING_REAP",
            ProcState::AwaitingReap { error: Some(_) } => "AWAITING_REAP|ERROR",
        }
    }

    /// The fault carried by an `AwaitingReap` state.
    pub fn error(&self) -> Option<RecordError> {
        match self {
            ProcState::AwaitingReap { error } => *error,
            _ => None,
        }
    }

    /// True once inbound parsing of the record has finished, one way or another.
    pub fn is_finished(&self) -> bool {
        matches!(
            self,
            ProcState::SyncPacket | ProcState::AwaitingProc | ProcState::AwaitingReap { .. }
        )
    }
}

/// Per-message working state, inbound or outbound.
pub struct MessageRecord {
    pub(crate) state: ProcState,
    pub(crate) unique_id: u16,
    pub(crate) message_code: u16,
    pub(crate) checksum_expected: u8,
    pub(crate) checksum_computed: u8,
    pub(crate) bytes_total: u32,
    pub(crate) bytes_received: u32,
    pub(crate) retry_count: u32,
    pub(crate) created_at: Instant,
    pub(crate) event: Option<Box<dyn Event>>,
    pub(crate) session: Option<SessionId>,
    home: Home,
}

impl MessageRecord {
    pub(crate) fn new(home: Home, preload: u8) -> Self {
        Self {
            state: ProcState::Uninitialized,
            unique_id: 0,
            message_code: 0,
            checksum_expected: 0,
            checksum_computed: preload,
            bytes_total: 0,
            bytes_received: 0,
            retry_count: 0,
            created_at: Instant::now(),
            event: None,
            session: None,
            home,
        }
    }

    /// Standalone outbound record carrying `event`, outside any pool.
    pub fn outbound(event: Box<dyn Event>, unique_id: u16, preload: u8) -> Self {
        let mut record = Self::new(Home::Heap(0), preload);
        record.provide_event(event, unique_id);
        record
    }

    /// Reset every field back to the free state. The home is kept.
    pub(crate) fn wipe(&mut self, preload: u8) {
        let home = self.home;
        *self = Self::new(home, preload);
    }

    pub(crate) fn claim(&mut self, session: SessionId) {
        self.state = ProcState::Receiving;
        self.session = Some(session);
    }

    /// Replace the carried event, adopting its code and the given unique id.
    ///
    /// Used both to build outbound messages and to turn a received record
    /// into its own reply.
    pub fn provide_event(&mut self, event: Box<dyn Event>, unique_id: u16) {
        self.unique_id = unique_id;
        self.message_code = event.message_code();
        self.event = Some(event);
    }

    pub fn state(&self) -> ProcState {
        self.state
    }

    pub fn home(&self) -> Home {
        self.home
    }

    pub fn session(&self) -> Option<SessionId> {
        self.session
    }

    pub fn unique_id(&self) -> u16 {
        self.unique_id
    }

    pub fn message_code(&self) -> u16 {
        self.message_code
    }

    pub fn checksum_expected(&self) -> u8 {
        self.checksum_expected
    }

    pub fn checksum_computed(&self) -> u8 {
        self.checksum_computed
    }

    pub fn bytes_total(&self) -> u32 {
        self.bytes_total
    }

    pub fn bytes_received(&self) -> u32 {
        self.bytes_received
    }

    /// Bytes still missing before the record is complete.
    pub fn bytes_remaining(&self) -> u32 {
        self.bytes_total.saturating_sub(self.bytes_received)
    }

    /// Payload length announced by the header (0 until the header is in).
    pub fn payload_len(&self) -> u32 {
        self.bytes_total.saturating_sub(HEADER_SIZE as u32)
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    /// Carry over retries already requested for an earlier copy of this message.
    pub fn restore_retry_count(&mut self, retries: u32) {
        self.retry_count = retries;
    }

    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    pub fn event(&self) -> Option<&dyn Event> {
        self.event.as_deref()
    }

    /// Move the carried event out, e.g. to hand it to the dispatcher.
    pub fn take_event(&mut self) -> Option<Box<dyn Event>> {
        self.event.take()
    }

    /// Whether this record carries one of the reply codes.
    pub fn is_reply(&self) -> bool {
        self.event
            .as_ref()
            .is_some_and(|event| codes::is_reply(event.message_code()))
    }

    /// Whether the carried event type demands acknowledgement.
    pub fn expects_ack(&self) -> bool {
        self.event.as_ref().is_some_and(|event| event.demands_ack())
    }

    /// Mark the record as handled so the owner can reclaim it.
    pub fn mark_reaped(&mut self) {
        self.state = ProcState::AwaitingReap {
            error: self.state.error(),
        };
    }
}

impl fmt::Debug for MessageRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageRecord")
            .field("state", &self.state.name())
            .field("home", &self.home)
            .field("session", &self.session)
            .field("unique_id", &format_args!("{:#06x}", self.unique_id))
            .field("message_code", &format_args!("{:#06x}", self.message_code))
            .field("checksum_expected", &format_args!("{:#04x}", self.checksum_expected))
            .field("checksum_computed", &format_args!("{:#04x}", self.checksum_computed))
            .field("bytes", &format_args!("{}/{}", self.bytes_received, self.bytes_total))
            .field("retries", &self.retry_count)
            .field("age", &self.age())
            .field("event", &self.event)
            .finish()
    }
}
