//! ACK / retry / fail replies built on top of a received record.
//!
//! A reply reuses the inbound record: its event is replaced by a payload-free
//! reply event carrying the same unique id, and the record is marked ready to
//! send. Take the original event out first if it is still needed.

use tracing::debug;

use crate::config::ProtocolConfig;
use crate::error::{FrameError, RecordError, Result};
use crate::event::{ReplyEvent, ReplyKind};
use crate::record::{MessageRecord, ProcState};

/// Builds replies and enforces the retry ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReliabilityController {
    max_retries: u32,
}

impl ReliabilityController {
    pub fn new(max_retries: u32) -> Self {
        Self { max_retries }
    }

    pub fn from_config(config: &ProtocolConfig) -> Self {
        Self::new(config.max_retries)
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Turn `record` into an acknowledgement of itself.
    pub fn ack(&self, record: &mut MessageRecord) {
        self.reply(record, ReplyKind::Ack);
    }

    /// Turn `record` into a retransmission request and return the new count.
    ///
    /// No ceiling applies here; see [`bounded_retry`](Self::bounded_retry).
    pub fn retry(&self, record: &mut MessageRecord) -> u32 {
        self.reply(record, ReplyKind::Retry);
        record.retry_count = record.retry_count.saturating_add(1);
        record.retry_count
    }

    /// Like [`retry`](Self::retry), but fails with [`FrameError::RetryLimit`],
    /// leaving the record untouched, once `max_retries` requests were made.
    pub fn bounded_retry(&self, record: &mut MessageRecord) -> Result<u32> {
        if record.retry_count >= self.max_retries {
            return Err(FrameError::RetryLimit {
                unique_id: record.unique_id,
                retries: record.retry_count,
                max: self.max_retries,
            });
        }
        Ok(self.retry(record))
    }

    /// Turn `record` into a failure notice.
    pub fn fail(&self, record: &mut MessageRecord) {
        self.reply(record, ReplyKind::Fail);
    }

    /// The reply a finished inbound record calls for, if any.
    ///
    /// Replies themselves are never acknowledged. Checksum failures ask for a
    /// retry until the ceiling is hit and fail afterwards.
    pub fn reply_for(&self, record: &MessageRecord) -> Option<ReplyKind> {
        match record.state() {
            ProcState::AwaitingProc if record.expects_ack() && !record.is_reply() => {
                Some(ReplyKind::Ack)
            }
            ProcState::AwaitingReap {
                error: Some(RecordError::ChecksumMismatch { .. }),
            } => {
                if record.retry_count < self.max_retries {
                    Some(ReplyKind::Retry)
                } else {
                    Some(ReplyKind::Fail)
                }
            }
            ProcState::AwaitingReap {
                error: Some(RecordError::UnknownCode(_) | RecordError::PayloadRejected(_)),
            } => Some(ReplyKind::Fail),
            _ => None,
        }
    }

    /// Apply `kind` to `record`. A retry past the ceiling degrades to a fail.
    pub fn apply(&self, record: &mut MessageRecord, kind: ReplyKind) -> ReplyKind {
        match kind {
            ReplyKind::Ack => {
                self.ack(record);
                ReplyKind::Ack
            }
            ReplyKind::Retry => match self.bounded_retry(record) {
                Ok(_) => ReplyKind::Retry,
                Err(_) => {
                    self.fail(record);
                    ReplyKind::Fail
                }
            },
            ReplyKind::Fail => {
                self.fail(record);
                ReplyKind::Fail
            }
        }
    }

    fn reply(&self, record: &mut MessageRecord, kind: ReplyKind) {
        let unique_id = record.unique_id;
        debug!(unique_id, ?kind, "building reply");
        record.provide_event(Box::new(ReplyEvent::new(kind)), unique_id);
        record.state = ProcState::AwaitingSend;
    }
}

impl Default for ReliabilityController {
    fn default() -> Self {
        Self::from_config(&ProtocolConfig::default())
    }
}
