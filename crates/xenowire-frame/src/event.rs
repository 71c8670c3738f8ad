//! Collaborator interfaces consumed by the framer.
//!
//! The framer never looks inside a payload. An [`Event`] serializes and
//! deserializes itself, and a [`Dispatcher`] turns a message code into an
//! empty event ready to be filled from the wire.

use std::fmt;
use std::sync::Arc;

use bytes::{BufMut, Bytes, BytesMut};

use crate::codes::{REPLY, REPLY_FAIL, REPLY_RETRY};

/// Errors raised by an event's payload serializer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PayloadError {
    /// The payload ended before all fields were read.
    #[error("payload truncated (needed {needed} bytes, got {available})")]
    Truncated { needed: usize, available: usize },

    /// The payload bytes do not form a valid value for this event.
    #[error("invalid payload: {0}")]
    Invalid(String),
}

/// A typed event that can cross the wire.
pub trait Event: fmt::Debug + Send {
    /// Code identifying the event's semantic type.
    fn message_code(&self) -> u16;

    /// Append the serialized payload to `dst`.
    fn serialize(&self, dst: &mut BytesMut) -> Result<(), PayloadError>;

    /// Populate this event from a received payload.
    fn deserialize(&mut self, src: &[u8]) -> Result<(), PayloadError>;

    /// Whether receipt of this event must be acknowledged.
    fn demands_ack(&self) -> bool {
        false
    }
}

/// Resolves message codes into payload templates.
pub trait Dispatcher {
    /// An empty event for `message_code`, or `None` if the code is unknown.
    fn resolve(&self, message_code: u16) -> Option<Box<dyn Event>>;
}

impl<D: Dispatcher + ?Sized> Dispatcher for Arc<D> {
    fn resolve(&self, message_code: u16) -> Option<Box<dyn Event>> {
        (**self).resolve(message_code)
    }
}

impl<D: Dispatcher + ?Sized> Dispatcher for &D {
    fn resolve(&self, message_code: u16) -> Option<Box<dyn Event>> {
        (**self).resolve(message_code)
    }
}

/// Event whose payload is kept as opaque bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEvent {
    code: u16,
    payload: Bytes,
    demands_ack: bool,
}

impl RawEvent {
    pub fn new(code: u16, payload: impl Into<Bytes>) -> Self {
        Self {
            code,
            payload: payload.into(),
            demands_ack: false,
        }
    }

    /// Mark the event as requiring acknowledgement.
    pub fn with_ack(mut self, demands_ack: bool) -> Self {
        self.demands_ack = demands_ack;
        self
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }
}

impl Event for RawEvent {
    fn message_code(&self) -> u16 {
        self.code
    }

    fn serialize(&self, dst: &mut BytesMut) -> Result<(), PayloadError> {
        dst.put_slice(&self.payload);
        Ok(())
    }

    fn deserialize(&mut self, src: &[u8]) -> Result<(), PayloadError> {
        self.payload = Bytes::copy_from_slice(src);
        Ok(())
    }

    fn demands_ack(&self) -> bool {
        self.demands_ack
    }
}

/// The three reply flavours a receiver can send back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReplyKind {
    Ack,
    Retry,
    Fail,
}

impl ReplyKind {
    pub const fn code(self) -> u16 {
        match self {
            ReplyKind::Ack => REPLY,
            ReplyKind::Retry => REPLY_RETRY,
            ReplyKind::Fail => REPLY_FAIL,
        }
    }

    pub const fn from_code(code: u16) -> Option<Self> {
        match code {
            REPLY => Some(ReplyKind::Ack),
            REPLY_RETRY => Some(ReplyKind::Retry),
            REPLY_FAIL => Some(ReplyKind::Fail),
            _ => None,
        }
    }
}

/// Payload-free reply event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplyEvent {
    kind: ReplyKind,
}

impl ReplyEvent {
    pub const fn new(kind: ReplyKind) -> Self {
        Self { kind }
    }

    pub const fn kind(&self) -> ReplyKind {
        self.kind
    }
}

impl Event for ReplyEvent {
    fn message_code(&self) -> u16 {
        self.kind.code()
    }

    fn serialize(&self, _dst: &mut BytesMut) -> Result<(), PayloadError> {
        Ok(())
    }

    fn deserialize(&mut self, src: &[u8]) -> Result<(), PayloadError> {
        if src.is_empty() {
            Ok(())
        } else {
            Err(PayloadError::Invalid(format!(
                "reply carries {} unexpected payload bytes",
                src.len()
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_event_serializes_its_bytes() {
        let event = RawEvent::new(0x0100, &b"abc"[..]);
        let mut buf = BytesMut::new();
        event.serialize(&mut buf).unwrap();
        assert_eq!(buf.as_ref(), b"abc");
        assert!(!event.demands_ack());
        assert!(event.clone().with_ack(true).demands_ack());
    }

    #[test]
    fn raw_event_deserialize_replaces_payload() {
        let mut event = RawEvent::new(0x0100, Bytes::new());
        event.deserialize(b"xyz").unwrap();
        assert_eq!(event.payload().as_ref(), b"xyz");
    }

    #[test]
    fn reply_kind_codes_roundtrip() {
        for kind in [ReplyKind::Ack, ReplyKind::Retry, ReplyKind::Fail] {
            assert_eq!(ReplyKind::from_code(kind.code()), Some(kind));
        }
        assert_eq!(ReplyKind::from_code(0x0100), None);
    }

    #[test]
    fn reply_event_rejects_payload() {
        let mut reply = ReplyEvent::new(ReplyKind::Ack);
        assert!(reply.deserialize(&[]).is_ok());
        assert!(matches!(
            reply.deserialize(&[1]),
            Err(PayloadError::Invalid(_))
        ));
    }
}
