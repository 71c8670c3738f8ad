use crate::event::PayloadError;

/// Errors that can occur while encoding frames or driving message records.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The serialized frame does not fit the configured maximum frame length.
    #[error("frame too large ({size} bytes, max {max})")]
    FrameTooLarge { size: usize, max: usize },

    /// A record was asked to serialize but carries no event.
    #[error("record carries no event to serialize")]
    MissingEvent,

    /// The event's payload serializer failed.
    #[error("payload error: {0}")]
    Payload(#[from] PayloadError),

    /// A record key no longer refers to a live record in its pool.
    #[error("stale record key")]
    StaleRecord,

    /// A retry was requested after the retry ceiling was reached.
    #[error("retry limit reached for message {unique_id:#06x} ({retries}/{max})")]
    RetryLimit { unique_id: u16, retries: u32, max: u32 },

    /// The protocol configuration is unusable.
    #[error("invalid protocol config: {0}")]
    InvalidConfig(String),

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The stream was closed before a complete message was received.
    #[error("connection closed (incomplete message)")]
    ConnectionClosed,
}

pub type Result<T> = std::result::Result<T, FrameError>;

/// Per-record fault, carried by [`ProcState::AwaitingReap`](crate::ProcState::AwaitingReap).
///
/// None of these abort the byte stream. The faulty record is isolated and
/// parsing continues with the next header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RecordError {
    #[error("checksum mismatch (expected {expected:#04x}, computed {computed:#04x})")]
    ChecksumMismatch { expected: u8, computed: u8 },

    #[error("no definition for message code {0:#06x}")]
    UnknownCode(u16),

    #[error("payload for message code {0:#06x} failed to deserialize")]
    PayloadRejected(u16),

    #[error("malformed header (bytes_total {bytes_total} is shorter than a header)")]
    MalformedHeader { bytes_total: u32 },

    #[error("frame announces {bytes_total} bytes, max {max}")]
    Oversize { bytes_total: u32, max: u32 },
}
