use xenowire_frame::SessionId;

/// Errors that can occur in session operations.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] xenowire_frame::FrameError),

    /// No open session has this id.
    #[error("unknown session {0}")]
    UnknownSession(SessionId),

    /// Every session id has been handed out once.
    #[error("session ids exhausted")]
    IdsExhausted,
}

pub type Result<T> = std::result::Result<T, SessionError>;
