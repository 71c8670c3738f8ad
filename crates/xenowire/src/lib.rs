//! Checksummed point-to-point binary messaging for constrained links.
//!
//! # Crate Structure
//!
//! - [`frame`]: wire format, message records and their pool, reply building
//! - [`session`]: per-link reply bookkeeping and session ownership (behind
//!   the `session` feature)

/// Re-export frame types.
pub mod frame {
    pub use xenowire_frame::*;
}

/// Re-export session types (requires `session` feature).
#[cfg(feature = "session")]
pub mod session {
    pub use xenowire_session::*;
}
