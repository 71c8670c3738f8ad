//! Session layer for xenowire links.
//!
//! A [`Session`] owns the receive side of one link: it assembles inbound
//! messages and answers them with replies. It also tracks
//! outbound messages until the peer acknowledges them.

pub mod error;
pub mod registry;
pub mod session;

pub use error::{Result, SessionError};
pub use registry::SessionRegistry;
pub use session::{Delivery, Session, SessionStats};
