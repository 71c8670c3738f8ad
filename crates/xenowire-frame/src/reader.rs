use std::io::{ErrorKind, Read};

use tracing::trace;

use crate::assembler::{Assembler, AssemblerStats, Received};
use crate::config::ProtocolConfig;
use crate::error::{FrameError, Result};
use crate::event::Dispatcher;
use crate::record::SessionId;

const READ_CHUNK_SIZE: usize = 4 * 1024;

/// Reads finished messages from any `Read` stream.
///
/// Handles partial reads and idle filler internally: callers get one
/// delivered or faulty message per call.
pub struct MessageReader<T, D> {
    inner: T,
    dispatcher: D,
    assembler: Assembler,
}

impl<T: Read, D: Dispatcher> MessageReader<T, D> {
    /// Create a new reader with default protocol configuration.
    pub fn new(inner: T, dispatcher: D) -> Self {
        Self::with_config(inner, dispatcher, &ProtocolConfig::default())
    }

    /// Create a new reader with explicit protocol configuration.
    pub fn with_config(inner: T, dispatcher: D, config: &ProtocolConfig) -> Self {
        Self {
            inner,
            dispatcher,
            assembler: Assembler::new(config, SessionId(0)),
        }
    }

    /// Read the next message (blocking), skipping sync packets.
    ///
    /// Returns `Err(FrameError::ConnectionClosed)` when EOF is reached.
    pub fn read_message(&mut self) -> Result<Received> {
        loop {
            while let Some(received) = self.assembler.next_received(&self.dispatcher) {
                match received {
                    Received::Sync => trace!("skipped sync packet"),
                    other => return Ok(other),
                }
            }

            let mut chunk = [0u8; READ_CHUNK_SIZE];
            let read = match self.inner.read(&mut chunk) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            };

            if read == 0 {
                return Err(FrameError::ConnectionClosed);
            }

            self.assembler.extend(&chunk[..read]);
        }
    }

    pub fn stats(&self) -> AssemblerStats {
        self.assembler.stats()
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }
}
