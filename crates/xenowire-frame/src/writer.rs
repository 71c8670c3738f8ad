use std::io::{ErrorKind, Write};

use bytes::BytesMut;

use crate::config::ProtocolConfig;
use crate::error::{FrameError, Result};
use crate::event::Event;
use crate::framer::MessageFramer;

const INITIAL_BUFFER_CAPACITY: usize = 1024;

/// Writes complete messages to any `Write` stream.
pub struct MessageWriter<T> {
    inner: T,
    buf: BytesMut,
    framer: MessageFramer,
}

impl<T: Write> MessageWriter<T> {
    /// Create a new writer with default protocol configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, &ProtocolConfig::default())
    }

    /// Create a new writer with explicit protocol configuration.
    pub fn with_config(inner: T, config: &ProtocolConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            framer: MessageFramer::new(config),
        }
    }

    /// Serialize and send `event` under `unique_id` (blocking).
    ///
    /// Returns the number of bytes written.
    pub fn send(&mut self, event: &dyn Event, unique_id: u16) -> Result<usize> {
        self.buf.clear();
        let total = self.framer.serialize(event, unique_id, &mut self.buf)?;
        self.write_buffered()?;
        Ok(total)
    }

    /// Send `count` sync patterns as link-idle filler.
    pub fn send_sync(&mut self, count: usize) -> Result<()> {
        if count == 0 {
            return Ok(());
        }
        self.buf.clear();
        self.buf.extend_from_slice(&self.framer.sync_packet(count));
        self.write_buffered()
    }

    /// Write pre-serialized frame bytes as-is.
    pub fn send_raw(&mut self, frame: &[u8]) -> Result<()> {
        self.buf.clear();
        self.buf.extend_from_slice(frame);
        self.write_buffered()
    }

    fn write_buffered(&mut self) -> Result<()> {
        let mut offset = 0usize;
        while offset < self.buf.len() {
            match self.inner.write(&self.buf[offset..]) {
                Ok(0) => return Err(FrameError::ConnectionClosed),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }

        self.flush()
    }

    /// Flush the underlying stream.
    pub fn flush(&mut self) -> Result<()> {
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
    }

    pub fn framer(&self) -> &MessageFramer {
        &self.framer
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the writer and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }
}
