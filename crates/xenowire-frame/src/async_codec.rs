//! `tokio_util` codec over the message protocol.

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};
use tracing::trace;

use crate::assembler::{Assembler, Received};
use crate::config::ProtocolConfig;
use crate::error::{FrameError, Result};
use crate::event::{Dispatcher, Event};
use crate::framer::MessageFramer;
use crate::record::SessionId;

/// Item accepted by the [`XenoCodec`] encoder.
#[derive(Debug)]
pub enum Outgoing {
    Message {
        unique_id: u16,
        event: Box<dyn Event>,
    },
    /// `n` repeats of the idle pattern.
    Sync(usize),
}

/// Decodes [`Received`] items (sync packets skipped) and encodes [`Outgoing`] ones.
pub struct XenoCodec<D> {
    assembler: Assembler,
    framer: MessageFramer,
    dispatcher: D,
}

impl<D: Dispatcher> XenoCodec<D> {
    pub fn new(dispatcher: D) -> Self {
        Self::with_config(dispatcher, &ProtocolConfig::default())
    }

    pub fn with_config(dispatcher: D, config: &ProtocolConfig) -> Self {
        Self {
            assembler: Assembler::new(config, SessionId(0)),
            framer: MessageFramer::new(config),
            dispatcher,
        }
    }

    pub fn assembler(&self) -> &Assembler {
        &self.assembler
    }
}

impl<D: Dispatcher> Decoder for XenoCodec<D> {
    type Item = Received;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Received>> {
        if !src.is_empty() {
            self.assembler.extend(src);
            src.clear();
        }
        while let Some(received) = self.assembler.next_received(&self.dispatcher) {
            match received {
                Received::Sync => trace!("skipped sync packet"),
                other => return Ok(Some(other)),
            }
        }
        Ok(None)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Received>> {
        match self.decode(src)? {
            Some(received) => Ok(Some(received)),
            None if self.assembler.is_mid_record() => Err(FrameError::ConnectionClosed),
            None => Ok(None),
        }
    }
}

impl<D> Encoder<Outgoing> for XenoCodec<D> {
    type Error = FrameError;

    fn encode(&mut self, item: Outgoing, dst: &mut BytesMut) -> Result<()> {
        match item {
            Outgoing::Message { unique_id, event } => {
                self.framer.serialize(event.as_ref(), unique_id, dst)?;
            }
            Outgoing::Sync(count) => dst.extend_from_slice(&self.framer.sync_packet(count)),
        }
        Ok(())
    }
}
