//! Checksummed point-to-point message framing with pooled message records.
//!
//! Every message on the wire is an 8-byte little-endian header followed by
//! its payload:
//! - A 3-byte total length (header included)
//! - A 1-byte additive checksum seeded with a configurable preload
//! - A 2-byte unique id pairing requests with replies
//! - A 2-byte message code selecting the payload type
//!
//! While the link is idle the sender may emit 4-byte sync patterns, which the
//! receiver culls before the next header.

pub mod assembler;
#[cfg(feature = "async")]
pub mod async_codec;
pub mod checksum;
pub mod codes;
pub mod config;
pub mod error;
pub mod event;
pub mod framer;
pub mod pool;
pub mod reader;
pub mod record;
pub mod registry;
pub mod reliability;
pub mod sync;
pub mod writer;

pub use assembler::{Assembler, AssemblerStats, Received};
#[cfg(feature = "async")]
pub use async_codec::{Outgoing, XenoCodec};
pub use checksum::{frame_checksum, ChecksumAccumulator};
pub use codes::{code_name, is_reply, REPLY, REPLY_FAIL, REPLY_RETRY, UNDEFINED, USER_CODE_START};
pub use config::{ProtocolConfig, DEFAULT_MAX_RETRIES, DEFAULT_POOL_CAPACITY, DEFAULT_PRELOAD, MAX_WIRE_FRAME_LEN};
pub use error::{FrameError, RecordError, Result};
pub use event::{Dispatcher, Event, PayloadError, RawEvent, ReplyEvent, ReplyKind};
pub use framer::{FrameHeader, MessageFramer, HEADER_SIZE};
pub use pool::{MessageObjectPool, PoolStats, RecordKey};
pub use reader::MessageReader;
pub use record::{Home, MessageRecord, ProcState, SessionId};
pub use registry::{CodeDef, MessageRegistry};
pub use reliability::ReliabilityController;
pub use sync::{sync_pattern, SyncScanner, SYNC_LEN};
pub use writer::MessageWriter;
