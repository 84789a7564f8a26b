use std::io::{self, Read};
use std::net::{Shutdown, TcpStream};
use thiserror::Error;

use fixgate_common::config::GatewayConfig;
use fixgate_common::types::fix::MsgTypeCode;

/// Result of one non-blocking read from a byte source
#[derive(Debug)]
pub enum ReadEvent {
    /// 0..N bytes were copied into the buffer (0 when nothing is available)
    Data(usize),
    /// The remote side closed the stream
    EndOfStream,
    /// The transport failed; the connection is unusable
    Failed(io::Error),
}

/// A bidirectional, non-blocking network stream. `read` must never block:
/// it reports however many bytes are available right now, end-of-stream, or
/// a transport failure.
pub trait ByteSource {
    fn read(&mut self, into: &mut [u8]) -> ReadEvent;
    fn close(&mut self);
}

/// `ByteSource` over a non-blocking TCP stream.
pub struct TcpByteSource {
    stream: TcpStream,
}

impl TcpByteSource {
    pub fn new(stream: TcpStream) -> io::Result<Self> {
        stream.set_nonblocking(true)?;
        stream.set_nodelay(true)?;
        Ok(Self { stream })
    }
}

impl ByteSource for TcpByteSource {
    fn read(&mut self, into: &mut [u8]) -> ReadEvent {
        if into.is_empty() {
            // Buffer full; framing may still free space this pass
            return ReadEvent::Data(0);
        }
        match self.stream.read(into) {
            Ok(0) => ReadEvent::EndOfStream,
            Ok(n) => ReadEvent::Data(n),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => ReadEvent::Data(0),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => ReadEvent::Data(0),
            Err(e) => ReadEvent::Failed(e),
        }
    }

    fn close(&mut self) {
        let _ = self.stream.shutdown(Shutdown::Both);
    }
}

/// Structural framing faults found while scanning buffered bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FramingFault {
    #[error("Body length tag not found at the fixed prefix offset")]
    LengthTagMissing,

    #[error("Body length field is empty or not numeric")]
    BodyLengthMalformed,

    #[error("Declared body length {declared} exceeds the maximum of {max}")]
    BodyTooLarge { declared: usize, max: usize },

    #[error("Checksum tag not found at the offset implied by the body length")]
    ChecksumMarkerMismatch,

    #[error("No message type tag found inside the frame")]
    MsgTypeMissing,
}

/// Why a connection was disconnected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    /// The remote side closed the stream
    RemoteClosed,
    /// A transport-level read failure
    IoFailure,
    /// Unrecoverable framing corruption
    InvalidFraming,
    /// The session registry rejected the logon as a duplicate
    DuplicateSession,
    /// Explicit local teardown
    LocalClose,
}

/// Outcome of one frame-extraction attempt against buffered bytes
#[derive(Debug)]
pub enum ExtractOutcome {
    /// A complete frame of `length` bytes starts at the current offset
    Complete {
        length: usize,
        msg_type: MsgTypeCode,
    },
    /// Required structural markers lie beyond buffered data; wait for more
    NeedMoreData,
    /// The frame body is unusable but boundaries are sound; abandon the
    /// current scan pass, keep the bytes
    StructuralError(FramingFault),
    /// Framing corruption the connection cannot recover from
    Fatal(FramingFault),
}

/// Runtime framing limits derived from configuration
#[derive(Debug, Clone)]
pub struct FramerSettings {
    /// Length of the `8=<BeginString><SOH>` prefix
    pub common_prefix_len: usize,
    /// Upper bound on a declared body length
    pub max_body_length: usize,
    /// Scan buffer capacity per connection
    pub buffer_capacity: usize,
}

impl FramerSettings {
    pub fn from_config(config: &GatewayConfig) -> Self {
        Self {
            common_prefix_len: config.protocol.common_prefix_len(),
            max_body_length: config.protocol.max_body_length,
            buffer_capacity: config.framer.buffer_capacity,
        }
    }
}

impl Default for FramerSettings {
    fn default() -> Self {
        Self::from_config(&GatewayConfig::default())
    }
}

/// Per-connection counters, owned by the single framing worker
#[derive(Debug, Clone, Default)]
pub struct FramerStats {
    /// Number of bytes drained from the source
    pub bytes_received: u64,
    /// Number of frames forwarded to the journal
    pub frames_forwarded: u64,
    /// Number of structural faults observed
    pub framing_errors: u64,
}
