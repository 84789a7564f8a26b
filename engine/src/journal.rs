use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use fixgate_common::types::fix::MsgTypeCode;

use crate::session::state::SessionId;

/// A position in the durable append-only log. Strictly increasing as the
/// log grows; comparable so watermarks can be ordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position(pub u64);

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a downstream consumer ("library") interested in durable
/// log progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LibraryId(pub u32);

impl fmt::Display for LibraryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Result of a non-blocking append attempt. `Backpressured` is retryable
/// and never data loss; the caller must not advance its progress state past
/// anything the writer has not accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    /// The payload was accepted and occupies the returned position
    Recorded(Position),
    /// The writer is temporarily unable to accept more data
    Backpressured,
}

/// One complete message extracted from a connection's byte stream, borrowed
/// from the scan buffer for just long enough to be forwarded.
#[derive(Debug, Clone, Copy)]
pub struct MessageFrame<'a> {
    /// The full inclusive byte range of the message, closing SOH included
    pub bytes: &'a [u8],
    /// The decoded 35= code
    pub msg_type: MsgTypeCode,
    /// The session the owning connection is bound to
    pub session_id: SessionId,
    /// The connection the frame arrived on
    pub connection_id: Uuid,
}

/// The durable log writer seam. Every entrypoint is a non-blocking "try"
/// operation; storage, replay and indexing live behind it.
pub trait Journal {
    /// Appends a framed message with its routing metadata
    fn try_append_message(&mut self, frame: MessageFrame<'_>) -> AppendOutcome;

    /// Appends the session-bootstrap event for a connection
    fn try_append_logon(&mut self, connection_id: Uuid, session_id: SessionId) -> AppendOutcome;

    /// Appends a connection-disconnect event
    fn try_append_disconnect(&mut self, connection_id: Uuid) -> AppendOutcome;

    /// Appends a per-consumer position watermark
    fn try_append_position_watermark(
        &mut self,
        library: LibraryId,
        position: Position,
    ) -> AppendOutcome;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_ordering() {
        assert!(Position(100) < Position(250));
        assert_eq!(Position(5).max(Position(9)), Position(9));
    }
}
