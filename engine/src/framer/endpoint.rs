use std::sync::Arc;
use tracing::{debug, error, info, trace, warn};
use uuid::Uuid;

use fixgate_common::types::counter::EventCounter;
use fixgate_common::types::fix::{MsgTypeCode, CHECKSUM_MARKER, SOH, TAG_BODY_LENGTH};

use crate::framer::buffer::ScanBuffer;
use crate::framer::types::{
    ByteSource, DisconnectReason, ExtractOutcome, FramerSettings, FramerStats, FramingFault,
    ReadEvent,
};
use crate::journal::{AppendOutcome, Journal, MessageFrame};
use crate::session::resolver::{decode_logon_fields, SessionOutcome, SessionResolver};
use crate::session::state::SessionBinding;

/// Handles incoming data from one socket: drains the byte source into the
/// scan buffer, extracts complete frames, resolves the session on the first
/// message and forwards frames to the journal.
///
/// One framer exists per connection and is the connection's only state; it
/// is driven by a single-threaded external scheduler, so no entrypoint here
/// blocks and none is ever invoked concurrently for the same connection.
pub struct StreamFramer<S: ByteSource> {
    connection_id: Uuid,
    source: S,
    buffer: ScanBuffer,
    settings: FramerSettings,
    binding: SessionBinding,
    /// Set between session resolution and the durable append of the logon
    /// event, so a backpressured logon is retried before any frame
    logon_pending: bool,
    has_disconnected: bool,
    disconnect_reason: Option<DisconnectReason>,
    stats: FramerStats,
    messages_read: Arc<EventCounter>,
}

impl<S: ByteSource> StreamFramer<S> {
    pub fn new(source: S, settings: FramerSettings, messages_read: Arc<EventCounter>) -> Self {
        let connection_id = Uuid::new_v4();
        info!(
            connection_id = %connection_id,
            buffer_capacity = settings.buffer_capacity,
            "connection accepted"
        );
        Self {
            connection_id,
            source,
            buffer: ScanBuffer::new(settings.buffer_capacity),
            settings,
            binding: SessionBinding::Unbound,
            logon_pending: false,
            has_disconnected: false,
            disconnect_reason: None,
            stats: FramerStats::default(),
            messages_read,
        }
    }

    pub fn connection_id(&self) -> Uuid {
        self.connection_id
    }

    pub fn session(&self) -> SessionBinding {
        self.binding
    }

    pub fn has_disconnected(&self) -> bool {
        self.has_disconnected
    }

    pub fn disconnect_reason(&self) -> Option<DisconnectReason> {
        self.disconnect_reason
    }

    pub fn stats(&self) -> &FramerStats {
        &self.stats
    }

    /// Bytes currently buffered and unconsumed
    pub fn buffered(&self) -> usize {
        self.buffer.used()
    }

    /// Invoked by the scheduler when new bytes may be available. Drains the
    /// source, frames as many complete messages as the buffer holds, then
    /// compacts. Never blocks and never propagates an error; transport
    /// failures close the connection.
    pub fn on_readable(&mut self, journal: &mut dyn Journal, sessions: &mut dyn SessionResolver) {
        if self.has_disconnected {
            return;
        }

        match self.source.read(self.buffer.free_mut()) {
            ReadEvent::Data(n) => {
                self.buffer.commit(n);
                self.stats.bytes_received += n as u64;
                trace!(connection_id = %self.connection_id, bytes = n, "read");
            }
            ReadEvent::EndOfStream => {
                self.disconnect(DisconnectReason::RemoteClosed, journal, sessions);
                return;
            }
            ReadEvent::Failed(e) => {
                error!(
                    connection_id = %self.connection_id,
                    error = %e,
                    "read failed"
                );
                self.disconnect(DisconnectReason::IoFailure, journal, sessions);
                return;
            }
        }

        self.frame_messages(journal, sessions);
    }

    /// Explicit local teardown. Idempotent.
    pub fn close(&mut self, journal: &mut dyn Journal, sessions: &mut dyn SessionResolver) {
        self.disconnect(DisconnectReason::LocalClose, journal, sessions);
    }

    /// One scan pass: extracts frames starting at offset 0 until data runs
    /// out, a fault stops the pass, or the journal pushes back. Always
    /// compacts afterwards unless the pass disconnected the connection.
    fn frame_messages(&mut self, journal: &mut dyn Journal, sessions: &mut dyn SessionResolver) {
        let mut offset = 0;
        loop {
            match self.extract_frame(offset) {
                ExtractOutcome::NeedMoreData => break,
                ExtractOutcome::StructuralError(fault) => {
                    warn!(
                        connection_id = %self.connection_id,
                        fault = %fault,
                        "abandoning scan pass"
                    );
                    self.stats.framing_errors += 1;
                    break;
                }
                ExtractOutcome::Fatal(fault) => {
                    error!(
                        connection_id = %self.connection_id,
                        fault = %fault,
                        "unrecoverable framing corruption"
                    );
                    self.stats.framing_errors += 1;
                    self.disconnect(DisconnectReason::InvalidFraming, journal, sessions);
                    return;
                }
                ExtractOutcome::Complete { length, msg_type } => {
                    if !self.binding.is_bound() {
                        let frame_bytes = &self.buffer.bytes()[offset..offset + length];
                        match decode_logon_fields(frame_bytes) {
                            Ok(logon) => {
                                let key = sessions.derive_composite_key(&logon);
                                match sessions.resolve_or_allocate(key, self.connection_id) {
                                    SessionOutcome::Allocated(session_id) => {
                                        info!(
                                            connection_id = %self.connection_id,
                                            session_id = %session_id,
                                            "session bound"
                                        );
                                        self.binding = SessionBinding::Bound(session_id);
                                        self.logon_pending = true;
                                    }
                                    SessionOutcome::DuplicateSession => {
                                        warn!(
                                            connection_id = %self.connection_id,
                                            "duplicate session rejected"
                                        );
                                        self.disconnect(
                                            DisconnectReason::DuplicateSession,
                                            journal,
                                            sessions,
                                        );
                                        return;
                                    }
                                }
                            }
                            Err(e) => {
                                warn!(
                                    connection_id = %self.connection_id,
                                    error = %e,
                                    "first frame carries no session identity, abandoning scan pass"
                                );
                                self.stats.framing_errors += 1;
                                break;
                            }
                        }
                    }

                    let SessionBinding::Bound(session_id) = self.binding else {
                        break;
                    };

                    // The logon event must reach the journal before the
                    // logon frame itself, across backpressure
                    if self.logon_pending {
                        match journal.try_append_logon(self.connection_id, session_id) {
                            AppendOutcome::Recorded(_) => self.logon_pending = false,
                            AppendOutcome::Backpressured => {
                                debug!(
                                    connection_id = %self.connection_id,
                                    "logon event backpressured, retrying next pass"
                                );
                                break;
                            }
                        }
                    }

                    let frame = MessageFrame {
                        bytes: &self.buffer.bytes()[offset..offset + length],
                        msg_type,
                        session_id,
                        connection_id: self.connection_id,
                    };
                    match journal.try_append_message(frame) {
                        AppendOutcome::Recorded(position) => {
                            self.messages_read.increment();
                            self.stats.frames_forwarded += 1;
                            trace!(
                                connection_id = %self.connection_id,
                                msg_type = %msg_type,
                                length,
                                position = %position,
                                "frame forwarded"
                            );
                            offset += length;
                        }
                        AppendOutcome::Backpressured => {
                            debug!(
                                connection_id = %self.connection_id,
                                "frame backpressured, retrying next pass"
                            );
                            break;
                        }
                    }
                }
            }
        }

        self.buffer.compact(offset);
    }

    /// Attempts to locate one complete frame starting at `offset`. Purely a
    /// scan over buffered bytes; consumes nothing.
    fn extract_frame(&self, offset: usize) -> ExtractOutcome {
        let used = self.buffer.used();
        let prefix = self.settings.common_prefix_len;

        // Version marker plus the fixed-position BodyLength tag and its '='
        let start_of_body_length = offset + prefix + 2;
        if used < start_of_body_length {
            return ExtractOutcome::NeedMoreData;
        }

        let data = self.buffer.bytes();
        if data[offset + prefix] != TAG_BODY_LENGTH || data[offset + prefix + 1] != b'=' {
            return ExtractOutcome::Fatal(FramingFault::LengthTagMissing);
        }

        let Some(end_of_body_length) = self.buffer.scan(start_of_body_length, used, SOH) else {
            return ExtractOutcome::NeedMoreData;
        };
        let Some(body_length) = self.buffer.ascii_uint(start_of_body_length, end_of_body_length)
        else {
            return ExtractOutcome::Fatal(FramingFault::BodyLengthMalformed);
        };
        let body_length = body_length as usize;
        if body_length > self.settings.max_body_length {
            return ExtractOutcome::Fatal(FramingFault::BodyTooLarge {
                declared: body_length,
                max: self.settings.max_body_length,
            });
        }

        // The declared body length implies where the checksum field starts
        let start_of_checksum = end_of_body_length + body_length;
        if start_of_checksum + CHECKSUM_MARKER.len() > used {
            return ExtractOutcome::NeedMoreData;
        }
        if data[start_of_checksum..start_of_checksum + CHECKSUM_MARKER.len()] != CHECKSUM_MARKER {
            return ExtractOutcome::Fatal(FramingFault::ChecksumMarkerMismatch);
        }

        // End of message is the SOH closing the checksum field, inclusive
        let Some(last) = self
            .buffer
            .scan(start_of_checksum + CHECKSUM_MARKER.len(), used, SOH)
        else {
            return ExtractOutcome::NeedMoreData;
        };

        let Some(msg_type) = self.message_type(end_of_body_length, start_of_checksum) else {
            return ExtractOutcome::StructuralError(FramingFault::MsgTypeMissing);
        };

        ExtractOutcome::Complete {
            length: last + 1 - offset,
            msg_type,
        }
    }

    /// Reads the one-or-two byte 35= code from the frame body
    fn message_type(&self, end_of_body_length: usize, start_of_checksum: usize) -> Option<MsgTypeCode> {
        let eq = self.buffer.scan(end_of_body_length, start_of_checksum, b'=')?;
        let data = self.buffer.bytes();
        let first = *data.get(eq + 1)?;
        if first == SOH {
            return None;
        }
        match data.get(eq + 2) {
            Some(&b) if b != SOH => MsgTypeCode::new(&[first, b]),
            _ => MsgTypeCode::new(&[first]),
        }
    }

    /// Tears the connection down exactly once: closes the source, notifies
    /// the session registry and emits a disconnect event. The disconnect
    /// event is best-effort; a backpressured append is logged, not retried.
    fn disconnect(
        &mut self,
        reason: DisconnectReason,
        journal: &mut dyn Journal,
        sessions: &mut dyn SessionResolver,
    ) {
        if self.has_disconnected {
            return;
        }
        self.has_disconnected = true;
        self.disconnect_reason = Some(reason);

        self.source.close();
        sessions.on_disconnect(self.connection_id);
        if let AppendOutcome::Backpressured = journal.try_append_disconnect(self.connection_id) {
            warn!(
                connection_id = %self.connection_id,
                "disconnect event backpressured, dropped"
            );
        }

        info!(
            connection_id = %self.connection_id,
            reason = ?reason,
            "connection disconnected"
        );
    }
}
