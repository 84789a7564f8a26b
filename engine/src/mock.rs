//! In-tree test doubles: a FIX message builder producing structurally valid
//! bytes, a scriptable byte source, a recording journal with scriptable
//! backpressure, and an in-memory session directory.

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::io;
use std::rc::Rc;
use uuid::Uuid;

use fixgate_common::types::fix::{utils, MsgTypeCode};

use crate::framer::types::{ByteSource, ReadEvent};
use crate::journal::{AppendOutcome, Journal, LibraryId, MessageFrame, Position};
use crate::session::resolver::{CompositeKey, LogonFields, SessionOutcome, SessionResolver};
use crate::session::state::SessionId;

/// Builders for real SOH-delimited FIX messages with a computed body length
/// and checksum, so framing tests exercise the same byte shapes production
/// traffic has.
pub struct MockMessages;

impl MockMessages {
    /// Logon (35=A) carrying the comp id fields session identity needs
    pub fn logon(sender: &str, target: &str) -> Vec<u8> {
        Self::build(
            "A",
            &format!(
                "49={}\x0156={}\x0134=1\x0152={}\x01108=30\x0198=0\x01",
                sender,
                target,
                utils::generate_timestamp()
            ),
        )
    }

    /// Heartbeat (35=0)
    pub fn heartbeat(sender: &str, target: &str) -> Vec<u8> {
        Self::build(
            "0",
            &format!(
                "49={}\x0156={}\x0134=2\x0152={}\x01",
                sender,
                target,
                utils::generate_timestamp()
            ),
        )
    }

    /// New Order Single (35=D)
    pub fn new_order_single(sender: &str, target: &str) -> Vec<u8> {
        Self::build(
            "D",
            &format!(
                "49={}\x0156={}\x0134=3\x0152={}\x0111=ORDER1\x0155=AAPL\x0154=1\x0138=100\x0140=2\x0144=42.50\x01",
                sender,
                target,
                utils::generate_timestamp()
            ),
        )
    }

    /// Logout (35=5)
    pub fn logout(sender: &str, target: &str) -> Vec<u8> {
        Self::build(
            "5",
            &format!(
                "49={}\x0156={}\x0134=4\x0152={}\x0158=Normal Logout\x01",
                sender,
                target,
                utils::generate_timestamp()
            ),
        )
    }

    /// Assembles header, body and trailer. The body length counts every
    /// byte after the SOH closing tag 9 up to and including the SOH before
    /// tag 10, which is exactly what the framer's marker check assumes.
    fn build(msg_type: &str, body_fields: &str) -> Vec<u8> {
        let body = format!("35={}\x01{}", msg_type, body_fields);
        let mut msg = format!("8=FIX.4.2\x019={}\x01", body.len()).into_bytes();
        msg.extend_from_slice(body.as_bytes());
        let checksum = utils::calculate_checksum(&msg);
        msg.extend_from_slice(format!("10={}\x01", checksum).as_bytes());
        msg
    }
}

enum ScriptedRead {
    Bytes(Vec<u8>),
    EndOfStream,
    Fail(io::ErrorKind),
}

#[derive(Default)]
struct Script {
    reads: VecDeque<ScriptedRead>,
    closed: bool,
}

/// A `ByteSource` fed from queued chunks. Each `read` delivers at most one
/// queued chunk (split if it exceeds the free buffer), so tests control
/// read boundaries precisely; an empty queue reads as "no data right now".
pub struct ScriptedSource {
    script: Rc<RefCell<Script>>,
}

/// Test-side handle for feeding a [`ScriptedSource`] after the framer has
/// taken ownership of it.
#[derive(Clone)]
pub struct SourceHandle {
    script: Rc<RefCell<Script>>,
}

impl ScriptedSource {
    pub fn new() -> (Self, SourceHandle) {
        let script = Rc::new(RefCell::new(Script::default()));
        (
            Self {
                script: script.clone(),
            },
            SourceHandle { script },
        )
    }
}

impl SourceHandle {
    pub fn push_bytes(&self, bytes: &[u8]) {
        self.script
            .borrow_mut()
            .reads
            .push_back(ScriptedRead::Bytes(bytes.to_vec()));
    }

    pub fn push_eof(&self) {
        self.script
            .borrow_mut()
            .reads
            .push_back(ScriptedRead::EndOfStream);
    }

    pub fn push_failure(&self, kind: io::ErrorKind) {
        self.script
            .borrow_mut()
            .reads
            .push_back(ScriptedRead::Fail(kind));
    }

    pub fn is_closed(&self) -> bool {
        self.script.borrow().closed
    }
}

impl ByteSource for ScriptedSource {
    fn read(&mut self, into: &mut [u8]) -> ReadEvent {
        let mut script = self.script.borrow_mut();
        match script.reads.pop_front() {
            None => ReadEvent::Data(0),
            Some(ScriptedRead::Bytes(mut bytes)) => {
                let n = bytes.len().min(into.len());
                into[..n].copy_from_slice(&bytes[..n]);
                if n < bytes.len() {
                    let rest = bytes.split_off(n);
                    script.reads.push_front(ScriptedRead::Bytes(rest));
                }
                ReadEvent::Data(n)
            }
            Some(ScriptedRead::EndOfStream) => ReadEvent::EndOfStream,
            Some(ScriptedRead::Fail(kind)) => {
                ReadEvent::Failed(io::Error::new(kind, "scripted failure"))
            }
        }
    }

    fn close(&mut self) {
        self.script.borrow_mut().closed = true;
    }
}

/// One event captured by [`RecordingJournal`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JournalEvent {
    Message {
        connection_id: Uuid,
        session_id: SessionId,
        msg_type: MsgTypeCode,
        bytes: Vec<u8>,
    },
    Logon {
        connection_id: Uuid,
        session_id: SessionId,
    },
    Disconnect {
        connection_id: Uuid,
    },
    Watermark {
        library: LibraryId,
        position: Position,
    },
}

/// A `Journal` that records every accepted append in order, allocates
/// monotonically increasing positions, and can be scripted to push back.
#[derive(Default)]
pub struct RecordingJournal {
    events: Vec<JournalEvent>,
    next_position: u64,
    reject_remaining: usize,
    reject_all: bool,
}

impl RecordingJournal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rejects the next `n` append attempts with backpressure
    pub fn reject_next(&mut self, n: usize) {
        self.reject_remaining += n;
    }

    /// Rejects every append until turned off again
    pub fn set_reject_all(&mut self, on: bool) {
        self.reject_all = on;
    }

    pub fn events(&self) -> &[JournalEvent] {
        &self.events
    }

    /// Drops recorded events (positions keep advancing)
    pub fn clear(&mut self) {
        self.events.clear();
    }

    /// The raw bytes of every recorded message event, in order
    pub fn message_bytes(&self) -> Vec<Vec<u8>> {
        self.events
            .iter()
            .filter_map(|event| match event {
                JournalEvent::Message { bytes, .. } => Some(bytes.clone()),
                _ => None,
            })
            .collect()
    }

    /// Every recorded watermark event, in order
    pub fn watermarks(&self) -> Vec<(LibraryId, Position)> {
        self.events
            .iter()
            .filter_map(|event| match event {
                JournalEvent::Watermark { library, position } => Some((*library, *position)),
                _ => None,
            })
            .collect()
    }

    fn record(&mut self, event: JournalEvent) -> AppendOutcome {
        if self.reject_all {
            return AppendOutcome::Backpressured;
        }
        if self.reject_remaining > 0 {
            self.reject_remaining -= 1;
            return AppendOutcome::Backpressured;
        }
        let position = Position(self.next_position);
        self.next_position += 1;
        self.events.push(event);
        AppendOutcome::Recorded(position)
    }
}

impl Journal for RecordingJournal {
    fn try_append_message(&mut self, frame: MessageFrame<'_>) -> AppendOutcome {
        self.record(JournalEvent::Message {
            connection_id: frame.connection_id,
            session_id: frame.session_id,
            msg_type: frame.msg_type,
            bytes: frame.bytes.to_vec(),
        })
    }

    fn try_append_logon(&mut self, connection_id: Uuid, session_id: SessionId) -> AppendOutcome {
        self.record(JournalEvent::Logon {
            connection_id,
            session_id,
        })
    }

    fn try_append_disconnect(&mut self, connection_id: Uuid) -> AppendOutcome {
        self.record(JournalEvent::Disconnect { connection_id })
    }

    fn try_append_position_watermark(
        &mut self,
        library: LibraryId,
        position: Position,
    ) -> AppendOutcome {
        self.record(JournalEvent::Watermark { library, position })
    }
}

/// A `SessionResolver` over in-memory maps: allocates sequential session
/// ids, rejects a composite key that another live connection holds, and
/// releases the key on disconnect.
#[derive(Default)]
pub struct MemorySessionDirectory {
    active: HashMap<CompositeKey, SessionId>,
    by_connection: HashMap<Uuid, CompositeKey>,
    next_session_id: u64,
    disconnects: Vec<Uuid>,
}

impl MemorySessionDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active_sessions(&self) -> usize {
        self.active.len()
    }

    /// Every connection id this directory was told had disconnected
    pub fn disconnects(&self) -> &[Uuid] {
        &self.disconnects
    }
}

impl SessionResolver for MemorySessionDirectory {
    fn derive_composite_key(&self, logon: &LogonFields) -> CompositeKey {
        CompositeKey::new(logon.sender_comp_id.clone(), logon.target_comp_id.clone())
    }

    fn resolve_or_allocate(&mut self, key: CompositeKey, connection_id: Uuid) -> SessionOutcome {
        if self.active.contains_key(&key) {
            return SessionOutcome::DuplicateSession;
        }
        let session_id = SessionId(self.next_session_id);
        self.next_session_id += 1;
        self.active.insert(key.clone(), session_id);
        self.by_connection.insert(connection_id, key);
        SessionOutcome::Allocated(session_id)
    }

    fn on_disconnect(&mut self, connection_id: Uuid) {
        if let Some(key) = self.by_connection.remove(&connection_id) {
            self.active.remove(&key);
        }
        self.disconnects.push(connection_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fixgate_common::types::fix::{CHECKSUM_MARKER, SOH};

    /// The builders must produce frames whose declared body length lands
    /// the checksum marker exactly where the framer will look for it.
    fn assert_structurally_valid(msg: &[u8]) {
        let end_of_body_length = 10 + msg[10..].iter().position(|&b| b == SOH).unwrap();
        let declared: usize = std::str::from_utf8(&msg[12..end_of_body_length])
            .unwrap()
            .parse()
            .unwrap();
        let start_of_checksum = end_of_body_length + declared;
        assert_eq!(
            &msg[start_of_checksum..start_of_checksum + 4],
            &CHECKSUM_MARKER
        );
        assert_eq!(msg[msg.len() - 1], SOH);
    }

    #[test]
    fn test_builders_are_structurally_valid() {
        assert_structurally_valid(&MockMessages::logon("MAKER", "GATEWAY"));
        assert_structurally_valid(&MockMessages::heartbeat("MAKER", "GATEWAY"));
        assert_structurally_valid(&MockMessages::new_order_single("MAKER", "GATEWAY"));
        assert_structurally_valid(&MockMessages::logout("MAKER", "GATEWAY"));
    }

    #[test]
    fn test_scripted_source_splits_oversized_chunks() {
        let (mut source, handle) = ScriptedSource::new();
        handle.push_bytes(b"abcdef");

        let mut buf = [0u8; 4];
        match source.read(&mut buf) {
            ReadEvent::Data(4) => assert_eq!(&buf, b"abcd"),
            other => panic!("unexpected read: {:?}", other),
        }
        match source.read(&mut buf) {
            ReadEvent::Data(2) => assert_eq!(&buf[..2], b"ef"),
            other => panic!("unexpected read: {:?}", other),
        }
        // Queue drained: no data, not EOF
        assert!(matches!(source.read(&mut buf), ReadEvent::Data(0)));
    }

    #[test]
    fn test_recording_journal_backpressure_script() {
        let mut journal = RecordingJournal::new();
        journal.reject_next(1);

        let conn = Uuid::new_v4();
        assert_eq!(
            journal.try_append_disconnect(conn),
            AppendOutcome::Backpressured
        );
        assert!(matches!(
            journal.try_append_disconnect(conn),
            AppendOutcome::Recorded(_)
        ));
        assert_eq!(journal.events().len(), 1);
    }

    #[test]
    fn test_directory_duplicate_and_release() {
        let mut directory = MemorySessionDirectory::new();
        let logon = LogonFields {
            sender_comp_id: "MAKER".to_string(),
            target_comp_id: "GATEWAY".to_string(),
        };
        let key = directory.derive_composite_key(&logon);

        let first_conn = Uuid::new_v4();
        let second_conn = Uuid::new_v4();
        let outcome = directory.resolve_or_allocate(key.clone(), first_conn);
        assert!(matches!(outcome, SessionOutcome::Allocated(_)));
        assert_eq!(
            directory.resolve_or_allocate(key.clone(), second_conn),
            SessionOutcome::DuplicateSession
        );

        directory.on_disconnect(first_conn);
        assert_eq!(directory.active_sessions(), 0);
        assert!(matches!(
            directory.resolve_or_allocate(key, second_conn),
            SessionOutcome::Allocated(_)
        ));
    }
}
