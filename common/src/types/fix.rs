use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The FIX field separator byte (ASCII SOH, 0x01).
pub const SOH: u8 = 0x01;

/// The single-byte tag id of the BodyLength field (tag 9), which must sit
/// immediately after the BeginString prefix of every message.
pub const TAG_BODY_LENGTH: u8 = b'9';

/// Tag numbers used when scanning message bodies.
pub const TAG_MSG_TYPE: u32 = 35;
pub const TAG_SENDER_COMP_ID: u32 = 49;
pub const TAG_TARGET_COMP_ID: u32 = 56;
pub const TAG_CHECKSUM: u32 = 10;

/// The byte pattern that must appear at the offset implied by the declared
/// body length: the SOH closing the body followed by the CheckSum tag.
pub const CHECKSUM_MARKER: [u8; 4] = [SOH, b'1', b'0', b'='];

/// Structural configuration for FIX protocol handling. These are wire-level
/// constants of the deployment, not behavior: the framer only needs to know
/// how long the fixed version prefix is and how large a declared body it
/// should ever accept.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FixConfig {
    /// The BeginString value expected from counterparties (e.g. "FIX.4.2")
    pub begin_string: String,

    /// Upper bound on the declared body length of a single message
    pub max_body_length: usize,
}

impl FixConfig {
    /// Length of the fixed message prefix: `8=` plus the BeginString plus the
    /// SOH closing the field. The BodyLength tag sits immediately after.
    pub fn common_prefix_len(&self) -> usize {
        2 + self.begin_string.len() + 1
    }
}

impl Default for FixConfig {
    fn default() -> Self {
        Self {
            begin_string: "FIX.4.2".to_string(),
            max_body_length: 4096,
        }
    }
}

/// The raw one-or-two byte MsgType (35=) code of a frame, as it appeared on
/// the wire. Kept as bytes rather than an enum so unknown types still frame
/// and forward cleanly; classification happens via [`MessageKind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MsgTypeCode {
    bytes: [u8; 2],
    len: u8,
}

impl MsgTypeCode {
    /// Builds a code from the bytes following `35=`. Only one and two byte
    /// codes exist in the protocol.
    pub fn new(code: &[u8]) -> Option<Self> {
        match *code {
            [a] => Some(Self { bytes: [a, 0], len: 1 }),
            [a, b] => Some(Self { bytes: [a, b], len: 2 }),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len as usize]
    }

    /// Classifies the code into the message kinds the gateway distinguishes.
    pub fn kind(&self) -> MessageKind {
        MessageKind::classify(self.as_bytes())
    }
}

impl fmt::Display for MsgTypeCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &b in self.as_bytes() {
            write!(f, "{}", b as char)?;
        }
        Ok(())
    }
}

/// Message kinds keyed by the decoded 35= code. A lookup table rather than a
/// closed enum over the wire value: codes the table does not know fall
/// through to `Other` and are still framed and forwarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    /// Heartbeat (35=0) - keeps the session alive
    Heartbeat,
    /// Test Request (35=1)
    TestRequest,
    /// Resend Request (35=2)
    ResendRequest,
    /// Session-level Reject (35=3)
    Reject,
    /// Sequence Reset (35=4)
    SequenceReset,
    /// Logout (35=5) - terminates a session
    Logout,
    /// Execution Report (35=8)
    ExecutionReport,
    /// Logon (35=A) - initiates a session
    Logon,
    /// New Order Single (35=D)
    NewOrderSingle,
    /// Order Cancel Request (35=F)
    OrderCancelRequest,
    /// Any code the table does not name
    Other,
}

impl MessageKind {
    /// Maps a decoded 35= code onto its kind.
    pub fn classify(code: &[u8]) -> Self {
        match code {
            b"0" => Self::Heartbeat,
            b"1" => Self::TestRequest,
            b"2" => Self::ResendRequest,
            b"3" => Self::Reject,
            b"4" => Self::SequenceReset,
            b"5" => Self::Logout,
            b"8" => Self::ExecutionReport,
            b"A" => Self::Logon,
            b"D" => Self::NewOrderSingle,
            b"F" => Self::OrderCancelRequest,
            _ => Self::Other,
        }
    }

    /// Whether this is a session-level administrative message.
    pub fn is_admin(&self) -> bool {
        matches!(
            self,
            Self::Heartbeat
                | Self::TestRequest
                | Self::ResendRequest
                | Self::Reject
                | Self::SequenceReset
                | Self::Logout
                | Self::Logon
        )
    }
}

/// Common utility functions for FIX message handling
pub mod utils {
    use super::*;

    /// Generates a timestamp string in FIX protocol format (YYYYMMDD-HH:MM:SS).
    /// Always UTC.
    pub fn generate_timestamp() -> String {
        let now: DateTime<Utc> = Utc::now();
        now.format("%Y%m%d-%H:%M:%S").to_string()
    }

    /// Calculates the FIX checksum of a byte range: the sum of all bytes
    /// modulo 256, formatted as a three-digit string with leading zeros.
    /// Used by message builders; the framer itself only validates the
    /// checksum tag structurally.
    pub fn calculate_checksum(msg: &[u8]) -> String {
        let sum: u32 = msg.iter().map(|&b| b as u32).sum();
        format!("{:03}", sum % 256)
    }
}
