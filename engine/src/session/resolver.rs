use std::fmt;
use uuid::Uuid;

use fixgate_common::types::fix::{SOH, TAG_SENDER_COMP_ID, TAG_TARGET_COMP_ID};

use crate::session::state::{SessionError, SessionId};

/// The logon header fields that session identity is derived from. Full
/// field-level decoding is out of scope for the gateway edge; only the two
/// comp id fields matter here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogonFields {
    pub sender_comp_id: String,
    pub target_comp_id: String,
}

/// Composite identity derived from logon fields, used to look up or
/// allocate a session in the registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CompositeKey {
    sender_comp_id: String,
    target_comp_id: String,
}

impl CompositeKey {
    pub fn new(sender_comp_id: String, target_comp_id: String) -> Self {
        Self {
            sender_comp_id,
            target_comp_id,
        }
    }
}

impl fmt::Display for CompositeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}->{}", self.sender_comp_id, self.target_comp_id)
    }
}

/// Result of asking the registry for a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    /// The key resolved to a session, existing or newly allocated
    Allocated(SessionId),
    /// Another live connection already owns this key
    DuplicateSession,
}

/// The session registry seam. The gateway edge consumes this; key
/// derivation strategy, duplicate detection and persistence live behind it.
pub trait SessionResolver {
    /// Derives the composite identity key from decoded logon fields
    fn derive_composite_key(&self, logon: &LogonFields) -> CompositeKey;

    /// Resolves the key to a session id or rejects it as a duplicate. The
    /// connection id is recorded so `on_disconnect` can release the key.
    fn resolve_or_allocate(&mut self, key: CompositeKey, connection_id: Uuid) -> SessionOutcome;

    /// Notifies the registry that a connection has gone away
    fn on_disconnect(&mut self, connection_id: Uuid);
}

/// Extracts the SenderCompID (49) and TargetCompID (56) fields from a
/// complete frame by tag scan. The frame is already structurally validated;
/// missing fields mean the first message cannot establish an identity.
pub fn decode_logon_fields(frame: &[u8]) -> Result<LogonFields, SessionError> {
    let mut sender: Option<&[u8]> = None;
    let mut target: Option<&[u8]> = None;

    for field in frame.split(|&b| b == SOH) {
        let Some(eq) = field.iter().position(|&b| b == b'=') else {
            continue;
        };
        match &field[..eq] {
            b"49" => sender = Some(&field[eq + 1..]),
            b"56" => target = Some(&field[eq + 1..]),
            _ => {}
        }
    }

    let sender = sender.ok_or(SessionError::MissingCompId(TAG_SENDER_COMP_ID))?;
    let target = target.ok_or(SessionError::MissingCompId(TAG_TARGET_COMP_ID))?;

    Ok(LogonFields {
        sender_comp_id: std::str::from_utf8(sender)
            .map_err(|_| SessionError::InvalidCompId(TAG_SENDER_COMP_ID))?
            .to_string(),
        target_comp_id: std::str::from_utf8(target)
            .map_err(|_| SessionError::InvalidCompId(TAG_TARGET_COMP_ID))?
            .to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_logon_fields() {
        let frame = b"8=FIX.4.2\x019=30\x0135=A\x0149=MAKER\x0156=GATEWAY\x0134=1\x0110=000\x01";
        let logon = decode_logon_fields(frame).unwrap();
        assert_eq!(logon.sender_comp_id, "MAKER");
        assert_eq!(logon.target_comp_id, "GATEWAY");
    }

    #[test]
    fn test_missing_sender_comp_id() {
        let frame = b"8=FIX.4.2\x019=10\x0135=A\x0156=GATEWAY\x0110=000\x01";
        let err = decode_logon_fields(frame).unwrap_err();
        assert!(matches!(err, SessionError::MissingCompId(49)));
    }

    #[test]
    fn test_missing_target_comp_id() {
        let frame = b"8=FIX.4.2\x019=10\x0135=A\x0149=MAKER\x0110=000\x01";
        let err = decode_logon_fields(frame).unwrap_err();
        assert!(matches!(err, SessionError::MissingCompId(56)));
    }

    #[test]
    fn test_composite_key_display() {
        let key = CompositeKey::new("MAKER".to_string(), "GATEWAY".to_string());
        assert_eq!(key.to_string(), "MAKER->GATEWAY");
    }
}
