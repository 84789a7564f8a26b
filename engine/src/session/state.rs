use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Identifier of a logical FIX session, allocated by the session resolver.
/// Multiple connections over time may bind to the same session id; at most
/// one may hold it at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The session state of a connection. A connection starts `Unbound` and
/// becomes `Bound` permanently after its first successfully framed message
/// resolves; there is no sentinel id value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionBinding {
    /// No message has resolved a session for this connection yet
    Unbound,
    /// The connection is permanently bound to a session
    Bound(SessionId),
}

impl SessionBinding {
    pub fn is_bound(&self) -> bool {
        matches!(self, Self::Bound(_))
    }

    pub fn session_id(&self) -> Option<SessionId> {
        match self {
            Self::Bound(id) => Some(*id),
            Self::Unbound => None,
        }
    }
}

/// Errors that can occur while decoding session identity from a frame
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Missing comp id field: tag {0}")]
    MissingCompId(u32),

    #[error("Comp id field is not valid UTF-8: tag {0}")]
    InvalidCompId(u32),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binding_accessors() {
        let unbound = SessionBinding::Unbound;
        assert!(!unbound.is_bound());
        assert_eq!(unbound.session_id(), None);

        let bound = SessionBinding::Bound(SessionId(7));
        assert!(bound.is_bound());
        assert_eq!(bound.session_id(), Some(SessionId(7)));
    }
}
