pub mod resolver;
pub mod state;

pub use resolver::{decode_logon_fields, CompositeKey, LogonFields, SessionOutcome, SessionResolver};
pub use state::{SessionBinding, SessionError, SessionId};
