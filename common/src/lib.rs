// Shared types and configuration for the fixgate workspace
pub mod config;
pub mod error;
pub mod types;

// Re-export commonly used types
pub use config::GatewayConfig;
pub use error::{GatewayError, GatewayResult};
pub use types::counter::EventCounter;
pub use types::fix::{FixConfig, MessageKind, MsgTypeCode};
