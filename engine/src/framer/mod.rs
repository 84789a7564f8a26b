pub mod buffer;
pub mod endpoint;
pub mod types;

pub use buffer::ScanBuffer;
pub use endpoint::StreamFramer;
pub use types::{ByteSource, DisconnectReason, FramerSettings, FramerStats, FramingFault, ReadEvent, TcpByteSource};
