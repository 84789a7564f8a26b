// The inbound engine: per-connection stream framing and position watermark
// publication, driven by an external single-threaded scheduler.
pub mod framer;
pub mod journal;
pub mod mock;
pub mod session;
pub mod watermark;

// Re-export the two component entrypoints
pub use framer::endpoint::StreamFramer;
pub use watermark::publisher::PositionPublisher;
