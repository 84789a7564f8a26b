pub mod publisher;

pub use publisher::{PositionPublisher, RecordedFragment};
