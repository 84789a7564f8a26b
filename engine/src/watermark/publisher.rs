use std::collections::HashMap;
use tracing::{debug, trace};

use crate::journal::{AppendOutcome, Journal, LibraryId, Position};

/// A message fragment already recorded in the durable log, tagged with the
/// consumer it belongs to and the position it occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordedFragment {
    pub library: LibraryId,
    pub position: Position,
}

/// Tracks, per consumer, the highest durable log position observed on its
/// behalf and republishes that watermark downstream.
///
/// The pending map coalesces deliberately: absence of a key means "no
/// pending update", and an entry always holds the latest observed position
/// for that consumer. Older observations are superseded, never queued, so
/// if a position advances several times between flushes only the newest
/// value is ever published. The watermark is a monotone high-water mark,
/// not an event log; intermediate values carry no information.
///
/// Nothing here persists across restarts: the map is rebuilt by replaying
/// the fragment feed from the durable log.
#[derive(Debug, Default)]
pub struct PositionPublisher {
    pending: HashMap<LibraryId, Position>,
}

impl PositionPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the position of a previously-logged fragment. Last write
    /// wins; positions are monotone by construction of the log, so recency
    /// of call is enough.
    pub fn on_fragment(&mut self, fragment: RecordedFragment) {
        self.pending.insert(fragment.library, fragment.position);
    }

    /// Direct variant of the same update when the position is already known
    pub fn set_position(&mut self, library: LibraryId, position: Position) {
        self.pending.insert(library, position);
    }

    /// Drains whatever the fragment feed has available right now. Returns
    /// the number of fragments consumed.
    pub fn poll(&mut self, feed: &mut dyn Iterator<Item = RecordedFragment>) -> usize {
        let mut drained = 0;
        for fragment in feed {
            self.on_fragment(fragment);
            drained += 1;
        }
        drained
    }

    /// Attempts to publish every pending watermark. A successful publish
    /// removes the entry; a backpressured one leaves it intact for the next
    /// call, with whatever value is current by then. Returns the number of
    /// consumers successfully flushed, for caller-side backoff heuristics.
    pub fn flush(&mut self, journal: &mut dyn Journal) -> usize {
        let mut flushed = 0;
        self.pending.retain(|&library, &mut position| {
            match journal.try_append_position_watermark(library, position) {
                AppendOutcome::Recorded(_) => {
                    trace!(library = %library, position = %position, "watermark published");
                    flushed += 1;
                    false
                }
                AppendOutcome::Backpressured => {
                    debug!(library = %library, "watermark backpressured, retrying next flush");
                    true
                }
            }
        });
        flushed
    }

    /// Number of consumers with an unpublished advance
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// The unpublished position for a consumer, if any
    pub fn pending_position(&self, library: LibraryId) -> Option<Position> {
        self.pending.get(&library).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::RecordingJournal;

    #[test]
    fn test_coalesces_to_latest_position() {
        let mut publisher = PositionPublisher::new();
        let mut journal = RecordingJournal::new();

        publisher.on_fragment(RecordedFragment {
            library: LibraryId(3),
            position: Position(100),
        });
        publisher.on_fragment(RecordedFragment {
            library: LibraryId(3),
            position: Position(250),
        });
        assert_eq!(publisher.pending(), 1);
        assert_eq!(publisher.pending_position(LibraryId(3)), Some(Position(250)));

        assert_eq!(publisher.flush(&mut journal), 1);
        // Exactly one publish: 100 is never sent
        assert_eq!(journal.watermarks(), vec![(LibraryId(3), Position(250))]);
        assert_eq!(publisher.pending(), 0);
    }

    #[test]
    fn test_flush_with_nothing_pending() {
        let mut publisher = PositionPublisher::new();
        let mut journal = RecordingJournal::new();
        assert_eq!(publisher.flush(&mut journal), 0);
        assert_eq!(journal.events().len(), 0);
    }

    #[test]
    fn test_permanent_backpressure_leaves_map_intact() {
        let mut publisher = PositionPublisher::new();
        let mut journal = RecordingJournal::new();
        journal.set_reject_all(true);

        publisher.set_position(LibraryId(1), Position(10));
        publisher.set_position(LibraryId(2), Position(20));

        for _ in 0..3 {
            assert_eq!(publisher.flush(&mut journal), 0);
            assert_eq!(publisher.pending(), 2);
        }
        assert_eq!(journal.watermarks(), vec![]);

        // Once the pressure clears, exactly one publish per consumer
        journal.set_reject_all(false);
        assert_eq!(publisher.flush(&mut journal), 2);
        assert_eq!(publisher.pending(), 0);
        let mut watermarks = journal.watermarks();
        watermarks.sort_by_key(|&(library, _)| library.0);
        assert_eq!(
            watermarks,
            vec![(LibraryId(1), Position(10)), (LibraryId(2), Position(20))]
        );
    }

    #[test]
    fn test_advance_during_backpressure_publishes_newest() {
        let mut publisher = PositionPublisher::new();
        let mut journal = RecordingJournal::new();

        publisher.set_position(LibraryId(7), Position(50));
        journal.reject_next(1);
        assert_eq!(publisher.flush(&mut journal), 0);

        // The position moves on while the publish is pending
        publisher.set_position(LibraryId(7), Position(80));
        assert_eq!(publisher.flush(&mut journal), 1);
        assert_eq!(journal.watermarks(), vec![(LibraryId(7), Position(80))]);
    }

    #[test]
    fn test_published_values_never_regress() {
        let mut publisher = PositionPublisher::new();
        let mut journal = RecordingJournal::new();

        let updates = [5u64, 17, 17, 42, 99, 140];
        let mut last_published = None;
        for (i, &value) in updates.iter().enumerate() {
            publisher.set_position(LibraryId(1), Position(value));
            if i % 2 == 1 {
                publisher.flush(&mut journal);
            }
        }
        publisher.flush(&mut journal);

        for (_, position) in journal.watermarks() {
            if let Some(previous) = last_published {
                assert!(position >= previous);
            }
            last_published = Some(position);
        }
        // The final published value is the maximum ever recorded
        assert_eq!(last_published, Some(Position(140)));
        assert_eq!(publisher.pending(), 0);
    }

    #[test]
    fn test_poll_drains_feed() {
        let mut publisher = PositionPublisher::new();
        let fragments = vec![
            RecordedFragment {
                library: LibraryId(1),
                position: Position(11),
            },
            RecordedFragment {
                library: LibraryId(2),
                position: Position(12),
            },
            RecordedFragment {
                library: LibraryId(1),
                position: Position(19),
            },
        ];

        let mut feed = fragments.into_iter();
        assert_eq!(publisher.poll(&mut feed), 3);
        assert_eq!(publisher.pending(), 2);
        assert_eq!(publisher.pending_position(LibraryId(1)), Some(Position(19)));
        assert_eq!(publisher.pending_position(LibraryId(2)), Some(Position(12)));
        assert_eq!(publisher.pending_position(LibraryId(9)), None);
    }
}
