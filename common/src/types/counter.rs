use std::sync::atomic::{AtomicU64, Ordering};

/// A monotonic event counter with a single logical writer and any number of
/// concurrent readers. The writer publishes with a Release store so readers
/// observe a consistent value without any lock; no write-write concurrency
/// is assumed.
#[derive(Debug, Default)]
pub struct EventCounter {
    value: AtomicU64,
}

impl EventCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Increments the counter. Must only be called from the single owning
    /// worker; the plain load is safe because nobody else writes.
    pub fn increment(&self) {
        let next = self.value.load(Ordering::Relaxed) + 1;
        self.value.store(next, Ordering::Release);
    }

    /// Reads the counter from any thread.
    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_increment_and_get() {
        let counter = EventCounter::new();
        assert_eq!(counter.get(), 0);
        counter.increment();
        counter.increment();
        assert_eq!(counter.get(), 2);
    }

    #[test]
    fn test_visible_across_threads() {
        let counter = Arc::new(EventCounter::new());
        for _ in 0..100 {
            counter.increment();
        }

        let reader = {
            let counter = counter.clone();
            std::thread::spawn(move || counter.get())
        };
        assert_eq!(reader.join().unwrap(), 100);
    }
}
