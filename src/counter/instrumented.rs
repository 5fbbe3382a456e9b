use super::{Counter, LockedCounter};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::thread;

/// [`LockedCounter`] that records how many workers are inside the critical
/// section at the same time.
///
/// `max_occupancy` above 1 would mean two increments overlapped.
#[derive(Debug, Default)]
pub struct InstrumentedCounter {
    inner: LockedCounter,
    occupancy: AtomicUsize,
    max_occupancy: AtomicUsize,
    entries: AtomicU64,
}

impl InstrumentedCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Highest number of workers ever observed inside the critical section.
    pub fn max_occupancy(&self) -> usize {
        self.max_occupancy.load(Ordering::SeqCst)
    }

    /// Number of times the critical section was entered.
    pub fn entries(&self) -> u64 {
        self.entries.load(Ordering::SeqCst)
    }
}

impl Counter for InstrumentedCounter {
    fn increment(&self) {
        self.inner.with_mut(|v| {
            let inside = self.occupancy.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_occupancy.fetch_max(inside, Ordering::SeqCst);
            self.entries.fetch_add(1, Ordering::SeqCst);

            thread::yield_now();
            *v += 1;

            self.occupancy.fetch_sub(1, Ordering::SeqCst);
        });
    }

    fn read(&self) -> u64 {
        self.inner.read()
    }
}
