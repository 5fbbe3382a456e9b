use super::Counter;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;

/// Counter with no exclusion around its read-modify-write.
///
/// The load and the store are separate atomic operations, so the value itself
/// is never torn, but two workers that load the same value both store
/// `value + 1` and one increment disappears. Only useful as the baseline that
/// shows the lost-update bug.
#[derive(Debug, Default)]
pub struct UnsynchronizedCounter {
    value: AtomicU64,
}

impl UnsynchronizedCounter {
    pub fn new() -> Self {
        Self {
            value: AtomicU64::new(0),
        }
    }
}

impl Counter for UnsynchronizedCounter {
    fn increment(&self) {
        let current = self.value.load(Ordering::Relaxed);
        thread::yield_now();
        self.value.store(current + 1, Ordering::Relaxed);
    }

    fn read(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequential_increments_are_counted() {
        let counter = UnsynchronizedCounter::new();
        for _ in 0..5 {
            counter.increment();
        }
        assert_eq!(counter.read(), 5);
    }
}
