use super::Counter;
use crate::error::CounterError;
use parking_lot::Mutex;
use std::time::Duration;

/// Counter whose every read-modify-write is a single critical section.
///
/// The lock is a `parking_lot::Mutex`, which does not poison: if a closure
/// passed to [`LockedCounter::with_mut`] panics, the guard is dropped during
/// unwinding and the next worker acquires the lock normally.
#[derive(Debug, Default)]
pub struct LockedCounter {
    value: Mutex<u64>,
}

/// Create a counter starting at zero.
pub fn new_counter() -> LockedCounter {
    LockedCounter::new()
}

impl LockedCounter {
    pub fn new() -> Self {
        Self {
            value: Mutex::new(0),
        }
    }

    /// Run `f` with exclusive access to the count.
    ///
    /// The lock is held for exactly the duration of `f`, so any compound
    /// update written inside it (`*v += 1 + *v / 100`) is atomic with respect
    /// to every other caller. The lock is released on return and on unwind.
    pub fn with_mut<R>(&self, f: impl FnOnce(&mut u64) -> R) -> R {
        let mut value = self.value.lock();
        f(&mut value)
    }

    /// Add `n` in one critical section.
    pub fn add(&self, n: u64) {
        self.with_mut(|v| *v += n);
    }

    /// Increment only if the lock is free right now.
    pub fn try_increment(&self) -> Result<(), CounterError> {
        let mut value = self.value.try_lock().ok_or(CounterError::Contended)?;
        *value += 1;
        Ok(())
    }

    /// Increment, waiting at most `timeout` for the lock.
    pub fn try_increment_for(&self, timeout: Duration) -> Result<(), CounterError> {
        let mut value = self
            .value
            .try_lock_for(timeout)
            .ok_or(CounterError::TimedOut(timeout))?;
        *value += 1;
        Ok(())
    }

    /// Consume the counter and return the final count.
    pub fn into_inner(self) -> u64 {
        self.value.into_inner()
    }
}

impl Counter for LockedCounter {
    fn increment(&self) {
        self.with_mut(|v| *v += 1);
    }

    fn read(&self) -> u64 {
        *self.value.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::panic::{self, AssertUnwindSafe};
    use std::sync::mpsc;
    use std::thread;

    #[test]
    fn new_counter_starts_at_zero() {
        assert_eq!(new_counter().read(), 0);
    }

    #[test]
    fn with_mut_applies_compound_update() {
        let counter = LockedCounter::new();
        counter.add(250);
        counter.with_mut(|v| *v += 1 + *v / 100);
        assert_eq!(counter.read(), 253);
    }

    #[test]
    fn with_mut_returns_closure_result() {
        let counter = LockedCounter::new();
        let before = counter.with_mut(|v| {
            let before = *v;
            *v = 42;
            before
        });
        assert_eq!(before, 0);
        assert_eq!(counter.into_inner(), 42);
    }

    #[test]
    fn try_increment_reports_contention() {
        let counter = LockedCounter::new();
        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel::<()>();

        thread::scope(|s| {
            let holder = &counter;
            s.spawn(move || {
                holder.with_mut(|v| {
                    entered_tx.send(()).unwrap();
                    release_rx.recv().unwrap();
                    *v += 1;
                });
            });

            entered_rx.recv().unwrap();
            assert_eq!(counter.try_increment(), Err(CounterError::Contended));
            let timeout = Duration::from_millis(10);
            assert_eq!(
                counter.try_increment_for(timeout),
                Err(CounterError::TimedOut(timeout))
            );
            release_tx.send(()).unwrap();
        });

        assert_eq!(counter.try_increment(), Ok(()));
        assert_eq!(counter.try_increment_for(Duration::from_millis(10)), Ok(()));
        assert_eq!(counter.read(), 3);
    }

    #[test]
    fn panic_inside_critical_section_releases_lock() {
        let counter = LockedCounter::new();
        counter.increment();

        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            counter.with_mut(|_| panic!("interrupted mid-increment"));
        }));
        assert!(result.is_err());

        assert_eq!(counter.try_increment(), Ok(()));
        counter.increment();
        assert_eq!(counter.read(), 3);
    }
}
