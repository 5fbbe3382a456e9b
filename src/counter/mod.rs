//! Shared counters, correct and broken.
//!
//! Every implementation here performs the same read, add one, store sequence
//! on a single `u64`. They differ only in how much of that sequence runs
//! under exclusion:
//!
//! - [`UnsynchronizedCounter`]: none of it. Two workers can read the same
//!   value before either stores, and one increment is lost.
//! - [`AccessorCounter`]: the read and the store are each locked, but
//!   separately. Another worker's whole increment fits between them, so
//!   increments are still lost.
//! - [`LockedCounter`]: the whole sequence is one critical section. This is
//!   the only shape that keeps the count exact.
//! - [`InstrumentedCounter`]: a [`LockedCounter`] that also measures how many
//!   workers are ever inside the critical section at once.

mod accessor;
mod instrumented;
mod locked;
mod unsynchronized;

pub use accessor::AccessorCounter;
pub use instrumented::InstrumentedCounter;
pub use locked::{new_counter, LockedCounter};
pub use unsynchronized::UnsynchronizedCounter;

use clap::ValueEnum;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// A counter that many workers increment concurrently.
pub trait Counter: Send + Sync {
    /// Add one to the count.
    fn increment(&self);

    /// Current count. Concurrent increments may or may not be visible yet.
    fn read(&self) -> u64;
}

impl<C: Counter + ?Sized> Counter for Arc<C> {
    fn increment(&self) {
        (**self).increment()
    }

    fn read(&self) -> u64 {
        (**self).read()
    }
}

/// Selects one of the counter implementations at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Variant {
    /// No exclusion at all
    Unsynchronized,
    /// One lock held across the whole increment
    Locked,
    /// Separately locked getter and setter
    Accessor,
    /// Locked, with critical-section occupancy tracking
    Instrumented,
}

impl Variant {
    pub const ALL: [Variant; 4] = [
        Variant::Unsynchronized,
        Variant::Locked,
        Variant::Accessor,
        Variant::Instrumented,
    ];

    /// Fresh counter of this variant, starting at zero.
    pub fn build(self) -> Arc<dyn Counter> {
        match self {
            Variant::Unsynchronized => Arc::new(UnsynchronizedCounter::new()),
            Variant::Locked => Arc::new(LockedCounter::new()),
            Variant::Accessor => Arc::new(AccessorCounter::new()),
            Variant::Instrumented => Arc::new(InstrumentedCounter::new()),
        }
    }

    /// Whether the variant guarantees that no increment is lost.
    pub fn is_synchronized(self) -> bool {
        matches!(self, Variant::Locked | Variant::Instrumented)
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Variant::Unsynchronized => "unsynchronized",
            Variant::Locked => "locked",
            Variant::Accessor => "accessor",
            Variant::Instrumented => "instrumented",
        };
        f.write_str(name)
    }
}
