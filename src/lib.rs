//! Lost updates on a shared counter, and the single-critical-section fix.
//!
//! ```
//! use counter_race::{harness, Counter, HarnessConfig, LockedCounter};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let counter = Arc::new(LockedCounter::new());
//! let config = HarnessConfig::default()
//!     .with_workers(100)
//!     .with_start_delay(Duration::ZERO);
//! let report = harness::run(&counter, &config).unwrap();
//! assert_eq!(report.final_count, 100);
//! assert_eq!(counter.read(), 100);
//! ```

pub mod counter;
pub mod error;
pub mod harness;

pub use counter::{
    new_counter, AccessorCounter, Counter, InstrumentedCounter, LockedCounter,
    UnsynchronizedCounter, Variant,
};
pub use error::{CounterError, HarnessError};
pub use harness::{HarnessConfig, Report, Strategy, TrialSummary};
