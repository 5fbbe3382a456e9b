//! End-to-end runs of the counter variants under many concurrent workers.
//!
//! The synchronized counter must be exact on every run. The unsynchronized
//! and accessor counters must be shown to lose increments at least once.

use counter_race::harness::{self, HarnessConfig, Strategy};
use counter_race::{AccessorCounter, Counter, LockedCounter, UnsynchronizedCounter, Variant};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;

const WORKERS: usize = 1000;

fn fast(strategy: Strategy) -> HarnessConfig {
    HarnessConfig::default()
        .with_workers(WORKERS)
        .with_strategy(strategy)
        .with_start_delay(Duration::ZERO)
}

/// Config that makes workers collide: every worker is parked for a few
/// milliseconds, so most of them wake up together.
fn contended() -> HarnessConfig {
    HarnessConfig::default()
        .with_workers(WORKERS)
        .with_start_delay(Duration::from_millis(5))
}

/// Runs fresh counters until one loses an increment, checking that no run
/// ever over-counts. Returns the lowest count seen.
fn find_lost_update<C, F>(factory: F, attempts: usize) -> u64
where
    C: Counter + 'static,
    F: Fn() -> Arc<C>,
{
    let config = contended();
    let mut lowest = u64::MAX;
    for _ in 0..attempts {
        let report = harness::run(&factory(), &config).unwrap();
        assert!(report.final_count <= WORKERS as u64, "{report:?}");
        lowest = lowest.min(report.final_count);
        if lowest < WORKERS as u64 {
            break;
        }
    }
    lowest
}

#[test]
fn single_worker_counts_one() {
    let counter = Arc::new(LockedCounter::new());
    let config = HarnessConfig::default().with_workers(1);

    let report = harness::run(&counter, &config).unwrap();

    assert_eq!(report.final_count, 1);
    assert_eq!(counter.read(), 1);
}

#[test]
fn locked_counter_is_exact_across_hundred_trials() {
    let summary =
        harness::run_trials(|| Arc::new(LockedCounter::new()), &fast(Strategy::Threads), 100)
            .unwrap();

    assert_eq!(summary.exact_trials, 100);
    assert_eq!((summary.min, summary.max), (1000, 1000));
}

#[test]
fn locked_counter_is_exact_on_tokio_and_pool() {
    for strategy in [Strategy::Tokio, Strategy::Pool] {
        let config = fast(strategy).with_threads(8);
        let summary =
            harness::run_trials(|| Arc::new(LockedCounter::new()), &config, 20).unwrap();
        assert!(summary.all_exact(), "{strategy}: {summary:?}");
    }
}

#[test]
fn locked_counter_is_exact_with_demo_start_delay() {
    let counter = Arc::new(LockedCounter::new());
    let report = harness::run(&counter, &contended()).unwrap();
    assert_eq!(report.final_count, 1000);
    assert_eq!(report.lost_updates(), 0);
}

#[test]
fn unsynchronized_counter_loses_updates() {
    let lowest = find_lost_update(|| Arc::new(UnsynchronizedCounter::new()), 50);
    assert!(lowest < 1000, "no lost update observed in 50 runs");
}

#[test]
fn accessor_counter_loses_updates() {
    let lowest = find_lost_update(|| Arc::new(AccessorCounter::new()), 50);
    assert!(lowest < 1000, "no lost update observed in 50 runs");
}

#[test]
fn variants_built_at_runtime_respect_their_guarantees() {
    for variant in Variant::ALL.into_iter().filter(|v| v.is_synchronized()) {
        let summary = harness::run_trials(|| variant.build(), &fast(Strategy::Threads), 5).unwrap();
        assert!(summary.all_exact(), "{variant}: {summary:?}");
    }
}
