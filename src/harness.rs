//! Fan out workers that each increment a shared counter once, wait for all of
//! them, then read the total.
//!
//! The counter is owned by the caller and handed to workers by reference
//! (scoped threads, rayon scope) or by `Arc` clone (tokio tasks). In every
//! strategy the final read happens only after every worker has been joined,
//! so a correct counter always reports exactly `workers`.

use crate::counter::Counter;
use crate::error::HarnessError;
use clap::ValueEnum;
use parking_lot::Mutex;
use serde::Serialize;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

pub const DEFAULT_WORKERS: usize = 1000;
/// Each worker sleeps this long before incrementing, so that most workers
/// exist by the time the first ones touch the counter.
pub const DEFAULT_START_DELAY: Duration = Duration::from_millis(10);

/// How workers are scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, ValueEnum, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    /// One OS thread per worker
    #[default]
    Threads,
    /// One task per worker on a multi-threaded tokio runtime
    Tokio,
    /// Workers queued onto a fixed-size rayon pool
    Pool,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Strategy::Threads => "threads",
            Strategy::Tokio => "tokio",
            Strategy::Pool => "pool",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarnessConfig {
    pub workers: usize,
    pub strategy: Strategy,
    pub start_delay: Duration,
    /// Thread count for the tokio runtime or rayon pool. `None` lets the
    /// library pick one per core. Ignored by [`Strategy::Threads`].
    pub threads: Option<usize>,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            strategy: Strategy::default(),
            start_delay: DEFAULT_START_DELAY,
            threads: None,
        }
    }
}

impl HarnessConfig {
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_start_delay(mut self, start_delay: Duration) -> Self {
        self.start_delay = start_delay;
        self
    }

    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = Some(threads);
        self
    }

    pub fn validate(&self) -> Result<(), HarnessError> {
        if self.workers == 0 {
            return Err(HarnessError::invalid_config("workers must be at least 1"));
        }
        if self.threads == Some(0) {
            return Err(HarnessError::invalid_config("threads must be at least 1"));
        }
        Ok(())
    }
}

/// Outcome of one run: how many increments were issued and what was read back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Report {
    pub workers: usize,
    pub final_count: u64,
    pub elapsed: Duration,
}

impl Report {
    /// Increments that were performed but are missing from the final count.
    pub fn lost_updates(&self) -> u64 {
        (self.workers as u64).saturating_sub(self.final_count)
    }

    pub fn is_exact(&self) -> bool {
        self.final_count == self.workers as u64
    }
}

/// Spawn `config.workers` workers, each calling `increment` once, join them
/// all, and read the final count.
///
/// [`Strategy::Tokio`] builds its own runtime, so from inside a tokio runtime
/// it returns [`HarnessError::InvalidConfig`]. Use [`run_async`] there.
pub fn run<C>(counter: &Arc<C>, config: &HarnessConfig) -> Result<Report, HarnessError>
where
    C: Counter + ?Sized + 'static,
{
    config.validate()?;
    debug!(
        workers = config.workers,
        strategy = %config.strategy,
        start_delay = ?config.start_delay,
        "spawning workers"
    );

    let started = Instant::now();
    match config.strategy {
        Strategy::Threads => run_threads(&**counter, config)?,
        Strategy::Tokio => run_tokio(counter, config)?,
        Strategy::Pool => run_pool(&**counter, config)?,
    }
    Ok(finish(&**counter, config, started))
}

/// Same as [`run`], but spawns the workers as tasks on the runtime the caller
/// is already running on. `config.strategy` and `config.threads` are ignored.
pub async fn run_async<C>(counter: &Arc<C>, config: &HarnessConfig) -> Result<Report, HarnessError>
where
    C: Counter + ?Sized + 'static,
{
    config.validate()?;
    debug!(workers = config.workers, start_delay = ?config.start_delay, "spawning tasks");

    let started = Instant::now();
    spawn_tasks(counter, config).await?;
    Ok(finish(&**counter, config, started))
}

fn finish<C: Counter + ?Sized>(counter: &C, config: &HarnessConfig, started: Instant) -> Report {
    let report = Report {
        workers: config.workers,
        final_count: counter.read(),
        elapsed: started.elapsed(),
    };
    if report.is_exact() {
        debug!(count = report.final_count, elapsed = ?report.elapsed, "all increments counted");
    } else {
        warn!(
            count = report.final_count,
            expected = report.workers,
            lost = report.lost_updates(),
            "increments lost"
        );
    }
    report
}

fn worker<C: Counter + ?Sized>(counter: &C, start_delay: Duration) {
    if !start_delay.is_zero() {
        thread::sleep(start_delay);
    }
    counter.increment();
}

fn run_threads<C: Counter + ?Sized>(
    counter: &C,
    config: &HarnessConfig,
) -> Result<(), HarnessError> {
    let start_delay = config.start_delay;

    thread::scope(|s| {
        let mut handles = Vec::with_capacity(config.workers);
        let mut spawn_error = None;

        for id in 0..config.workers {
            let spawned = thread::Builder::new()
                .name(format!("counter-worker-{id}"))
                .spawn_scoped(s, move || worker(counter, start_delay));
            match spawned {
                Ok(handle) => handles.push(handle),
                Err(source) => {
                    spawn_error = Some(HarnessError::Spawn { worker: id, source });
                    break;
                }
            }
        }

        // join everything before reporting, the scope panics on unjoined panicked threads
        let mut panicked = None;
        for (id, handle) in handles.into_iter().enumerate() {
            if handle.join().is_err() && panicked.is_none() {
                panicked = Some(id);
            }
        }

        if let Some(err) = spawn_error {
            return Err(err);
        }
        match panicked {
            Some(worker) => Err(HarnessError::WorkerPanicked { worker }),
            None => Ok(()),
        }
    })
}

fn run_tokio<C>(counter: &Arc<C>, config: &HarnessConfig) -> Result<(), HarnessError>
where
    C: Counter + ?Sized + 'static,
{
    if tokio::runtime::Handle::try_current().is_ok() {
        return Err(HarnessError::invalid_config(
            "tokio strategy cannot block inside an existing runtime, use run_async",
        ));
    }

    let mut builder = tokio::runtime::Builder::new_multi_thread();
    if let Some(threads) = config.threads {
        builder.worker_threads(threads);
    }
    let runtime = builder.enable_all().build().map_err(HarnessError::Runtime)?;

    runtime.block_on(spawn_tasks(counter, config))
}

async fn spawn_tasks<C>(counter: &Arc<C>, config: &HarnessConfig) -> Result<(), HarnessError>
where
    C: Counter + ?Sized + 'static,
{
    let mut v = Vec::with_capacity(config.workers);
    for _ in 0..config.workers {
        let n = Arc::clone(counter);
        let start_delay = config.start_delay;
        let t = tokio::spawn(async move {
            if !start_delay.is_zero() {
                tokio::time::sleep(start_delay).await;
            }
            n.increment();
        });

        v.push(t);
    }

    let mut first_error = None;
    for (id, t) in v.into_iter().enumerate() {
        match t.await {
            Ok(()) => {}
            Err(err) if first_error.is_some() => debug!(worker = id, %err, "worker failed"),
            Err(err) if err.is_panic() => {
                first_error = Some(HarnessError::WorkerPanicked { worker: id })
            }
            Err(err) => first_error = Some(HarnessError::Join(err)),
        }
    }

    match first_error {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

fn run_pool<C: Counter + ?Sized>(counter: &C, config: &HarnessConfig) -> Result<(), HarnessError> {
    let mut builder =
        rayon::ThreadPoolBuilder::new().thread_name(|index| format!("counter-pool-{index}"));
    if let Some(threads) = config.threads {
        builder = builder.num_threads(threads);
    }
    let pool = builder.build()?;

    let start_delay = config.start_delay;
    let panicked = Mutex::new(None);
    pool.scope(|s| {
        for id in 0..config.workers {
            let panicked = &panicked;
            s.spawn(move |_| {
                let outcome =
                    panic::catch_unwind(AssertUnwindSafe(|| worker(counter, start_delay)));
                if outcome.is_err() {
                    let mut first = panicked.lock();
                    if first.is_none() {
                        *first = Some(id);
                    }
                }
            });
        }
    });

    match panicked.into_inner() {
        Some(worker) => Err(HarnessError::WorkerPanicked { worker }),
        None => Ok(()),
    }
}

/// Aggregate of repeated runs on fresh counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrialSummary {
    pub workers: usize,
    pub trials: usize,
    pub exact_trials: usize,
    pub min: u64,
    pub max: u64,
}

impl TrialSummary {
    pub fn all_exact(&self) -> bool {
        self.exact_trials == self.trials
    }

    /// Largest number of increments lost in any single trial.
    pub fn worst_loss(&self) -> u64 {
        (self.workers as u64).saturating_sub(self.min)
    }
}

/// Run `trials` independent runs, each on a fresh counter from `factory`.
pub fn run_trials<C, F>(
    mut factory: F,
    config: &HarnessConfig,
    trials: usize,
) -> Result<TrialSummary, HarnessError>
where
    C: Counter + ?Sized + 'static,
    F: FnMut() -> Arc<C>,
{
    if trials == 0 {
        return Err(HarnessError::invalid_config("trials must be at least 1"));
    }

    let mut summary = TrialSummary {
        workers: config.workers,
        trials,
        exact_trials: 0,
        min: u64::MAX,
        max: 0,
    };
    for trial in 0..trials {
        let report = run(&factory(), config)?;
        debug!(trial, count = report.final_count, "trial finished");

        if report.is_exact() {
            summary.exact_trials += 1;
        }
        summary.min = summary.min.min(report.final_count);
        summary.max = summary.max.max(report.final_count);
    }

    info!(
        trials,
        exact = summary.exact_trials,
        min = summary.min,
        max = summary.max,
        "trials finished"
    );
    Ok(summary)
}
