//! Error types for counters and the worker harness

use std::time::Duration;
use thiserror::Error;

/// Failure to acquire a counter's lock without blocking.
///
/// Neither variant is fatal: the increment was not applied and the caller may
/// simply try again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CounterError {
    /// Another worker held the lock at the moment of the attempt
    #[error("counter lock is held by another worker")]
    Contended,

    /// The lock could not be acquired within the given time
    #[error("counter lock not acquired within {0:?}")]
    TimedOut(Duration),
}

/// Errors raised while spawning or joining workers.
#[derive(Debug, Error)]
pub enum HarnessError {
    /// Harness configuration rejected before any worker was spawned
    #[error("invalid harness configuration: {0}")]
    InvalidConfig(String),

    /// The OS refused to create a worker thread
    #[error("failed to spawn worker {worker}")]
    Spawn {
        worker: usize,
        #[source]
        source: std::io::Error,
    },

    /// The tokio runtime could not be built
    #[error("failed to build tokio runtime")]
    Runtime(#[source] std::io::Error),

    /// The rayon pool could not be built
    #[error("failed to build worker pool")]
    Pool(#[from] rayon::ThreadPoolBuildError),

    /// A tokio task was cancelled or panicked
    #[error(transparent)]
    Join(#[from] tokio::task::JoinError),

    /// A worker panicked before finishing its increment
    #[error("worker {worker} panicked")]
    WorkerPanicked { worker: usize },
}

impl HarnessError {
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_message_names_the_wait() {
        let err = CounterError::TimedOut(Duration::from_millis(5));
        assert_eq!(err.to_string(), "counter lock not acquired within 5ms");
    }

    #[test]
    fn messages_name_the_worker() {
        let err = HarnessError::WorkerPanicked { worker: 7 };
        assert_eq!(err.to_string(), "worker 7 panicked");

        let err = HarnessError::invalid_config("workers must be at least 1");
        assert_eq!(
            err.to_string(),
            "invalid harness configuration: workers must be at least 1"
        );
    }
}
