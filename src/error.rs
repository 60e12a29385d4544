use crate::types::MAX_DEPTH;
use core::time::Duration;
use std::io;
use thiserror::Error;

/// Rejected run configuration. Produced before any task is dispatched.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// The requested depth exceeds what a line count or digit buffer can hold.
    #[error("depth {depth} exceeds the maximum of {MAX_DEPTH}")]
    DepthTooLarge {
        /// Requested depth.
        depth: u8,
    },
    /// The handoff queue must hold at least one item.
    #[error("queue capacity must be positive")]
    ZeroQueueCapacity,
    /// An explicit worker count of zero.
    #[error("worker pool size must be positive")]
    ZeroThreads,
    /// `seed * 10^depth + (10^depth - 1)` does not fit in a `u128`.
    #[error("numeric seed {seed} overflows at depth {depth}")]
    NumericOverflow {
        /// Configured seed.
        seed: u128,
        /// Requested depth.
        depth: u8,
    },
    /// The work-stealing pool could not be started.
    #[error("failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// Fatal failure of a run. No partial results are salvaged.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RunError {
    /// The configuration was rejected.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// The dedicated sink thread could not be spawned.
    #[error("failed to spawn sink thread: {0}")]
    SinkThread(#[source] io::Error),
    /// Appending to the output destination failed.
    #[error("failed to write to destination: {0}")]
    DestinationWrite(#[source] io::Error),
    /// Flushing or publishing the destination after the last value failed.
    #[error("failed to finalize destination: {0}")]
    Finalize(#[source] io::Error),
    /// A producer waited for a free queue slot longer than allowed. This is
    /// how worker starvation around a blocked sink surfaces.
    #[error("producer stalled for {waited:?} on a full queue")]
    Stalled {
        /// Configured stall timeout.
        waited: Duration,
    },
    /// The sink stopped consuming before the end of the stream.
    #[error("sink closed before the end of the stream")]
    SinkClosed,
    /// Every producer handle was dropped without an end-of-stream marker.
    #[error("producers disconnected without signaling end of stream")]
    ProducersVanished,
    /// The subtree stopped because another part of the run already failed.
    #[error("run aborted after a failure elsewhere")]
    Aborted,
}

impl RunError {
    /// Rank used to pick the error reported when several siblings fail.
    /// Lower is more causal.
    pub(crate) const fn precedence(&self) -> u8 {
        match self {
            Self::Config(_) | Self::SinkThread(_) => 0,
            Self::DestinationWrite(_) | Self::Finalize(_) => 1,
            Self::Stalled { .. } => 2,
            Self::SinkClosed => 3,
            Self::ProducersVanished => 4,
            Self::Aborted => 5,
        }
    }

    /// The more causal of two sibling failures; `self` wins ties.
    #[must_use]
    pub(crate) fn most_causal(self, other: Self) -> Self {
        if other.precedence() < self.precedence() {
            other
        } else {
            self
        }
    }
}

/// Error returned when parsing a [`DigitString`](crate::types::DigitString).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ParseDigitsError {
    /// More than [`MAX_DEPTH`] characters.
    #[error("{len} digits exceed the maximum of {MAX_DEPTH}")]
    TooLong {
        /// Input length in bytes.
        len: usize,
    },
    /// A byte outside `'0'..='9'`.
    #[error("byte {byte:#04x} is not a decimal digit")]
    NotADigit {
        /// Offending byte.
        byte: u8,
    },
}

/// Joins the results of two sibling subtasks, keeping the more causal error.
pub(crate) fn join_results(
    lhs: Result<(), RunError>,
    rhs: Result<(), RunError>,
) -> Result<(), RunError> {
    match (lhs, rhs) {
        (Ok(()), Ok(())) => Ok(()),
        (Err(e), Ok(())) | (Ok(()), Err(e)) => Err(e),
        (Err(lhs), Err(rhs)) => Err(lhs.most_causal(rhs)),
    }
}
