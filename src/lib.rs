//! Parallel enumeration of fixed-length base-10 digit strings with bounded
//! memory output.
//!
//! A run of depth `d` expands a recursion tree whose every internal node has
//! ten children, one per digit, and whose `10^d` leaves are the completed
//! combinations. The tree is never materialized: each node is a small `Copy`
//! value living only inside the task that expands it, and the expansion is a
//! fork-join over rayon's work-stealing pool.
//!
//! Completed combinations are drained to a [`Destination`] by one of two
//! strategies:
//! - **Queue** ([`Strategy::Queue`]): leaves push into a bounded handoff queue
//!   consumed by a single sink writer. A sentinel waits for the whole
//!   production subtree to join and only then enqueues the end-of-stream
//!   marker, so the marker is observed after every value.
//! - **Inline batched** ([`Strategy::InlineBatched`]): each node one level
//!   above the leaves writes its ten children under one lock acquisition.
//!   Nothing flows back up the tree.
//!
//! Key modules:
//! - `config`: run parameters, encodings and validation.
//! - `executor`: the root coordinator that forks producers and the sink.
//! - `queue` and `sink`: the bounded handoff and its consumer.
//! - `batch`: the lock-guarded batched writer.
//! - `destination`: output sinks, including an atomically published file.
//! - `types`: combination nodes and digit strings.
//!
//! Quick start:
//! ```
//! use combofork::{config::RunConfig, destination::WriterDestination, executor};
//!
//! let report = executor::run(RunConfig::new(2), WriterDestination::new(Vec::new()))?;
//! assert_eq!(report.lines_written, 100);
//! # Ok::<(), combofork::error::RunError>(())
//! ```
//!
//! Output grows tenfold per digit: depth 7 is about ten million lines, depth
//! 9 about a billion.
//!
//! The blocking queue operations are real thread blocks, not cooperative
//! suspension points. If blocked producers occupy every pool worker while
//! the sink waits to be scheduled in the same pool, the run deadlocks; see
//! [`SinkPlacement`] and [`EnqueuePolicy`] for the mitigations.
//!
//! [`Destination`]: destination::Destination
//! [`Strategy::Queue`]: config::Strategy::Queue
//! [`Strategy::InlineBatched`]: config::Strategy::InlineBatched
//! [`SinkPlacement`]: config::SinkPlacement
//! [`EnqueuePolicy`]: config::EnqueuePolicy

/// Lock-guarded batched writer used by the inline strategy.
pub mod batch;
/// Run configuration.
///
/// Exposes [`RunConfig`](config::RunConfig) and the enums selecting the sink
/// strategy, the output encoding, the enqueue policy and the sink placement.
pub mod config;
/// Output destinations.
pub mod destination;
/// Error types for configuration, parsing and runs.
pub mod error;
/// The root coordinator.
///
/// Validates the configuration, owns the work-stealing pool, and forks the
/// production subtree alongside the sink writer, joining all of them before
/// returning.
pub mod executor;
/// Bounded handoff queue between leaf tasks and the sink writer.
pub mod queue;
/// The single consumer draining the handoff queue.
pub mod sink;
mod sync;
mod task;
/// Combination nodes, digit strings and completed combinations.
pub mod types;
mod utils;
