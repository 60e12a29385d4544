mod execute;
mod setup;

use crate::{
    batch::BatchWriter,
    config::{RunConfig, SinkPlacement, Strategy},
    destination::Destination,
    error::{ConfigError, RunError},
    executor::execute::{produce_then_close, write_inline},
    queue,
    sink::{Drained, SinkWriter},
    task::RunStats,
    types::CombinationNode,
};
use derive_more::Debug;
use rayon::ThreadPool;
use std::thread;

/// Outcome of a successful run.
#[must_use]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport<O> {
    /// Lines appended to the destination.
    pub lines_written: u64,
    /// Values handed to the sink by leaf or batching tasks.
    pub values_emitted: u64,
    /// Nodes of the recursion tree that were expanded or emitted, root
    /// included.
    pub nodes_visited: u64,
    /// Destination lock acquisitions; always `0` for the queue strategy.
    pub lock_acquisitions: u64,
    /// The finalized destination.
    pub output: O,
}

/// Root coordinator of a run.
///
/// Owns the validated configuration and the work-stealing pool. Each call to
/// [`run`](Self::run) forks the production subtree and, for the queue
/// strategy, the sink writer as siblings, and returns only once all of them
/// have finished or failed.
#[must_use]
#[derive(Debug)]
pub struct Executor {
    config: RunConfig,
    #[debug(skip)]
    pool: ThreadPool,
}

impl Executor {
    /// Validates `config` and starts the worker pool. Nothing is dispatched
    /// until [`run`](Self::run).
    ///
    /// # Errors
    /// A [`ConfigError`] for any invalid parameter or if the pool cannot be
    /// started.
    pub fn new(config: RunConfig) -> Result<Self, ConfigError> {
        let pool = setup::build_pool(&config)?;
        Ok(Self { config, pool })
    }

    /// The validated configuration.
    #[must_use]
    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Enumerates every combination into `destination`.
    ///
    /// On success the destination is finalized exactly once. On failure it
    /// is abandoned and the most causal error among the failed siblings is
    /// returned.
    ///
    /// # Errors
    /// Any [`RunError`] raised by a producer, the sink or the destination.
    #[tracing::instrument(
        name = "run",
        skip_all,
        fields(depth = self.config.depth, strategy = ?self.config.strategy)
    )]
    pub fn run<D: Destination>(&self, destination: D) -> Result<RunReport<D::Output>, RunError> {
        let root = CombinationNode::root(self.config.depth);
        tracing::info!(
            expected = self.config.encoding.expected_values(self.config.depth),
            "run started"
        );
        let report = match self.config.strategy {
            Strategy::Queue => self.run_queue(root, destination),
            Strategy::InlineBatched => self.run_inline(root, destination),
        };
        match &report {
            Ok(report) => tracing::info!(
                lines_written = report.lines_written,
                nodes_visited = report.nodes_visited,
                "run finished"
            ),
            Err(err) => tracing::error!(error = %err, "run failed"),
        }
        report
    }

    fn run_queue<D: Destination>(
        &self,
        root: CombinationNode,
        destination: D,
    ) -> Result<RunReport<D::Output>, RunError> {
        let Self { config, pool } = self;
        let (producer, consumer) = queue::bounded(config.capacity()?, config.enqueue_policy);
        let sink = SinkWriter::new(consumer, destination);
        let stats = RunStats::new();
        let encoding = config.encoding;

        let (produced, drained) = match config.sink_placement {
            SinkPlacement::DedicatedThread => thread::scope(|scope| {
                let sink = thread::Builder::new()
                    .name("combofork-sink".to_owned())
                    .spawn_scoped(scope, move || sink.drain())
                    .map_err(RunError::SinkThread)?;
                let produced =
                    pool.install(|| produce_then_close(root, producer, encoding, &stats));
                let drained = sink
                    .join()
                    .unwrap_or_else(|panic| std::panic::resume_unwind(panic));
                Ok::<_, RunError>((produced, drained))
            })?,
            // The production side runs first on the calling worker; the sink
            // only starts once another worker steals it.
            SinkPlacement::Pool => pool.install(|| {
                rayon::join(
                    || produce_then_close(root, producer, encoding, &stats),
                    || sink.drain(),
                )
            }),
        };

        let Drained {
            lines_written,
            state: _,
            output,
        } = match (produced, drained) {
            (Ok(()), drained) => drained?,
            (Err(produced), Err(drained)) => return Err(drained.most_causal(produced)),
            (Err(produced), Ok(_)) => return Err(produced),
        };
        Ok(RunReport {
            lines_written,
            values_emitted: stats.values_emitted(),
            nodes_visited: stats.nodes_visited(),
            lock_acquisitions: 0,
            output,
        })
    }

    fn run_inline<D: Destination>(
        &self,
        root: CombinationNode,
        destination: D,
    ) -> Result<RunReport<D::Output>, RunError> {
        let Self { config, pool } = self;
        let writer = BatchWriter::new(destination);
        let stats = RunStats::new();

        let produced = pool.install(|| write_inline(root, &writer, config.encoding, &stats));

        let lines_written = writer.lines_written();
        let lock_acquisitions = writer.lock_acquisitions();
        let destination = writer.into_inner();
        if let Err(err) = produced {
            destination.abandon();
            return Err(err);
        }
        let output = destination.finalize().map_err(RunError::Finalize)?;
        Ok(RunReport {
            lines_written,
            values_emitted: stats.values_emitted(),
            nodes_visited: stats.nodes_visited(),
            lock_acquisitions,
            output,
        })
    }
}

/// Validates `config`, runs it once into `destination` and drops the pool.
///
/// # Errors
/// See [`Executor::new`] and [`Executor::run`].
pub fn run<D: Destination>(
    config: RunConfig,
    destination: D,
) -> Result<RunReport<D::Output>, RunError> {
    Executor::new(config)?.run(destination)
}
