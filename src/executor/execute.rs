use crate::{
    batch::{BatchWriter, LeafBatch},
    config::Encoding,
    destination::Destination,
    error::RunError,
    queue::{Producer, QueueItem},
    task::{Emit, RunStats, decompose},
    types::{CombinationNode, FAN_OUT},
};

/// Leaves enqueue their value into the handoff queue.
pub(super) struct QueueEmitter<'a> {
    pub(super) producer: &'a Producer,
    pub(super) encoding: Encoding,
    pub(super) stats: &'a RunStats,
}

impl Emit for QueueEmitter<'_> {
    fn leaf(&self, leaf: &CombinationNode) -> Result<(), RunError> {
        let Self {
            producer,
            encoding,
            stats,
        } = self;
        let Some(value) = encoding.encode(leaf) else {
            return Ok(());
        };
        producer.enqueue(QueueItem::Value(value))?;
        stats.record_values(1);
        Ok(())
    }
}

/// Nodes one level above the leaves write their children in one locked batch.
/// Nothing flows back up the tree: a subtree is done once it has been written.
pub(super) struct InlineEmitter<'a, D> {
    pub(super) writer: &'a BatchWriter<D>,
    pub(super) encoding: Encoding,
    pub(super) stats: &'a RunStats,
}

impl<D: Destination> InlineEmitter<'_, D> {
    fn write(&self, batch: &LeafBatch) -> Result<(), RunError> {
        self.writer.write_batch(batch.as_slice())?;
        self.stats.record_values(batch.as_slice().len() as u64);
        Ok(())
    }
}

impl<D: Destination> Emit for InlineEmitter<'_, D> {
    /// Only reached at depth 0, where the root is the single leaf.
    fn leaf(&self, leaf: &CombinationNode) -> Result<(), RunError> {
        self.write(&LeafBatch::single(leaf, &self.encoding))
    }

    fn batch(&self, parent: &CombinationNode) -> Option<Result<(), RunError>> {
        self.stats.record_nodes(u64::from(FAN_OUT));
        Some(self.write(&LeafBatch::children_of(parent, &self.encoding)))
    }
}

/// Sentinel: runs the whole production subtree, then signals the end of the
/// stream exactly once.
///
/// `EndOfStream` is enqueued only after `decompose` has returned, that is
/// after every leaf's `enqueue` has completed, so it follows all values in
/// the queue. On failure no marker is sent; dropping `producer` closes the
/// queue and the sink sees [`RunError::ProducersVanished`].
pub(super) fn produce_then_close(
    root: CombinationNode,
    producer: Producer,
    encoding: Encoding,
    stats: &RunStats,
) -> Result<(), RunError> {
    let emitter = QueueEmitter {
        producer: &producer,
        encoding,
        stats,
    };
    match decompose(root, &emitter, stats) {
        Ok(()) => {
            tracing::debug!(
                values = stats.values_emitted(),
                "production joined, signaling end of stream"
            );
            producer.enqueue(QueueItem::EndOfStream)
        }
        Err(err) => {
            tracing::debug!(error = %err, "production failed, closing queue without end of stream");
            Err(err)
        }
    }
}

/// Runs the whole tree with every batch written inline.
pub(super) fn write_inline<D: Destination>(
    root: CombinationNode,
    writer: &BatchWriter<D>,
    encoding: Encoding,
    stats: &RunStats,
) -> Result<(), RunError> {
    let emitter = InlineEmitter {
        writer,
        encoding,
        stats,
    };
    decompose(root, &emitter, stats)
}
