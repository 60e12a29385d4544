use crate::{
    config::Encoding,
    destination::Destination,
    error::RunError,
    sync::{AtomicU64, Mutex, Ordering, lock},
    types::{Combination, CombinationNode, FAN_OUT},
};
use derive_more::Debug;

/// Values of the leaves under one node, collected on the stack.
#[derive(Debug, Clone, Copy)]
pub struct LeafBatch {
    values: [Combination; FAN_OUT as usize],
    len: usize,
}

impl LeafBatch {
    const EMPTY: Self = Self {
        values: [Combination::Numeric(0); FAN_OUT as usize],
        len: 0,
    };

    /// Encodes the children of `parent`, which must sit one level above the
    /// leaves. Filtered leaves are skipped.
    #[must_use]
    pub fn children_of(parent: &CombinationNode, encoding: &Encoding) -> Self {
        debug_assert!(parent.is_last_internal(), "LeafBatch::children_of");
        parent
            .children()
            .filter_map(|leaf| encoding.encode(&leaf))
            .fold(Self::EMPTY, Self::with)
    }

    /// Batch holding the single value of `leaf`, if it survives filtering.
    #[must_use]
    pub fn single(leaf: &CombinationNode, encoding: &Encoding) -> Self {
        encoding
            .encode(leaf)
            .map_or(Self::EMPTY, |value| Self::EMPTY.with(value))
    }

    fn with(mut self, value: Combination) -> Self {
        self.values[self.len] = value;
        self.len += 1;
        self
    }

    /// The collected values.
    #[must_use]
    pub fn as_slice(&self) -> &[Combination] {
        &self.values[..self.len]
    }
}

/// Destination shared by every batching task, guarded by one lock.
///
/// Each [`write_batch`](Self::write_batch) holds the lock for exactly one
/// batch, so lock traffic is a tenth of the leaf count.
#[derive(Debug)]
pub struct BatchWriter<D> {
    #[debug(skip)]
    destination: Mutex<D>,
    #[debug(skip)]
    lock_acquisitions: AtomicU64,
    #[debug(skip)]
    lines_written: AtomicU64,
}

impl<D: Destination> BatchWriter<D> {
    /// Puts `destination` behind the lock.
    pub fn new(destination: D) -> Self {
        Self {
            destination: Mutex::new(destination),
            lock_acquisitions: AtomicU64::new(0),
            lines_written: AtomicU64::new(0),
        }
    }

    /// Appends every value of `batch` under a single lock acquisition.
    /// Empty batches do not touch the lock.
    ///
    /// # Errors
    /// [`RunError::DestinationWrite`] on the first failed append. Values of
    /// the batch after the failing one are not written.
    pub fn write_batch(&self, batch: &[Combination]) -> Result<(), RunError> {
        if batch.is_empty() {
            return Ok(());
        }
        let mut destination = lock(&self.destination);
        self.lock_acquisitions.fetch_add(1, Ordering::Relaxed);
        for value in batch {
            destination
                .append(value)
                .map_err(RunError::DestinationWrite)?;
        }
        drop(destination);
        self.lines_written
            .fetch_add(batch.len() as u64, Ordering::Relaxed);
        Ok(())
    }

    /// Number of times the lock was taken.
    pub fn lock_acquisitions(&self) -> u64 {
        self.lock_acquisitions.load(Ordering::Relaxed)
    }

    /// Number of values fully appended.
    pub fn lines_written(&self) -> u64 {
        self.lines_written.load(Ordering::Relaxed)
    }

    /// Releases the destination once every batching task has joined.
    pub fn into_inner(self) -> D {
        self.destination
            .into_inner()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[cfg(all(test, not(feature = "loom")))]
mod tests {
    use super::*;
    use crate::destination::WriterDestination;

    #[test]
    fn batch_of_children_respects_filter() {
        let parent = CombinationNode::root(2).child(0);
        let all = LeafBatch::children_of(&parent, &Encoding::default());
        let rendered: Vec<_> = all.as_slice().iter().map(ToString::to_string).collect();
        assert_eq!(rendered, ["00", "01", "02", "03", "04", "05", "06", "07", "08", "09"]);

        let filtered = Encoding::Digits {
            skip_leading_zero: true,
        };
        assert!(LeafBatch::children_of(&parent, &filtered).as_slice().is_empty());
        let parent = CombinationNode::root(2).child(4);
        assert_eq!(LeafBatch::children_of(&parent, &filtered).as_slice().len(), 10);
    }

    #[test]
    fn one_lock_per_non_empty_batch() {
        let writer = BatchWriter::new(WriterDestination::new(Vec::new()));
        let root = CombinationNode::root(1);
        writer
            .write_batch(LeafBatch::children_of(&root, &Encoding::default()).as_slice())
            .unwrap();
        writer.write_batch(&[]).unwrap();
        assert_eq!(writer.lock_acquisitions(), 1);
        assert_eq!(writer.lines_written(), 10);
        let bytes = writer.into_inner().finalize().unwrap();
        assert_eq!(bytes, b"0\n1\n2\n3\n4\n5\n6\n7\n8\n9\n");
    }

    #[test]
    fn single_leaf_batch_at_depth_zero() {
        let root = CombinationNode::root(0);
        let batch = LeafBatch::single(&root, &Encoding::Numeric { seed: 5 });
        assert_eq!(batch.as_slice(), &[Combination::Numeric(5)]);
    }
}
