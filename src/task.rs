use crate::{
    error::{RunError, join_results},
    sync::{AbortFlag, AtomicU64, Ordering},
    types::{CombinationNode, FAN_OUT},
    utils::SplitAtHalf,
};
use core::ops::Range;

/// Where completed combinations go. Implemented once per sink strategy.
pub(crate) trait Emit: Sync {
    /// Handles a leaf, i.e. one completed combination.
    fn leaf(&self, leaf: &CombinationNode) -> Result<(), RunError>;

    /// Offered every node one level above the leaves. Returning `Some` means
    /// the strategy handled all ten leaves itself and none are forked.
    fn batch(&self, _parent: &CombinationNode) -> Option<Result<(), RunError>> {
        None
    }
}

/// Counters and abort flag shared by every task of one run.
pub(crate) struct RunStats {
    nodes_visited: AtomicU64,
    values_emitted: AtomicU64,
    abort: AbortFlag,
}

impl RunStats {
    pub(crate) fn new() -> Self {
        Self {
            nodes_visited: AtomicU64::new(0),
            values_emitted: AtomicU64::new(0),
            abort: AbortFlag::new(),
        }
    }

    pub(crate) fn record_nodes(&self, count: u64) {
        self.nodes_visited.fetch_add(count, Ordering::Relaxed);
    }

    pub(crate) fn record_values(&self, count: u64) {
        self.values_emitted.fetch_add(count, Ordering::Relaxed);
    }

    pub(crate) fn nodes_visited(&self) -> u64 {
        self.nodes_visited.load(Ordering::Relaxed)
    }

    pub(crate) fn values_emitted(&self) -> u64 {
        self.values_emitted.load(Ordering::Relaxed)
    }

    pub(crate) fn is_aborted(&self) -> bool {
        self.abort.is_raised()
    }
}

/// Expands `node` into its subtree and hands every leaf to `emit`.
///
/// Internal nodes fork their ten children as a balanced tree of
/// `rayon::join`s over the digit range, so every join is a cooperative wait:
/// a worker blocked on a join keeps executing stolen work. A node completes
/// only after its whole subtree has completed.
///
/// The exception is a node one level above the leaves when
/// [`Emit::batch`] returns `Some`: its ten leaves are then handled in place
/// by the strategy and never forked.
///
/// The first error raises the run's abort flag. Subtrees that have not
/// started yet return [`RunError::Aborted`] immediately, and the failure is
/// carried through every join up to the caller.
pub(crate) fn decompose<E: Emit>(
    node: CombinationNode,
    emit: &E,
    stats: &RunStats,
) -> Result<(), RunError> {
    if stats.is_aborted() {
        return Err(RunError::Aborted);
    }
    stats.record_nodes(1);
    let result = if node.is_leaf() {
        emit.leaf(&node)
    } else if let Some(batched) = node.is_last_internal().then(|| emit.batch(&node)).flatten() {
        batched
    } else {
        fork_children(node, 0..FAN_OUT, emit, stats)
    };
    if let Err(err) = &result {
        if !matches!(err, RunError::Aborted) && !stats.is_aborted() {
            tracing::error!(prefix = %node.prefix(), error = %err, "subtree failed, aborting run");
        }
        stats.abort.raise();
    }
    result
}

fn fork_children<E: Emit>(
    node: CombinationNode,
    digits: Range<u8>,
    emit: &E,
    stats: &RunStats,
) -> Result<(), RunError> {
    match digits.len() {
        0 => Ok(()),
        1 => decompose(node.child(digits.start), emit, stats),
        _ => {
            let (lhs, rhs) = digits.split_at_half();
            let (lhs, rhs) = rayon::join(
                || fork_children(node, lhs, emit, stats),
                || fork_children(node, rhs, emit, stats),
            );
            join_results(lhs, rhs)
        }
    }
}

#[cfg(all(test, not(feature = "loom")))]
mod tests {
    use super::*;
    use crate::types::{DigitString, leaf_count, node_count};
    use rustc_hash::FxHashSet;
    use std::{io, sync::Mutex};

    #[derive(Default)]
    struct Collect {
        leaves: Mutex<Vec<DigitString>>,
        fail_on: Option<DigitString>,
    }

    impl Emit for Collect {
        fn leaf(&self, leaf: &CombinationNode) -> Result<(), RunError> {
            if Some(*leaf.prefix()) == self.fail_on {
                return Err(RunError::DestinationWrite(io::Error::other("injected")));
            }
            self.leaves.lock().unwrap().push(*leaf.prefix());
            Ok(())
        }
    }

    #[test]
    fn every_leaf_exactly_once() {
        for depth in 0..=4u8 {
            let emit = Collect::default();
            let stats = RunStats::new();
            decompose(CombinationNode::root(depth), &emit, &stats).unwrap();

            let leaves = emit.leaves.into_inner().unwrap();
            assert_eq!(leaves.len() as u64, leaf_count(depth));
            let unique: FxHashSet<_> = leaves.iter().copied().collect();
            assert_eq!(unique.len(), leaves.len());
            assert!(leaves.iter().all(|l| l.len() == usize::from(depth)));
            assert_eq!(u128::from(stats.nodes_visited()), node_count(depth));
        }
    }

    #[test]
    fn failing_leaf_fails_the_whole_tree() {
        let emit = Collect {
            fail_on: Some("372".parse().unwrap()),
            ..Collect::default()
        };
        let stats = RunStats::new();
        // One worker visits leaves in digit order, so everything after the
        // failing leaf is skipped.
        let pool = rayon::ThreadPoolBuilder::new().num_threads(1).build().unwrap();
        let result = pool.install(|| decompose(CombinationNode::root(3), &emit, &stats));
        assert!(matches!(result, Err(RunError::DestinationWrite(_))));
        assert!(stats.is_aborted());
        assert_eq!(emit.leaves.into_inner().unwrap().len(), 372);
    }

    #[test]
    fn batch_hook_replaces_leaf_forks() {
        struct Batched(AtomicU64);

        impl Emit for Batched {
            fn leaf(&self, _leaf: &CombinationNode) -> Result<(), RunError> {
                unreachable!("leaves are handled by their parent")
            }

            fn batch(&self, parent: &CombinationNode) -> Option<Result<(), RunError>> {
                assert!(parent.is_last_internal());
                self.0.fetch_add(1, Ordering::Relaxed);
                Some(Ok(()))
            }
        }

        let emit = Batched(AtomicU64::new(0));
        let stats = RunStats::new();
        decompose(CombinationNode::root(3), &emit, &stats).unwrap();
        assert_eq!(emit.0.into_inner(), 100);
        assert_eq!(u128::from(stats.nodes_visited()), node_count(2));
    }
}
