use crate::{
    config::EnqueuePolicy,
    error::RunError,
    sync::channel::{self, SendTimeoutError, TrySendError},
    types::Combination,
};
use core::num::NonZeroUsize;
use derive_more::Debug;

/// Item carried by the handoff queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueItem {
    /// A completed combination.
    Value(Combination),
    /// No further values follow. Enqueued once, after the whole production
    /// subtree has joined.
    EndOfStream,
}

/// Creates a fixed-capacity FIFO handoff queue.
///
/// The producing side is not `Clone`: a run has exactly one [`Producer`],
/// owned by the sentinel and borrowed by every leaf task. When it is dropped,
/// the queue is closed for the consumer.
#[must_use]
pub fn bounded(capacity: NonZeroUsize, policy: EnqueuePolicy) -> (Producer, Consumer) {
    let (tx, rx) = channel::bounded(capacity.get());
    (Producer { tx, policy }, Consumer { rx })
}

/// Sending half of the handoff queue.
#[derive(Debug)]
pub struct Producer {
    #[debug(skip)]
    tx: channel::Sender<QueueItem>,
    policy: EnqueuePolicy,
}

impl Producer {
    /// Appends `item`, waiting for a free slot according to the policy.
    ///
    /// # Errors
    /// - [`RunError::SinkClosed`] if the consumer is gone.
    /// - [`RunError::Stalled`] if [`EnqueuePolicy::BlockWithTimeout`] expired.
    pub fn enqueue(&self, item: QueueItem) -> Result<(), RunError> {
        let Self { tx, policy } = self;
        match *policy {
            EnqueuePolicy::Block => tx.send(item).map_err(|_| RunError::SinkClosed),
            EnqueuePolicy::BlockWithTimeout(waited) => {
                tx.send_timeout(item, waited).map_err(|err| match err {
                    SendTimeoutError::Timeout(_) => RunError::Stalled { waited },
                    SendTimeoutError::Disconnected(_) => RunError::SinkClosed,
                })
            }
            EnqueuePolicy::SpinBackoff => spin_send(tx, item),
        }
    }
}

/// Non-blocking send retried until a slot frees up. The worker thread stays
/// runnable the whole time, it only backs off between attempts.
fn spin_send(tx: &channel::Sender<QueueItem>, mut item: QueueItem) -> Result<(), RunError> {
    #[cfg(not(feature = "loom"))]
    let backoff = crossbeam_utils::Backoff::new();
    loop {
        match tx.try_send(item) {
            Ok(()) => return Ok(()),
            Err(TrySendError::Disconnected(_)) => return Err(RunError::SinkClosed),
            Err(TrySendError::Full(rejected)) => item = rejected,
        }
        #[cfg(not(feature = "loom"))]
        {
            if backoff.is_completed() {
                crate::sync::yield_now();
            } else {
                backoff.snooze();
            }
        }
        #[cfg(feature = "loom")]
        crate::sync::yield_now();
    }
}

/// Receiving half of the handoff queue.
#[derive(Debug)]
pub struct Consumer {
    #[debug(skip)]
    rx: channel::Receiver<QueueItem>,
}

impl Consumer {
    /// Removes the oldest item, blocking while the queue is empty.
    ///
    /// # Errors
    /// [`RunError::ProducersVanished`] if the producer was dropped and the
    /// queue is drained without an [`QueueItem::EndOfStream`].
    pub fn dequeue(&self) -> Result<QueueItem, RunError> {
        self.rx.recv().map_err(|_| RunError::ProducersVanished)
    }
}
