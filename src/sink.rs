use crate::{
    destination::Destination,
    error::RunError,
    queue::{Consumer, QueueItem},
};
use derive_more::Debug;

/// Lifecycle of the queue consumer.
///
/// ```text
/// Running --Value--> Running
/// Running --EndOfStream--> Draining --finalize--> Done
/// Running | Draining --error--> Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkState {
    /// Dequeuing and appending values.
    Running,
    /// End of stream observed; finalizing the destination.
    Draining,
    /// Destination finalized. Reached at most once per run.
    Done,
    /// Destination abandoned after a fatal error.
    Failed,
}

impl SinkState {
    fn advance(self, next: Self) -> Self {
        debug_assert!(
            matches!(
                (self, next),
                (Self::Running, Self::Draining | Self::Failed)
                    | (Self::Draining, Self::Done | Self::Failed)
            ),
            "SinkState::advance: {self:?} -> {next:?}"
        );
        tracing::debug!(from = ?self, to = ?next, "sink state");
        next
    }
}

/// What a successful drain hands back.
#[derive(Debug)]
#[must_use]
pub struct Drained<O> {
    /// Values appended to the destination.
    pub lines_written: u64,
    /// Terminal state; always [`SinkState::Done`].
    pub state: SinkState,
    /// The finalized destination.
    pub output: O,
}

/// Sole consumer of the handoff queue.
#[derive(Debug)]
pub struct SinkWriter<D> {
    consumer: Consumer,
    #[debug(skip)]
    destination: D,
    state: SinkState,
    lines_written: u64,
}

impl<D: Destination> SinkWriter<D> {
    /// Prepares a writer that drains `consumer` into `destination`.
    pub fn new(consumer: Consumer, destination: D) -> Self {
        Self {
            consumer,
            destination,
            state: SinkState::Running,
            lines_written: 0,
        }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> SinkState {
        self.state
    }

    /// Appends every value until [`QueueItem::EndOfStream`], then finalizes
    /// the destination.
    ///
    /// The consumer is dropped before finalizing or abandoning, which
    /// disconnects the queue: producers still blocked on a full queue wake up
    /// with [`RunError::SinkClosed`] instead of hanging.
    ///
    /// # Errors
    /// - [`RunError::DestinationWrite`] if an append fails.
    /// - [`RunError::ProducersVanished`] if the queue closed without an end of
    ///   stream.
    /// - [`RunError::Finalize`] if the destination cannot be published.
    pub fn drain(mut self) -> Result<Drained<D::Output>, RunError> {
        let pumped = self.pump();
        let Self {
            consumer,
            destination,
            state,
            lines_written,
        } = self;
        drop(consumer);
        if let Err(err) = pumped {
            state.advance(SinkState::Failed);
            tracing::error!(error = %err, lines_written, "sink failed, abandoning destination");
            destination.abandon();
            return Err(err);
        }
        let state = state.advance(SinkState::Draining);
        let output = match destination.finalize() {
            Ok(output) => output,
            Err(err) => {
                state.advance(SinkState::Failed);
                tracing::error!(error = %err, "failed to finalize destination");
                return Err(RunError::Finalize(err));
            }
        };
        let state = state.advance(SinkState::Done);
        tracing::debug!(lines_written, "sink finished");
        Ok(Drained {
            lines_written,
            state,
            output,
        })
    }

    fn pump(&mut self) -> Result<(), RunError> {
        loop {
            match self.consumer.dequeue()? {
                QueueItem::Value(value) => {
                    self.destination
                        .append(&value)
                        .map_err(RunError::DestinationWrite)?;
                    self.lines_written += 1;
                }
                QueueItem::EndOfStream => {
                    tracing::debug!(lines_written = self.lines_written, "end of stream");
                    return Ok(());
                }
            }
        }
    }
}
