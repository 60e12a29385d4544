use crate::{
    error::ConfigError,
    types::{Combination, CombinationNode, FAN_OUT, MAX_DEPTH, leaf_count},
};
use core::{num::NonZeroUsize, time::Duration};

/// Queue capacity used when none is configured.
pub const DEFAULT_QUEUE_CAPACITY: usize = 100_000;
/// Depth from which a run logs a size warning (about ten million lines).
pub const LARGE_DEPTH: u8 = 7;

/// How completed combinations reach the destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Strategy {
    /// Leaves enqueue into a bounded handoff queue drained by one sink writer.
    #[default]
    Queue,
    /// Nodes one level above the leaves write their ten children under one
    /// lock acquisition.
    InlineBatched,
}

/// Where the queue consumer runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SinkPlacement {
    /// A dedicated OS thread outside the work-stealing pool. Producers
    /// blocked on a full queue can never starve it.
    #[default]
    DedicatedThread,
    /// A task inside the work-stealing pool, joined as a sibling of the
    /// production subtree. Deadlocks when blocked producers occupy every
    /// worker before the sink is scheduled.
    Pool,
}

/// Producer behavior on a full queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnqueuePolicy {
    /// Block the worker thread until a slot frees up.
    #[default]
    Block,
    /// Block, but fail the run with [`RunError::Stalled`] after the timeout.
    ///
    /// [`RunError::Stalled`]: crate::error::RunError::Stalled
    BlockWithTimeout(Duration),
    /// Retry a non-blocking send, spinning then yielding between attempts.
    SpinBackoff,
}

/// Text encoding of completed combinations. One per run, never mixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    /// Fixed-length digit strings with leading zeros preserved.
    Digits {
        /// Drop combinations whose first digit is `0`.
        skip_leading_zero: bool,
    },
    /// `seed * 10^depth` plus the positional value of the digits. Strings
    /// that differ only in leading zeros collide, and are written as-is.
    Numeric {
        /// Value prepended to every combination.
        seed: u128,
    },
}

impl Default for Encoding {
    fn default() -> Self {
        Self::Digits {
            skip_leading_zero: false,
        }
    }
}

impl Encoding {
    /// Encodes a leaf, or returns `None` if the leaf is filtered out.
    ///
    /// # Panics
    /// If a [`Numeric`](Self::Numeric) value does not fit in a `u128`.
    /// [`RunConfig::validate`] rejects such seeds before a run starts.
    #[must_use]
    pub fn encode(&self, leaf: &CombinationNode) -> Option<Combination> {
        debug_assert!(leaf.is_leaf(), "Encoding::encode");
        match *self {
            Self::Digits { skip_leading_zero } => {
                let digits = *leaf.prefix();
                if skip_leading_zero && digits.first() == Some(0) {
                    None
                } else {
                    Some(Combination::Digits(digits))
                }
            }
            Self::Numeric { seed } => {
                let scale = u128::from(FAN_OUT).pow(u32::from(leaf.target_depth()));
                let value = seed
                    .checked_mul(scale)
                    .and_then(|base| base.checked_add(leaf.prefix().positional_value()))
                    .expect("Encoding::encode: [1]");
                Some(Combination::Numeric(value))
            }
        }
    }

    /// Number of values a run of `depth` emits under this encoding.
    #[must_use]
    pub fn expected_values(&self, depth: u8) -> u64 {
        match *self {
            Self::Digits {
                skip_leading_zero: true,
            } if depth > 0 => 9 * leaf_count(depth - 1),
            _ => leaf_count(depth),
        }
    }
}

/// Parameters of a single run.
///
/// ```
/// use combofork::config::{RunConfig, Strategy};
///
/// let config = RunConfig::new(3)
///     .with_strategy(Strategy::InlineBatched)
///     .with_num_threads(4);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    /// Number of digits per combination; the run emits up to `10^depth` lines.
    pub depth: u8,
    /// Sink strategy.
    pub strategy: Strategy,
    /// Output encoding.
    pub encoding: Encoding,
    /// Handoff queue capacity. Only used by [`Strategy::Queue`].
    pub queue_capacity: usize,
    /// Producer behavior on a full queue.
    pub enqueue_policy: EnqueuePolicy,
    /// Where the queue consumer runs.
    pub sink_placement: SinkPlacement,
    /// Worker pool size; `None` uses rayon's default.
    pub num_threads: Option<usize>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self::new(0)
    }
}

impl RunConfig {
    /// Configuration with defaults for everything but the depth.
    #[must_use]
    pub fn new(depth: u8) -> Self {
        Self {
            depth,
            strategy: Strategy::default(),
            encoding: Encoding::default(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            enqueue_policy: EnqueuePolicy::default(),
            sink_placement: SinkPlacement::default(),
            num_threads: None,
        }
    }

    /// Sets the sink strategy.
    #[must_use]
    pub fn with_strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Sets the output encoding.
    #[must_use]
    pub fn with_encoding(mut self, encoding: Encoding) -> Self {
        self.encoding = encoding;
        self
    }

    /// Sets the handoff queue capacity.
    #[must_use]
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Sets the producer behavior on a full queue.
    #[must_use]
    pub fn with_enqueue_policy(mut self, policy: EnqueuePolicy) -> Self {
        self.enqueue_policy = policy;
        self
    }

    /// Sets where the queue consumer runs.
    #[must_use]
    pub fn with_sink_placement(mut self, placement: SinkPlacement) -> Self {
        self.sink_placement = placement;
        self
    }

    /// Sets the worker pool size.
    #[must_use]
    pub fn with_num_threads(mut self, num_threads: usize) -> Self {
        self.num_threads = Some(num_threads);
        self
    }

    /// Checks every parameter.
    ///
    /// # Errors
    /// The first offending parameter, as a [`ConfigError`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        let Self {
            depth,
            strategy,
            encoding,
            queue_capacity,
            enqueue_policy: _,
            sink_placement: _,
            num_threads,
        } = self;
        if *depth > MAX_DEPTH {
            return Err(ConfigError::DepthTooLarge { depth: *depth });
        }
        if *strategy == Strategy::Queue && *queue_capacity == 0 {
            return Err(ConfigError::ZeroQueueCapacity);
        }
        if *num_threads == Some(0) {
            return Err(ConfigError::ZeroThreads);
        }
        if let Encoding::Numeric { seed } = *encoding {
            let scale = u128::from(FAN_OUT).pow(u32::from(*depth));
            seed.checked_mul(scale)
                .and_then(|base| base.checked_add(scale - 1))
                .ok_or(ConfigError::NumericOverflow {
                    seed,
                    depth: *depth,
                })?;
        }
        Ok(())
    }

    /// Validated queue capacity.
    pub(crate) fn capacity(&self) -> Result<NonZeroUsize, ConfigError> {
        NonZeroUsize::new(self.queue_capacity).ok_or(ConfigError::ZeroQueueCapacity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DigitString;

    #[allow(clippy::cast_possible_truncation)]
    fn leaf(digits: &str) -> CombinationNode {
        let digits: DigitString = digits.parse().unwrap();
        CombinationNode::from_combination(digits, digits.len() as u8).unwrap()
    }

    #[test]
    fn validation_rejects_before_dispatch() {
        assert!(matches!(
            RunConfig::new(MAX_DEPTH + 1).validate(),
            Err(ConfigError::DepthTooLarge { depth: 20 })
        ));
        assert!(matches!(
            RunConfig::new(2).with_queue_capacity(0).validate(),
            Err(ConfigError::ZeroQueueCapacity)
        ));
        // Capacity is irrelevant without a queue.
        assert!(
            RunConfig::new(2)
                .with_queue_capacity(0)
                .with_strategy(Strategy::InlineBatched)
                .validate()
                .is_ok()
        );
        assert!(matches!(
            RunConfig::new(2).with_num_threads(0).validate(),
            Err(ConfigError::ZeroThreads)
        ));
        assert!(matches!(
            RunConfig::new(MAX_DEPTH)
                .with_encoding(Encoding::Numeric { seed: u128::MAX })
                .validate(),
            Err(ConfigError::NumericOverflow { .. })
        ));
        assert!(RunConfig::new(MAX_DEPTH).validate().is_ok());
    }

    #[test]
    fn digit_filter_drops_leading_zero_only() {
        let filtered = Encoding::Digits {
            skip_leading_zero: true,
        };
        assert_eq!(filtered.encode(&leaf("07")), None);
        assert_eq!(
            filtered.encode(&leaf("70")).map(|c| c.to_string()),
            Some("70".to_owned())
        );
        assert_eq!(
            filtered.encode(&leaf("")).map(|c| c.to_string()),
            Some(String::new())
        );
    }

    #[test]
    fn numeric_encoding_collides_on_leading_zeros() {
        let numeric = Encoding::Numeric { seed: 0 };
        assert_eq!(numeric.encode(&leaf("01")), Some(Combination::Numeric(1)));
        assert_eq!(numeric.encode(&leaf("001")), Some(Combination::Numeric(1)));

        let seeded = Encoding::Numeric {
            seed: 1_000_000_000,
        };
        assert_eq!(
            seeded.encode(&leaf("42")).map(|c| c.to_string()),
            Some("100000000042".to_owned())
        );
    }

    #[test]
    #[should_panic(expected = "Encoding::encode: [1]")]
    fn unvalidated_numeric_overflow_panics() {
        let _ = Encoding::Numeric { seed: u128::MAX }.encode(&leaf("9"));
    }

    #[test]
    fn expected_value_counts() {
        let filtered = Encoding::Digits {
            skip_leading_zero: true,
        };
        assert_eq!(filtered.expected_values(0), 1);
        assert_eq!(filtered.expected_values(1), 9);
        assert_eq!(filtered.expected_values(3), 900);
        assert_eq!(Encoding::default().expected_values(3), 1000);
        assert_eq!(Encoding::Numeric { seed: 0 }.expected_values(2), 100);
    }
}
