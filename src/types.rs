use crate::error::ParseDigitsError;
use core::{fmt, str::FromStr};
use derive_more::Display;

/// Deepest supported recursion. `10^MAX_DEPTH` lines still fit in a `u64`.
pub const MAX_DEPTH: u8 = 19;
/// Number of children of every internal node, one per decimal digit.
pub const FAN_OUT: u8 = 10;

const CAPACITY: usize = MAX_DEPTH as usize;

/// Fixed-capacity inline buffer of ASCII decimal digits.
///
/// Nodes and queue items carry their prefix by value, so decomposition never
/// allocates. Unused trailing bytes are always `b'0'`, which keeps the derived
/// `Eq` and `Hash` consistent with the visible digits.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct DigitString {
    len: u8,
    bytes: [u8; CAPACITY],
}

impl DigitString {
    /// The zero-length digit string (the root prefix).
    pub const EMPTY: Self = Self {
        len: 0,
        bytes: [b'0'; CAPACITY],
    };

    /// Number of digits.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len as usize
    }

    /// Whether no digit has been chosen yet.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The digits as a string slice.
    ///
    /// # Panics
    /// Never in practice: every stored byte is ASCII.
    #[must_use]
    pub fn as_str(&self) -> &str {
        core::str::from_utf8(&self.bytes[..self.len()]).expect("DigitString::as_str")
    }

    /// Numeric values (`0..=9`) of the digits, most significant first.
    pub fn digits(&self) -> impl ExactSizeIterator<Item = u8> + '_ {
        self.bytes[..self.len()].iter().map(|b| b - b'0')
    }

    /// Value of the first digit, if any.
    #[must_use]
    pub fn first(&self) -> Option<u8> {
        self.digits().next()
    }

    /// Value of the last digit, if any.
    #[must_use]
    pub fn last(&self) -> Option<u8> {
        self.digits().last()
    }

    /// Base-10 positional value of the digits. Leading zeros vanish.
    #[must_use]
    pub fn positional_value(&self) -> u128 {
        self.digits()
            .fold(0u128, |acc, d| acc * u128::from(FAN_OUT) + u128::from(d))
    }

    /// Returns a copy extended by `digit`.
    ///
    /// # Panics
    /// If `digit > 9` or the buffer already holds [`MAX_DEPTH`] digits. Depth is
    /// validated before any node is created, so neither can happen during a run.
    #[must_use]
    pub fn pushed(mut self, digit: u8) -> Self {
        assert!(digit < FAN_OUT, "DigitString::pushed: [1]");
        let idx = self.len();
        assert!(idx < CAPACITY, "DigitString::pushed: [2]");
        self.bytes[idx] = b'0' + digit;
        self.len += 1;
        self
    }

    /// Returns a copy without its last digit, together with that digit.
    #[must_use]
    pub fn popped(mut self) -> Option<(Self, u8)> {
        let last = self.last()?;
        self.len -= 1;
        self.bytes[self.len()] = b'0';
        Some((self, last))
    }
}

impl Default for DigitString {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl fmt::Debug for DigitString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("DigitString").field(&self.as_str()).finish()
    }
}

impl fmt::Display for DigitString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DigitString {
    type Err = ParseDigitsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() > CAPACITY {
            return Err(ParseDigitsError::TooLong { len: s.len() });
        }
        s.bytes().try_fold(Self::EMPTY, |acc, byte| {
            if byte.is_ascii_digit() {
                Ok(acc.pushed(byte - b'0'))
            } else {
                Err(ParseDigitsError::NotADigit { byte })
            }
        })
    }
}

/// One point of the recursion: the digits chosen so far and the target depth.
///
/// `prefix` already includes `digit`, the digit chosen at this node (`None` at
/// the root), so `level() == prefix().len()`. Nodes are plain values created by
/// decomposition and dropped once their children are dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CombinationNode {
    prefix: DigitString,
    digit: Option<u8>,
    target_depth: u8,
}

impl CombinationNode {
    /// Root of a tree whose leaves are all `target_depth`-digit strings.
    ///
    /// # Panics
    /// If `target_depth > MAX_DEPTH`.
    #[must_use]
    pub const fn root(target_depth: u8) -> Self {
        assert!(target_depth <= MAX_DEPTH, "CombinationNode::root");
        Self {
            prefix: DigitString::EMPTY,
            digit: None,
            target_depth,
        }
    }

    /// Reconstructs the leaf node that emits `digits`, provided it has exactly
    /// `target_depth` digits.
    #[must_use]
    pub fn from_combination(digits: DigitString, target_depth: u8) -> Option<Self> {
        if target_depth > MAX_DEPTH || digits.len() != target_depth as usize {
            return None;
        }
        Some(Self {
            prefix: digits,
            digit: digits.last(),
            target_depth,
        })
    }

    /// Accumulated digits, including this node's own digit.
    #[must_use]
    pub const fn prefix(&self) -> &DigitString {
        &self.prefix
    }

    /// Digit chosen at this node; `None` for the root.
    #[must_use]
    pub const fn digit(&self) -> Option<u8> {
        self.digit
    }

    /// Depth at which nodes become leaves.
    #[must_use]
    pub const fn target_depth(&self) -> u8 {
        self.target_depth
    }

    /// Distance from the root.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn level(&self) -> u8 {
        self.prefix.len() as u8
    }

    /// Whether this node is a completed combination.
    #[must_use]
    pub const fn is_leaf(&self) -> bool {
        self.level() == self.target_depth
    }

    /// Whether the children of this node are leaves.
    #[must_use]
    pub const fn is_last_internal(&self) -> bool {
        self.level() + 1 == self.target_depth
    }

    /// Child obtained by appending `digit`.
    ///
    /// # Panics
    /// If this node is a leaf or `digit > 9`.
    #[must_use]
    pub fn child(&self, digit: u8) -> Self {
        assert!(!self.is_leaf(), "CombinationNode::child");
        Self {
            prefix: self.prefix.pushed(digit),
            digit: Some(digit),
            target_depth: self.target_depth,
        }
    }

    /// All children in digit order; empty for a leaf.
    pub fn children(&self) -> impl Iterator<Item = Self> + '_ {
        let upper = if self.is_leaf() { 0 } else { FAN_OUT };
        (0..upper).map(|digit| self.child(digit))
    }

    /// Node this one was derived from; `None` for the root.
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        let (prefix, _) = self.prefix.popped()?;
        Some(Self {
            prefix,
            digit: prefix.last(),
            target_depth: self.target_depth,
        })
    }
}

/// A completed combination in the encoding selected for the run.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Combination {
    /// Fixed-length digit string, leading zeros preserved.
    #[display("{_0}")]
    Digits(DigitString),
    /// Positional value of the digits, offset by the configured seed.
    /// Strings differing only in leading zeros collide.
    #[display("{_0}")]
    Numeric(u128),
}

/// Total number of leaves under a root of `depth`, i.e. `10^depth`.
#[must_use]
pub fn leaf_count(depth: u8) -> u64 {
    u64::from(FAN_OUT).pow(u32::from(depth))
}

/// Total number of nodes including the root, i.e. `(10^(depth+1) - 1) / 9`.
#[must_use]
pub fn node_count(depth: u8) -> u128 {
    (0..=u32::from(depth))
        .map(|level| u128::from(FAN_OUT).pow(level))
        .sum()
}
