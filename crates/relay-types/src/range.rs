use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// A contiguous span of ledger sequences that a replay engine can be asked
/// to prepare.
///
/// `to == 0` marks an unbounded range that follows the live stream.
/// Bounded ranges are half-open: `[from, to)`. A bounded range with
/// `to == from` is valid and contains no ledgers.
///
/// Construction goes through [`LedgerRange::new`] (and deserialization
/// through the same check), so every value satisfies `from >= 1` and
/// `to == 0 || to >= from`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawRange")]
pub struct LedgerRange {
    from: u32,
    to: u32,
}

#[derive(Deserialize)]
struct RawRange {
    from: u32,
    #[serde(default)]
    to: u32,
}

impl TryFrom<RawRange> for LedgerRange {
    type Error = TypeError;

    fn try_from(raw: RawRange) -> Result<Self, Self::Error> {
        Self::new(raw.from, raw.to)
    }
}

impl LedgerRange {
    /// Create a range, rejecting `from == 0` and `to < from` for bounded ranges.
    pub fn new(from: u32, to: u32) -> Result<Self, TypeError> {
        if from == 0 || (to != 0 && to < from) {
            return Err(TypeError::InvalidRange { from, to });
        }
        Ok(Self { from, to })
    }

    /// A bounded range `[from, to)`.
    pub fn bounded(from: u32, to: u32) -> Result<Self, TypeError> {
        if to == 0 {
            return Err(TypeError::InvalidRange { from, to });
        }
        Self::new(from, to)
    }

    /// An unbounded range starting at `from` and following the live stream.
    pub fn unbounded(from: u32) -> Result<Self, TypeError> {
        Self::new(from, 0)
    }

    pub fn from(&self) -> u32 {
        self.from
    }

    /// Exclusive upper bound, `0` when unbounded.
    pub fn to(&self) -> u32 {
        self.to
    }

    pub fn is_bounded(&self) -> bool {
        self.to != 0
    }

    /// Number of ledgers in a bounded range, `None` when unbounded.
    pub fn len(&self) -> Option<u32> {
        self.is_bounded().then(|| self.to - self.from)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == Some(0)
    }

    /// Returns `true` if `seq` falls inside this range.
    pub fn contains_seq(&self, seq: u32) -> bool {
        seq >= self.from && (!self.is_bounded() || seq < self.to)
    }

    /// Returns `true` if every sequence of `other` also falls inside `self`.
    ///
    /// An unbounded range is only covered by another unbounded range.
    pub fn covers(&self, other: &LedgerRange) -> bool {
        if other.from < self.from {
            return false;
        }
        match (self.is_bounded(), other.is_bounded()) {
            (false, _) => true,
            (true, false) => false,
            (true, true) => other.to <= self.to,
        }
    }
}

impl fmt::Display for LedgerRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_bounded() {
            write!(f, "[{}, {})", self.from, self.to)
        } else {
            write!(f, "[{}, live)", self.from)
        }
    }
}
