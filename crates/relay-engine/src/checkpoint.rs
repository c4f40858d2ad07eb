//! Checkpoint arithmetic.
//!
//! History is published in checkpoints of `frequency` ledgers. A checkpoint
//! is identified by its final ledger, which satisfies
//! `(seq + 1) % frequency == 0`. With the default frequency of 64:
//!
//! - checkpoint 63 holds ledgers 1-63 (there is no ledger 0)
//! - checkpoint 127 holds ledgers 64-127
//! - checkpoint 191 holds ledgers 128-191
//!
//! Preparing a range starts replay at the first ledger of the checkpoint
//! containing `range.from`, so a range starting just after a checkpoint
//! boundary is cheapest to prepare.

use crate::error::{EngineError, EngineResult};

pub const DEFAULT_CHECKPOINT_FREQUENCY: u32 = 64;

/// Checkpoint layout for a given frequency.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CheckpointSchedule {
    frequency: u32,
}

impl Default for CheckpointSchedule {
    fn default() -> Self {
        Self {
            frequency: DEFAULT_CHECKPOINT_FREQUENCY,
        }
    }
}

impl CheckpointSchedule {
    pub fn new(frequency: u32) -> EngineResult<Self> {
        if frequency == 0 {
            return Err(EngineError::InvalidConfig(
                "checkpoint frequency must be greater than zero".into(),
            ));
        }
        Ok(Self { frequency })
    }

    pub fn frequency(&self) -> u32 {
        self.frequency
    }

    /// The checkpoint ledger (last ledger of the checkpoint) containing `seq`.
    pub fn checkpoint_containing(&self, seq: u32) -> u32 {
        (seq / self.frequency)
            .saturating_add(1)
            .saturating_mul(self.frequency)
            - 1
    }

    /// First ledger of the checkpoint containing `seq`. Never below 1.
    pub fn checkpoint_start(&self, seq: u32) -> u32 {
        ((seq / self.frequency) * self.frequency).max(1)
    }

    pub fn is_checkpoint_ledger(&self, seq: u32) -> bool {
        (u64::from(seq) + 1) % u64::from(self.frequency) == 0
    }
}
