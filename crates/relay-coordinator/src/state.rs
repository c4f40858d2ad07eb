use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use relay_types::LedgerRange;

use crate::lifecycle::Phase;

/// Snapshot of the coordinator's view of the replay engine.
///
/// `next_expected_seq` is `0` until the first range is prepared.
/// `prepared_range` is `None` before the first successful preparation and
/// after the coordinator has closed or failed.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoordinatorState {
    pub prepared_range: Option<LedgerRange>,
    pub next_expected_seq: u32,
    /// Set once the engine has been released or has failed.
    pub closed: bool,
    pub phase: Phase,
    /// Message of the engine failure that made the coordinator unusable.
    pub failure: Option<String>,
    pub prepared_at: Option<DateTime<Utc>>,
    pub prepare_duration_ms: Option<u64>,
    /// Ledgers served since the current range was prepared.
    pub ledgers_served: u64,
}

impl CoordinatorState {
    pub fn is_failed(&self) -> bool {
        self.failure.is_some()
    }

    /// Returns `true` when the prepared range has no ledgers left to serve.
    pub fn is_exhausted(&self) -> bool {
        self.prepared_range
            .is_some_and(|r| !r.contains_seq(self.next_expected_seq))
    }
}
