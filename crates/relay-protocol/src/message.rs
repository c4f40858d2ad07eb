use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use relay_types::{Ledger, LedgerRange};

/// Body of `POST /v1/prepare-range`. `to` omitted or `0` means unbounded.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrepareRangeRequest {
    pub from: u32,
    #[serde(default)]
    pub to: u32,
}

impl From<LedgerRange> for PrepareRangeRequest {
    fn from(range: LedgerRange) -> Self {
        Self {
            from: range.from(),
            to: range.to(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrepareRangeResponse {
    /// Range the relay is serving, possibly wider than the one requested.
    pub range: LedgerRange,
    pub ready: bool,
    pub newly_prepared: bool,
    pub next_sequence: u32,
}

/// Body of `POST /v1/ledger/next`.
///
/// `present` is `false` when the next ledger of an unbounded range has not
/// closed yet; the caller should ask again later.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NextLedgerResponse {
    pub present: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ledger: Option<Ledger>,
}

impl NextLedgerResponse {
    pub fn present(ledger: Ledger) -> Self {
        Self {
            present: true,
            ledger: Some(ledger),
        }
    }

    pub fn absent() -> Self {
        Self {
            present: false,
            ledger: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusResponse {
    pub prepared_range: Option<LedgerRange>,
    pub next_expected_seq: u32,
    pub closed: bool,
    pub phase: String,
    pub failure: Option<String>,
    pub prepared_at: Option<DateTime<Utc>>,
    pub prepare_duration_ms: Option<u64>,
    pub ledgers_served: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatestSequenceResponse {
    pub sequence: u32,
}
