use tracing::{debug, warn};

use relay_types::{Ledger, LedgerRange};

use crate::error::{EngineError, EngineResult};
use crate::oracle::OraclePolicy;
use crate::traits::{LedgerHashOracle, ReplayEngine};

/// Replay engine wrapper that cross-checks every produced ledger against a
/// hash oracle.
///
/// A ledger whose hash disagrees with the oracle's record fails with
/// [`EngineError::HashMismatch`]. When the oracle has no record the ledger is
/// served as is. Oracle outages are handled according to the
/// [`OraclePolicy`].
pub struct VerifyingEngine<E> {
    inner: E,
    oracle: Box<dyn LedgerHashOracle>,
    policy: OraclePolicy,
}

impl<E: ReplayEngine> VerifyingEngine<E> {
    pub fn new(inner: E, oracle: Box<dyn LedgerHashOracle>, policy: OraclePolicy) -> Self {
        Self {
            inner,
            oracle,
            policy,
        }
    }

    pub fn policy(&self) -> OraclePolicy {
        self.policy
    }

    fn verify(&self, ledger: &Ledger) -> EngineResult<()> {
        match self.oracle.get_ledger_hash(ledger.sequence) {
            Ok(Some(trusted)) if trusted != ledger.hash => Err(EngineError::HashMismatch {
                seq: ledger.sequence,
                expected: trusted,
                actual: ledger.hash,
            }),
            Ok(Some(_)) => {
                debug!(seq = ledger.sequence, "ledger hash verified");
                Ok(())
            }
            Ok(None) => Ok(()),
            Err(err) => match self.policy {
                OraclePolicy::BestEffort => {
                    warn!(
                        seq = ledger.sequence,
                        error = %err,
                        "hash oracle unavailable, serving ledger unverified"
                    );
                    Ok(())
                }
                OraclePolicy::Required => Err(EngineError::OracleUnavailable(err)),
            },
        }
    }
}

impl<E: ReplayEngine> ReplayEngine for VerifyingEngine<E> {
    fn prepare_range(&mut self, range: LedgerRange) -> EngineResult<()> {
        self.inner.prepare_range(range)
    }

    fn get_ledger(&mut self, seq: u32) -> EngineResult<Ledger> {
        let ledger = self.inner.get_ledger(seq)?;
        self.verify(&ledger)?;
        Ok(ledger)
    }

    fn is_prepared(&self, range: &LedgerRange) -> bool {
        self.inner.is_prepared(range)
    }

    fn latest_ledger_sequence(&mut self) -> EngineResult<u32> {
        self.inner.latest_ledger_sequence()
    }

    fn close(&mut self) -> EngineResult<()> {
        let engine = self.inner.close();
        let oracle = self.oracle.close().map_err(EngineError::from);
        engine.and(oracle)
    }
}
