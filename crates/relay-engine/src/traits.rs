use relay_types::{Ledger, LedgerHash, LedgerRange};

use crate::error::{EngineResult, OracleResult};

/// Sequential ledger replay capability.
///
/// Implementations must satisfy these invariants:
/// - At most one range is prepared at a time. A new `prepare_range` replaces
///   the previous one.
/// - `get_ledger` is called with strictly increasing sequences inside the
///   prepared range. Gaps are allowed, rewinds are not.
/// - After any error where [`EngineError::is_fatal`] is `true`, the engine is
///   not reused except to be closed.
/// - `close` releases every resource the engine holds (including a hash
///   oracle) and is idempotent.
///
/// Engines are not thread-safe; every mutating call takes `&mut self` and
/// callers serialize access.
///
/// [`EngineError::is_fatal`]: crate::error::EngineError::is_fatal
pub trait ReplayEngine: Send {
    /// Prepare the engine to serve `range`. May block for a long time.
    fn prepare_range(&mut self, range: LedgerRange) -> EngineResult<()>;

    /// Return the ledger with sequence `seq` from the prepared range.
    fn get_ledger(&mut self, seq: u32) -> EngineResult<Ledger>;

    /// Returns `true` if `range` is covered by the currently prepared range.
    fn is_prepared(&self, range: &LedgerRange) -> bool;

    /// Highest sequence the engine can serve right now.
    fn latest_ledger_sequence(&mut self) -> EngineResult<u32>;

    fn close(&mut self) -> EngineResult<()>;
}

impl<E: ReplayEngine + ?Sized> ReplayEngine for Box<E> {
    fn prepare_range(&mut self, range: LedgerRange) -> EngineResult<()> {
        (**self).prepare_range(range)
    }

    fn get_ledger(&mut self, seq: u32) -> EngineResult<Ledger> {
        (**self).get_ledger(seq)
    }

    fn is_prepared(&self, range: &LedgerRange) -> bool {
        (**self).is_prepared(range)
    }

    fn latest_ledger_sequence(&mut self) -> EngineResult<u32> {
        (**self).latest_ledger_sequence()
    }

    fn close(&mut self) -> EngineResult<()> {
        (**self).close()
    }
}

/// Source of previously verified ledger hashes.
///
/// `Ok(None)` means the oracle has no record for the sequence, which is not
/// an error: the ledger is simply not cross-checked.
pub trait LedgerHashOracle: Send {
    fn get_ledger_hash(&self, seq: u32) -> OracleResult<Option<LedgerHash>>;

    /// Release the backing store. Later lookups fail with `OracleError::Closed`.
    fn close(&mut self) -> OracleResult<()> {
        Ok(())
    }
}
