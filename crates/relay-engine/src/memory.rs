use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use relay_types::{Ledger, LedgerHash, LedgerRange};

use crate::error::{EngineError, EngineResult};
use crate::traits::ReplayEngine;

/// Build a hash-linked chain of `count` synthetic ledgers starting at `first`.
///
/// The ledger before `first` is treated as having a zero hash. Close times
/// advance five seconds per ledger. The chain stops at `u32::MAX`.
pub fn synthetic_chain(first: u32, count: u32) -> Vec<Ledger> {
    let mut prev = LedgerHash::zero();
    (0..count)
        .map_while(|offset| first.checked_add(offset))
        .map(|seq| {
            let payload = format!("ledger-{seq}").into_bytes();
            let ledger = Ledger::sealed(seq, prev, 1_700_000_000 + u64::from(seq) * 5, payload);
            prev = ledger.hash;
            ledger
        })
        .collect()
}

/// Shared counters observing an [`InMemoryEngine`] after it has been moved
/// into its owner.
#[derive(Clone, Debug, Default)]
pub struct EngineCounters {
    prepare_calls: Arc<AtomicUsize>,
    get_calls: Arc<AtomicUsize>,
    close_calls: Arc<AtomicUsize>,
    last_prepared: Arc<Mutex<Option<LedgerRange>>>,
}

impl EngineCounters {
    pub fn prepare_calls(&self) -> usize {
        self.prepare_calls.load(Ordering::SeqCst)
    }

    pub fn get_calls(&self) -> usize {
        self.get_calls.load(Ordering::SeqCst)
    }

    pub fn close_calls(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }

    pub fn last_prepared(&self) -> Option<LedgerRange> {
        *self.last_prepared.lock()
    }
}

/// In-memory replay engine for tests, local demos, and embedding.
///
/// Serves a fixed set of ledgers. Sequences past the last stored ledger are
/// reported as not yet closed when an unbounded range is prepared. Failures
/// and slow preparation can be injected to exercise callers.
pub struct InMemoryEngine {
    ledgers: BTreeMap<u32, Ledger>,
    prepared: Option<LedgerRange>,
    last_served: Option<u32>,
    fail_at: Option<(u32, EngineError)>,
    prepare_error: Option<EngineError>,
    prepare_delay: Duration,
    get_delay: Duration,
    closed: bool,
    counters: EngineCounters,
}

impl InMemoryEngine {
    pub fn new(ledgers: impl IntoIterator<Item = Ledger>) -> Self {
        Self {
            ledgers: ledgers.into_iter().map(|l| (l.sequence, l)).collect(),
            prepared: None,
            last_served: None,
            fail_at: None,
            prepare_error: None,
            prepare_delay: Duration::ZERO,
            get_delay: Duration::ZERO,
            closed: false,
            counters: EngineCounters::default(),
        }
    }

    /// Engine serving a synthetic chain of `count` ledgers from `first`.
    pub fn with_chain(first: u32, count: u32) -> Self {
        Self::new(synthetic_chain(first, count))
    }

    /// Fail with `error` when ledger `seq` is requested.
    pub fn fail_at(mut self, seq: u32, error: EngineError) -> Self {
        self.fail_at = Some((seq, error));
        self
    }

    /// Fail every `prepare_range` call with `error`.
    pub fn fail_prepare(mut self, error: EngineError) -> Self {
        self.prepare_error = Some(error);
        self
    }

    /// Sleep for `delay` inside every `prepare_range` call.
    pub fn with_prepare_delay(mut self, delay: Duration) -> Self {
        self.prepare_delay = delay;
        self
    }

    /// Sleep for `delay` inside every `get_ledger` call.
    pub fn with_get_delay(mut self, delay: Duration) -> Self {
        self.get_delay = delay;
        self
    }

    pub fn counters(&self) -> EngineCounters {
        self.counters.clone()
    }

    /// Append a ledger, as if it had just closed on the network.
    pub fn push(&mut self, ledger: Ledger) {
        self.ledgers.insert(ledger.sequence, ledger);
    }

    fn first_available(&self) -> Option<u32> {
        self.ledgers.keys().next().copied()
    }

    fn last_available(&self) -> Option<u32> {
        self.ledgers.keys().next_back().copied()
    }
}

impl ReplayEngine for InMemoryEngine {
    fn prepare_range(&mut self, range: LedgerRange) -> EngineResult<()> {
        self.counters.prepare_calls.fetch_add(1, Ordering::SeqCst);
        if self.closed {
            return Err(EngineError::Closed);
        }
        if !self.prepare_delay.is_zero() {
            std::thread::sleep(self.prepare_delay);
        }
        if let Some(err) = &self.prepare_error {
            return Err(err.clone());
        }

        let first = self.first_available().unwrap_or(1);
        if range.from() < first {
            return Err(EngineError::RangeUnavailable {
                range,
                reason: format!("history starts at ledger {first}"),
            });
        }
        if range.is_bounded() {
            let missing = (range.from()..range.to()).find(|s| !self.ledgers.contains_key(s));
            if let Some(missing) = missing {
                return Err(EngineError::RangeUnavailable {
                    range,
                    reason: format!("ledger {missing} is missing"),
                });
            }
        }

        self.prepared = Some(range);
        self.last_served = None;
        *self.counters.last_prepared.lock() = Some(range);
        Ok(())
    }

    fn get_ledger(&mut self, seq: u32) -> EngineResult<Ledger> {
        self.counters.get_calls.fetch_add(1, Ordering::SeqCst);
        if self.closed {
            return Err(EngineError::Closed);
        }
        if !self.get_delay.is_zero() {
            std::thread::sleep(self.get_delay);
        }
        let prepared = self
            .prepared
            .filter(|r| r.contains_seq(seq))
            .ok_or(EngineError::SequenceOutsideRange { seq })?;
        if let Some(last) = self.last_served.filter(|last| seq <= *last) {
            return Err(EngineError::OutOfOrder { requested: seq, last });
        }
        if let Some((fail_seq, err)) = &self.fail_at {
            if *fail_seq == seq {
                return Err(err.clone());
            }
        }

        match self.ledgers.get(&seq) {
            Some(ledger) => {
                self.last_served = Some(seq);
                Ok(ledger.clone())
            }
            None if !prepared.is_bounded() => Err(EngineError::NotYetAvailable { seq }),
            None => Err(EngineError::Malformed {
                seq,
                reason: "ledger vanished after preparation".into(),
            }),
        }
    }

    fn is_prepared(&self, range: &LedgerRange) -> bool {
        !self.closed && self.prepared.is_some_and(|p| p.covers(range))
    }

    fn latest_ledger_sequence(&mut self) -> EngineResult<u32> {
        if self.closed {
            return Err(EngineError::Closed);
        }
        let prepared = self.prepared.ok_or_else(|| {
            EngineError::Crashed("latest sequence requested before preparation".into())
        })?;
        let last = self.last_available().unwrap_or(0);
        Ok(if prepared.is_bounded() {
            last.min(prepared.to().saturating_sub(1))
        } else {
            last
        })
    }

    fn close(&mut self) -> EngineResult<()> {
        self.counters.close_calls.fetch_add(1, Ordering::SeqCst);
        self.closed = true;
        self.prepared = None;
        Ok(())
    }
}
