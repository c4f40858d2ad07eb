use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use chrono::Utc;
use parking_lot::{FairMutex, RwLock};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use relay_engine::{EngineError, ReplayEngine};
use relay_types::{Ledger, LedgerRange};

use crate::error::{CoordinatorError, CoordinatorResult};
use crate::lifecycle::{Lifecycle, Phase};
use crate::state::CoordinatorState;

/// Result of a successful [`Coordinator::prepare`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrepareOutcome {
    /// The range the engine is serving, which may be a superset of the
    /// requested one.
    pub range: LedgerRange,
    /// `false` when the request was already covered and the engine was not
    /// asked to prepare again.
    pub newly_prepared: bool,
    pub next_sequence: u32,
}

/// Owner of the replay engine.
///
/// Every engine call goes through one fair lock, so callers are served in
/// arrival order and the engine only ever sees one operation at a time.
/// The coordinator state lives behind a separate read-write lock that is
/// written only while the engine lock is held and never held across an
/// engine call, so [`Coordinator::status`] does not wait on a slow
/// preparation.
pub struct Coordinator {
    engine: FairMutex<Option<Box<dyn ReplayEngine>>>,
    state: RwLock<CoordinatorState>,
    lifecycle: Lifecycle,
}

impl Coordinator {
    pub fn new(engine: impl ReplayEngine + 'static) -> Self {
        Self::from_boxed(Box::new(engine))
    }

    pub fn from_boxed(engine: Box<dyn ReplayEngine>) -> Self {
        Self {
            engine: FairMutex::new(Some(engine)),
            state: RwLock::new(CoordinatorState::default()),
            lifecycle: Lifecycle::new(),
        }
    }

    /// Prepare the engine to serve `range`.
    ///
    /// A range already covered by the prepared one, starting at or after the
    /// next expected ledger, succeeds without touching the engine; if it
    /// starts ahead of the cursor the cursor moves forward to it.
    pub fn prepare(&self, range: LedgerRange) -> CoordinatorResult<PrepareOutcome> {
        self.prepare_unless(range, &AtomicBool::new(false))
    }

    /// [`Coordinator::prepare`] that returns [`CoordinatorError::Abandoned`]
    /// without touching the engine if `abandoned` is set when this caller's
    /// turn comes.
    pub fn prepare_unless(
        &self,
        range: LedgerRange,
        abandoned: &AtomicBool,
    ) -> CoordinatorResult<PrepareOutcome> {
        self.ensure_accepting()?;
        let mut slot = self.engine.lock();
        self.ensure_accepting()?;
        ensure_wanted(abandoned)?;
        let engine = slot.as_mut().ok_or(CoordinatorError::ShuttingDown)?;

        let (prepared, cursor) = {
            let state = self.state.read();
            (state.prepared_range, state.next_expected_seq)
        };

        if cursor != 0 && range.from() < cursor {
            return Err(CoordinatorError::InvalidRange {
                reason: format!(
                    "range {range} starts before the next expected ledger {cursor}; the engine cannot rewind"
                ),
            });
        }

        if let Some(current) = prepared {
            if current.covers(&range) && engine.is_prepared(&range) {
                let next = cursor.max(range.from());
                if next != cursor {
                    self.state.write().next_expected_seq = next;
                }
                debug!(%range, prepared = %current, next, "range already prepared");
                return Ok(PrepareOutcome {
                    range: current,
                    newly_prepared: false,
                    next_sequence: next,
                });
            }
        }

        info!(%range, "preparing ledger range");
        let started = Instant::now();
        let started_at = Utc::now();
        match engine.prepare_range(range) {
            Ok(()) => {
                let elapsed_ms = started.elapsed().as_millis() as u64;
                {
                    let mut state = self.state.write();
                    state.prepared_range = Some(range);
                    state.next_expected_seq = range.from();
                    state.prepared_at = Some(started_at);
                    state.prepare_duration_ms = Some(elapsed_ms);
                    state.ledgers_served = 0;
                }
                info!(%range, elapsed_ms, "ledger range prepared");
                Ok(PrepareOutcome {
                    range,
                    newly_prepared: true,
                    next_sequence: range.from(),
                })
            }
            Err(err) if !err.is_fatal() => {
                // The previously prepared range, if any, is still served.
                warn!(%range, error = %err, "ledger range unavailable");
                Err(CoordinatorError::InvalidRange {
                    reason: format!("ledger range {range} is not available"),
                })
            }
            Err(err) => Err(self.record_failure(err)),
        }
    }

    /// Return the next ledger of the prepared range and advance the cursor.
    pub fn next_ledger(&self) -> CoordinatorResult<Ledger> {
        self.next_ledger_unless(&AtomicBool::new(false))
    }

    /// [`Coordinator::next_ledger`] that returns
    /// [`CoordinatorError::Abandoned`] without consuming a ledger if
    /// `abandoned` is set when this caller's turn comes.
    pub fn next_ledger_unless(&self, abandoned: &AtomicBool) -> CoordinatorResult<Ledger> {
        self.ensure_accepting()?;
        let mut slot = self.engine.lock();
        self.ensure_accepting()?;
        ensure_wanted(abandoned)?;
        let engine = slot.as_mut().ok_or(CoordinatorError::ShuttingDown)?;

        let (prepared, seq) = {
            let state = self.state.read();
            (state.prepared_range, state.next_expected_seq)
        };
        let prepared = prepared.ok_or(CoordinatorError::NotPrepared)?;
        // The cursor cannot move past `u32::MAX`, so that ledger is never served.
        let next = seq.checked_add(1).filter(|_| prepared.contains_seq(seq));
        let Some(next) = next else {
            return Err(CoordinatorError::OutOfRange {
                range: prepared,
                next: seq,
            });
        };

        match engine.get_ledger(seq) {
            Ok(ledger) if ledger.sequence == seq => {
                {
                    let mut state = self.state.write();
                    state.next_expected_seq = next;
                    state.ledgers_served += 1;
                }
                debug!(seq, hash = %ledger.hash.short_hex(), "served ledger");
                Ok(ledger)
            }
            Ok(ledger) => Err(self.record_failure(EngineError::Malformed {
                seq,
                reason: format!("engine returned ledger {}", ledger.sequence),
            })),
            Err(err) if err.is_fatal() => Err(self.record_failure(err)),
            Err(err) => {
                debug!(seq, error = %err, "ledger not available yet");
                Err(CoordinatorError::NotYetAvailable { seq })
            }
        }
    }

    /// Highest sequence the engine can currently serve.
    pub fn latest_sequence(&self) -> CoordinatorResult<u32> {
        self.ensure_accepting()?;
        let mut slot = self.engine.lock();
        self.ensure_accepting()?;
        let engine = slot.as_mut().ok_or(CoordinatorError::ShuttingDown)?;

        if self.state.read().prepared_range.is_none() {
            return Err(CoordinatorError::NotPrepared);
        }
        match engine.latest_ledger_sequence() {
            Ok(seq) => Ok(seq),
            Err(err) if err.is_fatal() => Err(self.record_failure(err)),
            Err(err) => {
                warn!(error = %err, "latest ledger sequence unavailable");
                Err(CoordinatorError::InvalidRange {
                    reason: "latest ledger sequence is not available".into(),
                })
            }
        }
    }

    /// Copy of the current state. Never waits on an engine call.
    pub fn status(&self) -> CoordinatorState {
        let mut snapshot = self.state.read().clone();
        snapshot.phase = self.lifecycle.phase();
        snapshot
    }

    pub fn phase(&self) -> Phase {
        self.lifecycle.phase()
    }

    /// Refuse new mutating requests. The in-flight one, if any, continues.
    pub fn begin_drain(&self) {
        if self.lifecycle.begin_drain() {
            info!("coordinator draining");
        }
    }

    /// Release the engine.
    ///
    /// Starts draining, waits for the in-flight engine operation to finish,
    /// then closes the engine exactly once. Calling `close` again returns
    /// `Ok(())` without side effects. An error from the engine's own close
    /// is reported once; the coordinator is closed regardless.
    pub fn close(&self) -> CoordinatorResult<()> {
        if self.lifecycle.phase() == Phase::Closed {
            return Ok(());
        }
        self.begin_drain();

        let mut slot = self.engine.lock();
        let Some(mut engine) = slot.take() else {
            return Ok(());
        };
        let result = engine.close();
        drop(engine);

        {
            let mut state = self.state.write();
            state.closed = true;
            state.prepared_range = None;
        }
        self.lifecycle.mark_closed();

        match result {
            Ok(()) => {
                info!("replay engine released");
                Ok(())
            }
            Err(err) => {
                error!(error = %err, "replay engine failed to close cleanly");
                Err(CoordinatorError::EngineFailure(err.to_string()))
            }
        }
    }

    fn ensure_accepting(&self) -> CoordinatorResult<()> {
        if !self.lifecycle.is_running() {
            return Err(CoordinatorError::ShuttingDown);
        }
        if let Some(failure) = &self.state.read().failure {
            return Err(CoordinatorError::EngineFailure(failure.clone()));
        }
        Ok(())
    }

    /// Record a fatal engine error. Every later mutating call fails with it.
    fn record_failure(&self, err: EngineError) -> CoordinatorError {
        let message = err.to_string();
        error!(error = %message, "replay engine failed; relay requires a restart");
        let mut state = self.state.write();
        state.failure = Some(message.clone());
        state.closed = true;
        state.prepared_range = None;
        CoordinatorError::EngineFailure(message)
    }
}

fn ensure_wanted(abandoned: &AtomicBool) -> CoordinatorResult<()> {
    if abandoned.load(Ordering::Acquire) {
        debug!("caller gave up while queued");
        return Err(CoordinatorError::Abandoned);
    }
    Ok(())
}
