//! Request coordinator for the ledger relay.
//!
//! The replay engine can prepare one range at a time and must be asked for
//! ledgers in strictly increasing order. The [`Coordinator`] owns the single
//! engine instance and makes that contract safe under concurrent callers:
//! mutating operations are serialized in arrival order, status reads never
//! wait on the engine, fatal engine errors are recorded and replayed to every
//! later caller, and shutdown releases the engine exactly once.

pub mod coordinator;
pub mod error;
pub mod lifecycle;
pub mod state;

pub use coordinator::{Coordinator, PrepareOutcome};
pub use error::{CoordinatorError, CoordinatorResult, ErrorKind};
pub use lifecycle::{Lifecycle, Phase};
pub use state::CoordinatorState;
