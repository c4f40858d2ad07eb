//! Replay engine boundary for the ledger relay.
//!
//! This crate provides:
//! - `ReplayEngine` / `LedgerHashOracle` trait boundaries
//! - `ArchiveEngine`, replaying from local history archive directories
//! - `InMemoryEngine` for tests and local demos
//! - `VerifyingEngine`, cross-checking replayed ledgers against an oracle
//! - `SqliteHashStore` and `NoopOracle` oracle implementations
//! - Checkpoint arithmetic

pub mod archive;
pub mod checkpoint;
pub mod error;
pub mod memory;
pub mod oracle;
pub mod sqlite;
pub mod traits;
pub mod verifying;

pub use archive::{ArchiveConfig, ArchiveEngine, ArchiveManifest, ArchiveWriter};
pub use checkpoint::{CheckpointSchedule, DEFAULT_CHECKPOINT_FREQUENCY};
pub use error::{EngineError, EngineResult, OracleError, OracleResult};
pub use memory::{synthetic_chain, EngineCounters, InMemoryEngine};
pub use oracle::{InMemoryOracle, NoopOracle, OraclePolicy};
pub use sqlite::SqliteHashStore;
pub use traits::{LedgerHashOracle, ReplayEngine};
pub use verifying::VerifyingEngine;
