//! Foundation types for the ledger relay.
//!
//! Every other relay crate depends on `relay-types`.
//!
//! # Key Types
//!
//! - [`LedgerRange`]: A contiguous span of ledger sequences, bounded or live
//! - [`Ledger`]: One replayed ledger as produced by a replay engine
//! - [`LedgerHash`]: 32-byte ledger hash, hex-encoded on the wire
//! - [`HashRecord`]: A previously verified `(sequence, hash)` pair
//! - [`LedgerHasher`]: Domain-separated BLAKE3 hasher for ledger headers

pub mod error;
pub mod hash;
pub mod ledger;
pub mod range;

pub use error::TypeError;
pub use hash::LedgerHasher;
pub use ledger::{HashRecord, Ledger, LedgerHash};
pub use range::LedgerRange;
