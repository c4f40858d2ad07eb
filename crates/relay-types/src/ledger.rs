use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::TypeError;
use crate::hash::LedgerHasher;

/// 32-byte ledger hash.
///
/// Serialized as a lowercase hex string so archive files and wire payloads
/// stay readable.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct LedgerHash([u8; 32]);

impl LedgerHash {
    pub const fn zero() -> Self {
        Self([0u8; 32])
    }

    pub fn from_hash(hash: [u8; 32]) -> Self {
        Self(hash)
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Short hex representation (first 8 characters).
    pub fn short_hex(&self) -> String {
        hex::encode(&self.0[..4])
    }

    pub fn from_hex(s: &str) -> Result<Self, TypeError> {
        let bytes = hex::decode(s).map_err(|e| TypeError::InvalidHex(e.to_string()))?;
        if bytes.len() != 32 {
            return Err(TypeError::InvalidLength {
                expected: 32,
                actual: bytes.len(),
            });
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }
}

impl fmt::Debug for LedgerHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LedgerHash({})", self.short_hex())
    }
}

impl fmt::Display for LedgerHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl From<[u8; 32]> for LedgerHash {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl Serialize for LedgerHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for LedgerHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(s.trim()).map_err(serde::de::Error::custom)
    }
}

/// One replayed ledger.
///
/// The relay treats `payload` as opaque bytes (the close meta produced by the
/// replay engine). Only `sequence` is checked by the coordinator; `hash` and
/// `previous_hash` are used by engines and hash oracles for verification.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ledger {
    pub sequence: u32,
    pub hash: LedgerHash,
    pub previous_hash: LedgerHash,
    /// Close time in seconds since UNIX epoch.
    pub close_time: u64,
    #[serde(with = "hex_bytes")]
    pub payload: Vec<u8>,
}

impl Ledger {
    /// Build a ledger whose `hash` is computed from its header fields.
    pub fn sealed(
        sequence: u32,
        previous_hash: LedgerHash,
        close_time: u64,
        payload: Vec<u8>,
    ) -> Self {
        let hash = LedgerHasher::LEDGER.hash_header(sequence, &previous_hash, close_time, &payload);
        Self {
            sequence,
            hash,
            previous_hash,
            close_time,
            payload,
        }
    }

    /// Recompute the header hash from the ledger's fields.
    pub fn compute_hash(&self) -> LedgerHash {
        LedgerHasher::LEDGER.hash_header(
            self.sequence,
            &self.previous_hash,
            self.close_time,
            &self.payload,
        )
    }

    /// Returns `true` if the stored hash matches the recomputed one.
    pub fn is_sealed(&self) -> bool {
        self.compute_hash() == self.hash
    }
}

/// A previously verified ledger hash, as stored by a hash oracle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashRecord {
    pub sequence: u32,
    pub hash: LedgerHash,
}

mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(s).map_err(serde::de::Error::custom)
    }
}
