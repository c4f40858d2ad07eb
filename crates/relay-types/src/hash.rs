use crate::ledger::LedgerHash;

/// Domain-separated BLAKE3 hasher for ledger headers.
///
/// The domain tag is prepended to every computation so a ledger header and
/// any other hashed structure never collide even with identical bytes.
pub struct LedgerHasher {
    domain: &'static str,
}

impl LedgerHasher {
    /// Hasher for replayed ledger headers.
    pub const LEDGER: Self = Self {
        domain: "relay-ledger-v1",
    };

    pub const fn new(domain: &'static str) -> Self {
        Self { domain }
    }

    /// Hash raw bytes with domain separation.
    pub fn hash(&self, data: &[u8]) -> LedgerHash {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.domain.as_bytes());
        hasher.update(b":");
        hasher.update(data);
        LedgerHash::from_hash(*hasher.finalize().as_bytes())
    }

    /// Hash the header fields of a ledger.
    ///
    /// Fixed-width fields are encoded big-endian; the payload is
    /// length-prefixed so no two distinct headers share an encoding.
    pub fn hash_header(
        &self,
        sequence: u32,
        previous_hash: &LedgerHash,
        close_time: u64,
        payload: &[u8],
    ) -> LedgerHash {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.domain.as_bytes());
        hasher.update(b":");
        hasher.update(&sequence.to_be_bytes());
        hasher.update(previous_hash.as_bytes());
        hasher.update(&close_time.to_be_bytes());
        hasher.update(&(payload.len() as u64).to_be_bytes());
        hasher.update(payload);
        LedgerHash::from_hash(*hasher.finalize().as_bytes())
    }

    pub fn domain(&self) -> &str {
        self.domain
    }
}
