//! SQLite-backed ledger hash oracle.
//!
//! Reads previously ingested ledger hashes from the `history_ledgers` table:
//!
//! ```sql
//! CREATE TABLE history_ledgers (
//!     sequence    INTEGER PRIMARY KEY,
//!     ledger_hash TEXT NOT NULL   -- hex-encoded, 64 characters
//! );
//! ```

use std::path::Path;

use rusqlite::{params, Connection, OptionalExtension};
use tracing::info;

use relay_types::{HashRecord, LedgerHash};

use crate::error::{OracleError, OracleResult};
use crate::traits::LedgerHashOracle;

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS history_ledgers (
    sequence    INTEGER PRIMARY KEY,
    ledger_hash TEXT NOT NULL
)";

/// Ledger hash oracle over a SQLite database.
pub struct SqliteHashStore {
    conn: Option<Connection>,
}

impl SqliteHashStore {
    /// Open the store named by a database URL.
    ///
    /// Accepts `sqlite://<path>`, `sqlite:<path>`, or a bare path. The
    /// `history_ledgers` table is created if it does not exist.
    pub fn open(url: &str) -> OracleResult<Self> {
        let path = url
            .strip_prefix("sqlite://")
            .or_else(|| url.strip_prefix("sqlite:"))
            .unwrap_or(url);
        if path.is_empty() {
            return Err(OracleError::Unavailable("empty database path".into()));
        }
        let store = Self::open_path(Path::new(path))?;
        info!(path, "opened ledger hash store");
        Ok(store)
    }

    pub fn open_path(path: &Path) -> OracleResult<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn: Some(conn) })
    }

    /// In-memory store, mostly useful for tests.
    pub fn open_in_memory() -> OracleResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn: Some(conn) })
    }

    fn conn(&self) -> OracleResult<&Connection> {
        self.conn.as_ref().ok_or(OracleError::Closed)
    }

    /// Record a verified ledger hash, replacing any previous record.
    pub fn record(&self, record: &HashRecord) -> OracleResult<()> {
        self.conn()?.execute(
            "INSERT OR REPLACE INTO history_ledgers (sequence, ledger_hash) VALUES (?1, ?2)",
            params![record.sequence, record.hash.to_hex()],
        )?;
        Ok(())
    }

    /// Number of stored records.
    pub fn len(&self) -> OracleResult<u64> {
        let count: i64 =
            self.conn()?
                .query_row("SELECT COUNT(*) FROM history_ledgers", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    pub fn is_empty(&self) -> OracleResult<bool> {
        Ok(self.len()? == 0)
    }
}

impl LedgerHashOracle for SqliteHashStore {
    fn get_ledger_hash(&self, seq: u32) -> OracleResult<Option<LedgerHash>> {
        let stored: Option<String> = self
            .conn()?
            .query_row(
                "SELECT ledger_hash FROM history_ledgers WHERE sequence = ?1",
                params![seq],
                |row| row.get(0),
            )
            .optional()?;

        stored
            .map(|hex| {
                LedgerHash::from_hex(&hex).map_err(|e| OracleError::Corrupt {
                    seq,
                    reason: e.to_string(),
                })
            })
            .transpose()
    }

    fn close(&mut self) -> OracleResult<()> {
        if let Some(conn) = self.conn.take() {
            conn.close().map_err(|(_, e)| OracleError::from(e))?;
            info!("closed ledger hash store");
        }
        Ok(())
    }
}
