//! Replay engine over local history archive directories.
//!
//! Archive layout:
//!
//! ```text
//! <archive>/.well-known/relay-archive.json   {"network_passphrase": "..."}
//! <archive>/ledger/0000abcd.json             one ledger per file, hex sequence
//! ```
//!
//! Preparing a range replays from the first ledger of the checkpoint that
//! contains `range.from` and verifies the hash chain up to `range.from`.
//! Ledgers served afterwards are checked against the chain as they are read.
//! Several archives may be configured; each ledger is read from the first
//! archive that has it.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use relay_types::{Ledger, LedgerHash, LedgerRange};

use crate::checkpoint::{CheckpointSchedule, DEFAULT_CHECKPOINT_FREQUENCY};
use crate::error::{EngineError, EngineResult};
use crate::traits::ReplayEngine;

pub const MANIFEST_PATH: &str = ".well-known/relay-archive.json";
pub const LEDGER_DIR: &str = "ledger";

/// Archive manifest, identifying the network an archive belongs to.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveManifest {
    pub network_passphrase: String,
}

/// Configuration for an [`ArchiveEngine`].
#[derive(Clone, Debug)]
pub struct ArchiveConfig {
    pub network_passphrase: String,
    pub archives: Vec<PathBuf>,
    pub checkpoint_frequency: u32,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            network_passphrase: String::new(),
            archives: Vec::new(),
            checkpoint_frequency: DEFAULT_CHECKPOINT_FREQUENCY,
        }
    }
}

fn ledger_file(archive: &Path, seq: u32) -> PathBuf {
    archive.join(LEDGER_DIR).join(format!("{seq:08x}.json"))
}

/// Check `ledger` links to `tip` when it directly follows it.
fn check_link(tip: Option<(u32, LedgerHash)>, ledger: &Ledger) -> EngineResult<()> {
    match tip {
        Some((tip_seq, tip_hash))
            if tip_seq.checked_add(1) == Some(ledger.sequence)
                && ledger.previous_hash != tip_hash =>
        {
            Err(EngineError::Malformed {
                seq: ledger.sequence,
                reason: format!("previous hash does not match ledger {tip_seq}"),
            })
        }
        _ => Ok(()),
    }
}

/// Replay engine reading ledgers from local history archives.
pub struct ArchiveEngine {
    archives: Vec<PathBuf>,
    schedule: CheckpointSchedule,
    prepared: Option<LedgerRange>,
    /// Last ledger verified or served: the anchor for chain checks.
    tip: Option<(u32, LedgerHash)>,
    closed: bool,
}

impl ArchiveEngine {
    /// Open the configured archives, checking each manifest against the
    /// configured network passphrase.
    pub fn open(config: ArchiveConfig) -> EngineResult<Self> {
        let schedule = CheckpointSchedule::new(config.checkpoint_frequency)?;
        if config.archives.is_empty() {
            return Err(EngineError::InvalidConfig(
                "at least one history archive is required".into(),
            ));
        }

        for archive in &config.archives {
            let manifest_path = archive.join(MANIFEST_PATH);
            let raw = fs::read(&manifest_path).map_err(|e| {
                EngineError::InvalidConfig(format!(
                    "cannot read archive manifest {}: {e}",
                    manifest_path.display()
                ))
            })?;
            let manifest: ArchiveManifest = serde_json::from_slice(&raw).map_err(|e| {
                EngineError::InvalidConfig(format!(
                    "invalid archive manifest {}: {e}",
                    manifest_path.display()
                ))
            })?;
            if manifest.network_passphrase != config.network_passphrase {
                return Err(EngineError::InvalidConfig(format!(
                    "archive {} belongs to network `{}`, expected `{}`",
                    archive.display(),
                    manifest.network_passphrase,
                    config.network_passphrase
                )));
            }
        }

        info!(
            archives = config.archives.len(),
            checkpoint_frequency = schedule.frequency(),
            "opened history archives"
        );

        Ok(Self {
            archives: config.archives,
            schedule,
            prepared: None,
            tip: None,
            closed: false,
        })
    }

    pub fn schedule(&self) -> CheckpointSchedule {
        self.schedule
    }

    fn has_ledger(&self, seq: u32) -> bool {
        self.archives.iter().any(|a| ledger_file(a, seq).is_file())
    }

    fn read_ledger(&self, seq: u32) -> EngineResult<Option<Ledger>> {
        let Some(path) = self
            .archives
            .iter()
            .map(|a| ledger_file(a, seq))
            .find(|p| p.is_file())
        else {
            return Ok(None);
        };

        let raw = fs::read(&path)?;
        let ledger: Ledger = serde_json::from_slice(&raw).map_err(|e| EngineError::Malformed {
            seq,
            reason: format!("{}: {e}", path.display()),
        })?;
        if ledger.sequence != seq {
            return Err(EngineError::Malformed {
                seq,
                reason: format!("file holds ledger {}", ledger.sequence),
            });
        }
        if !ledger.is_sealed() {
            return Err(EngineError::Malformed {
                seq,
                reason: "stored hash does not match ledger header".into(),
            });
        }
        Ok(Some(ledger))
    }

    /// Highest contiguous ledger available from `start`, or `start - 1`.
    fn scan_live_edge(&self, start: u32) -> u32 {
        let mut seq = start;
        while self.has_ledger(seq) {
            seq += 1;
        }
        seq - 1
    }
}

impl ReplayEngine for ArchiveEngine {
    fn prepare_range(&mut self, range: LedgerRange) -> EngineResult<()> {
        if self.closed {
            return Err(EngineError::Closed);
        }

        let start = self.schedule.checkpoint_start(range.from());
        debug!(%range, checkpoint_start = start, "replaying checkpoint prefix");

        // The previous range stays prepared until the new one is known good.
        let mut tip = None;
        for seq in start..range.from() {
            let ledger = self.read_ledger(seq)?.ok_or_else(|| EngineError::RangeUnavailable {
                range,
                reason: format!("ledger {seq} is missing from every archive"),
            })?;
            check_link(tip, &ledger)?;
            tip = Some((seq, ledger.hash));
        }

        if range.is_bounded() {
            if let Some(missing) = (range.from()..range.to()).find(|s| !self.has_ledger(*s)) {
                return Err(EngineError::RangeUnavailable {
                    range,
                    reason: format!("ledger {missing} is missing from every archive"),
                });
            }
        }

        self.tip = tip;
        self.prepared = Some(range);
        info!(%range, "archive range prepared");
        Ok(())
    }

    fn get_ledger(&mut self, seq: u32) -> EngineResult<Ledger> {
        if self.closed {
            return Err(EngineError::Closed);
        }
        let prepared = self
            .prepared
            .filter(|r| r.contains_seq(seq))
            .ok_or(EngineError::SequenceOutsideRange { seq })?;
        if let Some((tip_seq, _)) = self.tip.filter(|(tip_seq, _)| seq <= *tip_seq) {
            return Err(EngineError::OutOfOrder {
                requested: seq,
                last: tip_seq,
            });
        }

        let ledger = match self.read_ledger(seq)? {
            Some(ledger) => ledger,
            None if prepared.is_bounded() => {
                return Err(EngineError::Io(format!(
                    "ledger {seq} disappeared from the archives after preparation"
                )))
            }
            None => return Err(EngineError::NotYetAvailable { seq }),
        };
        check_link(self.tip, &ledger)?;
        self.tip = Some((seq, ledger.hash));
        Ok(ledger)
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
        if prepared.is_bounded() {
            return Ok(prepared.to().saturating_sub(1));
        }
        let start = self.tip.map_or(prepared.from(), |(seq, _)| seq + 1);
        Ok(self.scan_live_edge(start))
    }

    fn close(&mut self) -> EngineResult<()> {
        if !self.closed {
            self.closed = true;
            self.prepared = None;
            self.tip = None;
            info!("archive engine closed");
        }
        Ok(())
    }
}

/// Writes ledgers into an archive directory in the layout [`ArchiveEngine`]
/// reads.
pub struct ArchiveWriter {
    root: PathBuf,
}

impl ArchiveWriter {
    /// Create (or reuse) an archive at `root` for the given network.
    pub fn create(root: impl Into<PathBuf>, network_passphrase: &str) -> EngineResult<Self> {
        let root = root.into();
        let manifest_path = root.join(MANIFEST_PATH);
        if let Some(parent) = manifest_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::create_dir_all(root.join(LEDGER_DIR))?;
        let manifest = ArchiveManifest {
            network_passphrase: network_passphrase.to_string(),
        };
        let raw = serde_json::to_vec_pretty(&manifest)
            .map_err(|e| EngineError::Io(e.to_string()))?;
        fs::write(manifest_path, raw)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn write_ledger(&self, ledger: &Ledger) -> EngineResult<()> {
        let raw = serde_json::to_vec(ledger).map_err(|e| EngineError::Io(e.to_string()))?;
        fs::write(ledger_file(&self.root, ledger.sequence), raw)?;
        Ok(())
    }

    pub fn write_all<'a>(
        &self,
        ledgers: impl IntoIterator<Item = &'a Ledger>,
    ) -> EngineResult<usize> {
        let mut written = 0;
        for ledger in ledgers {
            self.write_ledger(ledger)?;
            written += 1;
        }
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::synthetic_chain;

    const NETWORK: &str = "Test Relay Network";

    fn archive_with(count: u32) -> (tempfile::TempDir, ArchiveConfig) {
        let dir = tempfile::tempdir().unwrap();
        let writer = ArchiveWriter::create(dir.path(), NETWORK).unwrap();
        writer.write_all(&synthetic_chain(1, count)).unwrap();
        let config = ArchiveConfig {
            network_passphrase: NETWORK.into(),
            archives: vec![dir.path().to_path_buf()],
            checkpoint_frequency: 8,
        };
        (dir, config)
    }

    fn range(from: u32, to: u32) -> LedgerRange {
        LedgerRange::new(from, to).unwrap()
    }

    #[test]
    fn rejects_foreign_network() {
        let (_dir, mut config) = archive_with(4);
        config.network_passphrase = "Public Network".into();
        assert!(matches!(
            ArchiveEngine::open(config),
            Err(EngineError::InvalidConfig(_))
        ));
    }

    #[test]
    fn rejects_missing_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let config = ArchiveConfig {
            network_passphrase: NETWORK.into(),
            archives: vec![dir.path().to_path_buf()],
            ..ArchiveConfig::default()
        };
        assert!(ArchiveEngine::open(config).is_err());
    }

    #[test]
    fn rejects_empty_archive_list() {
        assert!(ArchiveEngine::open(ArchiveConfig::default()).is_err());
    }

    #[test]
    fn serves_bounded_range() {
        let (_dir, config) = archive_with(30);
        let mut engine = ArchiveEngine::open(config).unwrap();
        engine.prepare_range(range(13, 17)).unwrap();
        assert!(engine.is_prepared(&range(14, 16)));
        for seq in 13..17 {
            let ledger = engine.get_ledger(seq).unwrap();
            assert_eq!(ledger.sequence, seq);
        }
        assert_eq!(engine.latest_ledger_sequence().unwrap(), 16);
    }

    #[test]
    fn bounded_range_with_gap_is_unavailable() {
        let (_dir, config) = archive_with(10);
        let mut engine = ArchiveEngine::open(config).unwrap();
        let err = engine.prepare_range(range(5, 20)).unwrap_err();
        assert!(matches!(err, EngineError::RangeUnavailable { .. }));
        assert!(!engine.is_prepared(&range(5, 6)));
    }

    #[test]
    fn unavailable_range_keeps_previous_range() {
        let (_dir, config) = archive_with(10);
        let mut engine = ArchiveEngine::open(config).unwrap();
        engine.prepare_range(range(3, 8)).unwrap();
        engine.get_ledger(3).unwrap();

        let err = engine.prepare_range(range(4, 20)).unwrap_err();
        assert!(matches!(err, EngineError::RangeUnavailable { .. }));
        assert!(engine.is_prepared(&range(3, 8)));
        assert_eq!(engine.get_ledger(4).unwrap().sequence, 4);
        assert_eq!(
            engine.get_ledger(3),
            Err(EngineError::OutOfOrder { requested: 3, last: 4 })
        );
    }

    #[test]
    fn unbounded_range_reaches_live_edge() {
        let (dir, config) = archive_with(10);
        let mut engine = ArchiveEngine::open(config).unwrap();
        engine.prepare_range(LedgerRange::unbounded(9).unwrap()).unwrap();
        engine.get_ledger(9).unwrap();
        engine.get_ledger(10).unwrap();
        assert_eq!(engine.get_ledger(11), Err(EngineError::NotYetAvailable { seq: 11 }));

        let next = synthetic_chain(1, 11).pop().unwrap();
        ArchiveWriter::create(dir.path(), NETWORK).unwrap().write_ledger(&next).unwrap();
        assert_eq!(engine.latest_ledger_sequence().unwrap(), 11);
        assert_eq!(engine.get_ledger(11).unwrap(), next);
    }

    #[test]
    fn broken_chain_is_malformed() {
        let (dir, config) = archive_with(10);
        let mut chain = synthetic_chain(1, 10);
        let forged = Ledger::sealed(6, LedgerHash::from_hash([3; 32]), 0, b"forged".to_vec());
        chain[5] = forged;
        ArchiveWriter::create(dir.path(), NETWORK).unwrap().write_all(&chain).unwrap();

        // The break sits inside the checkpoint prefix replayed by prepare.
        let mut engine = ArchiveEngine::open(config.clone()).unwrap();
        let err = engine.prepare_range(range(7, 10)).unwrap_err();
        assert!(matches!(err, EngineError::Malformed { seq: 6, .. }), "{err}");
        assert!(err.is_fatal());

        // The break is the first ledger served.
        let mut engine = ArchiveEngine::open(config).unwrap();
        engine.prepare_range(range(6, 10)).unwrap();
        let err = engine.get_ledger(6).unwrap_err();
        assert!(matches!(err, EngineError::Malformed { seq: 6, .. }));
    }

    #[test]
    fn tampered_file_is_malformed() {
        let (dir, config) = archive_with(4);
        let mut ledger = synthetic_chain(1, 3).pop().unwrap();
        ledger.payload = b"tampered".to_vec();
        let raw = serde_json::to_vec(&ledger).unwrap();
        fs::write(ledger_file(dir.path(), 3), raw).unwrap();

        let mut engine = ArchiveEngine::open(config).unwrap();
        engine.prepare_range(range(1, 5)).unwrap();
        engine.get_ledger(1).unwrap();
        engine.get_ledger(2).unwrap();
        assert!(matches!(engine.get_ledger(3), Err(EngineError::Malformed { seq: 3, .. })));
    }

    #[test]
    fn falls_back_to_second_archive() {
        let (first, mut config) = archive_with(4);
        let second = tempfile::tempdir().unwrap();
        let chain = synthetic_chain(1, 8);
        ArchiveWriter::create(second.path(), NETWORK)
            .unwrap()
            .write_all(&chain[4..])
            .unwrap();
        config.archives.push(second.path().to_path_buf());

        let mut engine = ArchiveEngine::open(config).unwrap();
        engine.prepare_range(range(3, 9)).unwrap();
        for seq in 3..9 {
            assert_eq!(engine.get_ledger(seq).unwrap(), chain[(seq - 1) as usize]);
        }
        drop(first);
    }

    #[test]
    fn refuses_rewind_and_closed_calls() {
        let (_dir, config) = archive_with(10);
        let mut engine = ArchiveEngine::open(config).unwrap();
        engine.prepare_range(range(2, 8)).unwrap();
        engine.get_ledger(4).unwrap();
        assert_eq!(
            engine.get_ledger(3),
            Err(EngineError::OutOfOrder { requested: 3, last: 4 })
        );
        engine.close().unwrap();
        engine.close().unwrap();
        assert_eq!(engine.get_ledger(5), Err(EngineError::Closed));
    }
}
