use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use relay_engine::{ArchiveConfig, OraclePolicy, DEFAULT_CHECKPOINT_FREQUENCY};
use relay_protocol::{InfoResponse, PROTOCOL_VERSION};

use crate::error::{ServerError, ServerResult};

pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_NETWORK_PASSPHRASE: &str = "Test SDF Network ; September 2015";
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;

/// Relay configuration, usually loaded from a TOML file and then overridden
/// by command-line flags.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    pub listen_addr: SocketAddr,
    pub network_passphrase: String,
    pub history_archives: Vec<PathBuf>,
    pub checkpoint_frequency: u32,
    /// Ledger hash database. Enables hash verification when set.
    pub database_url: Option<String>,
    pub oracle_policy: OraclePolicy,
    /// Per-request deadline for coordinator calls. `0` disables it.
    pub request_timeout_ms: u64,
    pub log_level: String,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, DEFAULT_PORT)),
            network_passphrase: DEFAULT_NETWORK_PASSPHRASE.into(),
            history_archives: Vec::new(),
            checkpoint_frequency: DEFAULT_CHECKPOINT_FREQUENCY,
            database_url: None,
            oracle_policy: OraclePolicy::default(),
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            log_level: "info".into(),
        }
    }
}

impl RelayConfig {
    pub fn from_toml_str(raw: &str) -> ServerResult<Self> {
        toml::from_str(raw).map_err(|e| ServerError::Config(e.to_string()))
    }

    pub fn load(path: &Path) -> ServerResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            ServerError::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&raw)
    }

    pub fn to_toml_string(&self) -> ServerResult<String> {
        toml::to_string_pretty(self).map_err(|e| ServerError::Config(e.to_string()))
    }

    pub fn validate(&self) -> ServerResult<()> {
        if self.network_passphrase.trim().is_empty() {
            return Err(ServerError::Config("network_passphrase must not be empty".into()));
        }
        if self.history_archives.is_empty() {
            return Err(ServerError::Config(
                "at least one history archive is required".into(),
            ));
        }
        if self.checkpoint_frequency == 0 {
            return Err(ServerError::Config(
                "checkpoint_frequency must be greater than zero".into(),
            ));
        }
        if self.database_url.as_deref().is_some_and(|u| u.trim().is_empty()) {
            return Err(ServerError::Config("database_url must not be empty".into()));
        }
        tracing::Level::from_str(&self.log_level).map_err(|_| {
            ServerError::Config(format!("unknown log level `{}`", self.log_level))
        })?;
        Ok(())
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        (self.request_timeout_ms > 0).then(|| Duration::from_millis(self.request_timeout_ms))
    }

    pub fn archive_config(&self) -> ArchiveConfig {
        ArchiveConfig {
            network_passphrase: self.network_passphrase.clone(),
            archives: self.history_archives.clone(),
            checkpoint_frequency: self.checkpoint_frequency,
        }
    }

    pub fn info(&self) -> InfoResponse {
        InfoResponse {
            network_passphrase: self.network_passphrase.clone(),
            checkpoint_frequency: self.checkpoint_frequency,
            history_archives: self.history_archives.len(),
            hash_verification: self.database_url.is_some(),
            protocol_version: PROTOCOL_VERSION,
        }
    }
}
