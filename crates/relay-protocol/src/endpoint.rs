use serde::{Deserialize, Serialize};

pub const PROTOCOL_VERSION: u32 = 1;

/// HTTP endpoint paths served by the relay.
pub mod endpoints {
    pub const PREPARE_RANGE: &str = "/v1/prepare-range";
    pub const NEXT_LEDGER: &str = "/v1/ledger/next";
    pub const STATUS: &str = "/v1/status";
    pub const LATEST_SEQUENCE: &str = "/v1/latest-sequence";
    pub const HEALTH: &str = "/v1/health";
    pub const INFO: &str = "/v1/info";
}

/// Health check response.
///
/// `status` is `"ok"` while the relay accepts requests and otherwise names
/// the shutdown phase or `"failed"`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub protocol_version: u32,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "ok".into(),
            version: env!("CARGO_PKG_VERSION").into(),
            protocol_version: PROTOCOL_VERSION,
        }
    }
}

impl HealthResponse {
    pub fn with_status(status: impl Into<String>) -> Self {
        Self {
            status: status.into(),
            ..Self::default()
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == "ok"
    }
}

/// Static description of the network and archives a relay replays.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InfoResponse {
    pub network_passphrase: String,
    pub checkpoint_frequency: u32,
    pub history_archives: usize,
    pub hash_verification: bool,
    pub protocol_version: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn health_response_defaults() {
        let h = HealthResponse::default();
        assert!(h.is_ok());
        assert_eq!(h.protocol_version, PROTOCOL_VERSION);
        assert!(!HealthResponse::with_status("draining").is_ok());
    }

    #[test]
    fn endpoint_paths() {
        assert_eq!(endpoints::PREPARE_RANGE, "/v1/prepare-range");
        assert_eq!(endpoints::NEXT_LEDGER, "/v1/ledger/next");
        assert_eq!(endpoints::STATUS, "/v1/status");
        assert_eq!(endpoints::HEALTH, "/v1/health");
    }
}
