//! Wire protocol for the ledger relay.
//!
//! Defines the HTTP endpoint paths, the JSON request and response bodies,
//! and the stable error codes shared by the relay server and its clients.

pub mod endpoint;
pub mod error;
pub mod message;

pub use endpoint::{endpoints, HealthResponse, InfoResponse, PROTOCOL_VERSION};
pub use error::{ErrorBody, ErrorCode, ErrorDetail, ProtocolError, ProtocolResult};
pub use message::{
    LatestSequenceResponse, NextLedgerResponse, PrepareRangeRequest, PrepareRangeResponse,
    StatusResponse,
};
