//! Types for dashcam device operations.

use std::pin::Pin;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::Stream;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur talking to the device.
#[derive(Debug, Error)]
pub enum DeviceError {
    /// The device did not answer at the transport level.
    #[error("device unreachable: {0}")]
    Unreachable(String),

    /// The device answered but the command failed.
    #[error("command failed: {0}")]
    CommandFailed(String),

    /// The device response could not be parsed.
    #[error("failed to parse device response: {0}")]
    ParseFailed(String),

    /// The download stream broke mid-transfer.
    #[error("stream error: {0}")]
    Stream(String),

    /// Deleting a remote file failed.
    #[error("delete failed: {0}")]
    DeleteFailed(String),

    /// The request did not complete within the bounded timeout.
    #[error("request timed out")]
    Timeout,
}

/// Chunked byte stream coming off the device.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, DeviceError>> + Send>>;

/// An open download stream plus the content length the device declared for
/// it, when the response carried one.
pub struct DownloadStream {
    /// Content length from the response headers, if declared.
    pub declared_len: Option<u64>,
    /// The payload chunks.
    pub stream: ByteStream,
}

/// Last known device link health.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceHealth {
    /// Heartbeat round-trip latency in milliseconds.
    pub latency_ms: u64,
    /// When the heartbeat was taken.
    pub checked_at: DateTime<Utc>,
}
