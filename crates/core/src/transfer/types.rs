//! Types for transfer sessions.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::catalog::Recording;
use crate::device::DeviceError;

/// Suffix carried by in-flight local files until they are finalized.
pub const PARTIAL_SUFFIX: &str = ".partial";

/// State of one transfer session.
///
/// `LocalFileClosed` is the success terminal; `Errored` is reachable from
/// every non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferStatus {
    /// Local target paths are being computed.
    Preparing,
    /// The remote byte stream has been requested.
    Requested,
    /// The local partial file exists.
    LocalFileCreated,
    /// Payload chunks are being appended.
    Receiving,
    /// The local copy is finalized.
    LocalFileClosed,
    /// The session failed.
    Errored,
}

impl TransferStatus {
    /// Returns the string representation for API responses.
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferStatus::Preparing => "preparing",
            TransferStatus::Requested => "requested",
            TransferStatus::LocalFileCreated => "local_file_created",
            TransferStatus::Receiving => "receiving",
            TransferStatus::LocalFileClosed => "local_file_closed",
            TransferStatus::Errored => "errored",
        }
    }

    /// Whether the session has ended, successfully or not.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransferStatus::LocalFileClosed | TransferStatus::Errored
        )
    }
}

/// Immutable view of an in-flight transfer, published once per state change
/// and once per received chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferSnapshot {
    /// Remote identity of the file; key in the active-transfer table.
    pub remote_path: String,
    /// Current state.
    pub status: TransferStatus,
    /// Local target: the partial path while receiving, the final path once
    /// closed.
    pub local_path: PathBuf,
    /// Total size from the catalog, validated against the response headers.
    pub size_bytes: u64,
    /// Bytes appended to the local file so far.
    pub bytes_received: u64,
    /// Size of the most recent chunk.
    pub last_chunk_bytes: u64,
    /// When the most recent chunk arrived.
    pub last_chunk_at: Option<DateTime<Utc>>,
    /// When the session started.
    pub started_at: DateTime<Utc>,
    /// Failure description, set when `status` is `Errored`.
    pub error: Option<String>,
}

impl TransferSnapshot {
    /// Initial snapshot for a recording about to be transferred.
    pub fn preparing(recording: &Recording) -> Self {
        Self {
            remote_path: recording.remote_path.clone(),
            status: TransferStatus::Preparing,
            local_path: PathBuf::new(),
            size_bytes: recording.size_bytes,
            bytes_received: 0,
            last_chunk_bytes: 0,
            last_chunk_at: None,
            started_at: Utc::now(),
            error: None,
        }
    }
}

/// Errors that end a transfer session.
#[derive(Debug, Error)]
pub enum TransferError {
    /// Response headers declared a different size than the catalog; the
    /// catalog entry is stale or corrupt.
    #[error("declared content length {declared} does not match catalog size {expected}")]
    SizeMismatch { declared: u64, expected: u64 },

    /// The device stream failed.
    #[error("device error: {0}")]
    Device(#[from] DeviceError),

    /// Writing the local file failed.
    #[error("local file error: {0}")]
    Io(#[from] std::io::Error),

    /// The stream ended before the full payload arrived.
    #[error("stream ended after {received} of {expected} bytes")]
    Interrupted { received: u64, expected: u64 },

    /// The session was cancelled.
    #[error("transfer cancelled")]
    Cancelled,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_as_str() {
        assert_eq!(TransferStatus::Preparing.as_str(), "preparing");
        assert_eq!(TransferStatus::Requested.as_str(), "requested");
        assert_eq!(
            TransferStatus::LocalFileCreated.as_str(),
            "local_file_created"
        );
        assert_eq!(TransferStatus::Receiving.as_str(), "receiving");
        assert_eq!(
            TransferStatus::LocalFileClosed.as_str(),
            "local_file_closed"
        );
        assert_eq!(TransferStatus::Errored.as_str(), "errored");
    }

    #[test]
    fn test_terminal_states() {
        assert!(TransferStatus::LocalFileClosed.is_terminal());
        assert!(TransferStatus::Errored.is_terminal());
        assert!(!TransferStatus::Receiving.is_terminal());
        assert!(!TransferStatus::Preparing.is_terminal());
    }

    #[test]
    fn test_error_display() {
        let err = TransferError::SizeMismatch {
            declared: 10,
            expected: 20,
        };
        assert_eq!(
            err.to_string(),
            "declared content length 10 does not match catalog size 20"
        );

        let err = TransferError::Interrupted {
            received: 5,
            expected: 20,
        };
        assert_eq!(err.to_string(), "stream ended after 5 of 20 bytes");
    }

    #[test]
    fn test_snapshot_serialization() {
        let snapshot = TransferSnapshot {
            remote_path: "A:\\DCIM\\Movie\\a_F.MP4".to_string(),
            status: TransferStatus::Receiving,
            local_path: PathBuf::from("/tmp/a_F.MP4.partial"),
            size_bytes: 100,
            bytes_received: 50,
            last_chunk_bytes: 10,
            last_chunk_at: Some(Utc::now()),
            started_at: Utc::now(),
            error: None,
        };
        let json = serde_json::to_string(&snapshot).unwrap();
        let parsed: TransferSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.status, TransferStatus::Receiving);
        assert_eq!(parsed.bytes_received, 50);
    }
}
