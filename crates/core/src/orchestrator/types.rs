//! Types for the offload orchestrator.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::catalog::Recording;
use crate::classifier::BucketTally;
use crate::device::{DeviceError, DeviceHealth};
use crate::transfer::TransferSnapshot;

/// Errors that can occur during an offload cycle.
#[derive(Debug, Error)]
pub enum OffloadError {
    /// The link to the device is too slow to commit to a transfer batch.
    /// Retryable; the catalog was not fetched.
    #[error("device latency {latency_ms} ms exceeds threshold {threshold_ms} ms")]
    HealthDegraded { latency_ms: u64, threshold_ms: u64 },

    /// The health check itself failed. Retryable.
    #[error("health check failed: {0}")]
    HealthCheck(#[source] DeviceError),

    /// Fetching the catalog failed. Retryable.
    #[error("failed to fetch catalog: {0}")]
    CatalogFetch(#[source] DeviceError),

    /// A single transfer failed; the queue was discarded.
    #[error("transfer failed for {remote_path}: {reason}")]
    Transfer { remote_path: String, reason: String },

    /// The remote delete failed after a verified local copy. The item is
    /// still treated as failed; the file will be downloaded again next
    /// cycle.
    #[error("failed to delete {remote_path} after download: {source}")]
    Delete {
        remote_path: String,
        #[source]
        source: DeviceError,
    },

    /// The rebuild after a drain failure failed too. Terminal for the
    /// current cycle; the caller is expected to back off and retry.
    #[error("device offline, rebuild after failure did not succeed: {0}")]
    FatalOffline(#[source] Box<OffloadError>),

    /// `run_cycle` was invoked while a cycle was already in flight.
    /// Callers must serialize invocations.
    #[error("an offload cycle is already running")]
    AlreadyRunning,
}

impl OffloadError {
    /// Whether the caller may simply retry the cycle later.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::HealthDegraded { .. } | Self::HealthCheck(_) | Self::CatalogFetch(_)
        )
    }
}

/// Session-level state of the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleState {
    /// No cycle in flight.
    Idle,
    /// Health-gating and classifying the catalog.
    BuildingQueue,
    /// Transferring queue items one at a time.
    Draining,
    /// A drain aborted; a fresh build is being attempted.
    RebuildAfterFailure,
    /// The rebuild failed too; absorbing until the caller retries.
    FatalOffline,
}

impl CycleState {
    /// Returns the string representation for API responses.
    pub fn as_str(&self) -> &'static str {
        match self {
            CycleState::Idle => "idle",
            CycleState::BuildingQueue => "building_queue",
            CycleState::Draining => "draining",
            CycleState::RebuildAfterFailure => "rebuild_after_failure",
            CycleState::FatalOffline => "fatal_offline",
        }
    }
}

/// Read-only view of the orchestrator for status reporting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OffloadStatus {
    /// Current session-level state.
    pub cycle_state: CycleState,
    /// Items waiting in the queue.
    pub queue_len: usize,
    /// Bounded preview of the queue head.
    pub queue_preview: Vec<Recording>,
    /// Transfers currently in flight (at most one by design).
    pub active_transfers: Vec<TransferSnapshot>,
    /// Per-bucket tallies of the last classification, including entries
    /// dropped by disabled buckets.
    pub bucket_tallies: Vec<BucketTally>,
    /// Last heartbeat result.
    pub last_health: Option<DeviceHealth>,
}

/// Outcome of one successful offload cycle.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OffloadReport {
    /// Recordings copied locally and deleted from the device.
    pub transferred: usize,
    /// Total payload bytes received.
    pub bytes_transferred: u64,
    /// Queue rebuilds forced by failures during this cycle.
    pub rebuilds: usize,
}
