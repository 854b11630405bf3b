//! Trait definition for dashcam device backends.

use async_trait::async_trait;

use crate::catalog::Recording;

use super::types::{DeviceError, DownloadStream};

/// Capability set the offloader consumes from a recording device.
///
/// All operations are network round trips; implementations are expected to
/// bound them with timeouts rather than block indefinitely.
#[async_trait]
pub trait Dashcam: Send + Sync {
    /// Backend name for logging.
    fn name(&self) -> &str;

    /// Fetches the full file catalog from the device.
    async fn fetch_catalog(&self) -> Result<Vec<Recording>, DeviceError>;

    /// Measures command round-trip latency in milliseconds.
    ///
    /// Fails if the device is unreachable within the heartbeat timeout.
    async fn heartbeat(&self) -> Result<u64, DeviceError>;

    /// Remaining card space, as a human-readable string. Informational only.
    async fn free_space(&self) -> Result<String, DeviceError>;

    /// Opens the byte stream for one recording.
    async fn open_stream(&self, recording: &Recording) -> Result<DownloadStream, DeviceError>;

    /// Deletes one recording from the device.
    async fn delete_recording(&self, recording: &Recording) -> Result<(), DeviceError>;
}
