//! Mock dashcam for testing.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{stream, StreamExt};
use tokio::sync::RwLock;

use crate::catalog::Recording;
use crate::device::{Dashcam, DeviceError, DownloadStream};

/// Mock implementation of the [`Dashcam`] trait.
///
/// Provides controllable behavior for testing:
/// - Serve a configurable catalog and per-file payloads
/// - Control heartbeat latency and inject failures per operation
/// - Track delete calls and catalog fetches for assertions
///
/// Payloads default to `size_bytes` zero bytes per catalog entry, so the
/// happy path needs nothing beyond `set_catalog`.
///
/// # Example
///
/// ```rust,ignore
/// let cam = MockDashcam::new();
/// cam.set_catalog(vec![fixtures::driving_clip("2023_1104_123456_F.MP4")]).await;
/// cam.set_latency_ms(50).await;
///
/// // After a cycle, check what was deleted
/// let deleted = cam.deleted_paths().await;
/// assert_eq!(deleted.len(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct MockDashcam {
    /// Catalog served by `fetch_catalog`.
    catalog: Arc<RwLock<Vec<Recording>>>,
    /// Latency reported by `heartbeat`.
    latency_ms: Arc<RwLock<u64>>,
    /// If set, `heartbeat` fails with this error.
    heartbeat_fails: Arc<RwLock<bool>>,
    /// Catalog fetches beyond this count fail as unreachable.
    fail_catalog_after: Arc<RwLock<Option<usize>>>,
    /// Number of `fetch_catalog` calls made so far.
    catalog_calls: Arc<RwLock<usize>>,
    /// Explicit payloads by remote path.
    bodies: Arc<RwLock<HashMap<String, Bytes>>>,
    /// Content-length overrides by remote path.
    declared_len_overrides: Arc<RwLock<HashMap<String, u64>>>,
    /// Paths whose next stream breaks mid-transfer. Consumed on open.
    fail_stream_once: Arc<RwLock<HashSet<String>>>,
    /// Paths whose streams never finish.
    stalled: Arc<RwLock<HashSet<String>>>,
    /// Paths whose deletes fail.
    delete_errors: Arc<RwLock<HashSet<String>>>,
    /// Recorded successful delete calls, in order.
    deleted: Arc<RwLock<Vec<String>>>,
    /// Payload chunk size.
    chunk_size: usize,
}

impl Default for MockDashcam {
    fn default() -> Self {
        Self::new()
    }
}

impl MockDashcam {
    /// Create a new mock with an empty catalog and a healthy 10 ms link.
    pub fn new() -> Self {
        Self {
            catalog: Arc::new(RwLock::new(Vec::new())),
            latency_ms: Arc::new(RwLock::new(10)),
            heartbeat_fails: Arc::new(RwLock::new(false)),
            fail_catalog_after: Arc::new(RwLock::new(None)),
            catalog_calls: Arc::new(RwLock::new(0)),
            bodies: Arc::new(RwLock::new(HashMap::new())),
            declared_len_overrides: Arc::new(RwLock::new(HashMap::new())),
            fail_stream_once: Arc::new(RwLock::new(HashSet::new())),
            stalled: Arc::new(RwLock::new(HashSet::new())),
            delete_errors: Arc::new(RwLock::new(HashSet::new())),
            deleted: Arc::new(RwLock::new(Vec::new())),
            chunk_size: 256,
        }
    }

    /// Replace the catalog served by `fetch_catalog`.
    pub async fn set_catalog(&self, recordings: Vec<Recording>) {
        *self.catalog.write().await = recordings;
    }

    /// Set the heartbeat latency.
    pub async fn set_latency_ms(&self, latency_ms: u64) {
        *self.latency_ms.write().await = latency_ms;
    }

    /// Make heartbeats fail until cleared.
    pub async fn set_heartbeat_fails(&self, fails: bool) {
        *self.heartbeat_fails.write().await = fails;
    }

    /// Make `fetch_catalog` fail once `count` calls have been served.
    pub async fn fail_catalog_after(&self, count: usize) {
        *self.fail_catalog_after.write().await = Some(count);
    }

    /// Number of `fetch_catalog` calls served or attempted.
    pub async fn catalog_calls(&self) -> usize {
        *self.catalog_calls.read().await
    }

    /// Set the payload served for a remote path.
    pub async fn set_body(&self, remote_path: &str, body: impl Into<Bytes>) {
        self.bodies
            .write()
            .await
            .insert(remote_path.to_string(), body.into());
    }

    /// Override the declared content length for a remote path.
    pub async fn set_declared_len(&self, remote_path: &str, len: u64) {
        self.declared_len_overrides
            .write()
            .await
            .insert(remote_path.to_string(), len);
    }

    /// Make the next stream for a path break after its first chunk.
    pub async fn fail_stream_once(&self, remote_path: &str) {
        self.fail_stream_once
            .write()
            .await
            .insert(remote_path.to_string());
    }

    /// Make streams for a path hang forever after their first chunk.
    pub async fn stall_stream(&self, remote_path: &str) {
        self.stalled.write().await.insert(remote_path.to_string());
    }

    /// Make deletes fail for a path until cleared.
    pub async fn set_delete_fails(&self, remote_path: &str) {
        self.delete_errors
            .write()
            .await
            .insert(remote_path.to_string());
    }

    /// Remote paths successfully deleted, in call order.
    pub async fn deleted_paths(&self) -> Vec<String> {
        self.deleted.read().await.clone()
    }

    async fn body_for(&self, recording: &Recording) -> Bytes {
        match self.bodies.read().await.get(&recording.remote_path) {
            Some(body) => body.clone(),
            None => Bytes::from(vec![0u8; recording.size_bytes as usize]),
        }
    }

    fn chunks_of(&self, body: &Bytes) -> Vec<Bytes> {
        if body.is_empty() {
            return Vec::new();
        }
        (0..body.len())
            .step_by(self.chunk_size)
            .map(|off| body.slice(off..(off + self.chunk_size).min(body.len())))
            .collect()
    }
}

#[async_trait]
impl Dashcam for MockDashcam {
    fn name(&self) -> &str {
        "mock"
    }

    async fn fetch_catalog(&self) -> Result<Vec<Recording>, DeviceError> {
        let calls = {
            let mut calls = self.catalog_calls.write().await;
            *calls += 1;
            *calls
        };
        if let Some(limit) = *self.fail_catalog_after.read().await {
            if calls > limit {
                return Err(DeviceError::Unreachable("mock offline".to_string()));
            }
        }
        Ok(self.catalog.read().await.clone())
    }

    async fn heartbeat(&self) -> Result<u64, DeviceError> {
        if *self.heartbeat_fails.read().await {
            return Err(DeviceError::Timeout);
        }
        Ok(*self.latency_ms.read().await)
    }

    async fn free_space(&self) -> Result<String, DeviceError> {
        Ok("32 GiB".to_string())
    }

    async fn open_stream(&self, recording: &Recording) -> Result<DownloadStream, DeviceError> {
        let body = self.body_for(recording).await;
        let declared_len = self
            .declared_len_overrides
            .read()
            .await
            .get(&recording.remote_path)
            .copied()
            .unwrap_or(body.len() as u64);

        let chunks = self.chunks_of(&body);

        if self
            .fail_stream_once
            .write()
            .await
            .remove(&recording.remote_path)
        {
            let truncated: Vec<Result<Bytes, DeviceError>> = chunks
                .into_iter()
                .take(1)
                .map(Ok)
                .chain(std::iter::once(Err(DeviceError::Stream(
                    "mock connection reset".to_string(),
                ))))
                .collect();
            return Ok(DownloadStream {
                declared_len: Some(declared_len),
                stream: Box::pin(stream::iter(truncated)),
            });
        }

        if self.stalled.read().await.contains(&recording.remote_path) {
            let head: Vec<Result<Bytes, DeviceError>> =
                chunks.into_iter().take(1).map(Ok).collect();
            return Ok(DownloadStream {
                declared_len: Some(declared_len),
                stream: Box::pin(stream::iter(head).chain(stream::pending())),
            });
        }

        let chunks: Vec<Result<Bytes, DeviceError>> = chunks.into_iter().map(Ok).collect();
        Ok(DownloadStream {
            declared_len: Some(declared_len),
            stream: Box::pin(stream::iter(chunks)),
        })
    }

    async fn delete_recording(&self, recording: &Recording) -> Result<(), DeviceError> {
        if self
            .delete_errors
            .read()
            .await
            .contains(&recording.remote_path)
        {
            return Err(DeviceError::DeleteFailed(recording.remote_path.clone()));
        }
        self.deleted
            .write()
            .await
            .push(recording.remote_path.clone());
        // Mirror a real card: a deleted file disappears from the catalog.
        self.catalog
            .write()
            .await
            .retain(|r| r.remote_path != recording.remote_path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures;

    #[tokio::test]
    async fn test_catalog_and_heartbeat() {
        let cam = MockDashcam::new();
        cam.set_catalog(vec![fixtures::driving_clip("2023_1104_123456_F.MP4")])
            .await;
        cam.set_latency_ms(42).await;

        assert_eq!(cam.heartbeat().await.unwrap(), 42);
        assert_eq!(cam.fetch_catalog().await.unwrap().len(), 1);
        assert_eq!(cam.catalog_calls().await, 1);
    }

    #[tokio::test]
    async fn test_default_body_matches_size() {
        let cam = MockDashcam::new();
        let rec = fixtures::driving_clip("2023_1104_123456_F.MP4");

        let download = cam.open_stream(&rec).await.unwrap();
        assert_eq!(download.declared_len, Some(rec.size_bytes));

        let mut total = 0u64;
        let mut stream = download.stream;
        while let Some(chunk) = stream.next().await {
            total += chunk.unwrap().len() as u64;
        }
        assert_eq!(total, rec.size_bytes);
    }

    #[tokio::test]
    async fn test_stream_fails_once_then_recovers() {
        let cam = MockDashcam::new();
        let rec = fixtures::driving_clip("2023_1104_123456_F.MP4");
        cam.fail_stream_once(&rec.remote_path).await;

        let mut stream = cam.open_stream(&rec).await.unwrap().stream;
        let mut saw_error = false;
        while let Some(chunk) = stream.next().await {
            if chunk.is_err() {
                saw_error = true;
            }
        }
        assert!(saw_error);

        // Second open serves the full payload.
        let mut stream = cam.open_stream(&rec).await.unwrap().stream;
        while let Some(chunk) = stream.next().await {
            chunk.unwrap();
        }
    }

    #[tokio::test]
    async fn test_delete_tracking_and_failure() {
        let cam = MockDashcam::new();
        let keep = fixtures::driving_clip("2023_1104_123456_F.MP4");
        let fail = fixtures::driving_clip("2023_1104_124456_F.MP4");
        cam.set_catalog(vec![keep.clone(), fail.clone()]).await;
        cam.set_delete_fails(&fail.remote_path).await;

        cam.delete_recording(&keep).await.unwrap();
        assert!(cam.delete_recording(&fail).await.is_err());

        assert_eq!(cam.deleted_paths().await, vec![keep.remote_path.clone()]);
        assert_eq!(cam.fetch_catalog().await.unwrap(), vec![fail]);
    }
}
