//! Offload orchestrator implementation.
//!
//! Drives one offload cycle at a time: health-gate, fetch and classify the
//! catalog, then drain the queue sequentially through transfer sessions,
//! deleting each remote file only after its local copy is finalized. Any
//! item failure discards the queue and forces a full rebuild so priorities
//! are re-established against the current catalog.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{broadcast, RwLock};
use tracing::{error, info, warn};

use crate::catalog::Recording;
use crate::classifier::{standard_buckets, BucketTally};
use crate::device::{Dashcam, DeviceHealth};
use crate::queue::TransferQueue;
use crate::transfer::{TransferSession, TransferSnapshot, TransferStatus};

use super::config::OffloadConfig;
use super::types::{CycleState, OffloadError, OffloadReport, OffloadStatus};

/// The offload orchestrator.
///
/// Collaborators are injected at construction; the orchestrator never
/// reaches for ambient instances. `run_cycle` must not be invoked
/// re-entrantly; one outer control loop owns it.
pub struct Offloader {
    config: OffloadConfig,
    device: Arc<dyn Dashcam>,
    download_dir: PathBuf,

    // Runtime state. The queue and active-transfer table have a single
    // writer (the cycle in flight); the status reporter reads concurrently.
    queue: RwLock<TransferQueue<Recording>>,
    active: RwLock<HashMap<String, TransferSnapshot>>,
    bucket_tallies: RwLock<Vec<BucketTally>>,
    last_health: RwLock<Option<DeviceHealth>>,
    cycle_state: RwLock<CycleState>,
    busy: AtomicBool,
}

impl Offloader {
    /// Creates an offloader downloading into `download_dir`.
    pub fn new(config: OffloadConfig, download_dir: PathBuf, device: Arc<dyn Dashcam>) -> Self {
        Self {
            config,
            device,
            download_dir,
            queue: RwLock::new(TransferQueue::new()),
            active: RwLock::new(HashMap::new()),
            bucket_tallies: RwLock::new(Vec::new()),
            last_health: RwLock::new(None),
            cycle_state: RwLock::new(CycleState::Idle),
            busy: AtomicBool::new(false),
        }
    }

    /// Effective configuration.
    pub fn config(&self) -> &OffloadConfig {
        &self.config
    }

    /// Runs one full offload cycle: build the queue, drain it, rebuild on
    /// failure. Returns once the queue is empty or the cycle failed.
    ///
    /// Build failures (`HealthDegraded`, `CatalogFetch`, `HealthCheck`) are
    /// retryable. A rebuild failure after an aborted drain is returned as
    /// `FatalOffline`. Item failures that exhaust the rebuild budget are
    /// returned as-is.
    pub async fn run_cycle(&self) -> Result<OffloadReport, OffloadError> {
        if self.busy.swap(true, Ordering::SeqCst) {
            return Err(OffloadError::AlreadyRunning);
        }
        let result = self.cycle().await;
        self.busy.store(false, Ordering::SeqCst);
        result
    }

    async fn cycle(&self) -> Result<OffloadReport, OffloadError> {
        let mut report = OffloadReport::default();

        self.set_state(CycleState::BuildingQueue).await;
        if let Err(err) = self.build_queue().await {
            self.set_state(CycleState::Idle).await;
            return Err(err);
        }

        loop {
            self.set_state(CycleState::Draining).await;
            let drain_result = self.drain(&mut report).await;

            let item_err = match drain_result {
                Ok(()) => {
                    info!(
                        transferred = report.transferred,
                        bytes = report.bytes_transferred,
                        rebuilds = report.rebuilds,
                        "offload cycle complete"
                    );
                    self.set_state(CycleState::Idle).await;
                    return Ok(report);
                }
                Err(err) => err,
            };

            if report.rebuilds >= self.config.max_rebuilds_per_cycle {
                warn!(
                    rebuilds = report.rebuilds,
                    error = %item_err,
                    "rebuild budget exhausted, giving the item failure back to the caller"
                );
                self.set_state(CycleState::Idle).await;
                return Err(item_err);
            }

            warn!(error = %item_err, "drain aborted, rebuilding queue");
            report.rebuilds += 1;
            self.set_state(CycleState::RebuildAfterFailure).await;
            if let Err(rebuild_err) = self.build_queue().await {
                error!(error = %rebuild_err, "rebuild after failure did not succeed");
                self.set_state(CycleState::FatalOffline).await;
                return Err(OffloadError::FatalOffline(Box::new(rebuild_err)));
            }
        }
    }

    /// Build phase: health gate, free-space log, catalog fetch, classify.
    /// Replaces the queue wholesale on success.
    async fn build_queue(&self) -> Result<(), OffloadError> {
        let latency_ms = self
            .device
            .heartbeat()
            .await
            .map_err(OffloadError::HealthCheck)?;
        *self.last_health.write().await = Some(DeviceHealth {
            latency_ms,
            checked_at: Utc::now(),
        });

        if latency_ms > self.config.latency_threshold_ms {
            return Err(OffloadError::HealthDegraded {
                latency_ms,
                threshold_ms: self.config.latency_threshold_ms,
            });
        }

        // Informational only; nothing is enforced from it.
        match self.device.free_space().await {
            Ok(free) => info!(latency_ms, free_space = %free, "rebuilding transfer queue"),
            Err(err) => warn!(latency_ms, error = %err, "free space query failed"),
        }

        let catalog = self
            .device
            .fetch_catalog()
            .await
            .map_err(OffloadError::CatalogFetch)?;

        let total = catalog.len();
        let finished: Vec<Recording> = catalog.into_iter().filter(|r| r.finished).collect();

        let classifier = standard_buckets(self.config.include_parking);
        let classification = classifier.classify(&finished);
        info!(
            queued = classification.queue.len(),
            finished = finished.len(),
            listed = total,
            buckets = %classification.summary(),
            "transfer queue rebuilt"
        );

        *self.bucket_tallies.write().await = classification.tallies;
        *self.queue.write().await = classification.queue;
        Ok(())
    }

    /// Drain phase: transfer queue items one at a time, head first.
    async fn drain(&self, report: &mut OffloadReport) -> Result<(), OffloadError> {
        loop {
            let next = self.queue.write().await.dequeue();
            let Some(recording) = next else {
                return Ok(());
            };

            info!(
                path = %recording.remote_path,
                size = recording.size_bytes,
                locked = recording.locked,
                "starting transfer"
            );
            let bytes = self.process_one(recording).await?;
            report.transferred += 1;
            report.bytes_transferred += bytes;
        }
    }

    /// Transfers one recording and deletes it from the device on success.
    /// Returns the payload byte count.
    async fn process_one(&self, recording: Recording) -> Result<u64, OffloadError> {
        let remote_path = recording.remote_path.clone();

        let session = TransferSession::start(
            Arc::clone(&self.device),
            recording.clone(),
            self.download_dir.clone(),
        );
        let mut progress = session.subscribe();

        self.active
            .write()
            .await
            .insert(remote_path.clone(), TransferSnapshot::preparing(&recording));

        // Mirror every snapshot into the active-transfer table so the status
        // reporter always sees a consistent, current view. The session task
        // may publish everything, terminal snapshot included, before the
        // subscription above attaches; the latched terminal covers that
        // window, so the loop races both sources.
        let terminal = loop {
            tokio::select! {
                received = progress.recv() => match received {
                    Ok(snapshot) => {
                        let is_terminal = snapshot.status.is_terminal();
                        self.active
                            .write()
                            .await
                            .insert(remote_path.clone(), snapshot.clone());
                        if is_terminal {
                            break snapshot;
                        }
                    }
                    // Skipped progress snapshots are fine, the terminal one is
                    // latched separately.
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => break session.wait().await,
                },
                terminal = session.wait() => break terminal,
            }
        };

        let result = match terminal.status {
            TransferStatus::LocalFileClosed => {
                match self.device.delete_recording(&recording).await {
                    Ok(()) => {
                        info!(path = %remote_path, "remote recording deleted");
                        Ok(terminal.bytes_received)
                    }
                    Err(err) => {
                        // The local copy is good but the device still holds
                        // the file: next cycle will download it again.
                        error!(
                            path = %remote_path,
                            error = %err,
                            "remote delete failed after successful copy, duplicate download likely"
                        );
                        Err(OffloadError::Delete {
                            remote_path: remote_path.clone(),
                            source: err,
                        })
                    }
                }
            }
            _ => Err(OffloadError::Transfer {
                remote_path: remote_path.clone(),
                reason: terminal
                    .error
                    .unwrap_or_else(|| "session ended without error detail".to_string()),
            }),
        };

        self.active.write().await.remove(&remote_path);
        result
    }

    /// Read-only snapshot for the status reporter.
    pub async fn status(&self) -> OffloadStatus {
        let queue = self.queue.read().await;
        OffloadStatus {
            cycle_state: *self.cycle_state.read().await,
            queue_len: queue.len(),
            queue_preview: queue.preview(self.config.queue_preview_len),
            active_transfers: self.active.read().await.values().cloned().collect(),
            bucket_tallies: self.bucket_tallies.read().await.clone(),
            last_health: *self.last_health.read().await,
        }
    }

    async fn set_state(&self, state: CycleState) {
        *self.cycle_state.write().await = state;
    }
}
