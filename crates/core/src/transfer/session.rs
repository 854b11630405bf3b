//! Streaming transfer session.
//!
//! One tokio task owns the end-to-end copy of a single recording and
//! publishes immutable progress snapshots over a broadcast channel. Multiple
//! observers may attach to the same in-flight session; observers attaching
//! late only see future snapshots, except the terminal one, which is latched
//! in a watch channel and delivered to everyone.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Datelike, Utc};
use filetime::FileTime;
use futures::StreamExt;
use tokio::fs::{self, File};
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::sync::{broadcast, watch};
use tracing::{debug, warn};

use crate::catalog::Recording;
use crate::device::Dashcam;

use super::types::{TransferError, TransferSnapshot, TransferStatus, PARTIAL_SUFFIX};

/// Plenty for one snapshot per chunk with a slow observer; laggards skip
/// intermediate progress, never the terminal snapshot.
const SNAPSHOT_CHANNEL_CAPACITY: usize = 64;

/// Local paths a recording is transferred to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetPaths {
    /// Directory the file lands in.
    pub dir: PathBuf,
    /// In-flight partial file.
    pub partial: PathBuf,
    /// Finalized file.
    pub final_path: PathBuf,
}

/// Computes where a recording lands locally: locked footage is segregated
/// under `Locked/`, then by recording year and month, keeping the original
/// file name.
pub fn target_paths(download_dir: &Path, recording: &Recording) -> TargetPaths {
    let mut dir = download_dir.to_path_buf();
    if recording.locked {
        dir.push("Locked");
    }
    dir.push(format!("{}", recording.start.year()));
    dir.push(format!("{:02}", recording.start.month()));

    let final_path = dir.join(&recording.name);
    let partial = dir.join(format!("{}{}", recording.name, PARTIAL_SUFFIX));

    TargetPaths {
        dir,
        partial,
        final_path,
    }
}

/// Handle to one in-flight transfer.
pub struct TransferSession {
    recording: Recording,
    snapshot_tx: broadcast::Sender<TransferSnapshot>,
    terminal_rx: watch::Receiver<Option<TransferSnapshot>>,
    cancel_tx: broadcast::Sender<()>,
}

impl TransferSession {
    /// Spawns the transfer task for `recording` and returns its handle.
    pub fn start(
        device: Arc<dyn Dashcam>,
        recording: Recording,
        download_dir: impl Into<PathBuf>,
    ) -> Self {
        let (snapshot_tx, _) = broadcast::channel(SNAPSHOT_CHANNEL_CAPACITY);
        let (terminal_tx, terminal_rx) = watch::channel(None);
        let (cancel_tx, cancel_rx) = broadcast::channel(1);

        let task = SessionTask {
            device,
            snapshot: TransferSnapshot::preparing(&recording),
            recording: recording.clone(),
            download_dir: download_dir.into(),
            snapshot_tx: snapshot_tx.clone(),
            cancel_rx,
        };
        tokio::spawn(task.run(terminal_tx));

        Self {
            recording,
            snapshot_tx,
            terminal_rx,
            cancel_tx,
        }
    }

    /// The recording this session is transferring.
    pub fn recording(&self) -> &Recording {
        &self.recording
    }

    /// Attaches a progress observer. Only snapshots published after the call
    /// are received; use [`TransferSession::wait`] for the guaranteed
    /// terminal snapshot.
    pub fn subscribe(&self) -> broadcast::Receiver<TransferSnapshot> {
        self.snapshot_tx.subscribe()
    }

    /// Aborts the in-flight transfer. The session ends with `Errored`;
    /// the partial file is left on disk like any other failure.
    pub fn cancel(&self) {
        let _ = self.cancel_tx.send(());
    }

    /// Waits for the terminal snapshot. Resolves for every caller no matter
    /// how late it attaches.
    pub async fn wait(&self) -> TransferSnapshot {
        let mut rx = self.terminal_rx.clone();
        loop {
            if let Some(snapshot) = rx.borrow_and_update().clone() {
                return snapshot;
            }
            if rx.changed().await.is_err() {
                // The task ended without publishing; treat as failed.
                let mut snapshot = TransferSnapshot::preparing(&self.recording);
                snapshot.status = TransferStatus::Errored;
                snapshot.error = Some("transfer task ended unexpectedly".to_string());
                return snapshot;
            }
        }
    }
}

struct SessionTask {
    device: Arc<dyn Dashcam>,
    recording: Recording,
    download_dir: PathBuf,
    snapshot: TransferSnapshot,
    snapshot_tx: broadcast::Sender<TransferSnapshot>,
    cancel_rx: broadcast::Receiver<()>,
}

impl SessionTask {
    async fn run(mut self, terminal_tx: watch::Sender<Option<TransferSnapshot>>) {
        match self.execute().await {
            Ok(()) => {
                debug!(
                    path = %self.snapshot.remote_path,
                    bytes = self.snapshot.bytes_received,
                    "transfer complete"
                );
            }
            Err(err) => {
                warn!(path = %self.snapshot.remote_path, error = %err, "transfer failed");
                self.snapshot.status = TransferStatus::Errored;
                self.snapshot.error = Some(err.to_string());
                self.publish();
            }
        }
        let _ = terminal_tx.send(Some(self.snapshot.clone()));
    }

    async fn execute(&mut self) -> Result<(), TransferError> {
        let paths = target_paths(&self.download_dir, &self.recording);
        self.snapshot.local_path = paths.partial.clone();
        self.publish();

        fs::create_dir_all(&paths.dir).await?;

        self.set_status(TransferStatus::Requested);
        let download = tokio::select! {
            _ = self.cancel_rx.recv() => return Err(TransferError::Cancelled),
            result = self.device.open_stream(&self.recording) => result?,
        };

        // The declared length must match the catalog exactly, otherwise the
        // catalog entry is stale or corrupt. Checked before the partial file
        // is even created, so nothing is written on mismatch.
        if let Some(declared) = download.declared_len {
            if declared != self.recording.size_bytes {
                return Err(TransferError::SizeMismatch {
                    declared,
                    expected: self.recording.size_bytes,
                });
            }
        }

        let file = File::create(&paths.partial).await?;
        // Stamp the partial with the recording start so even an interrupted
        // file sorts chronologically in the local library.
        set_mtime(&paths.partial, self.recording.start)?;
        self.set_status(TransferStatus::LocalFileCreated);

        let mut writer = BufWriter::new(file);
        let mut stream = download.stream;
        loop {
            let chunk = tokio::select! {
                _ = self.cancel_rx.recv() => return Err(TransferError::Cancelled),
                chunk = stream.next() => chunk,
            };
            match chunk {
                Some(Ok(chunk)) => {
                    writer.write_all(&chunk).await?;
                    self.snapshot.status = TransferStatus::Receiving;
                    self.snapshot.bytes_received += chunk.len() as u64;
                    self.snapshot.last_chunk_bytes = chunk.len() as u64;
                    self.snapshot.last_chunk_at = Some(Utc::now());
                    self.publish();
                }
                Some(Err(err)) => return Err(err.into()),
                None => break,
            }
        }
        writer.flush().await?;
        drop(writer);

        if self.snapshot.bytes_received != self.recording.size_bytes {
            return Err(TransferError::Interrupted {
                received: self.snapshot.bytes_received,
                expected: self.recording.size_bytes,
            });
        }

        // Final timestamps reflect the recording, not the transfer: mtime is
        // the recording end, atime is the time of the copy.
        filetime::set_file_times(
            &paths.partial,
            FileTime::now(),
            file_time(self.recording.end),
        )?;
        fs::rename(&paths.partial, &paths.final_path).await?;

        self.snapshot.local_path = paths.final_path;
        self.set_status(TransferStatus::LocalFileClosed);
        Ok(())
    }

    fn set_status(&mut self, status: TransferStatus) {
        self.snapshot.status = status;
        self.publish();
    }

    fn publish(&self) {
        // Nobody listening is fine; the terminal snapshot goes through the
        // watch channel regardless.
        let _ = self.snapshot_tx.send(self.snapshot.clone());
    }
}

fn file_time(when: DateTime<Utc>) -> FileTime {
    FileTime::from_unix_time(when.timestamp(), when.timestamp_subsec_nanos())
}

fn set_mtime(path: &Path, when: DateTime<Utc>) -> Result<(), std::io::Error> {
    filetime::set_file_mtime(path, file_time(when))
}
