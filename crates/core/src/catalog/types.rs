//! Types for the device catalog.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Camera lens that produced a recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lens {
    /// Forward-facing camera.
    Front,
    /// Rear camera.
    Rear,
    /// Cabin camera.
    Interior,
}

impl Lens {
    /// Returns the string representation for API responses.
    pub fn as_str(&self) -> &'static str {
        match self {
            Lens::Front => "front",
            Lens::Rear => "rear",
            Lens::Interior => "interior",
        }
    }

    /// Front-lens footage is preferred when ordering transfers.
    pub fn is_front(&self) -> bool {
        matches!(self, Lens::Front)
    }
}

/// Recording mode the device was in when the file was written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordingMode {
    /// Ordinary driving footage.
    Normal,
    /// Motion/impact triggered footage recorded while parked.
    Parking,
}

impl RecordingMode {
    /// Returns the string representation for API responses.
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordingMode::Normal => "normal",
            RecordingMode::Parking => "parking",
        }
    }
}

/// One file in the device catalog.
///
/// Immutable once fetched; a fresh catalog is pulled from the device on every
/// queue rebuild, entries are never patched in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recording {
    /// Device-side path, e.g. `A:\DCIM\Movie\RO\2023_1104_123456_F.MP4`.
    /// Also the key for the active-transfer table.
    pub remote_path: String,
    /// Original file name, reused for the local copy.
    pub name: String,
    /// Size in bytes as reported by the catalog.
    pub size_bytes: u64,
    /// When the recording started.
    pub start: DateTime<Utc>,
    /// When the recording ended.
    pub end: DateTime<Utc>,
    /// Lens that produced the file.
    pub lens: Lens,
    /// Driving or parking footage.
    pub mode: RecordingMode,
    /// Protected from overwrite on the device (evidence footage).
    pub locked: bool,
    /// The device is no longer writing to this file.
    pub finished: bool,
}

impl Recording {
    /// Recorded duration.
    pub fn duration(&self) -> Duration {
        self.end - self.start
    }
}
