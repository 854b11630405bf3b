//! Testing utilities and mock implementations for E2E tests.
//!
//! Provides a mock device implementation and recording fixtures, allowing
//! full offload cycles to run against a scripted card instead of real
//! hardware.

mod mock_dashcam;

pub use mock_dashcam::MockDashcam;

/// Test fixtures and helper functions.
pub mod fixtures {
    use chrono::{DateTime, Duration, TimeZone, Utc};

    use crate::catalog::{Lens, Recording, RecordingMode};

    /// Parse the recording start from a `YYYY_MMDD_HHMMSS` file name.
    fn start_from_name(name: &str) -> DateTime<Utc> {
        let digits: Vec<u32> = [
            &name[0..4],
            &name[5..7],
            &name[7..9],
            &name[10..12],
            &name[12..14],
            &name[14..16],
        ]
        .iter()
        .map(|part| part.parse().unwrap())
        .collect();
        Utc.with_ymd_and_hms(
            digits[0] as i32,
            digits[1],
            digits[2],
            digits[3],
            digits[4],
            digits[5],
        )
        .unwrap()
    }

    /// Create a finished one-minute recording with reasonable defaults.
    ///
    /// Start time and lens are derived from the file name, which must follow
    /// the `YYYY_MMDD_HHMMSS_L.MP4` convention.
    pub fn clip(name: &str) -> Recording {
        let start = start_from_name(name);
        let lens = match name.trim_end_matches(".MP4").chars().last() {
            Some('R') => Lens::Rear,
            Some('I') => Lens::Interior,
            _ => Lens::Front,
        };
        Recording {
            remote_path: format!("A:\\DCIM\\Movie\\{}", name),
            name: name.to_string(),
            size_bytes: 2048,
            start,
            end: start + Duration::seconds(60),
            lens,
            mode: RecordingMode::Normal,
            locked: false,
            finished: true,
        }
    }

    /// An ordinary driving clip.
    pub fn driving_clip(name: &str) -> Recording {
        clip(name)
    }

    /// A locked (write-protected) clip, stored under the device `RO` folder.
    pub fn locked_clip(name: &str) -> Recording {
        let mut rec = clip(name);
        rec.remote_path = format!("A:\\DCIM\\Movie\\RO\\{}", name);
        rec.locked = true;
        rec
    }

    /// A parking-mode clip.
    pub fn parking_clip(name: &str) -> Recording {
        let mut rec = clip(name);
        rec.mode = RecordingMode::Parking;
        rec
    }

    /// A clip the device is still writing to.
    pub fn unfinished_clip(name: &str) -> Recording {
        let mut rec = clip(name);
        rec.finished = false;
        rec
    }

}
