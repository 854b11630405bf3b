//! Catalog types describing the recordings present on the dashcam.

mod types;

pub use types::{Lens, Recording, RecordingMode};
