//! Supervisory offload loop: health gating, queue construction, sequential
//! draining with rebuild-on-failure.

mod config;
mod runner;
mod types;

pub use config::OffloadConfig;
pub use runner::Offloader;
pub use types::{CycleState, OffloadError, OffloadReport, OffloadStatus};
