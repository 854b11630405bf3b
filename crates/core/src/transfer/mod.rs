//! Per-item streaming transfer state machine.

mod session;
mod types;

pub use session::{target_paths, TargetPaths, TransferSession};
pub use types::{TransferError, TransferSnapshot, TransferStatus, PARTIAL_SUFFIX};
