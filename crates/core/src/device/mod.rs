//! Dashcam device access.
//!
//! The offloader consumes devices through the [`Dashcam`] trait; [`ViofoCam`]
//! is the production implementation speaking the Viofo HTTP command protocol.

mod traits;
mod types;
mod viofo;

pub use traits::Dashcam;
pub use types::{ByteStream, DeviceError, DeviceHealth, DownloadStream};
pub use viofo::ViofoCam;
