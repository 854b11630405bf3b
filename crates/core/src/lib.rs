pub mod catalog;
pub mod classifier;
pub mod config;
pub mod device;
pub mod orchestrator;
pub mod queue;
pub mod testing;
pub mod transfer;

pub use catalog::{Lens, Recording, RecordingMode};
pub use classifier::{
    standard_buckets, Bucket, BucketTally, Classification, Classifier, ClassifierError,
};
pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, DeviceConfig,
    ServerConfig, StorageConfig,
};
pub use device::{Dashcam, DeviceError, DeviceHealth, DownloadStream, ViofoCam};
pub use orchestrator::{
    CycleState, OffloadConfig, OffloadError, OffloadReport, OffloadStatus, Offloader,
};
pub use queue::TransferQueue;
pub use transfer::{TransferSession, TransferSnapshot, TransferStatus};
