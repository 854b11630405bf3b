use std::net::IpAddr;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::orchestrator::OffloadConfig;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    FileNotFound(String),

    #[error("failed to parse config: {0}")]
    ParseError(String),

    #[error("invalid config: {0}")]
    ValidationError(String),
}

/// Root configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub device: DeviceConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub offloader: OffloadConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            device: DeviceConfig::default(),
            storage: StorageConfig::default(),
            offloader: OffloadConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

/// Dashcam device configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Camera address, host or host:port.
    #[serde(default = "default_address")]
    pub address: String,
    /// Timeout for catalog/delete/free-space commands.
    #[serde(default = "default_command_timeout")]
    pub command_timeout_secs: u64,
    /// Heartbeat timeout; also bounds how long a health check can take.
    #[serde(default = "default_heartbeat_timeout")]
    pub heartbeat_timeout_ms: u64,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            command_timeout_secs: default_command_timeout(),
            heartbeat_timeout_ms: default_heartbeat_timeout(),
        }
    }
}

fn default_address() -> String {
    // Factory default of Viofo cameras in AP mode.
    "192.168.1.254".to_string()
}

fn default_command_timeout() -> u64 {
    60
}

fn default_heartbeat_timeout() -> u64 {
    500
}

/// Local storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Root of the local footage library.
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            download_dir: default_download_dir(),
        }
    }
}

fn default_download_dir() -> PathBuf {
    PathBuf::from("recordings")
}

/// Status API server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::from([0, 0, 0, 0])
}

fn default_port() -> u16 {
    8080
}
