use super::{types::Config, ConfigError};

/// Validate configuration beyond what serde enforces.
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.device.address.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "device.address cannot be empty".to_string(),
        ));
    }

    if config.storage.download_dir.as_os_str().is_empty() {
        return Err(ConfigError::ValidationError(
            "storage.download_dir cannot be empty".to_string(),
        ));
    }

    if config.offloader.latency_threshold_ms == 0 {
        return Err(ConfigError::ValidationError(
            "offloader.latency_threshold_ms cannot be 0".to_string(),
        ));
    }

    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_default_config() {
        assert!(validate_config(&Config::default()).is_ok());
    }

    #[test]
    fn test_validate_empty_address_fails() {
        let mut config = Config::default();
        config.device.address = "  ".to_string();
        let err = validate_config(&config).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn test_validate_zero_threshold_fails() {
        let mut config = Config::default();
        config.offloader.latency_threshold_ms = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_port_zero_fails() {
        let mut config = Config::default();
        config.server.port = 0;
        assert!(validate_config(&config).is_err());
    }
}
