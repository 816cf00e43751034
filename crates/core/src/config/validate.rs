use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - Carrier base URL is set, and a postage card accompanies credentials
/// - Print queue allows at least one attempt
/// - Label polling has at least one step
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    if config.carrier.base_url.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "carrier.base_url cannot be empty".to_string(),
        ));
    }

    if config.carrier.has_credentials() && config.carrier.postage_card.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "carrier.postage_card is required when credentials are set".to_string(),
        ));
    }

    if config.print_queue.max_attempts == 0 {
        return Err(ConfigError::ValidationError(
            "print_queue.max_attempts must be at least 1".to_string(),
        ));
    }

    if config.labels.poll_delays_ms.is_empty() {
        return Err(ConfigError::ValidationError(
            "labels.poll_delays_ms needs at least one entry".to_string(),
        ));
    }

    Ok(())
}
