use super::{types::Config, ConfigError};

/// Widest sequence padding accepted for display labels.
const MAX_LABEL_WIDTH: usize = 9;

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - Label width is between 1 and 9 digits
/// - Allocation retries at least once and its delays are ordered
/// - Event channel has capacity
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    if config.queue.label_width == 0 || config.queue.label_width > MAX_LABEL_WIDTH {
        return Err(ConfigError::ValidationError(format!(
            "queue.label_width must be between 1 and {}",
            MAX_LABEL_WIDTH
        )));
    }

    let allocation = &config.queue.allocation;
    if allocation.max_attempts == 0 {
        return Err(ConfigError::ValidationError(
            "queue.allocation.max_attempts must be at least 1".to_string(),
        ));
    }
    if allocation.base_delay_ms > allocation.max_delay_ms {
        return Err(ConfigError::ValidationError(
            "queue.allocation.base_delay_ms cannot exceed max_delay_ms".to_string(),
        ));
    }

    if config.events.channel_capacity == 0 {
        return Err(ConfigError::ValidationError(
            "events.channel_capacity cannot be 0".to_string(),
        ));
    }

    Ok(())
}
