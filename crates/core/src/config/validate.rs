use super::{types::Config, ConfigError};

/// Nickname length bounds accepted by the chat network.
pub const NICKNAME_LENGTH: std::ops::RangeInclusive<usize> = 4..=12;

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - Nickname is 4 to 12 characters
/// - Channel and sentinel are not empty
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    // Server validation
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    // Chat validation
    let nickname_len = config.chat.nickname.trim().chars().count();
    if !NICKNAME_LENGTH.contains(&nickname_len) {
        return Err(ConfigError::ValidationError(format!(
            "chat.nickname must be between {} and {} characters",
            NICKNAME_LENGTH.start(),
            NICKNAME_LENGTH.end()
        )));
    }
    if config.chat.channel.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "chat.channel cannot be empty".to_string(),
        ));
    }

    // Search validation
    if config.search.sentinel.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "search.sentinel cannot be empty".to_string(),
        ));
    }

    Ok(())
}
