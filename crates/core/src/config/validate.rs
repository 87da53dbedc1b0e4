use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - At least one job may run at a time
/// - Sweep interval is at least one second
/// - Retention comfortably exceeds the tool timeout, so a file that is still
///   being written can never look old enough to sweep
/// - Source pattern compiles
/// - Public path is absolute
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(invalid("server.port cannot be 0"));
    }

    if config.pipeline.max_concurrent_jobs == 0 {
        return Err(invalid("pipeline.max_concurrent_jobs must be at least 1"));
    }

    if config.sweeper.interval_secs == 0 {
        return Err(invalid("sweeper.interval_secs must be at least 1"));
    }

    let min_retention = config.tools.timeout_secs.saturating_mul(2);
    if config.sweeper.retention_secs <= min_retention {
        return Err(ConfigError::ValidationError(format!(
            "sweeper.retention_secs ({}) must exceed twice tools.timeout_secs ({})",
            config.sweeper.retention_secs, min_retention
        )));
    }

    if let Err(e) = regex_lite::Regex::new(&config.pipeline.source_pattern) {
        return Err(ConfigError::ValidationError(format!(
            "pipeline.source_pattern is not a valid regex: {}",
            e
        )));
    }

    if !config.pipeline.public_path.starts_with('/') {
        return Err(invalid("pipeline.public_path must start with '/'"));
    }

    Ok(())
}

fn invalid(message: &str) -> ConfigError {
    ConfigError::ValidationError(message.to_string())
}
