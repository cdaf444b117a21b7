//! Configuration validation.
//!
//! Validates configuration and collects all errors before returning.

use crate::config::types::{BackendConfig, BloomConfig, RateLimitConfig};
use crate::error::ConfigError;

/// Upper bound on retrieval workers.
const MAX_SERVICE_THREADS: usize = 1024;

/// Validate the entire backend configuration.
pub fn validate_config(config: &BackendConfig) -> Result<(), ConfigError> {
    let mut errors = Vec::new();

    validate_chain_config(config, &mut errors);
    validate_bloom_config(&config.bloom, &mut errors);
    for (name, limit) in &config.rate_limits {
        validate_rate_limit(name, limit, &mut errors);
    }
    if config.cache.block_cache_size == 0 {
        errors.push("cache.block_cache_size must be greater than 0".to_string());
    }
    if config.cache.receipt_cache_size == 0 {
        errors.push("cache.receipt_cache_size must be greater than 0".to_string());
    }
    if config.export.workers == Some(0) {
        errors.push("export.workers must be greater than 0 when set".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationFailed(errors))
    }
}

fn validate_chain_config(config: &BackendConfig, errors: &mut Vec<String>) {
    if config.chain.start_height < 0 {
        errors.push("chain.start_height cannot be negative".to_string());
    }
    if config.chain.block_gas_limit == 0 {
        errors.push("chain.block_gas_limit must be greater than 0".to_string());
    }
}

fn validate_bloom_config(config: &BloomConfig, errors: &mut Vec<String>) {
    if config.section_size == 0 || config.section_size % 8 != 0 {
        errors.push(format!(
            "bloom.section_size must be a positive multiple of 8, got {}",
            config.section_size
        ));
    }
    if config.service_threads == 0 || config.service_threads > MAX_SERVICE_THREADS {
        errors.push(format!(
            "bloom.service_threads must be between 1 and {MAX_SERVICE_THREADS}"
        ));
    }
    if config.filter_threads == 0 {
        errors.push("bloom.filter_threads must be greater than 0".to_string());
    }
    if config.retrieval_batch == 0 {
        errors.push("bloom.retrieval_batch must be greater than 0".to_string());
    }
}

fn validate_rate_limit(name: &str, limit: &RateLimitConfig, errors: &mut Vec<String>) {
    if name.is_empty() {
        errors.push("rate_limits keys cannot be empty".to_string());
    }
    if !limit.per_second.is_finite() || limit.per_second <= 0.0 {
        errors.push(format!("rate_limits.{name}.per_second must be positive"));
    }
    if limit.burst == Some(0) {
        errors.push(format!("rate_limits.{name}.burst must be greater than 0"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::types::RateLimitConfig;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&BackendConfig::default()).is_ok());
    }

    #[test]
    fn test_collects_every_error() {
        let mut config = BackendConfig::default();
        config.chain.start_height = -1;
        config.bloom.section_size = 100;
        config.bloom.service_threads = 0;
        config.rate_limits.insert(
            "eth_getLogs".to_string(),
            RateLimitConfig {
                per_second: 0.0,
                burst: Some(0),
            },
        );

        match validate_config(&config).unwrap_err() {
            ConfigError::ValidationFailed(errors) => {
                assert_eq!(errors.len(), 5);
                assert!(errors.iter().any(|e| e.contains("section_size")));
                assert!(errors.iter().any(|e| e.contains("eth_getLogs.burst")));
            }
            e => panic!("Expected ValidationFailed, got {:?}", e),
        }
    }
}
