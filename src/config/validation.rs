use crate::config::types::{
    ApiConfig, Config, CrawlerConfig, DriverConfig, GenreConfig, MemoConfig, OutputConfig,
};
use crate::ConfigError;
use std::collections::HashSet;
use url::Url;

/// Largest page the search endpoint accepts
const MAX_SEARCH_PAGE_SIZE: u32 = 50;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_api_config(&config.api)?;
    validate_memo_config(&config.memo)?;
    validate_output_config(&config.output)?;
    validate_driver_config(&config.driver)?;
    validate_genre_seeds(&config.genres)?;
    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.search_page_size < 1 || config.search_page_size > MAX_SEARCH_PAGE_SIZE {
        return Err(ConfigError::Validation(format!(
            "search_page_size must be between 1 and {}, got {}",
            MAX_SEARCH_PAGE_SIZE, config.search_page_size
        )));
    }

    if config.max_artist_retries < 1 {
        return Err(ConfigError::Validation(format!(
            "max_artist_retries must be >= 1, got {}",
            config.max_artist_retries
        )));
    }

    Ok(())
}

/// Validates the remote API configuration
fn validate_api_config(config: &ApiConfig) -> Result<(), ConfigError> {
    let url = Url::parse(&config.base_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid base_url: {}", e)))?;

    if url.scheme() != "https" && url.scheme() != "http" {
        return Err(ConfigError::InvalidUrl(format!(
            "base_url must use http or https, got '{}'",
            url.scheme()
        )));
    }

    if config.timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "timeout_secs must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Longest memo key lifetime accepted (ten years)
const MAX_MEMO_TTL_SECS: u64 = 10 * 365 * 24 * 60 * 60;

/// Validates memo configuration
fn validate_memo_config(config: &MemoConfig) -> Result<(), ConfigError> {
    if config.namespace.trim().is_empty() {
        return Err(ConfigError::Validation(
            "memo namespace cannot be empty".to_string(),
        ));
    }

    if config.ttl_seconds > MAX_MEMO_TTL_SECS {
        return Err(ConfigError::Validation(format!(
            "memo ttl_seconds must be <= {}, got {}",
            MAX_MEMO_TTL_SECS, config.ttl_seconds
        )));
    }

    if let Some(connection) = &config.connection {
        if connection.trim().is_empty() {
            return Err(ConfigError::Validation(
                "memo connection cannot be blank; omit it to use process memory".to_string(),
            ));
        }
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database_path cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates driver configuration
fn validate_driver_config(config: &DriverConfig) -> Result<(), ConfigError> {
    if !config.loop_sleep_secs.is_finite() || config.loop_sleep_secs < 0.0 {
        return Err(ConfigError::Validation(format!(
            "loop_sleep_secs must be >= 0, got {}",
            config.loop_sleep_secs
        )));
    }

    if !config.idle_backoff_multiplier.is_finite() || config.idle_backoff_multiplier < 1.0 {
        return Err(ConfigError::Validation(format!(
            "idle_backoff_multiplier must be >= 1.0, got {}",
            config.idle_backoff_multiplier
        )));
    }

    if config.idle_max_sleep_secs < config.loop_sleep_secs {
        return Err(ConfigError::Validation(format!(
            "idle_max_sleep_secs ({}) must be >= loop_sleep_secs ({})",
            config.idle_max_sleep_secs, config.loop_sleep_secs
        )));
    }

    Ok(())
}

/// Validates the genre seed list: non-empty, no blanks, no duplicates
fn validate_genre_seeds(config: &GenreConfig) -> Result<(), ConfigError> {
    if config.seeds.is_empty() {
        return Err(ConfigError::Validation(
            "at least one genre seed is required".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    for seed in &config.seeds {
        if seed.trim().is_empty() {
            return Err(ConfigError::Validation(
                "genre seeds cannot be blank".to_string(),
            ));
        }

        if !seen.insert(seed.as_str()) {
            return Err(ConfigError::Validation(format!(
                "duplicate genre seed '{}'",
                seed
            )));
        }
    }

    Ok(())
}
