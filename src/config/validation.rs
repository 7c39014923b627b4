use crate::config::types::{
    ApiSourceConfig, CacheConfig, Config, CrawlerConfig, CrawlerSourceConfig, RetryConfig,
    SelectorConfig, UserAgentConfig,
};
use crate::{ConfigError, ConfigResult};
use scraper::Selector;
use std::collections::HashSet;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> ConfigResult<()> {
    validate_user_agent_config(&config.user_agent)?;
    validate_crawler_config(&config.crawler)?;
    validate_retry_config(&config.retry)?;
    validate_cache_config(&config.cache)?;
    validate_source_names(config)?;

    for source in &config.api_sources {
        validate_api_source(source)?;
    }

    for source in &config.crawler_sources {
        validate_crawler_source(source)?;
    }

    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> ConfigResult<()> {
    // Crawler name is matched against robots.txt groups: alphanumeric + hyphens only
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler_name cannot be empty".to_string(),
        ));
    }

    if !config
        .crawler_name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "crawler_name must contain only alphanumeric characters and hyphens, got '{}'",
            config.crawler_name
        )));
    }

    Url::parse(&config.contact_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact_url: {}", e)))?;

    validate_email(&config.contact_email)?;

    Ok(())
}

fn validate_crawler_config(config: &CrawlerConfig) -> ConfigResult<()> {
    if config.min_crawl_delay_ms < 100 {
        return Err(ConfigError::Validation(format!(
            "min_crawl_delay_ms must be >= 100ms, got {}ms",
            config.min_crawl_delay_ms
        )));
    }

    if config.max_results < 1 {
        return Err(ConfigError::Validation(
            "max_results must be >= 1".to_string(),
        ));
    }

    if config.robots_timeout_ms == 0 {
        return Err(ConfigError::Validation(
            "robots_timeout_ms must be > 0".to_string(),
        ));
    }

    Ok(())
}

fn validate_retry_config(config: &RetryConfig) -> ConfigResult<()> {
    if config.max_attempts < 1 || config.max_attempts > 10 {
        return Err(ConfigError::Validation(format!(
            "max_attempts must be between 1 and 10, got {}",
            config.max_attempts
        )));
    }

    Ok(())
}

fn validate_cache_config(config: &CacheConfig) -> ConfigResult<()> {
    if config.price_ttl_secs == 0 || config.search_ttl_secs == 0 {
        return Err(ConfigError::Validation(
            "cache TTLs must be > 0 seconds".to_string(),
        ));
    }

    if let Some(path) = &config.database_path {
        if path.trim().is_empty() {
            return Err(ConfigError::Validation(
                "database_path cannot be empty when set".to_string(),
            ));
        }
    }

    Ok(())
}

/// Source names must be non-empty and unique across both source kinds
fn validate_source_names(config: &Config) -> ConfigResult<()> {
    let mut seen = HashSet::new();

    let names = config
        .api_sources
        .iter()
        .map(|s| s.name.as_str())
        .chain(config.crawler_sources.iter().map(|s| s.name.as_str()));

    for name in names {
        if name.trim().is_empty() {
            return Err(ConfigError::Validation(
                "source name cannot be empty".to_string(),
            ));
        }

        if !seen.insert(name) {
            return Err(ConfigError::Validation(format!(
                "duplicate source name '{}'",
                name
            )));
        }
    }

    Ok(())
}

fn validate_api_source(source: &ApiSourceConfig) -> ConfigResult<()> {
    validate_base_url(&source.name, &source.base_url)?;

    if source.api_key.is_none() && source.api_key_env.is_none() {
        return Err(ConfigError::Validation(format!(
            "API source '{}' needs api-key or api-key-env",
            source.name
        )));
    }

    if source.search_limit < 1 {
        return Err(ConfigError::Validation(format!(
            "API source '{}' search_limit must be >= 1",
            source.name
        )));
    }

    Ok(())
}

fn validate_crawler_source(source: &CrawlerSourceConfig) -> ConfigResult<()> {
    validate_base_url(&source.name, &source.base_url)?;

    if !source.search_path.starts_with('/') {
        return Err(ConfigError::Validation(format!(
            "Crawler source '{}' search_path must start with '/', got '{}'",
            source.name, source.search_path
        )));
    }

    if source.query_param.trim().is_empty() {
        return Err(ConfigError::Validation(format!(
            "Crawler source '{}' query_param cannot be empty",
            source.name
        )));
    }

    if let Some(base) = source.fallback_base_price {
        if !base.is_finite() || base <= 0.0 {
            return Err(ConfigError::Validation(format!(
                "Crawler source '{}' fallback_base_price must be positive",
                source.name
            )));
        }
    }

    validate_selectors(&source.name, &source.selectors)
}

fn validate_selectors(source: &str, selectors: &SelectorConfig) -> ConfigResult<()> {
    let required = [&selectors.item, &selectors.title, &selectors.price];
    let optional = [
        &selectors.image,
        &selectors.link,
        &selectors.condition,
        &selectors.description,
        &selectors.seller,
    ];

    for css in required
        .into_iter()
        .chain(optional.into_iter().flatten())
    {
        Selector::parse(css).map_err(|e| {
            ConfigError::InvalidSelector(format!("'{}' for source '{}': {:?}", css, source, e))
        })?;
    }

    Ok(())
}

fn validate_base_url(source: &str, base_url: &str) -> ConfigResult<()> {
    let url = Url::parse(base_url).map_err(|e| {
        ConfigError::InvalidUrl(format!("Invalid base URL for '{}': {}", source, e))
    })?;

    if url.scheme() != "https" && url.scheme() != "http" {
        return Err(ConfigError::InvalidUrl(format!(
            "Base URL for '{}' must use http(s), got '{}'",
            source, base_url
        )));
    }

    Ok(())
}

/// Basic email validation
fn validate_email(email: &str) -> ConfigResult<()> {
    if email.is_empty() {
        return Err(ConfigError::Validation(
            "contact_email cannot be empty".to_string(),
        ));
    }

    let parts: Vec<&str> = email.split('@').collect();
    if parts.len() != 2 || parts[0].is_empty() || parts[1].is_empty() {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    if !parts[1].contains('.') {
        return Err(ConfigError::Validation(format!(
            "Invalid email domain: '{}'",
            email
        )));
    }

    Ok(())
}
