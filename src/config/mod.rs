//! Configuration module for Price-Ripple
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use price_ripple::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("config.toml")).unwrap();
//! println!("Retry attempts per source: {}", config.retry.max_attempts);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    ApiSourceConfig, CacheConfig, Config, CrawlerConfig, CrawlerSourceConfig, HttpConfig,
    RetryConfig, SelectorConfig, UserAgentConfig,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
