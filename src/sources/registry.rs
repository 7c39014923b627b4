//! Name-keyed collection of active price sources

use crate::config::Config;
use crate::sources::{ApiSource, CrawlerSource, PriceSource};
use crate::Result;
use reqwest::Client;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Active sources, in registration order
#[derive(Default)]
pub struct SourceRegistry {
    order: Vec<String>,
    sources: HashMap<String, Arc<dyn PriceSource>>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds every source the configuration makes active
    ///
    /// API sources whose credential cannot be resolved are left out (and
    /// logged); crawler sources are always active.
    ///
    /// # Arguments
    ///
    /// * `config` - Validated configuration
    /// * `client` - HTTP client shared by all sources
    pub fn from_config(config: &Config, client: Client) -> Result<Self> {
        let mut registry = Self::new();

        for api in &config.api_sources {
            match api.resolve_api_key() {
                Some(key) => {
                    registry.register(Arc::new(ApiSource::new(api, key, client.clone())?));
                }
                None => {
                    tracing::info!("Source {} inactive: no API key configured", api.name);
                }
            }
        }

        let search_ttl = Duration::from_secs(config.cache.search_ttl_secs);
        for crawler in &config.crawler_sources {
            registry.register(Arc::new(CrawlerSource::new(
                crawler,
                &config.crawler,
                &config.user_agent,
                search_ttl,
                client.clone(),
            )?));
        }

        tracing::debug!("Active sources: {:?}", registry.names());
        Ok(registry)
    }

    /// Adds a source, replacing any previous source of the same name
    pub fn register(&mut self, source: Arc<dyn PriceSource>) {
        let name = source.name().to_string();
        if self.sources.insert(name.clone(), source).is_none() {
            self.order.push(name);
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn PriceSource>> {
        self.sources.get(name).cloned()
    }

    /// Names of all active sources, in registration order
    pub fn names(&self) -> Vec<String> {
        self.order.clone()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_config;

    const CONFIG: &str = r#"
[user-agent]
crawler-name = "PriceRipple"
crawler-version = "1.0"
contact-url = "https://example.com/bot"
contact-email = "bot@example.com"

[[api-source]]
name = "keyed"
base-url = "https://api.example"
api-key = "secret"

[[api-source]]
name = "keyless"
base-url = "https://other.example"
api-key-env = "PRICE_RIPPLE_TEST_UNSET_KEY"

[[crawler-source]]
name = "shop"
base-url = "https://shop.example"

[crawler-source.selectors]
item = ".item"
title = ".title"
price = ".price"
"#;

    #[test]
    fn test_from_config_skips_sources_without_key() {
        let config = parse_config(CONFIG).unwrap();
        let registry = SourceRegistry::from_config(&config, Client::new()).unwrap();

        assert_eq!(registry.names(), vec!["keyed".to_string(), "shop".to_string()]);
        assert!(registry.get("keyless").is_none());
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_register_replaces_same_name() {
        let config = parse_config(CONFIG).unwrap();
        let built = SourceRegistry::from_config(&config, Client::new()).unwrap();

        let mut registry = SourceRegistry::new();
        assert!(registry.is_empty());
        registry.register(built.get("shop").unwrap());
        registry.register(built.get("shop").unwrap());
        assert_eq!(registry.names(), vec!["shop".to_string()]);
    }
}
