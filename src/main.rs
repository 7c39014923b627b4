//! Price-Ripple main entry point
//!
//! This is the command-line interface for the Price-Ripple card price
//! aggregator.

use anyhow::Context;
use clap::Parser;
use price_ripple::config::{load_config_with_hash, Config};
use price_ripple::{AggregatedPriceResult, CardQuery, PriceOptions, PriceOrchestrator};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Price-Ripple: A polite card price aggregator
///
/// Price-Ripple looks up a trading card across marketplace APIs and crawled
/// marketplaces, respecting robots.txt and per-site crawl delays, and
/// reports one combined price summary.
#[derive(Parser, Debug)]
#[command(name = "price-ripple")]
#[command(version = "1.0.0")]
#[command(about = "A polite card price aggregator", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Card name to look up
    #[arg(long, required_unless_present = "dry_run")]
    name: Option<String>,

    /// Card series or set
    #[arg(long)]
    series: Option<String>,

    /// Card number within the series
    #[arg(long)]
    number: Option<String>,

    /// Game type (pokemon, yugioh, onepiece, ...)
    #[arg(long)]
    game: Option<String>,

    /// Restrict the lookup to these sources (repeatable)
    #[arg(long = "source", value_name = "NAME")]
    sources: Vec<String>,

    /// Bypass the result cache
    #[arg(long)]
    no_cache: bool,

    /// Attempts per source, including the first
    #[arg(long)]
    max_retries: Option<u32>,

    /// Per-attempt timeout in milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Print the result as JSON
    #[arg(long)]
    json: bool,

    /// Validate config and list the active sources without fetching
    #[arg(long)]
    dry_run: bool,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

impl Cli {
    fn query(&self) -> Option<CardQuery> {
        let mut query = CardQuery::new(self.name.clone()?);
        if let Some(series) = &self.series {
            query = query.with_series(series.as_str());
        }
        if let Some(number) = &self.number {
            query = query.with_card_number(number.as_str());
        }
        if let Some(game) = &self.game {
            query = query.with_game_type(game.as_str());
        }
        Some(query)
    }

    fn options(&self, config: &Config) -> PriceOptions {
        let defaults = PriceOptions::from_config(config);
        PriceOptions {
            sources: (!self.sources.is_empty()).then(|| self.sources.clone()),
            use_cache: !self.no_cache,
            max_retries: self.max_retries.unwrap_or(defaults.max_retries),
            timeout_ms: self.timeout_ms.unwrap_or(defaults.timeout_ms),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", hash);

    let orchestrator =
        PriceOrchestrator::from_config(&config).context("Failed to initialize price sources")?;

    if cli.dry_run {
        handle_dry_run(&config, &orchestrator);
        return Ok(());
    }

    let query = cli.query().context("--name is required")?;
    let options = cli.options(&config);

    let result = orchestrator
        .get_card_prices(&query, &options)
        .await
        .with_context(|| format!("Price lookup failed for {}", query))?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_result(&query, &result);
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("price_ripple=info,warn"),
            1 => EnvFilter::new("price_ripple=debug,info"),
            2 => EnvFilter::new("price_ripple=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    // Logs go to stderr so --json output stays machine-readable
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: shows configuration and active sources
fn handle_dry_run(config: &Config, orchestrator: &PriceOrchestrator) {
    println!("=== Price-Ripple Dry Run ===\n");

    println!("User Agent: {}", config.user_agent.header_value());

    println!("\nRequests:");
    println!("  Timeout: {}ms", config.http.request_timeout_ms);
    println!("  Attempts per source: {}", config.retry.max_attempts);
    println!("  Retry base delay: {}ms", config.retry.base_delay_ms);
    println!("  Minimum crawl delay: {}ms", config.crawler.min_crawl_delay_ms);

    println!("\nCache:");
    println!("  Result TTL: {}s", config.cache.price_ttl_secs);
    println!("  Search TTL: {}s", config.cache.search_ttl_secs);
    match &config.cache.database_path {
        Some(path) => println!("  Database: {}", path),
        None => println!("  Database: (memory only)"),
    }

    println!("\nAPI Sources ({}):", config.api_sources.len());
    for source in &config.api_sources {
        let state = if orchestrator.registry().get(&source.name).is_some() {
            "active"
        } else {
            "inactive, no API key"
        };
        println!("  - {} ({}) [{}]", source.name, source.base_url, state);
    }

    println!("\nCrawler Sources ({}):", config.crawler_sources.len());
    for source in &config.crawler_sources {
        let fallback = source
            .fallback_base_price
            .map(|base| format!(", fallback around {} {}", base, source.currency))
            .unwrap_or_default();
        println!(
            "  - {} ({}{}){}",
            source.name, source.base_url, source.search_path, fallback
        );
    }

    println!("\n✓ Configuration is valid");
    println!(
        "✓ Would query {} active source(s): {}",
        orchestrator.registry().len(),
        orchestrator.registry().names().join(", ")
    );
}

/// Prints a human-readable price summary
fn print_result(query: &CardQuery, result: &AggregatedPriceResult) {
    println!("=== {} ===\n", query);
    println!("  Average: {:.2} {}", result.average, result.currency);
    println!("  Median:  {:.2} {}", result.median, result.currency);
    println!(
        "  Range:   {:.2} - {:.2} {}",
        result.min, result.max, result.currency
    );
    println!("  Listings: {}", result.total_results);

    println!("\nPlatforms ({}):", result.platforms_used.len());
    for name in &result.platforms_used {
        if let Some(p) = result.platforms.get(name) {
            println!(
                "  - {:<12} avg {:>10.2}  median {:>10.2}  [{:.2} - {:.2}] {} ({}, {} listings)",
                p.platform, p.average, p.median, p.min, p.max, p.currency, p.source, p.sample_size
            );
        }
    }

    if result.has_fallback() {
        println!("\n! Some platforms are estimated from fallback data, not live listings");
    }
}
