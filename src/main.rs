//! Scoutline main entry point
//!
//! This is the command-line interface for the Scoutline crawl engine.

use anyhow::Context;
use clap::Parser;
use scoutline::config::{load_config_with_hash, Config};
use scoutline::crawler::run_crawl;
use scoutline::scope::{PatternList, ScopeRuleSet};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Scoutline: crawl orchestration for web security testing
///
/// Scoutline discovers links, forms, redirect targets and script-embedded
/// URLs inside a configured scope, fetches them under a concurrency budget
/// and a link-depth bound, and keeps its frontier on disk so interrupted
/// crawls resume where they stopped.
#[derive(Parser, Debug)]
#[command(name = "scoutline")]
#[command(version = "1.0.0")]
#[command(about = "Crawl orchestration for web security testing", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Start a fresh crawl, clearing queues and stored responses
    #[arg(long)]
    fresh: bool,

    /// Validate config and show the compiled scope without crawling
    #[arg(long, conflicts_with = "stats")]
    dry_run: bool,

    /// Show statistics from the database and exit
    #[arg(long, conflicts_with = "dry_run")]
    stats: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if cli.dry_run {
        handle_dry_run(&config);
    } else if cli.stats {
        handle_stats(&config)?;
    } else {
        handle_crawl(config, &config_hash, cli.fresh).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("scoutline=info,warn"),
            1 => EnvFilter::new("scoutline=debug,info"),
            2 => EnvFilter::new("scoutline=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: shows the effective configuration and scope
fn handle_dry_run(config: &Config) {
    println!("=== Scoutline Dry Run ===\n");

    let crawler = &config.crawler;
    println!("Crawler Configuration:");
    println!("  Max link depth: {}", crawler.max_link_depth);
    println!("  Max links: {}", limit(crawler.max_links));
    println!("  Max children: {}", limit(crawler.max_children));
    println!("  Max unique parameters: {}", limit(crawler.max_unique_parameters));
    println!("  Max concurrent exchanges: {}", crawler.max_concurrent);
    println!("  Request timeout: {}s", crawler.request_timeout_secs);
    println!("  Render units: {}", crawler.max_render_units);
    println!("  Extraction workers: {}", crawler.extraction_workers);
    println!("  Use data bank: {}", crawler.use_data_bank);
    println!("  Submit credentials: {}", crawler.submit_user_name_password);

    println!("\nUser Agent: {}", config.user_agent.header_value());
    println!("Database: {}", config.output.database_path);

    let rules = ScopeRuleSet::from_config(&config.scope);
    println!("\nScope:");
    print_patterns("Include paths", &rules.include_paths);
    print_patterns("Exclude paths", &rules.exclude_paths);
    print_patterns("Include URLs", &rules.include_urls);
    print_patterns("Exclude URLs", &rules.exclude_urls);
    print_patterns("Include hosts", &rules.include_hosts);
    print_patterns("Exclude hosts", &rules.exclude_hosts);
    print_patterns("Include IPs", &rules.include_ips);
    print_patterns("Exclude IPs", &rules.exclude_ips);
    match &rules.dangerous_paths {
        Some(pattern) => println!("  Dangerous paths excluded: {}", pattern.as_str()),
        None => println!("  Dangerous paths allowed"),
    }
    match &rules.media_extensions {
        Some(extensions) => println!("  Media excluded: {}", extensions.join(", ")),
        None => println!("  Media files retrieved"),
    }
    if !rules.has_include_rules() {
        println!("  No include rules: staying on the host of each referer");
    }

    println!("\nSeeds ({}):", config.seeds.urls.len());
    for seed in &config.seeds.urls {
        println!("  - {}", seed);
    }

    println!("\n✓ Configuration is valid");
}

fn limit(value: u32) -> String {
    if value == 0 {
        "unlimited".to_string()
    } else {
        value.to_string()
    }
}

fn print_patterns(label: &str, patterns: &PatternList) {
    if patterns.is_empty() {
        return;
    }
    println!("  {} ({}):", label, patterns.len());
    for pattern in patterns.describe() {
        println!("    * {}", pattern);
    }
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    use scoutline::output::{load_statistics, print_statistics};
    use scoutline::storage::open_storage;

    println!("Database: {}\n", config.output.database_path);

    let storage = open_storage(Path::new(&config.output.database_path))
        .context("failed to open the crawl database")?;
    let stats = load_statistics(&storage)?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(config: Config, config_hash: &str, fresh: bool) -> anyhow::Result<()> {
    if fresh {
        tracing::info!("Starting fresh crawl (clearing previous state)");
    } else {
        tracing::info!("Starting crawl (will resume if an interrupted run exists)");
    }
    tracing::info!("Seed URLs: {}", config.seeds.urls.len());

    match run_crawl(config, config_hash, fresh).await {
        Ok(report) if report.stopped => {
            tracing::info!("Crawl stopped; run again to resume");
            Ok(())
        }
        Ok(_) => {
            tracing::info!("Crawl completed successfully");
            Ok(())
        }
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            Err(e.into())
        }
    }
}
