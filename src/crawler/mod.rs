//! Crawl driver and its collaborators
//!
//! This module contains the top-level crawl loop, including:
//! - The driver's typed event inbox
//! - Spider analysis of stored responses (links, redirects, forms)
//! - Form submission with optional filler-supplied values
//! - Hand-off of render units to an external renderer

mod driver;
pub mod events;
pub mod form_filler;
pub mod forms;
pub mod renderer;

pub use driver::{spider_targets, CrawlDriver, CrawlDriverBuilder, CrawlReport, DriverOptions};
pub use events::{DriverEvent, DriverHandle};
pub use form_filler::{DefaultFormFiller, FillKind, FilledValue, FormFiller};
pub use forms::{form_target, FillPolicy};
pub use renderer::{NullRenderer, Renderer};

use crate::config::Config;
use crate::dispatcher::{build_http_client, HttpTransport};
use crate::frontier::{Frontier, FrontierLimits};
use crate::scope::{ScopeFilter, SharedScope};
use crate::storage::{open_storage, RunStatus, Storage};
use crate::Result;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Runs a complete crawl operation
///
/// This is the main entry point for starting a crawl. It will:
/// 1. Open the storage and create or resume a run
/// 2. Seed the frontier (fresh runs) or reset interrupted items (resumed runs)
/// 3. Build the HTTP client and the driver
/// 4. Drive the crawl until no work is left or Ctrl-C is pressed
///
/// # Arguments
///
/// * `config` - The crawler configuration
/// * `config_hash` - Hash of the configuration file, recorded on new runs
/// * `fresh` - Clear all queues and stored responses first
///
/// # Returns
///
/// * `Ok(CrawlReport)` - Crawl finished (or was stopped cleanly)
/// * `Err(ScoutError)` - Crawl failed
pub async fn run_crawl(config: Config, config_hash: &str, fresh: bool) -> Result<CrawlReport> {
    let mut storage = open_storage(Path::new(&config.output.database_path))?;

    let (run_id, resumed) = if fresh {
        storage.clear_queues()?;
        (storage.create_run(config_hash)?, false)
    } else {
        match storage.get_latest_run()? {
            Some(run) if matches!(run.status, RunStatus::Running | RunStatus::Interrupted) => {
                tracing::info!("Resuming interrupted run {}", run.id);
                storage.update_run_status(run.id, RunStatus::Running)?;
                (run.id, true)
            }
            _ => {
                tracing::info!("Starting new run");
                (storage.create_run(config_hash)?, false)
            }
        }
    };

    let scope = SharedScope::new(ScopeFilter::from_config(&config.scope));
    let frontier = Arc::new(Frontier::new(
        storage,
        scope.clone(),
        FrontierLimits::from_config(&config.crawler),
        run_id,
    ));

    if resumed {
        let reset = frontier.reset_interrupted()?;
        if reset > 0 {
            tracing::info!("Re-queued {} requests left in flight by the previous run", reset);
        }
    }

    let seeds = config
        .seeds
        .urls
        .iter()
        .map(|seed| Url::parse(seed))
        .collect::<std::result::Result<Vec<_>, _>>()?;
    let seeded = frontier.seed(&seeds)?;
    tracing::info!(
        "Seeded {} of {} URLs ({} already known)",
        seeded.queued,
        seeds.len(),
        seeded.duplicate + seeded.folded
    );

    let timeout = Duration::from_secs(config.crawler.request_timeout_secs);
    let cookies = Arc::new(reqwest::cookie::Jar::default());
    let client = build_http_client(&config.user_agent, cookies, timeout)?;

    let driver = CrawlDriver::builder(frontier.clone(), Arc::new(HttpTransport::new(client)), scope)
        .form_filler(Arc::new(DefaultFormFiller::default()))
        .options(DriverOptions::from_config(&config.crawler))
        .build();

    let handle = driver.handle();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupt received, finishing in-flight requests");
            handle.stop();
        }
    });

    let result = driver.run().await;
    interrupt.abort();

    let report = match result {
        Ok(report) => report,
        Err(e) => {
            frontier.with_storage(|s| s.update_run_status(run_id, RunStatus::Failed))?;
            return Err(e);
        }
    };

    if report.stopped {
        frontier.with_storage(|s| s.update_run_status(run_id, RunStatus::Interrupted))?;
    } else {
        frontier.with_storage(|s| s.complete_run(run_id))?;
    }

    let stats = frontier.stats()?;
    tracing::info!(
        "Run {}: {} queue items, {} stored responses, peak {} exchanges in flight",
        run_id,
        stats.total_queue_items,
        stats.total_responses,
        report.peak_in_flight
    );

    Ok(report)
}

