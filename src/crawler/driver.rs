//! Crawl driver - the top-level control loop
//!
//! The driver owns a single inbox of [`DriverEvent`]s. Each event is handled
//! to completion before the next one is read: exchange outcomes are recorded
//! in the frontier, finished spider jobs feed their targets back into it, and
//! after every event the driver tops up the dispatcher, the extraction pool
//! and the renderer from the frontier's queues. Extraction runs on the
//! blocking pool so it never holds up intake of new HTTP completions.
//!
//! Lock order is frontier before dispatcher. The driver never holds the
//! frontier lock while calling into the dispatcher.

use crate::config::CrawlerConfig;
use crate::crawler::events::{DriverEvent, DriverHandle};
use crate::crawler::form_filler::FormFiller;
use crate::crawler::forms::{form_target, FillPolicy};
use crate::crawler::renderer::Renderer;
use crate::dispatcher::{
    ContextToken, Dispatcher, DispatcherConfig, ExchangeOutcome, ExchangeRequest, ExchangeResult,
    OutcomeCallback, RequestBody, Sequence, Transport,
};
use crate::extract::{extract, extract_script, resolve_link, ExtractionResult};
use crate::frontier::{Frontier, RenderOutput, RenderUnit, SpiderUnit, Target};
use crate::scope::SharedScope;
use crate::storage::{NewResponse, QueueItem, StoredResponse};
use crate::Result;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinSet;
use url::Url;

/// Response headers whose values are followed like links
const REDIRECT_HEADERS: [&str; 2] = ["location", "content-location"];

/// Driver tuning taken from the crawler configuration
#[derive(Debug, Clone)]
pub struct DriverOptions {
    /// Render units handed to the renderer at once
    pub max_render_units: usize,
    /// Spider jobs running on the blocking pool at once
    pub extraction_workers: usize,
    /// Consult the form filler for field values
    pub use_data_bank: bool,
    /// Submit filler-provided user names and passwords
    pub submit_user_name_password: bool,
    pub dispatcher: DispatcherConfig,
}

impl DriverOptions {
    pub fn from_config(config: &CrawlerConfig) -> Self {
        Self {
            max_render_units: config.max_render_units.max(1) as usize,
            extraction_workers: config.extraction_workers.max(1) as usize,
            use_data_bank: config.use_data_bank,
            submit_user_name_password: config.submit_user_name_password,
            dispatcher: DispatcherConfig {
                max_concurrent: config.max_concurrent.max(1) as usize,
                request_timeout: Duration::from_secs(config.request_timeout_secs),
            },
        }
    }
}

impl Default for DriverOptions {
    fn default() -> Self {
        Self {
            max_render_units: 1,
            extraction_workers: 2,
            use_data_bank: true,
            submit_user_name_password: false,
            dispatcher: DispatcherConfig::default(),
        }
    }
}

/// Counters reported when a crawl ends
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlReport {
    /// Exchanges that returned a response
    pub fetched: usize,
    /// Exchanges that failed or timed out
    pub failed: usize,
    /// Items rejected by scope at send time
    pub out_of_scope: usize,
    /// Items returned to the queue unsent when the crawl stopped
    pub cancelled: usize,
    /// New queue items created from discoveries
    pub discovered: usize,
    /// Stored responses mined by the spider
    pub spidered: usize,
    /// Render units completed
    pub rendered: usize,
    /// Most exchanges in flight at once
    pub peak_in_flight: usize,
    /// True if the crawl ended on a stop request
    pub stopped: bool,
}

/// Assembles a [`CrawlDriver`]
pub struct CrawlDriverBuilder {
    frontier: Arc<Frontier>,
    transport: Arc<dyn Transport>,
    scope: SharedScope,
    renderer: Arc<dyn Renderer>,
    form_filler: Option<Arc<dyn FormFiller>>,
    sequence: Option<Arc<dyn Sequence>>,
    post_sequence: Option<Arc<dyn Sequence>>,
    options: DriverOptions,
}

impl CrawlDriverBuilder {
    pub fn renderer(mut self, renderer: Arc<dyn Renderer>) -> Self {
        self.renderer = renderer;
        self
    }

    pub fn form_filler(mut self, filler: Arc<dyn FormFiller>) -> Self {
        self.form_filler = Some(filler);
        self
    }

    /// Sequence replayed before crawl requests (e.g. a login)
    pub fn sequence(mut self, sequence: Arc<dyn Sequence>) -> Self {
        self.sequence = Some(sequence);
        self
    }

    /// Sequence replayed after every crawl request
    pub fn post_sequence(mut self, sequence: Arc<dyn Sequence>) -> Self {
        self.post_sequence = Some(sequence);
        self
    }

    pub fn options(mut self, options: DriverOptions) -> Self {
        self.options = options;
        self
    }

    /// Builds the driver and its dispatcher
    ///
    /// Must be called inside a Tokio runtime.
    pub fn build(self) -> CrawlDriver {
        let (tx, rx) = mpsc::unbounded_channel();

        let mut dispatcher = Dispatcher::new(
            self.transport,
            self.scope.clone(),
            self.options.dispatcher,
            outcome_callback(tx.clone()),
        );
        if let Some(sequence) = self.sequence {
            dispatcher = dispatcher.with_sequence(sequence);
        }
        if let Some(sequence) = self.post_sequence {
            dispatcher = dispatcher.with_post_sequence(sequence);
        }

        CrawlDriver {
            frontier: self.frontier,
            dispatcher: Arc::new(dispatcher),
            scope: self.scope,
            renderer: self.renderer,
            form_filler: self.form_filler,
            options: self.options,
            tx,
            rx,
            in_flight: HashMap::new(),
            spider_tasks: JoinSet::new(),
            render_tasks: JoinSet::new(),
            stopped: false,
            report: CrawlReport::default(),
        }
    }
}

/// Routes dispatcher outcomes into the driver's inbox
fn outcome_callback(tx: UnboundedSender<DriverEvent>) -> OutcomeCallback {
    Arc::new(move |outcome: ExchangeOutcome| {
        if tx.send(DriverEvent::ResponseArrived(outcome)).is_err() {
            tracing::debug!("Exchange finished after the driver shut down");
        }
    })
}

/// The crawl control loop
pub struct CrawlDriver {
    frontier: Arc<Frontier>,
    dispatcher: Arc<Dispatcher>,
    scope: SharedScope,
    renderer: Arc<dyn Renderer>,
    form_filler: Option<Arc<dyn FormFiller>>,
    options: DriverOptions,
    tx: UnboundedSender<DriverEvent>,
    rx: UnboundedReceiver<DriverEvent>,
    /// Dispatched queue items by the context token of their exchange
    in_flight: HashMap<ContextToken, QueueItem>,
    spider_tasks: JoinSet<(i64, Vec<Target>)>,
    render_tasks: JoinSet<(RenderUnit, Result<RenderOutput>)>,
    stopped: bool,
    report: CrawlReport,
}

impl CrawlDriver {
    /// Starts assembling a driver
    ///
    /// # Arguments
    ///
    /// * `frontier` - The crawl frontier, already seeded or resumed
    /// * `transport` - Performs HTTP exchanges
    /// * `scope` - Scope shared with the frontier
    pub fn builder(
        frontier: Arc<Frontier>,
        transport: Arc<dyn Transport>,
        scope: SharedScope,
    ) -> CrawlDriverBuilder {
        CrawlDriverBuilder {
            frontier,
            transport,
            scope,
            renderer: Arc::new(crate::crawler::renderer::NullRenderer),
            form_filler: None,
            sequence: None,
            post_sequence: None,
            options: DriverOptions::default(),
        }
    }

    /// Returns a handle for sending control events
    pub fn handle(&self) -> DriverHandle {
        DriverHandle::new(self.tx.clone())
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    /// Runs until no work is outstanding, or until stopped and drained
    ///
    /// # Returns
    ///
    /// * `Ok(CrawlReport)` - The crawl finished
    /// * `Err(ScoutError)` - The frontier's storage failed
    pub async fn run(mut self) -> Result<CrawlReport> {
        tracing::info!("Crawl driver starting (run {})", self.frontier.run_id());
        let start_time = Instant::now();
        let _ = self.tx.send(DriverEvent::Start);

        loop {
            let event = tokio::select! {
                event = self.rx.recv() => match event {
                    Some(event) => event,
                    None => break,
                },
                Some(joined) = self.spider_tasks.join_next() => match joined {
                    Ok((response_id, targets)) => DriverEvent::SpiderFinished { response_id, targets },
                    Err(e) => {
                        tracing::error!(implementation_error = true, "Spider job failed: {}", e);
                        continue;
                    }
                },
                Some(joined) = self.render_tasks.join_next() => match joined {
                    Ok((unit, output)) => DriverEvent::RenderFinished { unit, output },
                    Err(e) => {
                        tracing::error!(implementation_error = true, "Render job failed: {}", e);
                        continue;
                    }
                },
            };

            tracing::trace!("Driver event: {}", event.name());
            self.handle_event(event)?;

            if self.is_finished()? {
                break;
            }
        }

        self.drain_dispatcher().await;
        self.report.peak_in_flight = self.dispatcher.peak_in_flight();
        self.report.stopped = self.stopped;

        tracing::info!(
            "Crawl finished in {:?}: {} fetched, {} failed, {} out of scope, {} discovered",
            start_time.elapsed(),
            self.report.fetched,
            self.report.failed,
            self.report.out_of_scope,
            self.report.discovered
        );

        Ok(self.report)
    }

    fn handle_event(&mut self, event: DriverEvent) -> Result<()> {
        match event {
            DriverEvent::Start | DriverEvent::FrontierChanged | DriverEvent::RenderUnitAvailable => {}
            DriverEvent::Stop => {
                tracing::info!(
                    "Stop requested, waiting for {} exchanges in flight",
                    self.in_flight.len()
                );
                self.stopped = true;
                self.dispatcher.stop();
            }
            DriverEvent::ResponseArrived(outcome) => self.on_outcome(outcome)?,
            DriverEvent::SpiderFinished {
                response_id,
                targets,
            } => self.on_spider_finished(response_id, targets)?,
            DriverEvent::RenderFinished { unit, output } => self.on_render_finished(unit, output)?,
            DriverEvent::ScopeChanged(filter) => {
                tracing::info!("Scope rules replaced");
                self.scope.replace(filter);
            }
        }

        self.pump()
    }

    /// Records a finished exchange against its queue item
    fn on_outcome(&mut self, outcome: ExchangeOutcome) -> Result<()> {
        let item = match self.in_flight.remove(&outcome.context) {
            Some(item) => item,
            None => {
                tracing::error!(
                    implementation_error = true,
                    context = %outcome.context,
                    "Outcome for an exchange the driver never enqueued"
                );
                return Ok(());
            }
        };

        match outcome.result {
            ExchangeResult::Completed(response) => {
                let content_type = response.content_type().map(str::to_string);
                let is_html = content_type
                    .as_deref()
                    .map(|ct| ct.to_ascii_lowercase().contains("html"))
                    .unwrap_or(false);
                tracing::debug!(
                    "{} {} -> {}",
                    item.method,
                    item.full_url(),
                    response.status
                );

                let recorded = self.frontier.record_fetch(
                    item.id,
                    NewResponse {
                        queue_item_id: Some(item.id),
                        method: item.method.clone(),
                        url: item.full_url(),
                        status_code: response.status,
                        headers: response.headers,
                        content_type,
                        body: response.body,
                    },
                )?;
                if recorded.is_some() {
                    self.report.fetched += 1;
                    if is_html {
                        let _ = self.tx.send(DriverEvent::RenderUnitAvailable);
                    }
                }
            }
            ExchangeResult::Failed(reason) => {
                tracing::warn!("{} {} failed: {}", item.method, item.full_url(), reason);
                self.report.failed += 1;
                self.frontier.complete_item(item.id)?;
            }
            ExchangeResult::OutOfScope => {
                tracing::debug!("{} left scope before it was sent", item.full_url());
                self.report.out_of_scope += 1;
                self.frontier.complete_item(item.id)?;
            }
            ExchangeResult::Cancelled => {
                tracing::debug!("{} was never sent, returning it to the queue", item.full_url());
                self.report.cancelled += 1;
                self.frontier.release_item(item.id)?;
            }
        }

        Ok(())
    }

    fn on_spider_finished(&mut self, response_id: i64, targets: Vec<Target>) -> Result<()> {
        let found = targets.len();
        let summary = self.frontier.add_targets(targets, &mut HashSet::new())?;
        self.frontier.mark_spider_item_done(response_id)?;

        tracing::debug!(
            "Response {}: {} targets, {} queued, {} folded, {} duplicate, {} out of scope, {} too deep",
            response_id,
            found,
            summary.queued,
            summary.folded,
            summary.duplicate,
            summary.out_of_scope,
            summary.too_deep
        );
        self.report.spidered += 1;
        self.report.discovered += summary.queued;
        Ok(())
    }

    fn on_render_finished(&mut self, unit: RenderUnit, output: Result<RenderOutput>) -> Result<()> {
        let output = output.unwrap_or_else(|e| {
            tracing::warn!("Renderer failed on {}: {}", unit.base_url, e);
            RenderOutput::default()
        });
        if self.frontier.complete_render_unit(&unit, output)? {
            self.report.rendered += 1;
        }
        Ok(())
    }

    /// Starts as much work as the caps allow
    fn pump(&mut self) -> Result<()> {
        if self.stopped {
            return Ok(());
        }

        let converted = self.frontier.convert_pending_analysis()?;
        self.report.discovered += converted.queued;

        self.pump_dispatch()?;
        self.pump_spider()?;
        self.pump_render()
    }

    fn pump_dispatch(&mut self) -> Result<()> {
        let cap = self.dispatcher.effective_cap();

        while self.in_flight.len() < cap {
            let item = match self.frontier.next_dispatchable()? {
                Some(item) => item,
                None => break,
            };

            let request = match exchange_request(&item) {
                Some(request) => request,
                None => {
                    tracing::debug!("Unsendable queue item {}: {}", item.id, item.full_url());
                    self.frontier.complete_item(item.id)?;
                    continue;
                }
            };

            let token = self.dispatcher.enqueue(request);
            self.in_flight.insert(token, item);
        }

        Ok(())
    }

    fn pump_spider(&mut self) -> Result<()> {
        while self.spider_tasks.len() < self.options.extraction_workers {
            let unit = match self.frontier.next_spider_item()? {
                Some(unit) => unit,
                None => break,
            };

            let filler = if self.options.use_data_bank {
                self.form_filler.clone()
            } else {
                None
            };
            let submit_credentials = self.options.submit_user_name_password;

            self.spider_tasks.spawn_blocking(move || {
                let policy = FillPolicy {
                    filler: filler.as_deref(),
                    submit_credentials,
                };
                let targets = spider_targets(&unit, policy);
                (unit.response.id, targets)
            });
        }

        Ok(())
    }

    fn pump_render(&mut self) -> Result<()> {
        while self.render_tasks.len() < self.options.max_render_units {
            let unit = match self.frontier.record_render_unit()? {
                Some(unit) => unit,
                None => break,
            };

            let renderer = Arc::clone(&self.renderer);
            self.render_tasks.spawn(async move {
                let output = renderer.render(&unit).await;
                (unit, output)
            });
        }

        Ok(())
    }

    /// Waits for trailing sequence exchanges, which are never delivered to the inbox
    async fn drain_dispatcher(&self) {
        while !self.dispatcher.is_idle() {
            if self.stopped && self.dispatcher.in_flight() == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }

    /// Returns true once nothing is running and nothing more can start
    fn is_finished(&self) -> Result<bool> {
        let busy = !self.in_flight.is_empty()
            || !self.spider_tasks.is_empty()
            || !self.render_tasks.is_empty();
        if busy {
            return Ok(false);
        }

        if self.stopped {
            return Ok(true);
        }

        if self.frontier.has_outstanding_work()? {
            tracing::error!(
                implementation_error = true,
                "Frontier holds work the driver cannot start; ending crawl"
            );
        }
        Ok(true)
    }
}

/// Builds the exchange for a queue item
fn exchange_request(item: &QueueItem) -> Option<ExchangeRequest> {
    let url = Url::parse(&item.full_url()).ok()?;
    let body = item
        .body_params
        .as_deref()
        .map(|params| RequestBody::from_params(item.body_encoding.as_deref(), params));

    Some(ExchangeRequest {
        method: item.method.clone(),
        url,
        headers: Vec::new(),
        body,
        referer: item.referer_url.clone(),
    })
}

/// Mines a stored response for targets one level deeper
///
/// Redirect headers, body links, relative links recovered from scripts and
/// form submissions all become targets at the unit's depth + 1.
pub fn spider_targets(unit: &SpiderUnit, policy: FillPolicy<'_>) -> Vec<Target> {
    let response = &unit.response;
    let depth = unit.depth + 1;

    let base_url = match Url::parse(&response.url) {
        Ok(url) => url,
        Err(e) => {
            tracing::debug!("Stored response {} has a bad URL: {}", response.id, e);
            return Vec::new();
        }
    };
    let referer = base_url.as_str();

    let mut targets: Vec<Target> = redirect_links(response, &base_url)
        .into_iter()
        .map(|url| Target::get(url, Some(referer), depth))
        .collect();

    let extraction = match body_extraction(response, &base_url) {
        Some(extraction) => extraction,
        None => return targets,
    };

    let link_base = extraction.base_url.clone();
    targets.extend(
        extraction
            .links
            .into_iter()
            .map(|url| Target::get(url, Some(referer), depth)),
    );
    targets.extend(
        extraction
            .relative_links
            .iter()
            .filter_map(|path| resolve_link(path, &link_base))
            .map(|url| Target::get(url, Some(referer), depth)),
    );
    targets.extend(
        extraction
            .forms
            .iter()
            .filter_map(|form| form_target(form, policy, referer, depth)),
    );

    targets
}

fn redirect_links(response: &StoredResponse, base_url: &Url) -> Vec<Url> {
    response
        .headers
        .iter()
        .filter(|(name, _)| REDIRECT_HEADERS.contains(&name.to_ascii_lowercase().as_str()))
        .filter_map(|(_, value)| resolve_link(value.trim(), base_url))
        .collect()
}

fn body_extraction(response: &StoredResponse, base_url: &Url) -> Option<ExtractionResult> {
    if response.body.is_empty() {
        return None;
    }

    if response.is_html() {
        let charset = response
            .content_type
            .as_deref()
            .and_then(crate::extract::charset::charset_from_content_type);
        return match extract(&response.body, base_url, charset.as_deref()) {
            Ok(result) => Some(result),
            Err(e) => {
                tracing::debug!("Extraction failed for {}: {}", response.url, e);
                None
            }
        };
    }

    if response.is_script() {
        let text = String::from_utf8_lossy(&response.body);
        return Some(extract_script(&text, base_url));
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::form_filler::DefaultFormFiller;
    use crate::dispatcher::{ExchangeResponse, StaticSequence, TransportError};
    use crate::frontier::FrontierLimits;
    use crate::storage::{SqliteStorage, Storage};
    use async_trait::async_trait;

    /// Answers every request with an empty HTML page after a delay
    struct PageTransport {
        delay: Duration,
    }

    #[async_trait]
    impl Transport for PageTransport {
        async fn execute(
            &self,
            request: &ExchangeRequest,
        ) -> std::result::Result<ExchangeResponse, TransportError> {
            tokio::time::sleep(self.delay).await;
            Ok(ExchangeResponse {
                status: 200,
                headers: vec![("Content-Type".to_string(), "text/html".to_string())],
                body: b"<p>page</p>".to_vec(),
                final_url: request.url.clone(),
            })
        }
    }

    fn seeded_frontier() -> Arc<Frontier> {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let run_id = storage.create_run("test").unwrap();
        let limits = FrontierLimits {
            max_links: 0,
            max_link_depth: 3,
            max_children: 0,
            max_unique_parameters: 0,
        };
        let frontier = Frontier::new(storage, SharedScope::default(), limits, run_id);
        frontier.seed(&[Url::parse("http://h/").unwrap()]).unwrap();
        Arc::new(frontier)
    }

    #[tokio::test]
    async fn test_stop_while_sequence_runs_returns_item_to_queue() {
        let frontier = seeded_frontier();
        let login = Arc::new(StaticSequence::new(vec![ExchangeRequest::get(
            Url::parse("http://h/login").unwrap(),
        )]));
        let driver = CrawlDriver::builder(
            frontier.clone(),
            Arc::new(PageTransport {
                delay: Duration::from_millis(300),
            }),
            SharedScope::default(),
        )
        .sequence(login)
        .build();
        let handle = driver.handle();

        let stopper = async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            handle.stop();
        };
        let (report, _) = tokio::join!(
            tokio::time::timeout(Duration::from_secs(5), driver.run()),
            stopper
        );
        let report = report.expect("driver ended after stop").unwrap();

        assert!(report.stopped);
        assert_eq!(report.fetched, 0);
        assert_eq!(report.cancelled, 1);
        assert!(frontier.has_outstanding_work().unwrap());

        // A later run picks the item up again
        let driver = CrawlDriver::builder(
            frontier.clone(),
            Arc::new(PageTransport {
                delay: Duration::from_millis(1),
            }),
            SharedScope::default(),
        )
        .build();
        let report = tokio::time::timeout(Duration::from_secs(5), driver.run())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(report.fetched, 1);
        assert!(!frontier.has_outstanding_work().unwrap());
    }

    #[tokio::test]
    async fn test_unstartable_work_ends_crawl() {
        let frontier = seeded_frontier();
        // Left dispatched by an earlier run and never reset
        frontier.next_dispatchable().unwrap().unwrap();

        let driver = CrawlDriver::builder(
            frontier.clone(),
            Arc::new(PageTransport {
                delay: Duration::from_millis(1),
            }),
            SharedScope::default(),
        )
        .build();
        let report = tokio::time::timeout(Duration::from_secs(5), driver.run())
            .await
            .expect("driver ended with unstartable work")
            .unwrap();

        assert!(!report.stopped);
        assert_eq!(report.fetched, 0);
        assert!(frontier.has_outstanding_work().unwrap());
    }

    #[tokio::test]
    async fn test_stop_lets_running_exchange_finish() {
        let frontier = seeded_frontier();
        let driver = CrawlDriver::builder(
            frontier.clone(),
            Arc::new(PageTransport {
                delay: Duration::from_millis(200),
            }),
            SharedScope::default(),
        )
        .build();
        let handle = driver.handle();

        let stopper = async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            handle.stop();
        };
        let (report, _) = tokio::join!(
            tokio::time::timeout(Duration::from_secs(5), driver.run()),
            stopper
        );
        let report = report.expect("driver ended after stop").unwrap();

        // The seed was already on the wire and is recorded; its page is not mined
        assert!(report.stopped);
        assert_eq!(report.fetched, 1);
        assert_eq!(report.spidered, 0);
        assert_eq!(frontier.stats().unwrap().total_responses, 1);
    }

    fn stored(url: &str, content_type: &str, body: &str, headers: Vec<(&str, &str)>) -> SpiderUnit {
        SpiderUnit {
            response: StoredResponse {
                id: 7,
                queue_item_id: None,
                method: "GET".to_string(),
                url: url.to_string(),
                status_code: 200,
                headers: headers
                    .into_iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
                content_type: Some(content_type.to_string()),
                body: body.as_bytes().to_vec(),
                received_at: String::new(),
            },
            depth: 1,
        }
    }

    fn urls(targets: &[Target]) -> Vec<String> {
        targets.iter().map(|t| t.url.to_string()).collect()
    }

    #[test]
    fn test_spider_html_links_and_forms() {
        let unit = stored(
            "http://h/p/",
            "text/html",
            r#"<a href="/x">x</a><form action="/s" method="post"><input name="a" value="1"></form>"#,
            Vec::new(),
        );

        let targets = spider_targets(&unit, FillPolicy::existing_values());
        assert!(targets.iter().all(|t| t.depth == 2));
        assert!(targets.iter().all(|t| t.referer.as_deref() == Some("http://h/p/")));

        let get = targets.iter().find(|t| t.url.as_str() == "http://h/x").unwrap();
        assert_eq!(get.method, "GET");

        let post = targets.iter().find(|t| t.method == "POST").unwrap();
        assert_eq!(post.url.as_str(), "http://h/s");
        assert_eq!(post.body_params.as_deref(), Some("a=1"));
    }

    #[test]
    fn test_spider_follows_redirect_headers() {
        let unit = stored(
            "http://h/old",
            "text/plain",
            "",
            vec![("Location", "/new"), ("Content-Location", "http://h/canonical")],
        );

        let targets = spider_targets(&unit, FillPolicy::existing_values());
        assert_eq!(urls(&targets), vec!["http://h/new", "http://h/canonical"]);
    }

    #[test]
    fn test_spider_scans_scripts() {
        let unit = stored(
            "http://h/app.js",
            "application/javascript",
            r#"var api = "http://h/api/v1"; // legacy: http://h/old-api"#,
            Vec::new(),
        );

        let found = urls(&spider_targets(&unit, FillPolicy::existing_values()));
        assert!(found.contains(&"http://h/api/v1".to_string()));
        assert!(found.contains(&"http://h/old-api".to_string()));
    }

    #[test]
    fn test_spider_uses_filler_when_given() {
        let unit = stored(
            "http://h/",
            "text/html",
            r#"<form action="/find"><input name="q"></form>"#,
            Vec::new(),
        );
        let filler = DefaultFormFiller::default();
        let policy = FillPolicy {
            filler: Some(&filler),
            submit_credentials: false,
        };

        let found = urls(&spider_targets(&unit, policy));
        assert!(found.contains(&"http://h/find?q=scoutline".to_string()));
        assert!(!found.contains(&"http://h/find?q=".to_string()));
    }

    #[test]
    fn test_exchange_request_for_post_item() {
        let item = QueueItem {
            id: 1,
            method: "POST".to_string(),
            target_url: "http://h/s".to_string(),
            query_string: None,
            body_encoding: Some("application/x-www-form-urlencoded".to_string()),
            body_params: Some("a=1".to_string()),
            referer_url: Some("http://h/".to_string()),
            status: crate::QueueStatus::Dispatched,
            depth: 1,
        };

        let request = exchange_request(&item).unwrap();
        assert_eq!(request.method, "POST");
        assert_eq!(request.body, Some(RequestBody::UrlEncoded("a=1".to_string())));
        assert_eq!(request.referer.as_deref(), Some("http://h/"));
    }
}
