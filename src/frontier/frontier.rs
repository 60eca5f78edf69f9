//! Persistent crawl frontier
//!
//! Holds the queue of not-yet-fetched requests and the secondary queues of
//! responses waiting for spider (link/form mining) or render (dynamic
//! analysis) work. Every operation that reads and then writes runs inside
//! one critical section on the frontier's single mutex.

use crate::config::CrawlerConfig;
use crate::extract::{extract_str, resolve_link};
use crate::frontier::target::Target;
use crate::output::{load_statistics, CrawlStatistics};
use crate::scope::SharedScope;
use crate::state::{AnalysisKind, PendingKind, QueueStatus};
use crate::storage::{
    NewQueueItem, NewResponse, PendingAnalysis, QueueItem, SqliteStorage, Storage, StorageError,
    StorageResult, StoredResponse,
};
use crate::Result;
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};
use url::Url;

/// Crawl limits enforced when targets are added
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrontierLimits {
    /// Total queue items (0 = unlimited)
    pub max_links: u32,
    /// Derived items deeper than this are dropped
    pub max_link_depth: u32,
    /// Items per referer (0 = unlimited)
    pub max_children: u32,
    /// Query variants per method and target (0 = unlimited)
    pub max_unique_parameters: u32,
}

impl FrontierLimits {
    pub fn from_config(config: &CrawlerConfig) -> Self {
        Self {
            max_links: config.max_links,
            max_link_depth: config.max_link_depth,
            max_children: config.max_children,
            max_unique_parameters: config.max_unique_parameters,
        }
    }
}

/// What happened to a batch of targets
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AddSummary {
    /// New queue items created
    pub queued: usize,
    /// Targets answered by a stored response, folded into its pending rows
    pub folded: usize,
    /// Already resolved in this batch or already queued
    pub duplicate: usize,
    pub out_of_scope: usize,
    pub too_deep: usize,
    /// Dropped by a crawl limit
    pub over_limit: usize,
    /// Not an HTTP(S) URL
    pub invalid: usize,
}

impl AddSummary {
    fn absorb(&mut self, other: AddSummary) {
        self.queued += other.queued;
        self.folded += other.folded;
        self.duplicate += other.duplicate;
        self.out_of_scope += other.out_of_scope;
        self.too_deep += other.too_deep;
        self.over_limit += other.over_limit;
        self.invalid += other.invalid;
    }
}

/// A stored response claimed for spider analysis
#[derive(Debug, Clone)]
pub struct SpiderUnit {
    pub response: StoredResponse,
    pub depth: u32,
}

/// A stored HTML response claimed for the renderer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderUnit {
    pub response_id: i64,
    pub content: String,
    pub base_url: Url,
    pub depth: u32,
}

/// What the renderer found for one render unit
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderOutput {
    /// Discovered `(link, base_url)` pairs
    pub links: Vec<(String, String)>,
    /// Responses captured by on-page navigation
    pub response_ids: Vec<i64>,
    /// `(html, base_url)` fragments still to be mined
    pub html_fragments: Vec<(String, String)>,
}

struct FrontierState {
    storage: SqliteStorage,
    /// Claimed response IDs and the depth each pending row held when claimed
    claimed_spider: HashMap<i64, u32>,
    claimed_render: HashMap<i64, u32>,
    claimed_analysis: HashSet<i64>,
}

/// The persistent work queue and its spider/render side queues
pub struct Frontier {
    state: Mutex<FrontierState>,
    scope: SharedScope,
    limits: FrontierLimits,
    run_id: i64,
}

impl Frontier {
    /// Creates a frontier over a storage backend
    ///
    /// # Arguments
    ///
    /// * `storage` - Storage holding the queues (owned by the frontier from now on)
    /// * `scope` - Scope consulted before a target becomes a queue item
    /// * `limits` - Depth bound and crawl limits
    /// * `run_id` - Run new queue items are attributed to
    pub fn new(storage: SqliteStorage, scope: SharedScope, limits: FrontierLimits, run_id: i64) -> Self {
        Self {
            state: Mutex::new(FrontierState {
                storage,
                claimed_spider: HashMap::new(),
                claimed_render: HashMap::new(),
                claimed_analysis: HashSet::new(),
            }),
            scope,
            limits,
            run_id,
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, FrontierState>> {
        Ok(self.state.lock()?)
    }

    pub fn run_id(&self) -> i64 {
        self.run_id
    }

    pub fn limits(&self) -> FrontierLimits {
        self.limits
    }

    /// Runs a closure against the underlying storage under the frontier lock
    pub fn with_storage<R>(&self, f: impl FnOnce(&mut SqliteStorage) -> StorageResult<R>) -> Result<R> {
        let mut state = self.lock()?;
        Ok(f(&mut state.storage)?)
    }

    /// Adds seed URLs at depth 0
    pub fn seed(&self, urls: &[Url]) -> Result<AddSummary> {
        let targets = urls
            .iter()
            .map(|url| Target::get(url.clone(), None, 0))
            .collect();
        self.add_targets(targets, &mut HashSet::new())
    }

    /// Adds a single discovered target
    pub fn add_target(&self, target: Target) -> Result<AddSummary> {
        self.add_targets(vec![target], &mut HashSet::new())
    }

    /// Adds a batch of discovered targets
    ///
    /// Each target is, in order: dropped if deeper than the depth bound;
    /// skipped if its method and URL were already resolved in `batch`;
    /// folded into the spider (and, for HTML, render) queue if a stored 2xx
    /// response exists for it; skipped if a queue item already holds it;
    /// dropped if out of scope or over a crawl limit; otherwise queued.
    ///
    /// # Arguments
    ///
    /// * `targets` - The discovered targets
    /// * `batch` - Dedup keys already resolved in this batch; updated in place
    pub fn add_targets(&self, targets: Vec<Target>, batch: &mut HashSet<String>) -> Result<AddSummary> {
        let mut state = self.lock()?;
        self.add_targets_locked(&mut state, targets, batch)
    }

    fn add_targets_locked(
        &self,
        state: &mut FrontierState,
        targets: Vec<Target>,
        batch: &mut HashSet<String>,
    ) -> Result<AddSummary> {
        let mut summary = AddSummary::default();

        for target in targets {
            if target.depth > self.limits.max_link_depth {
                tracing::trace!("Dropping {} at depth {}", target.url, target.depth);
                summary.too_deep += 1;
                continue;
            }

            let target = match target.normalized() {
                Some(target) => target,
                None => {
                    summary.invalid += 1;
                    continue;
                }
            };

            let key = target.dedup_key();
            if !batch.insert(key.clone()) {
                summary.duplicate += 1;
                continue;
            }

            if let Some(stored) = state
                .storage
                .find_found_response(&target.method, target.url.as_str())?
            {
                fold_response(&mut state.storage, &stored, target.depth)?;
                summary.folded += 1;
                continue;
            }

            if state.storage.find_queue_item(&key)?.is_some() {
                summary.duplicate += 1;
                continue;
            }

            if !self
                .scope
                .should_include(target.url.as_str(), target.referer.as_deref())
            {
                tracing::trace!("Out of scope: {}", target.url);
                summary.out_of_scope += 1;
                continue;
            }

            let (target_url, query_string) = target.target_and_query();
            if self.over_limit(&state.storage, &target, &target_url, query_string.is_some())? {
                summary.over_limit += 1;
                continue;
            }

            let item = NewQueueItem {
                method: target.method.clone(),
                target_url,
                query_string,
                body_encoding: target.body_encoding.clone(),
                body_params: target.body_params.clone(),
                referer_url: target.referer.clone(),
                depth: target.depth,
                dedup_key: key,
            };

            match state.storage.insert_queue_item(&item, self.run_id)? {
                Some(id) => {
                    tracing::debug!(
                        "Queued {} {} at depth {} (item {})",
                        item.method,
                        target.url,
                        item.depth,
                        id
                    );
                    summary.queued += 1;
                }
                None => summary.duplicate += 1,
            }
        }

        Ok(summary)
    }

    /// Returns true if a crawl limit forbids queueing the target
    fn over_limit(
        &self,
        storage: &SqliteStorage,
        target: &Target,
        target_url: &str,
        has_query: bool,
    ) -> Result<bool> {
        let limits = &self.limits;

        if limits.max_links > 0 && storage.count_queue_items()? >= u64::from(limits.max_links) {
            tracing::trace!("max-links reached, dropping {}", target.url);
            return Ok(true);
        }

        if limits.max_children > 0 {
            if let Some(referer) = &target.referer {
                if storage.count_children(referer)? >= u64::from(limits.max_children) {
                    tracing::trace!("max-children reached for {}, dropping {}", referer, target.url);
                    return Ok(true);
                }
            }
        }

        if limits.max_unique_parameters > 0
            && has_query
            && storage.count_query_variants(&target.method, target_url)?
                >= u64::from(limits.max_unique_parameters)
        {
            tracing::trace!("max-unique-parameters reached for {}", target_url);
            return Ok(true);
        }

        Ok(false)
    }

    /// Claims the next pending queue item and marks it dispatched
    pub fn next_dispatchable(&self) -> Result<Option<QueueItem>> {
        let mut state = self.lock()?;
        let mut item = match state.storage.next_pending_queue_item()? {
            Some(item) => item,
            None => return Ok(None),
        };

        state.storage.update_queue_status(item.id, QueueStatus::Dispatched)?;
        item.status = QueueStatus::Dispatched;
        Ok(Some(item))
    }

    /// Stores the response to a dispatched item, completes the item and queues
    /// the response for analysis
    ///
    /// # Returns
    ///
    /// * `Ok(Some(id))` - The stored response's ID
    /// * `Ok(None)` - The item was not outstanding; nothing was recorded
    pub fn record_fetch(&self, item_id: i64, response: NewResponse) -> Result<Option<i64>> {
        let mut state = self.lock()?;

        let item = match state.storage.get_queue_item(item_id) {
            Ok(item) => item,
            Err(StorageError::QueueItemNotFound(_)) => {
                tracing::error!(
                    implementation_error = true,
                    item = item_id,
                    "Response recorded for an unknown queue item"
                );
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };
        if item.status != QueueStatus::Dispatched {
            tracing::error!(
                implementation_error = true,
                item = item_id,
                status = %item.status,
                "Response recorded for an item that is not outstanding"
            );
            return Ok(None);
        }

        let response_id = state.storage.insert_response(&NewResponse {
            queue_item_id: Some(item_id),
            ..response
        })?;
        state.storage.update_queue_status(item_id, QueueStatus::Complete)?;
        record_response_locked(&mut state.storage, response_id, item.depth)?;

        Ok(Some(response_id))
    }

    /// Completes an item that will never get a response (failed or out of scope)
    pub fn complete_item(&self, item_id: i64) -> Result<bool> {
        let mut state = self.lock()?;
        let item = state.storage.get_queue_item(item_id)?;
        if !item.status.is_outstanding() {
            tracing::error!(
                implementation_error = true,
                item = item_id,
                "Completing an item that is not outstanding"
            );
            return Ok(false);
        }
        state.storage.update_queue_status(item_id, QueueStatus::Complete)?;
        Ok(true)
    }

    /// Returns a dispatched item that was never sent to the pending queue
    ///
    /// # Returns
    ///
    /// False if the item was not dispatched
    pub fn release_item(&self, item_id: i64) -> Result<bool> {
        let mut state = self.lock()?;
        let item = state.storage.get_queue_item(item_id)?;
        if item.status != QueueStatus::Dispatched {
            tracing::error!(
                implementation_error = true,
                item = item_id,
                status = %item.status,
                "Releasing an item that is not dispatched"
            );
            return Ok(false);
        }
        state.storage.update_queue_status(item_id, QueueStatus::Pending)?;
        Ok(true)
    }

    /// Queues a stored response for spider analysis, and for rendering if it is HTML
    ///
    /// # Returns
    ///
    /// False if no response with that ID exists
    pub fn record_response(&self, response_id: i64, depth: u32) -> Result<bool> {
        let mut state = self.lock()?;
        record_response_locked(&mut state.storage, response_id, depth)
    }

    /// Claims the next response waiting for spider analysis
    pub fn next_spider_item(&self) -> Result<Option<SpiderUnit>> {
        let mut state = self.lock()?;

        loop {
            let pending = match state
                .storage
                .next_pending_response(PendingKind::Spider, &claimed_ids(&state.claimed_spider))?
            {
                Some(pending) => pending,
                None => return Ok(None),
            };

            match state.storage.read_response_by_id(pending.response_id)? {
                Some(response) => {
                    state.claimed_spider.insert(pending.response_id, pending.depth);
                    return Ok(Some(SpiderUnit {
                        response,
                        depth: pending.depth,
                    }));
                }
                None => {
                    tracing::error!(
                        implementation_error = true,
                        response = pending.response_id,
                        "Spider row points at a missing response"
                    );
                    state.storage.complete_pending_response(
                        pending.response_id,
                        PendingKind::Spider,
                        pending.depth,
                    )?;
                }
            }
        }
    }

    /// Marks a claimed spider row complete
    ///
    /// A row reopened at a shallower depth while it was claimed stays pending
    /// so the response is mined again from the shallower path.
    ///
    /// # Returns
    ///
    /// False if the response was not claimed for spider analysis
    pub fn mark_spider_item_done(&self, response_id: i64) -> Result<bool> {
        let mut state = self.lock()?;
        let claimed_depth = match state.claimed_spider.remove(&response_id) {
            Some(depth) => depth,
            None => {
                tracing::error!(
                    implementation_error = true,
                    response = response_id,
                    "Spider item done but it was never claimed"
                );
                return Ok(false);
            }
        };

        let completed = state.storage.complete_pending_response(
            response_id,
            PendingKind::Spider,
            claimed_depth,
        )?;
        if !completed {
            tracing::debug!(
                "Response {} was reopened at a shallower depth, mining it again",
                response_id
            );
        }
        Ok(true)
    }

    /// Claims the next response waiting for the renderer
    pub fn record_render_unit(&self) -> Result<Option<RenderUnit>> {
        let mut state = self.lock()?;

        loop {
            let pending = match state
                .storage
                .next_pending_response(PendingKind::Render, &claimed_ids(&state.claimed_render))?
            {
                Some(pending) => pending,
                None => return Ok(None),
            };

            let response = state.storage.read_response_by_id(pending.response_id)?;
            let unit = response.and_then(|response| {
                let base_url = Url::parse(&response.url).ok()?;
                let charset = response
                    .content_type
                    .as_deref()
                    .and_then(crate::extract::charset::charset_from_content_type);
                let (content, _) =
                    crate::extract::charset::decode_document(&response.body, charset.as_deref());
                Some(RenderUnit {
                    response_id: response.id,
                    content,
                    base_url,
                    depth: pending.depth,
                })
            });

            match unit {
                Some(unit) => {
                    state.claimed_render.insert(pending.response_id, pending.depth);
                    return Ok(Some(unit));
                }
                None => {
                    tracing::debug!(
                        "Render row {} has no usable response, skipping",
                        pending.response_id
                    );
                    state.storage.complete_pending_response(
                        pending.response_id,
                        PendingKind::Render,
                        pending.depth,
                    )?;
                }
            }
        }
    }

    /// Completes a render unit and records what the renderer found
    ///
    /// Discoveries are charged at the render unit's depth + 1 and stored as
    /// pending analysis; nothing is recorded when that depth is beyond the bound.
    pub fn complete_render_unit(&self, unit: &RenderUnit, output: RenderOutput) -> Result<bool> {
        let mut state = self.lock()?;
        let claimed_depth = match state.claimed_render.remove(&unit.response_id) {
            Some(depth) => depth,
            None => {
                tracing::error!(
                    implementation_error = true,
                    response = unit.response_id,
                    "Render unit completed but it was never claimed"
                );
                return Ok(false);
            }
        };
        state.storage.complete_pending_response(
            unit.response_id,
            PendingKind::Render,
            claimed_depth,
        )?;

        let depth = unit.depth + 1;
        if depth > self.limits.max_link_depth {
            tracing::trace!("Dropping render discoveries of {} at depth {}", unit.base_url, depth);
            return Ok(true);
        }

        for (link, base) in &output.links {
            state
                .storage
                .insert_pending_analysis(AnalysisKind::Url, link, base, depth)?;
        }
        for id in &output.response_ids {
            state.storage.insert_pending_analysis(
                AnalysisKind::ResponseRef,
                &id.to_string(),
                unit.base_url.as_str(),
                depth,
            )?;
        }
        for (html, base) in &output.html_fragments {
            state
                .storage
                .insert_pending_analysis(AnalysisKind::Html, html, base, depth)?;
        }

        Ok(true)
    }

    /// Converts every pending analysis record into queue items or pending rows
    ///
    /// HTML fragments are extracted outside the lock.
    ///
    /// # Returns
    ///
    /// The combined outcome of the targets added
    pub fn convert_pending_analysis(&self) -> Result<AddSummary> {
        let mut summary = AddSummary::default();

        while let Some(record) = self.claim_pending_analysis()? {
            let targets = analysis_targets(&record);

            let mut state = self.lock()?;
            if record.kind == AnalysisKind::ResponseRef {
                match record.payload.trim().parse::<i64>() {
                    Ok(response_id) => {
                        record_response_locked(&mut state.storage, response_id, record.depth)?;
                    }
                    Err(_) => tracing::debug!("Bad response reference '{}'", record.payload),
                }
            }

            let added = self.add_targets_locked(&mut state, targets, &mut HashSet::new())?;
            summary.absorb(added);

            state.storage.delete_pending_analysis(record.id)?;
            state.claimed_analysis.remove(&record.id);
        }

        Ok(summary)
    }

    fn claim_pending_analysis(&self) -> Result<Option<PendingAnalysis>> {
        let mut state = self.lock()?;
        match state.storage.next_pending_analysis()? {
            Some(record) if !state.claimed_analysis.contains(&record.id) => {
                state.claimed_analysis.insert(record.id);
                Ok(Some(record))
            }
            _ => Ok(None),
        }
    }

    /// Resets items a previous run left dispatched
    pub fn reset_interrupted(&self) -> Result<usize> {
        let mut state = self.lock()?;
        Ok(state.storage.reset_dispatched_items()?)
    }

    /// Returns true while any queue holds unfinished work
    pub fn has_outstanding_work(&self) -> Result<bool> {
        let state = self.lock()?;
        let storage = &state.storage;

        Ok(storage.count_queue_by_status(QueueStatus::Pending)? > 0
            || storage.count_queue_by_status(QueueStatus::Dispatched)? > 0
            || storage.count_pending_responses(PendingKind::Spider, crate::PendingStatus::Pending)? > 0
            || storage.count_pending_responses(PendingKind::Render, crate::PendingStatus::Pending)? > 0
            || storage.count_pending_analysis()? > 0)
    }

    /// Loads crawl statistics from the frontier's storage
    pub fn stats(&self) -> Result<CrawlStatistics> {
        let state = self.lock()?;
        load_statistics(&state.storage)
    }
}

fn claimed_ids(claims: &HashMap<i64, u32>) -> HashSet<i64> {
    claims.keys().copied().collect()
}

/// Makes sure a stored response is mined again at `depth`
fn fold_response(storage: &mut SqliteStorage, response: &StoredResponse, depth: u32) -> Result<()> {
    storage.ensure_pending_response(response.id, PendingKind::Spider, depth)?;
    if response.is_html() {
        storage.ensure_pending_response(response.id, PendingKind::Render, depth)?;
    }
    Ok(())
}

fn record_response_locked(storage: &mut SqliteStorage, response_id: i64, depth: u32) -> Result<bool> {
    match storage.read_response_by_id(response_id)? {
        Some(response) => {
            storage.ensure_pending_response(response.id, PendingKind::Spider, depth)?;
            if response.is_html() && response.is_found() {
                storage.ensure_pending_response(response.id, PendingKind::Render, depth)?;
            }
            Ok(true)
        }
        None => {
            tracing::debug!("No stored response {} to record", response_id);
            Ok(false)
        }
    }
}

/// Turns a URL or HTML analysis record into GET targets
fn analysis_targets(record: &PendingAnalysis) -> Vec<Target> {
    let origin = match Url::parse(&record.origin_url) {
        Ok(origin) => origin,
        Err(e) => {
            tracing::debug!("Bad analysis origin '{}': {}", record.origin_url, e);
            return Vec::new();
        }
    };

    match record.kind {
        AnalysisKind::Url => resolve_link(&record.payload, &origin)
            .map(|url| vec![Target::get(url, Some(origin.as_str()), record.depth)])
            .unwrap_or_default(),
        AnalysisKind::Html => match extract_str(&record.payload, &origin) {
            Ok(result) => result
                .links
                .into_iter()
                .map(|url| Target::get(url, Some(origin.as_str()), record.depth))
                .collect(),
            Err(e) => {
                tracing::debug!("Skipping HTML fragment from {}: {}", origin, e);
                Vec::new()
            }
        },
        AnalysisKind::ResponseRef => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scope::{LiteralMode, PatternList, ScopeFilter, ScopeRuleSet};

    fn limits(max_link_depth: u32) -> FrontierLimits {
        FrontierLimits {
            max_links: 0,
            max_link_depth,
            max_children: 0,
            max_unique_parameters: 0,
        }
    }

    fn frontier_with(scope: SharedScope, limits: FrontierLimits) -> Frontier {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let run_id = storage.create_run("test").unwrap();
        Frontier::new(storage, scope, limits, run_id)
    }

    fn frontier(max_link_depth: u32) -> Frontier {
        frontier_with(SharedScope::default(), limits(max_link_depth))
    }

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    fn html_response(target: &str, body: &str) -> NewResponse {
        NewResponse {
            queue_item_id: None,
            method: "GET".to_string(),
            url: target.to_string(),
            status_code: 200,
            headers: vec![("Content-Type".to_string(), "text/html".to_string())],
            content_type: Some("text/html".to_string()),
            body: body.as_bytes().to_vec(),
        }
    }

    #[test]
    fn test_same_link_twice_in_batch_yields_one_item() {
        let frontier = frontier(5);
        let mut batch = HashSet::new();
        let targets = vec![
            Target::get(url("http://h/a"), Some("http://h/"), 1),
            Target::get(url("http://h/a#top"), Some("http://h/"), 1),
        ];

        let summary = frontier.add_targets(targets, &mut batch).unwrap();
        assert_eq!(summary.queued, 1);
        assert_eq!(summary.duplicate, 1);
        assert_eq!(frontier.stats().unwrap().total_queue_items, 1);
    }

    #[test]
    fn test_already_queued_not_requeued() {
        let frontier = frontier(5);
        frontier
            .add_target(Target::get(url("http://h/a"), Some("http://h/"), 1))
            .unwrap();
        let summary = frontier
            .add_target(Target::get(url("http://h/a"), Some("http://h/"), 2))
            .unwrap();

        assert_eq!(summary.queued, 0);
        assert_eq!(summary.duplicate, 1);
    }

    #[test]
    fn test_depth_cutoff() {
        let frontier = frontier(2);
        let summary = frontier
            .add_targets(
                vec![
                    Target::get(url("http://h/b"), Some("http://h/"), 2),
                    Target::get(url("http://h/c"), Some("http://h/"), 3),
                ],
                &mut HashSet::new(),
            )
            .unwrap();

        assert_eq!(summary.queued, 1);
        assert_eq!(summary.too_deep, 1);
    }

    #[test]
    fn test_out_of_scope_dropped() {
        let mut rules = ScopeRuleSet::default();
        rules.exclude_paths = PatternList::compile(&["/private".to_string()], LiteralMode::Prefix, false);
        let frontier = frontier_with(SharedScope::new(ScopeFilter::new(rules)), limits(5));

        let summary = frontier
            .add_targets(
                vec![
                    Target::get(url("http://h/private/x"), Some("http://h/"), 1),
                    Target::get(url("http://other/"), Some("http://h/"), 1),
                    Target::get(url("http://h/public"), Some("http://h/"), 1),
                ],
                &mut HashSet::new(),
            )
            .unwrap();

        assert_eq!(summary.out_of_scope, 2);
        assert_eq!(summary.queued, 1);
    }

    #[test]
    fn test_dispatch_and_record_fetch() {
        let frontier = frontier(5);
        frontier.seed(&[url("http://h/")]).unwrap();

        let item = frontier.next_dispatchable().unwrap().unwrap();
        assert_eq!(item.status, QueueStatus::Dispatched);
        assert_eq!(item.depth, 0);
        assert!(frontier.next_dispatchable().unwrap().is_none());

        let response_id = frontier
            .record_fetch(item.id, html_response("http://h/", "<a href='/a'>a</a>"))
            .unwrap()
            .unwrap();

        // Recording twice is an implementation error and is ignored
        assert!(frontier
            .record_fetch(item.id, html_response("http://h/", "x"))
            .unwrap()
            .is_none());

        let spider = frontier.next_spider_item().unwrap().unwrap();
        assert_eq!(spider.response.id, response_id);
        assert_eq!(spider.depth, 0);
        assert!(frontier.next_spider_item().unwrap().is_none());

        let render = frontier.record_render_unit().unwrap().unwrap();
        assert_eq!(render.response_id, response_id);
        assert_eq!(render.content, "<a href='/a'>a</a>");

        assert!(frontier.has_outstanding_work().unwrap());
        assert!(frontier.mark_spider_item_done(response_id).unwrap());
        assert!(!frontier.mark_spider_item_done(response_id).unwrap());
        assert!(frontier
            .complete_render_unit(&render, RenderOutput::default())
            .unwrap());
        assert!(!frontier.has_outstanding_work().unwrap());
    }

    #[test]
    fn test_stored_response_is_folded_not_refetched() {
        let frontier = frontier(5);
        let response_id = frontier
            .with_storage(|s| s.insert_response(&html_response("http://h/known", "<p>x</p>")))
            .unwrap();

        let summary = frontier
            .add_target(Target::get(url("http://h/known"), Some("http://h/"), 2))
            .unwrap();
        assert_eq!(summary.folded, 1);
        assert_eq!(summary.queued, 0);

        let spider = frontier.next_spider_item().unwrap().unwrap();
        assert_eq!(spider.response.id, response_id);
        assert_eq!(spider.depth, 2);
        assert!(frontier.record_render_unit().unwrap().is_some());
    }

    #[test]
    fn test_non_html_response_not_rendered() {
        let frontier = frontier(5);
        frontier
            .with_storage(|s| {
                s.insert_response(&NewResponse {
                    content_type: Some("application/json".to_string()),
                    ..html_response("http://h/data", "{}")
                })
            })
            .unwrap();

        frontier
            .add_target(Target::get(url("http://h/data"), Some("http://h/"), 1))
            .unwrap();
        assert!(frontier.next_spider_item().unwrap().is_some());
        assert!(frontier.record_render_unit().unwrap().is_none());
    }

    #[test]
    fn test_crawl_limits() {
        let frontier = frontier_with(
            SharedScope::default(),
            FrontierLimits {
                max_links: 0,
                max_link_depth: 5,
                max_children: 0,
                max_unique_parameters: 2,
            },
        );
        let targets = (0..4)
            .map(|i| Target::get(url(&format!("http://h/s?q={}", i)), Some("http://h/"), 1))
            .collect();
        let summary = frontier.add_targets(targets, &mut HashSet::new()).unwrap();
        assert_eq!(summary.queued, 2);
        assert_eq!(summary.over_limit, 2);

        let frontier = frontier_with(
            SharedScope::default(),
            FrontierLimits {
                max_links: 3,
                max_link_depth: 5,
                max_children: 0,
                max_unique_parameters: 0,
            },
        );
        let targets = (0..5)
            .map(|i| Target::get(url(&format!("http://h/{}", i)), Some("http://h/"), 1))
            .collect();
        let summary = frontier.add_targets(targets, &mut HashSet::new()).unwrap();
        assert_eq!(summary.queued, 3);
        assert_eq!(summary.over_limit, 2);
    }

    #[test]
    fn test_render_discoveries_become_targets_at_unit_depth_plus_one() {
        let frontier = frontier(5);
        let response_id = frontier
            .with_storage(|s| s.insert_response(&html_response("http://h/page", "<p>x</p>")))
            .unwrap();
        frontier.record_response(response_id, 1).unwrap();

        let unit = frontier.record_render_unit().unwrap().unwrap();
        let output = RenderOutput {
            links: vec![("/clicked".to_string(), "http://h/page".to_string())],
            response_ids: Vec::new(),
            html_fragments: vec![(
                "<a href='/fragment'>f</a>".to_string(),
                "http://h/page".to_string(),
            )],
        };
        frontier.complete_render_unit(&unit, output).unwrap();

        let summary = frontier.convert_pending_analysis().unwrap();
        assert_eq!(summary.queued, 2);

        let item = frontier.next_dispatchable().unwrap().unwrap();
        assert_eq!(item.depth, 2);
        assert_eq!(frontier.stats().unwrap().pending_analysis, 0);
    }

    #[test]
    fn test_render_discoveries_beyond_depth_dropped() {
        let frontier = frontier(1);
        let response_id = frontier
            .with_storage(|s| s.insert_response(&html_response("http://h/page", "<p>x</p>")))
            .unwrap();
        frontier.record_response(response_id, 1).unwrap();

        let unit = frontier.record_render_unit().unwrap().unwrap();
        let output = RenderOutput {
            links: vec![("/deep".to_string(), "http://h/page".to_string())],
            ..Default::default()
        };
        frontier.complete_render_unit(&unit, output).unwrap();
        assert_eq!(frontier.stats().unwrap().pending_analysis, 0);
    }

    #[test]
    fn test_reset_interrupted() {
        let frontier = frontier(5);
        frontier.seed(&[url("http://h/")]).unwrap();
        frontier.next_dispatchable().unwrap().unwrap();

        assert_eq!(frontier.reset_interrupted().unwrap(), 1);
        assert!(frontier.next_dispatchable().unwrap().is_some());
    }

    #[test]
    fn test_shallower_rediscovery_while_claimed_is_mined_again() {
        let frontier = frontier(5);
        let response_id = frontier
            .with_storage(|s| s.insert_response(&html_response("http://h/x", "<p>x</p>")))
            .unwrap();
        frontier.record_response(response_id, 4).unwrap();

        let claimed = frontier.next_spider_item().unwrap().unwrap();
        assert_eq!(claimed.depth, 4);

        let summary = frontier
            .add_target(Target::get(url("http://h/x"), Some("http://h/"), 1))
            .unwrap();
        assert_eq!(summary.folded, 1);

        assert!(frontier.mark_spider_item_done(response_id).unwrap());
        let again = frontier.next_spider_item().unwrap().unwrap();
        assert_eq!(again.response.id, response_id);
        assert_eq!(again.depth, 1);

        assert!(frontier.mark_spider_item_done(response_id).unwrap());
        assert!(frontier.next_spider_item().unwrap().is_none());
    }

    #[test]
    fn test_max_children_per_referer() {
        let frontier = frontier_with(
            SharedScope::default(),
            FrontierLimits {
                max_links: 0,
                max_link_depth: 5,
                max_children: 2,
                max_unique_parameters: 0,
            },
        );
        let mut targets: Vec<Target> = (0..4)
            .map(|i| Target::get(url(&format!("http://h/a/{}", i)), Some("http://h/a/"), 1))
            .collect();
        targets.push(Target::get(url("http://h/b/0"), Some("http://h/b/"), 1));

        let summary = frontier.add_targets(targets, &mut HashSet::new()).unwrap();
        assert_eq!(summary.queued, 3);
        assert_eq!(summary.over_limit, 2);
    }

    #[test]
    fn test_record_fetch_for_unknown_item_is_ignored() {
        let frontier = frontier(5);
        let recorded = frontier
            .record_fetch(999, html_response("http://h/ghost", "x"))
            .unwrap();

        assert!(recorded.is_none());
        assert_eq!(frontier.stats().unwrap().total_responses, 0);
    }

    #[test]
    fn test_released_item_is_dispatchable_again() {
        let frontier = frontier(5);
        frontier.seed(&[url("http://h/")]).unwrap();
        let item = frontier.next_dispatchable().unwrap().unwrap();

        assert!(frontier.release_item(item.id).unwrap());
        assert!(!frontier.release_item(item.id).unwrap());

        let again = frontier.next_dispatchable().unwrap().unwrap();
        assert_eq!(again.id, item.id);
    }

    #[test]
    fn test_complete_item_twice_is_rejected() {
        let frontier = frontier(5);
        frontier.seed(&[url("http://h/")]).unwrap();
        let item = frontier.next_dispatchable().unwrap().unwrap();

        assert!(frontier.complete_item(item.id).unwrap());
        assert!(!frontier.complete_item(item.id).unwrap());
    }
}
