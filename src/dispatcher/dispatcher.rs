//! Bounded concurrent request dispatcher
//!
//! Exchanges wait in an ordered queue and are started while fewer than the
//! effective cap are running. Each exchange runs on its own task; its
//! outcome comes back through `on_response`, which settles sequence replay
//! and then hands the outcome to the response callback.
//!
//! All queue and in-flight bookkeeping lives in one `DispatchState` behind
//! one mutex. The lock is never held across an await or while the callback
//! runs.
//!
//! A stopped dispatcher sends nothing new. Queued user exchanges come back
//! as `Cancelled` so every context handed out still gets exactly one outcome;
//! queued sequence requests are dropped.

use crate::dispatcher::exchange::{
    ContextToken, ExchangeOutcome, ExchangeRequest, ExchangeResult, ExchangeState, Origin,
};
use crate::dispatcher::sequence::Sequence;
use crate::dispatcher::transport::Transport;
use crate::scope::SharedScope;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// Times a user exchange may be sent again on a sequence's request
const MAX_SEQUENCE_RETRIES: u32 = 2;

/// Callback receiving each finished user exchange
pub type OutcomeCallback = Arc<dyn Fn(ExchangeOutcome) + Send + Sync>;

/// Dispatcher limits
#[derive(Debug, Clone, Copy)]
pub struct DispatcherConfig {
    /// Exchanges allowed in flight at once
    pub max_concurrent: usize,
    /// Forced-abort bound for a single exchange
    pub request_timeout: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 10,
            request_timeout: Duration::from_secs(30),
        }
    }
}

struct ExchangeRecord {
    request: ExchangeRequest,
    origin: Origin,
    state: ExchangeState,
    attempts: u32,
}

#[derive(Default)]
struct DispatchState {
    queue: VecDeque<ContextToken>,
    exchanges: HashMap<ContextToken, ExchangeRecord>,
    /// Exchanges in `Connecting` or `InFlight`
    active: usize,
    /// Active exchanges that belong to a sequence replay
    active_sequence: usize,
    peak_active: usize,
    next_token: u64,
    stopped: bool,
}

impl DispatchState {
    fn allocate(&mut self) -> ContextToken {
        self.next_token += 1;
        ContextToken::new(self.next_token)
    }

    /// Queues sequence requests ahead of everything else, keeping their order
    fn push_sequence_front(&mut self, requests: Vec<ExchangeRequest>, origin: Origin) {
        for request in requests.into_iter().rev() {
            let token = self.allocate();
            self.exchanges.insert(
                token,
                ExchangeRecord {
                    request,
                    origin,
                    state: ExchangeState::Idle,
                    attempts: 0,
                },
            );
            self.queue.push_front(token);
        }
    }

    /// Empties the queue, returning outcomes for the user exchanges in it
    fn cancel_queued(&mut self) -> Vec<ExchangeOutcome> {
        let mut cancelled = Vec::new();
        while let Some(token) = self.queue.pop_front() {
            match self.exchanges.remove(&token) {
                Some(record) if record.origin == Origin::User => {
                    cancelled.push(ExchangeOutcome {
                        context: token,
                        request: record.request,
                        result: ExchangeResult::Cancelled,
                    });
                }
                Some(record) => {
                    tracing::trace!("Dropping queued sequence request {}", record.request.url);
                }
                None => {}
            }
        }
        cancelled
    }
}

/// Runs HTTP exchanges under a concurrency cap
pub struct Dispatcher {
    state: Mutex<DispatchState>,
    transport: Arc<dyn Transport>,
    scope: SharedScope,
    config: DispatcherConfig,
    on_outcome: OutcomeCallback,
    sequence: Option<Arc<dyn Sequence>>,
    post_sequence: Option<Arc<dyn Sequence>>,
}

impl Dispatcher {
    /// Creates a dispatcher
    ///
    /// # Arguments
    ///
    /// * `transport` - Performs the network I/O
    /// * `scope` - Re-checked when an exchange is about to be sent
    /// * `config` - Concurrency cap and per-exchange timeout
    /// * `on_outcome` - Receives every finished user exchange
    pub fn new(
        transport: Arc<dyn Transport>,
        scope: SharedScope,
        config: DispatcherConfig,
        on_outcome: OutcomeCallback,
    ) -> Self {
        Self {
            state: Mutex::new(DispatchState::default()),
            transport,
            scope,
            config,
            on_outcome,
            sequence: None,
            post_sequence: None,
        }
    }

    /// Configures the sequence replayed before crawl requests
    ///
    /// Its requests are queued immediately, ahead of any user exchange.
    pub fn with_sequence(mut self, sequence: Arc<dyn Sequence>) -> Self {
        let requests = sequence.request_list();
        self.lock().push_sequence_front(requests, Origin::Sequence);
        self.sequence = Some(sequence);
        self
    }

    /// Configures the sequence replayed after every user exchange
    pub fn with_post_sequence(mut self, sequence: Arc<dyn Sequence>) -> Self {
        self.post_sequence = Some(sequence);
        self
    }

    fn lock(&self) -> MutexGuard<'_, DispatchState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Returns the number of exchanges allowed in flight right now
    ///
    /// Sequence replay must observe every response before the next request,
    /// so the dispatcher single-steps when a post-sequence is configured or
    /// when the sequence cannot detect a lost session on its own.
    pub fn effective_cap(&self) -> usize {
        let single_step = self.post_sequence.is_some()
            || self
                .sequence
                .as_ref()
                .map(|s| !s.has_session_detection())
                .unwrap_or(false);

        if single_step {
            1
        } else {
            self.config.max_concurrent.max(1)
        }
    }

    /// Queues a user exchange
    ///
    /// # Returns
    ///
    /// The context token its outcome will carry
    pub fn enqueue(self: &Arc<Self>, request: ExchangeRequest) -> ContextToken {
        let token = {
            let mut state = self.lock();
            let token = state.allocate();
            state.exchanges.insert(
                token,
                ExchangeRecord {
                    request,
                    origin: Origin::User,
                    state: ExchangeState::Idle,
                    attempts: 0,
                },
            );
            state.queue.push_back(token);
            token
        };

        tracing::trace!("Queued exchange {}", token);
        self.pump();
        token
    }

    /// Stops starting new exchanges
    ///
    /// Running exchanges finish and are delivered. Queued ones are
    /// delivered as `Cancelled`, and so is anything queued while stopped.
    pub fn stop(&self) {
        let cancelled = {
            let mut state = self.lock();
            state.stopped = true;
            state.cancel_queued()
        };
        tracing::debug!("Dispatcher stopped, {} queued exchanges cancelled", cancelled.len());

        for outcome in cancelled {
            (self.on_outcome)(outcome);
        }
    }

    /// Resumes starting exchanges after `stop`
    pub fn resume(self: &Arc<Self>) {
        self.lock().stopped = false;
        self.pump();
    }

    pub fn is_stopped(&self) -> bool {
        self.lock().stopped
    }

    /// Returns the number of exchanges counted against the cap
    pub fn in_flight(&self) -> usize {
        self.lock().active
    }

    /// Returns the number of exchanges waiting to start
    pub fn queued(&self) -> usize {
        self.lock().queue.len()
    }

    /// Returns the highest number of exchanges ever in flight at once
    pub fn peak_in_flight(&self) -> usize {
        self.lock().peak_active
    }

    /// Returns true when nothing is queued or running
    pub fn is_idle(&self) -> bool {
        let state = self.lock();
        state.active == 0 && state.queue.is_empty()
    }

    /// Returns the state of a live exchange, or None once it has been delivered
    pub fn exchange_state(&self, context: ContextToken) -> Option<ExchangeState> {
        self.lock().exchanges.get(&context).map(|record| record.state)
    }

    /// Starts queued exchanges while the cap allows
    fn pump(self: &Arc<Self>) {
        let cap = self.effective_cap();
        let mut to_start = Vec::new();
        let mut rejected = Vec::new();

        {
            let mut state = self.lock();
            if state.stopped {
                rejected = state.cancel_queued();
            }

            while !state.stopped && state.active < cap && state.active_sequence == 0 {
                let token = match state.queue.front() {
                    Some(&token) => token,
                    None => break,
                };

                let origin = match state.exchanges.get(&token) {
                    Some(record) => record.origin,
                    None => {
                        tracing::error!(
                            implementation_error = true,
                            context = %token,
                            "Queued context has no exchange record"
                        );
                        state.queue.pop_front();
                        continue;
                    }
                };

                // Sequence requests run alone and in order
                if origin != Origin::User && state.active > 0 {
                    break;
                }
                state.queue.pop_front();

                if origin == Origin::User {
                    let in_scope = state
                        .exchanges
                        .get(&token)
                        .map(|r| {
                            self.scope
                                .should_include(r.request.url.as_str(), r.request.referer.as_deref())
                        })
                        .unwrap_or(false);

                    if !in_scope {
                        if let Some(record) = state.exchanges.remove(&token) {
                            tracing::debug!(
                                "Not sending {} {}: out of scope",
                                record.request.method,
                                record.request.url
                            );
                            rejected.push(ExchangeOutcome {
                                context: token,
                                request: record.request,
                                result: ExchangeResult::OutOfScope,
                            });
                        }
                        continue;
                    }
                }

                if let Some(record) = state.exchanges.get_mut(&token) {
                    record.state = ExchangeState::Connecting;
                    to_start.push((token, record.request.clone()));
                }
                state.active += 1;
                if origin != Origin::User {
                    state.active_sequence += 1;
                }
                state.peak_active = state.peak_active.max(state.active);
            }
        }

        for outcome in rejected {
            (self.on_outcome)(outcome);
        }

        for (token, request) in to_start {
            let dispatcher = Arc::clone(self);
            tokio::spawn(async move {
                dispatcher.run_exchange(token, request).await;
            });
        }
    }

    async fn run_exchange(self: Arc<Self>, context: ContextToken, request: ExchangeRequest) {
        if let Some(record) = self.lock().exchanges.get_mut(&context) {
            record.state = ExchangeState::InFlight;
        }

        tracing::debug!("Sending {} {} ({})", request.method, request.url, context);
        let result = match tokio::time::timeout(
            self.config.request_timeout,
            self.transport.execute(&request),
        )
        .await
        {
            Ok(Ok(response)) => ExchangeResult::Completed(response),
            Ok(Err(e)) => {
                tracing::warn!("Exchange {} for {} failed: {}", context, request.url, e);
                ExchangeResult::Failed(e.to_string())
            }
            Err(_) => {
                tracing::warn!(
                    "Exchange {} for {} timed out after {:?}",
                    context,
                    request.url,
                    self.config.request_timeout
                );
                ExchangeResult::Failed(format!(
                    "timed out after {}s",
                    self.config.request_timeout.as_secs()
                ))
            }
        };

        self.on_response(context, result);
    }

    /// Settles a finished exchange
    ///
    /// # Returns
    ///
    /// False if the context was unknown and the result was discarded
    fn on_response(self: &Arc<Self>, context: ContextToken, result: ExchangeResult) -> bool {
        let mut deliver = None;

        {
            let mut state = self.lock();
            let mut record = match state.exchanges.remove(&context) {
                Some(record) if record.state != ExchangeState::Idle => record,
                Some(record) => {
                    // Put it back; it was never started
                    state.exchanges.insert(context, record);
                    tracing::error!(
                        implementation_error = true,
                        context = %context,
                        "Response for an exchange that was never started"
                    );
                    return false;
                }
                None => {
                    tracing::error!(
                        implementation_error = true,
                        context = %context,
                        "Response for unknown context"
                    );
                    return false;
                }
            };

            state.active = state.active.saturating_sub(1);
            if record.origin != Origin::User {
                state.active_sequence = state.active_sequence.saturating_sub(1);
                if let ExchangeResult::Failed(reason) = &result {
                    tracing::warn!("Sequence request {} failed: {}", record.request.url, reason);
                }
                record.state = ExchangeState::Completed;
            } else {
                let verdict = match (&self.sequence, &result) {
                    (Some(sequence), ExchangeResult::Completed(response)) => {
                        sequence.analyze_response(&record.request, response)
                    }
                    _ => Default::default(),
                };

                let retry = verdict.run_again && record.attempts < MAX_SEQUENCE_RETRIES;
                if retry {
                    tracing::debug!(
                        "Sending {} again after sequence replay",
                        record.request.url
                    );
                    record.attempts += 1;
                    record.state = ExchangeState::Idle;
                    state.exchanges.insert(context, record);
                    state.queue.push_front(context);
                } else {
                    if verdict.run_again {
                        tracing::warn!(
                            "Giving up on replaying {} after {} attempts",
                            record.request.url,
                            record.attempts
                        );
                    }
                    deliver = Some(ExchangeOutcome {
                        context,
                        request: record.request,
                        result,
                    });
                }

                if verdict.need_sequence {
                    if let Some(sequence) = &self.sequence {
                        state.push_sequence_front(sequence.request_list(), Origin::Sequence);
                    }
                }

                if deliver.is_some() {
                    if let Some(post) = &self.post_sequence {
                        state.push_sequence_front(post.request_list(), Origin::PostSequence);
                    }
                }
            }
        }

        if let Some(outcome) = deliver {
            (self.on_outcome)(outcome);
        }

        self.pump();
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatcher::exchange::ExchangeResponse;
    use crate::dispatcher::sequence::{SequenceVerdict, StaticSequence};
    use crate::dispatcher::transport::TransportError;
    use crate::scope::{LiteralMode, PatternList, ScopeFilter, ScopeRuleSet};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::mpsc;
    use url::Url;

    /// Transport that answers every request after a short delay
    struct SlowTransport {
        delay: Duration,
        live: AtomicUsize,
        peak: AtomicUsize,
        seen: Mutex<Vec<String>>,
    }

    impl SlowTransport {
        fn new(delay: Duration) -> Self {
            Self {
                delay,
                live: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Transport for SlowTransport {
        async fn execute(
            &self,
            request: &ExchangeRequest,
        ) -> Result<ExchangeResponse, TransportError> {
            let live = self.live.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(live, Ordering::SeqCst);
            self.seen.lock().unwrap().push(request.url.path().to_string());
            tokio::time::sleep(self.delay).await;
            self.live.fetch_sub(1, Ordering::SeqCst);

            Ok(ExchangeResponse {
                status: 200,
                headers: Vec::new(),
                body: b"ok".to_vec(),
                final_url: request.url.clone(),
            })
        }
    }

    fn channel() -> (OutcomeCallback, mpsc::UnboundedReceiver<ExchangeOutcome>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let callback: OutcomeCallback = Arc::new(move |outcome| {
            let _ = tx.send(outcome);
        });
        (callback, rx)
    }

    fn request(path: &str) -> ExchangeRequest {
        ExchangeRequest::get(Url::parse(&format!("http://h{}", path)).unwrap())
    }

    fn config(max_concurrent: usize) -> DispatcherConfig {
        DispatcherConfig {
            max_concurrent,
            request_timeout: Duration::from_secs(5),
        }
    }

    #[tokio::test]
    async fn test_cap_is_never_exceeded() {
        let transport = Arc::new(SlowTransport::new(Duration::from_millis(20)));
        let (callback, mut rx) = channel();
        let dispatcher = Arc::new(Dispatcher::new(
            transport.clone(),
            SharedScope::default(),
            config(3),
            callback,
        ));

        let tokens: Vec<_> = (0..10)
            .map(|i| dispatcher.enqueue(request(&format!("/{}", i))))
            .collect();
        assert!(dispatcher.in_flight() <= 3);

        let mut delivered = Vec::new();
        for _ in 0..10 {
            delivered.push(rx.recv().await.unwrap().context);
        }
        delivered.sort();

        assert_eq!(delivered, tokens);
        assert!(transport.peak.load(Ordering::SeqCst) <= 3);
        assert_eq!(dispatcher.peak_in_flight(), 3);
        assert!(dispatcher.is_idle());
    }

    #[tokio::test]
    async fn test_timeout_delivers_failed_outcome() {
        let transport = Arc::new(SlowTransport::new(Duration::from_secs(10)));
        let (callback, mut rx) = channel();
        let dispatcher = Arc::new(Dispatcher::new(
            transport,
            SharedScope::default(),
            DispatcherConfig {
                max_concurrent: 1,
                request_timeout: Duration::from_millis(50),
            },
            callback,
        ));

        let token = dispatcher.enqueue(request("/slow"));
        let outcome = rx.recv().await.unwrap();
        assert_eq!(outcome.context, token);
        assert!(matches!(outcome.result, ExchangeResult::Failed(_)));
        assert!(dispatcher.is_idle());
    }

    #[tokio::test]
    async fn test_out_of_scope_at_send_time() {
        let transport = Arc::new(SlowTransport::new(Duration::from_millis(1)));
        let (callback, mut rx) = channel();

        let mut rules = ScopeRuleSet::default();
        rules.exclude_paths =
            PatternList::compile(&["/admin".to_string()], LiteralMode::Prefix, false);
        let scope = SharedScope::new(ScopeFilter::new(rules));
        let dispatcher = Arc::new(Dispatcher::new(
            transport.clone(),
            scope,
            config(2),
            callback,
        ));

        dispatcher.enqueue(request("/admin/panel"));
        let outcome = rx.recv().await.unwrap();
        assert_eq!(outcome.result, ExchangeResult::OutOfScope);
        assert_eq!(dispatcher.peak_in_flight(), 0);
        assert!(transport.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_sequence_without_detection_single_steps() {
        let transport = Arc::new(SlowTransport::new(Duration::from_millis(10)));
        let (callback, mut rx) = channel();
        let login = Arc::new(StaticSequence::new(vec![request("/login")]));
        let dispatcher = Arc::new(
            Dispatcher::new(transport.clone(), SharedScope::default(), config(8), callback)
                .with_sequence(login),
        );
        assert_eq!(dispatcher.effective_cap(), 1);

        for i in 0..4 {
            dispatcher.enqueue(request(&format!("/{}", i)));
        }
        for _ in 0..4 {
            rx.recv().await.unwrap();
        }

        assert_eq!(transport.peak.load(Ordering::SeqCst), 1);
        let seen = transport.seen.lock().unwrap().clone();
        assert_eq!(seen.first().map(String::as_str), Some("/login"));
        assert_eq!(seen.len(), 5);
    }

    struct LogoutOnce {
        tripped: AtomicUsize,
    }

    impl Sequence for LogoutOnce {
        fn has_session_detection(&self) -> bool {
            true
        }

        fn request_list(&self) -> Vec<ExchangeRequest> {
            vec![request("/login")]
        }

        fn analyze_response(
            &self,
            request: &ExchangeRequest,
            _response: &ExchangeResponse,
        ) -> SequenceVerdict {
            if request.url.path() == "/account" && self.tripped.fetch_add(1, Ordering::SeqCst) == 0
            {
                SequenceVerdict {
                    need_sequence: true,
                    run_again: true,
                }
            } else {
                SequenceVerdict::default()
            }
        }
    }

    #[tokio::test]
    async fn test_run_again_replays_sequence_then_request() {
        let transport = Arc::new(SlowTransport::new(Duration::from_millis(1)));
        let (callback, mut rx) = channel();
        let sequence = Arc::new(LogoutOnce {
            tripped: AtomicUsize::new(0),
        });
        let dispatcher = Arc::new(
            Dispatcher::new(transport.clone(), SharedScope::default(), config(4), callback)
                .with_sequence(sequence),
        );

        let token = dispatcher.enqueue(request("/account"));
        let outcome = rx.recv().await.unwrap();
        assert_eq!(outcome.context, token);

        // Initial login, account, replayed login, account again
        let seen = transport.seen.lock().unwrap().clone();
        assert_eq!(seen, vec!["/login", "/account", "/login", "/account"]);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_post_sequence_runs_after_each_user_exchange() {
        let transport = Arc::new(SlowTransport::new(Duration::from_millis(1)));
        let (callback, mut rx) = channel();
        let post = Arc::new(StaticSequence::new(vec![request("/logout-check")]));
        let dispatcher = Arc::new(
            Dispatcher::new(transport.clone(), SharedScope::default(), config(4), callback)
                .with_post_sequence(post),
        );
        assert_eq!(dispatcher.effective_cap(), 1);

        dispatcher.enqueue(request("/a"));
        dispatcher.enqueue(request("/b"));
        rx.recv().await.unwrap();
        rx.recv().await.unwrap();

        // Let the trailing post-sequence finish
        while !dispatcher.is_idle() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        let seen = transport.seen.lock().unwrap().clone();
        assert_eq!(seen, vec!["/a", "/logout-check", "/b", "/logout-check"]);
    }

    #[tokio::test]
    async fn test_unknown_context_is_discarded() {
        let transport = Arc::new(SlowTransport::new(Duration::from_millis(1)));
        let (callback, mut rx) = channel();
        let dispatcher = Arc::new(Dispatcher::new(
            transport,
            SharedScope::default(),
            config(2),
            callback,
        ));

        let handled = dispatcher.on_response(
            ContextToken::new(4242),
            ExchangeResult::Failed("stray".to_string()),
        );
        assert!(!handled);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_stop_cancels_queued_exchanges() {
        let transport = Arc::new(SlowTransport::new(Duration::from_millis(1)));
        let (callback, mut rx) = channel();
        let dispatcher = Arc::new(Dispatcher::new(
            transport.clone(),
            SharedScope::default(),
            config(2),
            callback,
        ));

        dispatcher.stop();
        assert!(dispatcher.is_stopped());
        let token = dispatcher.enqueue(request("/held"));
        let outcome = rx.recv().await.unwrap();
        assert_eq!(outcome.context, token);
        assert_eq!(outcome.result, ExchangeResult::Cancelled);
        assert_eq!(dispatcher.exchange_state(token), None);
        assert!(dispatcher.is_idle());

        dispatcher.resume();
        assert!(!dispatcher.is_stopped());
        let token = dispatcher.enqueue(request("/sent"));
        let outcome = rx.recv().await.unwrap();
        assert_eq!(outcome.context, token);
        assert!(matches!(outcome.result, ExchangeResult::Completed(_)));
        assert_eq!(*transport.seen.lock().unwrap(), vec!["/sent"]);
    }

    #[tokio::test]
    async fn test_stop_during_sequence_cancels_waiting_exchange() {
        let transport = Arc::new(SlowTransport::new(Duration::from_millis(200)));
        let (callback, mut rx) = channel();
        let login = Arc::new(StaticSequence::new(vec![request("/login")]));
        let dispatcher = Arc::new(
            Dispatcher::new(transport.clone(), SharedScope::default(), config(4), callback)
                .with_sequence(login),
        );

        let token = dispatcher.enqueue(request("/page"));
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(dispatcher.queued(), 1);

        dispatcher.stop();
        let outcome = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(outcome.context, token);
        assert_eq!(outcome.result, ExchangeResult::Cancelled);

        while !dispatcher.is_idle() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(*transport.seen.lock().unwrap(), vec!["/login"]);
        assert!(rx.try_recv().is_err());
    }
}
