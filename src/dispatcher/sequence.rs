//! Sequence collaborator: ordered preparatory requests such as a login

use crate::dispatcher::exchange::{ExchangeRequest, ExchangeResponse};
use regex::bytes::Regex;

/// What a sequence decides after seeing a user exchange
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SequenceVerdict {
    /// Replay the sequence before further user exchanges
    pub need_sequence: bool,
    /// Send the analyzed exchange again once the sequence has run
    pub run_again: bool,
}

/// An ordered list of requests replayed before or between crawl requests
pub trait Sequence: Send + Sync {
    /// Whether the sequence can tell from a response that the session was lost
    ///
    /// When it cannot, the dispatcher sends one exchange at a time.
    fn has_session_detection(&self) -> bool;

    /// The requests to replay, in order
    fn request_list(&self) -> Vec<ExchangeRequest>;

    /// Inspects a completed user exchange
    fn analyze_response(
        &self,
        request: &ExchangeRequest,
        response: &ExchangeResponse,
    ) -> SequenceVerdict;
}

/// A fixed request list with an optional logged-out marker
///
/// When a response body matches the marker the session is considered lost:
/// the sequence is replayed and the exchange sent again.
pub struct StaticSequence {
    requests: Vec<ExchangeRequest>,
    logged_out: Option<Regex>,
}

impl StaticSequence {
    pub fn new(requests: Vec<ExchangeRequest>) -> Self {
        Self {
            requests,
            logged_out: None,
        }
    }

    /// Sets the pattern that marks a logged-out response body
    pub fn with_logged_out_marker(mut self, marker: Regex) -> Self {
        self.logged_out = Some(marker);
        self
    }
}

impl Sequence for StaticSequence {
    fn has_session_detection(&self) -> bool {
        self.logged_out.is_some()
    }

    fn request_list(&self) -> Vec<ExchangeRequest> {
        self.requests.clone()
    }

    fn analyze_response(
        &self,
        _request: &ExchangeRequest,
        response: &ExchangeResponse,
    ) -> SequenceVerdict {
        match &self.logged_out {
            Some(marker) if marker.is_match(&response.body) => SequenceVerdict {
                need_sequence: true,
                run_again: true,
            },
            _ => SequenceVerdict::default(),
        }
    }
}
