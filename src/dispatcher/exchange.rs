//! Exchange types shared by the dispatcher and its collaborators

use std::fmt;
use url::Url;

/// Opaque identifier correlating a dispatched exchange with its requester
///
/// Tokens are allocated by the dispatcher and used once: the outcome carrying
/// a token is delivered at most one time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextToken(u64);

impl fmt::Display for ContextToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ctx-{}", self.0)
    }
}

impl ContextToken {
    pub(crate) fn new(value: u64) -> Self {
        Self(value)
    }
}

/// Lifecycle of one managed exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeState {
    /// Queued, not yet started
    Idle,
    /// Taken off the queue and counted against the cap
    Connecting,
    /// Waiting on the transport
    InFlight,
    Completed,
}

/// Who asked for an exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Crawl work handed in through `enqueue`
    User,
    /// Replay of the configured sequence
    Sequence,
    /// Replay of the post-sequence after a user exchange
    PostSequence,
}

/// Request body, by encoding
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestBody {
    /// `application/x-www-form-urlencoded`
    UrlEncoded(String),
    /// `multipart/form-data` text fields
    Multipart(Vec<(String, String)>),
}

impl RequestBody {
    /// Builds a body from stored form parameters and their encoding
    ///
    /// # Arguments
    ///
    /// * `encoding` - The body encoding recorded on the queue item
    /// * `params` - Form-urlencoded parameters
    pub fn from_params(encoding: Option<&str>, params: &str) -> Self {
        match encoding {
            Some(e) if e.eq_ignore_ascii_case("multipart/form-data") => Self::Multipart(
                url::form_urlencoded::parse(params.as_bytes())
                    .into_owned()
                    .collect(),
            ),
            _ => Self::UrlEncoded(params.to_string()),
        }
    }
}

/// One HTTP request handed to the dispatcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeRequest {
    pub method: String,
    pub url: Url,
    pub headers: Vec<(String, String)>,
    pub body: Option<RequestBody>,
    pub referer: Option<String>,
}

impl ExchangeRequest {
    /// Creates a bodyless GET request
    pub fn get(url: Url) -> Self {
        Self {
            method: "GET".to_string(),
            url,
            headers: Vec::new(),
            body: None,
            referer: None,
        }
    }
}

/// A response as returned by the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    /// URL the response was read from
    pub final_url: Url,
}

impl ExchangeResponse {
    /// Returns the first header with the given name (case-insensitive)
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }
}

/// Terminal result of an exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExchangeResult {
    Completed(ExchangeResponse),
    /// Transport error or timeout
    Failed(String),
    /// Scope rejected the target at send time; nothing was sent
    OutOfScope,
    /// The dispatcher was stopped before the exchange was sent
    Cancelled,
}

/// What the dispatcher hands back for each user exchange
#[derive(Debug, Clone)]
pub struct ExchangeOutcome {
    pub context: ContextToken,
    pub request: ExchangeRequest,
    pub result: ExchangeResult,
}
