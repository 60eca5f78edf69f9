//! Request dispatcher
//!
//! Runs a bounded number of concurrent HTTP exchanges, correlates each one
//! with its requester through a context token, and replays optional login
//! sequences around crawl requests.

mod dispatcher;
pub mod exchange;
pub mod sequence;
pub mod transport;

pub use dispatcher::{Dispatcher, DispatcherConfig, OutcomeCallback};
pub use exchange::{
    ContextToken, ExchangeOutcome, ExchangeRequest, ExchangeResponse, ExchangeResult,
    ExchangeState, Origin, RequestBody,
};
pub use sequence::{Sequence, SequenceVerdict, StaticSequence};
pub use transport::{build_http_client, HttpTransport, Transport, TransportError};
