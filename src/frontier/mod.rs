//! Crawl frontier
//!
//! The persistent set of not-yet-fetched requests and not-yet-analyzed
//! responses, with depth tagging and deduplication against stored responses.

mod frontier;
pub mod target;

pub use frontier::{
    AddSummary, Frontier, FrontierLimits, RenderOutput, RenderUnit, SpiderUnit,
};
pub use target::Target;
