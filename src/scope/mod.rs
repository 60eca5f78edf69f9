//! Scope filter: which URLs may be crawled
//!
//! Scope rules are include/exclude pattern lists over the URL path, the
//! whole URL, the host name and the host IP, plus two independent safety
//! rules (dangerous paths and media extensions).

mod filter;
mod patterns;
mod rules;

pub use filter::ScopeFilter;
pub use patterns::{LiteralMode, PatternList};
pub use rules::{MatchLevel, ScopeRuleSet};

use std::sync::{Arc, RwLock};

/// Shared, reconfigurable handle to the active scope filter
///
/// Readers take a cheap snapshot with [`SharedScope::current`]; a snapshot
/// keeps answering with the rules that were active when it was taken.
#[derive(Debug, Clone)]
pub struct SharedScope {
    inner: Arc<RwLock<Arc<ScopeFilter>>>,
}

impl SharedScope {
    pub fn new(filter: ScopeFilter) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Arc::new(filter))),
        }
    }

    /// Returns the currently active filter
    pub fn current(&self) -> Arc<ScopeFilter> {
        match self.inner.read() {
            Ok(guard) => Arc::clone(&*guard),
            Err(poisoned) => Arc::clone(&*poisoned.into_inner()),
        }
    }

    /// Replaces the active filter
    pub fn replace(&self, filter: ScopeFilter) {
        let filter = Arc::new(filter);
        match self.inner.write() {
            Ok(mut guard) => *guard = filter,
            Err(poisoned) => *poisoned.into_inner() = filter,
        }
    }

    /// Convenience wrapper around the current filter's `should_include`
    pub fn should_include(&self, url: &str, referer: Option<&str>) -> bool {
        self.current().should_include(url, referer)
    }
}

impl Default for SharedScope {
    fn default() -> Self {
        Self::new(ScopeFilter::default())
    }
}
