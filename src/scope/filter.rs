//! Scope decision: may a URL be crawled?

use crate::config::ScopeConfig;
use crate::scope::rules::{MatchLevel, ScopeRuleSet};
use crate::url::{extract_host, host_ip, normalize_url};
use url::Url;

/// Decides whether URLs are eligible for crawling
///
/// A filter is immutable; [`crate::scope::SharedScope`] swaps whole filters
/// when the configuration changes.
#[derive(Debug, Clone, Default)]
pub struct ScopeFilter {
    rules: ScopeRuleSet,
}

impl ScopeFilter {
    pub fn new(rules: ScopeRuleSet) -> Self {
        Self { rules }
    }

    pub fn from_config(config: &ScopeConfig) -> Self {
        Self::new(ScopeRuleSet::from_config(config))
    }

    pub fn rules(&self) -> &ScopeRuleSet {
        &self.rules
    }

    /// Returns true if the URL may be crawled
    ///
    /// # Decision Order
    ///
    /// 1. Unparsable or non-HTTP(S) URLs are rejected
    /// 2. Dangerous paths are rejected when that safety rule is enabled
    /// 3. Media extensions are rejected when media retrieval is disabled
    /// 4. Exclusions on path, whole URL and host/IP are collected, as are
    ///    inclusions on the same parts
    /// 5. When both sides matched, the more specific side wins
    ///    (path over URL over host); equal specificity rejects
    /// 6. Only exclusions matched: reject. Only inclusions matched: accept
    /// 7. Nothing matched: reject if include rules exist; otherwise accept
    ///    unless `referer` names a different host
    ///
    /// The result depends only on the arguments and the rule set.
    ///
    /// # Arguments
    ///
    /// * `url` - The candidate URL
    /// * `referer` - The page the URL was discovered on, if any
    pub fn should_include(&self, url: &str, referer: Option<&str>) -> bool {
        let url = match normalize_url(url) {
            Ok(u) => u,
            Err(e) => {
                tracing::trace!("Scope rejects unparsable URL {}: {}", url, e);
                return false;
            }
        };
        self.should_include_url(&url, referer)
    }

    /// Same as [`ScopeFilter::should_include`] for an already parsed URL
    pub fn should_include_url(&self, url: &Url, referer: Option<&str>) -> bool {
        let path = url.path();

        if let Some(dangerous) = &self.rules.dangerous_paths {
            if dangerous.is_match(path) {
                tracing::trace!("Scope rejects dangerous path {}", url);
                return false;
            }
        }

        if let Some(ext) = path_extension(path) {
            if self.rules.is_media_extension(ext) {
                tracing::trace!("Scope rejects media file {}", url);
                return false;
            }
        }

        let host = extract_host(url).unwrap_or_default();
        let ip = host_ip(url).map(|ip| ip.to_string());

        let exclusion = strongest([
            (self.rules.exclude_paths.is_match(path), MatchLevel::Path),
            (self.rules.exclude_urls.is_match(url.as_str()), MatchLevel::Url),
            (self.host_matches(&host, ip.as_deref(), false), MatchLevel::Host),
        ]);

        let inclusion = strongest([
            (self.rules.include_paths.is_match(path), MatchLevel::Path),
            (self.rules.include_urls.is_match(url.as_str()), MatchLevel::Url),
            (self.host_matches(&host, ip.as_deref(), true), MatchLevel::Host),
        ]);

        match (exclusion, inclusion) {
            (Some(excluded), Some(included)) => included > excluded,
            (Some(_), None) => false,
            (None, Some(_)) => true,
            (None, None) => {
                if self.rules.has_include_rules() {
                    return false;
                }
                match referer.and_then(|r| Url::parse(r).ok()) {
                    Some(referer) => extract_host(&referer).as_deref() == Some(host.as_str()),
                    None => true,
                }
            }
        }
    }

    fn host_matches(&self, host: &str, ip: Option<&str>, include: bool) -> bool {
        let (hosts, ips) = if include {
            (&self.rules.include_hosts, &self.rules.include_ips)
        } else {
            (&self.rules.exclude_hosts, &self.rules.exclude_ips)
        };
        hosts.is_match(host) || ip.map(|ip| ips.is_match(ip)).unwrap_or(false)
    }
}

/// Returns the most specific level among the matched entries
fn strongest<const N: usize>(matches: [(bool, MatchLevel); N]) -> Option<MatchLevel> {
    matches
        .into_iter()
        .filter(|(matched, _)| *matched)
        .map(|(_, level)| level)
        .max()
}

/// Returns the extension of the last path segment, if any
fn path_extension(path: &str) -> Option<&str> {
    let segment = path.rsplit('/').next()?;
    let (stem, ext) = segment.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        None
    } else {
        Some(ext)
    }
}
