//! Compiled scope rule set

use crate::config::ScopeConfig;
use crate::scope::patterns::{LiteralMode, PatternList};
use regex::Regex;

/// How specific a matching rule is; higher wins a tie-break
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MatchLevel {
    Host,
    Url,
    Path,
}

/// Include/exclude pattern lists over path, whole URL, host name and IP
///
/// Built once from configuration and never mutated; reconfiguration
/// replaces the whole set.
#[derive(Debug, Clone, Default)]
pub struct ScopeRuleSet {
    pub include_paths: PatternList,
    pub exclude_paths: PatternList,
    pub include_urls: PatternList,
    pub exclude_urls: PatternList,
    pub include_hosts: PatternList,
    pub exclude_hosts: PatternList,
    pub include_ips: PatternList,
    pub exclude_ips: PatternList,

    /// Set when dangerous-path exclusion is enabled
    pub dangerous_paths: Option<Regex>,

    /// Lowercase extensions rejected when media retrieval is disabled
    pub media_extensions: Option<Vec<String>>,
}

impl ScopeRuleSet {
    /// Compiles a rule set from the scope configuration
    pub fn from_config(config: &ScopeConfig) -> Self {
        let dangerous_paths = if config.exclude_dangerous_paths {
            match Regex::new(&config.dangerous_path_pattern) {
                Ok(regex) => Some(regex),
                Err(e) => {
                    tracing::warn!(
                        "Dangerous path pattern '{}' does not compile ({}), matching it literally",
                        config.dangerous_path_pattern,
                        e
                    );
                    Regex::new(&regex::escape(&config.dangerous_path_pattern)).ok()
                }
            }
        } else {
            None
        };

        let media_extensions = if config.retrieve_media_files {
            None
        } else {
            Some(
                config
                    .media_extensions
                    .iter()
                    .map(|ext| ext.trim_start_matches('.').to_ascii_lowercase())
                    .collect(),
            )
        };

        Self {
            include_paths: PatternList::compile(&config.include_paths, LiteralMode::Prefix, false),
            exclude_paths: PatternList::compile(&config.exclude_paths, LiteralMode::Prefix, false),
            include_urls: PatternList::compile(&config.include_urls, LiteralMode::Prefix, false),
            exclude_urls: PatternList::compile(&config.exclude_urls, LiteralMode::Prefix, false),
            include_hosts: PatternList::compile(&config.include_hosts, LiteralMode::Exact, true),
            exclude_hosts: PatternList::compile(&config.exclude_hosts, LiteralMode::Exact, true),
            include_ips: PatternList::compile(&config.include_ips, LiteralMode::Exact, true),
            exclude_ips: PatternList::compile(&config.exclude_ips, LiteralMode::Exact, true),
            dangerous_paths,
            media_extensions,
        }
    }

    /// Returns true if any include list has at least one entry
    pub fn has_include_rules(&self) -> bool {
        !(self.include_paths.is_empty()
            && self.include_urls.is_empty()
            && self.include_hosts.is_empty()
            && self.include_ips.is_empty())
    }

    /// Returns true if the extension is a filtered media extension
    pub fn is_media_extension(&self, ext: &str) -> bool {
        match &self.media_extensions {
            Some(list) => list.iter().any(|m| m.eq_ignore_ascii_case(ext)),
            None => false,
        }
    }
}
