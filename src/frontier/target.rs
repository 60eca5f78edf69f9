//! Discovered request targets

use crate::url::{dedup_key, normalize_parsed, split_query};
use url::Url;

/// A request discovered during extraction, before scope and dedup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub method: String,
    /// Full URL, query included
    pub url: Url,
    pub body_encoding: Option<String>,
    /// Form-urlencoded body parameters
    pub body_params: Option<String>,
    pub referer: Option<String>,
    pub depth: u32,
}

impl Target {
    /// Creates a GET target
    pub fn get(url: Url, referer: Option<&str>, depth: u32) -> Self {
        Self {
            method: "GET".to_string(),
            url,
            body_encoding: None,
            body_params: None,
            referer: referer.map(str::to_string),
            depth,
        }
    }

    /// Creates a POST target carrying a form body
    pub fn post(
        url: Url,
        body_encoding: &str,
        body_params: String,
        referer: Option<&str>,
        depth: u32,
    ) -> Self {
        Self {
            method: "POST".to_string(),
            url,
            body_encoding: Some(body_encoding.to_string()),
            body_params: Some(body_params),
            referer: referer.map(str::to_string),
            depth,
        }
    }

    /// Returns the target with its URL normalized, or None for a non-HTTP(S) URL
    pub fn normalized(mut self) -> Option<Self> {
        self.url = normalize_parsed(self.url).ok()?;
        self.method = self.method.to_ascii_uppercase();
        Some(self)
    }

    /// Returns the key identifying this method and URL pair
    pub fn dedup_key(&self) -> String {
        dedup_key(&self.method, &self.url)
    }

    /// Splits the URL into its query-less target and the query string
    pub fn target_and_query(&self) -> (String, Option<String>) {
        let (base, query) = split_query(&self.url);
        (base.to_string(), query)
    }
}
