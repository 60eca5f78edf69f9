use serde::Deserialize;

/// Main configuration structure for Scoutline
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub scope: ScopeConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    pub output: OutputConfig,
    #[serde(default)]
    pub seeds: SeedConfig,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Maximum number of queued requests overall (0 = unlimited)
    #[serde(rename = "max-links", default)]
    pub max_links: u32,

    /// Derived requests at a depth beyond this are never enqueued
    #[serde(rename = "max-link-depth")]
    pub max_link_depth: u32,

    /// Maximum number of requests discovered from a single referer (0 = unlimited)
    #[serde(rename = "max-children", default)]
    pub max_children: u32,

    /// Maximum number of distinct query variants per method and path (0 = unlimited)
    #[serde(rename = "max-unique-parameters", default)]
    pub max_unique_parameters: u32,

    /// Maximum number of HTTP exchanges in flight
    #[serde(rename = "max-concurrent", default = "default_max_concurrent")]
    pub max_concurrent: u32,

    /// Per-exchange timeout in seconds
    #[serde(rename = "request-timeout-secs", default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Maximum number of render units handed to the renderer at once
    #[serde(rename = "max-render-units", default = "default_max_render_units")]
    pub max_render_units: u32,

    /// Maximum number of extraction jobs running on the blocking pool
    #[serde(rename = "extraction-workers", default = "default_extraction_workers")]
    pub extraction_workers: u32,

    /// Consult the form filler for form field values
    #[serde(rename = "use-data-bank", default = "default_true")]
    pub use_data_bank: bool,

    /// Submit filler-provided user names and passwords
    #[serde(rename = "submit-user-name-password", default)]
    pub submit_user_name_password: bool,
}

/// Scope rules configuration
///
/// Every list holds one pattern per entry. Entries without regex
/// metacharacters are matched literally.
#[derive(Debug, Clone, Deserialize)]
pub struct ScopeConfig {
    #[serde(rename = "include-paths", default)]
    pub include_paths: Vec<String>,

    #[serde(rename = "exclude-paths", default)]
    pub exclude_paths: Vec<String>,

    /// Patterns matched against the whole URL
    #[serde(rename = "include-urls", default)]
    pub include_urls: Vec<String>,

    #[serde(rename = "exclude-urls", default)]
    pub exclude_urls: Vec<String>,

    #[serde(rename = "include-hosts", default)]
    pub include_hosts: Vec<String>,

    #[serde(rename = "exclude-hosts", default)]
    pub exclude_hosts: Vec<String>,

    #[serde(rename = "include-ips", default)]
    pub include_ips: Vec<String>,

    #[serde(rename = "exclude-ips", default)]
    pub exclude_ips: Vec<String>,

    /// Reject URLs whose path matches `dangerous-path-pattern`
    #[serde(rename = "exclude-dangerous-paths", default = "default_true")]
    pub exclude_dangerous_paths: bool,

    #[serde(rename = "dangerous-path-pattern", default = "default_dangerous_pattern")]
    pub dangerous_path_pattern: String,

    /// When false, URLs ending in one of `media-extensions` are rejected
    #[serde(rename = "retrieve-media-files", default)]
    pub retrieve_media_files: bool,

    #[serde(rename = "media-extensions", default = "default_media_extensions")]
    pub media_extensions: Vec<String>,
}

impl Default for ScopeConfig {
    fn default() -> Self {
        Self {
            include_paths: Vec::new(),
            exclude_paths: Vec::new(),
            include_urls: Vec::new(),
            exclude_urls: Vec::new(),
            include_hosts: Vec::new(),
            exclude_hosts: Vec::new(),
            include_ips: Vec::new(),
            exclude_ips: Vec::new(),
            exclude_dangerous_paths: true,
            dangerous_path_pattern: default_dangerous_pattern(),
            retrieve_media_files: false,
            media_extensions: default_media_extensions(),
        }
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,
}

impl UserAgentConfig {
    /// Formats the User-Agent header value
    pub fn header_value(&self) -> String {
        format!("{}/{}", self.crawler_name, self.crawler_version)
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,
}

/// Seed requests the crawl starts from
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SeedConfig {
    #[serde(default)]
    pub urls: Vec<String>,
}

fn default_max_concurrent() -> u32 {
    10
}

fn default_request_timeout() -> u64 {
    30
}

fn default_max_render_units() -> u32 {
    1
}

fn default_extraction_workers() -> u32 {
    4
}

fn default_true() -> bool {
    true
}

fn default_dangerous_pattern() -> String {
    "(?i)(delete|remove|destroy|logout|logoff|signout)".to_string()
}

fn default_media_extensions() -> Vec<String> {
    [
        "jpg", "jpeg", "png", "gif", "bmp", "ico", "svg", "webp", "tif", "tiff", "mp3", "mp4",
        "avi", "mov", "mpg", "mpeg", "wmv", "flv", "ogg", "wav", "webm", "woff", "woff2", "ttf",
        "eot", "otf", "pdf", "zip", "gz", "tar", "rar", "7z", "exe", "dmg", "iso",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}
