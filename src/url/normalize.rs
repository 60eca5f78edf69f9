use crate::UrlError;
use url::Url;

/// Normalizes a URL for frontier deduplication
///
/// # Normalization Steps
///
/// 1. Parse the URL; reject if malformed
/// 2. Reject anything that is not http:// or https://
/// 3. Lowercase the host and drop the scheme's default port
/// 4. Resolve dot segments; an empty path becomes /
/// 5. Remove the fragment
/// 6. Drop an empty query string (trailing ?)
///
/// The query itself is kept verbatim: parameter order and trailing slashes
/// can select different server-side handlers, so they stay significant.
///
/// # Arguments
///
/// * `url_str` - The URL string to normalize
///
/// # Returns
///
/// * `Ok(Url)` - Normalized URL
/// * `Err(UrlError)` - Failed to parse or normalize the URL
///
/// # Examples
///
/// ```
/// use scoutline::url::normalize_url;
///
/// let url = normalize_url("http://EXAMPLE.COM:80/a/../b?x=1#top").unwrap();
/// assert_eq!(url.as_str(), "http://example.com/b?x=1");
/// ```
pub fn normalize_url(url_str: &str) -> Result<Url, UrlError> {
    let url = Url::parse(url_str.trim()).map_err(|e| UrlError::Parse(e.to_string()))?;
    normalize_parsed(url)
}

/// Normalizes an already parsed URL (see [`normalize_url`])
pub fn normalize_parsed(mut url: Url) -> Result<Url, UrlError> {
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(format!(
            "Only HTTP and HTTPS schemes are supported, got: {}",
            url.scheme()
        )));
    }

    // The url crate already lowercases domains and strips default ports
    // while parsing; host presence is all that is left to check.
    if url.host_str().is_none() {
        return Err(UrlError::MissingHost);
    }

    if url.path().is_empty() {
        url.set_path("/");
    }

    url.set_fragment(None);

    if url.query() == Some("") {
        url.set_query(None);
    }

    Ok(url)
}

/// Splits a URL into its base (no query, no fragment) and its query string
pub fn split_query(url: &Url) -> (Url, Option<String>) {
    let mut base = url.clone();
    let query = base.query().map(|q| q.to_string()).filter(|q| !q.is_empty());
    base.set_query(None);
    base.set_fragment(None);
    (base, query)
}

/// Builds the frontier deduplication key for a request
///
/// Two requests share a key when they use the same method and their
/// normalized URLs (including the query) are identical.
///
/// # Examples
///
/// ```
/// use scoutline::url::{dedup_key, normalize_url};
///
/// let a = normalize_url("http://h/x#frag").unwrap();
/// let b = normalize_url("HTTP://H:80/x").unwrap();
/// assert_eq!(dedup_key("get", &a), dedup_key("GET", &b));
/// ```
pub fn dedup_key(method: &str, url: &Url) -> String {
    let mut url = url.clone();
    url.set_fragment(None);
    format!("{} {}", method.to_ascii_uppercase(), url.as_str())
}
