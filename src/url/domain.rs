use std::net::IpAddr;
use url::{Host, Url};

/// Extracts the lowercase host name from a URL
///
/// # Examples
///
/// ```
/// use url::Url;
/// use scoutline::url::extract_host;
///
/// let url = Url::parse("https://EXAMPLE.COM/path").unwrap();
/// assert_eq!(extract_host(&url), Some("example.com".to_string()));
/// ```
pub fn extract_host(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}

/// Returns the IP address of a URL whose host is an IP literal
///
/// No name resolution is performed; a domain host yields `None`.
pub fn host_ip(url: &Url) -> Option<IpAddr> {
    match url.host()? {
        Host::Ipv4(addr) => Some(IpAddr::V4(addr)),
        Host::Ipv6(addr) => Some(IpAddr::V6(addr)),
        Host::Domain(_) => None,
    }
}

/// Returns true if both URLs name the same host (ports are ignored)
pub fn same_host(a: &Url, b: &Url) -> bool {
    match (extract_host(a), extract_host(b)) {
        (Some(x), Some(y)) => x == y,
        _ => false,
    }
}
