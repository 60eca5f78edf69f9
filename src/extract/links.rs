//! Link resolution and literal URL patterns

use lazy_static::lazy_static;
use percent_encoding::percent_decode_str;
use regex::Regex;
use url::Url;

lazy_static! {
    /// Absolute http(s) URL embedded in free text
    static ref FULL_URL: Regex =
        Regex::new(r#"(?i)\bhttps?://[^\s"'`<>()\[\]{}\\]+"#).expect("valid full URL pattern");

    /// Scheme-less host starting with www.
    static ref BARE_HOST: Regex = Regex::new(
        r#"(?i)\bwww\.[a-z0-9-]+(?:\.[a-z0-9-]+)+(?::\d+)?(?:/[^\s"'`<>()\[\]{}\\]*)?"#
    )
    .expect("valid bare host pattern");

    /// A whole line that looks like a path relative to the page
    static ref PATH_RELATIVE: Regex = Regex::new(
        r#"^(?:\.{0,2}/[A-Za-z0-9_~%+\-][A-Za-z0-9_~%+\-./]*|[A-Za-z0-9_\-]+(?:/[A-Za-z0-9_\-.]+)*\.(?:php|aspx?|jsp|html?|cgi|pl|do|action|json|xml))(?:\?[^\s#"'<>]*)?$"#
    )
    .expect("valid relative path pattern");

    /// CSS url(...) reference
    static ref CSS_URL: Regex =
        Regex::new(r#"(?i)url\(\s*['"]?([^'")\s]+)['"]?\s*\)"#).expect("valid css url pattern");

    /// `charset=` parameter in a content-type value
    static ref CHARSET_PARAM: Regex =
        Regex::new(r#"(?i)charset\s*=\s*["']?([A-Za-z0-9_\-:.]+)"#).expect("valid charset pattern");
}

/// Resolves a link href against a base URL
///
/// Returns None if the link should be excluded:
/// - empty values and bare fragments
/// - javascript:, mailto:, tel:, data: and other non-HTTP(S) schemes
/// - values that do not resolve to a URL
///
/// When the resolved path carries percent-escapes it is decoded and set
/// again, so equivalent spellings collapse to one URL. The fragment is dropped.
pub fn resolve_link(href: &str, base: &Url) -> Option<Url> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lower = href.to_ascii_lowercase();
    if lower.starts_with("javascript:")
        || lower.starts_with("mailto:")
        || lower.starts_with("tel:")
        || lower.starts_with("data:")
    {
        return None;
    }

    let mut url = base.join(href).ok()?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return None;
    }

    if url.path().contains('%') {
        let decoded = percent_decode_str(url.path()).decode_utf8_lossy().into_owned();
        url.set_path(&decoded);
    }
    url.set_fragment(None);

    Some(url)
}

/// Finds absolute and www.-prefixed URLs in free text
pub fn find_text_urls(text: &str) -> Vec<String> {
    let mut found: Vec<String> = FULL_URL
        .find_iter(text)
        .map(|m| trim_trailing_punctuation(m.as_str()).to_string())
        .collect();

    for m in BARE_HOST.find_iter(text) {
        // Skip hosts that are part of a full URL already found
        let start = m.start();
        if start >= 3 && text[..start].ends_with("://") {
            continue;
        }
        found.push(format!("http://{}", trim_trailing_punctuation(m.as_str())));
    }

    found
}

/// Returns true if the whole line looks like an absolute http(s) URL
pub fn is_full_url(line: &str) -> bool {
    FULL_URL
        .find(line)
        .map(|m| m.start() == 0 && m.end() == line.len())
        .unwrap_or(false)
}

/// Returns true if the whole line looks like a page-relative path
pub fn is_path_relative(line: &str) -> bool {
    PATH_RELATIVE.is_match(line)
}

/// Extracts the targets of `url(...)` references in CSS text
pub fn find_css_urls(css: &str) -> Vec<String> {
    CSS_URL
        .captures_iter(css)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str().to_string()))
        .collect()
}

/// Extracts the `charset=` parameter of a content-type value
pub fn charset_param(content_type: &str) -> Option<String> {
    CHARSET_PARAM
        .captures(content_type)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_ascii_lowercase())
}

/// Parses a meta refresh value such as `5; url=/next`
///
/// Returns the URL part, or None when the value only carries a delay.
pub fn parse_refresh(content: &str) -> Option<&str> {
    let (_, rest) = content.split_once(|c| c == ';' || c == ',')?;
    let rest = rest.trim_start();
    let rest = match rest.get(..4) {
        Some(prefix) if prefix.eq_ignore_ascii_case("url=") => &rest[4..],
        _ => rest,
    };
    let target = rest.trim().trim_matches(|c| c == '\'' || c == '"').trim();
    if target.is_empty() {
        None
    } else {
        Some(target)
    }
}

fn trim_trailing_punctuation(url: &str) -> &str {
    url.trim_end_matches(|c| matches!(c, '.' | ',' | ';' | ':' | '!' | '?'))
}
