//! Byte-to-text decoding for fetched documents

use crate::extract::links::charset_param;
use encoding_rs::{Encoding, UTF_8};
use lazy_static::lazy_static;
use regex::bytes::Regex;

/// Number of leading bytes searched for an in-document charset declaration
const PRESCAN_LIMIT: usize = 1024;

lazy_static! {
    static ref META_CHARSET: Regex =
        Regex::new(r#"(?i)<meta[^>]+charset\s*=\s*["']?([A-Za-z0-9_\-:.]+)"#)
            .expect("valid meta charset pattern");
}

/// Decodes document bytes to text
///
/// The encoding is taken from, in order: the supplied charset label, a
/// `<meta ... charset=...>` declaration in the first kilobyte, a byte order
/// mark, and finally UTF-8. Malformed sequences become U+FFFD.
///
/// # Returns
///
/// The decoded text and the label of the encoding actually used
pub fn decode_document(content: &[u8], charset: Option<&str>) -> (String, String) {
    let declared = charset
        .and_then(|label| Encoding::for_label(label.trim().as_bytes()))
        .or_else(|| prescan_meta_charset(content));

    let encoding = declared.unwrap_or(UTF_8);
    // decode() honours a BOM over the requested encoding
    let (text, used, had_errors) = encoding.decode(content);
    if had_errors {
        tracing::debug!("Replaced malformed {} sequences while decoding", used.name());
    }

    (text.into_owned(), used.name().to_ascii_lowercase())
}

/// Looks for a charset declaration near the start of the document
fn prescan_meta_charset(content: &[u8]) -> Option<&'static Encoding> {
    let head = &content[..content.len().min(PRESCAN_LIMIT)];
    let caps = META_CHARSET.captures(head)?;
    let label = caps.get(1)?.as_bytes();
    Encoding::for_label(label)
}

/// Resolves the charset carried by a content-type value, if it names a known encoding
pub fn charset_from_content_type(content_type: &str) -> Option<String> {
    let label = charset_param(content_type)?;
    Encoding::for_label(label.as_bytes()).map(|e| e.name().to_ascii_lowercase())
}
