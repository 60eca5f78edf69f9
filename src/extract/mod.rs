//! Content extraction
//!
//! Turns fetched bytes into links, forms, inputs, scripts and comments. The
//! HTML walk is tolerant: a document that fails to parse into anything is
//! retried wrapped in a comment, and as a last resort its text goes through
//! the lexical script scanner.

pub mod attributes;
pub mod charset;
pub mod fingerprint;
pub mod forms;
mod html;
pub mod links;
pub mod script;

pub use forms::{Form, FormInput, FormKey};
pub use links::resolve_link;
pub use script::{scan_script, ScanOutput};

use crate::extract::fingerprint::FingerprintBuilder;
use crate::extract::links::{find_text_urls, is_path_relative};
use std::collections::HashSet;
use thiserror::Error;
use url::Url;

/// Errors raised while extracting content
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("No document root could be produced")]
    NoDocumentRoot,
}

/// Everything discovered in one fetched document
#[derive(Debug, Clone)]
pub struct ExtractionResult {
    /// Absolute links in discovery order, without duplicates
    pub links: Vec<Url>,
    /// Path-relative strings found in scripts, unresolved
    pub relative_links: Vec<String>,
    pub forms: Vec<Form>,
    /// Inputs that appear outside any form
    pub orphan_inputs: Vec<FormInput>,
    pub inline_scripts: Vec<String>,
    pub script_urls: Vec<Url>,
    pub comments: Vec<String>,
    pub contextual_fingerprint: String,
    pub structural_fingerprint: String,
    /// Base the links were resolved against (`<base href>` when present)
    pub base_url: Url,
    /// Encoding the document was decoded with, or declared in it
    pub charset: Option<String>,
    seen_links: HashSet<Url>,
}

impl ExtractionResult {
    pub fn new(base_url: Url) -> Self {
        Self {
            links: Vec::new(),
            relative_links: Vec::new(),
            forms: Vec::new(),
            orphan_inputs: Vec::new(),
            inline_scripts: Vec::new(),
            script_urls: Vec::new(),
            comments: Vec::new(),
            contextual_fingerprint: String::new(),
            structural_fingerprint: String::new(),
            base_url,
            charset: None,
            seen_links: HashSet::new(),
        }
    }

    /// Adds a link unless it was already discovered
    pub fn push_link(&mut self, url: Url) -> bool {
        if self.seen_links.insert(url.clone()) {
            self.links.push(url);
            true
        } else {
            false
        }
    }

    /// Adds a form, merging it into an earlier one with the same key
    pub fn push_form(&mut self, form: Form) {
        match self.forms.iter_mut().find(|f| f.key == form.key) {
            Some(existing) => existing.merge(form),
            None => self.forms.push(form),
        }
    }

    pub fn push_relative_link(&mut self, path: String) {
        if !self.relative_links.contains(&path) {
            self.relative_links.push(path);
        }
    }

    pub fn push_inline_script(&mut self, script: String) {
        if !script.trim().is_empty() {
            self.inline_scripts.push(script);
        }
    }

    pub fn push_script_url(&mut self, url: Url) {
        if !self.script_urls.contains(&url) {
            self.script_urls.push(url);
        }
    }

    pub fn push_comment(&mut self, comment: String) {
        self.comments.push(comment);
    }

    /// Returns true when nothing navigable was discovered
    pub fn is_barren(&self) -> bool {
        self.links.is_empty()
            && self.relative_links.is_empty()
            && self.forms.is_empty()
            && self.orphan_inputs.is_empty()
            && self.inline_scripts.is_empty()
    }

    /// Runs the script scanner over `script` and records what it finds
    ///
    /// Every line of a recovered string or comment is searched for absolute
    /// and www.-prefixed URLs; a line that is itself a page-relative path is
    /// kept as a relative link.
    pub fn scan_script_text(&mut self, script: &str) {
        let scanned = scan_script(script);

        for comment in &scanned.comments {
            self.push_comment(comment.clone());
        }

        for text in scanned.strings.iter().chain(scanned.comments.iter()) {
            for line in text.lines() {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                let found = find_text_urls(line);
                if found.is_empty() {
                    if is_path_relative(line) {
                        self.push_relative_link(line.to_string());
                    }
                    continue;
                }

                for raw in found {
                    if let Some(url) = resolve_link(&raw, &self.base_url) {
                        self.push_link(url);
                    }
                }
            }
        }
    }
}

/// Extracts links, forms and scripts from fetched document bytes
///
/// # Arguments
///
/// * `content` - Raw response body
/// * `base_url` - URL the document was fetched from
/// * `charset` - Charset from the response headers, if any
///
/// # Returns
///
/// * `Ok(ExtractionResult)` - What the document yielded (possibly nothing)
/// * `Err(ExtractError)` - If the content is empty and no document root exists
pub fn extract(
    content: &[u8],
    base_url: &Url,
    charset: Option<&str>,
) -> Result<ExtractionResult, ExtractError> {
    let (text, used) = charset::decode_document(content, charset);
    extract_text(&text, base_url, Some(used))
}

/// Extracts from already decoded document text
pub fn extract_str(html: &str, base_url: &Url) -> Result<ExtractionResult, ExtractError> {
    extract_text(html, base_url, None)
}

fn extract_text(
    text: &str,
    base_url: &Url,
    charset: Option<String>,
) -> Result<ExtractionResult, ExtractError> {
    if text.trim().is_empty() {
        return Err(ExtractError::NoDocumentRoot);
    }

    let walked = html::walk_document(text, base_url, charset.clone());
    let mut result = if walked.saw_content {
        walked.result
    } else {
        tracing::debug!("Document at {} produced no nodes, retrying as comment", base_url);
        let wrapped = format!("<!--{}-->", text.replace("-->", "--&gt;"));
        html::walk_document(&wrapped, base_url, charset).result
    };

    if result.is_barren() {
        tracing::debug!("Falling back to script scan for {}", base_url);
        result.scan_script_text(text);
    }

    let scripts = std::mem::take(&mut result.inline_scripts);
    for script in &scripts {
        result.scan_script_text(script);
    }
    result.inline_scripts = scripts;

    Ok(result)
}

/// Extracts URLs from a standalone script, such as an external JavaScript file
pub fn extract_script(script: &str, base_url: &Url) -> ExtractionResult {
    let mut result = ExtractionResult::new(base_url.clone());
    result.scan_script_text(script);
    result.push_inline_script(script.to_string());

    let (contextual, structural) = FingerprintBuilder::new().finish();
    result.contextual_fingerprint = contextual;
    result.structural_fingerprint = structural;
    result
}
