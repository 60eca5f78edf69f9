//! Tolerant HTML tree walk

use crate::extract::attributes::{attribute_kind, javascript_body, split_uri_list, AttrKind};
use crate::extract::charset::charset_from_content_type;
use crate::extract::fingerprint::FingerprintBuilder;
use crate::extract::forms::{attach_label, Form, FormInput, FormKey};
use crate::extract::links::{
    find_css_urls, find_text_urls, is_full_url, parse_refresh, resolve_link,
};
use crate::extract::ExtractionResult;
use ego_tree::iter::Edge;
use ego_tree::NodeRef;
use scraper::{ElementRef, Html, Node};
use url::Url;

/// `<param name>` values whose `value` is a URL
const PARAM_URL_NAMES: &[&str] = &["movie", "src", "url", "href", "filename", "code", "codebase", "data"];

/// Elements html5ever inserts even for an empty document
const SCAFFOLD_ELEMENTS: &[&str] = &["html", "head", "body"];

/// Outcome of one walk over a parsed document
pub(crate) struct WalkOutput {
    pub result: ExtractionResult,
    /// False when the document held nothing but implied scaffolding
    pub saw_content: bool,
}

struct Label {
    target: String,
    text: String,
}

struct Walker {
    base: Url,
    result: ExtractionResult,
    fingerprint: FingerprintBuilder,
    forms: Vec<Form>,
    open_forms: Vec<usize>,
    orphan_inputs: Vec<FormInput>,
    labels: Vec<Label>,
    saw_content: bool,
}

/// Parses and walks an HTML document
///
/// # Arguments
///
/// * `html` - The decoded document text
/// * `base_url` - URL the document was fetched from
/// * `charset` - Encoding the text was decoded with
pub(crate) fn walk_document(html: &str, base_url: &Url, charset: Option<String>) -> WalkOutput {
    let document = Html::parse_document(html);
    let base = document_base(&document, base_url);

    let mut result = ExtractionResult::new(base.clone());
    result.charset = charset;

    let mut walker = Walker {
        base,
        result,
        fingerprint: FingerprintBuilder::new(),
        forms: Vec::new(),
        open_forms: Vec::new(),
        orphan_inputs: Vec::new(),
        labels: Vec::new(),
        saw_content: false,
    };

    for edge in document.tree.root().traverse() {
        match edge {
            Edge::Open(node) => walker.open(node),
            Edge::Close(node) => walker.close(node),
        }
    }

    walker.finish()
}

/// Returns the document base: the first `<base href>` resolved against the fetch URL
fn document_base(document: &Html, fetched_from: &Url) -> Url {
    document
        .tree
        .root()
        .descendants()
        .filter_map(|node| match node.value() {
            Node::Element(el) if el.name() == "base" => el.attr("href"),
            _ => None,
        })
        .next()
        .and_then(|href| resolve_link(href, fetched_from))
        .unwrap_or_else(|| fetched_from.clone())
}

impl Walker {
    fn open(&mut self, node: NodeRef<'_, Node>) {
        match node.value() {
            Node::Element(el) => {
                let tag = el.name().to_ascii_lowercase();
                if !SCAFFOLD_ELEMENTS.contains(&tag.as_str()) {
                    self.saw_content = true;
                }

                let names: Vec<&str> = el.attrs().map(|(name, _)| name).collect();
                self.fingerprint.open(&tag, &names);

                for (name, value) in el.attrs() {
                    self.attribute(&tag, name, value, node);
                }

                match tag.as_str() {
                    "form" => {
                        self.forms.push(Form {
                            key: FormKey {
                                id: attr(node, "id"),
                                class: attr(node, "class"),
                                action: attr(node, "action"),
                                method: attr(node, "method"),
                                enctype: attr(node, "enctype"),
                                onsubmit: attr(node, "onsubmit"),
                                onreset: attr(node, "onreset"),
                                target: attr(node, "target"),
                            },
                            action_url: match el.attr("action") {
                                Some(action) if !action.trim().is_empty() => {
                                    resolve_link(action, &self.base)
                                }
                                _ => Some(self.base.clone()),
                            },
                            inputs: Vec::new(),
                        });
                        self.open_forms.push(self.forms.len() - 1);
                    }
                    "input" | "select" | "textarea" | "button" => {
                        let input = form_input(&tag, node);
                        match self.open_forms.last() {
                            Some(&idx) => self.forms[idx].inputs.push(input),
                            None => self.orphan_inputs.push(input),
                        }
                    }
                    "label" => {
                        if let Some(target) = el.attr("for") {
                            self.labels.push(Label {
                                target: target.to_string(),
                                text: element_text(node),
                            });
                        }
                    }
                    "meta" => self.meta(node),
                    _ => {}
                }
            }
            Node::Text(text) => {
                let text: &str = text;
                if text.trim().is_empty() {
                    return;
                }
                self.saw_content = true;

                let parent = node
                    .parent()
                    .and_then(|p| match p.value() {
                        Node::Element(el) => Some(el.name().to_ascii_lowercase()),
                        _ => None,
                    })
                    .unwrap_or_default();

                match parent.as_str() {
                    "script" => self.result.push_inline_script(text.to_string()),
                    "style" => {
                        for target in find_css_urls(text) {
                            self.add_link(&target);
                        }
                    }
                    _ => self.scan_free_text(text),
                }
            }
            Node::Comment(comment) => {
                let comment: &str = comment;
                self.saw_content = true;
                self.scan_free_text(comment);
                self.result.push_comment(comment.to_string());
            }
            _ => {}
        }
    }

    fn close(&mut self, node: NodeRef<'_, Node>) {
        if let Node::Element(el) = node.value() {
            let tag = el.name().to_ascii_lowercase();
            self.fingerprint.close(&tag);
            if tag == "form" {
                self.open_forms.pop();
            }
        }
    }

    /// Dispatches one attribute value on its semantic kind
    fn attribute(&mut self, tag: &str, name: &str, value: &str, node: NodeRef<'_, Node>) {
        let kind = match attribute_kind(tag, name) {
            Some(kind) => kind,
            None => return,
        };

        if kind.is_link() || kind == AttrKind::UriList {
            if let Some(body) = javascript_body(value) {
                self.result.push_inline_script(body.to_string());
                return;
            }
        }

        match kind {
            AttrKind::Script => self.result.push_inline_script(value.to_string()),
            AttrKind::Uri | AttrKind::AnchorUri | AttrKind::BaseUri => self.add_link(value),
            AttrKind::ScriptUri => {
                if let Some(url) = resolve_link(value, &self.base) {
                    self.result.push_script_url(url.clone());
                    self.result.push_link(url);
                }
            }
            AttrKind::UriList => {
                for uri in split_uri_list(name, value) {
                    self.add_link(&uri);
                }
            }
            AttrKind::Style => {
                for target in find_css_urls(value) {
                    self.add_link(&target);
                }
            }
            AttrKind::ParamContent => {
                let param_name = attr(node, "name").unwrap_or_default().to_ascii_lowercase();
                let value = value.trim();
                if PARAM_URL_NAMES.contains(&param_name.as_str())
                    || value.starts_with("http://")
                    || value.starts_with("https://")
                {
                    self.add_link(value);
                }
            }
            // Interpreted together with http-equiv in meta()
            AttrKind::MetaContent => {}
        }
    }

    fn meta(&mut self, node: NodeRef<'_, Node>) {
        let http_equiv = attr(node, "http-equiv")
            .map(|v| v.trim().to_ascii_lowercase())
            .unwrap_or_default();
        let content = attr(node, "content").unwrap_or_default();

        match http_equiv.as_str() {
            "refresh" => {
                if let Some(target) = parse_refresh(&content) {
                    self.add_link(target);
                }
            }
            "content-type" => {
                if let Some(charset) = charset_from_content_type(&content) {
                    self.result.charset = Some(charset);
                }
            }
            _ => {
                if let Some(charset) = attr(node, "charset") {
                    self.result.charset = Some(charset.trim().to_ascii_lowercase());
                }
                let content = content.trim();
                if is_full_url(content) {
                    self.add_link(content);
                }
            }
        }
    }

    fn scan_free_text(&mut self, text: &str) {
        for found in find_text_urls(text) {
            self.add_link(&found);
        }
    }

    fn add_link(&mut self, raw: &str) {
        match resolve_link(raw, &self.base) {
            Some(url) => {
                self.result.push_link(url);
            }
            None => tracing::trace!("Skipping unresolvable link {:?}", raw),
        }
    }

    fn finish(mut self) -> WalkOutput {
        {
            let mut inputs: Vec<&mut FormInput> = self
                .forms
                .iter_mut()
                .flat_map(|form| form.inputs.iter_mut())
                .chain(self.orphan_inputs.iter_mut())
                .collect();
            for label in &self.labels {
                attach_label(&mut inputs, &label.target, &label.text);
            }
        }

        for form in self.forms {
            self.result.push_form(form);
        }
        self.result.orphan_inputs = self.orphan_inputs;

        let (contextual, structural) = self.fingerprint.finish();
        self.result.contextual_fingerprint = contextual;
        self.result.structural_fingerprint = structural;

        WalkOutput {
            result: self.result,
            saw_content: self.saw_content,
        }
    }
}

fn attr(node: NodeRef<'_, Node>, name: &str) -> Option<String> {
    match node.value() {
        Node::Element(el) => el.attr(name).map(|v| v.to_string()),
        _ => None,
    }
}

fn element_text(node: NodeRef<'_, Node>) -> String {
    ElementRef::wrap(node)
        .map(|el| el.text().collect::<String>())
        .unwrap_or_default()
}

fn form_input(tag: &str, node: NodeRef<'_, Node>) -> FormInput {
    let input_type = attr(node, "type")
        .map(|t| t.trim().to_ascii_lowercase())
        .unwrap_or_else(|| match tag {
            "input" => "text".to_string(),
            "button" => "submit".to_string(),
            other => other.to_string(),
        });

    let mut options = Vec::new();
    let value = match tag {
        "textarea" => Some(element_text(node)),
        "select" => {
            let mut selected = None;
            for option in node.descendants() {
                if let Node::Element(el) = option.value() {
                    if el.name() != "option" {
                        continue;
                    }
                    let value = el
                        .attr("value")
                        .map(|v| v.to_string())
                        .unwrap_or_else(|| element_text(option).trim().to_string());
                    if el.attr("selected").is_some() && selected.is_none() {
                        selected = Some(value.clone());
                    }
                    options.push(value);
                }
            }
            selected.or_else(|| options.first().cloned())
        }
        _ => attr(node, "value"),
    };

    FormInput {
        element: tag.to_string(),
        name: attr(node, "name"),
        id: attr(node, "id"),
        input_type,
        class: attr(node, "class"),
        value,
        required: attr(node, "required").is_some(),
        maxlength: attr(node, "maxlength").and_then(|m| m.trim().parse().ok()),
        accept: attr(node, "accept"),
        label: None,
        options,
    }
}
