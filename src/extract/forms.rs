//! Forms and form inputs captured during extraction

use url::Url;

/// A form field (`input`, `select`, `textarea` or `button`)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormInput {
    /// Element name (`input`, `select`, ...)
    pub element: String,
    pub name: Option<String>,
    pub id: Option<String>,
    /// `type` attribute, lowercased; `text` when absent on an input
    pub input_type: String,
    pub class: Option<String>,
    /// Current value (the `value` attribute, textarea text, or selected option)
    pub value: Option<String>,
    pub required: bool,
    pub maxlength: Option<u32>,
    pub accept: Option<String>,
    /// Text of the `<label>` associated with this input
    pub label: Option<String>,
    /// Values offered by a `select`
    pub options: Vec<String>,
}

impl FormInput {
    /// Returns true if this field takes part in a submission
    pub fn is_submittable(&self) -> bool {
        self.name.as_deref().map(|n| !n.is_empty()).unwrap_or(false)
            && !matches!(self.input_type.as_str(), "reset" | "image" | "file")
    }

    /// Returns true if the two fields describe the same element
    fn same_field(&self, other: &FormInput) -> bool {
        self.element == other.element
            && self.name == other.name
            && self.id == other.id
            && self.input_type == other.input_type
    }
}

/// Identity of a form across repeated extraction
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FormKey {
    pub id: Option<String>,
    pub class: Option<String>,
    pub action: Option<String>,
    pub method: Option<String>,
    pub enctype: Option<String>,
    pub onsubmit: Option<String>,
    pub onreset: Option<String>,
    pub target: Option<String>,
}

/// A form and its ordered inputs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Form {
    pub key: FormKey,
    /// `action` resolved against the document base (the base itself when absent)
    pub action_url: Option<Url>,
    pub inputs: Vec<FormInput>,
}

impl Form {
    /// Submission method, uppercased; GET when absent or unrecognized
    pub fn method(&self) -> &'static str {
        match self.key.method.as_deref().map(|m| m.trim().to_ascii_lowercase()) {
            Some(m) if m == "post" => "POST",
            _ => "GET",
        }
    }

    /// Encoding type used for POST bodies
    pub fn enctype(&self) -> &str {
        match self.key.enctype.as_deref() {
            Some(e) if e.eq_ignore_ascii_case("multipart/form-data") => "multipart/form-data",
            Some(e) if e.eq_ignore_ascii_case("text/plain") => "text/plain",
            _ => "application/x-www-form-urlencoded",
        }
    }

    /// Adds inputs from another extraction of the same form
    ///
    /// Inputs already present are kept (a label found later fills a missing one).
    pub fn merge(&mut self, other: Form) {
        for input in other.inputs {
            match self.inputs.iter_mut().find(|i| i.same_field(&input)) {
                Some(existing) => {
                    if existing.label.is_none() {
                        existing.label = input.label;
                    }
                }
                None => self.inputs.push(input),
            }
        }
        if self.action_url.is_none() {
            self.action_url = other.action_url;
        }
    }
}

/// Attaches label text to inputs: by id first, then by name
pub fn attach_label(inputs: &mut [&mut FormInput], target: &str, text: &str) -> bool {
    let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if text.is_empty() {
        return false;
    }

    if let Some(input) = inputs
        .iter_mut()
        .find(|i| i.id.as_deref() == Some(target))
    {
        input.label = Some(text);
        return true;
    }

    if let Some(input) = inputs
        .iter_mut()
        .find(|i| i.name.as_deref() == Some(target))
    {
        input.label = Some(text);
        return true;
    }

    false
}
