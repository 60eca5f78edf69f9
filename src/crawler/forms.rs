//! Form submission targets
//!
//! Turns an extracted form into the request a browser would send when the
//! form is submitted: GET forms become a query string on the action URL,
//! POST forms a body encoded per the form's `enctype`.

use crate::crawler::form_filler::FormFiller;
use crate::extract::{Form, FormInput};
use crate::frontier::Target;
use std::collections::HashSet;
use url::form_urlencoded;
use url::Url;

/// How field values are chosen for a submission
#[derive(Clone, Copy)]
pub struct FillPolicy<'a> {
    /// Consulted for values when present
    pub filler: Option<&'a dyn FormFiller>,
    /// Submit filler-provided user names and passwords
    pub submit_credentials: bool,
}

impl<'a> FillPolicy<'a> {
    /// Keeps every input's existing value
    pub fn existing_values() -> Self {
        Self {
            filler: None,
            submit_credentials: false,
        }
    }
}

/// Builds the submission target for a form
///
/// # Arguments
///
/// * `form` - The extracted form
/// * `policy` - Where field values come from
/// * `referer` - URL of the page the form was found on
/// * `depth` - Depth charged to the submission
///
/// # Returns
///
/// `None` if the form has no usable action URL
pub fn form_target(form: &Form, policy: FillPolicy<'_>, referer: &str, depth: u32) -> Option<Target> {
    let action = form.action_url.as_ref()?;
    if !matches!(action.scheme(), "http" | "https") {
        return None;
    }

    let fields = submission_fields(&form.inputs, policy);
    let encoded = form_urlencoded::Serializer::new(String::new())
        .extend_pairs(fields.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .finish();

    match form.method() {
        "POST" => {
            let encoding = match form.enctype() {
                "multipart/form-data" => "multipart/form-data",
                _ => "application/x-www-form-urlencoded",
            };
            Some(Target::post(action.clone(), encoding, encoded, Some(referer), depth))
        }
        _ => {
            let mut url: Url = action.clone();
            url.set_fragment(None);
            url.set_query(if encoded.is_empty() { None } else { Some(&encoded) });
            Some(Target::get(url, Some(referer), depth))
        }
    }
}

/// Picks the `(name, value)` pairs a submission carries, in document order
///
/// Only the first submit button and the first radio button of each group
/// are sent.
fn submission_fields(inputs: &[FormInput], policy: FillPolicy<'_>) -> Vec<(String, String)> {
    let mut fields = Vec::new();
    let mut seen_submit = false;
    let mut seen_radio = HashSet::new();

    for input in inputs.iter().filter(|i| i.is_submittable()) {
        let name = match &input.name {
            Some(name) => name.clone(),
            None => continue,
        };

        match input.input_type.as_str() {
            "submit" | "button" => {
                if seen_submit || (input.element == "button" && input.value.is_none()) {
                    continue;
                }
                seen_submit = true;
            }
            "radio" => {
                if !seen_radio.insert(name.clone()) {
                    continue;
                }
            }
            _ => {}
        }

        fields.push((name, field_value(input, policy)));
    }

    fields
}

fn field_value(input: &FormInput, policy: FillPolicy<'_>) -> String {
    let existing = input
        .value
        .clone()
        .or_else(|| input.options.first().cloned())
        .unwrap_or_default();

    let filler = match policy.filler {
        Some(filler) => filler,
        None => return existing,
    };

    let filled = filler.fill(input);
    if filled.kind.is_credential() && !policy.submit_credentials {
        tracing::trace!(
            "Keeping existing value for credential field {:?}",
            input.name
        );
        return existing;
    }

    filled.value
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::form_filler::DefaultFormFiller;
    use crate::extract::FormKey;

    fn input(name: &str, input_type: &str, value: Option<&str>) -> FormInput {
        FormInput {
            element: "input".to_string(),
            name: Some(name.to_string()),
            input_type: input_type.to_string(),
            value: value.map(str::to_string),
            ..FormInput::default()
        }
    }

    fn form(method: Option<&str>, enctype: Option<&str>, inputs: Vec<FormInput>) -> Form {
        Form {
            key: FormKey {
                id: None,
                class: None,
                action: Some("/s".to_string()),
                method: method.map(str::to_string),
                enctype: enctype.map(str::to_string),
                onsubmit: None,
                onreset: None,
                target: None,
            },
            action_url: Some(Url::parse("http://h/s?old=1#frag").unwrap()),
            inputs,
        }
    }

    #[test]
    fn test_get_form_builds_query() {
        let form = form(
            None,
            None,
            vec![
                input("q", "text", Some("rust lang")),
                input("go", "submit", Some("Search")),
                input("other", "submit", Some("Other")),
            ],
        );

        let target = form_target(&form, FillPolicy::existing_values(), "http://h/", 2).unwrap();
        assert_eq!(target.method, "GET");
        assert_eq!(target.url.as_str(), "http://h/s?q=rust+lang&go=Search");
        assert_eq!(target.referer.as_deref(), Some("http://h/"));
        assert_eq!(target.depth, 2);
    }

    #[test]
    fn test_post_form_builds_body() {
        let form = form(
            Some("post"),
            None,
            vec![input("a", "text", Some("1")), input("b", "hidden", Some("x y"))],
        );

        let target = form_target(&form, FillPolicy::existing_values(), "http://h/", 1).unwrap();
        assert_eq!(target.method, "POST");
        assert_eq!(
            target.body_encoding.as_deref(),
            Some("application/x-www-form-urlencoded")
        );
        assert_eq!(target.body_params.as_deref(), Some("a=1&b=x+y"));
    }

    #[test]
    fn test_multipart_form_records_encoding() {
        let form = form(
            Some("POST"),
            Some("multipart/form-data"),
            vec![input("a", "text", Some("1"))],
        );
        let target = form_target(&form, FillPolicy::existing_values(), "http://h/", 1).unwrap();
        assert_eq!(target.body_encoding.as_deref(), Some("multipart/form-data"));
    }

    #[test]
    fn test_credentials_fall_back_to_existing_value() {
        let filler = DefaultFormFiller::default();
        let form = form(
            Some("post"),
            None,
            vec![
                input("username", "text", Some("")),
                input("password", "password", None),
                input("comment", "text", None),
            ],
        );

        let guarded = FillPolicy {
            filler: Some(&filler),
            submit_credentials: false,
        };
        let target = form_target(&form, guarded, "http://h/", 1).unwrap();
        assert_eq!(
            target.body_params.as_deref(),
            Some("username=&password=&comment=scoutline")
        );

        let open = FillPolicy {
            filler: Some(&filler),
            submit_credentials: true,
        };
        let target = form_target(&form, open, "http://h/", 1).unwrap();
        assert_eq!(
            target.body_params.as_deref(),
            Some("username=scoutline&password=Scoutline-1&comment=scoutline")
        );
    }

    #[test]
    fn test_form_without_action_url() {
        let mut form = form(None, None, Vec::new());
        form.action_url = None;
        assert!(form_target(&form, FillPolicy::existing_values(), "http://h/", 1).is_none());
    }
}
