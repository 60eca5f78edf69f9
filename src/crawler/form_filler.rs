//! Values for form fields
//!
//! The crawler asks a [`FormFiller`] what to put in each field of a form it
//! submits. [`DefaultFormFiller`] guesses from the field's type, name and label.

use crate::extract::FormInput;
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref USER_NAME_FIELD: Regex =
        Regex::new(r"(?i)(user|login|account|uname|nick)").expect("valid user name pattern");
    static ref EMAIL_FIELD: Regex = Regex::new(r"(?i)e-?mail").expect("valid email pattern");
    static ref PHONE_FIELD: Regex = Regex::new(r"(?i)(phone|mobile|\btel\b)").expect("valid phone pattern");
    static ref NUMBER_FIELD: Regex = Regex::new(r"(?i)\b(age|qty|quantity|amount|count|zip|zipcode|postal)\b").expect("valid number pattern");
}

/// What kind of value a filler produced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillKind {
    /// The input's own value was kept
    Unchanged,
    Text,
    Email,
    Number,
    Phone,
    /// One of the values offered by a select, radio or checkbox
    Choice,
    Username,
    Password,
}

impl FillKind {
    /// Returns true for values that are account credentials
    pub fn is_credential(&self) -> bool {
        matches!(self, FillKind::Username | FillKind::Password)
    }
}

/// A value chosen for a form field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilledValue {
    pub value: String,
    pub kind: FillKind,
}

impl FilledValue {
    pub fn new(value: impl Into<String>, kind: FillKind) -> Self {
        Self {
            value: value.into(),
            kind,
        }
    }
}

/// Supplies realistic values for form fields
pub trait FormFiller: Send + Sync {
    /// Chooses a value for one input
    fn fill(&self, input: &FormInput) -> FilledValue;
}

/// Heuristic filler driven by input type, name, id and label text
#[derive(Debug, Clone)]
pub struct DefaultFormFiller {
    pub user_name: String,
    pub password: String,
    pub email: String,
    pub text: String,
    pub number: String,
    pub phone: String,
}

impl Default for DefaultFormFiller {
    fn default() -> Self {
        Self {
            user_name: "scoutline".to_string(),
            password: "Scoutline-1".to_string(),
            email: "scoutline@example.com".to_string(),
            text: "scoutline".to_string(),
            number: "1".to_string(),
            phone: "5550100".to_string(),
        }
    }
}

impl FormFiller for DefaultFormFiller {
    fn fill(&self, input: &FormInput) -> FilledValue {
        let existing = input.value.clone().unwrap_or_default();

        match input.input_type.as_str() {
            "hidden" | "submit" | "button" => {
                return FilledValue::new(existing, FillKind::Unchanged)
            }
            "password" => return FilledValue::new(self.password.clone(), FillKind::Password),
            "email" => return FilledValue::new(self.email.clone(), FillKind::Email),
            "number" | "range" => return FilledValue::new(self.number.clone(), FillKind::Number),
            "tel" => return FilledValue::new(self.phone.clone(), FillKind::Phone),
            "checkbox" | "radio" => {
                let value = if existing.is_empty() { "on".to_string() } else { existing };
                return FilledValue::new(value, FillKind::Choice);
            }
            _ => {}
        }

        if input.element == "select" {
            let value = input
                .value
                .clone()
                .or_else(|| input.options.first().cloned())
                .unwrap_or_default();
            return FilledValue::new(value, FillKind::Choice);
        }

        let descriptor = [
            input.name.as_deref(),
            input.id.as_deref(),
            input.label.as_deref(),
        ]
        .iter()
        .flatten()
        .copied()
        .collect::<Vec<_>>()
        .join(" ");

        if EMAIL_FIELD.is_match(&descriptor) {
            FilledValue::new(self.email.clone(), FillKind::Email)
        } else if USER_NAME_FIELD.is_match(&descriptor) {
            FilledValue::new(self.user_name.clone(), FillKind::Username)
        } else if PHONE_FIELD.is_match(&descriptor) {
            FilledValue::new(self.phone.clone(), FillKind::Phone)
        } else if NUMBER_FIELD.is_match(&descriptor) {
            FilledValue::new(self.number.clone(), FillKind::Number)
        } else if !existing.is_empty() {
            FilledValue::new(existing, FillKind::Unchanged)
        } else {
            FilledValue::new(self.text.clone(), FillKind::Text)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(name: &str, input_type: &str) -> FormInput {
        FormInput {
            element: "input".to_string(),
            name: Some(name.to_string()),
            input_type: input_type.to_string(),
            ..FormInput::default()
        }
    }

    #[test]
    fn test_fill_by_type() {
        let filler = DefaultFormFiller::default();
        assert_eq!(filler.fill(&input("pw", "password")).kind, FillKind::Password);
        assert_eq!(filler.fill(&input("x", "email")).kind, FillKind::Email);
        assert_eq!(filler.fill(&input("n", "number")).value, "1");

        let mut hidden = input("csrf", "hidden");
        hidden.value = Some("abc".to_string());
        assert_eq!(
            filler.fill(&hidden),
            FilledValue::new("abc", FillKind::Unchanged)
        );
    }

    #[test]
    fn test_fill_by_name_and_label() {
        let filler = DefaultFormFiller::default();
        assert_eq!(filler.fill(&input("username", "text")).kind, FillKind::Username);
        assert_eq!(filler.fill(&input("contact_email", "text")).kind, FillKind::Email);

        let mut labelled = input("f1", "text");
        labelled.label = Some("Login name".to_string());
        assert_eq!(filler.fill(&labelled).kind, FillKind::Username);

        assert_eq!(
            filler.fill(&input("q", "text")),
            FilledValue::new("scoutline", FillKind::Text)
        );
    }

    #[test]
    fn test_fill_select_uses_selected_or_first_option() {
        let filler = DefaultFormFiller::default();
        let mut select = FormInput {
            element: "select".to_string(),
            name: Some("color".to_string()),
            options: vec!["red".to_string(), "blue".to_string()],
            ..FormInput::default()
        };
        assert_eq!(filler.fill(&select).value, "red");

        select.value = Some("blue".to_string());
        assert_eq!(filler.fill(&select).value, "blue");
    }

    #[test]
    fn test_credential_kinds() {
        assert!(FillKind::Username.is_credential());
        assert!(FillKind::Password.is_credential());
        assert!(!FillKind::Email.is_credential());
    }
}
