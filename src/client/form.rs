use regex::Regex;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::LazyLock;

use crate::api::models::{Attachment, QuoteForm};

pub const DEFAULT_SERVICE: &str = "Web Design";
pub const DEFAULT_BUDGET: &str = "$1k - $3k";

static EMAIL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\S+@\S+\.\S+$").unwrap_or_else(|e| panic!("email pattern must compile: {e}"))
});

/// Quote form field, ordered the way the form lays them out
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Field {
    Name,
    Email,
    Company,
    Service,
    Budget,
    Message,
}

impl Field {
    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Name => "name",
            Field::Email => "email",
            Field::Company => "company",
            Field::Service => "service",
            Field::Budget => "budget",
            Field::Message => "message",
        }
    }

    fn slot<'a>(&self, form: &'a mut QuoteForm) -> &'a mut String {
        match self {
            Field::Name => &mut form.name,
            Field::Email => &mut form.email,
            Field::Company => &mut form.company,
            Field::Service => &mut form.service,
            Field::Budget => &mut form.budget,
            Field::Message => &mut form.message,
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Field-keyed validation messages; empty means submittable
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors(BTreeMap<Field, &'static str>);

impl ValidationErrors {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn get(&self, field: Field) -> Option<&'static str> {
        self.0.get(&field).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Field, &'static str)> + '_ {
        self.0.iter().map(|(field, message)| (*field, *message))
    }

    fn insert(&mut self, field: Field, message: &'static str) {
        self.0.insert(field, message);
    }

    fn clear_field(&mut self, field: Field) {
        self.0.remove(&field);
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined: Vec<String> = self.iter().map(|(field, msg)| format!("{field}: {msg}")).collect();
        f.write_str(&joined.join(", "))
    }
}

pub fn validate(form: &QuoteForm) -> ValidationErrors {
    let mut errors = ValidationErrors::default();

    if form.name.trim().is_empty() {
        errors.insert(Field::Name, "Name is required");
    }

    if form.email.trim().is_empty() {
        errors.insert(Field::Email, "Email is required");
    } else if !EMAIL_PATTERN.is_match(&form.email) {
        errors.insert(Field::Email, "Invalid email");
    }

    if form.service.is_empty() {
        errors.insert(Field::Service, "Select a service");
    }

    if form.message.trim().is_empty() {
        errors.insert(Field::Message, "Tell us briefly about your project");
    }

    errors
}

/// Quote form with the selectable fields preset
pub fn default_form() -> QuoteForm {
    QuoteForm {
        service: DEFAULT_SERVICE.to_string(),
        budget: DEFAULT_BUDGET.to_string(),
        ..QuoteForm::default()
    }
}

/// Everything the form holds between open and close
#[derive(Debug, Clone)]
pub struct FormState {
    pub form: QuoteForm,
    pub attachment: Option<Attachment>,
    pub errors: ValidationErrors,
}

impl Default for FormState {
    fn default() -> Self {
        Self {
            form: default_form(),
            attachment: None,
            errors: ValidationErrors::default(),
        }
    }
}

impl FormState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Editing a field clears its stale error
    pub fn set_field(&mut self, field: Field, value: impl Into<String>) {
        *field.slot(&mut self.form) = value.into();
        self.errors.clear_field(field);
    }

    pub fn set_attachment(&mut self, attachment: Option<Attachment>) {
        self.attachment = attachment;
    }

    /// Run the validator and keep its result on the form
    pub fn validate(&mut self) -> &ValidationErrors {
        self.errors = validate(&self.form);
        &self.errors
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
