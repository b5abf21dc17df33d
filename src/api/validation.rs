use thiserror::Error;

use super::models::{ContactRequest, NewsletterRequest, QuoteForm};
use super::utils::non_blank;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SubmissionValidationError {
    #[error("name, email and message are required")]
    MissingQuoteFields,

    #[error("All fields are required.")]
    MissingContactFields,

    #[error("Email is required.")]
    MissingEmail,
}

/// Server-side gate for a quote; the client validator is stricter
pub fn validate_quote(form: &QuoteForm) -> Result<(), SubmissionValidationError> {
    let required = [&form.name, &form.email, &form.message];
    if required.iter().any(|value| non_blank(Some(value.as_str())).is_none()) {
        return Err(SubmissionValidationError::MissingQuoteFields);
    }
    Ok(())
}

pub fn validate_contact(request: &ContactRequest) -> Result<(), SubmissionValidationError> {
    let required = [
        &request.name,
        &request.email,
        &request.phone,
        &request.message,
    ];
    if required.iter().any(|value| non_blank(Some(value.as_str())).is_none()) {
        return Err(SubmissionValidationError::MissingContactFields);
    }
    Ok(())
}

pub fn validate_newsletter(request: &NewsletterRequest) -> Result<(), SubmissionValidationError> {
    non_blank(Some(request.email.as_str()))
        .map(|_| ())
        .ok_or(SubmissionValidationError::MissingEmail)
}
