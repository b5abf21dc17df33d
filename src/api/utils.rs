//! API utility functions
//!
//! Pure, stateless helpers for request processing, kept apart from the
//! handlers so they can be unit tested.

use crate::api::error::ApiError;
use crate::humanize::ByteSize;

/// Body encodings the intake endpoint understands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyKind {
    Json,
    Multipart,
}

/// Classifies a Content-Type header value
///
/// Accepts:
/// - `application/json` (with or without charset)
/// - `multipart/form-data; boundary=...`
///
/// Everything else, including a missing or malformed header, is
/// [`ApiError::UnsupportedMediaType`].
pub fn classify_content_type(content_type: Option<&str>) -> Result<BodyKind, ApiError> {
    let media_type: mime::Mime = content_type
        .ok_or(ApiError::UnsupportedMediaType)?
        .parse()
        .map_err(|_| ApiError::UnsupportedMediaType)?;

    match (media_type.type_(), media_type.subtype()) {
        (mime::APPLICATION, mime::JSON) => Ok(BodyKind::Json),
        (mime::MULTIPART, mime::FORM_DATA) => Ok(BodyKind::Multipart),
        _ => Err(ApiError::UnsupportedMediaType),
    }
}

/// Enforces the attachment ceiling; a file of exactly `max_size` passes
pub fn validate_file_size(size: u64, max_size: u64) -> Result<(), ApiError> {
    if size > max_size {
        return Err(ApiError::PayloadTooLarge(format!(
            "File too large (max {})",
            ByteSize(max_size).to_human_readable()
        )));
    }
    Ok(())
}

/// Trimmed value, `None` when blank
pub fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
