//! Request body extraction for `POST /api/quote`
//!
//! The endpoint takes the same fields either as JSON or as a multipart form
//! with an optional file. [`QuoteBody`] makes the encoding explicit instead
//! of sniffing the payload.

use axum::body::Bytes;
use axum::extract::{FromRequest, Multipart, Request};
use axum::http::StatusCode;
use axum::http::header::CONTENT_TYPE;

use super::error::ApiError;
use super::models::{Attachment, FILE_FIELD, QuoteForm, QuoteJson, TOKEN_FIELD};
use super::utils::{BodyKind, classify_content_type};

const DEFAULT_FILENAME: &str = "upload";

#[derive(Debug)]
pub enum QuoteBody {
    Json {
        form: QuoteForm,
        token: Option<String>,
    },
    Multipart {
        form: QuoteForm,
        token: Option<String>,
        file: Option<Attachment>,
    },
}

impl QuoteBody {
    pub fn into_parts(self) -> (QuoteForm, Option<String>, Option<Attachment>) {
        match self {
            QuoteBody::Json { form, token } => (form, token, None),
            QuoteBody::Multipart { form, token, file } => (form, token, file),
        }
    }
}

/// Body-limit rejections become 413, anything else is a malformed payload
fn rejection(status: StatusCode, text: String) -> ApiError {
    if status == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge("Request body too large".to_string())
    } else {
        ApiError::InvalidPayload(text)
    }
}

impl<S> FromRequest<S> for QuoteBody
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let content_type = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok());

        match classify_content_type(content_type)? {
            BodyKind::Json => {
                let bytes = Bytes::from_request(req, state)
                    .await
                    .map_err(|e| rejection(e.status(), e.body_text()))?;
                let parsed: QuoteJson = serde_json::from_slice(&bytes)?;
                Ok(QuoteBody::Json {
                    form: parsed.form,
                    token: parsed.token,
                })
            }
            BodyKind::Multipart => {
                let multipart = Multipart::from_request(req, state)
                    .await
                    .map_err(|e| rejection(e.status(), e.body_text()))?;
                read_multipart(multipart).await
            }
        }
    }
}

async fn read_multipart(mut multipart: Multipart) -> Result<QuoteBody, ApiError> {
    let mut form = QuoteForm::default();
    let mut token = None;
    let mut file = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| rejection(e.status(), e.body_text()))?
    {
        let name = field.name().unwrap_or_default().to_string();

        if name == FILE_FIELD {
            let filename = field.file_name().unwrap_or_default().to_string();
            let content_type = field
                .content_type()
                .unwrap_or(mime::APPLICATION_OCTET_STREAM.as_ref())
                .to_string();
            let bytes = field
                .bytes()
                .await
                .map_err(|e| rejection(e.status(), e.body_text()))?;

            // browsers send an empty, nameless part when no file was chosen
            if filename.is_empty() && bytes.is_empty() {
                continue;
            }
            let filename = if filename.is_empty() {
                DEFAULT_FILENAME.to_string()
            } else {
                filename
            };
            file = Some(Attachment::new(filename, content_type, bytes));
            continue;
        }

        let value = field
            .text()
            .await
            .map_err(|e| rejection(e.status(), e.body_text()))?;

        if name == TOKEN_FIELD {
            token = Some(value);
        } else if !form.set(&name, value) {
            tracing::debug!(field = %name, "Ignoring unknown multipart field");
        }
    }

    Ok(QuoteBody::Multipart { form, token, file })
}
