use axum::{
    Json,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use super::{
    body::QuoteBody,
    error::ApiError,
    models::{
        Attachment, ContactRecord, ContactRequest, HealthResponse, NewsletterRequest, QuoteRecord,
        SubmissionResponse, SubscriberRecord,
    },
    state::AppState,
    utils::{non_blank, validate_file_size},
    validation::{validate_contact, validate_newsletter, validate_quote},
};
use crate::mailer::compose_quote_notification;

const QUOTE_ACCEPTED: &str = "Quote saved and email sent";
const CONTACT_ACCEPTED: &str = "Thank you for contacting us!";
const SUBSCRIBED: &str = "Subscribed successfully!";
const AUXILIARY_SERVER_ERROR: &str = "Server error. Please try again later.";

/// Quote intake endpoint (POST /api/quote)
///
/// Accepts the quote form either as `application/json` or as
/// `multipart/form-data` with an optional `file` part, and only stores it
/// once the challenge token has been verified.
///
/// ## Flow:
/// 1. Parse the body into a tagged JSON / multipart payload (400 otherwise)
/// 2. Require name, email and message (400)
/// 3. Enforce the attachment ceiling (413)
/// 4. Require `hcaptchaToken` (400)
/// 5. Verify the token with the server secret (403 on rejection, 500 when
///    the verification service cannot be reached)
/// 6. Persist a QuoteRecord with attachment metadata only
/// 7. Email the notification, with the original file attached
/// 8. Return 200 with the record id
///
/// Resubmitting identical fields creates a second, distinct record.
pub async fn submit_quote(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: QuoteBody,
) -> Result<impl IntoResponse, ApiError> {
    let (form, token, file) = body.into_parts();

    validate_quote(&form).map_err(|e| {
        state.metrics.quote_rejected();
        ApiError::InvalidPayload(e.to_string())
    })?;

    if let Some(file) = &file {
        let limit = state.config.server.api.max_upload_bytes.as_u64();
        validate_file_size(file.size(), limit).inspect_err(|_| {
            state.metrics.quote_rejected();
            warn!(size = file.size(), limit, "Rejected oversized attachment");
        })?;
    }

    let token = non_blank(token.as_deref()).ok_or_else(|| {
        state.metrics.quote_rejected();
        ApiError::MissingChallengeToken
    })?;

    let verdict = state.verifier.verify(token, client_ip(&headers)).await?;
    if !verdict.is_accepted() {
        state.metrics.captcha_failed();
        return Err(ApiError::ChallengeRejected);
    }

    let record = QuoteRecord {
        id: Uuid::now_v7().to_string(),
        form,
        file_meta: file.as_ref().map(Attachment::meta),
        created_at: Utc::now(),
    };
    state.store.insert_quote(&record)?;
    info!(id = %record.id, has_attachment = file.is_some(), "Quote request stored");

    // the record stays even if the notification cannot be delivered
    let mail_config = &state.config.mail;
    let mail = compose_quote_notification(
        &record.form,
        file.as_ref(),
        &record.id,
        &mail_config.brand,
        mail_config.recipient(),
    );
    state.mailer.send(mail).await?;
    state.metrics.email_sent();
    state.metrics.quote_accepted();

    Ok((
        StatusCode::OK,
        Json(SubmissionResponse::accepted(QUOTE_ACCEPTED, Some(record.id))),
    ))
}

/// First address in `X-Forwarded-For`, forwarded to the verifier as `remoteip`
fn client_ip(headers: &HeaderMap) -> Option<&str> {
    let forwarded = headers.get("x-forwarded-for")?.to_str().ok()?;
    non_blank(forwarded.split(',').next())
}

fn auxiliary_error(cause: impl ToString) -> ApiError {
    ApiError::Internal {
        public: AUXILIARY_SERVER_ERROR,
        cause: cause.to_string(),
    }
}

/// Contact form endpoint (POST /contact)
pub async fn submit_contact(
    State(state): State<AppState>,
    payload: Result<Json<ContactRequest>, axum::extract::rejection::JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(request) = payload.map_err(|e| ApiError::InvalidPayload(e.body_text()))?;
    validate_contact(&request).map_err(|e| ApiError::InvalidPayload(e.to_string()))?;

    let record = ContactRecord {
        id: Uuid::now_v7().to_string(),
        name: request.name,
        email: request.email,
        phone: request.phone,
        message: request.message,
        created_at: Utc::now(),
    };
    state.store.insert_contact(&record).map_err(auxiliary_error)?;
    state.metrics.contact_received();
    info!(id = %record.id, "Contact message stored");

    Ok((
        StatusCode::OK,
        Json(SubmissionResponse::accepted(CONTACT_ACCEPTED, None)),
    ))
}

/// Newsletter signup endpoint (POST /newsletter)
pub async fn subscribe_newsletter(
    State(state): State<AppState>,
    payload: Result<Json<NewsletterRequest>, axum::extract::rejection::JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(request) = payload.map_err(|e| ApiError::InvalidPayload(e.body_text()))?;
    validate_newsletter(&request).map_err(|e| ApiError::InvalidPayload(e.to_string()))?;

    let record = SubscriberRecord {
        id: Uuid::now_v7().to_string(),
        email: request.email.trim().to_string(),
        created_at: Utc::now(),
    };
    state.store.insert_subscriber(&record).map_err(auxiliary_error)?;
    state.metrics.subscriber_added();
    info!(id = %record.id, "Newsletter subscriber stored");

    Ok((StatusCode::OK, Json(SubmissionResponse::accepted(SUBSCRIBED, None))))
}

/// Stored quote lookup (GET /operators/quotes/{id})
pub async fn get_quote(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let record = state
        .store
        .get_quote(&id)?
        .ok_or_else(|| ApiError::NotFound(format!("quote {id}")))?;

    Ok((StatusCode::OK, Json(record)))
}

/// Health check endpoint (GET /health)
///
/// Reports the storage keyspace as unhealthy when it cannot be read, and
/// answers 503 in that case.
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    use std::collections::HashMap;

    let mut components = HashMap::new();
    components.insert("api".to_string(), "healthy".to_string());

    let fjall = match state.store.check() {
        Ok(()) => "healthy",
        Err(e) => {
            warn!(error = %e, "Ledger health check failed");
            "unhealthy"
        }
    };
    components.insert("fjall".to_string(), fjall.to_string());
    components.insert(
        "mailer".to_string(),
        format!("{:?}", state.config.mail.provider).to_lowercase(),
    );

    let all_healthy = fjall == "healthy";
    let status_code = if all_healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let response = HealthResponse {
        status: if all_healthy { "healthy" } else { "unhealthy" }.to_string(),
        components,
        version: env!("CARGO_PKG_VERSION").to_string(),
    };

    (status_code, Json(response))
}
