use axum::{Json, http::StatusCode, response::IntoResponse};
use thiserror::Error;
use tracing::error;

use super::models::ErrorResponse;
use crate::captcha::VerifyError;
use crate::ledger::LedgerError;
use crate::mailer::MailError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    InvalidPayload(String),
    #[error("Unsupported content-type")]
    UnsupportedMediaType,
    #[error("Missing captcha token")]
    MissingChallengeToken,
    #[error("Captcha verification failed")]
    ChallengeRejected,
    #[error("{0}")]
    PayloadTooLarge(String),
    #[error("resource not found: {0}")]
    NotFound(String),
    /// Message shown to the caller; the cause is logged, never returned
    #[error("{public}")]
    Internal { public: &'static str, cause: String },
}

pub const SERVER_ERROR: &str = "Server error";

impl ApiError {
    pub fn internal(cause: impl ToString) -> Self {
        ApiError::Internal {
            public: SERVER_ERROR,
            cause: cause.to_string(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::InvalidPayload(_)
            | ApiError::UnsupportedMediaType
            | ApiError::MissingChallengeToken => StatusCode::BAD_REQUEST,
            ApiError::ChallengeRejected => StatusCode::FORBIDDEN,
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::InvalidPayload(_) => "INVALID_PAYLOAD",
            ApiError::UnsupportedMediaType => "UNSUPPORTED_MEDIA_TYPE",
            ApiError::MissingChallengeToken => "MISSING_CAPTCHA_TOKEN",
            ApiError::ChallengeRejected => "CAPTCHA_REJECTED",
            ApiError::PayloadTooLarge(_) => "PAYLOAD_TOO_LARGE",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::Internal { .. } => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        if let ApiError::Internal { cause, .. } = &self {
            error!(%cause, "Request failed");
        }

        let status = self.status_code();
        let body = ErrorResponse {
            ok: false,
            code: self.code(),
            message: self.to_string(),
        };

        (status, Json(body)).into_response()
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(value: serde_json::Error) -> Self {
        ApiError::InvalidPayload(format!("Invalid JSON body: {value}"))
    }
}

impl From<LedgerError> for ApiError {
    fn from(value: LedgerError) -> Self {
        ApiError::internal(format!("ledger: {value}"))
    }
}

impl From<VerifyError> for ApiError {
    fn from(value: VerifyError) -> Self {
        ApiError::internal(format!("captcha verification: {value}"))
    }
}

impl From<MailError> for ApiError {
    fn from(value: MailError) -> Self {
        ApiError::internal(format!("mail: {value}"))
    }
}
