use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::CaptchaConfig;

#[derive(Debug, Error)]
pub enum VerifyError {
    #[error("HCAPTCHA_SECRET is not configured")]
    MissingSecret,

    #[error("verification request failed: {0}")]
    RequestFailed(String),

    #[error("verification request timed out")]
    Timeout,

    #[error("unexpected verification response: {0}")]
    InvalidResponse(String),
}

/// Outcome reported by the verification service
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Accepted,
    Rejected { error_codes: Vec<String> },
}

impl Verdict {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Verdict::Accepted)
    }
}

/// Verifies a challenge token against a third-party service
#[async_trait]
pub trait ChallengeVerifier: Send + Sync {
    async fn verify(&self, token: &str, remote_ip: Option<&str>) -> Result<Verdict, VerifyError>;
}

#[derive(Debug, Deserialize)]
struct SiteVerifyResponse {
    success: bool,
    #[serde(rename = "error-codes", default)]
    error_codes: Vec<String>,
}

/// `siteverify` client
pub struct HcaptchaVerifier {
    client: Client,
    verify_url: String,
    secret: String,
}

impl HcaptchaVerifier {
    pub fn new(
        secret: impl Into<String>,
        verify_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, VerifyError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| VerifyError::RequestFailed(e.to_string()))?;

        Ok(Self {
            client,
            verify_url: verify_url.into(),
            secret: secret.into(),
        })
    }

    pub fn from_config(config: &CaptchaConfig) -> Result<Self, VerifyError> {
        let secret = config.secret.clone().ok_or(VerifyError::MissingSecret)?;
        Self::new(secret, config.verify_url.clone(), config.timeout())
    }
}

#[async_trait]
impl ChallengeVerifier for HcaptchaVerifier {
    async fn verify(&self, token: &str, remote_ip: Option<&str>) -> Result<Verdict, VerifyError> {
        let mut form = vec![("secret", self.secret.as_str()), ("response", token)];
        if let Some(ip) = remote_ip {
            form.push(("remoteip", ip));
        }

        let response = self
            .client
            .post(&self.verify_url)
            .form(&form)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    VerifyError::Timeout
                } else {
                    VerifyError::RequestFailed(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            warn!(status = status.as_u16(), "Verification service returned an error status");
            return Err(VerifyError::RequestFailed(format!("HTTP {}", status.as_u16())));
        }

        let body: SiteVerifyResponse = response
            .json()
            .await
            .map_err(|e| VerifyError::InvalidResponse(e.to_string()))?;

        if body.success {
            debug!("Challenge token accepted");
            Ok(Verdict::Accepted)
        } else {
            debug!(error_codes = ?body.error_codes, "Challenge token rejected");
            Ok(Verdict::Rejected {
                error_codes: body.error_codes,
            })
        }
    }
}
