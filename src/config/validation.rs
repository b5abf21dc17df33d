use super::models::{Config, MailProvider};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("max_upload_bytes ({upload}) exceeds max_body_bytes ({body})")]
    UploadExceedsBodyLimit { upload: u64, body: u64 },

    #[error("{field} must be positive")]
    ZeroLimit { field: &'static str },

    #[error("Mail provider is SMTP but EMAIL_USER or EMAIL_PASS is missing")]
    MissingSmtpCredentials,

    #[error("Invalid captcha verify_url '{url}', expected http:// or https://")]
    InvalidVerifyUrl { url: String },

    #[error("Invalid client endpoint '{url}', expected http:// or https://")]
    InvalidClientEndpoint { url: String },
}

/// Validate the entire configuration
pub fn validate(config: &Config) -> Result<(), ValidationError> {
    validate_limits(config)?;
    validate_captcha(config)?;
    validate_mail(config)?;
    validate_client(config)?;
    Ok(())
}

fn is_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

fn validate_limits(config: &Config) -> Result<(), ValidationError> {
    let api = &config.server.api;

    if api.max_upload_bytes.as_u64() == 0 {
        return Err(ValidationError::ZeroLimit {
            field: "server.api.max_upload_bytes",
        });
    }

    if api.max_upload_bytes > api.max_body_bytes {
        return Err(ValidationError::UploadExceedsBodyLimit {
            upload: api.max_upload_bytes.as_u64(),
            body: api.max_body_bytes.as_u64(),
        });
    }

    Ok(())
}

fn validate_captcha(config: &Config) -> Result<(), ValidationError> {
    if !is_http_url(&config.captcha.verify_url) {
        return Err(ValidationError::InvalidVerifyUrl {
            url: config.captcha.verify_url.clone(),
        });
    }

    if config.captcha.timeout_secs == 0 {
        return Err(ValidationError::ZeroLimit {
            field: "captcha.timeout_secs",
        });
    }

    Ok(())
}

/// SMTP needs a sender and an app password; the log provider needs nothing
fn validate_mail(config: &Config) -> Result<(), ValidationError> {
    if config.mail.provider == MailProvider::Smtp
        && (config.mail.sender.is_none() || config.mail.password.is_none())
    {
        return Err(ValidationError::MissingSmtpCredentials);
    }

    Ok(())
}

fn validate_client(config: &Config) -> Result<(), ValidationError> {
    let client = &config.client;

    if !is_http_url(&client.endpoint) {
        return Err(ValidationError::InvalidClientEndpoint {
            url: client.endpoint.clone(),
        });
    }

    for (field, value) in [
        ("client.request_timeout_secs", client.request_timeout_secs),
        ("client.execute_timeout_secs", client.execute_timeout_secs),
        ("client.ready_wait_ms", client.ready_wait_ms),
        ("client.ready_poll_ms", client.ready_poll_ms),
    ] {
        if value == 0 {
            return Err(ValidationError::ZeroLimit { field });
        }
    }

    Ok(())
}
