//! Outbound email relay for intake notifications
//!
//! The intake endpoint hands a composed [`OutgoingMail`] to a [`Mailer`].
//! Sender and recipient belong to the mailer, not to the message.
//!
//! - [`SmtpMailer`]: SMTP relay with sender + app password (production)
//! - [`LogMailer`]: logs instead of sending (development default)
//! - [`MockMailer`]: records messages in memory (tests)

mod compose;
mod smtp;

pub use compose::{compose_quote_notification, escape_html, nl2br};
pub use smtp::SmtpMailer;

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use thiserror::Error;

use crate::api::models::Attachment;
use crate::config::{MailConfig, MailProvider};

#[derive(Debug, Error)]
pub enum MailError {
    #[error("invalid address '{0}'")]
    InvalidAddress(String),

    #[error("failed to build message: {0}")]
    Build(String),

    #[error("mail transport failed: {0}")]
    Transport(String),

    #[error("mail is not configured: {0}")]
    NotConfigured(&'static str),
}

pub type Result<T> = std::result::Result<T, MailError>;

/// A fully composed notification
#[derive(Debug, Clone)]
pub struct OutgoingMail {
    pub subject: String,
    pub html: String,
    pub text: String,
    pub reply_to: Option<String>,
    pub attachment: Option<Attachment>,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    /// Deliver the message once; failures are reported, not retried
    async fn send(&self, mail: OutgoingMail) -> Result<()>;
}

/// Build the mailer selected by configuration
pub fn from_config(config: &MailConfig) -> Result<Arc<dyn Mailer>> {
    match config.provider {
        MailProvider::Smtp => Ok(Arc::new(SmtpMailer::from_config(config)?)),
        MailProvider::Log => Ok(Arc::new(LogMailer)),
    }
}

/// Development mailer: logs the message instead of relaying it
#[derive(Debug, Clone, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, mail: OutgoingMail) -> Result<()> {
        tracing::info!(
            subject = %mail.subject,
            html_bytes = mail.html.len(),
            attachment = mail.attachment.as_ref().map(|a| a.filename.as_str()),
            "Mail provider is 'log', not sending"
        );
        tracing::debug!(body = %mail.text, "Notification body");
        Ok(())
    }
}

/// In-memory mailer for tests
#[derive(Debug, Clone, Default)]
pub struct MockMailer {
    sent: Arc<Mutex<Vec<OutgoingMail>>>,
    fail: bool,
}

impl MockMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// A mailer whose every send fails with a transport error
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn sent(&self) -> Vec<OutgoingMail> {
        self.sent.lock().map(|sent| sent.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Mailer for MockMailer {
    async fn send(&self, mail: OutgoingMail) -> Result<()> {
        if self.fail {
            return Err(MailError::Transport("mock transport failure".to_string()));
        }
        tracing::info!(subject = %mail.subject, "Mock send");
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(mail);
        }
        Ok(())
    }
}
