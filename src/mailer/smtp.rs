use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::{Attachment as MailAttachment, Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::info;

use super::{MailError, Mailer, OutgoingMail, Result};
use crate::config::MailConfig;

const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

/// SMTP relay using an app credential (e.g. Gmail app password)
#[derive(Clone)]
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Mailbox,
}

impl SmtpMailer {
    pub fn from_config(config: &MailConfig) -> Result<Self> {
        let sender = config
            .sender
            .as_deref()
            .ok_or(MailError::NotConfigured("EMAIL_USER"))?;
        let password = config
            .password
            .as_deref()
            .ok_or(MailError::NotConfigured("EMAIL_PASS"))?;
        let recipient = config.recipient().unwrap_or(sender);

        let from = parse_mailbox(sender)?;
        let to = parse_mailbox(recipient)?;

        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_host)
            .map_err(|e| MailError::Transport(e.to_string()))?
            .port(config.smtp_port)
            .credentials(Credentials::new(sender.to_string(), password.to_string()))
            .build();

        info!(
            host = %config.smtp_host,
            port = config.smtp_port,
            "SMTP mailer initialized"
        );

        Ok(Self {
            transport,
            from,
            to,
        })
    }

    fn build_message(&self, mail: OutgoingMail) -> Result<Message> {
        let alternative = MultiPart::alternative_plain_html(mail.text, mail.html);

        let body = match mail.attachment {
            Some(attachment) => {
                let content_type = ContentType::parse(&attachment.content_type)
                    .or_else(|_| ContentType::parse(FALLBACK_CONTENT_TYPE))
                    .map_err(|e| MailError::Build(e.to_string()))?;
                MultiPart::mixed().multipart(alternative).singlepart(
                    MailAttachment::new(attachment.filename).body(attachment.bytes.to_vec(), content_type),
                )
            }
            None => alternative,
        };

        let mut builder = Message::builder()
            .from(self.from.clone())
            .to(self.to.clone())
            .subject(mail.subject);

        // a malformed submitter address only loses the Reply-To header
        if let Some(reply_to) = mail.reply_to.as_deref().and_then(|a| a.parse::<Mailbox>().ok()) {
            builder = builder.reply_to(reply_to);
        }

        builder
            .multipart(body)
            .map_err(|e| MailError::Build(e.to_string()))
    }
}

fn parse_mailbox(address: &str) -> Result<Mailbox> {
    address
        .parse()
        .map_err(|_| MailError::InvalidAddress(address.to_string()))
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, mail: OutgoingMail) -> Result<()> {
        let message = self.build_message(mail)?;
        self.transport
            .send(message)
            .await
            .map_err(|e| MailError::Transport(e.to_string()))?;
        info!(to = %self.to, "Notification email sent");
        Ok(())
    }
}
