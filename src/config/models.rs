use crate::humanize::ByteSize;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub captcha: CaptchaConfig,
    #[serde(default)]
    pub mail: MailConfig,
    #[serde(default)]
    pub client: ClientConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,
    #[serde(default = "default_fjall_path")]
    pub fjall_path: PathBuf,
    #[serde(default)]
    pub api: ApiLimits,
}

/// Request size limits for the intake endpoints
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiLimits {
    /// Ceiling for a single attached file
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: ByteSize,
    /// Ceiling for the whole request body (fields + file + multipart framing)
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: ByteSize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            fjall_path: default_fjall_path(),
            api: ApiLimits::default(),
        }
    }
}

impl Default for ApiLimits {
    fn default() -> Self {
        Self {
            max_upload_bytes: default_max_upload_bytes(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}

fn default_fjall_path() -> PathBuf {
    PathBuf::from("data/ledger")
}

fn default_max_upload_bytes() -> ByteSize {
    ByteSize::mebibytes(20)
}

fn default_max_body_bytes() -> ByteSize {
    ByteSize::mebibytes(25)
}

/// hCaptcha server-side verification
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CaptchaConfig {
    #[serde(default = "default_verify_url")]
    pub verify_url: String,
    #[serde(default = "default_verify_timeout_secs")]
    pub timeout_secs: u64,
    /// Loaded from `HCAPTCHA_SECRET`, never from the config file
    #[serde(skip)]
    pub secret: Option<String>,
}

impl CaptchaConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for CaptchaConfig {
    fn default() -> Self {
        Self {
            verify_url: default_verify_url(),
            timeout_secs: default_verify_timeout_secs(),
            secret: None,
        }
    }
}

fn default_verify_url() -> String {
    "https://hcaptcha.com/siteverify".to_string()
}

fn default_verify_timeout_secs() -> u64 {
    10
}

/// Outbound mail provider
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MailProvider {
    Smtp,
    /// Log the composed message instead of sending it (development)
    #[default]
    Log,
}

/// Mail relay configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MailConfig {
    #[serde(default)]
    pub provider: MailProvider,
    #[serde(default = "default_smtp_host")]
    pub smtp_host: String,
    /// Implicit-TLS port unless overridden
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    #[serde(default = "default_brand")]
    pub brand: String,
    /// Sender address, from `EMAIL_USER`
    #[serde(skip)]
    pub sender: Option<String>,
    /// App password, from `EMAIL_PASS`
    #[serde(skip)]
    pub password: Option<String>,
    /// Destination, from `EMAIL_TO` (falls back to the sender)
    #[serde(skip)]
    pub recipient: Option<String>,
}

impl MailConfig {
    pub fn recipient(&self) -> Option<&str> {
        self.recipient.as_deref().or(self.sender.as_deref())
    }
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            provider: MailProvider::default(),
            smtp_host: default_smtp_host(),
            smtp_port: default_smtp_port(),
            brand: default_brand(),
            sender: None,
            password: None,
            recipient: None,
        }
    }
}

fn default_smtp_host() -> String {
    "smtp.gmail.com".to_string()
}

fn default_smtp_port() -> u16 {
    465
}

fn default_brand() -> String {
    "Digital-X".to_string()
}

/// Settings for the headless submission client (`quotebox submit`)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ClientConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_execute_timeout_secs")]
    pub execute_timeout_secs: u64,
    #[serde(default = "default_ready_wait_ms")]
    pub ready_wait_ms: u64,
    #[serde(default = "default_ready_poll_ms")]
    pub ready_poll_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            request_timeout_secs: default_request_timeout_secs(),
            execute_timeout_secs: default_execute_timeout_secs(),
            ready_wait_ms: default_ready_wait_ms(),
            ready_poll_ms: default_ready_poll_ms(),
        }
    }
}

impl ClientConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn default_endpoint() -> String {
    "http://127.0.0.1:8080/api/quote".to_string()
}

fn default_request_timeout_secs() -> u64 {
    120
}

fn default_execute_timeout_secs() -> u64 {
    60
}

fn default_ready_wait_ms() -> u64 {
    5_000
}

fn default_ready_poll_ms() -> u64 {
    100
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.server.bind_addr.to_string(), "0.0.0.0:8080");
        assert_eq!(config.server.api.max_upload_bytes.as_u64(), 20 * 1024 * 1024);
        assert_eq!(config.captcha.verify_url, "https://hcaptcha.com/siteverify");
        assert_eq!(config.mail.provider, MailProvider::Log);
        assert_eq!(config.client.request_timeout_secs, 120);
    }

    #[test]
    fn test_recipient_falls_back_to_sender() {
        let mut mail = MailConfig {
            sender: Some("agency@example.com".into()),
            ..MailConfig::default()
        };
        assert_eq!(mail.recipient(), Some("agency@example.com"));

        mail.recipient = Some("sales@example.com".into());
        assert_eq!(mail.recipient(), Some("sales@example.com"));
    }
}
