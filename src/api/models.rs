//! API models for the Quotebox intake endpoints.
//!
//! This module defines the wire contract shared by the server and the
//! headless client:
//! - `POST /api/quote` accepts a [`QuoteForm`] plus `hcaptchaToken`, either as
//!   `multipart/form-data` (with an optional `file` part) or as JSON
//! - `POST /contact` accepts a [`ContactRequest`]
//! - `POST /newsletter` accepts a [`NewsletterRequest`]
//! - every intake endpoint answers with a [`SubmissionResponse`]
//!
//! # Quote Payload
//!
//! ```json
//! {
//!   "name": "Jo",
//!   "email": "jo@x.com",
//!   "company": "",
//!   "service": "Web Design",
//!   "budget": "$1k - $3k",
//!   "message": "hi",
//!   "hcaptchaToken": "P1_eyJ0eXAiOiJKV1Qi..."
//! }
//! ```
//!
//! Persisted records ([`QuoteRecord`], [`ContactRecord`], [`SubscriberRecord`])
//! are identified by a server-generated UUIDv7 and are never mutated after
//! insertion. Quote records keep only [`FileMeta`] for an attachment, never
//! its bytes.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Multipart/JSON field carrying the challenge token
pub const TOKEN_FIELD: &str = "hcaptchaToken";

/// Multipart field carrying the optional attachment
pub const FILE_FIELD: &str = "file";

pub const SERVICE_OPTIONS: &[&str] = &[
    "Web Design",
    "SEO",
    "Social Media",
    "PPC / Ads",
    "Branding",
    "Custom Software / App",
];

pub const BUDGET_OPTIONS: &[&str] = &["$500 - $1k", "$1k - $3k", "$3k - $10k", "$10k+", "Not sure"];

/// The quote form fields as they travel over the wire
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuoteForm {
    pub name: String,
    pub email: String,
    pub company: String,
    pub service: String,
    pub budget: String,
    pub message: String,
}

impl QuoteForm {
    /// `(field name, value)` pairs in submission order
    pub fn fields(&self) -> [(&'static str, &str); 6] {
        [
            ("name", &self.name),
            ("email", &self.email),
            ("company", &self.company),
            ("service", &self.service),
            ("budget", &self.budget),
            ("message", &self.message),
        ]
    }

    /// Assign a text field by its wire name; unknown names are ignored
    pub fn set(&mut self, field: &str, value: String) -> bool {
        let slot = match field {
            "name" => &mut self.name,
            "email" => &mut self.email,
            "company" => &mut self.company,
            "service" => &mut self.service,
            "budget" => &mut self.budget,
            "message" => &mut self.message,
            _ => return false,
        };
        *slot = value;
        true
    }
}

/// JSON flavour of the quote payload
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QuoteJson {
    #[serde(flatten)]
    pub form: QuoteForm,
    #[serde(rename = "hcaptchaToken", default)]
    pub token: Option<String>,
}

/// An uploaded file held in memory
#[derive(Clone, PartialEq, Eq)]
pub struct Attachment {
    pub filename: String,
    pub content_type: String,
    pub bytes: Bytes,
}

impl Attachment {
    pub fn new(filename: impl Into<String>, content_type: impl Into<String>, bytes: Bytes) -> Self {
        Self {
            filename: filename.into(),
            content_type: content_type.into(),
            bytes,
        }
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn meta(&self) -> FileMeta {
        FileMeta {
            filename: self.filename.clone(),
            content_type: self.content_type.clone(),
            size: self.size(),
        }
    }
}

impl std::fmt::Debug for Attachment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Attachment")
            .field("filename", &self.filename)
            .field("content_type", &self.content_type)
            .field("size", &self.bytes.len())
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMeta {
    pub filename: String,
    pub content_type: String,
    pub size: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuoteRecord {
    pub id: String,
    #[serde(flatten)]
    pub form: QuoteForm,
    pub file_meta: Option<FileMeta>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContactRecord {
    pub id: String,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriberRecord {
    pub id: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

/// Contact form body; the site posts capitalised keys
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ContactRequest {
    #[serde(rename = "Name", alias = "name")]
    pub name: String,
    #[serde(rename = "Email", alias = "email")]
    pub email: String,
    #[serde(rename = "Phone", alias = "phone")]
    pub phone: String,
    #[serde(rename = "Message", alias = "message")]
    pub message: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NewsletterRequest {
    pub email: String,
}

/// Body of every intake response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionResponse {
    pub ok: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl SubmissionResponse {
    pub fn accepted(message: impl Into<String>, id: Option<String>) -> Self {
        Self {
            ok: true,
            message: message.into(),
            id,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub ok: bool,
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub components: HashMap<String, String>,
    pub version: String,
}
