use async_trait::async_trait;
use bytes::Bytes;
use futures::stream;
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Client};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::api::models::{Attachment, FILE_FIELD, QuoteForm, SubmissionResponse, TOKEN_FIELD};
use crate::config::ClientConfig;

const CHUNK_SIZE: usize = 64 * 1024;
const GENERIC_SERVER_ERROR: &str = "Server error";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("upload canceled")]
    Canceled,

    #[error("upload timed out")]
    TimedOut,

    #[error("network error: {0}")]
    Network(String),

    #[error("{message}")]
    Server { status: u16, message: String },
}

/// Upload progress as `(bytes sent, total bytes)` of the attachment
pub type ProgressFn = Arc<dyn Fn(u64, u64) + Send + Sync>;

/// Everything one quote upload carries
#[derive(Debug, Clone)]
pub struct Upload {
    pub form: QuoteForm,
    pub token: String,
    pub attachment: Option<Attachment>,
}

#[async_trait]
pub trait QuoteTransport: Send + Sync {
    async fn send(
        &self,
        upload: Upload,
        progress: ProgressFn,
        cancel: CancellationToken,
    ) -> Result<SubmissionResponse, TransportError>;
}

/// Multipart POST to the intake endpoint
pub struct HttpTransport {
    client: Client,
    endpoint: String,
}

impl HttpTransport {
    /// `timeout` bounds the whole exchange, body upload included
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Network(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self, TransportError> {
        Self::new(config.endpoint.clone(), config.request_timeout())
    }
}

fn classify(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::TimedOut
    } else {
        TransportError::Network(err.to_string())
    }
}

/// File part that reports progress as the body is pulled onto the wire
fn file_part(attachment: Attachment, progress: ProgressFn) -> Result<Part, TransportError> {
    let total = attachment.size();
    let content_type = match attachment.content_type.parse::<mime::Mime>() {
        Ok(_) => attachment.content_type,
        Err(_) => mime::APPLICATION_OCTET_STREAM.to_string(),
    };
    let bytes = attachment.bytes;
    let chunks: Vec<Bytes> = (0..bytes.len())
        .step_by(CHUNK_SIZE)
        .map(|start| bytes.slice(start..(start + CHUNK_SIZE).min(bytes.len())))
        .collect();

    let mut sent = 0u64;
    let body = stream::iter(chunks.into_iter().map(move |chunk| {
        sent += chunk.len() as u64;
        progress(sent, total);
        Ok::<Bytes, std::io::Error>(chunk)
    }));

    Part::stream_with_length(Body::wrap_stream(body), total)
        .file_name(attachment.filename)
        .mime_str(&content_type)
        .map_err(|e| TransportError::Network(e.to_string()))
}

fn build_form(upload: Upload, progress: ProgressFn) -> Result<Form, TransportError> {
    let mut form = Form::new();
    for (name, value) in upload.form.fields() {
        form = form.text(name, value.to_string());
    }
    form = form.text(TOKEN_FIELD, upload.token);

    match upload.attachment {
        Some(attachment) => form = form.part(FILE_FIELD, file_part(attachment, progress)?),
        None => progress(0, 0),
    }
    Ok(form)
}

#[async_trait]
impl QuoteTransport for HttpTransport {
    async fn send(
        &self,
        upload: Upload,
        progress: ProgressFn,
        cancel: CancellationToken,
    ) -> Result<SubmissionResponse, TransportError> {
        let form = build_form(upload, progress)?;
        let request = self.client.post(&self.endpoint).multipart(form).send();

        let response = tokio::select! {
            _ = cancel.cancelled() => {
                debug!("Upload aborted before a response arrived");
                return Err(TransportError::Canceled);
            }
            result = request => result.map_err(classify)?,
        };

        let status = response.status();
        let body = tokio::select! {
            _ = cancel.cancelled() => return Err(TransportError::Canceled),
            result = response.bytes() => result.map_err(classify)?,
        };
        let parsed: Option<SubmissionResponse> = serde_json::from_slice(&body).ok();

        if status.is_success() {
            return Ok(parsed.unwrap_or(SubmissionResponse {
                ok: true,
                message: String::new(),
                id: None,
            }));
        }

        let message = parsed
            .map(|p| p.message)
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| GENERIC_SERVER_ERROR.to_string());
        warn!(status = status.as_u16(), %message, "Intake endpoint rejected the submission");

        Err(TransportError::Server {
            status: status.as_u16(),
            message,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn upload(attachment: Option<Attachment>) -> Upload {
        Upload {
            form: QuoteForm {
                name: "Jo".into(),
                email: "jo@x.com".into(),
                service: "Web Design".into(),
                message: "hi".into(),
                ..QuoteForm::default()
            },
            token: "tok-1".into(),
            attachment,
        }
    }

    fn no_progress() -> ProgressFn {
        Arc::new(|_, _| {})
    }

    fn transport(server: &MockServer) -> HttpTransport {
        HttpTransport::new(format!("{}/api/quote", server.uri()), Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn sends_fields_token_and_file() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/quote"))
            .and(body_string_contains("name=\"hcaptchaToken\""))
            .and(body_string_contains("tok-1"))
            .and(body_string_contains("filename=\"brief.txt\""))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "ok": true,
                "message": "Quote saved and email sent",
                "id": "rec-1"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let seen = Arc::new(Mutex::new(Vec::new()));
        let progress: ProgressFn = {
            let seen = seen.clone();
            Arc::new(move |sent, total| seen.lock().unwrap().push((sent, total)))
        };
        let file = Attachment::new("brief.txt", "text/plain", Bytes::from(vec![b'a'; 150 * 1024]));

        let response = transport(&server)
            .send(upload(Some(file)), progress, CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(response.id.as_deref(), Some("rec-1"));
        let seen = seen.lock().unwrap();
        assert_eq!(seen.last(), Some(&(150 * 1024, 150 * 1024)));
        assert_eq!(seen.len(), 3);
    }

    #[tokio::test]
    async fn surfaces_server_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(403).set_body_json(serde_json::json!({
                "ok": false,
                "code": "CAPTCHA_REJECTED",
                "message": "Captcha verification failed"
            })))
            .mount(&server)
            .await;

        let err = transport(&server)
            .send(upload(None), no_progress(), CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(
            err,
            TransportError::Server {
                status: 403,
                message: "Captcha verification failed".into()
            }
        );
    }

    #[tokio::test]
    async fn falls_back_to_generic_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(502).set_body_string("<html>bad gateway</html>"))
            .mount(&server)
            .await;

        let err = transport(&server)
            .send(upload(None), no_progress(), CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(
            err,
            TransportError::Server {
                status: 502,
                message: "Server error".into()
            }
        );
    }

    #[tokio::test]
    async fn cancel_aborts_inflight_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(30)))
            .mount(&server)
            .await;

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            trigger.cancel();
        });

        let err = transport(&server)
            .send(upload(None), no_progress(), cancel)
            .await
            .unwrap_err();
        assert_eq!(err, TransportError::Canceled);
    }

    #[tokio::test]
    async fn slow_endpoint_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(30)))
            .mount(&server)
            .await;

        let transport =
            HttpTransport::new(format!("{}/api/quote", server.uri()), Duration::from_millis(200)).unwrap();
        let err = transport
            .send(upload(None), no_progress(), CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err, TransportError::TimedOut);
    }
}
