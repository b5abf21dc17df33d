//! End-to-end tests for the submission client against a live intake server
//!
//! Each test binds the real router on an ephemeral port, backed by a
//! temporary ledger, a mocked verification service and an in-memory mailer,
//! then drives a quote through the headless client.

use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::net::TcpListener;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use quotebox::api::models::Attachment;
use quotebox::api::{AppState, router};
use quotebox::captcha::HcaptchaVerifier;
use quotebox::client::{self, Field, SubmissionCoordinator, SubmissionStatus, SubmitError};
use quotebox::config::{ClientConfig, Config};
use quotebox::ledger::FjallStore;
use quotebox::mailer::MockMailer;

/// Test context holding the running server and its collaborators
struct E2EContext {
    addr: SocketAddr,
    store: Arc<FjallStore>,
    mailer: MockMailer,
    _verify_server: MockServer,
    _temp_dir: TempDir,
}

impl E2EContext {
    async fn start(verdict: bool) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let store = FjallStore::open(temp_dir.path().join("ledger")).expect("Failed to open store");

        let verify_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/siteverify"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "success": verdict })))
            .mount(&verify_server)
            .await;
        let verifier = HcaptchaVerifier::new(
            "test-secret",
            format!("{}/siteverify", verify_server.uri()),
            Duration::from_secs(2),
        )
        .expect("Failed to build verifier");

        let mailer = MockMailer::new();
        let state = AppState::new(
            Config::default(),
            store,
            Arc::new(verifier),
            Arc::new(mailer.clone()),
        );
        let store = Arc::clone(&state.store);

        let listener = TcpListener::bind("127.0.0.1:0").await.expect("Failed to bind");
        let addr = listener.local_addr().expect("Listener has no address");
        let app = router(state);
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("Server failed");
        });

        Self {
            addr,
            store,
            mailer,
            _verify_server: verify_server,
            _temp_dir: temp_dir,
        }
    }

    fn client(&self) -> (SubmissionCoordinator, client::WindowFocus) {
        client_for(format!("http://{}/api/quote", self.addr))
    }
}

fn client_for(endpoint: String) -> (SubmissionCoordinator, client::WindowFocus) {
    let config = ClientConfig {
        endpoint,
        request_timeout_secs: 10,
        ..ClientConfig::default()
    };
    client::headless(&config, "10000000-aaaa-bbbb-cccc-000000000001").expect("Failed to build client")
}

fn fill_form(coordinator: &SubmissionCoordinator) {
    coordinator.set_field(Field::Name, "Jo");
    coordinator.set_field(Field::Email, "jo@x.com");
    coordinator.set_field(Field::Message, "Looking for a redesign");
}

#[tokio::test]
async fn test_quote_with_attachment_round_trip() {
    let ctx = E2EContext::start(true).await;
    let (coordinator, _focus) = ctx.client();

    fill_form(&coordinator);
    coordinator.set_field(Field::Service, "SEO");
    coordinator.set_attachment(Some(Attachment::new(
        "brief.txt",
        "text/plain",
        bytes::Bytes::from_static(b"two pages, contact form"),
    )));

    let response = coordinator.submit().await.expect("submission accepted");
    assert!(response.ok);
    let id = response.id.expect("server returns the record id");

    let record = ctx.store.get_quote(&id).unwrap().expect("record stored");
    assert_eq!(record.form.name, "Jo");
    assert_eq!(record.form.service, "SEO");
    assert_eq!(record.form.budget, "$1k - $3k");
    let meta = record.file_meta.expect("attachment metadata stored");
    assert_eq!(meta.filename, "brief.txt");
    assert_eq!(meta.size, 23);

    assert_eq!(ctx.mailer.sent().len(), 1);

    let view = coordinator.view();
    assert_eq!(view.status, SubmissionStatus::Success { id: Some(id) });
    assert!(coordinator.form_state().form.name.is_empty());
}

#[tokio::test]
async fn test_server_rejection_is_surfaced() {
    let ctx = E2EContext::start(false).await;
    let (coordinator, _focus) = ctx.client();
    fill_form(&coordinator);

    let err = coordinator.submit().await.unwrap_err();
    assert_eq!(
        err,
        SubmitError::Server {
            status: 403,
            message: "Captcha verification failed".to_string(),
        }
    );
    assert_eq!(err.user_message(), "Captcha verification failed");

    let view = coordinator.view();
    assert!(matches!(view.status, SubmissionStatus::Error { .. }));
    assert_eq!(coordinator.form_state().form.name, "Jo");
    assert_eq!(ctx.store.stats().quote_count, 0);
}

#[tokio::test]
async fn test_invalid_form_never_reaches_server() {
    let ctx = E2EContext::start(true).await;
    let (coordinator, _focus) = ctx.client();
    coordinator.set_field(Field::Name, "Jo");
    coordinator.set_field(Field::Email, "not-an-email");

    let err = coordinator.submit().await.unwrap_err();
    assert!(matches!(err, SubmitError::Validation(_)));
    assert_eq!(ctx.store.stats().quote_count, 0);
}

#[tokio::test]
async fn test_cancel_during_upload_keeps_form() {
    let slow = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/quote"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "ok": true, "message": "late", "id": "never" }))
                .set_delay(Duration::from_secs(30)),
        )
        .mount(&slow)
        .await;

    let (coordinator, _focus) = client_for(format!("{}/api/quote", slow.uri()));
    fill_form(&coordinator);

    let mut updates = coordinator.subscribe();
    let (result, _) = tokio::join!(coordinator.submit(), async {
        updates
            .wait_for(|view| matches!(view.status, SubmissionStatus::Uploading { .. }))
            .await
            .expect("coordinator dropped");
        coordinator.cancel();
    });

    assert_eq!(result.unwrap_err(), SubmitError::Canceled);
    let view = coordinator.view();
    assert_eq!(view.status, SubmissionStatus::Idle);
    assert!(view.notice.is_none());
    assert_eq!(coordinator.form_state().form.message, "Looking for a redesign");
    assert!(!coordinator.is_submitting());
}
