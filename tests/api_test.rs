use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tower::ServiceExt; // for `oneshot`
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use quotebox::api::models::{QuoteRecord, SubmissionResponse};
use quotebox::api::{AppState, router};
use quotebox::captcha::HcaptchaVerifier;
use quotebox::config::Config;
use quotebox::ledger::FjallStore;
use quotebox::mailer::MockMailer;

const BOUNDARY: &str = "X-QUOTEBOX-TEST-BOUNDARY";

struct TestApp {
    app: Router,
    store: Arc<FjallStore>,
    mailer: MockMailer,
    verify_server: MockServer,
    _temp_dir: TempDir,
}

/// Mounts a siteverify mock answering `success`
async fn mount_verifier(server: &MockServer, success: bool) {
    Mock::given(method("POST"))
        .and(path("/siteverify"))
        .and(body_string_contains("secret=test-secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": success,
            "error-codes": if success { json!([]) } else { json!(["invalid-input-response"]) }
        })))
        .mount(server)
        .await;
}

/// Builds a test app with an isolated ledger, a mocked verification service
/// and an in-memory mailer
async fn build_test_app_with(mailer: MockMailer) -> TestApp {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let store = FjallStore::open(temp_dir.path().join("ledger")).expect("Failed to open test store");

    let verify_server = MockServer::start().await;
    let verifier = HcaptchaVerifier::new(
        "test-secret",
        format!("{}/siteverify", verify_server.uri()),
        Duration::from_secs(2),
    )
    .expect("Failed to build verifier");

    let mut config = Config::default();
    config.server.fjall_path = temp_dir.path().join("ledger");
    config.mail.recipient = Some("sales@example.com".into());

    let state = AppState::new(config, store, Arc::new(verifier), Arc::new(mailer.clone()));
    let store = Arc::clone(&state.store);

    TestApp {
        app: router(state),
        store,
        mailer,
        verify_server,
        _temp_dir: temp_dir,
    }
}

async fn build_test_app() -> TestApp {
    build_test_app_with(MockMailer::new()).await
}

fn json_quote(token: Option<&str>) -> Request<Body> {
    let mut payload = json!({
        "name": "Jo",
        "email": "jo@x.com",
        "service": "Web Design",
        "message": "hi"
    });
    if let Some(token) = token {
        payload["hcaptchaToken"] = json!(token);
    }

    Request::builder()
        .uri("/api/quote")
        .method("POST")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(payload.to_string()))
        .unwrap()
}

fn multipart_quote(token: &str, file: Option<(&str, Vec<u8>)>) -> Request<Body> {
    let fields = [
        ("name", "Jo"),
        ("email", "jo@x.com"),
        ("company", "Acme"),
        ("service", "SEO"),
        ("budget", "$3k - $10k"),
        ("message", "Need a new site\nwith a blog"),
        ("hcaptchaToken", token),
    ];

    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!("--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n")
                .as_bytes(),
        );
    }
    if let Some((filename, contents)) = file {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\n\
                 Content-Type: application/pdf\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(&contents);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .uri("/api/quote")
        .method("POST")
        .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"))
        .body(Body::from(body))
        .unwrap()
}

async fn read_json(response: axum::response::Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn test_quote_accepted_and_stored() {
    let test = build_test_app().await;
    mount_verifier(&test.verify_server, true).await;

    let response = test.app.clone().oneshot(json_quote(Some("tok"))).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body: SubmissionResponse = serde_json::from_value(read_json(response).await).unwrap();
    assert!(body.ok);
    assert_eq!(body.message, "Quote saved and email sent");

    let id = body.id.expect("response carries the record id");
    let record = test.store.get_quote(&id).unwrap().expect("record persisted");
    assert_eq!(record.form.name, "Jo");
    assert_eq!(record.form.email, "jo@x.com");
    assert_eq!(record.form.service, "Web Design");
    assert_eq!(record.form.message, "hi");
    assert!(record.file_meta.is_none());

    let sent = test.mailer.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].subject, "New Quote Request from Jo");
    assert!(sent[0].html.contains(&format!("Saved to DB: <code>{id}</code>")));
}

#[tokio::test]
async fn test_quote_multipart_with_attachment() {
    let test = build_test_app().await;
    mount_verifier(&test.verify_server, true).await;

    let pdf = b"%PDF-1.7 fake".to_vec();
    let response = test
        .app
        .clone()
        .oneshot(multipart_quote("tok", Some(("brief.pdf", pdf.clone()))))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let id = read_json(response).await["id"].as_str().unwrap().to_string();
    let record: QuoteRecord = test.store.get_quote(&id).unwrap().unwrap();
    let meta = record.file_meta.expect("attachment metadata stored");
    assert_eq!(meta.filename, "brief.pdf");
    assert_eq!(meta.content_type, "application/pdf");
    assert_eq!(meta.size, pdf.len() as u64);
    assert_eq!(record.form.company, "Acme");

    let sent = test.mailer.sent();
    let attachment = sent[0].attachment.as_ref().expect("file attached to email");
    assert_eq!(attachment.bytes.as_ref(), pdf.as_slice());
    assert!(sent[0].html.contains("Need a new site<br/>with a blog"));
}

#[tokio::test]
async fn test_quote_missing_token_rejected_without_side_effects() {
    let test = build_test_app().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
        .expect(0)
        .mount(&test.verify_server)
        .await;

    let response = test.app.clone().oneshot(json_quote(None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = read_json(response).await;
    assert_eq!(body["ok"], false);
    assert_eq!(body["message"], "Missing captcha token");

    assert_eq!(test.store.stats().quote_count, 0);
    assert!(test.mailer.sent().is_empty());
}

#[tokio::test]
async fn test_quote_rejected_by_verifier() {
    let test = build_test_app().await;
    mount_verifier(&test.verify_server, false).await;

    let response = test.app.clone().oneshot(json_quote(Some("bad"))).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let body = read_json(response).await;
    assert_eq!(body["ok"], false);
    assert_eq!(body["message"], "Captcha verification failed");
    assert_eq!(test.store.stats().quote_count, 0);
    assert!(test.mailer.sent().is_empty());
}

#[tokio::test]
async fn test_quote_verifier_unreachable_is_server_error() {
    let test = build_test_app().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&test.verify_server)
        .await;

    let response = test.app.clone().oneshot(json_quote(Some("tok"))).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(read_json(response).await["message"], "Server error");
    assert_eq!(test.store.stats().quote_count, 0);
}

#[tokio::test]
async fn test_identical_resubmission_creates_second_record() {
    let test = build_test_app().await;
    mount_verifier(&test.verify_server, true).await;

    let first = read_json(test.app.clone().oneshot(json_quote(Some("tok"))).await.unwrap()).await;
    let second = read_json(test.app.clone().oneshot(json_quote(Some("tok"))).await.unwrap()).await;

    assert_ne!(first["id"], second["id"]);
    assert_eq!(test.store.stats().quote_count, 2);
}

#[tokio::test]
async fn test_quote_missing_required_fields() {
    let test = build_test_app().await;

    let request = Request::builder()
        .uri("/api/quote")
        .method("POST")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json!({"name": "Jo", "hcaptchaToken": "tok"}).to_string()))
        .unwrap();

    let response = test.app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        read_json(response).await["message"],
        "name, email and message are required"
    );
}

#[tokio::test]
async fn test_quote_unsupported_content_type() {
    let test = build_test_app().await;

    for content_type in [Some("text/plain"), Some("application/x-www-form-urlencoded"), None] {
        let mut builder = Request::builder().uri("/api/quote").method("POST");
        if let Some(content_type) = content_type {
            builder = builder.header(header::CONTENT_TYPE, content_type);
        }
        let request = builder.body(Body::from("name=Jo")).unwrap();

        let response = test.app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{content_type:?}");
        assert_eq!(read_json(response).await["message"], "Unsupported content-type");
    }
}

#[tokio::test]
async fn test_quote_attachment_ceiling_is_inclusive() {
    let test = build_test_app().await;
    mount_verifier(&test.verify_server, true).await;
    let limit = 20 * 1024 * 1024;

    let response = test
        .app
        .clone()
        .oneshot(multipart_quote("tok", Some(("big.pdf", vec![b'x'; limit + 1]))))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(test.store.stats().quote_count, 0);

    let response = test
        .app
        .clone()
        .oneshot(multipart_quote("tok", Some(("edge.pdf", vec![b'x'; limit]))))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_mail_failure_is_server_error_but_record_kept() {
    let test = build_test_app_with(MockMailer::failing()).await;
    mount_verifier(&test.verify_server, true).await;

    let response = test.app.clone().oneshot(json_quote(Some("tok"))).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let body = read_json(response).await;
    assert_eq!(body["ok"], false);
    assert_eq!(body["message"], "Server error");
    assert_eq!(test.store.stats().quote_count, 1);
}

#[tokio::test]
async fn test_get_quote_by_id() {
    let test = build_test_app().await;
    mount_verifier(&test.verify_server, true).await;

    let id = read_json(test.app.clone().oneshot(json_quote(Some("tok"))).await.unwrap()).await["id"]
        .as_str()
        .unwrap()
        .to_string();

    let request = Request::builder()
        .uri(format!("/operators/quotes/{id}"))
        .method("GET")
        .body(Body::empty())
        .unwrap();
    let response = test.app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(read_json(response).await["name"], "Jo");

    let request = Request::builder()
        .uri("/operators/quotes/does-not-exist")
        .method("GET")
        .body(Body::empty())
        .unwrap();
    let response = test.app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_contact_endpoint() {
    let test = build_test_app().await;

    let request = Request::builder()
        .uri("/contact")
        .method("POST")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            json!({"Name": "A", "Email": "a@b.co", "Phone": "555", "Message": "hello"}).to_string(),
        ))
        .unwrap();
    let response = test.app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(read_json(response).await["message"], "Thank you for contacting us!");
    assert_eq!(test.store.stats().contact_count, 1);

    let request = Request::builder()
        .uri("/contact")
        .method("POST")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json!({"Name": "A"}).to_string()))
        .unwrap();
    let response = test.app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(read_json(response).await["message"], "All fields are required.");
}

#[tokio::test]
async fn test_newsletter_endpoint() {
    let test = build_test_app().await;

    let request = Request::builder()
        .uri("/newsletter")
        .method("POST")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json!({"email": "a@b.co"}).to_string()))
        .unwrap();
    let response = test.app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(read_json(response).await["message"], "Subscribed successfully!");
    assert_eq!(test.store.stats().subscriber_count, 1);

    let request = Request::builder()
        .uri("/newsletter")
        .method("POST")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{}"))
        .unwrap();
    let response = test.app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_health_endpoint() {
    let test = build_test_app().await;

    let request = Request::builder()
        .uri("/health")
        .method("GET")
        .body(Body::empty())
        .unwrap();

    let response = test.app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let health = read_json(response).await;
    assert_eq!(health["status"], "healthy");
    assert!(health["version"].is_string());

    let components = health["components"].as_object().unwrap();
    assert!(components.contains_key("api"));
    assert!(components.contains_key("fjall"));
    assert_eq!(components["mailer"], "log");
}
