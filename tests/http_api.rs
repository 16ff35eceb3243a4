use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use serde_json::{Value, json};
use tower::ServiceExt; // for `oneshot`

use smartseva::accounts::AccountsConfig;
use smartseva::config::ServerConfig;
use smartseva::{
    AccountService, AppState, PreprocessConfig, Prediction, Predictor, Processor, VisionError,
    service,
};

const BOUNDARY: &str = "smartseva-test-boundary";

/// Runs real preprocessing and returns fixed vectors instead of a forward pass.
struct StubPredictor {
    processor: Processor,
    calls: AtomicUsize,
}

impl StubPredictor {
    fn new() -> Self {
        Self {
            processor: Processor::new(PreprocessConfig::default()).unwrap(),
            calls: AtomicUsize::new(0),
        }
    }

    fn respond(&self, input: ndarray::Array4<f32>) -> Prediction {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mean = input.mean().unwrap_or(0.0);
        Prediction {
            main_output: Some(vec![mean, 1.0 - mean]),
            severity_output: Some(vec![0.25, 0.5, 0.25]),
        }
    }
}

impl Predictor for StubPredictor {
    fn predict(&self, image: &[u8]) -> Result<Prediction, VisionError> {
        let input = self.processor.preprocess_bytes(image)?;
        Ok(self.respond(input))
    }

    fn predict_path(&self, path: &Path) -> Result<Prediction, VisionError> {
        let input = self.processor.preprocess_path(path)?;
        Ok(self.respond(input))
    }
}

fn app() -> (Router, Arc<StubPredictor>) {
    let predictor = Arc::new(StubPredictor::new());
    let accounts = Arc::new(AccountService::in_memory(&AccountsConfig::default()));
    let state = AppState::new(predictor.clone(), accounts);
    (service::router(state, &ServerConfig::default()), predictor)
}

fn jpeg_bytes() -> Vec<u8> {
    let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(320, 200, Rgb([120, 60, 30])));
    let mut bytes = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Jpeg)
        .unwrap();
    bytes
}

fn upload(field: &str, bytes: &[u8]) -> Request<Body> {
    let mut body = format!(
        "--{BOUNDARY}\r\n\
         Content-Disposition: form-data; name=\"{field}\"; filename=\"leaf.jpg\"\r\n\
         Content-Type: application/octet-stream\r\n\r\n"
    )
    .into_bytes();
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri("/api/predict")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

fn post_json(uri: &str, body: Value, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn get_current(token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri("/api/user/current");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::empty()).unwrap()
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, body.to_vec())
}

async fn send_json(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let (status, body) = send(app, request).await;
    (status, serde_json::from_slice(&body).unwrap())
}

#[tokio::test]
async fn health_endpoint() {
    let (app, _) = app();
    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"OK");
}

#[tokio::test]
async fn empty_upload_is_rejected_without_inference() {
    let (app, predictor) = app();
    let (status, body) = send(&app, upload("file", b"")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(String::from_utf8(body).unwrap(), "File is empty!");
    assert_eq!(predictor.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn missing_file_field_is_rejected() {
    let (app, predictor) = app();
    let (status, _) = send(&app, upload("image", &jpeg_bytes())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(predictor.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn valid_jpeg_returns_both_outputs() {
    let (app, predictor) = app();
    let (status, body) = send_json(&app, upload("file", &jpeg_bytes())).await;
    assert_eq!(status, StatusCode::OK);

    let main = body["main_output"].as_array().unwrap();
    let severity = body["severity_output"].as_array().unwrap();
    assert_eq!(main.len(), 2);
    assert_eq!(severity.len(), 3);
    assert!(main.iter().all(Value::is_number));
    assert_eq!(predictor.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn corrupt_upload_is_a_server_error() {
    let (app, predictor) = app();
    let (status, body) = send(&app, upload("file", b"\x89PNG but not really")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let message = String::from_utf8(body).unwrap();
    assert!(message.starts_with("Error: "), "{message}");
    assert!(message.contains("decode"), "{message}");
    assert_eq!(predictor.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn register_login_current_logout() {
    let (app, _) = app();
    let account = json!({ "name": "Asha", "email": "asha@example.com", "password": "pa55" });

    let request = post_json("/api/user/register", account.clone(), None);
    let (status, body) = send_json(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "REGISTERED");

    let (_, body) = send_json(&app, post_json("/api/user/register", account, None)).await;
    assert_eq!(body["status"], "EXISTS");

    let bad = json!({ "email": "asha@example.com", "password": "wrong" });
    let (status, body) = send_json(&app, post_json("/api/user/login", bad, None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["status"], "failed");

    let good = json!({ "email": "asha@example.com", "password": "pa55" });
    let (status, body) = send_json(&app, post_json("/api/user/login", good, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "success");
    assert_eq!(body["user"]["name"], "Asha");
    assert!(body["user"].get("password").is_none());
    let token = body["token"].as_str().unwrap().to_string();

    let (status, body) = send_json(&app, get_current(Some(&token))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["user"]["email"], "asha@example.com");

    let request = post_json("/api/user/logout", json!({}), Some(&token));
    let (status, body) = send_json(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "logged_out");

    let (status, body) = send_json(&app, get_current(Some(&token))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["status"], "anonymous");
}

#[tokio::test]
async fn current_without_token_is_anonymous() {
    let (app, _) = app();
    let (status, body) = send_json(&app, get_current(None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["status"], "anonymous");
}

#[tokio::test]
async fn invalid_email_is_rejected() {
    let (app, _) = app();
    let account = json!({ "name": "X", "email": "not-an-email", "password": "p" });
    let (status, body) = send_json(&app, post_json("/api/user/register", account, None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], "INVALID");
}

#[tokio::test]
async fn google_auth_creates_then_reuses_account() {
    let (app, _) = app();
    let identity = json!({ "email": "ravi@example.com", "name": "Ravi" });

    let request = post_json("/api/user/google-auth", identity.clone(), None);
    let (status, first) = send_json(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["status"], "success");

    let (_, second) = send_json(&app, post_json("/api/user/google-auth", identity, None)).await;
    assert_eq!(first["user"]["id"], second["user"]["id"]);
    assert_ne!(first["token"], second["token"]);

    let login = json!({ "email": "ravi@example.com", "password": "google" });
    let (status, _) = send_json(&app, post_json("/api/user/login", login, None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn google_auth_is_refused_for_password_accounts() {
    let (app, _) = app();
    let account = json!({ "name": "Meera", "email": "meera@example.com", "password": "pw" });
    send_json(&app, post_json("/api/user/register", account, None)).await;

    let identity = json!({ "email": "meera@example.com", "name": "Meera" });
    let request = post_json("/api/user/google-auth", identity, None);
    let (status, body) = send_json(&app, request).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["status"], "PASSWORD_ACCOUNT");
    assert!(body.get("token").is_none());
}
