//! WebDriver client against an in-process mock driver endpoint

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use pks_lot::verifier::webdriver::WebDriverClient;
use pks_lot::verifier::{AttributeVerifier, VerifierConfig, NO_INFO_PHRASE};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Default)]
struct MockDriver {
    /// Number of session requests to reject before accepting
    reject_sessions: usize,
    /// Alert shown after the plate is typed; `None` never shows one
    alert: Option<String>,
    session_requests: Vec<Value>,
    typed: Vec<String>,
    accepted: usize,
    deleted: Vec<String>,
}

type Shared = Arc<Mutex<MockDriver>>;

fn ok(value: Value) -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "value": value })))
}

fn wire_error(status: StatusCode, error: &str) -> (StatusCode, Json<Value>) {
    (status, Json(json!({ "value": { "error": error, "message": error } })))
}

async fn new_session(State(mock): State<Shared>, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    let mut mock = mock.lock().unwrap();
    mock.session_requests.push(body);
    if mock.session_requests.len() <= mock.reject_sessions {
        return wire_error(StatusCode::INTERNAL_SERVER_ERROR, "session not created");
    }
    let id = format!("s{}", mock.session_requests.len());
    ok(json!({ "sessionId": id, "capabilities": {} }))
}

async fn accept_null() -> (StatusCode, Json<Value>) {
    ok(Value::Null)
}

async fn find_element(Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    if body["value"] == "#searchWord" {
        ok(json!({ "element-6066-11e4-a52e-4f735466cecf": "input-1" }))
    } else {
        wire_error(StatusCode::NOT_FOUND, "no such element")
    }
}

async fn send_keys(State(mock): State<Shared>, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    let text = body["text"].as_str().unwrap_or_default().to_string();
    mock.lock().unwrap().typed.push(text);
    ok(Value::Null)
}

async fn alert_text(State(mock): State<Shared>) -> (StatusCode, Json<Value>) {
    let mock = mock.lock().unwrap();
    match (&mock.alert, mock.typed.is_empty()) {
        (Some(text), false) => ok(json!(text)),
        _ => wire_error(StatusCode::NOT_FOUND, "no such alert"),
    }
}

async fn accept_alert(State(mock): State<Shared>) -> (StatusCode, Json<Value>) {
    mock.lock().unwrap().accepted += 1;
    ok(Value::Null)
}

async fn delete_session(State(mock): State<Shared>, Path(id): Path<String>) -> (StatusCode, Json<Value>) {
    mock.lock().unwrap().deleted.push(id);
    ok(Value::Null)
}

async fn spawn_mock(mock: MockDriver) -> (String, Shared) {
    let shared = Arc::new(Mutex::new(mock));
    let app = Router::new()
        .route("/session", post(new_session))
        .route("/session/:id", delete(delete_session))
        .route("/session/:id/timeouts", post(accept_null))
        .route("/session/:id/url", post(accept_null))
        .route("/session/:id/element", post(find_element))
        .route("/session/:id/element/:element/click", post(accept_null))
        .route("/session/:id/element/:element/clear", post(accept_null))
        .route("/session/:id/element/:element/value", post(send_keys))
        .route("/session/:id/alert/text", get(alert_text))
        .route("/session/:id/alert/accept", post(accept_alert))
        .with_state(Arc::clone(&shared));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{}/", addr), shared)
}

fn config() -> VerifierConfig {
    VerifierConfig {
        page_load_timeout: Duration::from_secs(2),
        element_wait: Duration::from_secs(1),
        settle_delay: Duration::ZERO,
        dialog_wait: Duration::from_millis(300),
        headless: true,
    }
}

async fn classify(url: &str, plate: &str) -> bool {
    let client = WebDriverClient::new(url).unwrap();
    AttributeVerifier::new(Arc::new(client), config()).classify(plate).await
}

#[tokio::test]
async fn test_rejected_headless_session_falls_back_to_visible() {
    let (url, mock) = spawn_mock(MockDriver {
        reject_sessions: 1,
        alert: Some(NO_INFO_PHRASE.to_string()),
        ..MockDriver::default()
    })
    .await;

    assert!(!classify(&url, "12가3456").await);

    let mock = mock.lock().unwrap();
    assert_eq!(mock.session_requests.len(), 2);

    let args = |i: usize| mock.session_requests[i]["capabilities"]["alwaysMatch"]["goog:chromeOptions"]["args"].clone();
    assert!(args(0).as_array().unwrap().iter().any(|a| a == "--headless=new"));
    assert!(!args(1).as_array().unwrap().iter().any(|a| a == "--headless=new"));

    assert_eq!(mock.typed, vec!["12가3456\u{E007}".to_string()]);
    assert_eq!(mock.accepted, 1);
    assert_eq!(mock.deleted, vec!["s2".to_string()]);
}

#[tokio::test]
async fn test_unrelated_alert_is_low_emission() {
    let (url, mock) = spawn_mock(MockDriver {
        alert: Some("저공해 차량입니다".to_string()),
        ..MockDriver::default()
    })
    .await;

    assert!(classify(&url, "34나5678").await);

    let mock = mock.lock().unwrap();
    assert_eq!(mock.session_requests.len(), 1);
    assert_eq!(mock.deleted, vec!["s1".to_string()]);
}

#[tokio::test]
async fn test_no_alert_is_low_emission() {
    let (url, mock) = spawn_mock(MockDriver::default()).await;

    assert!(classify(&url, "34나5678").await);

    let mock = mock.lock().unwrap();
    assert_eq!(mock.accepted, 0);
    assert_eq!(mock.deleted.len(), 1);
}

#[tokio::test]
async fn test_unreachable_driver_classifies_false() {
    // Bind then drop to get a port nothing listens on
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    assert!(!classify(&url, "12가3456").await);
}
