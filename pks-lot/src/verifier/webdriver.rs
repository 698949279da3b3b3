//! W3C WebDriver client
//!
//! Speaks the WebDriver wire protocol (JSON over HTTP) to a driver endpoint
//! such as chromedriver. Element and dialog waits poll until their deadline.

use super::driver::{AutomationDriver, BrowserMode, BrowserSession, DriverError, ElementRef};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Key under which WebDriver returns element references
const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

/// WebDriver code point for the Enter key
const ENTER_KEY: char = '\u{E007}';

const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Upper bound for any single protocol request
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

const NO_SUCH_ELEMENT: &str = "no such element";
const NO_SUCH_ALERT: &str = "no such alert";

#[derive(Debug, Deserialize)]
struct WireResponse {
    #[serde(default)]
    value: Value,
}

#[derive(Debug, Deserialize)]
struct WireError {
    error: String,
    #[serde(default)]
    message: String,
}

/// Chrome arguments for a session in `mode`
pub fn chrome_args(mode: BrowserMode) -> Vec<&'static str> {
    let mut args = vec!["--no-sandbox", "--disable-dev-shm-usage", "--window-size=1920,1080"];
    if mode == BrowserMode::Headless {
        args.push("--headless=new");
    }
    args
}

/// New-session request body for `mode`
pub fn capabilities(mode: BrowserMode) -> Value {
    json!({
        "capabilities": {
            "alwaysMatch": {
                "browserName": "chrome",
                "goog:chromeOptions": {
                    "args": chrome_args(mode),
                }
            }
        }
    })
}

/// Extract the element id from a find-element response value
pub fn parse_element(value: &Value) -> Result<ElementRef, DriverError> {
    value
        .get(ELEMENT_KEY)
        .and_then(Value::as_str)
        .map(|id| ElementRef(id.to_string()))
        .ok_or_else(|| DriverError::Protocol(format!("missing element reference in {}", value)))
}

/// Send a protocol request and unwrap the `value` member
async fn execute(request: reqwest::RequestBuilder) -> Result<Value, DriverError> {
    let response = request
        .send()
        .await
        .map_err(|e| DriverError::Transport(e.to_string()))?;

    let status = response.status();
    let body: WireResponse = response
        .json()
        .await
        .map_err(|e| DriverError::Protocol(format!("HTTP {}: {}", status, e)))?;

    if status.is_success() {
        return Ok(body.value);
    }

    match serde_json::from_value::<WireError>(body.value) {
        Ok(err) => Err(DriverError::Remote {
            error: err.error,
            message: err.message,
        }),
        Err(_) => Err(DriverError::Protocol(format!("HTTP {} without error body", status))),
    }
}

fn is_remote(error: &DriverError, code: &str) -> bool {
    matches!(error, DriverError::Remote { error, .. } if error == code)
}

/// Driver endpoint, e.g. `http://localhost:9515`
pub struct WebDriverClient {
    http: reqwest::Client,
    base_url: String,
}

impl WebDriverClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, DriverError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| DriverError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl AutomationDriver for WebDriverClient {
    async fn open_session(&self, mode: BrowserMode) -> Result<Box<dyn BrowserSession>, DriverError> {
        let url = format!("{}/session", self.base_url);
        let value = execute(self.http.post(&url).json(&capabilities(mode)))
            .await
            .map_err(|e| DriverError::SessionOpen {
                mode,
                message: e.to_string(),
            })?;

        let session_id = value
            .get("sessionId")
            .and_then(Value::as_str)
            .ok_or_else(|| DriverError::SessionOpen {
                mode,
                message: format!("no sessionId in {}", value),
            })?
            .to_string();

        debug!(%mode, session_id = %session_id, "WebDriver session opened");

        Ok(Box::new(WebDriverSession {
            http: self.http.clone(),
            session_url: format!("{}/session/{}", self.base_url, session_id),
            closed: false,
        }))
    }
}

/// A live WebDriver session
///
/// Dropping it without `close` schedules the DELETE on the current runtime.
pub struct WebDriverSession {
    http: reqwest::Client,
    session_url: String,
    closed: bool,
}

impl WebDriverSession {
    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.session_url, path)
    }

    async fn post(&self, path: &str, body: Value) -> Result<Value, DriverError> {
        execute(self.http.post(self.url(path)).json(&body)).await
    }

    async fn find_element(&self, element_id: &str) -> Result<ElementRef, DriverError> {
        let value = self
            .post(
                "element",
                json!({ "using": "css selector", "value": format!("#{}", element_id) }),
            )
            .await?;
        parse_element(&value)
    }
}

#[async_trait]
impl BrowserSession for WebDriverSession {
    async fn navigate(&mut self, url: &str, load_timeout: Duration) -> Result<(), DriverError> {
        self.post("timeouts", json!({ "pageLoad": load_timeout.as_millis() as u64 }))
            .await?;

        match self.post("url", json!({ "url": url })).await {
            Ok(_) => Ok(()),
            Err(e) if is_remote(&e, "timeout") => Err(DriverError::Timeout(load_timeout)),
            Err(e) => Err(DriverError::Navigation(e.to_string())),
        }
    }

    async fn wait_for_element(&mut self, element_id: &str, timeout: Duration) -> Result<ElementRef, DriverError> {
        let deadline = Instant::now() + timeout;

        loop {
            match self.find_element(element_id).await {
                Ok(element) => return Ok(element),
                Err(e) if is_remote(&e, NO_SUCH_ELEMENT) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Err(DriverError::ElementMissing {
                            element: element_id.to_string(),
                            waited: timeout,
                        });
                    }
                    tokio::time::sleep(POLL_INTERVAL.min(deadline - now)).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn submit_text(&mut self, element: &ElementRef, text: &str) -> Result<(), DriverError> {
        let element_path = format!("element/{}", element.0);

        self.post(&format!("{}/click", element_path), json!({})).await?;
        self.post(&format!("{}/clear", element_path), json!({})).await?;
        self.post(
            &format!("{}/value", element_path),
            json!({ "text": format!("{}{}", text, ENTER_KEY) }),
        )
        .await?;

        Ok(())
    }

    async fn wait_for_dialog(&mut self, timeout: Duration) -> Result<Option<String>, DriverError> {
        let deadline = Instant::now() + timeout;

        loop {
            match execute(self.http.get(self.url("alert/text"))).await {
                Ok(value) => {
                    let text = value.as_str().unwrap_or_default().to_string();
                    self.post("alert/accept", json!({})).await?;
                    return Ok(Some(text));
                }
                Err(e) if is_remote(&e, NO_SUCH_ALERT) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Ok(None);
                    }
                    tokio::time::sleep(POLL_INTERVAL.min(deadline - now)).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn close(&mut self) -> Result<(), DriverError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        execute(self.http.delete(&self.session_url)).await?;
        debug!(session = %self.session_url, "WebDriver session closed");
        Ok(())
    }
}

impl Drop for WebDriverSession {
    fn drop(&mut self) {
        if self.closed {
            return;
        }

        warn!(session = %self.session_url, "WebDriver session dropped without close, deleting");
        let http = self.http.clone();
        let url = self.session_url.clone();
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                let _ = http.delete(url).send().await;
            });
        }
    }
}
