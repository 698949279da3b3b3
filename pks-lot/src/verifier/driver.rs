//! Browser automation capability consumed by the verifier
//!
//! The verifier only needs: open a session, navigate with a load timeout,
//! wait for an element, type text and submit, wait for a modal dialog, and
//! close. Any engine that can do that implements [`AutomationDriver`].

use async_trait::async_trait;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Automation strategy for one verification attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BrowserMode {
    /// Constrained: no visible UI surface
    Headless,
    /// Fallback: visible browser window
    Visible,
}

impl fmt::Display for BrowserMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BrowserMode::Headless => write!(f, "headless"),
            BrowserMode::Visible => write!(f, "visible"),
        }
    }
}

/// Handle to an element located in the current page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementRef(pub String);

/// Failures raised by an automation session
#[derive(Debug, Error)]
pub enum DriverError {
    #[error("Failed to open {mode} session: {message}")]
    SessionOpen { mode: BrowserMode, message: String },

    #[error("Navigation failed: {0}")]
    Navigation(String),

    #[error("Element '{element}' not present after {waited:?}")]
    ElementMissing { element: String, waited: Duration },

    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    #[error("WebDriver error '{error}': {message}")]
    Remote { error: String, message: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Unexpected response: {0}")]
    Protocol(String),
}

/// Opens fresh, exclusively owned browser sessions
#[async_trait]
pub trait AutomationDriver: Send + Sync {
    async fn open_session(&self, mode: BrowserMode) -> Result<Box<dyn BrowserSession>, DriverError>;
}

/// One live browser session
///
/// Owned by exactly one verification attempt. `close` must be called on
/// every exit path; calling it twice is harmless.
#[async_trait]
pub trait BrowserSession: Send {
    /// Load `url`, failing if the page has not loaded within `load_timeout`
    async fn navigate(&mut self, url: &str, load_timeout: Duration) -> Result<(), DriverError>;

    /// Wait up to `timeout` for the element with DOM id `element_id`
    async fn wait_for_element(&mut self, element_id: &str, timeout: Duration) -> Result<ElementRef, DriverError>;

    /// Focus and clear the element, type `text`, then press Enter
    async fn submit_text(&mut self, element: &ElementRef, text: &str) -> Result<(), DriverError>;

    /// Wait up to `timeout` for a modal dialog
    ///
    /// Returns its text after accepting it, or `None` if no dialog appeared.
    async fn wait_for_dialog(&mut self, timeout: Duration) -> Result<Option<String>, DriverError>;

    async fn close(&mut self) -> Result<(), DriverError>;
}
