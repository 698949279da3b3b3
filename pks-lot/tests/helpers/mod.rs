//! Shared test helpers: a scripted automation driver and app setup

#![allow(dead_code)]

use async_trait::async_trait;
use pks_lot::verifier::driver::{AutomationDriver, BrowserMode, BrowserSession, DriverError, ElementRef};
use pks_lot::verifier::{AttributeVerifier, VerifierConfig};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// What one scripted attempt does
#[derive(Debug, Clone)]
pub enum Script {
    OpenFails,
    NavigationFails,
    /// Input field never appears
    ElementMissing,
    Dialog(String),
    NoDialog,
    DialogFails,
    /// Navigation never completes
    Hangs,
    /// Session creation never completes
    OpenHangs,
    /// Lookup shows no dialog, then closing never completes
    CloseHangs,
}

/// Automation driver that plays back one [`Script`] per opened session
///
/// When the scripts run out, further sessions fail to open.
#[derive(Default)]
pub struct FakeDriver {
    scripts: Mutex<VecDeque<Script>>,
    opened: Mutex<Vec<BrowserMode>>,
    closed: Arc<AtomicUsize>,
    submitted: Arc<Mutex<Vec<String>>>,
}

impl FakeDriver {
    pub fn new(scripts: Vec<Script>) -> Arc<Self> {
        Arc::new(Self {
            scripts: Mutex::new(scripts.into()),
            ..Self::default()
        })
    }

    pub fn push(&self, script: Script) {
        self.scripts.lock().unwrap().push_back(script);
    }

    /// Modes of every open_session call, in order
    pub fn opened(&self) -> Vec<BrowserMode> {
        self.opened.lock().unwrap().clone()
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn submitted(&self) -> Vec<String> {
        self.submitted.lock().unwrap().clone()
    }
}

#[async_trait]
impl AutomationDriver for FakeDriver {
    async fn open_session(&self, mode: BrowserMode) -> Result<Box<dyn BrowserSession>, DriverError> {
        self.opened.lock().unwrap().push(mode);
        let script = self.scripts.lock().unwrap().pop_front().unwrap_or(Script::OpenFails);

        match script {
            Script::OpenFails => {
                return Err(DriverError::SessionOpen {
                    mode,
                    message: "chrome not reachable".to_string(),
                })
            }
            Script::OpenHangs => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                return Err(DriverError::SessionOpen {
                    mode,
                    message: "chrome never answered".to_string(),
                });
            }
            _ => {}
        }

        Ok(Box::new(FakeSession {
            script,
            closed: Arc::clone(&self.closed),
            submitted: Arc::clone(&self.submitted),
        }))
    }
}

struct FakeSession {
    script: Script,
    closed: Arc<AtomicUsize>,
    submitted: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl BrowserSession for FakeSession {
    async fn navigate(&mut self, _url: &str, _load_timeout: Duration) -> Result<(), DriverError> {
        match self.script {
            Script::NavigationFails => Err(DriverError::Navigation("net::ERR_CONNECTION_RESET".to_string())),
            Script::Hangs => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(())
            }
            _ => Ok(()),
        }
    }

    async fn wait_for_element(&mut self, element_id: &str, timeout: Duration) -> Result<ElementRef, DriverError> {
        match self.script {
            Script::ElementMissing => Err(DriverError::ElementMissing {
                element: element_id.to_string(),
                waited: timeout,
            }),
            _ => Ok(ElementRef("input-1".to_string())),
        }
    }

    async fn submit_text(&mut self, _element: &ElementRef, text: &str) -> Result<(), DriverError> {
        self.submitted.lock().unwrap().push(text.to_string());
        Ok(())
    }

    async fn wait_for_dialog(&mut self, _timeout: Duration) -> Result<Option<String>, DriverError> {
        match &self.script {
            Script::Dialog(text) => Ok(Some(text.clone())),
            Script::DialogFails => Err(DriverError::Remote {
                error: "unexpected alert open".to_string(),
                message: "dialog dismissed".to_string(),
            }),
            _ => Ok(None),
        }
    }

    async fn close(&mut self) -> Result<(), DriverError> {
        self.closed.fetch_add(1, Ordering::SeqCst);
        if let Script::CloseHangs = self.script {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        Ok(())
    }
}

/// Short waits so tests do not sleep
pub fn fast_config() -> VerifierConfig {
    VerifierConfig {
        page_load_timeout: Duration::from_secs(1),
        element_wait: Duration::from_secs(1),
        settle_delay: Duration::ZERO,
        dialog_wait: Duration::from_millis(10),
        headless: true,
    }
}

pub fn verifier(driver: &Arc<FakeDriver>) -> Arc<AttributeVerifier> {
    let driver: Arc<dyn AutomationDriver> = driver.clone();
    Arc::new(AttributeVerifier::new(driver, fast_config()))
}
