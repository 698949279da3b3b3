//! Low-emission attribute verification
//!
//! Classifies a plate by submitting it to the Ministry of Environment
//! low-emission lookup page through a scripted browser session.
//!
//! Attempt plan: headless first, then a visible browser (the site sometimes
//! blocks headless clients). Each attempt resolves to one of three outcomes:
//! - dialog containing [`NO_INFO_PHRASE`] → not low-emission
//! - dialog with any other text → low-emission
//! - no dialog within the wait window → low-emission (the site shows no
//!   dialog for registered vehicles)
//!
//! If both attempts fail, the plate is classified as not low-emission.
//! [`AttributeVerifier::classify`] never returns an error.

pub mod driver;
pub mod webdriver;

use driver::{AutomationDriver, BrowserMode, BrowserSession, DriverError};
use pks_common::db::settings::get_setting_or;
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, warn};

/// Lookup page
pub const VERIFY_URL: &str = "https://ev.or.kr/nportal/buySupprt/initMycarNonpolluCheckAction.do";

/// DOM id of the plate input field
pub const INPUT_ELEMENT_ID: &str = "searchWord";

/// Dialog text shown when the plate is not registered as low-emission
pub const NO_INFO_PHRASE: &str = "조회 차량정보가 없습니다";

/// Fixed retry budget: one attempt per mode
pub const MAX_ATTEMPTS: usize = 2;

/// Allowance for session teardown and protocol round trips per attempt
const ATTEMPT_SLACK: Duration = Duration::from_secs(5);

/// Ceiling for closing a session, outside the attempt budget
pub const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Per-attempt timing budget
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifierConfig {
    pub page_load_timeout: Duration,
    pub element_wait: Duration,
    /// Pause after submitting so the dialog has time to appear
    pub settle_delay: Duration,
    pub dialog_wait: Duration,
    /// When false, both attempts use a visible browser
    pub headless: bool,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            page_load_timeout: Duration::from_secs(20),
            element_wait: Duration::from_secs(10),
            settle_delay: Duration::from_millis(500),
            dialog_wait: Duration::from_secs(3),
            headless: true,
        }
    }
}

impl VerifierConfig {
    /// Load from the `settings` table; missing or bad values keep the defaults
    pub async fn load(pool: &SqlitePool) -> pks_common::Result<Self> {
        let defaults = Self::default();
        let millis = |d: Duration| d.as_millis() as u64;

        Ok(Self {
            page_load_timeout: Duration::from_millis(
                get_setting_or(pool, "verify_page_load_timeout_ms", millis(defaults.page_load_timeout)).await?,
            ),
            element_wait: Duration::from_millis(
                get_setting_or(pool, "verify_element_wait_ms", millis(defaults.element_wait)).await?,
            ),
            settle_delay: Duration::from_millis(
                get_setting_or(pool, "verify_settle_delay_ms", millis(defaults.settle_delay)).await?,
            ),
            dialog_wait: Duration::from_millis(
                get_setting_or(pool, "verify_dialog_wait_ms", millis(defaults.dialog_wait)).await?,
            ),
            headless: get_setting_or(pool, "verify_headless", defaults.headless).await?,
        })
    }

    /// Modes in the order they are attempted
    pub fn attempt_plan(&self) -> [BrowserMode; MAX_ATTEMPTS] {
        if self.headless {
            [BrowserMode::Headless, BrowserMode::Visible]
        } else {
            [BrowserMode::Visible, BrowserMode::Visible]
        }
    }

    /// Ceiling for a single attempt, from navigation to dialog handling
    pub fn attempt_budget(&self) -> Duration {
        self.page_load_timeout + self.element_wait + self.settle_delay + self.dialog_wait + ATTEMPT_SLACK
    }
}

/// How a successful attempt resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    DialogNegative,
    DialogPositive,
    NoDialog,
}

impl AttemptOutcome {
    pub fn from_dialog(text: Option<&str>) -> Self {
        match text {
            Some(text) if text.contains(NO_INFO_PHRASE) => AttemptOutcome::DialogNegative,
            Some(_) => AttemptOutcome::DialogPositive,
            None => AttemptOutcome::NoDialog,
        }
    }

    pub fn is_low_emission(self) -> bool {
        !matches!(self, AttemptOutcome::DialogNegative)
    }
}

/// Verifier-internal failures; always absorbed by `classify`
#[derive(Debug, Error)]
pub enum VerifyError {
    #[error("{mode} attempt failed: {source}")]
    AttemptFailed {
        mode: BrowserMode,
        #[source]
        source: DriverError,
    },

    #[error("All {0} verification attempts failed")]
    Exhausted(usize),
}

/// Classification state machine: `Attempt(0) → Attempt(1) → Resolved`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyStage {
    /// Index into the attempt plan
    Attempt(usize),
    Resolved(bool),
}

impl VerifyStage {
    pub const START: VerifyStage = VerifyStage::Attempt(0);

    /// Stage following attempt `index`, which finished with `result`
    pub fn after_attempt(index: usize, result: Result<AttemptOutcome, VerifyError>) -> VerifyStage {
        match result {
            Ok(outcome) => VerifyStage::Resolved(outcome.is_low_emission()),
            Err(e) => {
                warn!(attempt = index + 1, "Low-emission lookup error: {}", e);
                if index + 1 < MAX_ATTEMPTS {
                    VerifyStage::Attempt(index + 1)
                } else {
                    error!("{}; treating vehicle as not low-emission", VerifyError::Exhausted(MAX_ATTEMPTS));
                    VerifyStage::Resolved(false)
                }
            }
        }
    }
}

/// Low-emission classifier
pub struct AttributeVerifier {
    driver: Arc<dyn AutomationDriver>,
    config: VerifierConfig,
}

impl AttributeVerifier {
    pub fn new(driver: Arc<dyn AutomationDriver>, config: VerifierConfig) -> Self {
        Self { driver, config }
    }

    /// Classify `plate` as low-emission (`true`) or not (`false`)
    ///
    /// Bounded by two attempt budgets; never fails.
    pub async fn classify(&self, plate: &str) -> bool {
        let plan = self.config.attempt_plan();
        let mut stage = VerifyStage::START;

        loop {
            match stage {
                VerifyStage::Attempt(index) => {
                    let result = self.attempt(plan[index], plate).await;
                    stage = VerifyStage::after_attempt(index, result);
                }
                VerifyStage::Resolved(low_emission) => {
                    info!(plate, low_emission, "Low-emission classification resolved");
                    return low_emission;
                }
            }
        }
    }

    /// One attempt in `mode`
    ///
    /// Opening the session counts against the attempt budget. Any opened
    /// session is closed on every path, with its own `CLOSE_TIMEOUT`.
    async fn attempt(&self, mode: BrowserMode, plate: &str) -> Result<AttemptOutcome, VerifyError> {
        let budget = self.config.attempt_budget();
        let mut session = None;

        let result = match tokio::time::timeout(budget, self.open_and_run(mode, plate, &mut session)).await {
            Ok(result) => result,
            Err(_) => Err(DriverError::Timeout(budget)),
        };

        if let Some(mut session) = session {
            match tokio::time::timeout(CLOSE_TIMEOUT, session.close()).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(%mode, "Failed to close browser session: {}", e),
                Err(_) => warn!(%mode, "Closing browser session timed out after {:?}", CLOSE_TIMEOUT),
            }
        }

        result.map_err(|source| VerifyError::AttemptFailed { mode, source })
    }

    /// Open a session into `slot`, then run the lookup in it
    async fn open_and_run(
        &self,
        mode: BrowserMode,
        plate: &str,
        slot: &mut Option<Box<dyn BrowserSession>>,
    ) -> Result<AttemptOutcome, DriverError> {
        let session = slot.insert(self.driver.open_session(mode).await?);
        self.run_attempt(&mut **session, plate).await
    }

    async fn run_attempt(&self, session: &mut dyn BrowserSession, plate: &str) -> Result<AttemptOutcome, DriverError> {
        session.navigate(VERIFY_URL, self.config.page_load_timeout).await?;

        let input = session
            .wait_for_element(INPUT_ELEMENT_ID, self.config.element_wait)
            .await?;
        session.submit_text(&input, plate).await?;

        tokio::time::sleep(self.config.settle_delay).await;

        let dialog = session.wait_for_dialog(self.config.dialog_wait).await?;
        match &dialog {
            Some(text) => info!(plate, dialog = %text, "Lookup dialog shown"),
            None => info!(plate, "No lookup dialog shown"),
        }

        Ok(AttemptOutcome::from_dialog(dialog.as_deref()))
    }
}
