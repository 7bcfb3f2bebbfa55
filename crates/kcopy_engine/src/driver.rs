use std::path::Path;

use kcopy_core::{Confirmation, StepFailure};
use kcopy_logging::kcopy_debug;
use thiserror::Error;

use crate::Credentials;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DriverError {
    #[error("webdriver transport error: {0}")]
    Transport(String),
    #[error("webdriver command failed ({error}): {message}")]
    Command { error: String, message: String },
    #[error("unexpected webdriver response: {0}")]
    InvalidResponse(String),
}

impl DriverError {
    pub fn is_no_such_element(&self) -> bool {
        matches!(self, DriverError::Command { error, .. } if error == "no such element")
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, DriverError::Command { error, .. } if error == "timeout")
    }
}

/// Failure of one page interaction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UiError {
    #[error("missing element: {element}")]
    MissingElement { element: String },
    #[error("timed out waiting for {waiting_for}")]
    Timeout { waiting_for: String },
    #[error(transparent)]
    Driver(#[from] DriverError),
}

impl From<UiError> for StepFailure {
    fn from(err: UiError) -> Self {
        match err {
            UiError::MissingElement { element } => StepFailure::MissingElement { element },
            UiError::Timeout { waiting_for } => StepFailure::Timeout { waiting_for },
            UiError::Driver(err) if err.is_timeout() => StepFailure::Timeout {
                waiting_for: "page load".to_string(),
            },
            UiError::Driver(err) => StepFailure::Browser(err.to_string()),
        }
    }
}

/// Blocking page-level operations against the target server's web UI.
///
/// Each call performs one step of the publish sequence and returns once the
/// following page has rendered (or the page-load timeout expired).
pub trait LegacyUi {
    /// Returns `false` when the login form rejected the credentials.
    fn login(&mut self, credentials: &Credentials) -> Result<bool, UiError>;
    fn accept_license(&mut self) -> Result<(), UiError>;
    /// Returns the location of the draft module.
    fn fill_metadata(&mut self, title: &str) -> Result<String, UiError>;
    fn upload_bundle(&mut self, bundle: &Path) -> Result<(), UiError>;
    fn request_publish(&mut self) -> Result<(), UiError>;
    fn confirm_publish(&mut self) -> Result<Confirmation, UiError>;
    fn navigate_back(&mut self) -> Result<(), UiError>;
    /// Ends the browser session. Must be safe to call more than once.
    fn close(&mut self);
}

/// Starts browser sessions pointed at a target server.
pub trait BrowserLauncher: Send + Sync {
    fn launch(&self, target_url: &str, headless: bool) -> Result<Box<dyn LegacyUi>, DriverError>;
}

/// One module's exclusive browser session. Closed on drop.
pub struct PublishSession {
    target_url: String,
    credentials: Credentials,
    ui: Box<dyn LegacyUi>,
}

impl PublishSession {
    pub fn open(
        launcher: &dyn BrowserLauncher,
        target_url: &str,
        credentials: Credentials,
        headless: bool,
    ) -> Result<Self, DriverError> {
        let ui = launcher.launch(target_url, headless)?;
        Ok(Self {
            target_url: target_url.to_string(),
            credentials,
            ui,
        })
    }

    pub fn target_url(&self) -> &str {
        &self.target_url
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub fn ui(&mut self) -> &mut dyn LegacyUi {
        self.ui.as_mut()
    }
}

impl Drop for PublishSession {
    fn drop(&mut self) {
        kcopy_debug!("closing browser session for {}", self.target_url);
        self.ui.close();
    }
}
